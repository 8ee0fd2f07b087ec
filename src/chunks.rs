//! Sequential RIFF chunk scanner.
//!
//! The walker is deliberately forgiving: apart from a missing `RIFF` tag,
//! every anomaly is reported through [`Diagnostics`] and the scan goes on.

use std::ops::Range;

use crate::diagnostics::Diagnostics;
use crate::error::WaveError;
use crate::layout::CHUNK_HEADER_SIZE;
use crate::prelude::*;

// Chunk Identifiers
pub const RIFF_CHUNK_ID: &[u8; 4] = b"RIFF";
pub const WAVE_FORMAT_ID: &[u8; 4] = b"WAVE";
pub const FMT_CHUNK_ID: &[u8; 4] = b"fmt ";
pub const DATA_CHUNK_ID: &[u8; 4] = b"data";
pub const FACT_CHUNK_ID: &[u8; 4] = b"fact";

// Some real-world files carry a stray zero byte in front of a tag
const BAD_TAG_ADJUSTMENT: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub tag: [u8; 4],
    /// Offset of the chunk header.
    pub begin: u64,
    /// One past the last body byte, clamped to the file size.
    pub end: u64,
}

impl Chunk {
    pub fn is(&self, tag: &[u8; 4]) -> bool {
        &self.tag == tag
    }

    pub fn tag_str(&self) -> String {
        self.tag.escape_ascii().to_string()
    }

    /// Byte range of the chunk body, excluding the 8-byte header.
    pub fn body(&self) -> Range<u64> {
        (self.begin + CHUNK_HEADER_SIZE as u64).min(self.end)..self.end
    }
}

/// How the walker steps over odd-length chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkPadding {
    /// Next header starts right after the body, as written.
    #[default]
    Unpadded,
    /// RIFF word alignment: skip one pad byte after an odd-length body.
    WordAligned,
}

/// A tag is dubious if it is not alphanumeric once trailing spaces are gone.
pub fn is_dubious(tag: &[u8]) -> bool {
    let trimmed = tag.trim_ascii_end();
    trimmed.is_empty() || !trimmed.iter().all(u8::is_ascii_alphanumeric)
}

/// Lazy iterator over the chunks of a RIFF container.
///
/// The first item is the synthetic form chunk: its tag is the form type
/// (normally `WAVE`) and it spans `0..declared_size`.
pub struct ChunkWalker<'d, S> {
    source: S,
    file_size: u64,
    padding: ChunkPadding,
    diagnostics: &'d mut Diagnostics,
    form: Option<Chunk>,
    done: bool,
}

impl<'d, S: Read + Seek> ChunkWalker<'d, S> {
    /// Reads the RIFF header. Fails with [`WaveError::NotRiff`] if the
    /// source does not start with `RIFF`.
    pub fn new(
        mut source: S,
        file_size: u64,
        padding: ChunkPadding,
        diagnostics: &'d mut Diagnostics,
    ) -> R<Self> {
        source.seek(SeekFrom::Start(0))?;

        let mut walker = Self {
            source,
            file_size,
            padding,
            diagnostics,
            form: None,
            done: false,
        };

        let mut riff = [0u8; 4];
        if read_fully(&mut walker.source, &mut riff)? < riff.len() || &riff != RIFF_CHUNK_ID {
            return Err(WaveError::NotRiff.into());
        }

        let declared = match walker.source.read_u32::<LittleEndian>() {
            Ok(size) => size,
            Err(_) => return Err(WaveError::NotWave(String::new()).into()),
        };
        let form_tag = match walker.read_tag()? {
            Some((tag, _)) => tag,
            None => return Err(WaveError::NotWave(String::new()).into()),
        };

        walker.form = Some(Chunk {
            tag: form_tag,
            begin: 0,
            end: declared as u64,
        });
        Ok(walker)
    }

    pub fn diagnostics(&mut self) -> &mut Diagnostics {
        &mut *self.diagnostics
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Reads `range` from the source without disturbing the scan position.
    pub fn read_span(&mut self, range: Range<u64>) -> R<Vec<u8>> {
        let resume = self.source.stream_position()?;
        self.source.seek(SeekFrom::Start(range.start))?;
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        self.source.read_exact(&mut buf)?;
        self.source.seek(SeekFrom::Start(resume))?;
        Ok(buf)
    }

    /// Returns the tag and whether repairing it consumed an extra byte.
    /// `None` means the source ran out before four bytes were read.
    fn read_tag(&mut self) -> R<Option<([u8; 4], bool)>> {
        let mut tag = [0u8; 4];
        if read_fully(&mut self.source, &mut tag)? < tag.len() {
            return Ok(None);
        }
        if !is_dubious(&tag) {
            return Ok(Some((tag, false)));
        }

        if BAD_TAG_ADJUSTMENT && tag[0] == 0 {
            let mut extra = [0u8; 1];
            if read_fully(&mut self.source, &mut extra)? == 1 {
                let shifted = [tag[1], tag[2], tag[3], extra[0]];
                if !is_dubious(&shifted) {
                    return Ok(Some((shifted, true)));
                }
                self.source.seek(SeekFrom::Current(-1))?;
            }
        }

        self.diagnostics
            .warn(format!("Dubious tag b'{}'", tag.escape_ascii()));
        Ok(Some((tag, false)))
    }

    fn next_chunk(&mut self) -> R<Option<Chunk>> {
        let mut begin = self.source.stream_position()?;
        if begin >= self.file_size {
            return Ok(None);
        }
        let left = self.file_size - begin;
        if left < CHUNK_HEADER_SIZE as u64 {
            // A lone trailing byte is the pad after an odd final chunk
            if left > 1 {
                self.diagnostics
                    .warn(format!("Incomplete chunk header at {}", begin));
            }
            return Ok(None);
        }

        let Some((tag, shifted)) = self.read_tag()? else {
            return Ok(None);
        };
        if shifted {
            begin += 1;
        }

        let size = match self.source.read_u32::<LittleEndian>() {
            Ok(size) => size as u64,
            Err(_) => {
                self.diagnostics
                    .warn(format!("Incomplete chunk header at {}", begin));
                return Ok(None);
            }
        };

        let mut end = begin + CHUNK_HEADER_SIZE as u64 + size;
        let next = match self.padding {
            ChunkPadding::WordAligned => end + size % 2,
            ChunkPadding::Unpadded => end,
        };
        self.source.seek(SeekFrom::Start(next))?;

        if end > self.file_size {
            if end > self.file_size + 1 {
                self.diagnostics.warn(format!(
                    "Incomplete chunk: {} > {}",
                    end,
                    self.file_size + 1
                ));
            }
            end = self.file_size;
        }

        dprintln!("chunk {} at {}..{}", tag.escape_ascii(), begin, end);
        Ok(Some(Chunk { tag, begin, end }))
    }
}

impl<S: Read + Seek> Iterator for ChunkWalker<'_, S> {
    type Item = R<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(form) = self.form.take() {
            return Some(Ok(form));
        }
        if self.done {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Like `read_exact`, but reports a short read instead of failing.
fn read_fully<S: Read>(source: &mut S, buf: &mut [u8]) -> R<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
