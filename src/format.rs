//! Locates the `fmt ` and `data` chunks and decides what the samples are.

use std::fmt;

use crate::chunks::{Chunk, ChunkPadding, ChunkWalker, DATA_CHUNK_ID, FMT_CHUNK_ID, WAVE_FORMAT_ID};
use crate::diagnostics::Diagnostics;
use crate::error::WaveError;
use crate::layout::{CHUNK_HEADER_SIZE, FMT_EXTENSION, FMT_PCM};
use crate::prelude::*;

// Format tags
pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const WAVE_FORMAT_ALAW: u16 = 0x0006;
pub const WAVE_FORMAT_MULAW: u16 = 0x0007;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

const PCM_BITS_PER_SAMPLE: [u16; 4] = [8, 16, 32, 64];
const FLOAT_BITS_PER_SAMPLE: [u16; 2] = [32, 64];

/// Recognized `fmt ` body lengths, not counting the chunk header.
const FMT_BLOCK_LENGTHS: [usize; 4] = [16, 18, 20, 40];
const FMT_BODY_SIZE: usize = 16;

/// Element type of a mapped sample array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl SampleType {
    /// Picks the element type for a decoded format. 8-bit samples are
    /// always unsigned; 24-bit and anything odd have no element type.
    pub fn from_format(is_float: bool, bits_per_sample: u16) -> Option<Self> {
        match (is_float, bits_per_sample) {
            (false, 8) => Some(SampleType::U8),
            (false, 16) => Some(SampleType::I16),
            (false, 32) => Some(SampleType::I32),
            (false, 64) => Some(SampleType::I64),
            (true, 32) => Some(SampleType::F32),
            (true, 64) => Some(SampleType::F64),
            _ => None,
        }
    }

    pub const fn size(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::I16 => 2,
            SampleType::I32 | SampleType::F32 => 4,
            SampleType::I64 | SampleType::F64 => 8,
        }
    }

    pub const fn bits(self) -> u16 {
        self.size() as u16 * 8
    }

    pub const fn is_float(self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }

    pub const fn is_signed(self) -> bool {
        !matches!(self, SampleType::U8)
    }

    /// Inclusive value range of the integer types.
    pub const fn int_range(self) -> Option<(i128, i128)> {
        match self {
            SampleType::U8 => Some((u8::MIN as i128, u8::MAX as i128)),
            SampleType::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            SampleType::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            SampleType::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            SampleType::F32 | SampleType::F64 => None,
        }
    }

    /// The `wFormatTag` a writer stores for this type.
    pub const fn format_tag(self) -> u16 {
        if self.is_float() {
            WAVE_FORMAT_IEEE_FLOAT
        } else {
            WAVE_FORMAT_PCM
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SampleType::U8 => "uint8",
            SampleType::I16 => "int16",
            SampleType::I32 => "int32",
            SampleType::I64 => "int64",
            SampleType::F32 => "float32",
            SampleType::F64 => "float64",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded contents of a `fmt ` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub cb_size: Option<u16>,
    pub valid_bits_per_sample: Option<u16>,
    pub channel_mask: Option<u32>,
    /// Real format tag nested in an extensible header.
    pub sub_format: Option<u16>,
}

impl FormatDescriptor {
    /// Decodes a whole `fmt ` chunk, header included.
    pub fn parse(chunk: &[u8]) -> R<Self> {
        let body = chunk.len().saturating_sub(CHUNK_HEADER_SIZE);
        if body < FMT_BODY_SIZE {
            return Err(WaveError::ShortFmt(body).into());
        }

        let f = FMT_PCM.unpack_at(chunk, 0)?;
        let field = |name: &str| {
            f.u16(name)
                .ok_or_else(|| anyhow!("fmt field {} missing", name))
        };
        let mut descriptor = FormatDescriptor {
            format_tag: field("wFormatTag")?,
            channels: field("nChannels")?,
            sample_rate: f.u32("nSamplesPerSec").unwrap_or_default(),
            avg_bytes_per_sec: f.u32("nAvgBytesPerSec").unwrap_or_default(),
            block_align: field("nBlockAlign")?,
            bits_per_sample: field("wBitsPerSample")?,
            cb_size: None,
            valid_bits_per_sample: None,
            channel_mask: None,
            sub_format: None,
        };

        if body >= FMT_BODY_SIZE + 2 {
            let at = CHUNK_HEADER_SIZE + FMT_BODY_SIZE;
            descriptor.cb_size = Some(LittleEndian::read_u16(&chunk[at..at + 2]));
        }

        if descriptor.format_tag == WAVE_FORMAT_EXTENSIBLE {
            let at = CHUNK_HEADER_SIZE + FMT_BODY_SIZE;
            if chunk.len() < at + FMT_EXTENSION.size() {
                return Err(WaveError::UnsupportedFormat(WAVE_FORMAT_EXTENSIBLE).into());
            }
            let ext = FMT_EXTENSION.unpack_at(chunk, at)?;
            descriptor.valid_bits_per_sample = ext.u16("wValidBitsPerSample");
            descriptor.channel_mask = ext.bytes("dwChannelMask").map(LittleEndian::read_u32);
            descriptor.sub_format = ext.u16("wFormatTag");
        }

        Ok(descriptor)
    }

    /// The tag format decisions are made on: the nested one for
    /// extensible files, the top-level one otherwise.
    pub fn effective_tag(&self) -> u16 {
        match (self.format_tag, self.sub_format) {
            (WAVE_FORMAT_EXTENSIBLE, Some(sub)) => sub,
            (tag, _) => tag,
        }
    }

    pub fn is_float(&self) -> bool {
        self.effective_tag() == WAVE_FORMAT_IEEE_FLOAT
    }

    /// Validates the encoding and picks the element type.
    pub fn sample_type(&self) -> R<SampleType> {
        let tag = self.effective_tag();
        if tag != WAVE_FORMAT_PCM && tag != WAVE_FORMAT_IEEE_FLOAT {
            return Err(WaveError::UnsupportedFormat(tag).into());
        }

        let is_float = self.is_float();
        let allowed: &[u16] = if is_float {
            &FLOAT_BITS_PER_SAMPLE
        } else {
            &PCM_BITS_PER_SAMPLE
        };
        if !allowed.contains(&self.bits_per_sample) {
            return Err(WaveError::UnsupportedBitDepth {
                bits: self.bits_per_sample,
                float: is_float,
            }
            .into());
        }

        SampleType::from_format(is_float, self.bits_per_sample).ok_or_else(|| {
            WaveError::UnsupportedBitDepth {
                bits: self.bits_per_sample,
                float: is_float,
            }
            .into()
        })
    }
}

/// What the chunk scan found, before any decision about the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveHeader {
    pub descriptor: FormatDescriptor,
    /// Size the RIFF header claims for the container.
    pub declared_size: u64,
    /// Offset of the `data` chunk header.
    pub data_begin: u64,
    /// One past the last byte of sample data.
    pub data_end: u64,
    pub file_size: u64,
}

impl WaveHeader {
    /// Absolute offset of the first sample byte.
    pub fn data_offset(&self) -> u64 {
        self.data_begin + CHUNK_HEADER_SIZE as u64
    }

    pub fn data_len(&self) -> u64 {
        self.data_end.saturating_sub(self.data_offset())
    }

    /// Bytes in the file after the sample data.
    pub fn roffset(&self) -> u64 {
        self.file_size - self.data_end
    }
}

/// Where the samples are and what type they have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFormat {
    pub header: WaveHeader,
    pub sample_type: SampleType,
}

impl ResolvedFormat {
    pub fn channels(&self) -> u16 {
        self.header.descriptor.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.header.descriptor.sample_rate
    }

    pub fn data_offset(&self) -> u64 {
        self.header.data_offset()
    }

    pub fn data_len(&self) -> u64 {
        self.header.data_len()
    }
}

/// Scans the container for the first `fmt ` and `data` chunks and decodes
/// the format. Does not judge whether the encoding can be mapped.
pub fn parse_header<S: Read + Seek>(
    source: S,
    file_size: u64,
    padding: ChunkPadding,
    diagnostics: &mut Diagnostics,
) -> R<WaveHeader> {
    let mut walker = ChunkWalker::new(source, file_size, padding, diagnostics)?;

    // Walk everything first so walker diagnostics precede the ones below
    let mut chunks = walker.by_ref().collect::<R<Vec<Chunk>>>()?.into_iter();

    let form = chunks.next().ok_or(WaveError::NotRiff)?;
    if !form.is(WAVE_FORMAT_ID) {
        return Err(WaveError::NotWave(form.tag_str()).into());
    }
    let declared_size = form.end;
    if declared_size != file_size.saturating_sub(8) {
        walker.diagnostics().warn(format!(
            "WAVE cksize is wrong: {} != {}",
            declared_size,
            file_size.saturating_sub(8)
        ));
    }

    let mut fmt: Option<Vec<u8>> = None;
    let mut data = None;
    for chunk in chunks {
        if chunk.is(FMT_CHUNK_ID) {
            if fmt.is_none() {
                fmt = Some(walker.read_span(chunk.begin..chunk.end)?);
            } else {
                walker.diagnostics().warn("fmt chunk after first ignored");
            }
        } else if chunk.is(DATA_CHUNK_ID) {
            if data.is_none() {
                data = Some(chunk);
            } else {
                walker.diagnostics().warn("data chunk after first ignored");
            }
        }
    }

    let data = data.ok_or(WaveError::MissingData)?;
    let fmt = fmt.ok_or(WaveError::MissingFmt)?;

    if !FMT_BLOCK_LENGTHS.contains(&fmt.len().saturating_sub(CHUNK_HEADER_SIZE)) {
        walker
            .diagnostics()
            .warn(format!("Weird fmt block length {}", fmt.len()));
    }

    let descriptor = FormatDescriptor::parse(&fmt)?;
    dprintln!("fmt: {:?}", descriptor);

    Ok(WaveHeader {
        descriptor,
        declared_size,
        data_begin: data.begin,
        data_end: data.end,
        file_size,
    })
}

/// [`parse_header`] plus validation of the encoding.
pub fn resolve<S: Read + Seek>(
    source: S,
    file_size: u64,
    padding: ChunkPadding,
    diagnostics: &mut Diagnostics,
) -> R<ResolvedFormat> {
    let header = parse_header(source, file_size, padding, diagnostics)?;
    let sample_type = header.descriptor.sample_type()?;
    Ok(ResolvedFormat {
        header,
        sample_type,
    })
}
