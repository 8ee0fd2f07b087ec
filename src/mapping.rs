//! `AudioMapping`: a WAVE file's samples, mapped straight from disk.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::chunks::{
    ChunkPadding, DATA_CHUNK_ID, FACT_CHUNK_ID, FMT_CHUNK_ID, RIFF_CHUNK_ID, WAVE_FORMAT_ID,
};
use crate::diagnostics::Diagnostics;
use crate::error::{WaveError, kind};
use crate::format::{SampleType, parse_header};
use crate::layout::{CHUNK_HEADER_SIZE, FMT_NON_PCM, FMT_PCM, NON_PCM, PCM, Record};
use crate::mmap::{MappedRegion, Mode, map_region};
use crate::prelude::*;
use crate::sample::{Sample, Samples, SamplesMut};
use crate::shape::{Order, Shape, read_layout, write_layout};

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// How to map an existing file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub mode: Mode,
    pub order: Order,
    /// Keep mono files two-dimensional.
    pub always_2d: bool,
    /// Map at most this many frames.
    pub frames: Option<usize>,
    pub padding: ChunkPadding,
    /// Map unsupported encodings as raw bytes instead of failing.
    pub raw_fallback: bool,
}

/// What to put in a new file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub sample_type: SampleType,
    pub shape: Shape,
    pub sample_rate: u32,
    /// `None` infers the order from the shape, making the smaller
    /// dimension the channel count. An explicit order decides which axis
    /// holds frames, so `Shape::Two(100, 2)` with [`Order::ColumnMajor`]
    /// is 100 channels of 2 frames.
    pub order: Option<Order>,
}

impl WriteRequest {
    pub fn new(sample_type: SampleType, shape: impl Into<Shape>) -> Self {
        Self {
            sample_type,
            shape: shape.into(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            order: None,
        }
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }
}

impl Default for WriteRequest {
    fn default() -> Self {
        Self::new(SampleType::I16, Shape::One(0))
    }
}

/// Header-less sample data at a known offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub sample_type: SampleType,
    pub channels: usize,
    /// Required with [`Mode::CreateNew`]; otherwise an upper bound.
    pub frames: Option<usize>,
    pub offset: u64,
    /// Bytes at the end of the file that are not samples.
    pub roffset: u64,
    pub order: Order,
    pub always_2d: bool,
    pub mode: Mode,
    pub sample_rate: u32,
}

impl Default for RawRequest {
    fn default() -> Self {
        Self {
            sample_type: SampleType::I16,
            channels: 1,
            frames: None,
            offset: 0,
            roffset: 0,
            order: Order::RowMajor,
            always_2d: false,
            mode: Mode::ReadOnly,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Interleaved samples of a mapped file, plus what is known about them.
///
/// Both orders share the on-disk layout: element `(frame, channel)` lives
/// at `frame * channels + channel`. [`Order`] only decides which axis of
/// [`AudioMapping::shape`] counts frames.
#[derive(Debug)]
pub struct AudioMapping {
    region: MappedRegion,
    path: PathBuf,
    sample_type: SampleType,
    shape: Shape,
    channels: usize,
    frames: usize,
    sample_rate: u32,
    roffset: u64,
}

impl AudioMapping {
    /// Maps the samples of an existing WAVE file.
    pub fn open(
        path: impl AsRef<Path>,
        options: &ReadOptions,
        diagnostics: &mut Diagnostics,
    ) -> R<Self> {
        let path = path.as_ref();
        if options.mode == Mode::CreateNew {
            return Err(anyhow!(
                "{}: new files are made with AudioMapping::create",
                path.display()
            ));
        }

        let header = {
            let file = File::open(path)?;
            let file_size = file.metadata()?.len();
            parse_header(BufReader::new(file), file_size, options.padding, diagnostics)?
        };

        let descriptor = &header.descriptor;
        let (sample_type, channels) = match descriptor.sample_type() {
            Ok(sample_type) => (sample_type, descriptor.channels as usize),
            Err(e)
                if options.raw_fallback
                    && matches!(
                        kind(&e),
                        Some(WaveError::UnsupportedFormat(_) | WaveError::UnsupportedBitDepth { .. })
                    ) =>
            {
                diagnostics.warn(format!(
                    "Mapping {}-bit format {:#06x} as raw bytes",
                    descriptor.bits_per_sample,
                    descriptor.effective_tag()
                ));
                (SampleType::U8, descriptor.block_align as usize)
            }
            Err(e) => return Err(e),
        };

        let layout = read_layout(
            header.data_len(),
            sample_type.size(),
            channels,
            options.frames,
            options.order,
            options.always_2d,
            diagnostics,
        )?;
        let roffset = header.roffset();

        let region = map_region(
            path,
            sample_type,
            options.mode,
            header.data_offset(),
            layout.shape,
            layout.order,
            roffset,
        )?;

        Ok(Self {
            region,
            path: path.to_path_buf(),
            sample_type,
            shape: layout.shape,
            channels: layout.channels,
            frames: layout.frames,
            sample_rate: descriptor.sample_rate,
            roffset,
        })
    }

    /// Creates a new WAVE file and maps its zeroed samples read-write.
    ///
    /// Integer types get a plain PCM header; float types get the non-PCM
    /// header with a `fact` chunk. An odd-sized data chunk is followed by
    /// one pad byte, which becomes the mapping's `roffset`.
    pub fn create(path: impl AsRef<Path>, request: &WriteRequest) -> R<Self> {
        let path = path.as_ref();
        let layout = write_layout(request.shape, request.order);
        if layout.channels == 0 {
            return Err(WaveError::BadShape(format!(
                "cannot write {} with no channels",
                request.shape
            ))
            .into());
        }

        let sample_type = request.sample_type;
        let too_wide = |what: &str| {
            WaveError::BadShape(format!("{} out of range for {}", what, request.shape))
        };
        let data_bytes = layout.byte_len(sample_type.size())?;
        let pad = data_bytes % 2;
        let block_align = sample_type
            .size()
            .checked_mul(layout.channels)
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| too_wide("block align"))?;

        let (header, fmt) = if sample_type.is_float() {
            (&*NON_PCM, &*FMT_NON_PCM)
        } else {
            (&*PCM, &*FMT_PCM)
        };
        let riff_size = data_bytes
            .checked_add(header.size() as u64 - CHUNK_HEADER_SIZE as u64 + pad)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                WaveError::BadShape(format!(
                    "{} {} samples do not fit in a WAVE file",
                    request.shape, sample_type
                ))
            })?;

        let record = Record::new()
            .with("ckIDRiff", RIFF_CHUNK_ID)
            .with("cksizeRiff", riff_size)
            .with("WAVEID", WAVE_FORMAT_ID)
            .with("ckIDFmt", FMT_CHUNK_ID)
            .with("cksizeFmt", (fmt.size() - CHUNK_HEADER_SIZE) as u32)
            .with("wFormatTag", sample_type.format_tag())
            .with(
                "nChannels",
                u16::try_from(layout.channels).map_err(|_| too_wide("channel count"))?,
            )
            .with("nSamplesPerSec", request.sample_rate)
            .with(
                "nAvgBytesPerSec",
                u32::try_from(request.sample_rate as u64 * block_align as u64)
                    .map_err(|_| too_wide("byte rate"))?,
            )
            .with("nBlockAlign", block_align)
            .with("wBitsPerSample", sample_type.bits())
            .with("cbSize", 0u16)
            .with("ckIDFact", FACT_CHUNK_ID)
            .with("cksizeFact", 4u32)
            .with(
                "dwSampleLength",
                u32::try_from(layout.channels * layout.frames)
                    .map_err(|_| too_wide("sample count"))?,
            )
            .with("ckIDData", DATA_CHUNK_ID)
            .with("cksizeData", data_bytes as u32);

        let mut region = map_region(
            path,
            sample_type,
            Mode::CreateNew,
            header.size() as u64,
            request.shape,
            layout.order,
            pad,
        )?;
        let file = region.file_bytes_mut().ok_or(WaveError::ReadOnly)?;
        header.pack_into(file, 0, &record)?;
        region.flush()?;

        dprintln!(
            "created {}: {} {} at {} Hz",
            path.display(),
            request.shape,
            sample_type,
            request.sample_rate
        );

        Ok(Self {
            region,
            path: path.to_path_buf(),
            sample_type,
            shape: request.shape,
            channels: layout.channels,
            frames: layout.frames,
            sample_rate: request.sample_rate,
            roffset: pad,
        })
    }

    /// Maps sample data that has no RIFF header at all.
    pub fn raw(
        path: impl AsRef<Path>,
        request: &RawRequest,
        diagnostics: &mut Diagnostics,
    ) -> R<Self> {
        let path = path.as_ref();
        let size = request.sample_type.size();

        let (shape, channels, frames) = if request.mode == Mode::CreateNew {
            let frames = request.frames.ok_or_else(|| {
                WaveError::BadShape("Must set a frame count in write mode".to_string())
            })?;
            if request.channels == 0 {
                return Err(
                    WaveError::BadShape("channel count must be positive".to_string()).into(),
                );
            }
            let shape = Shape::new(frames, request.channels, request.order, request.always_2d);
            (shape, request.channels, frames)
        } else {
            let file_size = std::fs::metadata(path)?.len();
            let available = request
                .offset
                .checked_add(request.roffset)
                .and_then(|reserved| file_size.checked_sub(reserved))
                .ok_or_else(|| {
                    anyhow!(
                        "{}: offset {} and roffset {} exceed file size {}",
                        path.display(),
                        request.offset,
                        request.roffset,
                        file_size
                    )
                })?;
            let layout = read_layout(
                available,
                size,
                request.channels,
                request.frames,
                request.order,
                request.always_2d,
                diagnostics,
            )?;
            (layout.shape, layout.channels, layout.frames)
        };

        let region = map_region(
            path,
            request.sample_type,
            request.mode,
            request.offset,
            shape,
            request.order,
            request.roffset,
        )?;

        Ok(Self {
            region,
            path: path.to_path_buf(),
            sample_type: request.sample_type,
            shape,
            channels,
            frames,
            sample_rate: request.sample_rate,
            roffset: request.roffset,
        })
    }

    /// Creates an empty file whose type, shape, order and sample rate
    /// match `src`. Never overwrites an existing file.
    pub fn new_like(path: impl AsRef<Path>, src: &AudioMapping, sample_rate: Option<u32>) -> R<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(WaveError::AlreadyExists(path.to_path_buf()).into());
        }
        let request = WriteRequest {
            sample_type: src.sample_type,
            shape: src.shape,
            sample_rate: sample_rate.unwrap_or(src.sample_rate),
            order: Some(src.order()),
        };
        Self::create(path, &request)
    }

    /// Writes a new file holding a copy of these samples and returns its
    /// mapping.
    pub fn copy_to(&self, path: impl AsRef<Path>) -> R<Self> {
        let mut out = Self::new_like(path, self, None)?;
        out.copy_from(self)?;
        out.flush()?;
        Ok(out)
    }

    /// Copies every sample of `src` into this mapping.
    ///
    /// Types must match exactly and shapes must be equal. When the two
    /// sides disagree about which axis holds frames, elements are moved
    /// one by one so that `self[i][j] == src[i][j]` still holds.
    pub fn copy_from(&mut self, src: &AudioMapping) -> R<()> {
        if src.sample_type != self.sample_type {
            return Err(WaveError::TypeMismatch {
                expected: self.sample_type,
                found: src.sample_type,
            }
            .into());
        }
        if src.shape != self.shape {
            return Err(WaveError::ShapeMismatch(format!(
                "cannot copy {} into {}",
                src.shape, self.shape
            ))
            .into());
        }

        let size = self.sample_type.size();
        let (channels, order) = (self.channels, self.order());
        let (src_channels, src_order) = (src.channels, src.order());
        let same_layout = order == src_order || matches!(self.shape, Shape::One(_));

        let dst = self.writable_bytes()?;
        let from = src.region.bytes();

        if same_layout {
            dst.copy_from_slice(from);
            return Ok(());
        }

        dst.par_chunks_exact_mut(size)
            .enumerate()
            .for_each(|(index, slot)| {
                let (frame, channel) = (index / channels, index % channels);
                let (row, col) = match order {
                    Order::RowMajor => (frame, channel),
                    Order::ColumnMajor => (channel, frame),
                };
                let (src_frame, src_channel) = match src_order {
                    Order::RowMajor => (row, col),
                    Order::ColumnMajor => (col, row),
                };
                let at = (src_frame * src_channels + src_channel) * size;
                slot.copy_from_slice(&from[at..at + size]);
            });
        Ok(())
    }

    fn writable_bytes(&mut self) -> R<&mut [u8]> {
        if !self.mode().is_writable() {
            return Err(WaveError::ReadOnly.into());
        }
        Ok(self.region.bytes_mut().ok_or(WaveError::ReadOnly)?)
    }

    fn check_type<T: Sample>(&self) -> R<()> {
        if T::TYPE == self.sample_type {
            Ok(())
        } else {
            Err(WaveError::TypeMismatch {
                expected: T::TYPE,
                found: self.sample_type,
            }
            .into())
        }
    }

    /// Typed view of the samples. `T` must be exactly the mapped type.
    pub fn samples<T: Sample>(&self) -> R<Samples<'_, T>> {
        self.check_type::<T>()?;
        Samples::new(self.region.bytes(), self.frames, self.channels)
    }

    pub fn samples_mut<T: Sample>(&mut self) -> R<SamplesMut<'_, T>> {
        self.check_type::<T>()?;
        let (frames, channels) = (self.frames, self.channels);
        SamplesMut::new(self.writable_bytes()?, frames, channels)
    }

    pub fn get<T: Sample>(&self, frame: usize, channel: usize) -> R<Option<T>> {
        Ok(self.samples::<T>()?.get(frame, channel))
    }

    pub fn set<T: Sample>(&mut self, frame: usize, channel: usize, value: T) -> R<()> {
        self.samples_mut::<T>()?.set(frame, channel, value)
    }

    pub fn frame<T: Sample>(&self, frame: usize) -> R<Option<Vec<T>>> {
        Ok(self.samples::<T>()?.frame(frame))
    }

    pub fn channel<T: Sample>(&self, channel: usize) -> R<Option<Vec<T>>> {
        Ok(self.samples::<T>()?.channel(channel))
    }

    /// Every sample, interleaved.
    pub fn to_vec<T: Sample>(&self) -> R<Vec<T>> {
        Ok(self.samples::<T>()?.to_vec())
    }

    pub fn bytes(&self) -> &[u8] {
        self.region.bytes()
    }

    pub fn bytes_mut(&mut self) -> R<&mut [u8]> {
        self.writable_bytes()
    }

    pub fn flush(&self) -> R<()> {
        self.region.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        self.region.mode()
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn dims(&self) -> Vec<usize> {
        self.shape.dims()
    }

    pub fn order(&self) -> Order {
        self.region.order()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// File offset of the first sample byte.
    pub fn offset(&self) -> u64 {
        self.region.offset() as u64
    }

    /// Bytes in the file after the sample data.
    pub fn roffset(&self) -> u64 {
        self.roffset
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames as f64 / self.sample_rate as f64
        }
    }
}
