//! Thin layer over `memmap2`: maps a file and remembers which slice of it
//! holds the samples.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::str::FromStr;

use memmap2::{Mmap, MmapMut};

use crate::format::SampleType;
use crate::prelude::*;
use crate::shape::{Order, Shape};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    ReadOnly,
    /// Writes go straight to the file.
    ReadWrite,
    /// Writes stay in memory and never reach the file.
    CopyOnWrite,
    /// Create (or truncate) the file, then map it read-write.
    CreateNew,
}

impl Mode {
    pub fn is_writable(self) -> bool {
        !matches!(self, Mode::ReadOnly)
    }
}

/// numpy.memmap mode strings.
impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> R<Self> {
        match s {
            "r" | "readonly" => Ok(Mode::ReadOnly),
            "r+" | "readwrite" => Ok(Mode::ReadWrite),
            "c" | "copyonwrite" => Ok(Mode::CopyOnWrite),
            "w" | "w+" | "write" => Ok(Mode::CreateNew),
            _ => Err(anyhow!("Unknown mode {:?}", s)),
        }
    }
}

#[derive(Debug)]
enum Buffer {
    ReadOnly(Mmap),
    Writable(MmapMut),
}

/// A mapped file plus the byte window the samples occupy.
#[derive(Debug)]
pub struct MappedRegion {
    buffer: Buffer,
    mode: Mode,
    offset: usize,
    len: usize,
    order: Order,
}

impl MappedRegion {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// The whole mapped file.
    pub fn file_bytes(&self) -> &[u8] {
        match &self.buffer {
            Buffer::ReadOnly(m) => &m[..],
            Buffer::Writable(m) => &m[..],
        }
    }

    pub fn file_bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.buffer {
            Buffer::ReadOnly(_) => None,
            Buffer::Writable(m) => Some(&mut m[..]),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.file_bytes()[self.offset..self.offset + self.len]
    }

    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        let (offset, len) = (self.offset, self.len);
        self.file_bytes_mut().map(|b| &mut b[offset..offset + len])
    }

    /// Pushes pending writes to disk. A no-op unless writes reach the file.
    pub fn flush(&self) -> R<()> {
        match (&self.buffer, self.mode) {
            (Buffer::Writable(m), Mode::ReadWrite | Mode::CreateNew) => Ok(m.flush()?),
            _ => Ok(()),
        }
    }
}

/// Maps `shape` elements of `sample_type` starting `offset` bytes into the
/// file at `path`, with `roffset` bytes expected after them.
///
/// In [`Mode::CreateNew`] the file is created with exactly
/// `offset + data + roffset` bytes, all zero.
pub fn map_region(
    path: &Path,
    sample_type: SampleType,
    mode: Mode,
    offset: u64,
    shape: Shape,
    order: Order,
    roffset: u64,
) -> R<MappedRegion> {
    let len = shape
        .checked_len()
        .and_then(|n| n.checked_mul(sample_type.size()))
        .map(|n| n as u64);
    let needed = len.and_then(|len| offset.checked_add(len)?.checked_add(roffset));
    let (Some(len), Some(needed)) = (len, needed) else {
        return Err(anyhow!(
            "{}: {} {} at offset {} with roffset {} is out of range",
            path.display(),
            shape,
            sample_type,
            offset,
            roffset
        ));
    };

    let buffer = match mode {
        Mode::CreateNew => {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            file.set_len(needed)?;
            Buffer::Writable(unsafe { MmapOptions::new().map_mut(&file)? })
        }
        Mode::ReadOnly | Mode::ReadWrite | Mode::CopyOnWrite => {
            let file = if mode == Mode::ReadWrite {
                OpenOptions::new().read(true).write(true).open(path)?
            } else {
                File::open(path)?
            };
            let file_size = file.metadata()?.len();
            if needed > file_size {
                return Err(anyhow!(
                    "{} is {} bytes, mapping needs {}",
                    path.display(),
                    file_size,
                    needed
                ));
            }
            if file_size == 0 {
                return Err(anyhow!("cannot map empty file {}", path.display()));
            }
            match mode {
                Mode::ReadWrite => Buffer::Writable(unsafe { MmapOptions::new().map_mut(&file)? }),
                Mode::CopyOnWrite => Buffer::Writable(unsafe { MmapOptions::new().map_copy(&file)? }),
                _ => Buffer::ReadOnly(unsafe { MmapOptions::new().map(&file)? }),
            }
        }
    };

    dprintln!(
        "mapped {} ({:?}): {} {} at {}..{}",
        path.display(),
        mode,
        shape,
        sample_type,
        offset,
        offset + len
    );

    Ok(MappedRegion {
        buffer,
        mode,
        offset: offset as usize,
        len: len as usize,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_tokens() {
        assert_eq!("r".parse::<Mode>().unwrap(), Mode::ReadOnly);
        assert_eq!("r+".parse::<Mode>().unwrap(), Mode::ReadWrite);
        assert_eq!("c".parse::<Mode>().unwrap(), Mode::CopyOnWrite);
        assert_eq!("w+".parse::<Mode>().unwrap(), Mode::CreateNew);
        assert!("x".parse::<Mode>().is_err());
        assert!(!Mode::ReadOnly.is_writable());
        assert!(Mode::CopyOnWrite.is_writable());
    }

    #[test]
    fn test_create_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.bin");

        let mut region = map_region(
            &path,
            SampleType::I16,
            Mode::CreateNew,
            4,
            Shape::One(3),
            Order::RowMajor,
            2,
        )
        .unwrap();
        assert_eq!(region.file_bytes().len(), 12);
        region.bytes_mut().unwrap().copy_from_slice(&[1, 0, 2, 0, 3, 0]);
        region.flush().unwrap();
        drop(region);

        let region = map_region(
            &path,
            SampleType::I16,
            Mode::ReadOnly,
            4,
            Shape::One(3),
            Order::RowMajor,
            2,
        )
        .unwrap();
        assert_eq!(region.bytes(), &[1, 0, 2, 0, 3, 0]);
        assert_eq!(std::fs::read(&path).unwrap()[4..10], [1, 0, 2, 0, 3, 0]);
    }

    #[test]
    fn test_copy_on_write_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cow.bin");
        std::fs::write(&path, [9u8; 8]).unwrap();

        let mut region = map_region(
            &path,
            SampleType::U8,
            Mode::CopyOnWrite,
            0,
            Shape::One(8),
            Order::RowMajor,
            0,
        )
        .unwrap();
        region.bytes_mut().unwrap()[0] = 1;
        region.flush().unwrap();
        assert_eq!(region.bytes()[0], 1);
        assert_eq!(std::fs::read(&path).unwrap(), vec![9u8; 8]);
    }

    #[test]
    fn test_read_only_has_no_mutable_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.bin");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let mut region = map_region(
            &path,
            SampleType::U8,
            Mode::ReadOnly,
            1,
            Shape::One(2),
            Order::RowMajor,
            1,
        )
        .unwrap();
        assert!(region.bytes_mut().is_none());
        assert!(
            map_region(
                &path,
                SampleType::U8,
                Mode::ReadOnly,
                1,
                Shape::One(4),
                Order::RowMajor,
                0
            )
            .is_err()
        );
    }

    #[test]
    fn test_out_of_range_window_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.bin");
        std::fs::write(&path, [0u8; 8]).unwrap();

        let map = |offset, shape, roffset| {
            map_region(
                &path,
                SampleType::I16,
                Mode::ReadOnly,
                offset,
                shape,
                Order::RowMajor,
                roffset,
            )
        };
        assert!(map(u64::MAX, Shape::One(4), 1).is_err());
        assert!(map(0, Shape::Two(usize::MAX, 2), 0).is_err());
        assert!(map(0, Shape::One(usize::MAX), 0).is_err());
        assert_eq!(map(0, Shape::One(4), 0).unwrap().len(), 8);
    }
}
