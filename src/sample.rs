//! Typed little-endian access to interleaved sample bytes.
//!
//! Sample data sits at arbitrary file offsets (58 bytes into a float file,
//! for one), so elements are decoded with `byteorder` rather than by
//! reinterpreting the mapping as a `&[T]`.

use std::fmt;
use std::marker::PhantomData;

use crate::format::SampleType;
use crate::prelude::*;

/// A value in the widest representation of its family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i128),
    Float(f64),
}

pub trait Sample: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    const TYPE: SampleType;

    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, bytes: &mut [u8]);

    fn to_scalar(self) -> Scalar;
    /// Saturates integers; truncates toward zero from floats.
    fn from_scalar(value: Scalar) -> Self;
}

macro_rules! int_sample {
    ($t:ty, $variant:ident, $read:expr, $write:expr) => {
        impl Sample for $t {
            const TYPE: SampleType = SampleType::$variant;

            fn read_le(bytes: &[u8]) -> Self {
                $read(bytes)
            }

            fn write_le(self, bytes: &mut [u8]) {
                $write(bytes, self)
            }

            fn to_scalar(self) -> Scalar {
                Scalar::Int(self as i128)
            }

            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => v.clamp(<$t>::MIN as i128, <$t>::MAX as i128) as $t,
                    Scalar::Float(v) => v as $t,
                }
            }
        }
    };
}

macro_rules! float_sample {
    ($t:ty, $variant:ident, $read:expr, $write:expr) => {
        impl Sample for $t {
            const TYPE: SampleType = SampleType::$variant;

            fn read_le(bytes: &[u8]) -> Self {
                $read(bytes)
            }

            fn write_le(self, bytes: &mut [u8]) {
                $write(bytes, self)
            }

            fn to_scalar(self) -> Scalar {
                Scalar::Float(self as f64)
            }

            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => v as $t,
                    Scalar::Float(v) => v as $t,
                }
            }
        }
    };
}

int_sample!(u8, U8, |b: &[u8]| b[0], |b: &mut [u8], v: u8| b[0] = v);
int_sample!(i16, I16, LittleEndian::read_i16, LittleEndian::write_i16);
int_sample!(i32, I32, LittleEndian::read_i32, LittleEndian::write_i32);
int_sample!(i64, I64, LittleEndian::read_i64, LittleEndian::write_i64);
float_sample!(f32, F32, LittleEndian::read_f32, LittleEndian::write_f32);
float_sample!(f64, F64, LittleEndian::read_f64, LittleEndian::write_f64);

fn element_index(frame: usize, channel: usize, frames: usize, channels: usize) -> Option<usize> {
    (frame < frames && channel < channels).then(|| frame * channels + channel)
}

/// Read-only typed view over interleaved sample bytes.
#[derive(Clone, Copy)]
pub struct Samples<'a, T> {
    bytes: &'a [u8],
    frames: usize,
    channels: usize,
    _type: PhantomData<T>,
}

impl<'a, T: Sample> Samples<'a, T> {
    /// `bytes` must hold exactly `frames * channels` elements.
    pub fn new(bytes: &'a [u8], frames: usize, channels: usize) -> R<Self> {
        let expected = frames * channels * T::TYPE.size();
        if bytes.len() != expected {
            return Err(anyhow!(
                "{} bytes cannot hold {} x {} {}",
                bytes.len(),
                frames,
                channels,
                T::TYPE
            ));
        }
        Ok(Self {
            bytes,
            frames,
            channels,
            _type: PhantomData,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.frames * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index` in interleaved order.
    pub fn at(&self, index: usize) -> Option<T> {
        let size = T::TYPE.size();
        self.bytes
            .get(index * size..(index + 1) * size)
            .map(T::read_le)
    }

    pub fn get(&self, frame: usize, channel: usize) -> Option<T> {
        self.at(element_index(frame, channel, self.frames, self.channels)?)
    }

    pub fn frame(&self, frame: usize) -> Option<Vec<T>> {
        (frame < self.frames).then(|| {
            (0..self.channels)
                .filter_map(|c| self.get(frame, c))
                .collect()
        })
    }

    pub fn channel(&self, channel: usize) -> Option<Vec<T>> {
        (channel < self.channels).then(|| {
            self.bytes
                .par_chunks_exact(T::TYPE.size() * self.channels)
                .map(|frame| T::read_le(&frame[channel * T::TYPE.size()..]))
                .collect()
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        self.bytes.chunks_exact(T::TYPE.size()).map(T::read_le)
    }

    /// All samples, interleaved.
    pub fn to_vec(&self) -> Vec<T> {
        self.bytes
            .par_chunks_exact(T::TYPE.size())
            .map(T::read_le)
            .collect()
    }
}

impl<T: Sample> fmt::Debug for Samples<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Samples")
            .field("type", &T::TYPE)
            .field("frames", &self.frames)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Writable typed view; writes land directly in the mapping.
pub struct SamplesMut<'a, T> {
    bytes: &'a mut [u8],
    frames: usize,
    channels: usize,
    _type: PhantomData<T>,
}

impl<'a, T: Sample> SamplesMut<'a, T> {
    pub fn new(bytes: &'a mut [u8], frames: usize, channels: usize) -> R<Self> {
        let expected = frames * channels * T::TYPE.size();
        if bytes.len() != expected {
            return Err(anyhow!(
                "{} bytes cannot hold {} x {} {}",
                bytes.len(),
                frames,
                channels,
                T::TYPE
            ));
        }
        Ok(Self {
            bytes,
            frames,
            channels,
            _type: PhantomData,
        })
    }

    pub fn as_samples(&self) -> Samples<'_, T> {
        Samples {
            bytes: self.bytes,
            frames: self.frames,
            channels: self.channels,
            _type: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.frames * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, frame: usize, channel: usize) -> Option<T> {
        self.as_samples().get(frame, channel)
    }

    pub fn set(&mut self, frame: usize, channel: usize, value: T) -> R<()> {
        let index = element_index(frame, channel, self.frames, self.channels).ok_or_else(|| {
            anyhow!(
                "sample ({}, {}) out of range for {} frames x {} channels",
                frame,
                channel,
                self.frames,
                self.channels
            )
        })?;
        let size = T::TYPE.size();
        value.write_le(&mut self.bytes[index * size..(index + 1) * size]);
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.bytes
            .par_chunks_exact_mut(T::TYPE.size())
            .for_each(|slot| value.write_le(slot));
    }

    /// Overwrites every sample from an interleaved slice of equal length.
    pub fn copy_from_slice(&mut self, src: &[T]) -> R<()> {
        if src.len() != self.len() {
            return Err(anyhow!(
                "cannot copy {} samples into a view of {}",
                src.len(),
                self.len()
            ));
        }
        self.bytes
            .par_chunks_exact_mut(T::TYPE.size())
            .zip(src.par_iter())
            .for_each(|(slot, &v)| v.write_le(slot));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_access() {
        // Two frames of stereo i16: (1, -1), (300, -300)
        let mut bytes = Vec::new();
        for v in [1i16, -1, 300, -300] {
            bytes.write_i16::<LittleEndian>(v).unwrap();
        }
        let s = Samples::<i16>::new(&bytes, 2, 2).unwrap();
        assert_eq!(s.get(1, 0), Some(300));
        assert_eq!(s.get(0, 1), Some(-1));
        assert_eq!(s.get(2, 0), None);
        assert_eq!(s.get(0, 2), None);
        assert_eq!(s.frame(1), Some(vec![300, -300]));
        assert_eq!(s.channel(1), Some(vec![-1, -300]));
        assert_eq!(s.channel(2), None);
        assert_eq!(s.to_vec(), vec![1, -1, 300, -300]);
        assert_eq!(s.iter().count(), 4);
    }

    #[test]
    fn test_size_must_match() {
        let bytes = [0u8; 7];
        assert!(Samples::<i16>::new(&bytes, 2, 2).is_err());
        assert!(Samples::<u8>::new(&bytes, 7, 1).is_ok());
    }

    #[test]
    fn test_unaligned_floats() {
        let mut bytes = vec![0u8; 3];
        bytes.write_f32::<LittleEndian>(0.25).unwrap();
        bytes.write_f32::<LittleEndian>(-1.5).unwrap();
        let s = Samples::<f32>::new(&bytes[3..], 2, 1).unwrap();
        assert_eq!(s.to_vec(), vec![0.25, -1.5]);
    }

    #[test]
    fn test_writes() {
        let mut bytes = vec![0u8; 16];
        let mut s = SamplesMut::<i32>::new(&mut bytes, 2, 2).unwrap();
        s.fill(7);
        s.set(1, 1, -9).unwrap();
        assert!(s.set(2, 0, 1).is_err());
        assert_eq!(s.as_samples().to_vec(), vec![7, 7, 7, -9]);

        s.copy_from_slice(&[1, 2, 3, 4]).unwrap();
        assert!(s.copy_from_slice(&[1, 2]).is_err());
        assert_eq!(s.get(1, 0), Some(3));
        assert_eq!(&bytes[12..], &4i32.to_le_bytes());
    }

    #[test]
    fn test_scalar_saturation() {
        assert_eq!(i16::from_scalar(Scalar::Int(40000)), i16::MAX);
        assert_eq!(u8::from_scalar(Scalar::Int(-3)), 0);
        assert_eq!(i64::from_scalar(Scalar::Int(i64::MAX as i128 + 1)), i64::MAX);
        assert_eq!(f32::from_scalar(Scalar::Int(-2)), -2.0);
        assert_eq!(200u8.to_scalar(), Scalar::Int(200));
    }
}
