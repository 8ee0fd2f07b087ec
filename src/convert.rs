//! Rescaling samples from one element type to another.
//!
//! Integers map onto floats so that the full integer range covers
//! `[-1.0, 1.0]`; floats outside that range are clipped on the way back.

use crate::format::SampleType;
use crate::mapping::AudioMapping;
use crate::prelude::*;
use crate::sample::{Sample, Scalar};

fn as_f64(value: Scalar) -> f64 {
    match value {
        Scalar::Int(v) => v as f64,
        Scalar::Float(v) => v,
    }
}

fn as_i128(value: Scalar) -> i128 {
    match value {
        Scalar::Int(v) => v,
        Scalar::Float(v) => v as i128,
    }
}

/// Reduces `value` modulo the width of `to`, the way a fixed-width cast does.
fn wrap(value: i128, to: SampleType) -> i128 {
    let bits = to.bits() as u32;
    let modulus = 1i128 << bits;
    let v = value.rem_euclid(modulus);
    if to.is_signed() && v >= modulus / 2 {
        v - modulus
    } else {
        v
    }
}

/// Converts one sample between element types.
pub fn convert_sample(value: Scalar, from: SampleType, to: SampleType) -> Scalar {
    if from == to {
        return value;
    }

    match (from.int_range(), to.int_range()) {
        // float -> float
        (None, None) => Scalar::Float(as_f64(value)),

        // int -> float
        (Some((min, max)), None) => {
            let (min, max) = (min as f64, max as f64);
            let x = as_f64(value);
            Scalar::Float(x * 2.0 / (max - min) - (max + min) / (max - min))
        }

        // float -> int
        (None, Some((min, max))) => {
            let (lo, hi) = (min as f64, max as f64);
            let x = (hi - lo) / 2.0 * as_f64(value) + (hi + lo) / 2.0;
            let x = x.clamp(lo, hi).round_ties_even();
            Scalar::Int((x as i128).clamp(min, max))
        }

        // int -> int
        (Some((from_min, _)), Some((to_min, to_max))) => {
            let delta = 8 * (to.size() as i32 - from.size() as i32);
            let mut v = as_i128(value);
            if delta < 0 {
                v >>= -delta;
            } else if delta > 0 {
                // Centre the widened value so 0x80..0x7f spans the full range
                v = (v << delta) + (1 << (delta - 1));
            }
            if (from_min == 0) != (to_min == 0) {
                v += if to_min != 0 { to_min } else { 1 + to_max / 2 };
            }
            Scalar::Int(wrap(v, to))
        }
    }
}

/// Converts a whole slice, in parallel.
pub fn convert<S: Sample, D: Sample>(src: &[S]) -> Vec<D> {
    src.par_iter()
        .map(|&s| D::from_scalar(convert_sample(s.to_scalar(), S::TYPE, D::TYPE)))
        .collect()
}

fn read_scalar(sample_type: SampleType, bytes: &[u8]) -> Scalar {
    match sample_type {
        SampleType::U8 => u8::read_le(bytes).to_scalar(),
        SampleType::I16 => i16::read_le(bytes).to_scalar(),
        SampleType::I32 => i32::read_le(bytes).to_scalar(),
        SampleType::I64 => i64::read_le(bytes).to_scalar(),
        SampleType::F32 => f32::read_le(bytes).to_scalar(),
        SampleType::F64 => f64::read_le(bytes).to_scalar(),
    }
}

/// Copies every sample of `mapping` out as `D`, interleaved.
pub fn convert_mapping<D: Sample>(mapping: &AudioMapping) -> R<Vec<D>> {
    let from = mapping.sample_type();
    Ok(mapping
        .bytes()
        .par_chunks_exact(from.size())
        .map(|b| D::from_scalar(convert_sample(read_scalar(from, b), from, D::TYPE)))
        .collect())
}

pub trait FloatSample: Sample {
    fn magnitude(self) -> f64;
    fn scaled(self, by: f64) -> Self;
}

impl FloatSample for f32 {
    fn magnitude(self) -> f64 {
        self.abs() as f64
    }

    fn scaled(self, by: f64) -> Self {
        (self as f64 * by) as f32
    }
}

impl FloatSample for f64 {
    fn magnitude(self) -> f64 {
        self.abs()
    }

    fn scaled(self, by: f64) -> Self {
        self * by
    }
}

/// Scales `samples` so the loudest one has magnitude 1.
pub fn normalize<F: FloatSample>(samples: &mut [F]) {
    rescale(samples, true)
}

/// Like [`normalize`], but leaves quiet signals alone.
pub fn prevent_clipping<F: FloatSample>(samples: &mut [F]) {
    rescale(samples, false)
}

fn rescale<F: FloatSample>(samples: &mut [F], always: bool) {
    let level = samples
        .par_iter()
        .map(|s| s.magnitude())
        .reduce(|| 0.0, f64::max);
    if level > 0.0 && (always || level > 1.0) {
        samples
            .par_iter_mut()
            .for_each(|s| *s = s.scaled(1.0 / level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::WriteRequest;

    #[test]
    fn test_int_to_float() {
        let out: Vec<f32> = convert(&[i16::MIN, i16::MAX]);
        assert_eq!(out, vec![-1.0, 1.0]);

        let out: Vec<f64> = convert(&[0u8, 255]);
        assert_eq!(out, vec![-1.0, 1.0]);
    }

    #[test]
    fn test_float_to_int() {
        let out: Vec<i16> = convert(&[-1.0f32, 1.0, 0.0, 2.0, -7.5]);
        assert_eq!(out, vec![i16::MIN, i16::MAX, 0, i16::MAX, i16::MIN]);

        let out: Vec<u8> = convert(&[-1.0f64, 1.0]);
        assert_eq!(out, vec![0, 255]);
    }

    #[test]
    fn test_float_to_float() {
        let out: Vec<f32> = convert(&[0.5f64, -0.25]);
        assert_eq!(out, vec![0.5, -0.25]);
    }

    #[test]
    fn test_widening_ints() {
        let out: Vec<i32> = convert(&[1i16, -1, 0]);
        assert_eq!(out, vec![98304, -32768, 32768]);

        let out: Vec<i16> = convert(&[0u8, 128, 255]);
        assert_eq!(out, vec![-32640, 128, 32640]);
    }

    #[test]
    fn test_narrowing_ints() {
        let out: Vec<i16> = convert(&[98304i32, -65536]);
        assert_eq!(out, vec![1, -1]);

        let out: Vec<u8> = convert(&[i16::MIN, i16::MAX, 0]);
        assert_eq!(out, vec![0, 255, 128]);
    }

    #[test]
    fn test_same_type_is_identity() {
        let out: Vec<i64> = convert(&[i64::MIN, 3, i64::MAX]);
        assert_eq!(out, vec![i64::MIN, 3, i64::MAX]);
    }

    #[test]
    fn test_normalize() {
        let mut s = vec![0.25f32, -0.5];
        normalize(&mut s);
        assert_eq!(s, vec![0.5, -1.0]);

        let mut s = vec![0.25f64, -0.5];
        prevent_clipping(&mut s);
        assert_eq!(s, vec![0.25, -0.5]);

        let mut s = vec![4.0f64, -2.0];
        prevent_clipping(&mut s);
        assert_eq!(s, vec![1.0, -0.5]);

        let mut silent = vec![0.0f32; 3];
        normalize(&mut silent);
        assert_eq!(silent, vec![0.0; 3]);
    }

    #[test]
    fn test_convert_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = AudioMapping::create(
            dir.path().join("c.wav"),
            &WriteRequest::new(SampleType::I16, Shape::One(3)),
        )
        .unwrap();
        m.samples_mut::<i16>()
            .unwrap()
            .copy_from_slice(&[i16::MIN, 0, i16::MAX])
            .unwrap();
        let out: Vec<f64> = convert_mapping(&m).unwrap();
        assert_eq!(out[0], -1.0);
        assert_eq!(out[2], 1.0);
        assert!(out[1].abs() < 1e-4);
    }
}
