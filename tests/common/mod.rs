#![allow(dead_code)]

use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

pub const PCM: u16 = 0x0001;
pub const IEEE_FLOAT: u16 = 0x0003;
pub const ALAW: u16 = 0x0006;
pub const EXTENSIBLE: u16 = 0xFFFE;

pub fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
    out.extend_from_slice(body);
    out
}

pub fn fmt_body(tag: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
    let block = channels * bits / 8;
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(tag).unwrap();
    out.write_u16::<LittleEndian>(channels).unwrap();
    out.write_u32::<LittleEndian>(rate).unwrap();
    out.write_u32::<LittleEndian>(rate * block as u32).unwrap();
    out.write_u16::<LittleEndian>(block).unwrap();
    out.write_u16::<LittleEndian>(bits).unwrap();
    out
}

/// Wraps `chunks` in a RIFF/WAVE header with a correct size field.
pub fn riff(chunks: &[u8]) -> Vec<u8> {
    let mut out = b"RIFF".to_vec();
    out.write_u32::<LittleEndian>(4 + chunks.len() as u32).unwrap();
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(chunks);
    out
}

/// A canonical 44-byte-header file.
pub fn wav(tag: u16, channels: u16, rate: u32, bits: u16, data: &[u8]) -> Vec<u8> {
    let mut chunks = chunk(b"fmt ", &fmt_body(tag, channels, rate, bits));
    chunks.extend(chunk(b"data", data));
    riff(&chunks)
}

pub fn i16_bytes(values: &[i16]) -> Vec<u8> {
    let mut out = Vec::new();
    for &v in values {
        out.write_i16::<LittleEndian>(v).unwrap();
    }
    out
}

pub fn put(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
