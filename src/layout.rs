//! Fixed-size little-endian record layouts for the RIFF/WAVE headers.
//!
//! A [`Layout`] is an ordered list of named fields. Layouts compose with
//! [`Layout::then`], which is how the complete PCM and non-PCM file headers
//! are assembled from the individual chunk records.
//!
//! See <http://www-mmsp.ece.mcgill.ca/Documents/AudioFormats/WAVE/WAVE.html>

use std::sync::LazyLock;

use crate::error::WaveError;
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U16,
    U32,
    /// Fixed-length byte string, zero padded on write.
    Bytes(usize),
}

pub const TAG: FieldKind = FieldKind::Bytes(4);

impl FieldKind {
    pub const fn size(self) -> usize {
        match self {
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::Bytes(n) => n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field { name, kind }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U16(u16),
    U32(u32),
    Bytes(Vec<u8>),
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(v: &[u8; N]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// Field values keyed by name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Record::set`].
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn u16(&self, name: &str) -> Option<u16> {
        match self.get(name)? {
            Value::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn u32(&self, name: &str) -> Option<u32> {
        match self.get(name)? {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    fields: Vec<Field>,
    size: usize,
}

impl Layout {
    pub fn new(fields: &[Field]) -> Self {
        let size = fields.iter().map(|f| f.kind.size()).sum();
        Self {
            fields: fields.to_vec(),
            size,
        }
    }

    /// Appends `other`'s fields after ours.
    ///
    /// Panics if a field name would appear twice; composite layouts are
    /// built once at startup so this is a construction error, not input.
    pub fn then(mut self, other: &Layout) -> Self {
        for f in &other.fields {
            assert!(
                self.fields.iter().all(|g| g.name != f.name),
                "duplicate field {} in composite layout",
                f.name
            );
        }
        let expected = self.size + other.size;
        self.fields.extend_from_slice(&other.fields);
        self.size = self.fields.iter().map(|f| f.kind.size()).sum();
        assert_eq!(self.size, expected);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Byte offset of the named field from the start of the layout.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for f in &self.fields {
            if f.name == name {
                return Some(offset);
            }
            offset += f.kind.size();
        }
        None
    }

    pub fn pack(&self, record: &Record) -> R<Vec<u8>> {
        let mut out = vec![0u8; self.size];
        self.pack_into(&mut out, 0, record)?;
        Ok(out)
    }

    /// Serializes every field of the layout into `buf` starting at `offset`.
    ///
    /// Missing fields and values whose type disagrees with the declared
    /// field kind are all reported together in one [`WaveError::Encoding`].
    pub fn pack_into(&self, buf: &mut [u8], offset: usize, record: &Record) -> R<()> {
        if buf.len() < offset + self.size {
            return Err(anyhow!(
                "buffer of {} bytes too small for {}-byte layout at offset {}",
                buf.len(),
                self.size,
                offset
            ));
        }

        let mut errors = Vec::new();
        let mut pos = offset;
        for f in &self.fields {
            let width = f.kind.size();
            let dst = &mut buf[pos..pos + width];
            match (f.kind, record.get(f.name)) {
                (_, None) => errors.push(format!("Unknown param {}", f.name)),
                (FieldKind::U16, Some(Value::U16(v))) => LittleEndian::write_u16(dst, *v),
                (FieldKind::U32, Some(Value::U32(v))) => LittleEndian::write_u32(dst, *v),
                (FieldKind::Bytes(n), Some(Value::Bytes(v))) if v.len() <= n => {
                    dst.fill(0);
                    dst[..v.len()].copy_from_slice(v);
                }
                (FieldKind::Bytes(n), Some(Value::Bytes(v))) => errors.push(format!(
                    "Bytes {} had {} bytes, expected at most {}",
                    f.name,
                    v.len(),
                    n
                )),
                (FieldKind::Bytes(_), Some(v)) => {
                    errors.push(format!("Bytes {} had value {:?}", f.name, v))
                }
                (_, Some(v)) => errors.push(format!("Integer {} had value {:?}", f.name, v)),
            }
            pos += width;
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WaveError::Encoding(errors.join(". ")).into())
        }
    }

    pub fn unpack_at(&self, buf: &[u8], offset: usize) -> R<Record> {
        if buf.len() < offset + self.size {
            return Err(anyhow!(
                "need {} bytes at offset {}, buffer has {}",
                self.size,
                offset,
                buf.len()
            ));
        }

        let mut record = Record::new();
        let mut pos = offset;
        for f in &self.fields {
            let width = f.kind.size();
            let src = &buf[pos..pos + width];
            let value = match f.kind {
                FieldKind::U16 => Value::U16(LittleEndian::read_u16(src)),
                FieldKind::U32 => Value::U32(LittleEndian::read_u32(src)),
                FieldKind::Bytes(_) => Value::Bytes(src.to_vec()),
            };
            record.set(f.name, value);
            pos += width;
        }
        Ok(record)
    }
}

// Chunk Structures
pub const CHUNK_HEADER_SIZE: usize = 8;

pub static CHUNK: LazyLock<Layout> =
    LazyLock::new(|| Layout::new(&[field("ckID", TAG), field("cksize", FieldKind::U32)]));

pub static RIFF: LazyLock<Layout> = LazyLock::new(|| {
    Layout::new(&[
        field("ckIDRiff", TAG),
        field("cksizeRiff", FieldKind::U32),
        field("WAVEID", TAG),
    ])
});

pub static FACT: LazyLock<Layout> = LazyLock::new(|| {
    Layout::new(&[
        field("ckIDFact", TAG),
        field("cksizeFact", FieldKind::U32),
        field("dwSampleLength", FieldKind::U32),
    ])
});

pub static DATA: LazyLock<Layout> = LazyLock::new(|| {
    Layout::new(&[field("ckIDData", TAG), field("cksizeData", FieldKind::U32)])
});

/// `fmt ` chunk header plus the 16-byte body every format shares.
pub static FMT_PCM: LazyLock<Layout> = LazyLock::new(|| {
    Layout::new(&[
        field("ckIDFmt", TAG),
        field("cksizeFmt", FieldKind::U32),
        field("wFormatTag", FieldKind::U16),
        field("nChannels", FieldKind::U16),
        field("nSamplesPerSec", FieldKind::U32),
        field("nAvgBytesPerSec", FieldKind::U32),
        field("nBlockAlign", FieldKind::U16),
        field("wBitsPerSample", FieldKind::U16),
    ])
});

pub static FMT_NON_PCM: LazyLock<Layout> =
    LazyLock::new(|| FMT_PCM.clone().then(&Layout::new(&[field("cbSize", FieldKind::U16)])));

pub static FMT_EXTENSIBLE: LazyLock<Layout> = LazyLock::new(|| {
    FMT_NON_PCM.clone().then(&Layout::new(&[
        field("wValidBitsPerSample", FieldKind::U16),
        field("dwChannelMask", TAG),
        field("SubFormat", FieldKind::Bytes(16)),
    ]))
});

/// The extension that follows the 16-byte body of an extensible `fmt `
/// chunk. The first two bytes of the sub-format GUID are the real tag.
pub static FMT_EXTENSION: LazyLock<Layout> = LazyLock::new(|| {
    Layout::new(&[
        field("cbSize", FieldKind::U16),
        field("wValidBitsPerSample", FieldKind::U16),
        field("dwChannelMask", TAG),
        field("wFormatTag", FieldKind::U16),
        field("subFormat", FieldKind::Bytes(14)),
    ])
});

/// Complete header of a PCM integer file.
pub static PCM: LazyLock<Layout> = LazyLock::new(|| RIFF.clone().then(&FMT_PCM).then(&DATA));

/// Complete header of an IEEE float file, which also carries a `fact` chunk.
pub static NON_PCM: LazyLock<Layout> =
    LazyLock::new(|| RIFF.clone().then(&FMT_NON_PCM).then(&FACT).then(&DATA));

pub static EXTENSIBLE: LazyLock<Layout> =
    LazyLock::new(|| RIFF.clone().then(&FMT_EXTENSIBLE).then(&DATA));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(CHUNK.size(), CHUNK_HEADER_SIZE);
        assert_eq!(RIFF.size(), 12);
        assert_eq!(FACT.size(), 12);
        assert_eq!(DATA.size(), 8);
        assert_eq!(FMT_PCM.size(), 24);
        assert_eq!(FMT_NON_PCM.size(), 26);
        assert_eq!(FMT_EXTENSIBLE.size(), 48);
        assert_eq!(FMT_EXTENSION.size(), 24);
        assert_eq!(PCM.size(), 44);
        assert_eq!(NON_PCM.size(), 58);
        assert_eq!(EXTENSIBLE.size(), 68);
    }

    #[test]
    fn test_composite_field_order() {
        let names: Vec<_> = PCM.fields().iter().map(|f| f.name).collect();
        assert_eq!(names[..3], ["ckIDRiff", "cksizeRiff", "WAVEID"]);
        assert_eq!(names.last(), Some(&"cksizeData"));
        assert_eq!(PCM.offset_of("ckIDFmt"), Some(12));
        assert_eq!(PCM.offset_of("ckIDData"), Some(36));
        assert_eq!(NON_PCM.offset_of("ckIDFact"), Some(38));
        assert_eq!(NON_PCM.offset_of("missing"), None);
    }

    #[test]
    #[should_panic(expected = "duplicate field")]
    fn test_duplicate_fields_rejected() {
        let _ = FMT_NON_PCM.clone().then(&FMT_EXTENSION);
    }

    #[test]
    fn test_pack_then_unpack() {
        let record = Record::new()
            .with("ckID", b"data")
            .with("cksize", 10u32);
        let bytes = CHUNK.pack(&record).unwrap();
        assert_eq!(bytes, b"data\x0a\x00\x00\x00");

        let back = CHUNK.unpack_at(&bytes, 0).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_unpack_at_offset() {
        let mut buf = vec![0xAAu8; 3];
        buf.extend_from_slice(b"fact\x04\x00\x00\x00\x10\x00\x00\x00");
        let record = FACT.unpack_at(&buf, 3).unwrap();
        assert_eq!(record.bytes("ckIDFact"), Some(&b"fact"[..]));
        assert_eq!(record.u32("cksizeFact"), Some(4));
        assert_eq!(record.u32("dwSampleLength"), Some(16));
        assert!(FACT.unpack_at(&buf, 4).is_err());
    }

    #[test]
    fn test_pack_type_mismatch() {
        let record = Record::new().with("ckID", 7u32).with("cksize", b"oops");
        let err = CHUNK.pack(&record).unwrap_err();
        match err.downcast_ref::<WaveError>() {
            Some(WaveError::Encoding(msg)) => {
                assert!(msg.contains("Bytes ckID"), "{msg}");
                assert!(msg.contains("Integer cksize"), "{msg}");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_pack_missing_field() {
        let record = Record::new().with("ckID", b"RIFF");
        let err = CHUNK.pack(&record).unwrap_err();
        assert_eq!(
            err.downcast_ref::<WaveError>(),
            Some(&WaveError::Encoding("Unknown param cksize".to_string()))
        );
    }

    #[test]
    fn test_short_byte_strings_are_zero_padded() {
        let layout = Layout::new(&[field("id", FieldKind::Bytes(6))]);
        let bytes = layout.pack(&Record::new().with("id", b"abc")).unwrap();
        assert_eq!(bytes, b"abc\0\0\0");
        assert!(layout.pack(&Record::new().with("id", b"toolong")).is_err());
    }
}
