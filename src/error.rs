use std::path::PathBuf;

use thiserror::Error;

use crate::format::SampleType;

/// Fatal conditions that abort parsing or mapping.
///
/// These travel inside [`anyhow::Error`]; use
/// `err.downcast_ref::<WaveError>()` to classify a failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WaveError {
    #[error("Not a RIFF file")]
    NotRiff,

    #[error("Not a WAVE file: {0:?}")]
    NotWave(String),

    #[error("No fmt chunk found")]
    MissingFmt,

    #[error("No data chunk found")]
    MissingData,

    #[error("fmt chunk too small: {0} bytes")]
    ShortFmt(usize),

    #[error("Unsupported format tag {0:#06x}")]
    UnsupportedFormat(u16),

    #[error("Cannot mmap wBitsPerSample={bits} (float: {float})")]
    UnsupportedBitDepth { bits: u16, float: bool },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Bad order {0:?}")]
    BadOrder(String),

    #[error("Bad shape: {0}")]
    BadShape(String),

    #[error("Mapping is read-only")]
    ReadOnly,

    #[error("Sample type mismatch: mapping holds {found}, asked for {expected}")]
    TypeMismatch {
        expected: SampleType,
        found: SampleType,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
}

/// Returns the [`WaveError`] carried by `err`, if any.
pub fn kind(err: &anyhow::Error) -> Option<&WaveError> {
    err.downcast_ref::<WaveError>()
}
