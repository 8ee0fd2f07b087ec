pub mod chunks;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod layout;
pub mod mapping;
pub mod mmap;
pub mod sample;
pub mod shape;
use std::path::Path;

mod prelude;
use crate::prelude::*;

pub use diagnostics::Diagnostics;
pub use error::WaveError;
pub use format::SampleType;
pub use mapping::{AudioMapping, DEFAULT_SAMPLE_RATE, RawRequest, ReadOptions, WriteRequest};
pub use mmap::Mode;
pub use sample::{Sample, Samples, SamplesMut};
pub use shape::{Order, Shape};

pub fn debug_println(args: std::fmt::Arguments) {
    if cfg!(debug_assertions) {
        println!("{}", args);
    }
}

// Helper macro to use it like println!
#[macro_export]
macro_rules! dprintln {
    ($($arg:tt)*) => {
        $crate::debug_println(format_args!($($arg)*))
    };
}

/// Either map an existing file or create a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Read(ReadOptions),
    Write(WriteRequest),
}

impl From<ReadOptions> for Request {
    fn from(options: ReadOptions) -> Self {
        Request::Read(options)
    }
}

impl From<WriteRequest> for Request {
    fn from(request: WriteRequest) -> Self {
        Request::Write(request)
    }
}

pub fn open(
    path: impl AsRef<Path>,
    request: impl Into<Request>,
    diagnostics: &mut Diagnostics,
) -> R<AudioMapping> {
    match request.into() {
        Request::Read(options) => AudioMapping::open(path, &options, diagnostics),
        Request::Write(request) => AudioMapping::create(path, &request),
    }
}

/// Maps a file read-only with default options, warnings to stderr.
pub fn read(path: impl AsRef<Path>) -> R<AudioMapping> {
    open(path, ReadOptions::default(), &mut Diagnostics::default())
}

/// Duplicates the samples of `src` into a new file at `dst`.
pub fn copy(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> R<AudioMapping> {
    read(src)?.copy_to(dst)
}
