pub use crate::dprintln; // Make the macro available
pub use crate::*;
pub use anyhow::{Result as R, anyhow};
pub use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

pub use memmap2::MmapOptions;
pub use rayon::prelude::*;
pub use std::io::{Cursor, Read, Seek, SeekFrom, Write};
