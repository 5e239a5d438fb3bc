#![forbid(unsafe_code)]

//! Codec for the minidump crash-dump container: fixed-layout records, a
//! validating reader with bounded per-stream views, and an append-oriented
//! writer with directory placeholders and an out-of-band allocator.

mod error;
mod format;
pub mod io;
mod reader;
mod records;
mod writer;

pub use crate::error::{DumpError, Result};
pub use crate::format::{DumpFlags, StreamKind, FORMAT_VERSION, SIGNATURE};
pub use crate::reader::{Dump, SubStream};
pub use crate::records::{
    DirectoryEntry, FixedFileInfo, HandleDataHeader, HandleDescriptor, LocationDescriptor,
    Memory64ListHeader, MemoryDescriptor, MemoryDescriptor64, MinidumpHeader, Module, Record,
    SystemInfo, Thread, UnloadedModule, UnloadedModuleListHeader,
};
pub use crate::writer::{DumpWriter, StreamHandle};
