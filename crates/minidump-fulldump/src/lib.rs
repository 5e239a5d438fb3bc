#![forbid(unsafe_code)]

//! Rewrites a partial/filtered minidump into one with full, coalesced memory
//! ranges and all internal cross-references relocated consistently.
//!
//! The conversion is a single deterministic pass: phase 1 transforms or
//! copies every non-memory stream (deferring the memory range lists), phase 2
//! merges all memory ranges into one normalized Memory64List appended after
//! phase 1's directory entries. A failed run leaves no valid output.

mod merge;
mod transform;

#[cfg(test)]
mod proptests;

pub use crate::merge::{full_memory_flags, MergeStats};

use std::io::{Read, Seek, Write};

use minidump_format::{Dump, DumpWriter, Result, StreamKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Directory entries in the output.
    pub streams_written: usize,
    /// Memory merge outcome; `None` when the input carried no memory list.
    pub merge: Option<MergeStats>,
}

/// Convert a minidump into a full-memory dump.
///
/// `input` must be positioned anywhere (reads are absolute); `output` is
/// overwritten from offset 0. On success the finalized output handle is
/// returned alongside a conversion summary.
pub fn full_dumpize<R: Read + Seek, W: Write + Seek>(
    input: R,
    output: W,
) -> Result<(W, ConvertSummary)> {
    let mut dump = Dump::open(input)?;
    let streams = dump.streams();

    // The merged memory stream re-uses the slot(s) freed by the deferred
    // range lists, so the input stream count is an upper bound.
    let mut writer = DumpWriter::new(output, streams.len())?;
    writer.set_timestamp(dump.timestamp());
    writer.set_flags(merge::full_memory_flags(dump.flags()));

    let mut memory_list = None;
    let mut memory64_list = None;
    for entry in &streams {
        match entry.stream_kind {
            kind if kind == StreamKind::MEMORY_LIST => memory_list = Some(*entry),
            kind if kind == StreamKind::MEMORY64_LIST => memory64_list = Some(*entry),
            kind if kind == StreamKind::HANDLE_DATA => {
                transform::transform_handle_data(&mut dump, &mut writer, entry)?
            }
            kind if kind == StreamKind::UNLOADED_MODULE_LIST => {
                transform::transform_unloaded_modules(&mut dump, &mut writer, entry)?
            }
            kind if kind == StreamKind::SYSTEM_INFO => {
                transform::transform_system_info(&mut dump, &mut writer, entry)?
            }
            kind if kind == StreamKind::THREAD_LIST => {
                transform::transform_thread_list(&mut dump, &mut writer, entry)?
            }
            kind if kind == StreamKind::MODULE_LIST => {
                transform::transform_module_list(&mut dump, &mut writer, entry)?
            }
            _ => transform::copy_stream(&mut dump, &mut writer, entry)?,
        }
    }

    let merge = merge::merge_memory(&mut dump, &mut writer, memory_list, memory64_list)?;

    let streams_written = streams.len()
        - usize::from(memory_list.is_some())
        - usize::from(memory64_list.is_some())
        + usize::from(merge.is_some());
    let output = writer.close()?;
    Ok((
        output,
        ConvertSummary {
            streams_written,
            merge,
        },
    ))
}
