//! Memory range collection, coalescing, and re-emission.
//!
//! Input dumps describe captured memory as either a 32-bit range list (each
//! range carries its own payload locator) or a 64-bit range list (payloads
//! packed contiguously behind one base offset), or both. All ranges are
//! gathered into one sequence, stably sorted by virtual address, coalesced
//! where address-contiguous, and emitted as a single Memory64List stream
//! backed by one contiguous payload region.

use std::io::{Read, Seek, Write};

use minidump_format::io::le_u32;
use minidump_format::{
    DirectoryEntry, Dump, DumpError, DumpFlags, DumpWriter, Memory64ListHeader, MemoryDescriptor,
    MemoryDescriptor64, Record, Result, StreamKind,
};

/// One pre-merge range: a guest address span and where its payload bytes live
/// in the input container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RangeSource {
    pub start: u64,
    pub len: u64,
    /// Absolute input offset of the payload bytes.
    pub rva: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub source_ranges: usize,
    pub merged_ranges: usize,
    pub payload_bytes: u64,
}

/// Rewrite of the header flags performed alongside the merge: the output
/// holds full coalesced memory, so the partial-coverage bits come off and the
/// full-memory bit goes on. Unrelated bits pass through untouched.
pub fn full_memory_flags(flags: DumpFlags) -> DumpFlags {
    let partial = DumpFlags::WITH_DATA_SEGS
        | DumpFlags::WITH_INDIRECTLY_REFERENCED_MEMORY
        | DumpFlags::WITH_PRIVATE_READ_WRITE_MEMORY
        | DumpFlags::WITH_CODE_SEGS;
    (flags - partial) | DumpFlags::WITH_FULL_MEMORY
}

pub(crate) fn collect_memory_list<R: Read + Seek>(
    dump: &mut Dump<R>,
    entry: &DirectoryEntry,
) -> Result<Vec<RangeSource>> {
    let base = u64::from(entry.location.rva);
    let count = le_u32(&dump.read_at(base, 4)?) as usize;
    let descriptors: Vec<MemoryDescriptor> = dump.read_record_array_at(base + 4, count)?;
    Ok(descriptors
        .iter()
        .map(|d| RangeSource {
            start: d.start_of_memory_range,
            len: u64::from(d.memory.data_size),
            rva: u64::from(d.memory.rva),
        })
        .collect())
}

pub(crate) fn collect_memory64_list<R: Read + Seek>(
    dump: &mut Dump<R>,
    entry: &DirectoryEntry,
) -> Result<Vec<RangeSource>> {
    let base = u64::from(entry.location.rva);
    let header: Memory64ListHeader = dump.read_record_at(base)?;
    let count = header.number_of_memory_ranges as usize;
    let descriptors: Vec<MemoryDescriptor64> =
        dump.read_record_array_at(base + Memory64ListHeader::SIZE as u64, count)?;

    // Payloads are packed back to back starting at the recorded base.
    let mut payload_rva = header.base_rva;
    let mut ranges = Vec::with_capacity(count);
    for d in &descriptors {
        ranges.push(RangeSource {
            start: d.start_of_memory_range,
            len: d.data_size,
            rva: payload_rva,
        });
        payload_rva = payload_rva
            .checked_add(d.data_size)
            .ok_or(DumpError::Corrupt("memory payload offset overflows"))?;
    }
    Ok(ranges)
}

/// Coalesce a sorted range sequence: address-contiguous neighbors collapse
/// into one descriptor. Pure, so the output stream can be sized exactly
/// before any payload byte is copied.
pub(crate) fn coalesce(sorted: &[RangeSource]) -> Vec<MemoryDescriptor64> {
    let mut merged: Vec<MemoryDescriptor64> = Vec::new();
    for range in sorted {
        match merged.last_mut() {
            // A range whose end wraps the address space never counts as
            // contiguous with its successor.
            Some(prev)
                if prev.start_of_memory_range.checked_add(prev.data_size)
                    == Some(range.start) =>
            {
                prev.data_size += range.len;
            }
            _ => merged.push(MemoryDescriptor64 {
                start_of_memory_range: range.start,
                data_size: range.len,
            }),
        }
    }
    merged
}

/// Emit the single normalized Memory64List stream from whatever range lists
/// the input carried. Returns `None` when the input had no memory list at
/// all (nothing to emit).
pub(crate) fn merge_memory<R: Read + Seek, W: Write + Seek>(
    dump: &mut Dump<R>,
    writer: &mut DumpWriter<W>,
    memory_list: Option<DirectoryEntry>,
    memory64_list: Option<DirectoryEntry>,
) -> Result<Option<MergeStats>> {
    if memory_list.is_none() && memory64_list.is_none() {
        return Ok(None);
    }

    let mut ranges = Vec::new();
    if let Some(entry) = &memory_list {
        ranges.extend(collect_memory_list(dump, entry)?);
    }
    if let Some(entry) = &memory64_list {
        ranges.extend(collect_memory64_list(dump, entry)?);
    }

    // Stable: equal virtual addresses keep their input order.
    ranges.sort_by_key(|r| r.start);
    let merged = coalesce(&ranges);

    let stream_size =
        (Memory64ListHeader::SIZE + merged.len() * MemoryDescriptor64::SIZE) as u32;
    let handle = writer.add_stream_placeholder(StreamKind::MEMORY64_LIST, stream_size)?;

    // Copy payloads of the original (pre-merge) ranges, in sorted order,
    // back to back. Together they form the contiguous backing region the
    // coalesced descriptors index into from `base_rva`.
    let base_rva = writer.current_size();
    let mut payload_bytes = 0u64;
    for range in &ranges {
        let len = usize::try_from(range.len)
            .map_err(|_| DumpError::Corrupt("memory range exceeds address space"))?;
        let payload = dump.read_at(range.rva, len)?;
        writer.append_raw(&payload)?;
        payload_bytes += range.len;
    }

    let mut stream = Memory64ListHeader {
        number_of_memory_ranges: merged.len() as u64,
        base_rva,
    }
    .encode();
    for descriptor in &merged {
        descriptor.encode_into(&mut stream);
    }
    writer.set_stream(handle, &stream)?;

    Ok(Some(MergeStats {
        source_ranges: ranges.len(),
        merged_ranges: merged.len(),
        payload_bytes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, len: u64) -> RangeSource {
        RangeSource { start, len, rva: 0 }
    }

    #[test]
    fn contiguous_ranges_collapse() {
        let merged = coalesce(&[range(0x1000, 16), range(0x1010, 16)]);
        assert_eq!(
            merged,
            vec![MemoryDescriptor64 {
                start_of_memory_range: 0x1000,
                data_size: 32,
            }]
        );
    }

    #[test]
    fn gaps_stay_separate() {
        let merged = coalesce(&[range(0x1000, 16), range(0x1020, 16), range(0x1030, 8)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].data_size, 16);
        assert_eq!(merged[1].start_of_memory_range, 0x1020);
        assert_eq!(merged[1].data_size, 24);
    }

    #[test]
    fn ranges_at_the_top_of_the_address_space_do_not_wrap() {
        // The first range's end (u64::MAX - 8 + 16) overflows; it must stay
        // separate from its successor instead of panicking.
        let merged = coalesce(&[range(u64::MAX - 8, 16), range(u64::MAX - 4, 4)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].data_size, 16);
        assert_eq!(merged[1].data_size, 4);
    }

    #[test]
    fn coalescing_already_merged_input_is_a_no_op() {
        let input = [range(0x1000, 32), range(0x2000, 16)];
        let once = coalesce(&input);
        let again: Vec<RangeSource> = once
            .iter()
            .map(|d| range(d.start_of_memory_range, d.data_size))
            .collect();
        assert_eq!(coalesce(&again), once);
    }

    #[test]
    fn flag_rewrite_only_touches_memory_coverage_bits() {
        let input = DumpFlags::WITH_DATA_SEGS
            | DumpFlags::WITH_PRIVATE_READ_WRITE_MEMORY
            | DumpFlags::WITH_HANDLE_DATA
            | DumpFlags::WITH_THREAD_INFO;
        let output = full_memory_flags(input);
        assert!(output.contains(DumpFlags::WITH_FULL_MEMORY));
        assert!(!output.contains(DumpFlags::WITH_DATA_SEGS));
        assert!(!output.contains(DumpFlags::WITH_PRIVATE_READ_WRITE_MEMORY));
        assert!(output.contains(DumpFlags::WITH_HANDLE_DATA));
        assert!(output.contains(DumpFlags::WITH_THREAD_INFO));

        // Unknown reserved bits survive the rewrite.
        let raw = DumpFlags::from_raw(0x4000_0000_0000_0000 | DumpFlags::WITH_CODE_SEGS.bits());
        assert_eq!(
            full_memory_flags(raw).bits(),
            0x4000_0000_0000_0000 | DumpFlags::WITH_FULL_MEMORY.bits()
        );
    }
}
