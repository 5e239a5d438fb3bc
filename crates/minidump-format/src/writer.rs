use std::io::{Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{DumpError, Result};
use crate::format::{DumpFlags, StreamKind, FORMAT_VERSION, SIGNATURE};
use crate::records::{DirectoryEntry, LocationDescriptor, MinidumpHeader, Record};

/// Opaque reference to a reserved directory slot, for patching its stream
/// bytes after the fact.
#[derive(Debug, Clone, Copy)]
pub struct StreamHandle(usize);

struct Slot {
    entry: DirectoryEntry,
    filled: bool,
}

/// Append-oriented minidump writer.
///
/// The header and a directory sized for `max_streams` entries are reserved at
/// the start of the output; everything else is laid out behind a cursor that
/// only ever moves forward (backward seeks happen solely to patch reserved
/// regions). `close` finalizes the header and directory at offset 0.
pub struct DumpWriter<W> {
    out: W,
    header: MinidumpHeader,
    slots: Vec<Slot>,
    cursor: u64,
    max_streams: usize,
}

impl<W: Write + Seek> DumpWriter<W> {
    pub fn new(out: W, max_streams: usize) -> Result<Self> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let header = MinidumpHeader {
            signature: *SIGNATURE,
            version: FORMAT_VERSION,
            stream_directory_rva: MinidumpHeader::SIZE as u32,
            time_date_stamp: now,
            ..Default::default()
        };
        let cursor = (MinidumpHeader::SIZE + max_streams * DirectoryEntry::SIZE) as u64;
        let mut writer = Self {
            out,
            header,
            slots: Vec::new(),
            cursor,
            max_streams,
        };
        writer.out.seek(SeekFrom::Start(cursor))?;
        Ok(writer)
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.header.time_date_stamp = timestamp;
    }

    pub fn set_flags(&mut self, flags: DumpFlags) {
        self.header.flags = flags.bits();
    }

    /// Bytes written (or reserved) so far; also the offset the next
    /// out-of-band append will land at.
    pub fn current_size(&self) -> u64 {
        self.cursor
    }

    pub fn stream_offset(&self, handle: StreamHandle) -> u32 {
        self.slots[handle.0].entry.location.rva
    }

    pub fn stream_size(&self, handle: StreamHandle) -> u32 {
        self.slots[handle.0].entry.location.data_size
    }

    /// Reserve an 8-byte-aligned region of `size` bytes for a stream and
    /// record its directory entry. The slot must be filled with `set_stream`
    /// before `close`.
    pub fn add_stream_placeholder(&mut self, kind: StreamKind, size: u32) -> Result<StreamHandle> {
        assert!(
            self.slots.len() < self.max_streams,
            "stream directory capacity ({}) exceeded",
            self.max_streams
        );
        self.cursor = (self.cursor + 7) & !7;
        let rva = u32::try_from(self.cursor)
            .map_err(|_| DumpError::Corrupt("stream offset does not fit in a 32-bit rva"))?;
        self.cursor += u64::from(size);
        self.slots.push(Slot {
            entry: DirectoryEntry {
                stream_kind: kind,
                location: LocationDescriptor::new(size, rva),
            },
            filled: false,
        });
        Ok(StreamHandle(self.slots.len() - 1))
    }

    /// Write `data` into a reserved slot. Shrinking the recorded size is
    /// allowed; writing more than was reserved is a caller bug.
    pub fn set_stream(&mut self, handle: StreamHandle, data: &[u8]) -> Result<()> {
        let slot = &mut self.slots[handle.0];
        assert!(
            data.len() <= slot.entry.location.data_size as usize,
            "oversize write into stream slot: reserved {} bytes, got {}",
            slot.entry.location.data_size,
            data.len()
        );
        self.out.seek(SeekFrom::Start(u64::from(slot.entry.location.rva)))?;
        self.out.write_all(data)?;
        slot.entry.location.data_size = data.len() as u32;
        slot.filled = true;
        Ok(())
    }

    /// Placeholder + fill in one step, for streams produced in one shot.
    pub fn add_stream(&mut self, kind: StreamKind, data: &[u8]) -> Result<StreamHandle> {
        let size = u32::try_from(data.len())
            .map_err(|_| DumpError::Corrupt("stream larger than 4 GiB"))?;
        let handle = self.add_stream_placeholder(kind, size)?;
        self.set_stream(handle, data)?;
        Ok(handle)
    }

    /// Append raw bytes at the cursor without recording a directory entry or
    /// descriptor. Used for bulk payload regions addressed by a 64-bit base
    /// offset recorded elsewhere.
    pub fn append_raw(&mut self, data: &[u8]) -> Result<()> {
        self.out.seek(SeekFrom::Start(self.cursor))?;
        self.out.write_all(data)?;
        self.cursor += data.len() as u64;
        Ok(())
    }

    /// Append an out-of-band entry and return its locator. Out-of-band data
    /// is byte-packed; no alignment is applied.
    pub fn write_oob(&mut self, data: &[u8]) -> Result<LocationDescriptor> {
        let rva = u32::try_from(self.cursor)
            .map_err(|_| DumpError::Corrupt("out-of-band offset does not fit in a 32-bit rva"))?;
        let size = u32::try_from(data.len())
            .map_err(|_| DumpError::Corrupt("out-of-band entry larger than 4 GiB"))?;
        self.append_raw(data)?;
        Ok(LocationDescriptor::new(size, rva))
    }

    /// `None` payloads produce the zero ("absent") descriptor.
    pub fn write_oob_opt(&mut self, data: Option<&[u8]>) -> Result<LocationDescriptor> {
        match data {
            Some(data) => self.write_oob(data),
            None => Ok(LocationDescriptor::default()),
        }
    }

    /// Finalize the header and directory at offset 0 and hand the output
    /// back. Every placeholder must have been filled.
    pub fn close(mut self) -> Result<W> {
        if self.slots.iter().any(|slot| !slot.filled) {
            return Err(DumpError::Corrupt("stream placeholder never filled"));
        }
        self.header.number_of_streams = self.slots.len() as u32;
        let mut prefix = self.header.encode();
        for slot in &self.slots {
            slot.entry.encode_into(&mut prefix);
        }
        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&prefix)?;
        self.out.flush()?;
        Ok(self.out)
    }
}
