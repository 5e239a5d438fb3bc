use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{DumpError, Result};
use crate::format::{DumpFlags, StreamKind, SIGNATURE};
use crate::io::read_utf16_string;
use crate::records::{DirectoryEntry, LocationDescriptor, MinidumpHeader, Record};

/// Parsed view over a minidump container.
///
/// Owns the input handle; all reads go through `&mut self`, so directory
/// entries are handed out as plain values and can be iterated while the dump
/// is consulted for payload bytes at arbitrary offsets.
#[derive(Debug)]
pub struct Dump<R> {
    input: R,
    header: MinidumpHeader,
    directory: Vec<DirectoryEntry>,
}

impl<R: Read + Seek> Dump<R> {
    pub fn open(mut input: R) -> Result<Self> {
        let header = MinidumpHeader::read_at(&mut input, 0)?;
        if &header.signature != SIGNATURE {
            return Err(DumpError::InvalidSignature);
        }
        let directory = DirectoryEntry::read_array_at(
            &mut input,
            u64::from(header.stream_directory_rva),
            header.number_of_streams as usize,
        )?;
        Ok(Self {
            input,
            header,
            directory,
        })
    }

    pub fn timestamp(&self) -> u32 {
        self.header.time_date_stamp
    }

    pub fn flags(&self) -> DumpFlags {
        DumpFlags::from_raw(self.header.flags)
    }

    /// Directory entries in input order, excluding unused slots and entries
    /// whose location is the all-zero "absent" descriptor. An absent entry
    /// carries no data; a read through one would land on the container
    /// header at offset 0.
    pub fn streams(&self) -> Vec<DirectoryEntry> {
        self.directory
            .iter()
            .copied()
            .filter(|entry| {
                entry.stream_kind != StreamKind::UNUSED && !entry.location.is_absent()
            })
            .collect()
    }

    /// Bounded view over one stream's byte range.
    pub fn substream(&mut self, entry: &DirectoryEntry) -> SubStream<'_, R> {
        SubStream {
            inner: &mut self.input,
            offset: u64::from(entry.location.rva),
            size: u64::from(entry.location.data_size),
            pos: 0,
        }
    }

    pub fn read_at(&mut self, rva: u64, len: usize) -> Result<Vec<u8>> {
        self.input.seek(SeekFrom::Start(rva))?;
        let mut buf = vec![0u8; len];
        self.input.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Load the bytes a location descriptor points at. The all-zero
    /// descriptor is absent: no read is issued and `None` is returned.
    pub fn read_location(&mut self, loc: LocationDescriptor) -> Result<Option<Vec<u8>>> {
        if loc.is_absent() {
            return Ok(None);
        }
        Ok(Some(self.read_at(u64::from(loc.rva), loc.data_size as usize)?))
    }

    pub fn read_string(&mut self, rva: u32) -> Result<String> {
        read_utf16_string(&mut self.input, u64::from(rva))
    }

    pub fn read_record_at<T: Record>(&mut self, rva: u64) -> Result<T> {
        T::read_at(&mut self.input, rva)
    }

    pub fn read_record_array_at<T: Record>(&mut self, rva: u64, count: usize) -> Result<Vec<T>> {
        T::read_array_at(&mut self.input, rva, count)
    }
}

/// Window `[offset, offset + size)` of the underlying input.
///
/// Each view seeks the shared handle before reading, so interleaved reads
/// from different views never observe each other's position. Reads past the
/// window end are truncated rather than spilling into neighboring streams.
pub struct SubStream<'a, R> {
    inner: &'a mut R,
    offset: u64,
    size: u64,
    pos: u64,
}

impl<R: Read + Seek> SubStream<'_, R> {
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Read the rest of the window into a buffer.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + Seek> Read for SubStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        self.inner.seek(SeekFrom::Start(self.offset + self.pos))?;
        let n = self.inner.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for SubStream<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream window",
            )),
        }
    }
}
