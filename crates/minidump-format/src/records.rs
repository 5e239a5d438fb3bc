//! Fixed-layout composite records of the minidump container.
//!
//! Every record is a plain value type with a hand-written little-endian
//! codec. Layouts are flat: nested records contribute their fields in place,
//! with no padding between fields. Variable-length data is never stored
//! inline; records reference it through `(size, rva)` location descriptors.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{DumpError, Result};
use crate::format::StreamKind;
use crate::io::{le_u16, le_u32, le_u64, put_u16, put_u32, put_u64};

pub trait Record: Sized {
    /// On-disk structure name, used in truncation errors.
    const NAME: &'static str;
    /// Encoded size in bytes; the sum of all field widths.
    const SIZE: usize;

    fn encode_into(&self, out: &mut Vec<u8>);
    fn decode(buf: &[u8]) -> Result<Self>;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        self.encode_into(&mut out);
        out
    }

    fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut buf = vec![0u8; Self::SIZE];
        r.read_exact(&mut buf)?;
        Self::decode(&buf)
    }

    fn read_at<R: Read + Seek>(r: &mut R, offset: u64) -> Result<Self> {
        r.seek(SeekFrom::Start(offset))?;
        Self::read_from(r)
    }

    /// Read `count` consecutive records starting at `offset`.
    fn read_array_at<R: Read + Seek>(r: &mut R, offset: u64, count: usize) -> Result<Vec<Self>> {
        r.seek(SeekFrom::Start(offset))?;
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(Self::read_from(r)?);
        }
        Ok(out)
    }
}

fn fixed<T: Record>(buf: &[u8]) -> Result<&[u8]> {
    if buf.len() < T::SIZE {
        return Err(DumpError::TruncatedRecord {
            record: T::NAME,
            expected: T::SIZE,
            actual: buf.len(),
        });
    }
    Ok(&buf[..T::SIZE])
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MinidumpHeader {
    pub signature: [u8; 4],
    pub version: u32,
    pub number_of_streams: u32,
    pub stream_directory_rva: u32,
    pub checksum: u32,
    pub time_date_stamp: u32,
    pub flags: u64,
}

impl Record for MinidumpHeader {
    const NAME: &'static str = "MINIDUMP_HEADER";
    const SIZE: usize = 32;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.signature);
        put_u32(out, self.version);
        put_u32(out, self.number_of_streams);
        put_u32(out, self.stream_directory_rva);
        put_u32(out, self.checksum);
        put_u32(out, self.time_date_stamp);
        put_u64(out, self.flags);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            signature: [b[0], b[1], b[2], b[3]],
            version: le_u32(&b[4..8]),
            number_of_streams: le_u32(&b[8..12]),
            stream_directory_rva: le_u32(&b[12..16]),
            checksum: le_u32(&b[16..20]),
            time_date_stamp: le_u32(&b[20..24]),
            flags: le_u64(&b[24..32]),
        })
    }
}

/// `(size, rva)` locator for a byte range anywhere in the container.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LocationDescriptor {
    pub data_size: u32,
    pub rva: u32,
}

impl LocationDescriptor {
    pub fn new(data_size: u32, rva: u32) -> Self {
        Self { data_size, rva }
    }

    /// The all-zero descriptor denotes "absent"; no read may be issued for it.
    pub fn is_absent(&self) -> bool {
        self.data_size == 0 && self.rva == 0
    }
}

impl Record for LocationDescriptor {
    const NAME: &'static str = "MINIDUMP_LOCATION_DESCRIPTOR";
    const SIZE: usize = 8;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u32(out, self.data_size);
        put_u32(out, self.rva);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            data_size: le_u32(&b[0..4]),
            rva: le_u32(&b[4..8]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub stream_kind: StreamKind,
    pub location: LocationDescriptor,
}

impl Record for DirectoryEntry {
    const NAME: &'static str = "MINIDUMP_DIRECTORY";
    const SIZE: usize = 12;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u32(out, self.stream_kind.0);
        self.location.encode_into(out);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            stream_kind: StreamKind(le_u32(&b[0..4])),
            location: LocationDescriptor::decode(&b[4..12])?,
        })
    }
}

/// 32-bit-offset memory range: the payload carries its own locator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryDescriptor {
    pub start_of_memory_range: u64,
    pub memory: LocationDescriptor,
}

impl Record for MemoryDescriptor {
    const NAME: &'static str = "MINIDUMP_MEMORY_DESCRIPTOR";
    const SIZE: usize = 16;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u64(out, self.start_of_memory_range);
        self.memory.encode_into(out);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            start_of_memory_range: le_u64(&b[0..8]),
            memory: LocationDescriptor::decode(&b[8..16])?,
        })
    }
}

/// Header of the 64-bit range list: payloads are packed contiguously starting
/// at `base_rva`, so per-range descriptors carry only a size.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Memory64ListHeader {
    pub number_of_memory_ranges: u64,
    pub base_rva: u64,
}

impl Record for Memory64ListHeader {
    const NAME: &'static str = "MINIDUMP_MEMORY64_LIST";
    const SIZE: usize = 16;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u64(out, self.number_of_memory_ranges);
        put_u64(out, self.base_rva);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            number_of_memory_ranges: le_u64(&b[0..8]),
            base_rva: le_u64(&b[8..16]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryDescriptor64 {
    pub start_of_memory_range: u64,
    pub data_size: u64,
}

impl Record for MemoryDescriptor64 {
    const NAME: &'static str = "MINIDUMP_MEMORY_DESCRIPTOR64";
    const SIZE: usize = 16;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u64(out, self.start_of_memory_range);
        put_u64(out, self.data_size);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            start_of_memory_range: le_u64(&b[0..8]),
            data_size: le_u64(&b[8..16]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixedFileInfo {
    pub signature: u32,
    pub struc_version: u32,
    pub file_version_ms: u32,
    pub file_version_ls: u32,
    pub product_version_ms: u32,
    pub product_version_ls: u32,
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    pub file_date_ms: u32,
    pub file_date_ls: u32,
}

impl Record for FixedFileInfo {
    const NAME: &'static str = "VS_FIXEDFILEINFO";
    const SIZE: usize = 52;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u32(out, self.signature);
        put_u32(out, self.struc_version);
        put_u32(out, self.file_version_ms);
        put_u32(out, self.file_version_ls);
        put_u32(out, self.product_version_ms);
        put_u32(out, self.product_version_ls);
        put_u32(out, self.file_flags_mask);
        put_u32(out, self.file_flags);
        put_u32(out, self.file_os);
        put_u32(out, self.file_type);
        put_u32(out, self.file_subtype);
        put_u32(out, self.file_date_ms);
        put_u32(out, self.file_date_ls);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            signature: le_u32(&b[0..4]),
            struc_version: le_u32(&b[4..8]),
            file_version_ms: le_u32(&b[8..12]),
            file_version_ls: le_u32(&b[12..16]),
            product_version_ms: le_u32(&b[16..20]),
            product_version_ls: le_u32(&b[20..24]),
            file_flags_mask: le_u32(&b[24..28]),
            file_flags: le_u32(&b[28..32]),
            file_os: le_u32(&b[32..36]),
            file_type: le_u32(&b[36..40]),
            file_subtype: le_u32(&b[40..44]),
            file_date_ms: le_u32(&b[44..48]),
            file_date_ls: le_u32(&b[48..52]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Module {
    pub base_of_image: u64,
    pub size_of_image: u32,
    pub checksum: u32,
    pub time_date_stamp: u32,
    pub module_name_rva: u32,
    pub version_info: FixedFileInfo,
    pub cv_record: LocationDescriptor,
    pub misc_record: LocationDescriptor,
    pub reserved0: u64,
    pub reserved1: u64,
}

impl Record for Module {
    const NAME: &'static str = "MINIDUMP_MODULE";
    const SIZE: usize = 108;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u64(out, self.base_of_image);
        put_u32(out, self.size_of_image);
        put_u32(out, self.checksum);
        put_u32(out, self.time_date_stamp);
        put_u32(out, self.module_name_rva);
        self.version_info.encode_into(out);
        self.cv_record.encode_into(out);
        self.misc_record.encode_into(out);
        put_u64(out, self.reserved0);
        put_u64(out, self.reserved1);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            base_of_image: le_u64(&b[0..8]),
            size_of_image: le_u32(&b[8..12]),
            checksum: le_u32(&b[12..16]),
            time_date_stamp: le_u32(&b[16..20]),
            module_name_rva: le_u32(&b[20..24]),
            version_info: FixedFileInfo::decode(&b[24..76])?,
            cv_record: LocationDescriptor::decode(&b[76..84])?,
            misc_record: LocationDescriptor::decode(&b[84..92])?,
            reserved0: le_u64(&b[92..100]),
            reserved1: le_u64(&b[100..108]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Thread {
    pub thread_id: u32,
    pub suspend_count: u32,
    pub priority_class: u32,
    pub priority: u32,
    pub teb: u64,
    pub stack: MemoryDescriptor,
    pub thread_context: LocationDescriptor,
}

impl Record for Thread {
    const NAME: &'static str = "MINIDUMP_THREAD";
    const SIZE: usize = 48;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u32(out, self.thread_id);
        put_u32(out, self.suspend_count);
        put_u32(out, self.priority_class);
        put_u32(out, self.priority);
        put_u64(out, self.teb);
        self.stack.encode_into(out);
        self.thread_context.encode_into(out);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            thread_id: le_u32(&b[0..4]),
            suspend_count: le_u32(&b[4..8]),
            priority_class: le_u32(&b[8..12]),
            priority: le_u32(&b[12..16]),
            teb: le_u64(&b[16..24]),
            stack: MemoryDescriptor::decode(&b[24..40])?,
            thread_context: LocationDescriptor::decode(&b[40..48])?,
        })
    }
}

/// Fixed 32-byte prefix of the system-info stream. Callers carry any trailing
/// bytes (CpuInfo and friends) opaquely and re-append them on encode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    pub processor_architecture: u16,
    pub processor_level: u16,
    pub processor_revision: u16,
    pub number_of_processors: u8,
    pub product_type: u8,
    pub major_version: u32,
    pub minor_version: u32,
    pub build_number: u32,
    pub platform_id: u32,
    pub csd_version_rva: u32,
    pub suite_mask: u16,
    pub reserved2: u16,
}

impl Record for SystemInfo {
    const NAME: &'static str = "MINIDUMP_SYSTEM_INFO";
    const SIZE: usize = 32;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u16(out, self.processor_architecture);
        put_u16(out, self.processor_level);
        put_u16(out, self.processor_revision);
        out.push(self.number_of_processors);
        out.push(self.product_type);
        put_u32(out, self.major_version);
        put_u32(out, self.minor_version);
        put_u32(out, self.build_number);
        put_u32(out, self.platform_id);
        put_u32(out, self.csd_version_rva);
        put_u16(out, self.suite_mask);
        put_u16(out, self.reserved2);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            processor_architecture: le_u16(&b[0..2]),
            processor_level: le_u16(&b[2..4]),
            processor_revision: le_u16(&b[4..6]),
            number_of_processors: b[6],
            product_type: b[7],
            major_version: le_u32(&b[8..12]),
            minor_version: le_u32(&b[12..16]),
            build_number: le_u32(&b[16..20]),
            platform_id: le_u32(&b[20..24]),
            csd_version_rva: le_u32(&b[24..28]),
            suite_mask: le_u16(&b[28..30]),
            reserved2: le_u16(&b[30..32]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnloadedModule {
    pub base_of_image: u64,
    pub size_of_image: u32,
    pub checksum: u32,
    pub time_date_stamp: u32,
    pub module_name_rva: u32,
}

impl Record for UnloadedModule {
    const NAME: &'static str = "MINIDUMP_UNLOADED_MODULE";
    const SIZE: usize = 24;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u64(out, self.base_of_image);
        put_u32(out, self.size_of_image);
        put_u32(out, self.checksum);
        put_u32(out, self.time_date_stamp);
        put_u32(out, self.module_name_rva);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            base_of_image: le_u64(&b[0..8]),
            size_of_image: le_u32(&b[8..12]),
            checksum: le_u32(&b[12..16]),
            time_date_stamp: le_u32(&b[16..20]),
            module_name_rva: le_u32(&b[20..24]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnloadedModuleListHeader {
    pub size_of_header: u32,
    pub size_of_entry: u32,
    pub number_of_entries: u32,
}

impl Record for UnloadedModuleListHeader {
    const NAME: &'static str = "MINIDUMP_UNLOADED_MODULE_LIST";
    const SIZE: usize = 12;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u32(out, self.size_of_header);
        put_u32(out, self.size_of_entry);
        put_u32(out, self.number_of_entries);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            size_of_header: le_u32(&b[0..4]),
            size_of_entry: le_u32(&b[4..8]),
            number_of_entries: le_u32(&b[8..12]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandleDataHeader {
    pub size_of_header: u32,
    pub size_of_descriptor: u32,
    pub number_of_descriptors: u32,
    pub reserved: u32,
}

impl Record for HandleDataHeader {
    const NAME: &'static str = "MINIDUMP_HANDLE_DATA_STREAM";
    const SIZE: usize = 16;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u32(out, self.size_of_header);
        put_u32(out, self.size_of_descriptor);
        put_u32(out, self.number_of_descriptors);
        put_u32(out, self.reserved);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            size_of_header: le_u32(&b[0..4]),
            size_of_descriptor: le_u32(&b[4..8]),
            number_of_descriptors: le_u32(&b[8..12]),
            reserved: le_u32(&b[12..16]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandleDescriptor {
    pub handle: u64,
    pub type_name_rva: u32,
    pub object_name_rva: u32,
    pub attributes: u32,
    pub granted_access: u32,
    pub handle_count: u32,
    pub pointer_count: u32,
}

impl Record for HandleDescriptor {
    const NAME: &'static str = "MINIDUMP_HANDLE_DESCRIPTOR";
    const SIZE: usize = 32;

    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u64(out, self.handle);
        put_u32(out, self.type_name_rva);
        put_u32(out, self.object_name_rva);
        put_u32(out, self.attributes);
        put_u32(out, self.granted_access);
        put_u32(out, self.handle_count);
        put_u32(out, self.pointer_count);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let b = fixed::<Self>(buf)?;
        Ok(Self {
            handle: le_u64(&b[0..8]),
            type_name_rva: le_u32(&b[8..12]),
            object_name_rva: le_u32(&b[12..16]),
            attributes: le_u32(&b[16..20]),
            granted_access: le_u32(&b[20..24]),
            handle_count: le_u32(&b[24..28]),
            pointer_count: le_u32(&b[28..32]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn record_sizes_match_layout() {
        assert_eq!(MinidumpHeader::SIZE, 32);
        assert_eq!(LocationDescriptor::SIZE, 8);
        assert_eq!(DirectoryEntry::SIZE, 12);
        assert_eq!(MemoryDescriptor::SIZE, 16);
        assert_eq!(Memory64ListHeader::SIZE, 16);
        assert_eq!(MemoryDescriptor64::SIZE, 16);
        assert_eq!(FixedFileInfo::SIZE, 52);
        assert_eq!(Module::SIZE, 108);
        assert_eq!(Thread::SIZE, 48);
        assert_eq!(SystemInfo::SIZE, 32);
        assert_eq!(UnloadedModule::SIZE, 24);
        assert_eq!(UnloadedModuleListHeader::SIZE, 12);
        assert_eq!(HandleDataHeader::SIZE, 16);
        assert_eq!(HandleDescriptor::SIZE, 32);
    }

    #[test]
    fn header_round_trips() {
        let header = MinidumpHeader {
            signature: *b"MDMP",
            version: 0x1234_5678,
            number_of_streams: 7,
            stream_directory_rva: 32,
            checksum: 0,
            time_date_stamp: 0x5f5e_100,
            flags: 0x0000_0021,
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), MinidumpHeader::SIZE);
        assert_eq!(MinidumpHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn nested_module_round_trips() {
        let module = Module {
            base_of_image: 0x7ff6_0000_0000,
            size_of_image: 0x1000,
            module_name_rva: 0x200,
            version_info: FixedFileInfo {
                signature: 0xfeef_04bd,
                file_version_ms: 10,
                ..Default::default()
            },
            cv_record: LocationDescriptor::new(24, 0x300),
            misc_record: LocationDescriptor::default(),
            ..Default::default()
        };
        let bytes = module.encode();
        assert_eq!(bytes.len(), Module::SIZE);
        let decoded = Module::decode(&bytes).unwrap();
        assert_eq!(decoded, module);
        // Nested fields land at their flattened offsets.
        assert_eq!(le_u32(&bytes[24..28]), 0xfeef_04bd);
        assert_eq!(le_u32(&bytes[76..80]), 24);
    }

    #[test]
    fn thread_round_trips() {
        let thread = Thread {
            thread_id: 0x1a2b,
            teb: 0x7ffd_f000,
            stack: MemoryDescriptor {
                start_of_memory_range: 0x0012_0000,
                memory: LocationDescriptor::new(16, 0x400),
            },
            thread_context: LocationDescriptor::new(716, 0x500),
            ..Default::default()
        };
        assert_eq!(Thread::decode(&thread.encode()).unwrap(), thread);
    }

    #[test]
    fn short_buffer_is_a_truncated_record() {
        let err = Thread::decode(&[0u8; 47]).unwrap_err();
        match err {
            DumpError::TruncatedRecord {
                record,
                expected,
                actual,
            } => {
                assert_eq!(record, "MINIDUMP_THREAD");
                assert_eq!(expected, 48);
                assert_eq!(actual, 47);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let mut bytes = SystemInfo::default().encode();
        bytes.extend_from_slice(&[0xAA; 24]); // CpuInfo tail
        assert!(SystemInfo::decode(&bytes).is_ok());
    }

    #[test]
    fn default_is_all_zero() {
        assert_eq!(LocationDescriptor::default().encode(), vec![0u8; 8]);
        assert_eq!(Module::default().encode(), vec![0u8; 108]);
        assert!(LocationDescriptor::default().is_absent());
        assert!(!LocationDescriptor::new(0, 4).is_absent());
    }

    #[test]
    fn array_read_is_consecutive_and_restartable() {
        let mut buf = Vec::new();
        for i in 0..3u64 {
            MemoryDescriptor64 {
                start_of_memory_range: 0x1000 * i,
                data_size: 16,
            }
            .encode_into(&mut buf);
        }
        let mut cursor = Cursor::new(buf);
        let first = MemoryDescriptor64::read_array_at(&mut cursor, 0, 3).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[2].start_of_memory_range, 0x2000);
        // Re-reading from a given offset restarts cleanly.
        let again = MemoryDescriptor64::read_array_at(&mut cursor, 16, 2).unwrap();
        assert_eq!(again[0].start_of_memory_range, 0x1000);
    }
}
