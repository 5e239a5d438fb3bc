use bitflags::bitflags;

pub const SIGNATURE: &[u8; 4] = b"MDMP";

/// Version field written into new dump headers. Matches what the Windows
/// debugger tooling emits (low word is the format version, high word is an
/// implementation-defined build stamp).
pub const FORMAT_VERSION: u32 = 1618061203;

/// Numeric stream-kind tag from the container directory.
///
/// Unknown values are representable and must be preserved opaquely; the
/// associated constants cover the kinds this crate knows how to interpret.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKind(pub u32);

impl StreamKind {
    pub const UNUSED: StreamKind = StreamKind(0);
    pub const RESERVED_0: StreamKind = StreamKind(1);
    pub const RESERVED_1: StreamKind = StreamKind(2);
    pub const THREAD_LIST: StreamKind = StreamKind(3);
    pub const MODULE_LIST: StreamKind = StreamKind(4);
    pub const MEMORY_LIST: StreamKind = StreamKind(5);
    pub const EXCEPTION: StreamKind = StreamKind(6);
    pub const SYSTEM_INFO: StreamKind = StreamKind(7);
    pub const THREAD_EX_LIST: StreamKind = StreamKind(8);
    pub const MEMORY64_LIST: StreamKind = StreamKind(9);
    pub const COMMENT_A: StreamKind = StreamKind(10);
    pub const COMMENT_W: StreamKind = StreamKind(11);
    pub const HANDLE_DATA: StreamKind = StreamKind(12);
    pub const FUNCTION_TABLE: StreamKind = StreamKind(13);
    pub const UNLOADED_MODULE_LIST: StreamKind = StreamKind(14);
    pub const MISC_INFO: StreamKind = StreamKind(15);
    pub const MEMORY_INFO_LIST: StreamKind = StreamKind(16);
    pub const THREAD_INFO_LIST: StreamKind = StreamKind(17);
    pub const HANDLE_OPERATION_LIST: StreamKind = StreamKind(18);

    pub fn name(self) -> Option<&'static str> {
        match self {
            StreamKind::UNUSED => Some("Unused"),
            StreamKind::THREAD_LIST => Some("ThreadList"),
            StreamKind::MODULE_LIST => Some("ModuleList"),
            StreamKind::MEMORY_LIST => Some("MemoryList"),
            StreamKind::EXCEPTION => Some("Exception"),
            StreamKind::SYSTEM_INFO => Some("SystemInfo"),
            StreamKind::THREAD_EX_LIST => Some("ThreadExList"),
            StreamKind::MEMORY64_LIST => Some("Memory64List"),
            StreamKind::COMMENT_A => Some("CommentA"),
            StreamKind::COMMENT_W => Some("CommentW"),
            StreamKind::HANDLE_DATA => Some("HandleData"),
            StreamKind::FUNCTION_TABLE => Some("FunctionTable"),
            StreamKind::UNLOADED_MODULE_LIST => Some("UnloadedModuleList"),
            StreamKind::MISC_INFO => Some("MiscInfo"),
            StreamKind::MEMORY_INFO_LIST => Some("MemoryInfoList"),
            StreamKind::THREAD_INFO_LIST => Some("ThreadInfoList"),
            StreamKind::HANDLE_OPERATION_LIST => Some("HandleOperationList"),
            _ => None,
        }
    }
}

impl core::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(name) = self.name() {
            write!(f, "{name}({})", self.0)
        } else {
            write!(f, "StreamKind({})", self.0)
        }
    }
}

bitflags! {
    /// The header's 64-bit dump-type bitmask.
    ///
    /// Only the memory-coverage bits are ever rewritten by this workspace;
    /// everything else (including bits not named here) passes through.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DumpFlags: u64 {
        const WITH_DATA_SEGS = 0x0000_0001;
        const WITH_FULL_MEMORY = 0x0000_0002;
        const WITH_HANDLE_DATA = 0x0000_0004;
        const FILTER_MEMORY = 0x0000_0008;
        const SCAN_MEMORY = 0x0000_0010;
        const WITH_UNLOADED_MODULES = 0x0000_0020;
        const WITH_INDIRECTLY_REFERENCED_MEMORY = 0x0000_0040;
        const FILTER_MODULE_PATHS = 0x0000_0080;
        const WITH_PROCESS_THREAD_DATA = 0x0000_0100;
        const WITH_PRIVATE_READ_WRITE_MEMORY = 0x0000_0200;
        const WITHOUT_OPTIONAL_DATA = 0x0000_0400;
        const WITH_FULL_MEMORY_INFO = 0x0000_0800;
        const WITH_THREAD_INFO = 0x0000_1000;
        const WITH_CODE_SEGS = 0x0000_2000;
        const WITHOUT_AUXILIARY_STATE = 0x0000_4000;
        const WITH_FULL_AUXILIARY_STATE = 0x0000_8000;
        const WITH_PRIVATE_WRITE_COPY_MEMORY = 0x0001_0000;
        const IGNORE_INACCESSIBLE_MEMORY = 0x0002_0000;
        const WITH_TOKEN_INFORMATION = 0x0004_0000;
        const WITH_MODULE_HEADERS = 0x0008_0000;
        const FILTER_TRIAGE = 0x0010_0000;
    }
}

impl DumpFlags {
    /// Preserve unknown bits instead of dropping them; the format reserves
    /// the rest of the u64 for future dump types.
    pub fn from_raw(raw: u64) -> Self {
        DumpFlags::from_bits_retain(raw)
    }
}
