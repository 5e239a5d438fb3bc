//! Per-stream-kind rewriting: every variable-length payload a stream
//! references (strings, thread stacks, contexts, debug records) is copied
//! into the output's out-of-band region and the referencing fields are
//! patched to the new offsets. Streams with no embedded references copy
//! through byte-for-byte.

use std::io::{Read, Seek, Write};

use minidump_format::io::{encode_utf16_string, le_u32, put_u32};
use minidump_format::{
    DirectoryEntry, Dump, DumpWriter, HandleDataHeader, HandleDescriptor, Module, Record, Result,
    SystemInfo, Thread, UnloadedModule, UnloadedModuleListHeader,
};

/// Re-encode a string from the input's string table into the output's
/// out-of-band region, returning the new rva.
fn relocate_string<R: Read + Seek, W: Write + Seek>(
    dump: &mut Dump<R>,
    writer: &mut DumpWriter<W>,
    rva: u32,
) -> Result<u32> {
    let text = dump.read_string(rva)?;
    Ok(writer.write_oob(&encode_utf16_string(&text))?.rva)
}

/// Byte-for-byte pass-through for stream kinds with no embedded references.
pub(crate) fn copy_stream<R: Read + Seek, W: Write + Seek>(
    dump: &mut Dump<R>,
    writer: &mut DumpWriter<W>,
    entry: &DirectoryEntry,
) -> Result<()> {
    let data = dump.substream(entry).read_remaining()?;
    writer.add_stream(entry.stream_kind, &data)?;
    Ok(())
}

pub(crate) fn transform_handle_data<R: Read + Seek, W: Write + Seek>(
    dump: &mut Dump<R>,
    writer: &mut DumpWriter<W>,
    entry: &DirectoryEntry,
) -> Result<()> {
    let base = u64::from(entry.location.rva);
    let header: HandleDataHeader = dump.read_record_at(base)?;
    if header.size_of_descriptor as usize != HandleDescriptor::SIZE {
        // Unknown descriptor ABI; leave the stream untouched rather than
        // re-encode fields at guessed offsets.
        return copy_stream(dump, writer, entry);
    }

    let mut descriptors: Vec<HandleDescriptor> = dump.read_record_array_at(
        base + u64::from(header.size_of_header),
        header.number_of_descriptors as usize,
    )?;

    let handle = writer.add_stream_placeholder(entry.stream_kind, entry.location.data_size)?;
    for descriptor in &mut descriptors {
        descriptor.type_name_rva = relocate_string(dump, writer, descriptor.type_name_rva)?;
        descriptor.object_name_rva = relocate_string(dump, writer, descriptor.object_name_rva)?;
    }

    let mut out = header.encode();
    header_slack(dump, base, header.size_of_header, &mut out)?;
    for descriptor in &descriptors {
        descriptor.encode_into(&mut out);
    }
    writer.set_stream(handle, &out)
}

pub(crate) fn transform_unloaded_modules<R: Read + Seek, W: Write + Seek>(
    dump: &mut Dump<R>,
    writer: &mut DumpWriter<W>,
    entry: &DirectoryEntry,
) -> Result<()> {
    let base = u64::from(entry.location.rva);
    let header: UnloadedModuleListHeader = dump.read_record_at(base)?;
    let entry_size = header.size_of_entry as usize;

    let handle = writer.add_stream_placeholder(entry.stream_kind, entry.location.data_size)?;

    let mut out = header.encode();
    header_slack(dump, base, header.size_of_header, &mut out)?;
    for i in 0..header.number_of_entries as u64 {
        let raw = dump.read_at(
            base + u64::from(header.size_of_header) + i * entry_size as u64,
            entry_size,
        )?;
        let mut module = UnloadedModule::decode(&raw)?;
        module.module_name_rva = relocate_string(dump, writer, module.module_name_rva)?;
        module.encode_into(&mut out);
        // Producers may use a larger entry stride; the tail passes through.
        out.extend_from_slice(&raw[UnloadedModule::SIZE..]);
    }
    writer.set_stream(handle, &out)
}

pub(crate) fn transform_system_info<R: Read + Seek, W: Write + Seek>(
    dump: &mut Dump<R>,
    writer: &mut DumpWriter<W>,
    entry: &DirectoryEntry,
) -> Result<()> {
    let raw = dump.substream(entry).read_remaining()?;
    let mut info = SystemInfo::decode(&raw)?;
    info.csd_version_rva = relocate_string(dump, writer, info.csd_version_rva)?;

    let mut out = info.encode();
    out.extend_from_slice(&raw[SystemInfo::SIZE..]); // CpuInfo and friends
    writer.add_stream(entry.stream_kind, &out)?;
    Ok(())
}

pub(crate) fn transform_thread_list<R: Read + Seek, W: Write + Seek>(
    dump: &mut Dump<R>,
    writer: &mut DumpWriter<W>,
    entry: &DirectoryEntry,
) -> Result<()> {
    let base = u64::from(entry.location.rva);
    let count = le_u32(&dump.read_at(base, 4)?) as usize;
    let mut threads: Vec<Thread> = dump.read_record_array_at(base + 4, count)?;

    let handle = writer.add_stream_placeholder(
        entry.stream_kind,
        (4 + count * Thread::SIZE) as u32,
    )?;
    for thread in &mut threads {
        let stack = dump.read_location(thread.stack.memory)?;
        thread.stack.memory = writer.write_oob_opt(stack.as_deref())?;
        let context = dump.read_location(thread.thread_context)?;
        thread.thread_context = writer.write_oob_opt(context.as_deref())?;
    }

    let mut out = Vec::with_capacity(4 + count * Thread::SIZE);
    put_u32(&mut out, count as u32);
    for thread in &threads {
        thread.encode_into(&mut out);
    }
    writer.set_stream(handle, &out)
}

pub(crate) fn transform_module_list<R: Read + Seek, W: Write + Seek>(
    dump: &mut Dump<R>,
    writer: &mut DumpWriter<W>,
    entry: &DirectoryEntry,
) -> Result<()> {
    let base = u64::from(entry.location.rva);
    let count = le_u32(&dump.read_at(base, 4)?) as usize;
    let mut modules: Vec<Module> = dump.read_record_array_at(base + 4, count)?;

    let handle = writer.add_stream_placeholder(
        entry.stream_kind,
        (4 + count * Module::SIZE) as u32,
    )?;
    for module in &mut modules {
        let cv = dump.read_location(module.cv_record)?;
        module.cv_record = writer.write_oob_opt(cv.as_deref())?;
        let misc = dump.read_location(module.misc_record)?;
        module.misc_record = writer.write_oob_opt(misc.as_deref())?;
        module.module_name_rva = relocate_string(dump, writer, module.module_name_rva)?;
    }

    let mut out = Vec::with_capacity(4 + count * Module::SIZE);
    put_u32(&mut out, count as u32);
    for module in &modules {
        module.encode_into(&mut out);
    }
    writer.set_stream(handle, &out)
}

/// Preserve the bytes between a list stream's fixed header and its entry
/// array when the producer declared a larger header than we model.
fn header_slack<R: Read + Seek>(
    dump: &mut Dump<R>,
    base: u64,
    size_of_header: u32,
    out: &mut Vec<u8>,
) -> Result<()> {
    let declared = size_of_header as usize;
    if declared > out.len() {
        let slack = dump.read_at(base + out.len() as u64, declared - out.len())?;
        out.extend_from_slice(&slack);
    }
    Ok(())
}
