use std::fs;
use std::io::Cursor;

use assert_cmd::Command;
use minidump_format::io::put_u32;
use minidump_format::{DumpWriter, MemoryDescriptor, Record, StreamKind};

fn minimal_dump() -> Vec<u8> {
    let mut writer = DumpWriter::new(Cursor::new(Vec::new()), 1).unwrap();
    let payload = writer.write_oob(&[0x7F; 16]).unwrap();
    let mut stream = Vec::new();
    put_u32(&mut stream, 1);
    MemoryDescriptor {
        start_of_memory_range: 0x1000,
        memory: payload,
    }
    .encode_into(&mut stream);
    writer
        .add_stream(StreamKind::MEMORY_LIST, &stream)
        .unwrap();
    writer.close().unwrap().into_inner()
}

#[test]
fn converts_to_default_output_name() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("crash.dmp");
    fs::write(&input_path, minimal_dump()).unwrap();

    Command::cargo_bin("minidump-convert")
        .unwrap()
        .arg(&input_path)
        .arg("--quiet")
        .assert()
        .success();

    let output_path = dir.path().join("crash-full.dmp");
    let output = fs::read(&output_path).unwrap();
    assert_eq!(&output[0..4], b"MDMP");
}

#[test]
fn explicit_output_path_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("crash.dmp");
    let output_path = dir.path().join("out.dmp");
    fs::write(&input_path, minimal_dump()).unwrap();

    Command::cargo_bin("minidump-convert")
        .unwrap()
        .arg(&input_path)
        .arg("-o")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicates::str::contains("memory ranges merged"));

    assert!(output_path.exists());
}

#[test]
fn invalid_input_fails_and_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("garbage.dmp");
    fs::write(&input_path, b"not a dump at all").unwrap();

    Command::cargo_bin("minidump-convert")
        .unwrap()
        .arg(&input_path)
        .assert()
        .failure();

    assert!(!dir.path().join("garbage-full.dmp").exists());
}
