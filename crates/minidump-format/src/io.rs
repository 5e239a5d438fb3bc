//! Little-endian field access helpers and the UTF-16 string codec used by the
//! container's out-of-band region.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{DumpError, Result};

pub fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

pub fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

pub fn le_u64(b: &[u8]) -> u64 {
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Read a length-prefixed UTF-16LE string at the given container offset.
///
/// Layout: `u32` byte length, followed by that many bytes of UTF-16LE code
/// units. The trailing two-byte null terminator is not included in the length
/// and is not read back.
pub fn read_utf16_string<R: Read + Seek>(r: &mut R, rva: u64) -> Result<String> {
    r.seek(SeekFrom::Start(rva))?;
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let byte_len = le_u32(&len_buf) as usize;
    if byte_len % 2 != 0 {
        return Err(DumpError::Corrupt("utf-16 string has odd byte length"));
    }

    let mut buf = vec![0u8; byte_len];
    r.read_exact(&mut buf)?;
    let units: Vec<u16> = buf.chunks_exact(2).map(le_u16).collect();
    Ok(String::from_utf16(&units)?)
}

/// Encode a string for the out-of-band region: `u32` byte length prefix,
/// UTF-16LE code units, then a two-byte null terminator (excluded from the
/// length).
pub fn encode_utf16_string(s: &str) -> Vec<u8> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let mut out = Vec::with_capacity(4 + units.len() * 2 + 2);
    put_u32(&mut out, (units.len() * 2) as u32);
    for unit in units {
        put_u16(&mut out, unit);
    }
    put_u16(&mut out, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn string_codec_round_trips() {
        let encoded = encode_utf16_string("C:\\Windows\\System32\\ntdll.dll");
        let mut cursor = Cursor::new(encoded);
        let decoded = read_utf16_string(&mut cursor, 0).unwrap();
        assert_eq!(decoded, "C:\\Windows\\System32\\ntdll.dll");
    }

    #[test]
    fn string_codec_handles_non_ascii() {
        let encoded = encode_utf16_string("デバッグ.dll");
        let mut cursor = Cursor::new(encoded);
        assert_eq!(read_utf16_string(&mut cursor, 0).unwrap(), "デバッグ.dll");
    }

    #[test]
    fn encoded_string_layout() {
        let encoded = encode_utf16_string("ab");
        // 4-byte length (4), "a", "b" as UTF-16LE, two-byte terminator.
        assert_eq!(
            encoded,
            vec![4, 0, 0, 0, b'a', 0, b'b', 0, 0, 0],
        );
    }

    #[test]
    fn odd_length_prefix_is_rejected() {
        let mut cursor = Cursor::new(vec![3, 0, 0, 0, 0, 0, 0]);
        let err = read_utf16_string(&mut cursor, 0).unwrap_err();
        assert!(matches!(err, DumpError::Corrupt(_)));
    }
}
