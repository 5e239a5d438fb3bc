use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DumpError>;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid minidump signature")]
    InvalidSignature,

    #[error("truncated {record} record (need {expected} bytes, have {actual})")]
    TruncatedRecord {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("utf-16 decoding failed: {0}")]
    InvalidUtf16(#[from] std::string::FromUtf16Error),

    #[error("corrupt dump: {0}")]
    Corrupt(&'static str),
}
