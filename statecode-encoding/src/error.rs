//! Encoding error types.

use thiserror::Error;

/// Errors from reading, validating or persisting an encoded program.
///
/// Apart from [`EncodingError::Io`], every variant indicates a corrupt or
/// mismatched buffer. A validated program never produces them at runtime.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("word offset {offset} out of bounds (buffer is {len} words)")]
    OutOfBounds { offset: usize, len: usize },

    #[error("unknown instruction tag {tag} at word offset {offset}")]
    UnknownInstruction { tag: i32, offset: usize },

    #[error("expected {expected} at word offset {offset}, found tag {found}")]
    UnexpectedInstruction {
        expected: &'static str,
        found: i32,
        offset: usize,
    },

    #[error("instruction at word offset {offset} overruns its stream (ends at {end}, stream ends at {limit})")]
    StreamOverrun {
        offset: usize,
        end: usize,
        limit: usize,
    },

    #[error("negative count {count} at word offset {offset}")]
    NegativeCount { count: i32, offset: usize },

    #[error("{what} index {index} out of range (count is {count})")]
    IndexOutOfRange {
        what: &'static str,
        index: i32,
        count: i32,
    },

    #[error("if instruction at word offset {offset} has {conditions} conditions but {blocks} blocks")]
    BranchMismatch {
        offset: usize,
        conditions: i32,
        blocks: i32,
    },

    #[error("invalid state table: {reason}")]
    InvalidTable { reason: String },

    #[error("unsupported format version {0}")]
    UnsupportedVersion(i32),

    #[error("string id {id} out of range (pool has {count} strings)")]
    StringOutOfRange { id: i32, count: usize },

    #[error("invalid blob magic: {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("blob checksum mismatch: expected {expected:#010x}, actual {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("blob truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("blob section of {words} words exceeds maximum of {max}")]
    SectionTooLarge { words: usize, max: usize },

    #[error("invalid UTF-8 in string pool")]
    InvalidUtf8,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
