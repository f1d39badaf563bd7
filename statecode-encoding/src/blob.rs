//! Program blob persistence.
//!
//! A compiled program serializes as-is: the word buffers contain only
//! offsets, so no relocation or fix-up happens on either side.
//!
//! Blob layout (24-byte header + body):
//!
//! ```text
//! +--------+---------+----------+-----------+-----------+--------------+--------+
//! | magic  | version | reserved | table_len | instr_len | string_count | crc32c |
//! | 4 bytes| 2 bytes | 2 bytes  |  4 bytes  |  4 bytes  |   4 bytes    | 4 bytes|
//! +--------+---------+----------+-----------+-----------+--------------+--------+
//! | table words | instruction words | strings (u32 length + UTF-8 each)        |
//! +-------------+-------------------+------------------------------------------+
//! ```
//!
//! Lengths are in words (4 bytes); all integers are big-endian. The CRC32C
//! covers the whole body.

use crate::error::EncodingError;
use crate::program::Program;
use crate::strings::StringPool;
use bytes::{Buf, BufMut, BytesMut};
use std::fs;
use std::path::Path;

/// Magic bytes identifying program blobs: "SCBC"
pub const BLOB_MAGIC: [u8; 4] = *b"SCBC";

/// Blob format version.
pub const BLOB_VERSION: u16 = 1;

/// Size of the fixed blob header in bytes (4+2+2+4+4+4+4 = 24).
pub const BLOB_HEADER_SIZE: usize = 24;

/// Maximum accepted section size (16 Mi words = 64 MiB).
pub const MAX_SECTION_WORDS: usize = 16 * 1024 * 1024;

/// Encodes a program into a blob.
pub fn encode(program: &Program) -> BytesMut {
    let table = program.table_words();
    let instructions = program.instructions();
    let strings = program.strings();

    let mut body = BytesMut::with_capacity(4 * (table.len() + instructions.len()));
    for &word in table {
        body.put_i32(word);
    }
    for &word in instructions {
        body.put_i32(word);
    }
    for s in strings.iter() {
        body.put_u32(s.len() as u32);
        body.put_slice(s.as_bytes());
    }

    let mut buf = BytesMut::with_capacity(BLOB_HEADER_SIZE + body.len());
    buf.put_slice(&BLOB_MAGIC);
    buf.put_u16(BLOB_VERSION);
    buf.put_u16(0);
    buf.put_u32(table.len() as u32);
    buf.put_u32(instructions.len() as u32);
    buf.put_u32(strings.len() as u32);
    buf.put_u32(crc32c::crc32c(&body));
    buf.extend_from_slice(&body);
    buf
}

/// Decodes a program from a blob.
///
/// Returns `Ok(Some(program))` for a complete, valid blob, `Ok(None)` if
/// more data is needed, or `Err` on corruption.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Program>, EncodingError> {
    if buf.len() < BLOB_HEADER_SIZE {
        return Ok(None);
    }

    let magic: [u8; 4] = buf[0..4].try_into().unwrap();
    if magic != BLOB_MAGIC {
        return Err(EncodingError::InvalidMagic(magic));
    }

    let version = u16::from_be_bytes([buf[4], buf[5]]);
    if version != BLOB_VERSION {
        return Err(EncodingError::UnsupportedVersion(version as i32));
    }

    let table_len = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
    let instr_len = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]) as usize;
    let string_count = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]) as usize;
    let crc_expected = u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]);

    for section in [table_len, instr_len] {
        if section > MAX_SECTION_WORDS {
            return Err(EncodingError::SectionTooLarge {
                words: section,
                max: MAX_SECTION_WORDS,
            });
        }
    }

    // Words are fixed-size; the string section length is only known after
    // walking it, so completeness is checked incrementally below.
    let words_len = 4 * (table_len + instr_len);
    if buf.len() < BLOB_HEADER_SIZE + words_len {
        return Ok(None);
    }

    let mut string_end = BLOB_HEADER_SIZE + words_len;
    for _ in 0..string_count {
        if buf.len() < string_end + 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([
            buf[string_end],
            buf[string_end + 1],
            buf[string_end + 2],
            buf[string_end + 3],
        ]) as usize;
        string_end += 4 + len;
        if buf.len() < string_end {
            return Ok(None);
        }
    }

    let crc_actual = crc32c::crc32c(&buf[BLOB_HEADER_SIZE..string_end]);
    if crc_actual != crc_expected {
        return Err(EncodingError::ChecksumMismatch {
            expected: crc_expected,
            actual: crc_actual,
        });
    }

    buf.advance(BLOB_HEADER_SIZE);

    let mut table = Vec::with_capacity(table_len);
    for _ in 0..table_len {
        table.push(buf.get_i32());
    }
    let mut instructions = Vec::with_capacity(instr_len);
    for _ in 0..instr_len {
        instructions.push(buf.get_i32());
    }
    let mut strings = Vec::with_capacity(string_count);
    for _ in 0..string_count {
        let len = buf.get_u32() as usize;
        let bytes = buf.split_to(len);
        let s = std::str::from_utf8(&bytes).map_err(|_| EncodingError::InvalidUtf8)?;
        strings.push(s.to_string());
    }

    let program = Program::new(table, instructions, StringPool::from_strings(strings))?;
    Ok(Some(program))
}

/// Writes a program blob to `path`.
pub fn save(program: &Program, path: &Path) -> Result<(), EncodingError> {
    let blob = encode(program);
    fs::write(path, &blob)?;
    Ok(())
}

/// Reads a program blob from `path`.
pub fn load(path: &Path) -> Result<Program, EncodingError> {
    let data = fs::read(path)?;
    let mut buf = BytesMut::from(&data[..]);
    let available = buf.len();
    decode(&mut buf)?.ok_or(EncodingError::Truncated {
        needed: BLOB_HEADER_SIZE,
        available,
    })
}
