//! Fixed-width big-endian integer codec over any raw byte stream.
//!
//! These functions know nothing about the journal layout; they are the only
//! place integers cross the byte boundary.

use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("truncated integer: expected {expected} bytes, read {actual}")]
    TruncatedInteger { expected: usize, actual: usize },
}

pub fn put_u8<W: Write>(writer: &mut W, byte: u8) -> Result<(), CodecError> {
    writer.write_all(&[byte])?;
    Ok(())
}

/// Reads one byte; `Ok(None)` at end of stream.
pub fn get_u8<R: Read>(reader: &mut R) -> Result<Option<u8>, CodecError> {
    let mut buf = [0u8; 1];
    match fill(reader, &mut buf)? {
        0 => Ok(None),
        _ => Ok(Some(buf[0])),
    }
}

pub fn put_i32<W: Write>(writer: &mut W, value: i32) -> Result<(), CodecError> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn get_i32<R: Read>(reader: &mut R) -> Result<i32, CodecError> {
    let mut buf = [0u8; 4];
    let read = fill(reader, &mut buf)?;
    if read < buf.len() {
        return Err(CodecError::TruncatedInteger {
            expected: buf.len(),
            actual: read,
        });
    }
    Ok(i32::from_be_bytes(buf))
}

pub fn put_i64<W: Write>(writer: &mut W, value: i64) -> Result<(), CodecError> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn get_i64<R: Read>(reader: &mut R) -> Result<i64, CodecError> {
    let mut buf = [0u8; 8];
    let read = fill(reader, &mut buf)?;
    if read < buf.len() {
        return Err(CodecError::TruncatedInteger {
            expected: buf.len(),
            actual: read,
        });
    }
    Ok(i64::from_be_bytes(buf))
}

pub fn put_bytes<W: Write>(writer: &mut W, buf: &[u8]) -> Result<(), CodecError> {
    writer.write_all(buf)?;
    Ok(())
}

/// Reads at most `buf.len()` bytes, stopping at end of stream. Returns the
/// count actually read.
pub fn get_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, CodecError> {
    Ok(fill(reader, buf)?)
}

/// Writes `s` up to (not including) its first zero byte. Returns the count
/// written.
pub fn put_cstr_bytes<W: Write>(writer: &mut W, s: &[u8]) -> Result<i64, CodecError> {
    let len = s.iter().position(|byte| *byte == 0).unwrap_or(s.len());
    writer.write_all(&s[..len])?;
    Ok(len as i64)
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(read)
}
