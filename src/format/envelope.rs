//! The outer file layout: header, data-block length, data block, CRC-32.

use serde::Serialize;

use crate::types::{
    FileHeader, FormatVersion, QnmsError, QnmsResult, MIN_FILE_SIZE, QNMS_SIGNATURE,
};

use super::boib::{MemoryBuffer, SliceBuffer};
use super::checksum::crc32;

/// Assemble a complete file from a header and a finished data block.
pub fn seal(header: &FileHeader, data: &[u8]) -> Vec<u8> {
    let mut buf = MemoryBuffer::memory();
    header.write_to(&mut buf);
    buf.write(data.len() as u32);
    buf.write_bytes(data);
    let crc = crc32(buf.bytes());
    buf.write(crc);
    buf.into_bytes()
}

/// Stored and computed CRC of a complete file.
fn checksums(bytes: &[u8]) -> (u32, u32) {
    let (body, tail) = bytes.split_at(bytes.len() - 4);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    (stored, crc32(body))
}

fn check_shape(bytes: &[u8]) -> QnmsResult<()> {
    if (bytes.len() as u64) < MIN_FILE_SIZE {
        return Err(QnmsError::Truncated);
    }
    if bytes[..QNMS_SIGNATURE.len()] != QNMS_SIGNATURE {
        return Err(QnmsError::InvalidSignature);
    }
    Ok(())
}

/// Parse the header and the data-block length. Returns the header and the
/// byte range of the data block.
fn parse(bytes: &[u8]) -> QnmsResult<(FileHeader, usize, usize)> {
    let body = &bytes[..bytes.len() - 4];
    let mut buf = SliceBuffer::reader(body);
    let header = FileHeader::read_from(&mut buf)?;
    if buf.remaining() < 4 {
        return Err(QnmsError::Truncated);
    }
    let len = u64::from(buf.read_u32());
    let start = buf.pos();
    if len != buf.remaining() {
        return Err(QnmsError::Corrupt(format!(
            "data block announces {} bytes but {} follow",
            len,
            buf.remaining()
        )));
    }
    Ok((header, start as usize, (start + len) as usize))
}

/// Verify a complete file and split it into header and data block.
///
/// Checks run in order: size, signature, CRC, header, data length. No record
/// is looked at before the CRC has been verified.
pub fn open(bytes: &[u8]) -> QnmsResult<(FileHeader, &[u8])> {
    check_shape(bytes)?;
    let (stored, computed) = checksums(bytes);
    if stored != computed {
        return Err(QnmsError::CrcMismatch { stored, computed });
    }
    let (header, start, end) = parse(bytes)?;
    Ok((header, &bytes[start..end]))
}

/// Envelope facts, as reported without decrypting or parsing records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub version: FormatVersion,
    pub compression_level: u8,
    pub cipher_id: u8,
    pub hash_id: Option<u8>,
    pub secure_hash_id: Option<u8>,
    pub data_len: u64,
    pub file_len: u64,
    pub stored_crc: u32,
    pub crc_ok: bool,
}

/// Describe a file. A bad CRC is reported in [`FileInfo::crc_ok`] rather
/// than as an error.
pub fn inspect(bytes: &[u8]) -> QnmsResult<FileInfo> {
    check_shape(bytes)?;
    let (stored, computed) = checksums(bytes);
    let (header, start, end) = parse(bytes)?;
    Ok(FileInfo {
        version: header.version,
        compression_level: header.compression_level,
        cipher_id: header.cipher_id,
        hash_id: header.cipher.as_ref().map(|c| c.hash_id),
        secure_hash_id: header.cipher.as_ref().map(|c| c.secure_hash_id),
        data_len: (end - start) as u64,
        file_len: bytes.len() as u64,
        stored_crc: stored,
        crc_ok: stored == computed,
    })
}
