//! File header for .qnms files.

use std::fmt;
use std::io::{Read, Seek, Write};

use serde::Serialize;

use crate::format::boib::BoiBuffer;
use crate::types::error::{QnmsError, QnmsResult};
use crate::types::QNMS_SIGNATURE;

/// Bytes before the optional cipher block: signature, version, level, cipher.
pub const FIXED_HEADER_SIZE: u64 = 13;

/// Smallest possible file: fixed header, data length, empty data, CRC.
pub const MIN_FILE_SIZE: u64 = FIXED_HEADER_SIZE + 4 + 4;

/// 16-bit format version: high byte is the breaking generation, low byte the
/// additive revision within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FormatVersion(pub u16);

impl FormatVersion {
    pub fn new(major: u8, minor: u8) -> Self {
        Self(u16::from_be_bytes([major, minor]))
    }

    pub fn major(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn minor(&self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Password material stored ahead of an encrypted data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherHeader {
    /// Hash used to derive the encryption key.
    pub hash_id: u8,
    /// Hash used for the stored password check.
    pub secure_hash_id: u8,
    /// Password check value.
    pub secure_hash: Vec<u8>,
}

/// Everything in a .qnms file before the data-block length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: FormatVersion,
    /// 0 = uncompressed, 1..=9 = zlib level.
    pub compression_level: u8,
    /// 0 = not encrypted.
    pub cipher_id: u8,
    /// Present exactly when `cipher_id != 0`.
    pub cipher: Option<CipherHeader>,
}

impl FileHeader {
    /// Header for an unencrypted file.
    pub fn plain(version: u16, compression_level: u8) -> Self {
        Self {
            version: FormatVersion(version),
            compression_level,
            cipher_id: 0,
            cipher: None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher_id != 0
    }

    /// Write the header. Returns bytes written.
    ///
    /// Layout (all little-endian):
    /// - 9 bytes: signature
    /// - u16: version
    /// - u8: compression level
    /// - u8: cipher ID
    /// - if cipher ID != 0: u8 hash ID, u8 secure hash ID,
    ///   u32 secure hash length, secure hash bytes
    pub fn write_to<D: Write + Seek>(&self, buf: &mut BoiBuffer<D>) -> usize {
        let mut n = buf.write_bytes(&QNMS_SIGNATURE);
        n += buf.write(self.version.0);
        n += buf.write(self.compression_level);
        n += buf.write(self.cipher_id);
        if self.cipher_id != 0 {
            if let Some(cipher) = &self.cipher {
                n += buf.write(cipher.hash_id);
                n += buf.write(cipher.secure_hash_id);
                n += buf.write(cipher.secure_hash.len() as u32);
                n += buf.write_bytes(&cipher.secure_hash);
            }
        }
        n
    }

    /// Read and validate a header.
    pub fn read_from<D: Read + Seek>(buf: &mut BoiBuffer<D>) -> QnmsResult<Self> {
        if buf.remaining() < FIXED_HEADER_SIZE {
            return Err(QnmsError::Truncated);
        }
        let mut signature = [0u8; 9];
        buf.read_bytes(&mut signature);
        if signature != QNMS_SIGNATURE {
            return Err(QnmsError::InvalidSignature);
        }

        let version = FormatVersion(buf.read_u16());
        let compression_level = buf.read_u8();
        let cipher_id = buf.read_u8();

        let cipher = if cipher_id != 0 {
            if buf.remaining() < 6 {
                return Err(QnmsError::Truncated);
            }
            let hash_id = buf.read_u8();
            let secure_hash_id = buf.read_u8();
            let len = u64::from(buf.read_u32());
            if len > buf.remaining() {
                return Err(QnmsError::Truncated);
            }
            let mut secure_hash = vec![0u8; len as usize];
            buf.read_bytes(&mut secure_hash);
            Some(CipherHeader {
                hash_id,
                secure_hash_id,
                secure_hash,
            })
        } else {
            None
        };

        Ok(Self {
            version,
            compression_level,
            cipher_id,
            cipher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::boib::{MemoryBuffer, SliceBuffer};

    #[test]
    fn version_parts() {
        let v = FormatVersion(0x0102);
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(FormatVersion::new(1, 2), v);
        assert_eq!(v.to_string(), "1.2");
    }

    #[test]
    fn plain_header_layout() {
        let mut buf = MemoryBuffer::memory();
        let n = FileHeader::plain(0x0101, 5).write_to(&mut buf);
        assert_eq!(n as u64, FIXED_HEADER_SIZE);
        let bytes = buf.into_bytes();
        assert_eq!(&bytes[..9], &QNMS_SIGNATURE);
        assert_eq!(&bytes[9..], &[0x01, 0x01, 5, 0]);
    }

    #[test]
    fn encrypted_header_roundtrip() {
        let header = FileHeader {
            version: FormatVersion(0x0101),
            compression_level: 9,
            cipher_id: 1,
            cipher: Some(CipherHeader {
                hash_id: 1,
                secure_hash_id: 2,
                secure_hash: vec![0xAB; 32],
            }),
        };
        let mut buf = MemoryBuffer::memory();
        header.write_to(&mut buf);
        let bytes = buf.into_bytes();
        assert_eq!(bytes.len(), 13 + 6 + 32);

        let read = FileHeader::read_from(&mut SliceBuffer::reader(&bytes)).unwrap();
        assert_eq!(read, header);
    }

    #[test]
    fn bad_signature_and_truncation() {
        let mut bytes = QNMS_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[1, 1, 0, 0]);
        bytes[1] = b'X';
        assert!(matches!(
            FileHeader::read_from(&mut SliceBuffer::reader(&bytes)),
            Err(QnmsError::InvalidSignature)
        ));
        assert!(matches!(
            FileHeader::read_from(&mut SliceBuffer::reader(&bytes[..5])),
            Err(QnmsError::Truncated)
        ));

        let mut enc = QNMS_SIGNATURE.to_vec();
        enc.extend_from_slice(&[1, 1, 0, 1, 1, 1, 200, 0, 0, 0, 1, 2]);
        assert!(matches!(
            FileHeader::read_from(&mut SliceBuffer::reader(&enc)),
            Err(QnmsError::Truncated)
        ));
    }
}
