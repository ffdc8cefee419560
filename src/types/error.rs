//! Error types for the qnms library.

use thiserror::Error;

/// All errors that can occur while saving, loading or editing a document.
#[derive(Error, Debug)]
pub enum QnmsError {
    /// The file does not start with the qnms signature.
    #[error("Not a qnms document: invalid file signature")]
    InvalidSignature,

    /// File is empty or truncated.
    #[error("File is empty or truncated")]
    Truncated,

    /// Whole-file checksum does not match.
    #[error("File is corrupted: CRC mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    CrcMismatch { stored: u32, computed: u32 },

    /// The file was written by a newer, incompatible generation of the format.
    #[error("File was created by a newer version of the format ({found:#06x}) and cannot be loaded")]
    NewerVersion { found: u16 },

    /// The file's version is not one this reader (or writer) knows.
    #[error("Unsupported format version: {0:#06x}")]
    UnsupportedVersion(u16),

    /// Cipher ID not available in this build.
    #[error("Cipher {0} is not supported")]
    UnsupportedCipher(u8),

    /// Key-derivation hash ID not available in this build.
    #[error("Hash {0} is not supported")]
    UnsupportedHash(u8),

    /// Password-verification hash ID not available in this build.
    #[error("Secure hash {0} is not supported")]
    UnsupportedSecureHash(u8),

    /// Encryption or decryption failed.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Compression level out of range.
    #[error("Invalid compression level {0} (expected 0..=9)")]
    InvalidCompressionLevel(u8),

    /// Compression or decompression failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Structural corruption found while parsing records.
    #[error("File corrupted: {0}")]
    Corrupt(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializer configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Another save or load is already running against this document.
    #[error("Document is busy with another save or load")]
    Busy,

    /// An edit would break the document's structure.
    #[error("Invalid document operation: {0}")]
    InvalidOperation(String),

    /// The user declined to continue at an interaction point.
    #[error("Aborted: {0}")]
    Aborted(String),
}

/// Convenience result type for qnms operations.
pub type QnmsResult<T> = Result<T, QnmsError>;

impl QnmsError {
    /// Whether this error is the user's deliberate choice rather than a fault.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}
