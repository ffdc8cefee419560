//! Password-based symmetric encryption of the document data block.
//!
//! Algorithms are identified by the small integer IDs stored in the file
//! header. What is actually available depends on the `encryption` feature;
//! without it the catalog is empty and encrypted files report
//! "cipher not supported".

mod builtin;

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::types::error::{QnmsError, QnmsResult};

pub use builtin::BuiltinCipherer;

/// "No encryption" in the file header.
pub const CIPHER_NONE: u8 = 0;
/// AES-256 in GCM mode.
pub const CIPHER_AES256_GCM: u8 = 1;
/// ChaCha20-Poly1305.
pub const CIPHER_CHACHA20_POLY1305: u8 = 2;

/// SHA-256 key derivation (32-byte keys).
pub const HASH_SHA256: u8 = 1;

/// SHA-512 password-verification hash.
pub const SECURE_HASH_SHA512: u8 = 1;
/// Argon2id password-verification hash.
pub const SECURE_HASH_ARGON2ID: u8 = 2;

/// Derived symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey(Vec<u8>);

impl EncryptionKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey(<redacted>)")
    }
}

/// Why a decrypt did not produce plaintext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("cipher {0} is not supported")]
    UnsupportedCipher(u8),
    #[error("key has the wrong length for this cipher")]
    InvalidKey,
    #[error("ciphertext is too short")]
    Truncated,
    #[error("wrong key or corrupted ciphertext")]
    Authentication,
}

impl From<DecryptError> for QnmsError {
    fn from(e: DecryptError) -> Self {
        match e {
            DecryptError::UnsupportedCipher(id) => QnmsError::UnsupportedCipher(id),
            other => QnmsError::Encryption(other.to_string()),
        }
    }
}

/// Symmetric cipher catalog and password hashing.
pub trait Cipherer: Send + Sync {
    /// Cipher IDs this build can encrypt and decrypt with.
    fn available_cipher_ids(&self) -> BTreeSet<u8>;

    fn is_cipher_supported(&self, cipher_id: u8) -> bool {
        self.available_cipher_ids().contains(&cipher_id)
    }

    fn is_hash_supported(&self, hash_id: u8) -> bool;

    fn is_secure_hash_supported(&self, secure_hash_id: u8) -> bool;

    /// Human-readable cipher name, for settings and reports.
    fn cipher_name(&self, cipher_id: u8) -> Option<&'static str>;

    /// Derive the encryption key from a password.
    fn hash(&self, password: &str, hash_id: u8) -> QnmsResult<EncryptionKey>;

    /// One-way hash stored in the file to recognise the right password before decrypting.
    /// Never equal to the encryption key.
    fn secure_hash(&self, password: &str, secure_hash_id: u8) -> QnmsResult<Vec<u8>>;

    fn encrypt(&self, data: &[u8], key: &EncryptionKey, cipher_id: u8) -> QnmsResult<Vec<u8>>;

    /// Decrypt; a wrong key or tampered data is an explicit error, never garbage.
    fn decrypt(
        &self,
        data: &[u8],
        key: &EncryptionKey,
        cipher_id: u8,
    ) -> Result<Vec<u8>, DecryptError>;
}
