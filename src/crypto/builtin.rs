//! Cipher catalog backed by RustCrypto crates.

use std::collections::BTreeSet;

use crate::types::error::{QnmsError, QnmsResult};

use super::{Cipherer, DecryptError, EncryptionKey};
#[cfg(feature = "encryption")]
use super::{
    CIPHER_AES256_GCM, CIPHER_CHACHA20_POLY1305, HASH_SHA256, SECURE_HASH_ARGON2ID,
    SECURE_HASH_SHA512,
};

#[cfg(feature = "encryption")]
use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce, OsRng};
#[cfg(feature = "encryption")]
use sha2::{Digest, Sha256, Sha512};

/// Nonce length shared by both AEAD ciphers.
#[cfg(feature = "encryption")]
const NONCE_SIZE: usize = 12;

/// Fixed salt for the Argon2id verification hash. The hash must be
/// reproducible from the password alone.
#[cfg(feature = "encryption")]
const ARGON2_SALT: &[u8] = b"qnms-password-verification";

/// The default [`Cipherer`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCipherer;

impl BuiltinCipherer {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "encryption")]
impl Cipherer for BuiltinCipherer {
    fn available_cipher_ids(&self) -> BTreeSet<u8> {
        [CIPHER_AES256_GCM, CIPHER_CHACHA20_POLY1305].into_iter().collect()
    }

    fn is_hash_supported(&self, hash_id: u8) -> bool {
        hash_id == HASH_SHA256
    }

    fn is_secure_hash_supported(&self, secure_hash_id: u8) -> bool {
        matches!(secure_hash_id, SECURE_HASH_SHA512 | SECURE_HASH_ARGON2ID)
    }

    fn cipher_name(&self, cipher_id: u8) -> Option<&'static str> {
        match cipher_id {
            CIPHER_AES256_GCM => Some("AES-256-GCM"),
            CIPHER_CHACHA20_POLY1305 => Some("ChaCha20-Poly1305"),
            _ => None,
        }
    }

    fn hash(&self, password: &str, hash_id: u8) -> QnmsResult<EncryptionKey> {
        match hash_id {
            HASH_SHA256 => Ok(EncryptionKey::new(
                Sha256::digest(password.as_bytes()).to_vec(),
            )),
            other => Err(QnmsError::UnsupportedHash(other)),
        }
    }

    fn secure_hash(&self, password: &str, secure_hash_id: u8) -> QnmsResult<Vec<u8>> {
        match secure_hash_id {
            SECURE_HASH_SHA512 => Ok(Sha512::digest(password.as_bytes()).to_vec()),
            SECURE_HASH_ARGON2ID => {
                let mut out = [0u8; 32];
                argon2::Argon2::default()
                    .hash_password_into(password.as_bytes(), ARGON2_SALT, &mut out)
                    .map_err(|e| QnmsError::Encryption(e.to_string()))?;
                Ok(out.to_vec())
            }
            other => Err(QnmsError::UnsupportedSecureHash(other)),
        }
    }

    fn encrypt(&self, data: &[u8], key: &EncryptionKey, cipher_id: u8) -> QnmsResult<Vec<u8>> {
        match cipher_id {
            CIPHER_AES256_GCM => seal::<aes_gcm::Aes256Gcm>(key, data),
            CIPHER_CHACHA20_POLY1305 => seal::<chacha20poly1305::ChaCha20Poly1305>(key, data),
            other => Err(QnmsError::UnsupportedCipher(other)),
        }
    }

    fn decrypt(
        &self,
        data: &[u8],
        key: &EncryptionKey,
        cipher_id: u8,
    ) -> Result<Vec<u8>, DecryptError> {
        match cipher_id {
            CIPHER_AES256_GCM => open::<aes_gcm::Aes256Gcm>(key, data),
            CIPHER_CHACHA20_POLY1305 => open::<chacha20poly1305::ChaCha20Poly1305>(key, data),
            other => Err(DecryptError::UnsupportedCipher(other)),
        }
    }
}

/// Output layout: nonce followed by ciphertext and tag.
#[cfg(feature = "encryption")]
fn seal<C: Aead + AeadCore + KeyInit>(key: &EncryptionKey, data: &[u8]) -> QnmsResult<Vec<u8>> {
    let cipher = C::new_from_slice(key.as_bytes())
        .map_err(|_| QnmsError::Encryption("key has the wrong length for this cipher".into()))?;
    let nonce = C::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, data)
        .map_err(|_| QnmsError::Encryption("encryption failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

#[cfg(feature = "encryption")]
fn open<C: Aead + AeadCore + KeyInit>(
    key: &EncryptionKey,
    data: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    let cipher = C::new_from_slice(key.as_bytes()).map_err(|_| DecryptError::InvalidKey)?;
    if data.len() < NONCE_SIZE {
        return Err(DecryptError::Truncated);
    }
    let (nonce, sealed) = data.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), sealed)
        .map_err(|_| DecryptError::Authentication)
}

#[cfg(not(feature = "encryption"))]
impl Cipherer for BuiltinCipherer {
    fn available_cipher_ids(&self) -> BTreeSet<u8> {
        BTreeSet::new()
    }

    fn is_hash_supported(&self, _hash_id: u8) -> bool {
        false
    }

    fn is_secure_hash_supported(&self, _secure_hash_id: u8) -> bool {
        false
    }

    fn cipher_name(&self, _cipher_id: u8) -> Option<&'static str> {
        None
    }

    fn hash(&self, _password: &str, hash_id: u8) -> QnmsResult<EncryptionKey> {
        Err(QnmsError::UnsupportedHash(hash_id))
    }

    fn secure_hash(&self, _password: &str, secure_hash_id: u8) -> QnmsResult<Vec<u8>> {
        Err(QnmsError::UnsupportedSecureHash(secure_hash_id))
    }

    fn encrypt(&self, _data: &[u8], _key: &EncryptionKey, cipher_id: u8) -> QnmsResult<Vec<u8>> {
        Err(QnmsError::UnsupportedCipher(cipher_id))
    }

    fn decrypt(
        &self,
        _data: &[u8],
        _key: &EncryptionKey,
        cipher_id: u8,
    ) -> Result<Vec<u8>, DecryptError> {
        Err(DecryptError::UnsupportedCipher(cipher_id))
    }
}
