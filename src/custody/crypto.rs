//! Owner-scoped mnemonic encryption
//!
//! The symmetric key for a wallet is PBKDF2-HMAC-SHA256 over the process
//! master secret, salted with the owner's address. The mnemonic is sealed
//! with AES-256-GCM under that key and stored as `iv:authTag:ciphertext`
//! (hex). Decryption under any other owner's key fails the tag check,
//! which is what ownership verification relies on.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// Default PBKDF2 iteration count
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Master secret is empty")]
    EmptySecret,
    #[error("Malformed ciphertext: {0}")]
    Malformed(String),
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Encryption failed")]
    EncryptionFailed,
}

/// Key derived for one owner address
#[derive(Clone)]
pub struct OwnerKey([u8; KEY_LEN]);

impl std::fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OwnerKey(***)")
    }
}

/// Master secret plus KDF cost; derives per-owner keys
#[derive(Clone)]
pub struct KeyDeriver {
    master_secret: Vec<u8>,
    iterations: u32,
}

impl std::fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDeriver")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl KeyDeriver {
    pub fn new(master_secret: impl Into<Vec<u8>>, iterations: u32) -> Result<Self, CryptoError> {
        let master_secret = master_secret.into();
        if master_secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }
        Ok(Self {
            master_secret,
            iterations: iterations.max(1),
        })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Slow: run off the async executor
    pub fn derive(&self, owner_address: &str) -> OwnerKey {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(&self.master_secret, owner_address.as_bytes(), self.iterations, &mut key);
        OwnerKey(key)
    }
}

fn cipher(key: &OwnerKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0))
}

/// Seal `plaintext` under `key` with a fresh random IV
pub fn encrypt(key: &OwnerKey, plaintext: &str) -> Result<String, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let sealed = cipher(key)
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    // aes-gcm appends the tag to the ciphertext
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    Ok(format!("{}:{}:{}", hex::encode(iv), hex::encode(tag), hex::encode(ciphertext)))
}

/// Open an `iv:authTag:ciphertext` blob. Fails on any tag mismatch.
pub fn decrypt(key: &OwnerKey, blob: &str) -> Result<String, CryptoError> {
    let mut parts = blob.split(':');
    let (iv, tag, ciphertext) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(iv), Some(tag), Some(ct), None) => (iv, tag, ct),
        _ => return Err(CryptoError::Malformed("expected iv:authTag:ciphertext".to_string())),
    };

    let iv = hex::decode(iv).map_err(|e| CryptoError::Malformed(format!("iv: {}", e)))?;
    let tag = hex::decode(tag).map_err(|e| CryptoError::Malformed(format!("authTag: {}", e)))?;
    let mut sealed =
        hex::decode(ciphertext).map_err(|e| CryptoError::Malformed(format!("ciphertext: {}", e)))?;

    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(CryptoError::Malformed("bad iv or tag length".to_string()));
    }
    sealed.extend_from_slice(&tag);

    let plaintext = cipher(key)
        .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}
