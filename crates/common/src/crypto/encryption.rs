//! AES-256-GCM payload cipher with a text-safe wire framing.
//!
//! A sealed payload is `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! [`PayloadCipher::encrypt_to_string`] wraps that in standard base64 so the
//! result can travel in any text-based HTTP body.
//!
//! ```rust
//! use sealgate_common::crypto::PayloadCipher;
//!
//! let key = PayloadCipher::generate_key();
//! let cipher = PayloadCipher::new(&key[..])?;
//!
//! let encoded = cipher.encrypt_to_string(b"sensitive data")?;
//! let decrypted = cipher.decrypt_from_string(&encoded)?;
//! assert_eq!(decrypted, b"sensitive data");
//! # Ok::<(), sealgate_common::crypto::CipherError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Failures raised by [`PayloadCipher`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKey { expected: usize, actual: usize },

    /// Input is not a well-formed sealed payload (bad base64, too short).
    #[error("malformed ciphertext framing: {0}")]
    Framing(String),

    /// The GCM tag did not verify under this key.
    #[error("ciphertext failed authentication")]
    Authentication,

    #[error("encryption failed: {0}")]
    Encryption(String),
}

/// AES-256-GCM cipher bound to a single key.
#[derive(Clone)]
pub struct PayloadCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCipher")
            .field("key", &"[REDACTED]")
            .field("algorithm", &"AES-256-GCM")
            .finish()
    }
}

impl PayloadCipher {
    /// Create a cipher from a raw 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKey { expected: KEY_LEN, actual: key.len() });
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CipherError::InvalidKey { expected: KEY_LEN, actual: key.len() })?;

        Ok(Self { cipher })
    }

    /// Generate a random 32-byte symmetric key. The buffer is wiped on drop.
    pub fn generate_key() -> Zeroizing<[u8; KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        key
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Returns `nonce || ciphertext || tag`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Reverse [`PayloadCipher::seal`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Framing(format!(
                "payload is {} bytes, minimum is {}",
                sealed.len(),
                NONCE_LEN + TAG_LEN
            )));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Authentication)
    }

    /// Encrypt bytes and encode the sealed payload as a base64 string.
    pub fn encrypt_to_string(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        Ok(BASE64.encode(self.seal(plaintext)?))
    }

    /// Decode a base64 string and decrypt the contained payload.
    ///
    /// Surrounding ASCII whitespace is ignored.
    pub fn decrypt_from_string(&self, encoded: &str) -> Result<Vec<u8>, CipherError> {
        let sealed = BASE64
            .decode(encoded.trim())
            .map_err(|e| CipherError::Framing(format!("base64 decode failed: {e}")))?;
        self.open(&sealed)
    }
}
