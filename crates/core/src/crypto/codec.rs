//! Whole-buffer symmetric encryption of HTTP bodies.
//!
//! Ciphertext is the base64 text produced by
//! [`PayloadCipher::encrypt_to_string`], so it occupies the HTTP body exactly
//! where the plaintext would. The mode (AES-256-GCM) and key size are fixed;
//! changing them invalidates every payload sealed before.

use sealgate_common::crypto::{CipherError, PayloadCipher};
use sealgate_domain::{CryptoError, CryptoErrorKind, SecretKeyMaterial};

/// Stateless encrypt/decrypt over byte buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoCodec;

impl CryptoCodec {
    /// Encrypt `plaintext` under `key`.
    ///
    /// # Errors
    /// `InvalidKey` when the key material is not a 32-byte AES key.
    pub fn encrypt(plaintext: &[u8], key: &SecretKeyMaterial) -> Result<Vec<u8>, CryptoError> {
        let cipher = PayloadCipher::new(key.expose()).map_err(map_cipher_error)?;
        let encoded = cipher.encrypt_to_string(plaintext).map_err(map_cipher_error)?;
        Ok(encoded.into_bytes())
    }

    /// Decrypt a body produced by [`CryptoCodec::encrypt`].
    ///
    /// # Errors
    /// - `BadCiphertext` when the input is not valid framing (not UTF-8,
    ///   not base64, or too short).
    /// - `KeyMismatch` when GCM authentication fails.
    pub fn decrypt(ciphertext: &[u8], key: &SecretKeyMaterial) -> Result<Vec<u8>, CryptoError> {
        let cipher = PayloadCipher::new(key.expose()).map_err(map_cipher_error)?;
        let encoded = std::str::from_utf8(ciphertext).map_err(|e| {
            CryptoError::new(CryptoErrorKind::BadCiphertext, format!("ciphertext is not text: {e}"))
        })?;
        cipher.decrypt_from_string(encoded).map_err(map_cipher_error)
    }
}

fn map_cipher_error(err: CipherError) -> CryptoError {
    let kind = match &err {
        CipherError::InvalidKey { .. } => CryptoErrorKind::InvalidKey,
        CipherError::Framing(_) | CipherError::Encryption(_) => CryptoErrorKind::BadCiphertext,
        CipherError::Authentication => CryptoErrorKind::KeyMismatch,
    };
    CryptoError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretKeyMaterial {
        SecretKeyMaterial::new(PayloadCipher::generate_key().to_vec())
    }

    /// Validates `CryptoCodec::encrypt` behavior for the round trip
    /// scenario.
    ///
    /// Assertions:
    /// - `decrypt(encrypt(p)) == p` for several payloads.
    /// - Encryption is not the identity for non-empty payloads.
    #[test]
    fn test_round_trip() {
        let key = key();
        let samples: [&[u8]; 4] = [b"", b"x", br#"{"id":1,"title":"x"}"#, &[0u8, 255, 7, 9]];
        for plaintext in samples {
            let ciphertext = CryptoCodec::encrypt(plaintext, &key).unwrap();
            if !plaintext.is_empty() {
                assert_ne!(ciphertext, plaintext);
            }
            assert_eq!(CryptoCodec::decrypt(&ciphertext, &key).unwrap(), plaintext);
        }
    }

    /// Validates `CryptoCodec::decrypt` behavior for the error taxonomy
    /// scenario.
    ///
    /// Assertions:
    /// - Garbage input is `BadCiphertext`.
    /// - Ciphertext from another key is `KeyMismatch`.
    /// - A short key is `InvalidKey`.
    #[test]
    fn test_error_kinds() {
        let key = key();

        let err = CryptoCodec::decrypt(b"%%%not-base64", &key).unwrap_err();
        assert_eq!(err.kind, CryptoErrorKind::BadCiphertext);

        let err = CryptoCodec::decrypt(&[0xff, 0xfe], &key).unwrap_err();
        assert_eq!(err.kind, CryptoErrorKind::BadCiphertext);

        let foreign = CryptoCodec::encrypt(b"secret", &self::key()).unwrap();
        let err = CryptoCodec::decrypt(&foreign, &key).unwrap_err();
        assert_eq!(err.kind, CryptoErrorKind::KeyMismatch);

        let short = SecretKeyMaterial::new(vec![1u8; 16]);
        let err = CryptoCodec::encrypt(b"x", &short).unwrap_err();
        assert_eq!(err.kind, CryptoErrorKind::InvalidKey);
    }
}
