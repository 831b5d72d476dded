//! Persisted payload key with race-safe first-time generation.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sealgate_common::crypto::{PayloadCipher, KEY_LEN};
use sealgate_domain::constants::PAYLOAD_KEY_SLOT;
use sealgate_domain::{CryptoErrorKind, InterceptError, Result, SecretKeyMaterial};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::ports::DurableStore;

/// Resolves the installation key once and keeps it in memory.
///
/// The key lives base64-encoded under `secret:payload-key`. A missing key is
/// generated and written with compare-and-set against an empty slot; the
/// loser of a concurrent first-time generation adopts the winner's key.
pub struct KeyVault {
    store: Arc<dyn DurableStore>,
    key: OnceCell<SecretKeyMaterial>,
}

impl std::fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVault").field("loaded", &self.key.initialized()).finish()
    }
}

impl KeyVault {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store, key: OnceCell::new() }
    }

    /// The installation key, loading or generating it on first use.
    ///
    /// # Errors
    /// - `Storage` when the store cannot be read or written.
    /// - `Crypto(InvalidKey)` when the stored key is corrupt.
    pub async fn key(&self) -> Result<&SecretKeyMaterial> {
        self.key.get_or_try_init(|| self.load_or_create()).await
    }

    #[instrument(skip(self))]
    async fn load_or_create(&self) -> Result<SecretKeyMaterial> {
        if let Some(stored) = self.store.get(PAYLOAD_KEY_SLOT).await? {
            debug!("loaded existing payload key");
            return decode_key(&stored);
        }

        let fresh = PayloadCipher::generate_key();
        let encoded = BASE64.encode(&fresh[..]);

        if self.store.compare_and_set(PAYLOAD_KEY_SLOT, None, encoded.as_bytes()).await? {
            info!("generated and persisted new payload key");
            return Ok(SecretKeyMaterial::new(fresh.to_vec()));
        }

        debug!("payload key written concurrently; adopting stored key");
        let stored = self.store.get(PAYLOAD_KEY_SLOT).await?.ok_or_else(|| {
            InterceptError::Internal("payload key vanished after lost compare-and-set".into())
        })?;
        decode_key(&stored)
    }
}

fn decode_key(stored: &[u8]) -> Result<SecretKeyMaterial> {
    let bytes = BASE64.decode(stored).map_err(|e| {
        InterceptError::crypto(CryptoErrorKind::InvalidKey, format!("stored key is not base64: {e}"))
    })?;
    if bytes.len() != KEY_LEN {
        return Err(InterceptError::crypto(
            CryptoErrorKind::InvalidKey,
            format!("stored key is {} bytes, expected {KEY_LEN}", bytes.len()),
        ));
    }
    Ok(SecretKeyMaterial::new(bytes))
}
