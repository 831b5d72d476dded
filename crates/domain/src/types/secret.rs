use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key bytes for payload encryption.
///
/// Generated once per installation and never rotated. The buffer is wiped on
/// drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyMaterial {
    encoded_key: Vec<u8>,
}

impl SecretKeyMaterial {
    pub fn new(encoded_key: Vec<u8>) -> Self {
        Self { encoded_key }
    }

    /// Raw key bytes.
    pub fn expose(&self) -> &[u8] {
        &self.encoded_key
    }

    pub fn len(&self) -> usize {
        self.encoded_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded_key.is_empty()
    }
}

impl fmt::Debug for SecretKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKeyMaterial")
            .field("encoded_key", &"[REDACTED]")
            .field("len", &self.encoded_key.len())
            .finish()
    }
}
