//! Symmetric payload encryption shared by the interceptor crates.

pub mod encryption;

pub use encryption::{CipherError, PayloadCipher, KEY_LEN, NONCE_LEN, TAG_LEN};
