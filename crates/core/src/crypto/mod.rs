//! Payload encryption: the codec and the persisted key it runs under.

pub mod codec;
pub mod key_vault;

pub use codec::CryptoCodec;
pub use key_vault::KeyVault;
