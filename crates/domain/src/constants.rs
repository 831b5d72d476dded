//! Domain constants
//!
//! Storage namespaces, wire header names, and policy defaults shared by every
//! layer.

// Durable store namespaces
pub const CACHE_PREFIX: &str = "cache:";
pub const QUEUE_PREFIX: &str = "queue:";
pub const SECRET_PREFIX: &str = "secret:";

/// Store slot holding the base64-encoded payload key.
pub const PAYLOAD_KEY_SLOT: &str = "secret:payload-key";
/// Store slot holding the queue head/tail cursor.
pub const QUEUE_META_KEY: &str = "queue:meta";

// Content types
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const CIPHERTEXT_CONTENT_TYPE: &str = "text/plain";

// Headers
pub const CONTENT_TYPE_HEADER: &str = "content-type";
/// Carries the plaintext content type while the body is encrypted.
pub const LOGICAL_CONTENT_TYPE_HEADER: &str = "x-sealgate-content-type";

// Retry policy
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 3_000;
pub const RETRYABLE_STATUS_MIN: u16 = 500;
pub const RETRYABLE_STATUS_MAX: u16 = 599;

// Replay
pub const DEFAULT_REPLAY_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_REPLAY_SWEEP_INTERVAL_MS: u64 = 30_000;

// Connectivity
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;

// Transport
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

// Storage
pub const DEFAULT_DB_PATH: &str = "sealgate.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
