//! Serialization utilities for common data types
//!
//! Reusable `#[serde(with = "...")]` modules for values that need a
//! JSON-friendly representation in durable records and config files.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde serialization result type
type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

/// Custom serialization module for Duration as milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use sealgate_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Byte buffers as standard base64 strings.
///
/// Keeps opaque payloads readable inside JSON records instead of arrays of
/// numbers.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    use super::*;

    /// Serialize bytes as a base64 string
    pub fn serialize<S>(bytes: &[u8], serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    /// Deserialize a base64 string into bytes
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }

    /// Same encoding for optional byte buffers.
    pub mod option {
        use super::*;

        /// Serialize optional bytes as a base64 string or null
        pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> SerializeResult<S>
        where
            S: Serializer,
        {
            match bytes {
                Some(bytes) => serializer.serialize_some(&BASE64.encode(bytes)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize a base64 string or null into optional bytes
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|encoded| BASE64.decode(encoded.as_bytes()).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for serialization utilities

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Record {
        #[serde(with = "duration_millis")]
        timeout: Duration,
        #[serde(with = "base64_bytes")]
        payload: Vec<u8>,
        #[serde(with = "base64_bytes::option", default)]
        body: Option<Vec<u8>>,
    }

    /// Validates `duration_millis` and `base64_bytes` behavior for the JSON
    /// record scenario.
    ///
    /// Assertions:
    /// - Durations are written as millisecond integers.
    /// - Byte buffers are written as base64 strings.
    #[test]
    fn test_record_serializes_readably() {
        let record = Record {
            timeout: Duration::from_millis(1500),
            payload: b"hi".to_vec(),
            body: None,
        };

        let json = serde_json::to_value(&record).expect("Should serialize valid struct");
        assert_eq!(json["timeout"], 1500);
        assert_eq!(json["payload"], "aGk=");
        assert!(json["body"].is_null());

        let back: Record = serde_json::from_value(json).expect("Should deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn test_optional_body_present() {
        let json = r#"{"timeout":0,"payload":"","body":"e30="}"#;
        let record: Record = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(record.body.as_deref(), Some(b"{}".as_slice()));
        assert!(record.payload.is_empty());
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let json = r#"{"timeout":0,"payload":"***"}"#;
        assert!(serde_json::from_str::<Record>(json).is_err());
    }
}
