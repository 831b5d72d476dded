//! Macro for implementing label conversions on small domain enums
//!
//! Generates `as_str`, `Display`, and case-insensitive `FromStr` from a
//! single variant-to-label table.
//!
//! # Example
//!
//! ```rust
//! use sealgate_domain::impl_label_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Warm,
//!     Cold,
//! }
//!
//! impl_label_conversions!(Phase {
//!     Warm => "warm",
//!     Cold => "cold",
//! });
//!
//! assert_eq!(Phase::Warm.to_string(), "warm");
//! assert_eq!("COLD".parse::<Phase>().unwrap(), Phase::Cold);
//! ```

/// Implements `as_str`, `Display`, and `FromStr` for label enums
///
/// Parsing is ASCII case-insensitive; output always uses the declared label.
#[macro_export]
macro_rules! impl_label_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable label for logs and storage.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestStatus {
        Pending,
        Failed,
    }

    impl_label_conversions!(TestStatus {
        Pending => "pending",
        Failed => "FAILED",
    });

    #[test]
    fn test_display_uses_declared_label() {
        assert_eq!(TestStatus::Pending.to_string(), "pending");
        assert_eq!(TestStatus::Failed.as_str(), "FAILED");
    }

    #[test]
    fn test_fromstr_mixed_case() {
        assert_eq!(TestStatus::from_str("PeNdInG").unwrap(), TestStatus::Pending);
        assert_eq!(TestStatus::from_str("failed").unwrap(), TestStatus::Failed);
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = TestStatus::from_str("invalid");
        assert!(result.unwrap_err().contains("Invalid TestStatus: invalid"));
        assert!(TestStatus::from_str("").is_err());
    }
}
