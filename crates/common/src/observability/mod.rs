//! Tracing subscriber setup.
//!
//! Every crate logs through `tracing` macros with structured fields. Binaries
//! and integration tests call [`init_tracing`] once to install a subscriber;
//! libraries never install one themselves.

use std::str::FromStr;

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::error::{CommonError, CommonResult};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(CommonError::config_field("log_format", format!("unknown format '{other}'"))),
        }
    }
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to [`DEFAULT_DIRECTIVE`].
/// Calling this more than once is harmless: later calls leave the existing
/// subscriber in place and return `Ok(())`.
///
/// # Errors
/// Returns `CommonError::Config` if `RUST_LOG` holds an unparseable filter.
pub fn init_tracing(format: LogFormat) -> CommonResult<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::try_new(spec)
            .map_err(|e| CommonError::config_field("RUST_LOG", e.to_string()))?,
        _ => EnvFilter::new(DEFAULT_DIRECTIVE),
    };

    let installed = match format {
        LogFormat::Pretty => {
            fmt::Subscriber::builder().with_env_filter(filter).with_target(true).try_init()
        }
        LogFormat::Json => fmt::Subscriber::builder()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
