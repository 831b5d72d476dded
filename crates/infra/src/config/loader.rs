//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Read a `.env` file into the process environment, if one exists
//! 2. Attempt to load from `SEALGATE_*` environment variables
//! 3. If `SEALGATE_DB_PATH` is absent, fall back to a config file
//! 4. Probe several paths for the file; JSON and TOML are supported
//!
//! Whatever the source, the result is checked with
//! [`SealgateConfig::validate`].
//!
//! ## Environment Variables
//! - `SEALGATE_DB_PATH`: SQLite file path (required)
//! - `SEALGATE_DB_POOL_SIZE`: connection pool size
//! - `SEALGATE_MAX_RETRIES`: retries per call after the first attempt
//! - `SEALGATE_RETRY_BACKOFF_MS`: constant delay between attempts
//! - `SEALGATE_REPLAY_MAX_ATTEMPTS`: replays per queued request
//! - `SEALGATE_PROBE_URL`: URL probed for reachability
//! - `SEALGATE_ENCRYPTION_ENABLED`: payload encryption on/off
//! - `SEALGATE_HTTP_TIMEOUT_MS`: per-request transport timeout
//!
//! ## File Locations
//! `sealgate.{toml,json}` then `config.{toml,json}`, looked up in the working
//! directory, its two parents, and the executable's directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sealgate_domain::{InterceptError, Result, SealgateConfig};

static FILE_STEMS: [&str; 2] = ["sealgate", "config"];
static EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `InterceptError::Config` if the environment names a database but
/// is otherwise invalid, or if no usable file is found without it.
pub fn load() -> Result<SealgateConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }

    if std::env::var_os("SEALGATE_DB_PATH").is_none() {
        tracing::debug!("SEALGATE_DB_PATH not set, trying file");
        return load_from_file(None);
    }

    let config = load_from_env()?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from environment variables
///
/// `SEALGATE_DB_PATH` must be set; every other variable falls back to its
/// default when absent.
///
/// # Errors
/// Returns `InterceptError::Config` if the path is missing, a number does
/// not parse, or validation fails.
pub fn load_from_env() -> Result<SealgateConfig> {
    let mut config = SealgateConfig::default();

    config.storage.path = PathBuf::from(env_var("SEALGATE_DB_PATH")?);
    if let Some(pool_size) = env_parse::<u32>("SEALGATE_DB_POOL_SIZE")? {
        config.storage.pool_size = pool_size;
    }
    if let Some(max_retries) = env_parse::<u32>("SEALGATE_MAX_RETRIES")? {
        config.retry.max_retries = max_retries;
    }
    if let Some(backoff_ms) = env_parse::<u64>("SEALGATE_RETRY_BACKOFF_MS")? {
        config.retry.backoff = Duration::from_millis(backoff_ms);
    }
    if let Some(max_attempts) = env_parse::<u32>("SEALGATE_REPLAY_MAX_ATTEMPTS")? {
        config.replay.max_attempts = max_attempts;
    }
    if let Some(timeout_ms) = env_parse::<u64>("SEALGATE_HTTP_TIMEOUT_MS")? {
        config.transport.timeout = Duration::from_millis(timeout_ms);
    }
    config.connectivity.probe_url =
        std::env::var("SEALGATE_PROBE_URL").ok().filter(|url| !url.trim().is_empty());
    config.encryption.enabled = env_bool("SEALGATE_ENCRYPTION_ENABLED", true);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_config_paths`]. The format follows the file extension.
///
/// # Errors
/// Returns `InterceptError::Config` if the file is missing, unreadable, not
/// valid for its format, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<SealgateConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(InterceptError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            InterceptError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| InterceptError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<SealgateConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| InterceptError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| InterceptError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(InterceptError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Returns the first existing candidate, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| {
            FILE_STEMS.iter().flat_map(move |stem| {
                EXTENSIONS.iter().map(move |ext| root.join(format!("{stem}.{ext}")))
            })
        })
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        InterceptError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional numeric variable; absent means `None`.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| InterceptError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
