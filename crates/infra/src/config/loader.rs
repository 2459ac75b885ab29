//! Configuration loader
//!
//! Builds the application [`Config`] from up to three layers.
//!
//! ## Loading Strategy
//! 1. A `.env` file in the working directory, if any, is loaded into the
//!    process environment
//! 2. A config file: the explicit path, `COSTSYNC_CONFIG`, or the first hit
//!    of [`discover_config_paths`]; defaults when none exists
//! 3. `COSTSYNC_*` environment variables override individual fields
//!
//! ## Environment Variables
//! - `COSTSYNC_CONFIG`: Config file path
//! - `COSTSYNC_CATALOG_ROOT`: Catalog directory
//! - `COSTSYNC_BUDGETING_BASE_URL`: Budgeting API base URL
//! - `COSTSYNC_BUDGETING_API_TOKEN`: Bearer token for the budgeting API
//! - `COSTSYNC_BUDGETING_TIMEOUT`: HTTP request timeout in seconds
//! - `COSTSYNC_SYNC_ENABLED`: Whether sync is enabled (true/false)
//! - `COSTSYNC_POLL_INTERVAL`: Poll interval in seconds
//! - `COSTSYNC_MAX_ATTEMPTS`: Attempts per sync request
//! - `COSTSYNC_DB_PATH`: Sync-state database path
//! - `COSTSYNC_DB_POOL_SIZE`: Connection pool size
//! - `COSTSYNC_ROUNDING`: `ceiling` or `nearest_half_up`
//! - `COSTSYNC_LOG_LEVEL`: Log filter directive
//! - `COSTSYNC_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! `costsync.toml` or `costsync.json` in the working directory, its parent,
//! or next to the executable.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use costsync_domain::{Config, CostSyncError, Result};
use url::Url;

const CONFIG_FILE_NAMES: [&str; 2] = ["costsync.toml", "costsync.json"];

/// Load configuration from every layer.
///
/// # Errors
/// Returns `CostSyncError::Config` if a file cannot be read or parsed, an
/// override has an invalid value, or the result fails [`validate`].
pub fn load() -> Result<Config> {
    load_with(None)
}

/// As [`load`], with an explicit config file taking priority over
/// `COSTSYNC_CONFIG` and probing.
///
/// # Errors
/// See [`load`].
pub fn load_with(path: Option<PathBuf>) -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(env_path) => tracing::debug!(path = %env_path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(CostSyncError::Config(format!("Failed to load .env file: {e}"))),
    }

    let explicit = path.or_else(|| std::env::var("COSTSYNC_CONFIG").ok().map(PathBuf::from));
    let mut config = match explicit.or_else(discover_config_paths) {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::info!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Defaults plus environment overrides, without touching the filesystem.
///
/// # Errors
/// Returns `CostSyncError::Config` for invalid override values.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from a file.
///
/// Format is detected by extension (`.toml` or `.json`). Sections and fields
/// left out keep their defaults.
///
/// # Errors
/// Returns `CostSyncError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(CostSyncError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| CostSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CostSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CostSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CostSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing `costsync.{toml,json}` in the standard locations.
pub fn discover_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".."));
        dirs.insert(0, cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Apply `COSTSYNC_*` overrides on top of `config`.
///
/// # Errors
/// Returns `CostSyncError::Config` when a numeric or enum override does not
/// parse.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(root) = env_string("COSTSYNC_CATALOG_ROOT") {
        config.catalog.root = PathBuf::from(root);
    }

    if let Some(base_url) = env_string("COSTSYNC_BUDGETING_BASE_URL") {
        config.budgeting.base_url = base_url;
    }
    if let Some(token) = env_string("COSTSYNC_BUDGETING_API_TOKEN") {
        config.budgeting.api_token = Some(token);
    }
    if let Some(timeout) = env_parse("COSTSYNC_BUDGETING_TIMEOUT", "budgeting timeout")? {
        config.budgeting.request_timeout_secs = timeout;
    }

    config.sync.enabled = env_bool("COSTSYNC_SYNC_ENABLED", config.sync.enabled);
    if let Some(interval) = env_parse("COSTSYNC_POLL_INTERVAL", "poll interval")? {
        config.sync.poll_interval_secs = interval;
    }
    if let Some(attempts) = env_parse("COSTSYNC_MAX_ATTEMPTS", "max attempts")? {
        config.sync.max_attempts = attempts;
    }

    if let Some(path) = env_string("COSTSYNC_DB_PATH") {
        config.database.path = path;
    }
    if let Some(size) = env_parse("COSTSYNC_DB_POOL_SIZE", "pool size")? {
        config.database.pool_size = size;
    }

    if let Some(rounding) = env_parse("COSTSYNC_ROUNDING", "rounding policy")? {
        config.resolution.rounding = rounding;
    }

    if let Some(level) = env_string("COSTSYNC_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("COSTSYNC_LOG_JSON", config.logging.json);

    Ok(())
}

/// Cross-field checks that serde defaults cannot express.
///
/// # Errors
/// Returns `CostSyncError::Config` naming the offending field.
pub fn validate(config: &Config) -> Result<()> {
    Url::parse(&config.budgeting.base_url).map_err(|e| {
        CostSyncError::Config(format!(
            "Invalid budgeting.base_url '{}': {e}",
            config.budgeting.base_url
        ))
    })?;
    if config.sync.poll_interval_secs == 0 {
        return Err(CostSyncError::Config("sync.poll_interval_secs must be positive".into()));
    }
    if config.sync.pass_timeout_secs == 0 {
        return Err(CostSyncError::Config("sync.pass_timeout_secs must be positive".into()));
    }
    if config.sync.max_attempts == 0 {
        return Err(CostSyncError::Config("sync.max_attempts must be at least 1".into()));
    }
    if config.validation.bounds.values().any(|b| b.min > b.max) {
        return Err(CostSyncError::Config("validation.bounds has min above max".into()));
    }
    Ok(())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str, what: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_string(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| CostSyncError::Config(format!("Invalid {what} in {key}: {e}")))
        })
        .transpose()
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
