//! Server configuration module.
//!
//! Handles loading, validating, and merging the `diary-media.toml` file.
//! Stock defaults are the base layer; the user's file only needs the keys it
//! wants to override, and command-line flags win over both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "127.0.0.1:3000"         # Listen address
//! media_prefix = "/uploads"       # URL prefix media is served under
//!
//! [storage]
//! originals_dir = "uploads"       # Immutable uploaded originals
//! cache_dir = "cache"             # Derivatives (must not be inside originals_dir)
//!
//! [images]
//! default_quality = 85            # Default `q`; also means "no transformation"
//! max_width = 4096                # Requested widths above this are clamped
//! max_pixels = 40000000           # Larger outputs fall back to the original
//!
//! [processing]
//! max_workers = 4                 # Max parallel transforms (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! ```toml
//! # Only move the cache somewhere faster
//! [storage]
//! cache_dir = "/var/cache/diary-media"
//! ```
//!
//! Other values keep their defaults. Unknown keys are rejected so typos
//! surface at startup instead of being silently ignored.

use crate::imaging::{DEFAULT_MAX_PIXELS, Quality, RequestLimits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config error: {0}")]
    Validation(String),
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub storage: StorageConfig,
    pub images: ImagesConfig,
    pub processing: ProcessingConfig,
}

impl ServerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.bind_addr()?;

        let prefix = &self.server.media_prefix;
        if !prefix.starts_with('/') || prefix.trim_end_matches('/').is_empty() {
            return Err(ConfigError::Validation(format!(
                "server.media_prefix must start with '/' and name a path, got {prefix:?}"
            )));
        }
        // Originals are served verbatim, so a cache inside them would be too
        if self.storage.cache_dir.starts_with(&self.storage.originals_dir) {
            return Err(ConfigError::Validation(
                "storage.cache_dir must not be inside storage.originals_dir".into(),
            ));
        }
        if !(1..=100).contains(&self.images.default_quality) {
            return Err(ConfigError::Validation(
                "images.default_quality must be 1-100".into(),
            ));
        }
        if self.images.max_width == 0 {
            return Err(ConfigError::Validation(
                "images.max_width must be non-zero".into(),
            ));
        }
        if self.images.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "images.max_pixels must be non-zero".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be non-zero (omit it for auto)".into(),
            ));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: String,
    /// Path prefix media URLs live under, e.g. `/uploads`.
    pub media_prefix: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            media_prefix: "/uploads".to_string(),
        }
    }
}

impl ServerSection {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "server.bind must be an address like 127.0.0.1:3000, got {:?}",
                self.bind
            ))
        })
    }
}

/// Where originals are read from and derivatives written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub originals_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            originals_dir: PathBuf::from("uploads"),
            cache_dir: PathBuf::from("cache"),
        }
    }
}

/// Derivative defaults and clamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub default_quality: u32,
    pub max_width: u32,
    /// Output pixel budget (width × height) for a single resize.
    pub max_pixels: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            default_quality: 85,
            max_width: 4096,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl ImagesConfig {
    /// Limits applied while parsing request query strings.
    pub fn limits(&self) -> RequestLimits {
        RequestLimits {
            default_quality: Quality::new(self.default_quality),
            max_width: self.max_width,
            max_pixels: self.max_pixels,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum concurrent transforms. `None` = number of CPU cores.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count for the transform pool.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    // Every field is a plain string, path, or integer, so this cannot fail
    toml::Value::try_from(ServerConfig::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`, falling back to stock defaults when
/// it does not exist.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `diary-media.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# diary-media configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
# Address to listen on.
bind = "127.0.0.1:3000"

# URL path prefix media is served under: /uploads/<filename>?w=400
media_prefix = "/uploads"

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory of uploaded originals. Read-only for this server.
originals_dir = "uploads"

# Directory derivatives are cached in. Must not be inside originals_dir,
# which is served as-is. Entries are never evicted; delete the directory
# to reclaim space.
cache_dir = "cache"

# ---------------------------------------------------------------------------
# Derivatives
# ---------------------------------------------------------------------------
[images]
# Encode quality when the request has no `q` (1 = worst, 100 = best).
# A request with only q equal to this value is served unmodified.
default_quality = 85

# Requested widths above this are clamped down to it.
max_width = 4096

# Largest output (width x height) a single resize may produce. Requests
# over it, e.g. a very tall strip scaled up, get the original instead.
max_pixels = 40000000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum concurrent transforms.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_workers = 4
"##
}
