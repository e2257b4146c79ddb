//! Configuration module.
//!
//! Handles loading and validating `photocrop.toml`. Every section and key
//! carries `#[serde(default)]`, so a sparse file deserializes straight onto
//! the stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [helper]
//! enabled = true            # false forces local processing
//! # path = "/opt/fastimageops/FastImageOps"  # skip the search, use this file
//! timeout_secs = 30         # Hard limit per helper invocation
//!
//! [cache]
//! max_size = 100            # Cached helper responses (LRU beyond this)
//! ttl_secs = 300            # Seconds a cached response stays valid
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse, override just the values you want:
//!
//! ```toml
//! [cache]
//! ttl_secs = 60
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::bridge::DEFAULT_TIMEOUT;
use crate::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when none is given.
pub const CONFIG_FILE_NAME: &str = "photocrop.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Bridge configuration loaded from `photocrop.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Where the helper lives and how long it may run.
    pub helper: HelperConfig,
    /// Bounds of the helper response cache.
    pub cache: CacheConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl BridgeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_size == 0 {
            return Err(ConfigError::Validation(
                "cache.max_size must be at least 1".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.ttl_secs must be non-zero".into(),
            ));
        }
        if self.helper.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "helper.timeout_secs must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Helper process settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HelperConfig {
    /// Set to false to never launch the helper.
    pub enabled: bool,
    /// Explicit helper executable. Replaces the default search list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Wall-clock limit for one invocation, in seconds.
    pub timeout_secs: u64,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Helper response cache bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel local resize workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Loading
// =============================================================================

/// Load the config file at `path`, falling back to stock defaults when it
/// does not exist.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: BridgeConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// A documented `photocrop.toml` with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r##"# photocrop Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Native helper (FastImageOps)
# ---------------------------------------------------------------------------
[helper]
# Set to false to always process locally. Batch crop has no local
# implementation and fails while the helper is disabled.
enabled = true

# Explicit helper executable. When unset, the helper is searched for next to
# the photocrop binary, in helpers/, and in the FastImageOps publish folders.
# path = "/opt/fastimageops/FastImageOps"

# Seconds one helper invocation may run before it is killed.
timeout_secs = 30

# ---------------------------------------------------------------------------
# Helper response cache
# ---------------------------------------------------------------------------
[cache]
# Maximum cached responses. The least recently used is evicted beyond this.
max_size = 100

# Seconds a cached response stays valid.
ttl_secs = 300

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for local batch resize.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
