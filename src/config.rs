//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `catalog-prerender.toml`. The file
//! is optional and sparse: stock defaults are overridden by whatever keys the
//! user file sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! archives = "."            # Directory scanned for <uuid>.zip archives
//! staging = "democatalogs"  # Staging directory name (also the URL segment for local assets)
//! dist = "dist"             # Pre-built distributable tree
//!
//! [catalogs]
//! sort = true               # Sort catalog ids lexicographically before aggregation
//!
//! [hosting]
//! config_file = "staticwebapp.config.json"
//! config_owner = "swa-build-demo"
//! info_route = "/__config_info"
//! static_max_age = 31536000
//! template_max_age = 3600
//! fallback_document = "/index.html"
//!
//! [prerender]
//! base_port = 3000
//! ready_event = "prerender-ready"
//! ready_timeout_secs = 10
//! consent_key = "tosAcceptedDate"
//! window_size = [1280, 800]
//! fail_fast = true
//! # max_workers = 1         # Omit for sequential; clamped to CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "catalog-prerender.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `catalog-prerender.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Input, staging and output locations.
    pub paths: PathsConfig,
    /// Catalog discovery settings.
    pub catalogs: CatalogsConfig,
    /// Hosting platform configuration generation.
    pub hosting: HostingConfig,
    /// Snapshot pass settings.
    pub prerender: PrerenderConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let staging = &self.paths.staging;
        if staging.is_empty()
            || staging == "."
            || staging == ".."
            || staging.contains(['/', '\\'])
        {
            return Err(ConfigError::Validation(
                "paths.staging must be a single directory name".into(),
            ));
        }
        if self.hosting.config_file.is_empty() {
            return Err(ConfigError::Validation(
                "hosting.config_file must not be empty".into(),
            ));
        }
        if self.prerender.ready_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "prerender.ready_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.prerender.base_port == 0 {
            return Err(ConfigError::Validation(
                "prerender.base_port must be non-zero".into(),
            ));
        }
        if self.prerender.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "prerender.max_workers must be at least 1".into(),
            ));
        }
        if self.prerender.window_size[0] == 0 || self.prerender.window_size[1] == 0 {
            return Err(ConfigError::Validation(
                "prerender.window_size values must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Staging root: `<work_dir>/<paths.staging>`.
    pub fn staging_root(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(&self.paths.staging)
    }

    /// Distributable root: `<work_dir>/<paths.dist>`.
    pub fn dist_root(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(&self.paths.dist)
    }

    /// Archive directory: `<work_dir>/<paths.archives>`.
    pub fn archives_dir(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(&self.paths.archives)
    }
}

/// Input, staging and output locations, relative to the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub archives: PathBuf,
    /// Bare directory name. Used both on disk and as the first URL segment of
    /// rewritten asset paths (`/<staging>/<catalog-id>/...`).
    pub staging: String,
    pub dist: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            archives: PathBuf::from("."),
            staging: "democatalogs".to_string(),
            dist: PathBuf::from("dist"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogsConfig {
    /// Sort discovered catalog directories by name. When false, the order is
    /// whatever the filesystem returns.
    pub sort: bool,
}

impl Default for CatalogsConfig {
    fn default() -> Self {
        Self { sort: true }
    }
}

/// Settings for the generated hosting configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostingConfig {
    /// File name written at the root of the distributable tree.
    pub config_file: String,
    /// Value of the `x-config-owner` header on the info route.
    pub config_owner: String,
    /// Diagnostic route carrying build headers.
    pub info_route: String,
    /// `max-age` for `/static/*` (seconds).
    pub static_max_age: u64,
    /// `max-age` for per-catalog template routes (seconds).
    pub template_max_age: u64,
    /// Document that navigation fallback rewrites to.
    pub fallback_document: String,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            config_file: "staticwebapp.config.json".to_string(),
            config_owner: "swa-build-demo".to_string(),
            info_route: "/__config_info".to_string(),
            static_max_age: 31_536_000,
            template_max_age: 3600,
            fallback_document: "/index.html".to_string(),
        }
    }
}

/// Snapshot pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrerenderConfig {
    /// Port of the first worker's local server. Pooled workers use
    /// `base_port + job index`.
    pub base_port: u16,
    /// DOM event the application dispatches once rendering has settled.
    pub ready_event: String,
    /// Bounded wait for `ready_event` per route.
    pub ready_timeout_secs: u64,
    /// `localStorage` key seeded with an ISO timestamp before the app loads.
    pub consent_key: String,
    /// Browser window size as `[width, height]`.
    pub window_size: [u32; 2],
    /// Maximum concurrent worker processes. When absent, workers run one at
    /// a time. Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
    /// Abort the remaining catalogs on the first worker failure.
    pub fail_fast: bool,
}

impl Default for PrerenderConfig {
    fn default() -> Self {
        Self {
            base_port: 3000,
            ready_event: "prerender-ready".to_string(),
            ready_timeout_secs: 10,
            consent_key: "tosAcceptedDate".to_string(),
            window_size: [1280, 800],
            max_workers: None,
            fail_fast: true,
        }
    }
}

/// Resolve the effective worker count from config.
///
/// - `None` → 1 (sequential)
/// - `Some(n)` → `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(config: &PrerenderConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.clamp(1, cores)).unwrap_or(1)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
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
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when the
/// file is absent.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# catalog-prerender configuration
# ===============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Locations (relative to the working directory)
# ---------------------------------------------------------------------------
[paths]
# Directory scanned for catalog archives. Only files named <uuid-v4>.zip
# are considered.
archives = "."

# Staging directory name. Archives are extracted here, then the directory is
# moved into the distributable tree. Rewritten asset URLs start with
# /<staging>/<catalog-id>/.
staging = "democatalogs"

# Pre-built distributable tree produced by the site bundler.
dist = "dist"

# ---------------------------------------------------------------------------
# Catalog discovery
# ---------------------------------------------------------------------------
[catalogs]
# Sort catalog ids before aggregation so config.json order is stable.
sort = true

# ---------------------------------------------------------------------------
# Hosting configuration (written to <dist>/<config_file>)
# ---------------------------------------------------------------------------
[hosting]
config_file = "staticwebapp.config.json"
config_owner = "swa-build-demo"
info_route = "/__config_info"
# Cache lifetime for /static/* (immutable).
static_max_age = 31536000
# Cache lifetime for prerendered /catalogs/<id>/templates/* pages.
template_max_age = 3600
fallback_document = "/index.html"

# ---------------------------------------------------------------------------
# Prerender pass
# ---------------------------------------------------------------------------
[prerender]
# Local server port. Pooled workers use base_port + job index.
base_port = 3000
# DOM event the app dispatches when a page is ready to snapshot.
ready_event = "prerender-ready"
ready_timeout_secs = 10
# localStorage key seeded with the current time before the app loads.
consent_key = "tosAcceptedDate"
window_size = [1280, 800]
# Stop after the first failed catalog. Set to false to run every catalog
# and report failures at the end.
fail_fast = true
# Maximum concurrent workers. Omit to run catalogs one at a time.
# max_workers = 4
"##
}
