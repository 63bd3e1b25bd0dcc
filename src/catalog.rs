//! Catalog discovery, configuration aggregation, and staging publication.
//!
//! Stage 2 of the pipeline. After extraction the staging root holds one
//! directory per catalog:
//!
//! ```text
//! democatalogs/
//! ├── config.json                     # consolidated config (written here)
//! ├── 0f8fad5b-…/
//! │   ├── config.json                 # catalog configuration document
//! │   ├── catalog.json                # catalog content document (templates)
//! │   └── catalog/ templates/ …
//! └── 7c9e6679-…/
//!     └── …
//! ```
//!
//! Every immediate subdirectory is a candidate catalog. A catalog whose
//! `config.json` cannot be read or parsed is logged and left out of the
//! consolidated config, which also drops it from routing and prerendering.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Per-catalog configuration document.
pub const CONFIG_DOCUMENT: &str = "config.json";
/// Per-catalog content document.
pub const CONTENT_DOCUMENT: &str = "catalog.json";
/// Consolidated config, written at the staging root.
pub const CONSOLIDATED_CONFIG: &str = "config.json";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to copy staging tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A catalog configuration document.
///
/// Only `id` is required; everything else is carried through to the
/// consolidated config untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A catalog directory that was left out of a stage, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCatalog {
    pub dir: String,
    pub reason: String,
}

/// List immediate subdirectories of the staging root.
///
/// With `sort` the names come back in lexicographic order; otherwise in
/// whatever order the filesystem yields them.
pub fn discover(staging_root: &Path, sort: bool) -> Result<Vec<String>, CatalogError> {
    let mut dirs: Vec<String> = fs::read_dir(staging_root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    if sort {
        dirs.sort();
    }
    Ok(dirs)
}

/// Read and parse one catalog's configuration document.
pub fn load_catalog_config(catalog_dir: &Path) -> Result<CatalogConfig, CatalogError> {
    let content = fs::read_to_string(catalog_dir.join(CONFIG_DOCUMENT))?;
    Ok(serde_json::from_str(&content)?)
}

/// Result of aggregating every discovered catalog's configuration.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Parsed configs in discovery order.
    pub configs: Vec<CatalogConfig>,
    pub skipped: Vec<SkippedCatalog>,
}

impl Aggregate {
    /// Catalog ids in aggregate order. This list drives routing and prerendering.
    pub fn catalog_ids(&self) -> Vec<String> {
        self.configs.iter().map(|c| c.id.clone()).collect()
    }
}

/// Collect the configuration document of each directory in `dirs`.
///
/// Read or parse failures skip that catalog; they never abort the run.
pub fn aggregate_configs(staging_root: &Path, dirs: &[String]) -> Aggregate {
    let mut aggregate = Aggregate::default();
    for dir in dirs {
        match load_catalog_config(&staging_root.join(dir)) {
            Ok(config) => {
                debug!(catalog = %dir, id = %config.id, "loaded catalog config");
                aggregate.configs.push(config);
            }
            Err(e) => {
                warn!(catalog = %dir, error = %e, "skipping catalog config");
                aggregate.skipped.push(SkippedCatalog {
                    dir: dir.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    aggregate
}

/// Write the consolidated config array to `<staging_root>/config.json`.
pub fn write_consolidated(staging_root: &Path, aggregate: &Aggregate) -> Result<PathBuf, CatalogError> {
    let path = staging_root.join(CONSOLIDATED_CONFIG);
    let json = serde_json::to_string_pretty(&aggregate.configs)?;
    fs::write(&path, json)?;
    Ok(path)
}

// ============================================================================
// Content documents
// ============================================================================

/// Template ids listed in a content document.
///
/// Accepts `{"templates": [...]}` or a bare array of template records. String
/// and numeric ids are kept (numbers are stringified); records without an id,
/// or with an empty one, are dropped. So are ids that are not a single path
/// segment, since each id names a snapshot directory.
pub fn template_ids(document: &Value) -> Vec<String> {
    let items = match document {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("templates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };
    items
        .iter()
        .filter_map(|item| match item.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|id| {
            let single = is_single_segment(id);
            if !single {
                warn!(template = %id, "skipping template id that is not a single path segment");
            }
            single
        })
        .collect()
}

/// True when `id` is exactly one plain path component (no separators, `.` or `..`).
fn is_single_segment(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == id
    )
}

/// Read a catalog's content document and return its template ids.
pub fn load_template_ids(catalog_dir: &Path) -> Result<Vec<String>, CatalogError> {
    let content = fs::read_to_string(catalog_dir.join(CONTENT_DOCUMENT))?;
    let document: Value = serde_json::from_str(&content)?;
    Ok(template_ids(&document))
}

// ============================================================================
// Publication
// ============================================================================

/// Move the staging root into the distributable tree as `<dist_root>/<name>`.
///
/// Any previous copy at the destination is replaced. Falls back to copy +
/// remove when a rename is not possible (e.g. across filesystems).
pub fn publish_staging(staging_root: &Path, dist_root: &Path, name: &str) -> Result<PathBuf, CatalogError> {
    let dest = dist_root.join(name);
    if dest.exists() {
        fs::remove_dir_all(&dest)?;
    }
    fs::create_dir_all(dist_root)?;

    if let Err(e) = fs::rename(staging_root, &dest) {
        debug!(error = %e, "rename failed, copying staging tree instead");
        copy_dir_recursive(staging_root, &dest)?;
        fs::remove_dir_all(staging_root)?;
    }
    Ok(dest)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), CatalogError> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
