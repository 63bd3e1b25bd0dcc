//! Upload URL rewriting for catalog content documents.
//!
//! Catalogs are authored against a remote upload host, so their content
//! documents reference assets like:
//!
//! ```text
//! https://cdn.example.com/uploads/catalog/<owner>/<catalog-id>/img/cover.png
//! ```
//!
//! Once the archive has been extracted those assets are served from the
//! staging directory, so every such string is rewritten to:
//!
//! ```text
//! /<staging>/<catalog-id>/img/cover.png
//! ```
//!
//! The owner and catalog id in the pattern are the values of the catalog
//! being processed, not wildcards: an URL pointing at another catalog's
//! uploads is left alone. Matching ignores case. Everything after the
//! catalog-id segment, query string and fragment included, is kept verbatim.
//!
//! [`UploadUrlRewriter::rewrite`] is pure: it walks a borrowed
//! [`serde_json::Value`] and builds a new tree.

use crate::catalog::{CONTENT_DOCUMENT, SkippedCatalog};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid upload pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Missing string field `{field}` in {path}")]
    MissingField { field: &'static str, path: PathBuf },
}

/// Rewrites remote upload URLs of one catalog into local static paths.
#[derive(Debug, Clone)]
pub struct UploadUrlRewriter {
    pattern: Regex,
    prefix: String,
}

impl UploadUrlRewriter {
    /// Build a rewriter bound to one catalog's `owner` and `catalog_id`.
    pub fn new(staging_name: &str, catalog_id: &str, owner: &str) -> Result<Self, RewriteError> {
        let pattern = Regex::new(&format!(
            r"(?i)^https?://[^/]+/uploads/catalog/{}/{}/(.+)$",
            regex::escape(owner),
            regex::escape(catalog_id),
        ))?;
        Ok(Self {
            pattern,
            prefix: format!("/{staging_name}/{catalog_id}/"),
        })
    }

    /// Rewrite a single string, or `None` when it does not match.
    pub fn rewrite_str(&self, s: &str) -> Option<String> {
        let rest = self.pattern.captures(s)?.get(1)?.as_str();
        Some(format!("{}{}", self.prefix, rest))
    }

    /// Return a copy of `value` with every matching string rewritten.
    pub fn rewrite(&self, value: &Value) -> Value {
        self.rewrite_counted(value).0
    }

    /// Like [`rewrite`](Self::rewrite), also returning how many strings changed.
    pub fn rewrite_counted(&self, value: &Value) -> (Value, usize) {
        let mut count = 0;
        let out = self.visit(value, &mut count);
        (out, count)
    }

    fn visit(&self, value: &Value, count: &mut usize) -> Value {
        match value {
            Value::String(s) => match self.rewrite_str(s) {
                Some(local) => {
                    *count += 1;
                    Value::String(local)
                }
                None => value.clone(),
            },
            Value::Array(items) => Value::Array(items.iter().map(|v| self.visit(v, count)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.visit(v, count)))
                    .collect(),
            ),
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        }
    }
}

fn string_field<'a>(document: &'a Value, field: &'static str, path: &Path) -> Result<&'a str, RewriteError> {
    document
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| RewriteError::MissingField {
            field,
            path: path.to_path_buf(),
        })
}

/// Rewrite one catalog's content document in place. Returns the number of
/// rewritten strings.
///
/// The catalog id and owner come from the document itself.
pub fn rewrite_content_document(catalog_dir: &Path, staging_name: &str) -> Result<usize, RewriteError> {
    let path = catalog_dir.join(CONTENT_DOCUMENT);
    let document: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    let catalog_id = string_field(&document, "id", &path)?;
    let owner = string_field(&document, "owner", &path)?;

    let rewriter = UploadUrlRewriter::new(staging_name, catalog_id, owner)?;
    let (rewritten, count) = rewriter.rewrite_counted(&document);
    fs::write(&path, serde_json::to_string_pretty(&rewritten)?)?;
    Ok(count)
}

#[derive(Debug, Default)]
pub struct RewriteReport {
    /// `(catalog dir, rewritten string count)` for each rewritten document.
    pub rewritten: Vec<(String, usize)>,
    pub skipped: Vec<SkippedCatalog>,
}

/// Rewrite the content document of every directory in `dirs`.
///
/// Failures are logged and skip that catalog only.
pub fn rewrite_catalogs(staging_root: &Path, dirs: &[String], staging_name: &str) -> RewriteReport {
    let mut report = RewriteReport::default();
    for dir in dirs {
        match rewrite_content_document(&staging_root.join(dir), staging_name) {
            Ok(count) => {
                debug!(catalog = %dir, count, "rewrote upload urls");
                report.rewritten.push((dir.clone(), count));
            }
            Err(e) => {
                warn!(catalog = %dir, error = %e, "skipping content rewrite");
                report.skipped.push(SkippedCatalog {
                    dir: dir.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}
