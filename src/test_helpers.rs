//! Shared test utilities for the catalog-prerender test suite.
//!
//! Builds catalog archives and staged catalog directories in temp dirs so
//! each module's tests can start from the shape the pipeline expects.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_catalog_archive(tmp.path(), CATALOG_A, "owner-a", &["t1", "t2"]);
//! write_staged_catalog(&tmp.path().join("democatalogs"), CATALOG_B, "owner-b", &["t1"]);
//! ```

use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

// =========================================================================
// Catalog ids (valid UUID v4, lexicographically ordered A < B < C)
// =========================================================================

pub const CATALOG_A: &str = "1b4e28ba-2fa1-4d2b-a883-6b1e0f6c1a01";
pub const CATALOG_B: &str = "5c8f3e2d-9a7b-4c6d-8e1f-2a3b4c5d6e02";
pub const CATALOG_C: &str = "9f0e1d2c-3b4a-4958-b7c6-d5e4f3a2b103";

// =========================================================================
// Documents
// =========================================================================

/// Remote upload URL for a template preview, as authored before rewriting.
pub fn upload_url(owner: &str, catalog_id: &str, template_id: &str) -> String {
    format!("https://cdn.example.com/uploads/catalog/{owner}/{catalog_id}/templates/{template_id}/preview.png")
}

/// Per-catalog configuration document.
pub fn config_document(catalog_id: &str, owner: &str) -> Value {
    json!({
        "id": catalog_id,
        "owner": owner,
        "title": format!("Catalog {catalog_id}"),
    })
}

/// Content document with one template per id, each carrying a rewritable URL.
pub fn content_document(catalog_id: &str, owner: &str, templates: &[&str]) -> Value {
    let templates: Vec<Value> = templates
        .iter()
        .map(|t| json!({"id": t, "image": upload_url(owner, catalog_id, t)}))
        .collect();
    json!({
        "id": catalog_id,
        "owner": owner,
        "templates": templates,
    })
}

// =========================================================================
// Archives
// =========================================================================

/// Write a zip at `path` with the given `(entry name, contents)` pairs.
///
/// Names ending in `/` become directory entries.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// Write a well-formed `<dir>/<catalog_id>.zip` and return its path.
///
/// Contains `config.json`, `catalog.json`, a `catalog/` asset and one
/// `templates/<id>/template.json` per template.
pub fn write_catalog_archive(dir: &Path, catalog_id: &str, owner: &str, templates: &[&str]) -> PathBuf {
    let config = config_document(catalog_id, owner).to_string();
    let content = content_document(catalog_id, owner, templates).to_string();

    let mut files: Vec<(String, String)> = vec![
        (format!("{catalog_id}/config.json"), config),
        (format!("{catalog_id}/catalog.json"), content),
        (format!("{catalog_id}/catalog/cover.svg"), "<svg/>".to_string()),
    ];
    for t in templates {
        files.push((
            format!("{catalog_id}/templates/{t}/template.json"),
            json!({"id": t}).to_string(),
        ));
    }

    let path = dir.join(format!("{catalog_id}.zip"));
    let entries: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), c.as_str())).collect();
    write_zip(&path, &entries);
    path
}

// =========================================================================
// Staging trees
// =========================================================================

/// Write an extracted catalog directory: `<root>/<catalog_id>/{config,catalog}.json`.
pub fn write_staged_catalog(root: &Path, catalog_id: &str, owner: &str, templates: &[&str]) -> PathBuf {
    let dir = root.join(catalog_id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("config.json"),
        serde_json::to_string_pretty(&config_document(catalog_id, owner)).unwrap(),
    )
    .unwrap();
    fs::write(
        dir.join("catalog.json"),
        serde_json::to_string_pretty(&content_document(catalog_id, owner, templates)).unwrap(),
    )
    .unwrap();
    dir
}
