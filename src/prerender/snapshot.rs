//! Prerender routes, snapshot paths, and the `unhydrated` body marker.

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Class prepended to `<body>` in every snapshot so client code can tell
/// prerendered markup from a hydrated page.
pub const UNHYDRATED_CLASS: &str = "unhydrated";

static BODY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<body[^>]*class=["']"#).expect("static pattern"));

/// One route per template id: `/catalogs/{catalog_id}/templates/{template_id}`.
pub fn catalog_routes(catalog_id: &str, template_ids: &[String]) -> Vec<String> {
    template_ids
        .iter()
        .map(|t| format!("/catalogs/{catalog_id}/templates/{t}"))
        .collect()
}

/// On-disk location of a route's snapshot: `{dist_root}/{route}/index.html`.
pub fn snapshot_path(dist_root: &Path, route: &str) -> PathBuf {
    dist_root
        .join(route.trim_start_matches('/'))
        .join("index.html")
}

/// Prepend [`UNHYDRATED_CLASS`] to the body's class list, adding a class
/// attribute when the body has none.
///
/// - `<body class="foo">` → `<body class="unhydrated foo">`
/// - `<body>` → `<body class="unhydrated">`
pub fn mark_unhydrated(html: &str) -> String {
    if BODY_CLASS.is_match(html) {
        BODY_CLASS
            .replacen(html, 1, format!("${{0}}{UNHYDRATED_CLASS} "))
            .into_owned()
    } else {
        html.replacen("<body", &format!(r#"<body class="{UNHYDRATED_CLASS}""#), 1)
    }
}

/// Write a snapshot for `route`, creating parent directories.
pub fn write_snapshot(dist_root: &Path, route: &str, html: &str) -> io::Result<PathBuf> {
    let path = snapshot_path(dist_root, route);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, html)?;
    Ok(path)
}
