//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Every stage reports its entities (archives, catalogs, routes) by identity
//! first, with a positional index, and puts the supporting detail (reasons,
//! counts, output paths) on indented context lines underneath.
//!
//! # Output Format
//!
//! ## Ingest / Check
//!
//! ```text
//! Archives
//! 001 1b4e28ba-….zip → extracted (6 files)
//! 002 5c8f3e2d-….zip → invalid
//!     Invalid second-level entry: notes.txt
//! 003 9f0e1d2c-….zip → name mismatch
//!     Root id: 1b4e28ba-…
//! Ignored
//!     readme.zip
//! ```
//!
//! ## Catalogs
//!
//! ```text
//! Catalogs (1)
//! 001 1b4e28ba-…
//!     Owner: owner-a
//! Skipped
//!     5c8f3e2d-…: JSON error: …
//! ```
//!
//! ## Prerender
//!
//! ```text
//! /catalogs/1b4e28ba-…/templates/t1
//!     Saved: dist/catalogs/1b4e28ba-…/templates/t1/index.html
//! /catalogs/1b4e28ba-…/templates/t2
//!     Failed: Timed out after 10s waiting for `prerender-ready`
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::archive::{ArchiveStatus, IngestReport};
use crate::catalog::{Aggregate, SkippedCatalog};
use crate::prerender::{PrerenderSummary, RouteEvent, WorkerReport};
use crate::rewrite::RewriteReport;
use crate::routes::RouteConfig;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn skipped_lines(skipped: &[SkippedCatalog], lines: &mut Vec<String>) {
    if skipped.is_empty() {
        return;
    }
    lines.push("Skipped".to_string());
    for s in skipped {
        lines.push(format!("{}{}: {}", indent(1), s.dir, s.reason));
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 1: Archive ingest
// ============================================================================

/// Format an ingest (or check) report: one entry per candidate archive.
pub fn format_ingest_report(report: &IngestReport) -> Vec<String> {
    let mut lines = vec!["Archives".to_string()];
    if report.archives.is_empty() {
        lines.push(format!("{}(no catalog archives found)", indent(1)));
    }

    for (i, archive) in report.archives.iter().enumerate() {
        let header = format!("{} {}", format_index(i + 1), archive.file_name);
        match &archive.status {
            ArchiveStatus::Valid { .. } => lines.push(format!("{header} → valid")),
            ArchiveStatus::Extracted { files, .. } => {
                lines.push(format!("{header} → extracted ({})", plural(*files, "file", "files")))
            }
            ArchiveStatus::Invalid(violation) => {
                lines.push(format!("{header} → invalid"));
                lines.push(format!("{}{}", indent(1), violation));
            }
            ArchiveStatus::NameMismatch { root_id } => {
                lines.push(format!("{header} → name mismatch"));
                lines.push(format!("{}Root id: {}", indent(1), root_id));
            }
        }
    }

    if !report.ignored.is_empty() {
        lines.push("Ignored".to_string());
        for name in &report.ignored {
            lines.push(format!("{}{}", indent(1), name));
        }
    }
    lines
}

pub fn print_ingest_report(report: &IngestReport) {
    print_lines(format_ingest_report(report));
}

// ============================================================================
// Stage 2: Catalog aggregation and rewriting
// ============================================================================

/// Format the aggregated catalogs and the ones left out.
pub fn format_aggregate(aggregate: &Aggregate) -> Vec<String> {
    let mut lines = vec![format!("Catalogs ({})", aggregate.configs.len())];
    for (i, config) in aggregate.configs.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), config.id));
        if let Some(owner) = &config.owner {
            lines.push(format!("{}Owner: {}", indent(1), owner));
        }
    }
    skipped_lines(&aggregate.skipped, &mut lines);
    lines
}

pub fn print_aggregate(aggregate: &Aggregate) {
    print_lines(format_aggregate(aggregate));
}

/// Format per-catalog URL rewrite counts.
pub fn format_rewrite_report(report: &RewriteReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, (id, count)) in report.rewritten.iter().enumerate() {
        lines.push(format!(
            "{} {}: {} rewritten",
            format_index(i + 1),
            id,
            plural(*count, "URL", "URLs")
        ));
    }
    skipped_lines(&report.skipped, &mut lines);
    lines
}

pub fn print_rewrite_report(report: &RewriteReport) {
    print_lines(format_rewrite_report(report));
}

// ============================================================================
// Stage 3: Hosting configuration
// ============================================================================

/// Format the generated route table in the order the platform evaluates it.
pub fn format_route_config(config: &RouteConfig, path: &Path) -> Vec<String> {
    let mut lines = vec![format!("Routes → {}", path.display())];
    for rule in &config.routes {
        let headers: Vec<String> = rule.headers.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        lines.push(format!("{}{}", indent(1), rule.route));
        for header in headers {
            lines.push(format!("{}{}", indent(2), header));
        }
    }
    lines.push(format!(
        "Fallback → {} ({})",
        config.navigation_fallback.rewrite,
        plural(config.navigation_fallback.exclude.len(), "exclude", "excludes")
    ));
    lines
}

pub fn print_route_config(config: &RouteConfig, path: &Path) {
    print_lines(format_route_config(config, path));
}

// ============================================================================
// Stage 4: Prerender
// ============================================================================

/// Format a single worker progress event as display lines.
pub fn format_route_event(event: &RouteEvent) -> Vec<String> {
    match event {
        RouteEvent::Started { route } => vec![route.clone()],
        RouteEvent::Saved { path, .. } => {
            vec![format!("{}Saved: {}", indent(1), path.display())]
        }
        RouteEvent::Failed { error, .. } => vec![format!("{}Failed: {}", indent(1), error)],
    }
}

/// One-line totals for a worker run.
pub fn format_worker_report(catalog_id: &str, report: &WorkerReport) -> Vec<String> {
    let total = report.saved.len() + report.failed.len();
    vec![format!(
        "Prerendered {} of {} for {}",
        report.saved.len(),
        plural(total, "route", "routes"),
        catalog_id
    )]
}

pub fn print_worker_report(catalog_id: &str, report: &WorkerReport) {
    print_lines(format_worker_report(catalog_id, report));
}

/// Format orchestrator totals, listing each failed catalog.
pub fn format_prerender_summary(summary: &PrerenderSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Prerendered {} of {}",
        summary.succeeded.len(),
        plural(summary.total(), "catalog", "catalogs")
    )];
    for (id, failure) in &summary.failed {
        lines.push(format!("{}{}: {}", indent(1), id, failure));
    }
    lines
}

pub fn print_prerender_summary(summary: &PrerenderSummary) {
    print_lines(format_prerender_summary(summary));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveOutcome, StructureViolation};
    use crate::catalog::CatalogConfig;
    use crate::config::HostingConfig;
    use crate::prerender::WorkerFailure;
    use crate::routes::generate_route_config;
    use chrono::TimeZone;
    use std::path::PathBuf;

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "file", "files"), "1 file");
        assert_eq!(plural(0, "file", "files"), "0 files");
    }

    // =========================================================================
    // Ingest
    // =========================================================================

    #[test]
    fn ingest_report_lists_each_status() {
        let report = IngestReport {
            archives: vec![
                ArchiveOutcome {
                    file_name: "a.zip".into(),
                    status: ArchiveStatus::Extracted {
                        root_id: "a".into(),
                        files: 3,
                    },
                },
                ArchiveOutcome {
                    file_name: "b.zip".into(),
                    status: ArchiveStatus::Invalid(StructureViolation::Empty),
                },
                ArchiveOutcome {
                    file_name: "c.zip".into(),
                    status: ArchiveStatus::NameMismatch { root_id: "a".into() },
                },
            ],
            ignored: vec!["notes.zip".into()],
        };
        assert_eq!(
            format_ingest_report(&report),
            vec![
                "Archives",
                "001 a.zip → extracted (3 files)",
                "002 b.zip → invalid",
                "    Archive contains no entries",
                "003 c.zip → name mismatch",
                "    Root id: a",
                "Ignored",
                "    notes.zip",
            ]
        );
    }

    #[test]
    fn empty_ingest_report() {
        let lines = format_ingest_report(&IngestReport::default());
        assert_eq!(lines, vec!["Archives", "    (no catalog archives found)"]);
    }

    // =========================================================================
    // Catalogs
    // =========================================================================

    #[test]
    fn aggregate_shows_owner_and_skipped() {
        let aggregate = Aggregate {
            configs: vec![
                CatalogConfig {
                    id: "cat-a".into(),
                    owner: Some("owner-a".into()),
                    extra: Default::default(),
                },
                CatalogConfig {
                    id: "cat-b".into(),
                    owner: None,
                    extra: Default::default(),
                },
            ],
            skipped: vec![SkippedCatalog {
                dir: "cat-c".into(),
                reason: "bad json".into(),
            }],
        };
        assert_eq!(
            format_aggregate(&aggregate),
            vec![
                "Catalogs (2)",
                "001 cat-a",
                "    Owner: owner-a",
                "002 cat-b",
                "Skipped",
                "    cat-c: bad json",
            ]
        );
    }

    #[test]
    fn rewrite_report_counts() {
        let report = RewriteReport {
            rewritten: vec![("cat-a".into(), 1), ("cat-b".into(), 4)],
            skipped: vec![],
        };
        assert_eq!(
            format_rewrite_report(&report),
            vec!["001 cat-a: 1 URL rewritten", "002 cat-b: 4 URLs rewritten"]
        );
    }

    // =========================================================================
    // Routes
    // =========================================================================

    #[test]
    fn route_config_in_evaluation_order() {
        let date = chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let config = generate_route_config(&["cat-a".to_string()], &HostingConfig::default(), date);
        let lines = format_route_config(&config, Path::new("dist/staticwebapp.config.json"));

        assert_eq!(lines[0], "Routes → dist/staticwebapp.config.json");
        let routes: Vec<&String> = lines.iter().filter(|l| l.starts_with("    /")).collect();
        assert_eq!(
            routes,
            vec![
                "    /static/*",
                "    /__config_info",
                "    /catalogs/cat-a/templates/*",
                "    /*"
            ]
        );
        assert!(lines.contains(&"        x-config-owner: swa-build-demo".to_string()));
        assert_eq!(lines.last().unwrap(), "Fallback → /index.html (3 excludes)");
    }

    // =========================================================================
    // Prerender
    // =========================================================================

    #[test]
    fn route_events() {
        let started = RouteEvent::Started {
            route: "/catalogs/c/templates/t1".into(),
        };
        let saved = RouteEvent::Saved {
            route: "/catalogs/c/templates/t1".into(),
            path: PathBuf::from("dist/catalogs/c/templates/t1/index.html"),
        };
        let failed = RouteEvent::Failed {
            route: "/catalogs/c/templates/t2".into(),
            error: "boom".into(),
        };
        assert_eq!(format_route_event(&started), vec!["/catalogs/c/templates/t1"]);
        assert_eq!(
            format_route_event(&saved),
            vec!["    Saved: dist/catalogs/c/templates/t1/index.html"]
        );
        assert_eq!(format_route_event(&failed), vec!["    Failed: boom"]);
    }

    #[test]
    fn worker_report_totals() {
        let report = WorkerReport {
            saved: vec![("/a".into(), PathBuf::from("a/index.html"))],
            failed: vec![("/b".into(), "timeout".into())],
        };
        assert_eq!(
            format_worker_report("cat-a", &report),
            vec!["Prerendered 1 of 2 routes for cat-a"]
        );
    }

    #[test]
    fn prerender_summary_lists_failures() {
        let summary = PrerenderSummary {
            succeeded: vec!["cat-a".into()],
            failed: vec![("cat-b".into(), WorkerFailure::Exit(Some(1)))],
        };
        assert_eq!(
            format_prerender_summary(&summary),
            vec!["Prerendered 1 of 2 catalogs", "    cat-b: exited with code 1"]
        );
    }
}
