//! # Catalog Prerender
//!
//! A build-time pipeline that turns offline-authored catalog archives into
//! static content for a single-page site: archives are validated and
//! extracted, catalog metadata is merged into one site-wide document, remote
//! upload URLs are pointed at local copies, the hosting platform's route
//! table is generated, and every template page is snapshotted to static HTML
//! by a headless browser.
//!
//! # Architecture: Staged Pipeline
//!
//! ```text
//! 1. Ingest     <uuid>.zip        →  democatalogs/<uuid>/      (validate + extract)
//! 2. Aggregate  democatalogs/*    →  democatalogs/config.json  (merge catalog configs)
//! 3. Rewrite    catalog.json      →  catalog.json              (upload URLs → local paths)
//! 4. Routes     catalog ids       →  dist/staticwebapp.config.json
//! 5. Publish    democatalogs/     →  dist/democatalogs/
//! 6. Prerender  dist/             →  dist/catalogs/<id>/templates/<t>/index.html
//! ```
//!
//! Stages run once per CI invocation, one after another. Failures are scoped
//! as narrowly as possible: a bad archive skips that archive, a bad catalog
//! document skips that catalog, a page that never signals readiness skips
//! that route.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`archive`] | Structural validation, selection, and extraction of catalog archives |
//! | [`catalog`] | Catalog discovery, config aggregation, template ids, publishing the staging tree |
//! | [`rewrite`] | Pure upload-URL rewriting over JSON documents |
//! | [`routes`] | Hosting route table and navigation fallback generation |
//! | [`prerender`] | Worker orchestration, local server, headless browser snapshots |
//! | [`config`] | `catalog-prerender.toml` loading, validation, and merging |
//! | [`naming`] | UUID v4 checks and the `<uuid>.zip` naming contract |
//! | [`output`] | CLI output formatting for every stage |
//!
//! # Design Decisions
//!
//! ## One Process Per Catalog
//!
//! Each catalog is prerendered by a child process running the
//! `prerender-worker` subcommand of this same binary. A browser that crashes
//! or hangs takes down one catalog's worker, never the orchestrator, and the
//! exit code is the entire protocol between the two.
//!
//! ## Readiness Is Signalled, Not Guessed
//!
//! Snapshots are captured only after the page dispatches a readiness DOM
//! event. There is no "network idle" heuristic; a page that never signals
//! within the bounded wait is a failed route.
//!
//! ## Deterministic Output
//!
//! Catalog directories are sorted before aggregation by default, so the
//! consolidated config, the route table and the prerender order are stable
//! across filesystems.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod naming;
pub mod output;
pub mod prerender;
pub mod rewrite;
pub mod routes;

#[cfg(test)]
pub(crate) mod test_helpers;
