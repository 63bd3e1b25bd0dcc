//! The prerender worker: one catalog, one server, one browser.
//!
//! Runs as its own process (`catalog-prerender prerender-worker <staging> <id>`),
//! so a crashed or wedged browser never takes the orchestrator down with it.
//!
//! ## Lifecycle
//!
//! ```text
//! load template ids  →  start server  →  launch browser  →  routes…  →  teardown
//! ```
//!
//! - The route list comes from `<dist>/<staging>/<id>/catalog.json`. A missing
//!   or unreadable document means zero routes, not a failure.
//! - Server and browser are owned values; teardown is their `Drop`, which runs
//!   on every exit path including a failed browser launch.
//! - Each route is isolated: a navigation error or readiness timeout is
//!   reported and the next route runs.

use super::browser::{ChromeRenderer, Readiness, RenderError, SnapshotRenderer};
use super::orchestrator::{PRODUCTION_ENV_VAR, worker_mode};
use super::server::{ServerError, StaticServer};
use super::snapshot;
use crate::catalog;
use crate::config::PipelineConfig;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Static server error: {0}")]
    Server(#[from] ServerError),
    #[error("Browser error: {0}")]
    Browser(#[from] RenderError),
}

/// Everything one worker invocation needs.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub dist_root: PathBuf,
    pub staging_name: String,
    pub catalog_id: String,
    pub port: u16,
    pub readiness: Readiness,
    pub window_size: (u32, u32),
    /// Value of the production flag the orchestrator set, or `development`.
    pub mode: String,
}

impl WorkerSettings {
    pub fn from_config(
        config: &PipelineConfig,
        dist_root: PathBuf,
        staging_name: &str,
        catalog_id: &str,
        port: Option<u16>,
    ) -> Self {
        let p = &config.prerender;
        Self {
            dist_root,
            staging_name: staging_name.to_string(),
            catalog_id: catalog_id.to_string(),
            port: port.unwrap_or(p.base_port),
            readiness: Readiness {
                event: p.ready_event.clone(),
                timeout: Duration::from_secs(p.ready_timeout_secs),
                consent_key: p.consent_key.clone(),
            },
            window_size: (p.window_size[0], p.window_size[1]),
            mode: worker_mode(std::env::var(PRODUCTION_ENV_VAR).ok()),
        }
    }

    /// The catalog's directory inside the distributable tree.
    pub fn catalog_dir(&self) -> PathBuf {
        self.dist_root.join(&self.staging_name).join(&self.catalog_id)
    }
}

/// Progress of a single route, streamed to the CLI printer.
#[derive(Debug, Clone)]
pub enum RouteEvent {
    Started { route: String },
    Saved { route: String, path: PathBuf },
    Failed { route: String, error: String },
}

/// Per-route results of one worker run.
#[derive(Debug, Default)]
pub struct WorkerReport {
    pub saved: Vec<(String, PathBuf)>,
    pub failed: Vec<(String, String)>,
}

/// Routes for the worker's catalog, read from its content document.
pub fn load_routes(settings: &WorkerSettings) -> Vec<String> {
    let catalog_dir = settings.catalog_dir();
    let ids = catalog::load_template_ids(&catalog_dir).unwrap_or_else(|e| {
        warn!(
            path = %catalog_dir.join(catalog::CONTENT_DOCUMENT).display(),
            error = %e,
            "failed to load template ids"
        );
        Vec::new()
    });
    snapshot::catalog_routes(&settings.catalog_id, &ids)
}

/// Run one worker: bootstrap, render every route, tear down.
///
/// Returns `Err` only when the server or browser cannot be started; route
/// failures are part of the report.
pub fn run_worker(
    settings: &WorkerSettings,
    events: Option<Sender<RouteEvent>>,
) -> Result<WorkerReport, WorkerError> {
    info!(mode = %settings.mode, catalog = %settings.catalog_id, "prerender worker starting");
    let routes = load_routes(settings);

    let server = StaticServer::start(&settings.dist_root, settings.port)?;
    info!(url = %server.base_url(), "serving {}", settings.dist_root.display());

    let renderer = ChromeRenderer::launch(settings.readiness.clone(), settings.window_size)?;
    info!(routes = routes.len(), catalog = %settings.catalog_id, "prerendering");

    let report = render_routes(
        &renderer,
        &server.base_url(),
        &settings.dist_root,
        &routes,
        events.as_ref(),
    );

    drop(renderer);
    drop(server);
    Ok(report)
}

/// Render, mark and write each route in turn.
pub fn render_routes(
    renderer: &impl SnapshotRenderer,
    base_url: &str,
    dist_root: &Path,
    routes: &[String],
    events: Option<&Sender<RouteEvent>>,
) -> WorkerReport {
    let emit = |event: RouteEvent| {
        if let Some(tx) = events {
            tx.send(event).ok();
        }
    };

    let mut report = WorkerReport::default();
    for route in routes {
        emit(RouteEvent::Started {
            route: route.clone(),
        });
        let url = format!("{base_url}{route}");
        let saved = renderer
            .render(&url)
            .map(|html| snapshot::mark_unhydrated(&html))
            .map_err(|e| e.to_string())
            .and_then(|html| {
                snapshot::write_snapshot(dist_root, route, &html).map_err(|e| e.to_string())
            });

        match saved {
            Ok(path) => {
                emit(RouteEvent::Saved {
                    route: route.clone(),
                    path: path.clone(),
                });
                report.saved.push((route.clone(), path));
            }
            Err(error) => {
                warn!(%route, %error, "failed to render route");
                emit(RouteEvent::Failed {
                    route: route.clone(),
                    error: error.clone(),
                });
                report.failed.push((route.clone(), error));
            }
        }
    }
    report
}
