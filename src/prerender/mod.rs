//! Static snapshots of catalog template pages.
//!
//! | Module           | Role                                                      |
//! |------------------|-----------------------------------------------------------|
//! | `orchestrator`   | Spawns one worker process per catalog, sequential or pooled |
//! | `worker`         | Server + browser lifecycle and the per-route loop         |
//! | `server`         | Local static file server with SPA fallback                |
//! | `browser`        | [`SnapshotRenderer`] trait and the headless Chrome implementation |
//! | `snapshot`       | Routes, output paths, and the `unhydrated` body marker    |

pub mod browser;
pub mod orchestrator;
pub mod server;
pub mod snapshot;
pub mod worker;

pub use browser::{ChromeRenderer, Readiness, RenderError, SnapshotRenderer};
pub use orchestrator::{
    OrchestratorOptions, PrerenderError, PrerenderSummary, ProcessLauncher, WorkerFailure,
    WorkerJob, WorkerLauncher, prerender_all,
};
pub use server::{ServerError, StaticServer};
pub use worker::{RouteEvent, WorkerError, WorkerReport, WorkerSettings, run_worker};
