//! Prerender orchestration: one isolated worker process per catalog.
//!
//! Each catalog is handed to a child process running the `prerender-worker`
//! subcommand of this same binary, with the staging name and catalog id as
//! positional arguments and a forced production flag in its environment. The
//! worker reads the flag back with [`worker_mode`] and logs it at startup.
//! A worker that exits 0 succeeded; anything else is a failure of that catalog.
//!
//! ## Scheduling
//!
//! - **One worker** (the default): catalogs run strictly one after another,
//!   all on `base_port`.
//! - **Pool**: up to `workers` processes run at once on a rayon pool. Job `i`
//!   gets port `base_port + i`, so no two workers ever share a server port.
//!
//! ## Failure policy
//!
//! Fail-fast stops scheduling new catalogs at the first failure and returns
//! that failure. Best-effort runs every catalog and reports all outcomes in a
//! [`PrerenderSummary`]; [`PrerenderSummary::into_result`] turns any failures
//! into one aggregate error at the end.

use rayon::prelude::*;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::process::Command;
use thiserror::Error;
use tracing::{error, info};

/// Environment variable forced to `production` in every worker.
pub const PRODUCTION_ENV_VAR: &str = "CATALOG_PRERENDER_ENV";

/// Mode assumed by a worker started without [`PRODUCTION_ENV_VAR`].
pub const DEFAULT_WORKER_MODE: &str = "development";

/// The run mode a worker reports, from the value of [`PRODUCTION_ENV_VAR`].
pub fn worker_mode(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_WORKER_MODE.to_string())
}

/// Subcommand that runs one worker.
pub const WORKER_SUBCOMMAND: &str = "prerender-worker";

/// One unit of work: prerender a single catalog on a given port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerJob {
    pub catalog_id: String,
    pub staging_name: String,
    pub port: u16,
}

/// Starts a worker for a job and waits for it to exit.
///
/// Returns the exit code (`None` when the process was killed by a signal).
pub trait WorkerLauncher: Sync {
    fn launch(&self, job: &WorkerJob) -> io::Result<Option<i32>>;
}

/// Launches workers as child processes of the current executable.
pub struct ProcessLauncher {
    program: OsString,
    /// Arguments placed before the subcommand (global flags such as `--config`).
    leading_args: Vec<OsString>,
}

impl ProcessLauncher {
    /// Re-invoke the running binary.
    pub fn current_exe(leading_args: Vec<OsString>) -> io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?.into_os_string(),
            leading_args,
        })
    }

    pub fn new(program: impl Into<OsString>, leading_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    fn command(&self, job: &WorkerJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg(WORKER_SUBCOMMAND)
            .arg(&job.staging_name)
            .arg(&job.catalog_id)
            .arg("--port")
            .arg(job.port.to_string())
            .env(PRODUCTION_ENV_VAR, "production");
        cmd
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, job: &WorkerJob) -> io::Result<Option<i32>> {
        let status = self.command(job).status()?;
        Ok(status.code())
    }
}

/// Why a catalog's worker did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerFailure {
    Exit(Option<i32>),
    Spawn(String),
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit(Some(code)) => write!(f, "exited with code {code}"),
            Self::Exit(None) => write!(f, "terminated by signal"),
            Self::Spawn(message) => write!(f, "failed to start: {message}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PrerenderError {
    #[error("Prerender worker for {catalog_id} {failure}")]
    WorkerFailed {
        catalog_id: String,
        failure: WorkerFailure,
    },
    #[error("{} of {total} prerender workers failed", .failed.len())]
    WorkersFailed {
        failed: Vec<(String, WorkerFailure)>,
        total: usize,
    },
    #[error("Not enough ports above {base_port} for {jobs} workers")]
    PortRange { base_port: u16, jobs: usize },
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Scheduling knobs for [`prerender_all`].
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Maximum concurrent workers. 1 means sequential.
    pub workers: usize,
    pub fail_fast: bool,
    pub base_port: u16,
    pub staging_name: String,
}

/// Outcome of every catalog that was scheduled, in catalog order.
#[derive(Debug, Default)]
pub struct PrerenderSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, WorkerFailure)>,
}

impl PrerenderSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn into_result(self) -> Result<Self, PrerenderError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(PrerenderError::WorkersFailed {
                total: self.total(),
                failed: self.failed,
            })
        }
    }
}

/// Assign one job per catalog.
pub fn plan_jobs(
    catalog_ids: &[String],
    options: &OrchestratorOptions,
) -> Result<Vec<WorkerJob>, PrerenderError> {
    let pooled = options.workers > 1;
    catalog_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let port = if pooled {
                u16::try_from(i)
                    .ok()
                    .and_then(|offset| options.base_port.checked_add(offset))
                    .ok_or(PrerenderError::PortRange {
                        base_port: options.base_port,
                        jobs: catalog_ids.len(),
                    })?
            } else {
                options.base_port
            };
            Ok(WorkerJob {
                catalog_id: id.clone(),
                staging_name: options.staging_name.clone(),
                port,
            })
        })
        .collect()
}

fn run_job(launcher: &dyn WorkerLauncher, job: &WorkerJob) -> Result<(), WorkerFailure> {
    info!(catalog = %job.catalog_id, port = job.port, "starting prerender worker");
    let result = match launcher.launch(job) {
        Ok(Some(0)) => Ok(()),
        Ok(code) => Err(WorkerFailure::Exit(code)),
        Err(e) => Err(WorkerFailure::Spawn(e.to_string())),
    };
    if let Err(failure) = &result {
        error!(catalog = %job.catalog_id, %failure, "prerender worker failed");
    }
    result
}

/// Run a worker for every catalog.
///
/// With `fail_fast`, the first failure is returned as
/// [`PrerenderError::WorkerFailed`] and no further catalogs are started
/// (pooled jobs already running are allowed to finish). Otherwise every
/// catalog runs and the summary lists each outcome.
pub fn prerender_all(
    launcher: &dyn WorkerLauncher,
    catalog_ids: &[String],
    options: &OrchestratorOptions,
) -> Result<PrerenderSummary, PrerenderError> {
    let jobs = plan_jobs(catalog_ids, options)?;
    let outcomes = if options.workers <= 1 {
        run_sequential(launcher, &jobs, options.fail_fast)?
    } else {
        run_pooled(launcher, &jobs, options)?
    };

    let mut summary = PrerenderSummary::default();
    for (catalog_id, outcome) in outcomes {
        match outcome {
            Ok(()) => summary.succeeded.push(catalog_id),
            Err(failure) => summary.failed.push((catalog_id, failure)),
        }
    }
    Ok(summary)
}

type Outcome = (String, Result<(), WorkerFailure>);

fn run_sequential(
    launcher: &dyn WorkerLauncher,
    jobs: &[WorkerJob],
    fail_fast: bool,
) -> Result<Vec<Outcome>, PrerenderError> {
    let mut outcomes = Vec::with_capacity(jobs.len());
    for job in jobs {
        match run_job(launcher, job) {
            Err(failure) if fail_fast => {
                return Err(PrerenderError::WorkerFailed {
                    catalog_id: job.catalog_id.clone(),
                    failure,
                });
            }
            result => outcomes.push((job.catalog_id.clone(), result)),
        }
    }
    Ok(outcomes)
}

fn run_pooled(
    launcher: &dyn WorkerLauncher,
    jobs: &[WorkerJob],
    options: &OrchestratorOptions,
) -> Result<Vec<Outcome>, PrerenderError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()?;

    if options.fail_fast {
        // Collecting into a Result stops handing out jobs after the first Err.
        pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    run_job(launcher, job)
                        .map(|()| (job.catalog_id.clone(), Ok(())))
                        .map_err(|failure| PrerenderError::WorkerFailed {
                            catalog_id: job.catalog_id.clone(),
                            failure,
                        })
                })
                .collect::<Result<Vec<Outcome>, PrerenderError>>()
        })
    } else {
        Ok(pool.install(|| {
            jobs.par_iter()
                .map(|job| (job.catalog_id.clone(), run_job(launcher, job)))
                .collect()
        }))
    }
}
