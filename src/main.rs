use catalog_prerender::prerender::{
    self, OrchestratorOptions, ProcessLauncher, WorkerSettings,
};
use catalog_prerender::{archive, catalog, config, output, rewrite, routes};
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "catalog-prerender")]
#[command(about = "Ingest catalog archives and prerender their template pages")]
#[command(long_about = "\
Ingest catalog archives and prerender their template pages

Archives are named after their catalog id and hold exactly one catalog:

  <uuid>.zip
  └── <uuid>/
      ├── config.json              # Catalog metadata (id, owner, ...)
      ├── catalog.json             # Content document (templates, asset URLs)
      ├── catalog/                 # Catalog assets
      ├── templates/               # Template assets
      ├── category/
      └── translations/

The build extracts archives into the staging directory, merges every
config.json into <staging>/config.json, rewrites upload URLs in catalog.json
to /<staging>/<uuid>/..., writes the hosting route config into the dist tree,
moves the staging directory into dist, and snapshots every template page:

  dist/catalogs/<uuid>/templates/<template-id>/index.html

Run 'catalog-prerender gen-config' to generate a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Pipeline config file
    #[arg(long, global = true, default_value = config::CONFIG_FILENAME)]
    config: PathBuf,

    /// Directory scanned for <uuid>.zip archives (overrides paths.archives)
    #[arg(long, global = true)]
    archives: Option<PathBuf>,

    /// Pre-built distributable tree (overrides paths.dist)
    #[arg(long, global = true)]
    dist: Option<PathBuf>,

    /// Staging directory name (overrides paths.staging)
    #[arg(long, global = true)]
    staging: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

/// Flags for the full pipeline.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Stop after publishing the staging tree into dist
    #[arg(long)]
    no_prerender: bool,

    /// Prerender every catalog and report failures at the end
    #[arg(long)]
    best_effort: bool,

    /// Maximum concurrent prerender workers (overrides prerender.max_workers)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: ingest → aggregate → rewrite → routes → publish → prerender
    Build(BuildArgs),
    /// Validate archives without extracting anything
    Check,
    /// Prerender one catalog's template pages (started by `build`)
    PrerenderWorker {
        /// Staging directory name inside the dist tree
        staging_name: String,
        /// Catalog id
        catalog_id: String,
        /// Local server port (defaults to prerender.base_port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a stock catalog-prerender.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = resolve_cli_config(&cli)?;
    let work_dir = std::env::current_dir()?;

    match &cli.command {
        Command::Build(args) => build(&cli, &config, &work_dir, args)?,
        Command::Check => {
            let archives_dir = config.archives_dir(&work_dir);
            println!("==> Checking {}", archives_dir.display());
            let report = archive::check(&archives_dir)?;
            output::print_ingest_report(&report);
            println!(
                "==> {} of {} archives valid",
                report.accepted_ids().len(),
                report.archives.len()
            );
        }
        Command::PrerenderWorker {
            staging_name,
            catalog_id,
            port,
        } => {
            let settings = WorkerSettings::from_config(
                &config,
                config.dist_root(&work_dir),
                staging_name,
                catalog_id,
                *port,
            );
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_route_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = prerender::run_worker(&settings, Some(tx));
            printer.join().map_err(|_| "output printer thread panicked")?;
            output::print_worker_report(catalog_id, &result?);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Load the config file and apply command-line overrides.
fn resolve_cli_config(cli: &Cli) -> Result<config::PipelineConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(archives) = &cli.archives {
        config.paths.archives = archives.clone();
    }
    if let Some(dist) = &cli.dist {
        config.paths.dist = dist.clone();
    }
    if let Some(staging) = &cli.staging {
        config.paths.staging = staging.clone();
    }
    if let Command::Build(args) = &cli.command {
        if let Some(workers) = args.workers {
            config.prerender.max_workers = Some(workers);
        }
        if args.best_effort {
            config.prerender.fail_fast = false;
        }
    }
    config.validate()?;
    Ok(config)
}

fn build(
    cli: &Cli,
    config: &config::PipelineConfig,
    work_dir: &Path,
    args: &BuildArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let archives_dir = config.archives_dir(work_dir);
    let staging_root = config.staging_root(work_dir);
    let dist_root = config.dist_root(work_dir);
    let staging_name = config.paths.staging.as_str();

    println!("==> Stage 1: Ingesting archives from {}", archives_dir.display());
    let report = archive::ingest(&archives_dir, &staging_root)?;
    output::print_ingest_report(&report);

    println!("==> Stage 2: Aggregating catalog configs");
    std::fs::create_dir_all(&staging_root)?;
    let dirs = catalog::discover(&staging_root, config.catalogs.sort)?;
    let aggregate = catalog::aggregate_configs(&staging_root, &dirs);
    let consolidated = catalog::write_consolidated(&staging_root, &aggregate)?;
    output::print_aggregate(&aggregate);
    info!(path = %consolidated.display(), "wrote consolidated config");
    let catalog_ids = aggregate.catalog_ids();

    println!("==> Stage 3: Rewriting upload URLs");
    let rewrites = rewrite::rewrite_catalogs(&staging_root, &dirs, staging_name);
    output::print_rewrite_report(&rewrites);

    println!("==> Stage 4: Writing route config");
    let route_config =
        routes::generate_route_config(&catalog_ids, &config.hosting, chrono::Utc::now());
    let route_path = routes::write_route_config(&dist_root, &config.hosting, &route_config)?;
    output::print_route_config(&route_config, &route_path);

    println!("==> Stage 5: Publishing {} → {}", staging_root.display(), dist_root.display());
    catalog::publish_staging(&staging_root, &dist_root, staging_name)?;

    if args.no_prerender {
        println!("==> Build complete (prerender skipped): {}", dist_root.display());
        return Ok(());
    }

    let workers = config::effective_workers(&config.prerender);
    println!(
        "==> Stage 6: Prerendering {} catalogs ({} at a time)",
        catalog_ids.len(),
        workers
    );
    let launcher = ProcessLauncher::current_exe(worker_leading_args(cli))?;
    let options = OrchestratorOptions {
        workers,
        fail_fast: config.prerender.fail_fast,
        base_port: config.prerender.base_port,
        staging_name: staging_name.to_string(),
    };
    let summary = prerender::prerender_all(&launcher, &catalog_ids, &options)?;
    output::print_prerender_summary(&summary);
    summary.into_result()?;

    println!("==> Build complete: {}", dist_root.display());
    Ok(())
}

/// Global flags forwarded to every worker so it resolves the same config.
fn worker_leading_args(cli: &Cli) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--config".into(), cli.config.clone().into()];
    if let Some(dist) = &cli.dist {
        args.push("--dist".into());
        args.push(dist.clone().into());
    }
    if cli.verbose > 0 {
        args.push(format!("-{}", "v".repeat(cli.verbose as usize)).into());
    }
    if let LogFormat::Json = cli.log_format {
        args.push("--log-format".into());
        args.push("json".into());
    }
    args
}

/// Install the tracing subscriber. Logs go to stderr; stdout carries the
/// stage output.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "catalog_prerender=info",
        1 => "catalog_prerender=debug",
        _ => "catalog_prerender=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
