use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use maid::{
    config::{MaidConfig, RunMode},
    logging, run,
    schedule::{self, Shutdown},
};
use std::path::PathBuf;

/// Audits a Plex server for missing preview thumbnails, voice activity data and markers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run a single audit pass and exit
    #[arg(long)]
    run_once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // A .env file is optional; real environment variables win over it.
    let _ = dotenvy::dotenv();

    let loaded = MaidConfig::load_config(args.config.as_deref());
    let mut cfg = loaded
        .as_ref()
        .ok()
        .cloned()
        .unwrap_or_else(MaidConfig::default_config);
    cfg.apply_process_env();
    if args.verbose {
        cfg.debug = true;
    }
    if args.run_once {
        cfg.run_once = true;
    }

    // Logging comes up first so configuration problems are reported in the
    // same format as everything else.
    logging::init(cfg.debug, cfg.log_dir.as_deref())?;

    if let Err(e) = loaded {
        error!("Failed to load configuration: {:#}", e);
        std::process::exit(1);
    }
    let Some(plan) = cfg.plan() else {
        std::process::exit(1);
    };

    let checks: Vec<_> = plan.features.iter().map(|f| f.describe()).collect();
    let mut skip_types: Vec<_> = plan.skip_types.iter().map(|t| t.as_str()).collect();
    skip_types.sort_unstable();
    let mut skip_names: Vec<_> = plan.skip_names.iter().map(String::as_str).collect();
    skip_names.sort_unstable();

    info!("Preview Maid starting");
    info!("Configuration loaded:");
    info!("  Server: {}", plan.server_url);
    info!("  Checks: {}", checks.join(", "));
    info!("  Skipped library types: {:?}", skip_types);
    info!("  Skipped library names: {:?}", skip_names);
    info!("  Request timeout: {}s", plan.timeout.as_secs());

    match plan.mode {
        RunMode::Once => {
            info!("Running a single audit pass");
            run::run_pass(&plan).await;
            info!("Single run complete, exiting");
        }
        RunMode::Daily(at) => {
            let mut shutdown = Shutdown::install().context("Failed to install signal handlers")?;

            if plan.run_on_startup {
                info!("Running start-up audit pass");
                if schedule::until_shutdown(shutdown.recv(), run::run_pass(&plan))
                    .await
                    .is_none()
                {
                    info!("Preview Maid stopped");
                    return Ok(());
                }
            }

            info!("Audits will run daily at {}", at);
            let plan = &plan;
            schedule::run_daily(at, plan.poll_interval, shutdown.recv(), move || {
                run::run_pass(plan)
            })
            .await;
            info!("Preview Maid stopped");
        }
    }

    Ok(())
}
