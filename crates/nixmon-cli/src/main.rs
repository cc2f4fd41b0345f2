//! nixmon - NixOS fleet revision-freshness monitor
//!
//! Runs one evaluation cycle: probe every configured host, classify each as
//! fresh, stale, or unknown, and raise a single desktop notification for
//! the hosts that need attention. Intended to be invoked periodically by a
//! systemd timer (or any external scheduler), which owns re-run cadence.
//!
//! Exit codes: 0 when every host is fresh, 1 when a notification was
//! raised, 2 on a configuration or runtime error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nixmon_core::{
    build_report, evaluate_hosts, init_tracing, GithubCommits, Notifier, NotifySendNotifier,
    RevisionCache, RunReport, Settings, NOTIFICATION_TITLE,
};
use tracing::{debug, error, info, warn, Level};

#[derive(Parser)]
#[command(name = "nixmon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check NixOS hosts for stale nixpkgs revisions", long_about = None)]
struct Cli {
    /// Path to the TOML settings file
    #[arg(short, long)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Print the would-be notification to stdout instead of delivering it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match run(&cli).await {
        Ok(report) if report.should_notify => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> Result<RunReport> {
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    debug!(?settings, "loaded settings");

    let upstream = GithubCommits::new(settings.http_timeout);
    let cache = Arc::new(RevisionCache::new(upstream));
    let verdicts = evaluate_hosts(&settings, cache).await;
    let report = build_report(verdicts);

    if report.should_notify {
        for line in report.summary_text.lines() {
            info!("{line}");
        }
        if cli.dry_run {
            println!("{NOTIFICATION_TITLE}\n\n{}", report.summary_text);
        } else {
            let notifier = NotifySendNotifier::default();
            // Delivery failure is not fatal; the summary is already logged.
            if let Err(err) = notifier.notify(NOTIFICATION_TITLE, &report.summary_text).await {
                warn!("cannot deliver notification: {err}");
            }
        }
    } else {
        debug!("all hosts are up to date");
    }

    Ok(report)
}
