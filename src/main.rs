//! Git repository statistics tool
//!
//! Prints a one-shot report by default; `gitwatch tui` starts the
//! interactive dashboard.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tokio::runtime::{Builder, Runtime};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gitwatch::cli::{Cli, Command};
use gitwatch::{app, report};

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "GITWATCH_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr.
fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .init();
}

/// Log to `path`; the dashboard owns the terminal so nothing else is safe.
fn init_file_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .with(env_filter())
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = cli.extract_options();

    match cli.command.clone() {
        Some(Command::Tui { interval }) => {
            if let Some(path) = &cli.log_file {
                init_file_logging(path)?;
            }
            let config = cli.dashboard_config(interval);

            let rt = Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start runtime")?;
            rt.block_on(app::run_dashboard(config, options))
        }
        None => {
            match &cli.log_file {
                Some(path) => init_file_logging(path)?,
                None => init_stderr_logging(),
            }

            let rt = Runtime::new().context("failed to start runtime")?;
            let output = rt
                .block_on(report::run(&cli.path, cli.output, options))
                .with_context(|| format!("failed to scan directory {}", cli.path.display()))?;
            println!("{}", output);
            Ok(())
        }
    }
}
