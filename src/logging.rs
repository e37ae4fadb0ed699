//! Logging setup.
//! Every event goes to the console and is appended to `<logs>/dfps.log`.
//! The GUI and HTTP stacks are chatty at debug level, so they are capped at warn.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

pub const LOG_FILE_NAME: &str = "dfps.log";

const QUIET_TARGETS: [&str; 8] = ["winit", "eframe", "egui", "egui_glow", "wgpu", "naga", "reqwest", "hyper"];

fn targets() -> Targets {
    QUIET_TARGETS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::INFO), |targets, target| {
            targets.with_target(*target, LevelFilter::WARN)
        })
}

/// Installs the global subscriber. Returns the log file path.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    let path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let console = tracing_subscriber::fmt::layer().with_target(false);
    let logfile = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(console)
        .with(logfile)
        .with(targets())
        .try_init()
        .context("Failed to install logger")?;

    Ok(path)
}
