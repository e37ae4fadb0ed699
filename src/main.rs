mod camera;
mod catalog;
mod chart;
mod config;
mod geometry;
mod logging;
mod positions;
mod scene;
mod snapshot;
mod utils;
mod workflow;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command, value_parser};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::catalog::MastCatalog;
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::workflow::{StageKind, TerminalSelector};

fn cli() -> Command {
    Command::new("dfps-sky")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plan DFPS guide camera and fiber placements on a TIC star field")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Configuration file; written with defaults if missing")
                .default_value(DEFAULT_CONFIG_PATH)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("field")
                .long("field")
                .value_name("NAME")
                .help("Override the field name (also names the catalog cache)"),
        )
        .arg(
            Arg::new("ra")
                .long("ra")
                .value_name("DEG")
                .help("Override the field right ascension in degrees")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("dec")
                .long("dec")
                .value_name("DEG")
                .help("Override the field declination in degrees")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("stage")
                .long("stage")
                .value_name("STAGE")
                .help("Stage to start from, reusing files written by earlier runs")
                .default_value("cameras")
                .value_parser(["cameras", "fibers", "targets"]), // Allowed values
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .help("Save a PNG of each stage to the analysis directory when its window closes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-fields")
                .long("list-fields")
                .help("List fields with a cached catalog and exit")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config_existed = config_path.exists();
    let mut config = Config::load_or_create(&config_path)?;

    if let Some(name) = matches.get_one::<String>("field") {
        config.field.name = name.clone();
    }
    if let Some(ra) = matches.get_one::<f64>("ra") {
        config.field.ra_deg = *ra;
    }
    if let Some(dec) = matches.get_one::<f64>("dec") {
        config.field.dec_deg = *dec;
    }
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    // Directories first: the log file lives in one of them.
    let created = utils::create_directories(&config.directories())?;
    let log_path = logging::init(&config.log_directory())?;
    for dir in &created {
        info!("{} created.", dir.display());
    }
    if !config_existed {
        info!("Wrote default configuration to {}", config_path.display());
    }
    info!("Logging to {}", log_path.display());

    if matches.get_flag("list-fields") {
        for name in utils::file_stems_with_ext(&config.data_directory(), ".csv")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let first_stage: StageKind = matches
        .get_one::<String>("stage")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(StageKind::Cameras);

    let field = config.field();
    info!(
        "Field {} at ra={} dec={}, search radius {:.4} deg, magnitude cutoff {}",
        field.name, field.center.x, field.center.y, field.search_radius_deg, field.magnitude_cutoff
    );

    // Step 1: TIC stars around the field, cached per field name
    let mast = MastCatalog::new(Duration::from_secs(config.search.timeout_secs))?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let stars = runtime
        .block_on(catalog::lookup(&mast, &field, &config.catalog_cache_path()))
        .context("Failed to load TIC stars")?;
    info!("{} stars brighter than magnitude {}", stars.len(), field.magnitude_cutoff);

    // Step 2: interactive placement stages
    workflow::run(
        &config,
        &stars,
        first_stage,
        matches.get_flag("snapshot"),
        &mut TerminalSelector,
    )?;

    info!("All stages closed; results are in {}", config.analysis_directory().display());
    Ok(())
}
