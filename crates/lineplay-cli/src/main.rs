//! `lineplay` binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use lineplay_cli::{Cli, RunSettings, run};
use lineplay_data::presets::{PresetError, PresetFile};
use lineplay_model::SystemClock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            if let Some(PresetError::UnknownPreset { name, .. }) =
                err.downcast_ref::<PresetError>()
            {
                eprintln!("{}", Cli::command().render_help());
                eprintln!("Preset '{name}' not found: check {}", cli.presets.display());
                return ExitCode::from(2);
            }
            tracing::error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    match execute(&cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> Result<RunSettings> {
    let (presets, _created) = PresetFile::load_or_create(&cli.presets)
        .with_context(|| format!("loading presets from {}", cli.presets.display()))?;
    Ok(cli.settings(&presets)?)
}

fn execute(cli: &Cli, settings: &RunSettings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let report = runtime.block_on(run::execute(settings, Arc::new(SystemClock)))?;
    println!("{}", report.render(cli.format)?);
    Ok(())
}
