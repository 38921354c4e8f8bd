//! # lineplay-cli
//!
//! Replays a recorded assembly-line event feed in scaled real time and
//! publishes the line's state through the basic or TMC topology.
//!
//! Run parameters come from a named preset in the presets file (written with
//! stock presets on first use); command-line flags override preset values.

pub mod run;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lineplay_core::replay::ReplayConfig;
use lineplay_core::time::{SimTime, parse_sim_time};
use lineplay_data::presets::{DEFAULT_PRESET, PresetError, PresetFile, pace_for_speed};
use lineplay_model::Topology;

/// Provides live line data from a recorded feed of simulated factory events.
#[derive(Debug, Parser)]
#[command(name = "lineplay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Name of the preset to start from.
    #[arg(short = 'p', value_name = "PRESET", default_value = DEFAULT_PRESET)]
    pub preset: String,

    /// Use the TMC-based model instead of the basic model.
    #[arg(short = 't', long = "tmc-model")]
    pub tmc_model: bool,

    /// Feed file with the recorded events.
    #[arg(short = 'f', value_name = "FEED_FILE")]
    pub feed_file: Option<PathBuf>,

    /// Skip to this time in the feed before delivering anything.
    #[arg(short = 's', value_name = "TIMESTAMP", value_parser = parse_timestamp_arg)]
    pub skip: Option<SimTime>,

    /// Begin live playback by fast-forwarding to this time.
    #[arg(short = 'b', value_name = "TIMESTAMP", value_parser = parse_timestamp_arg)]
    pub start: Option<SimTime>,

    /// Playback speed multiplier; 0 replays unthrottled.
    #[arg(short = 'x', value_name = "SPEED")]
    pub speed: Option<f64>,

    /// Presets file (TOML, RON or JSON).
    #[arg(long, value_name = "PATH", default_value = "presets.toml")]
    pub presets: PathBuf,

    /// Register objects the line definition does not know about.
    #[arg(long)]
    pub auto_register: bool,

    /// Seconds to wait between the playback banner and the first event.
    #[arg(long, value_name = "SECONDS")]
    pub lead_in: Option<f64>,

    /// Output format for the final report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

fn parse_timestamp_arg(text: &str) -> Result<SimTime, String> {
    parse_sim_time(text).map_err(|e| format!("'{text}' is not a timestamp: {e}"))
}

/// Everything a run needs, after preset resolution and flag overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub preset: String,
    pub topology: Topology,
    pub feed_file: PathBuf,
    pub replay: ReplayConfig,
    pub lead_in: Duration,
}

impl Cli {
    /// Resolve the selected preset from `presets` and apply flag overrides.
    pub fn settings(&self, presets: &PresetFile) -> Result<RunSettings, PresetError> {
        let preset = presets.resolve(&self.preset)?;

        let use_tmc = self.tmc_model || preset.use_tmc;
        let pace = match self.speed {
            Some(speed) => pace_for_speed(speed),
            None => preset.pace(),
        };
        let lead_in = match self.lead_in {
            Some(secs) => {
                Duration::try_from_secs_f64(secs).map_err(|e| PresetError::InvalidValue {
                    preset: preset.name.clone(),
                    field: "lead_in_secs",
                    detail: e.to_string(),
                })?
            }
            None => preset.lead_in,
        };

        Ok(RunSettings {
            topology: if use_tmc { Topology::Tmc } else { Topology::Basic },
            feed_file: self.feed_file.clone().unwrap_or(preset.feed_filepath),
            replay: ReplayConfig {
                pace,
                skip_to: self.skip.unwrap_or(preset.skip_to_time),
                fast_forward_to: self.start.unwrap_or(preset.start_timestamp),
                auto_register: self.auto_register || preset.auto_register,
            },
            lead_in,
            preset: preset.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_default_preset() {
        let cli = Cli::parse_from(["lineplay"]);
        let settings = cli.settings(&PresetFile::stock()).unwrap();

        assert_eq!(settings.preset, "default");
        assert_eq!(settings.topology, Topology::Basic);
        assert_eq!(settings.feed_file, PathBuf::from("data/schedule1.csv"));
        assert_eq!(settings.replay.pace, 60.0);
        assert_eq!(settings.replay.skip_to, SimTime::ZERO);
        assert_eq!(settings.replay.fast_forward_to, SimTime::from_num(365));
        assert_eq!(settings.lead_in, Duration::from_secs(5));
        assert!(!settings.replay.auto_register);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn flags_override_preset() {
        let cli = Cli::parse_from([
            "lineplay",
            "-p",
            "TESTING",
            "-t",
            "-f",
            "feeds/night.csv",
            "-s",
            "120.5",
            "-b",
            "400",
            "-x",
            "0",
            "--auto-register",
            "--lead-in",
            "0",
            "--format",
            "json",
        ]);
        let settings = cli.settings(&PresetFile::stock()).unwrap();

        assert_eq!(settings.preset, "testing");
        assert_eq!(settings.topology, Topology::Tmc);
        assert_eq!(settings.feed_file, PathBuf::from("feeds/night.csv"));
        assert_eq!(settings.replay.pace, 0.0);
        assert_eq!(settings.replay.skip_to, "120.5".parse::<SimTime>().unwrap());
        assert_eq!(settings.replay.fast_forward_to, SimTime::from_num(400));
        assert!(settings.replay.auto_register);
        assert_eq!(settings.lead_in, Duration::ZERO);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn preset_speed_used_without_flag() {
        let cli = Cli::parse_from(["lineplay", "-p", "testing"]);
        let settings = cli.settings(&PresetFile::stock()).unwrap();
        assert_eq!(settings.replay.pace, 1.0);
    }

    #[test]
    fn tmc_preset_selects_tmc() {
        let cli = Cli::parse_from(["lineplay", "-p", "tmc"]);
        assert_eq!(cli.settings(&PresetFile::stock()).unwrap().topology, Topology::Tmc);
    }

    #[test]
    fn unknown_preset() {
        let cli = Cli::parse_from(["lineplay", "-p", "weekend"]);
        let err = cli.settings(&PresetFile::stock()).unwrap_err();
        assert!(matches!(err, PresetError::UnknownPreset { .. }));
    }

    #[test]
    fn bad_timestamp_rejected() {
        assert!(Cli::try_parse_from(["lineplay", "-s", "noon"]).is_err());
    }
}
