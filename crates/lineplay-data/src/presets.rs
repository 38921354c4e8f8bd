//! Named playback presets.
//!
//! A presets file carries a `default` table and a `presets` map of named
//! tables. Every field is optional: a named preset inherits unset fields from
//! `default`, which in turn inherits from [`PresetFields::builtin`].
//!
//! ```toml
//! [default]
//! feed_filepath = "data/schedule1.csv"
//!
//! [presets.testing]
//! playback_speed = 60.0
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lineplay_core::time::SimTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::loader::{DataLoadError, deserialize_file, find_data_file, serialize_file};

/// Name under which the `default` table resolves.
pub const DEFAULT_PRESET: &str = "default";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error("preset '{name}' not found (available: {})", available.join(", "))]
    UnknownPreset { name: String, available: Vec<String> },

    #[error("preset '{preset}': invalid {field}: {detail}")]
    InvalidValue {
        preset: String,
        field: &'static str,
        detail: String,
    },
}

// ===========================================================================
// File model
// ===========================================================================

/// One table of the presets file. Unset fields inherit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_tmc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_filepath: Option<String>,
    /// Playback speed multiplier; 1 means one simulated unit per minute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_to_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_in_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_register: Option<bool>,
}

impl PresetFields {
    /// Built-in defaults; every field set.
    pub fn builtin() -> Self {
        Self {
            use_tmc: Some(false),
            feed_filepath: Some("data/schedule1.csv".to_string()),
            playback_speed: Some(1.0),
            skip_to_time: Some(0.0),
            start_timestamp: Some(365.0),
            lead_in_secs: Some(5.0),
            auto_register: Some(false),
        }
    }

    /// Fill every unset field of `self` from `base`.
    pub fn inherit(&self, base: &PresetFields) -> PresetFields {
        PresetFields {
            use_tmc: self.use_tmc.or(base.use_tmc),
            feed_filepath: self.feed_filepath.clone().or_else(|| base.feed_filepath.clone()),
            playback_speed: self.playback_speed.or(base.playback_speed),
            skip_to_time: self.skip_to_time.or(base.skip_to_time),
            start_timestamp: self.start_timestamp.or(base.start_timestamp),
            lead_in_secs: self.lead_in_secs.or(base.lead_in_secs),
            auto_register: self.auto_register.or(base.auto_register),
        }
    }
}

/// Contents of a presets file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetFile {
    pub default: PresetFields,
    pub presets: BTreeMap<String, PresetFields>,
}

// ===========================================================================
// Resolved preset
// ===========================================================================

/// A fully resolved preset, ready to configure a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub use_tmc: bool,
    pub feed_filepath: PathBuf,
    pub playback_speed: f64,
    pub skip_to_time: SimTime,
    pub start_timestamp: SimTime,
    pub lead_in: Duration,
    pub auto_register: bool,
}

impl Preset {
    /// Real seconds per simulated-time unit for this preset's speed.
    pub fn pace(&self) -> f64 {
        pace_for_speed(self.playback_speed)
    }
}

/// Convert a playback speed multiplier to pace: `60 / speed` real seconds per
/// simulated unit, or 0 (unthrottled) when the speed is not positive.
pub fn pace_for_speed(speed: f64) -> f64 {
    if speed > 0.0 { 60.0 / speed } else { 0.0 }
}

// ===========================================================================
// Loading and resolution
// ===========================================================================

impl PresetFile {
    /// Built-in defaults plus the stock `basic`, `tmc` and `testing` presets.
    pub fn stock() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert("basic".to_string(), PresetFields::default());
        presets.insert(
            "tmc".to_string(),
            PresetFields {
                use_tmc: Some(true),
                ..PresetFields::default()
            },
        );
        presets.insert(
            "testing".to_string(),
            PresetFields {
                playback_speed: Some(60.0),
                ..PresetFields::default()
            },
        );
        Self {
            default: PresetFields::builtin(),
            presets,
        }
    }

    /// Load presets from `path`.
    pub fn load(path: &Path) -> Result<Self, PresetError> {
        Ok(deserialize_file(path)?)
    }

    /// Load presets from `path` or a sibling file with the same stem in
    /// another supported format. When none exists, the stock presets are
    /// written to `path` and returned.
    ///
    /// The flag is `true` when the file was created.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool), PresetError> {
        match find_data_file(path)? {
            Some(existing) => {
                let file = Self::load(&existing)?;
                if file.defaults_altered() {
                    warn!(
                        path = %existing.display(),
                        "preset defaults have been altered, delete the [default] table to restore"
                    );
                }
                Ok((file, false))
            }
            None => {
                let file = Self::stock();
                serialize_file(path, &file)?;
                info!(path = %path.display(), "wrote stock presets");
                Ok((file, true))
            }
        }
    }

    /// Whether the `default` table differs from the built-in defaults.
    pub fn defaults_altered(&self) -> bool {
        self.default != PresetFields::builtin()
    }

    /// Preset names, `default` first.
    pub fn names(&self) -> Vec<String> {
        std::iter::once(DEFAULT_PRESET.to_string())
            .chain(self.presets.keys().cloned())
            .collect()
    }

    /// Find the stored name matching `name`: exact, then lower-case, then
    /// upper-case, then any case-insensitive match.
    pub fn lookup(&self, name: &str) -> Option<String> {
        let exists = |candidate: &str| {
            candidate == DEFAULT_PRESET || self.presets.contains_key(candidate)
        };
        let lower = name.to_lowercase();
        let upper = name.to_uppercase();
        [name, lower.as_str(), upper.as_str()]
            .into_iter()
            .find(|candidate| exists(*candidate))
            .map(str::to_string)
            .or_else(|| {
                self.names()
                    .into_iter()
                    .find(|stored| stored.to_uppercase() == upper)
            })
    }

    /// Resolve `name` to a complete preset.
    pub fn resolve(&self, name: &str) -> Result<Preset, PresetError> {
        let stored = self
            .lookup(name)
            .ok_or_else(|| PresetError::UnknownPreset {
                name: name.to_string(),
                available: self.names(),
            })?;

        let defaults = self.default.inherit(&PresetFields::builtin());
        let fields = match self.presets.get(&stored) {
            Some(preset) => preset.inherit(&defaults),
            None => defaults,
        };
        build_preset(stored, fields)
    }
}

fn build_preset(name: String, fields: PresetFields) -> Result<Preset, PresetError> {
    let invalid = |field: &'static str, detail: String| PresetError::InvalidValue {
        preset: name.clone(),
        field,
        detail,
    };
    let time = |field: &'static str, value: Option<f64>| {
        let value = value.unwrap_or_default();
        SimTime::checked_from_num(value)
            .ok_or_else(|| invalid(field, format!("{value} is not a representable timestamp")))
    };

    let skip_to_time = time("skip_to_time", fields.skip_to_time)?;
    let start_timestamp = time("start_timestamp", fields.start_timestamp)?;
    let lead_in_secs = fields.lead_in_secs.unwrap_or_default();
    let lead_in = Duration::try_from_secs_f64(lead_in_secs)
        .map_err(|e| invalid("lead_in_secs", e.to_string()))?;
    let playback_speed = fields.playback_speed.unwrap_or_default();
    if playback_speed.is_nan() {
        return Err(invalid("playback_speed", "NaN".to_string()));
    }

    Ok(Preset {
        use_tmc: fields.use_tmc.unwrap_or_default(),
        feed_filepath: PathBuf::from(fields.feed_filepath.unwrap_or_default()),
        playback_speed,
        skip_to_time,
        start_timestamp,
        lead_in,
        auto_register: fields.auto_register.unwrap_or_default(),
        name,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lineplay_presets_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    // -----------------------------------------------------------------------
    // Test 1: Default preset resolves to the built-in values
    // -----------------------------------------------------------------------
    #[test]
    fn builtin_defaults() {
        let preset = PresetFile::default().resolve("DEFAULT").unwrap();
        assert_eq!(preset.name, "default");
        assert!(!preset.use_tmc);
        assert_eq!(preset.feed_filepath, PathBuf::from("data/schedule1.csv"));
        assert_eq!(preset.playback_speed, 1.0);
        assert_eq!(preset.skip_to_time, SimTime::ZERO);
        assert_eq!(preset.start_timestamp, SimTime::from_num(365));
        assert_eq!(preset.lead_in, Duration::from_secs(5));
        assert!(!preset.auto_register);
        assert_eq!(preset.pace(), 60.0);
    }

    // -----------------------------------------------------------------------
    // Test 2: Named presets inherit from default, which inherits built-ins
    // -----------------------------------------------------------------------
    #[test]
    fn inheritance_chain() {
        let mut file = PresetFile::stock();
        file.default.feed_filepath = Some("data/other.csv".to_string());
        file.default.start_timestamp = None;

        let testing = file.resolve("testing").unwrap();
        assert_eq!(testing.playback_speed, 60.0);
        assert_eq!(testing.pace(), 1.0);
        assert_eq!(testing.feed_filepath, PathBuf::from("data/other.csv"));
        assert_eq!(testing.start_timestamp, SimTime::from_num(365));

        assert!(file.resolve("tmc").unwrap().use_tmc);
    }

    // -----------------------------------------------------------------------
    // Test 3: Lookup order is exact, lower, upper, then case-insensitive
    // -----------------------------------------------------------------------
    #[test]
    fn lookup_order() {
        let mut file = PresetFile::default();
        for name in ["night", "DAY", "Mixed", "Shift"] {
            file.presets.insert(name.to_string(), PresetFields::default());
        }
        file.presets.insert("shift".to_string(), PresetFields::default());

        assert_eq!(file.lookup("Shift").as_deref(), Some("Shift"));
        assert_eq!(file.lookup("NIGHT").as_deref(), Some("night"));
        assert_eq!(file.lookup("day").as_deref(), Some("DAY"));
        assert_eq!(file.lookup("mIXED").as_deref(), Some("Mixed"));
        assert_eq!(file.lookup("SHIFT").as_deref(), Some("shift"));
        assert_eq!(file.lookup("absent"), None);
    }

    // -----------------------------------------------------------------------
    // Test 4: Unknown preset lists what is available
    // -----------------------------------------------------------------------
    #[test]
    fn unknown_preset_error() {
        let err = PresetFile::stock().resolve("weekend").unwrap_err();
        match err {
            PresetError::UnknownPreset { name, available } => {
                assert_eq!(name, "weekend");
                assert_eq!(available, vec!["default", "basic", "testing", "tmc"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // -----------------------------------------------------------------------
    // Test 5: Speed to pace conversion
    // -----------------------------------------------------------------------
    #[test]
    fn pace_from_speed() {
        assert_eq!(pace_for_speed(1.0), 60.0);
        assert_eq!(pace_for_speed(120.0), 0.5);
        assert_eq!(pace_for_speed(0.0), 0.0);
        assert_eq!(pace_for_speed(-3.0), 0.0);
    }

    // -----------------------------------------------------------------------
    // Test 6: Invalid values are rejected
    // -----------------------------------------------------------------------
    #[test]
    fn invalid_values() {
        let mut file = PresetFile::default();
        file.default.lead_in_secs = Some(-1.0);
        let err = file.resolve("default").unwrap_err();
        assert!(matches!(err, PresetError::InvalidValue { field: "lead_in_secs", .. }));

        let mut file = PresetFile::default();
        file.default.skip_to_time = Some(1e20);
        let err = file.resolve("default").unwrap_err();
        assert!(matches!(err, PresetError::InvalidValue { field: "skip_to_time", .. }));
    }

    // -----------------------------------------------------------------------
    // Test 7: A missing file is created with the stock presets
    // -----------------------------------------------------------------------
    #[test]
    fn missing_file_written_with_stock() {
        let dir = make_test_dir("create");
        let path = dir.join("presets.toml");

        let (file, created) = PresetFile::load_or_create(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(file, PresetFile::stock());

        let (reloaded, created) = PresetFile::load_or_create(&path).unwrap();
        assert!(!created);
        assert_eq!(reloaded, PresetFile::stock());
        assert!(!reloaded.defaults_altered());
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Test 8: A sibling file in another format is picked up
    // -----------------------------------------------------------------------
    #[test]
    fn sibling_format_is_used() {
        let dir = make_test_dir("sibling");
        fs::write(
            dir.join("presets.json"),
            r#"{ "presets": { "fast": { "playback_speed": 600.0 } } }"#,
        )
        .unwrap();

        let (file, created) = PresetFile::load_or_create(&dir.join("presets.toml")).unwrap();
        assert!(!created);
        assert!(file.defaults_altered());
        let fast = file.resolve("FAST").unwrap();
        assert_eq!(fast.pace(), 0.1);
        assert_eq!(fast.start_timestamp, SimTime::from_num(365));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Test 9: TOML layout parses
    // -----------------------------------------------------------------------
    #[test]
    fn toml_layout() {
        let dir = make_test_dir("toml");
        let path = dir.join("presets.toml");
        fs::write(
            &path,
            "[default]\nstart_timestamp = 400.5\n\n\
             [presets.line2]\nuse_tmc = true\nfeed_filepath = \"data/line2.csv\"\n",
        )
        .unwrap();

        let file = PresetFile::load(&path).unwrap();
        let preset = file.resolve("line2").unwrap();
        assert!(preset.use_tmc);
        assert_eq!(preset.feed_filepath, PathBuf::from("data/line2.csv"));
        assert_eq!(preset.start_timestamp, "400.5".parse::<SimTime>().unwrap());
        cleanup(&dir);
    }
}
