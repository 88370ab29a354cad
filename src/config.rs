//! Physical constants of the rig, loaded from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::debug;

use crate::types::RigError;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "TUR_RIG_CONFIG";
/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rig.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub motion: MotionConfig,
    pub strip: StripConfig,
    pub sensing: SensingConfig,
    pub schedule: ScheduleConfig,
}

/// Carriage geometry and stepping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub steps_per_mm: f64,
    /// Offset of cell 0 from the homed origin.
    pub offset_mm: f64,
    pub cell_pitch_mm: f64,
    /// Distance travelled away from the switch after it triggers.
    pub backoff_mm: f64,
    /// Half period of a step pulse while homing.
    pub homing_half_period_us: u64,
    /// Half period of a step pulse while travelling between cells.
    pub travel_half_period_us: u64,
    pub yield_every_steps: u64,
    pub homing_yield_every_steps: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: 80.0,
            offset_mm: 0.0,
            cell_pitch_mm: 13.8,
            backoff_mm: 2.0,
            homing_half_period_us: 300,
            travel_half_period_us: 200,
            yield_every_steps: 1000,
            homing_yield_every_steps: 1,
        }
    }
}

impl MotionConfig {
    pub fn backoff_steps(&self) -> i64 {
        (self.backoff_mm * self.steps_per_mm).round() as i64
    }

    pub fn pitch_steps(&self) -> f64 {
        self.cell_pitch_mm * self.steps_per_mm
    }
}

/// LED strip layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub led_count: usize,
    /// The upper LED of cell 0's pair. Cells run toward lower indices.
    pub first_led: i64,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            led_count: 142,
            first_led: 35,
        }
    }
}

/// Color sensing policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensingConfig {
    pub samples: u32,
    pub sample_interval_ms: u64,
    /// Time the sensor gets to settle after the read indicator turns on.
    pub settle_ms: u64,
    pub one_margin: f32,
    pub zero_margin: f32,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            samples: 3,
            sample_interval_ms: 10,
            settle_ms: 250,
            one_margin: 8.0,
            zero_margin: 10.0,
        }
    }
}

/// Main loop pacing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub cycle_delay_ms: u64,
    pub ambient_frame_ms: u64,
    pub off_frame_ms: u64,
    pub halt_flash_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_delay_ms: 100,
            ambient_frame_ms: 10,
            off_frame_ms: 100,
            halt_flash_ms: 300,
        }
    }
}

impl RigConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, RigError> {
        let config: RigConfig =
            toml::from_str(raw).map_err(|e| RigError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, RigError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            RigError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), RigError> {
        if self.motion.steps_per_mm <= 0.0 || self.motion.cell_pitch_mm <= 0.0 {
            return Err(RigError::ConfigError(
                "steps_per_mm and cell_pitch_mm must be positive".to_string(),
            ));
        }
        if self.sensing.samples < 3 {
            return Err(RigError::ConfigError(format!(
                "sensing.samples must be at least 3, got {}",
                self.sensing.samples
            )));
        }
        if self.motion.yield_every_steps == 0 || self.motion.homing_yield_every_steps == 0 {
            return Err(RigError::ConfigError(
                "yield intervals must be at least one step".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves the configuration: an explicit path, then `TUR_RIG_CONFIG`, then `rig.toml`
/// in the working directory, then the built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<RigConfig, RigError> {
    if let Some(path) = explicit {
        return RigConfig::load(path);
    }

    if let Ok(path) = env::var(CONFIG_ENV) {
        return RigConfig::load(Path::new(&path));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return RigConfig::load(&local);
    }

    debug!("no config file found, using defaults");
    Ok(RigConfig::default())
}
