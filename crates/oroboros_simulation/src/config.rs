//! # Simulation Configuration
//!
//! One immutable [`SimConfig`] is loaded at startup and handed to each owner
//! (scheduler, regions). Nothing reads tuning from globals.
//!
//! ```toml
//! [tick]
//! interval_ms = 20
//! wheel_size = 512
//!
//! [aoi]
//! cell_size = 16.0
//! view_range = 48.0
//!
//! [nav]
//! volume_path = "data/nav/region_01.voxl"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use oroboros_shared::constants::{
    DEFAULT_ARRIVE_TOLERANCE, DEFAULT_ATTACK_RANGE, DEFAULT_CELL_SIZE, DEFAULT_HEIGHT_TOLERANCE,
    DEFAULT_HIT_DURATION, DEFAULT_LEASH_DISTANCE, DEFAULT_PATROL_RADIUS, DEFAULT_REPATH_COOLDOWN,
    DEFAULT_TICK_BUS_CAPACITY, DEFAULT_TICK_INTERVAL_MS, DEFAULT_VIEW_RANGE, DEFAULT_WHEEL_SIZE,
    MOVE_EPSILON,
};
use serde::Deserialize;

use crate::error::{SimError, SimResult};

/// Largest AOI ring, in cells each way, an observer may scan.
pub const MAX_VIEW_CELLS: i32 = 64;

/// Root configuration for the realm core.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Tick clock and timer wheel.
    pub tick: TickConfig,
    /// Area-of-interest grid.
    pub aoi: AoiConfig,
    /// AI agent defaults.
    pub ai: AiConfig,
    /// Action layer timings.
    pub actions: ActionConfig,
    /// Nav volume source.
    pub nav: NavConfig,
}

/// Tick clock and timer wheel settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TickConfig {
    /// Fixed step length in milliseconds.
    pub interval_ms: u64,
    /// Number of timer wheel slots.
    pub wheel_size: usize,
    /// Capacity of each tick subscriber channel.
    pub bus_capacity: usize,
    /// Log tick statistics every this many ticks (0 disables).
    pub stats_interval_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_TICK_INTERVAL_MS,
            wheel_size: DEFAULT_WHEEL_SIZE,
            bus_capacity: DEFAULT_TICK_BUS_CAPACITY,
            stats_interval_ticks: 250, // 5 seconds at 50Hz
        }
    }
}

impl TickConfig {
    /// Tick interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Converts milliseconds to ticks, rounding up.
    #[must_use]
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms.div_ceil(self.interval_ms.max(1))
    }
}

/// Area-of-interest grid settings.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AoiConfig {
    /// Edge length of one grid cell.
    pub cell_size: f32,
    /// Horizontal visibility radius.
    pub view_range: f32,
    /// Maximum vertical separation for visibility.
    pub height_tolerance: f32,
}

impl Default for AoiConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            view_range: DEFAULT_VIEW_RANGE,
            height_tolerance: DEFAULT_HEIGHT_TOLERANCE,
        }
    }
}

/// Defaults for AI agents spawned without explicit overrides.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    /// Maximum distance from home while chasing.
    pub leash_distance: f32,
    /// Patrol radius around home.
    pub patrol_radius: f32,
    /// Seconds between path refreshes while chasing.
    pub repath_cooldown: f32,
    /// Arrival tolerance for waypoints and home.
    pub arrive_tolerance: f32,
    /// Attack range.
    pub attack_range: f32,
    /// Movement speed (units per second).
    pub move_speed: f32,
    /// Turn rate while facing a target (degrees per second).
    pub turn_rate_deg: f32,
    /// Seconds between consecutive attack intents.
    pub attack_interval: f32,
    /// Seed mixed into every agent's patrol RNG.
    pub world_seed: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            leash_distance: DEFAULT_LEASH_DISTANCE,
            patrol_radius: DEFAULT_PATROL_RADIUS,
            repath_cooldown: DEFAULT_REPATH_COOLDOWN,
            arrive_tolerance: DEFAULT_ARRIVE_TOLERANCE,
            attack_range: DEFAULT_ATTACK_RANGE,
            move_speed: 3.5,
            turn_rate_deg: 360.0,
            attack_interval: 1.0,
            world_seed: 0x0B0B_05EE_D000_0001,
        }
    }
}

/// Action layer timings.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActionConfig {
    /// Seconds of hit-stun.
    pub hit_duration: f32,
    /// Default cast time for skills that do not carry their own.
    pub cast_duration: f32,
    /// Move-direction magnitude that counts as moving.
    pub move_epsilon: f32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            hit_duration: DEFAULT_HIT_DURATION,
            cast_duration: 0.6,
            move_epsilon: MOVE_EPSILON,
        }
    }
}

/// Nav volume source.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavConfig {
    /// Path to the GZip voxel file. `None` runs without navigation.
    pub volume_path: Option<PathBuf>,
}

impl SimConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] on a parse or validation failure.
    pub fn from_toml_str(text: &str) -> SimResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Io`] if the file cannot be read, otherwise see
    /// [`SimConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded simulation config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Checks value ranges that would otherwise break an owner at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] naming the first offending field.
    pub fn validate(&self) -> SimResult<()> {
        if self.tick.interval_ms == 0 {
            return Err(SimError::Config("tick.interval_ms must be > 0".into()));
        }
        if self.tick.wheel_size == 0 {
            return Err(SimError::Config("tick.wheel_size must be > 0".into()));
        }
        if self.tick.bus_capacity == 0 {
            return Err(SimError::Config("tick.bus_capacity must be > 0".into()));
        }
        if !self.aoi.cell_size.is_finite() || self.aoi.cell_size <= 0.0 {
            return Err(SimError::Config("aoi.cell_size must be finite and > 0".into()));
        }
        if !self.aoi.view_range.is_finite() || self.aoi.view_range < 0.0 {
            return Err(SimError::Config("aoi.view_range must be finite and >= 0".into()));
        }
        if !self.aoi.height_tolerance.is_finite() || self.aoi.height_tolerance < 0.0 {
            return Err(SimError::Config("aoi.height_tolerance must be finite and >= 0".into()));
        }
        if (self.aoi.view_range / self.aoi.cell_size).ceil() > MAX_VIEW_CELLS as f32 {
            return Err(SimError::Config(format!(
                "aoi.view_range / aoi.cell_size must not exceed {MAX_VIEW_CELLS} cells"
            )));
        }
        if self.ai.attack_range <= 0.0 || self.ai.move_speed < 0.0 || self.ai.turn_rate_deg <= 0.0 {
            return Err(SimError::Config(
                "ai.attack_range and ai.turn_rate_deg must be > 0, ai.move_speed >= 0".into(),
            ));
        }
        if self.actions.hit_duration < 0.0 || self.actions.cast_duration < 0.0 {
            return Err(SimError::Config("action durations must be >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick.interval_ms, 20);
        assert_eq!(config.tick.wheel_size, 512);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
            [aoi]
            cell_size = 5.0
            view_range = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config.aoi.cell_size, 5.0);
        assert_eq!(config.aoi.view_range, 10.0);
        assert_eq!(config.aoi.height_tolerance, DEFAULT_HEIGHT_TOLERANCE);
        assert_eq!(config.tick, TickConfig::default());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = SimConfig::from_toml_str("[tick]\ninterval_ms = 0\n").unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(SimConfig::from_toml_str("[aoi]\nradius = 3.0\n").is_err());
    }

    fn with_aoi(cell_size: f32, view_range: f32, height_tolerance: f32) -> SimConfig {
        SimConfig {
            aoi: AoiConfig {
                cell_size,
                view_range,
                height_tolerance,
            },
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_rejects_non_finite_cell_size() {
        assert!(with_aoi(f32::INFINITY, 48.0, 4.0).validate().is_err());
        assert!(with_aoi(f32::NAN, 48.0, 4.0).validate().is_err());
        assert!(with_aoi(0.0, 48.0, 4.0).validate().is_err());
    }

    #[test]
    fn test_rejects_unbounded_view_range() {
        assert!(with_aoi(16.0, f32::INFINITY, 4.0).validate().is_err());
        assert!(with_aoi(16.0, f32::NAN, 4.0).validate().is_err());
        assert!(with_aoi(16.0, 1.0e9, 4.0).validate().is_err());
        assert!(with_aoi(1.0, 64.0, 4.0).validate().is_ok());
        assert!(with_aoi(1.0, 64.5, 4.0).validate().is_err());
    }

    #[test]
    fn test_rejects_non_finite_height_tolerance() {
        assert!(with_aoi(16.0, 48.0, f32::NAN).validate().is_err());
        assert!(with_aoi(16.0, 48.0, f32::INFINITY).validate().is_err());
        assert!(with_aoi(16.0, 48.0, -1.0).validate().is_err());
    }

    #[test]
    fn test_ms_to_ticks_rounds_up() {
        let tick = TickConfig::default();
        assert_eq!(tick.ms_to_ticks(100), 5);
        assert_eq!(tick.ms_to_ticks(101), 6);
        assert_eq!(tick.ms_to_ticks(0), 0);
        assert_eq!(tick.ms_to_ticks(1), 1);
    }
}
