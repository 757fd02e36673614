//! Configuration loading for arcnav.

use crate::error::{NavError, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure.
#[derive(Clone, Debug, Deserialize)]
pub struct NavConfig {
    /// Max distance between consecutive split waypoints (world units).
    #[serde(default = "default_max_waypoint_spacing")]
    pub max_waypoint_spacing: f64,

    /// Max allowed drift from the route network. Doubles as the budget for
    /// start/end offsets: each defaults to half of this value.
    #[serde(default = "default_lazy_distance")]
    pub lazy_distance: f64,

    /// Resume automatically when the agent is detected idle while paused.
    #[serde(default = "default_auto_resume_on_idle")]
    pub auto_resume_on_idle: bool,

    /// Raise log verbosity for the navigation loops.
    #[serde(default)]
    pub debug_logging: bool,

    /// Movement loop tick interval (milliseconds).
    #[serde(default = "default_move_tick_ms")]
    pub move_tick_ms: u64,

    /// Steering loop tick interval (milliseconds).
    #[serde(default = "default_steer_tick_ms")]
    pub steer_tick_ms: u64,

    /// Maintenance loop tick interval (milliseconds).
    #[serde(default = "default_maintenance_tick_ms")]
    pub maintenance_tick_ms: u64,

    /// Corner angle (degrees) above which forward actuation is briefly
    /// suspended before the turn.
    #[serde(default = "default_corner_brake_deg")]
    pub corner_brake_deg: f64,

    /// Minimum per-tick closure speed below which corner braking is skipped.
    #[serde(default = "default_corner_brake_min_speed")]
    pub corner_brake_min_speed: f64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            max_waypoint_spacing: default_max_waypoint_spacing(),
            lazy_distance: default_lazy_distance(),
            auto_resume_on_idle: default_auto_resume_on_idle(),
            debug_logging: false,
            move_tick_ms: default_move_tick_ms(),
            steer_tick_ms: default_steer_tick_ms(),
            maintenance_tick_ms: default_maintenance_tick_ms(),
            corner_brake_deg: default_corner_brake_deg(),
            corner_brake_min_speed: default_corner_brake_min_speed(),
        }
    }
}

fn default_max_waypoint_spacing() -> f64 {
    20.0
}
fn default_lazy_distance() -> f64 {
    100.0
}
fn default_auto_resume_on_idle() -> bool {
    true
}
fn default_move_tick_ms() -> u64 {
    100
}
fn default_steer_tick_ms() -> u64 {
    50
}
fn default_maintenance_tick_ms() -> u64 {
    300
}
fn default_corner_brake_deg() -> f64 {
    30.0
}
fn default_corner_brake_min_speed() -> f64 {
    0.4
}

impl NavConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("failed to read config file: {}", e)))?;
        let config: NavConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_waypoint_spacing <= 0.0 {
            return Err(NavError::Config(
                "max_waypoint_spacing must be positive".into(),
            ));
        }
        if self.lazy_distance <= 0.0 {
            return Err(NavError::Config("lazy_distance must be positive".into()));
        }
        if self.move_tick_ms == 0 || self.steer_tick_ms == 0 || self.maintenance_tick_ms == 0 {
            return Err(NavError::Config("tick intervals must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = NavConfig::default();
        assert_eq!(cfg.max_waypoint_spacing, 20.0);
        assert_eq!(cfg.lazy_distance, 100.0);
        assert!(cfg.auto_resume_on_idle);
        assert!(!cfg.debug_logging);
        assert_eq!(cfg.move_tick_ms, 100);
        assert_eq!(cfg.steer_tick_ms, 50);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: NavConfig = toml::from_str("lazy_distance = 50.0\n").unwrap();
        assert_eq!(cfg.lazy_distance, 50.0);
        assert_eq!(cfg.max_waypoint_spacing, 20.0);
    }

    #[test]
    fn rejects_non_positive_spacing() {
        let cfg: NavConfig = toml::from_str("max_waypoint_spacing = 0.0\n").unwrap();
        assert!(cfg.validate().is_err());
    }
}
