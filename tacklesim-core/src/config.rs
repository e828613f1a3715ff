use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Fixed physics tick in seconds. Every solver constant is tuned against it.
pub const TIME_QUANT: f32 = 0.0004;

/// Gravitational acceleration used for weight and potential energy
pub const GRAVITY: f32 = 9.81;

/// Tunable environment shared by every mass of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub gravity: f32,
    pub water_drag_constant: f32,
    pub air_drag_constant: f32,
    /// Scales horizontal speed into dynamic buoyancy
    pub buoyancy_speed_factor: f32,
    /// Floor on relative water speed used by the drag term
    pub laminar_water_speed: f32,
    pub max_dynamic_buoyancy: f32,
    /// Half height of the band around y = 0 where buoyancy ramps in
    pub water_level_epsilon: f32,
    pub max_masses: usize,
    pub max_connections: usize,
    pub max_objects: usize,
    pub detect_ref_leaks_on_refresh: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            water_drag_constant: 10.0,
            air_drag_constant: 0.001,
            buoyancy_speed_factor: 1.3,
            laminar_water_speed: 1.0,
            max_dynamic_buoyancy: 1000.0,
            water_level_epsilon: 0.0125,
            max_masses: 1024,
            max_connections: 1024,
            max_objects: 128,
            detect_ref_leaks_on_refresh: false,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(src: &str) -> Result<Self> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let src = std::fs::read_to_string(path)?;
        Self::from_json_str(&src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = SimulationConfig::from_json_str(r#"{ "gravity": 3.5, "max_masses": 8 }"#).unwrap();
        assert_eq!(config.gravity, 3.5);
        assert_eq!(config.max_masses, 8);
        assert_eq!(config.water_drag_constant, 10.0);
        assert!(!config.detect_ref_leaks_on_refresh);
    }

    #[test]
    fn test_bad_json_is_reported() {
        assert!(SimulationConfig::from_json_str("{ gravity: }").is_err());
    }
}
