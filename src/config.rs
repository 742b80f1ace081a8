//! Configuration loading for marga-nav

use crate::agent::{
    DEFAULT_AGENT_DIAMETER_METERS, DEFAULT_AGENT_SPEED_CELLS_PER_SEC,
    DEFAULT_OBSERVATION_RANGE_METERS,
};
use crate::error::Result;
use crate::planning::Algorithm;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct NavConfig {
    /// Agent physical and playback parameters
    #[serde(default)]
    pub agent: AgentConfig,
    /// Costmap inflation parameters
    #[serde(default)]
    pub costmap: CostmapConfig,
    /// Planner selection
    #[serde(default)]
    pub planner: PlannerConfig,
}

/// Agent physical parameters
#[derive(Clone, Debug, Deserialize)]
pub struct AgentConfig {
    /// Agent diameter in meters (default: 2.0)
    #[serde(default = "default_diameter")]
    pub diameter_meters: f32,

    /// Playback speed in cells per second (default: 4.0)
    #[serde(default = "default_speed")]
    pub speed_cells_per_second: f32,

    /// Observation range in meters (default: 5.0)
    #[serde(default = "default_observation_range")]
    pub observation_range_meters: f32,
}

/// Costmap inflation parameters
#[derive(Clone, Debug, Deserialize)]
pub struct CostmapConfig {
    /// Inflation radius as a multiple of the agent footprint radius
    /// (default: 1.5)
    #[serde(default = "default_inflation_multiplier")]
    pub inflation_multiplier: f32,

    /// Lower bound on the inflation radius in cells (default: 1.0)
    #[serde(default = "default_minimum_inflation_radius")]
    pub minimum_inflation_radius_cells: f32,
}

/// Planner selection
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlannerConfig {
    /// Search core: `a-star` or `d-star-lite` (default: `a-star`)
    #[serde(default)]
    pub algorithm: Algorithm,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            diameter_meters: default_diameter(),
            speed_cells_per_second: default_speed(),
            observation_range_meters: default_observation_range(),
        }
    }
}

impl Default for CostmapConfig {
    fn default() -> Self {
        Self {
            inflation_multiplier: default_inflation_multiplier(),
            minimum_inflation_radius_cells: default_minimum_inflation_radius(),
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            costmap: CostmapConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

// Default value functions
fn default_diameter() -> f32 {
    DEFAULT_AGENT_DIAMETER_METERS
}
fn default_speed() -> f32 {
    DEFAULT_AGENT_SPEED_CELLS_PER_SEC
}
fn default_observation_range() -> f32 {
    DEFAULT_OBSERVATION_RANGE_METERS
}
fn default_inflation_multiplier() -> f32 {
    1.5
}
fn default_minimum_inflation_radius() -> f32 {
    1.0
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NavConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
