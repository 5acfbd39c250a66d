use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modules::interp::DEFAULT_STEP_BUDGET;

/// Highest food amount a cell can hold.
pub const MAX_FOOD: i16 = 800;
/// Largest accepted food blob radius.
pub const MAX_BLOB_RADIUS: i32 = 1_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables for a simulated world. Defaults reproduce the reference balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub width: i32,
    pub height: i32,
    pub max_food: i16,
    /// Optional RNG seed for reproducible runs.
    pub seed: Option<u64>,
    pub initial_agents: usize,
    /// Live population below which fresh agents are spawned each tick.
    pub min_population: usize,
    /// Blobs laid down at startup; `None` means one per grid column.
    pub initial_blobs: Option<usize>,
    /// Grid cells per seeded obstacle; 0 disables obstacles.
    pub obstacle_spacing: usize,
    pub blob_chance: f64,
    pub blob_radius: i32,
    pub cull_chance: f64,
    pub start_energy: i64,
    pub eat_limit: i64,
    pub program_mutation_chance: f64,
    pub sprite_mutation_chance: f64,
    /// Interpreter node visits allowed per agent quantum.
    pub step_budget: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 240,
            height: 160,
            max_food: MAX_FOOD,
            seed: None,
            initial_agents: 80,
            min_population: 30,
            initial_blobs: None,
            obstacle_spacing: 300,
            blob_chance: 0.05,
            blob_radius: 8,
            cull_chance: 0.0005,
            start_energy: 200,
            eat_limit: 100,
            program_mutation_chance: 0.35,
            sprite_mutation_chance: 0.35,
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

fn probability(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let config: SimConfig =
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < 1 || self.height < 1 {
            return Err(ConfigError::Invalid("width and height must be positive"));
        }
        if self.max_food < 1 {
            return Err(ConfigError::Invalid("max_food must be positive"));
        }
        let cells = self.width as usize * self.height as usize;
        if self.initial_agents > cells || self.min_population > cells {
            return Err(ConfigError::Invalid(
                "agent counts must fit on the grid (one agent per cell)",
            ));
        }
        if !probability(self.blob_chance)
            || !probability(self.cull_chance)
            || !probability(self.program_mutation_chance)
            || !probability(self.sprite_mutation_chance)
        {
            return Err(ConfigError::Invalid("chances must lie within [0, 1]"));
        }
        if !(1..=MAX_BLOB_RADIUS).contains(&self.blob_radius) {
            return Err(ConfigError::Invalid("blob_radius must lie within [1, 1000]"));
        }
        if self.start_energy < 1 {
            return Err(ConfigError::Invalid("start_energy must be at least 1"));
        }
        if self.eat_limit < 0 {
            return Err(ConfigError::Invalid("eat_limit must not be negative"));
        }
        if self.step_budget == 0 {
            return Err(ConfigError::Invalid("step_budget must be at least 1"));
        }
        Ok(())
    }

    pub fn initial_blob_count(&self) -> usize {
        self.initial_blobs.unwrap_or(self.width as usize)
    }
}
