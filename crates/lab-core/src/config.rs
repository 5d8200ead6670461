//! Configuration System
//!
//! Loads tuning parameters from `linklab.toml`. Every section falls back to
//! its defaults, so a file only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::components::Board;
use crate::systems::ca::Justification;

/// Default config file path
pub const DEFAULT_CONFIG_PATH: &str = "linklab.toml";

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub aco: AcoConfig,
    #[serde(default)]
    pub ga: GaConfig,
    #[serde(default)]
    pub ca: CaConfig,
}

/// Run-wide parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub steps: u64,
    pub board_width: f64,
    pub board_height: f64,
    /// Pixel size of one patch; label offsets are half of it
    pub patch_size: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            steps: 100,
            board_width: 600.0,
            board_height: 600.0,
            patch_size: 11.0,
        }
    }
}

impl SimulationConfig {
    pub fn board(&self) -> Board {
        Board::new(self.board_width, self.board_height)
    }
}

/// Read-only display switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// City letters in the ant colony
    pub show_labels: bool,
    /// Pheromone level on each colony link
    pub show_pheromone_levels: bool,
    /// Point coordinates in the closed-loop GA
    pub show_positions: bool,
    /// Colony links below this pheromone level are not drawn
    pub min_display_level: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_labels: true,
            show_pheromone_levels: true,
            show_positions: false,
            min_display_level: 35.0,
        }
    }
}

/// Ant colony parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcoConfig {
    pub nbr_cities: usize,
    pub tours_per_step: usize,
    /// Exponent on pheromone level
    pub alpha: f64,
    /// Exponent on link length
    pub beta: f64,
    pub update_weight: f64,
    /// Percentage of the remaining headroom a single tour may add
    pub update_increment_step: f64,
    /// Evaporation per step, in percent
    pub discount_factor: f64,
    pub min_pheromone: f64,
    pub max_speed: f64,
}

impl Default for AcoConfig {
    fn default() -> Self {
        Self {
            nbr_cities: 7,
            tours_per_step: 50,
            alpha: 2.0,
            beta: 2.0,
            update_weight: 8.0,
            update_increment_step: 5.0,
            discount_factor: 15.0,
            min_pheromone: 30.0,
            max_speed: 50.0,
        }
    }
}

/// Closed-loop GA parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    pub nbr_points: usize,
    pub pop_size: usize,
    pub tournament_size: usize,
    pub cycle_length: usize,
    pub fitness_target: f64,
    /// Chance in percent of the replace-gene mutation
    pub replace_gene: u32,
    /// Chance in percent of the reverse-subsequence mutation
    pub reverse_subseq: u32,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            nbr_points: 20,
            pop_size: 40,
            tournament_size: 7,
            cycle_length: 10,
            fitness_target: 1500.0,
            replace_gene: 95,
            reverse_subseq: 50,
        }
    }
}

/// Cellular automaton parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaConfig {
    pub rule_nbr: u8,
    pub display_width: usize,
    pub display_rows: usize,
    /// Initial row; `'0'` and `' '` are off, anything else is on
    pub init_line: String,
    pub random: bool,
    pub justification: Justification,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            rule_nbr: 110,
            display_width: 151,
            display_rows: 151,
            init_line: "1".to_string(),
            random: false,
            justification: Justification::Right,
        }
    }
}

impl LabConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default path. A missing file means defaults; a broken
    /// one is reported and also falls back to defaults.
    pub fn load_or_default() -> Self {
        if !Path::new(DEFAULT_CONFIG_PATH).exists() {
            tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
            return Self::default();
        }
        Self::from_file(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
            tracing::warn!("Could not load {}: {}. Using defaults.", DEFAULT_CONFIG_PATH, e);
            Self::default()
        })
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Range checks that the simulations rely on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.board_width <= 0.0 || sim.board_height <= 0.0 {
            return Err(ConfigError::Invalid("board dimensions must be positive".into()));
        }

        let aco = &self.aco;
        if !(3..=20).contains(&aco.nbr_cities) {
            return Err(ConfigError::Invalid(format!(
                "aco.nbr_cities must be in 3..=20, got {}",
                aco.nbr_cities
            )));
        }
        if aco.tours_per_step == 0 {
            return Err(ConfigError::Invalid("aco.tours_per_step must be at least 1".into()));
        }
        if !(0.0..100.0).contains(&aco.min_pheromone) {
            return Err(ConfigError::Invalid(format!(
                "aco.min_pheromone must be in [0, 100), got {}",
                aco.min_pheromone
            )));
        }
        if !(0.0..=100.0).contains(&aco.discount_factor) {
            return Err(ConfigError::Invalid(format!(
                "aco.discount_factor must be in [0, 100], got {}",
                aco.discount_factor
            )));
        }

        let ga = &self.ga;
        if !(2..=20).contains(&ga.cycle_length) {
            return Err(ConfigError::Invalid(format!(
                "ga.cycle_length must be in 2..=20, got {}",
                ga.cycle_length
            )));
        }
        if ga.nbr_points < ga.cycle_length {
            return Err(ConfigError::Invalid(format!(
                "ga.nbr_points ({}) must be at least ga.cycle_length ({})",
                ga.nbr_points, ga.cycle_length
            )));
        }
        if ga.pop_size < 2 || ga.tournament_size == 0 {
            return Err(ConfigError::Invalid(
                "ga.pop_size must be at least 2 and ga.tournament_size at least 1".into(),
            ));
        }

        if self.ca.display_width == 0 || self.ca.display_rows == 0 {
            return Err(ConfigError::Invalid("ca display must be non-empty".into()));
        }

        Ok(())
    }
}
