//! Game settings.
//!
//! Settings are plain JSON. Every field is optional and falls back to the
//! defaults below, so a config file only needs to list what it changes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    bubble::{Bubble, BubbleColor},
    hex::RelativityMode,
    pool::PoolKind,
};

/// A color new bubbles can have, with its spawn weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorWeight {
    pub color: BubbleColor,
    /// Relative spawn weight. If every weight is zero, colors are equally likely.
    #[serde(default)]
    pub weight: u32,
}

/// Settings for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Colors used for new bubbles.
    pub colors: Vec<ColorWeight>,
    /// Missed shots until a new row appears.
    pub missed_shots_till_new_row: u32,
    /// Shots until a new row appears, hit or miss.
    pub shots_till_new_row: u32,
    pub relativity_mode: RelativityMode,
    /// Bubbles per row.
    pub grid_width: usize,
    /// Rows filled when the game starts.
    pub initial_grid_height: usize,
    /// Rows available; the game is lost when the stack reaches the last one.
    pub grid_height_threshold: usize,
    /// Play with numbered bubbles that pop on matching sums.
    pub use_numbers: bool,
    /// Smallest number on a generated bubble.
    pub minimum_bubble_number: i32,
    /// Largest number on a generated bubble.
    pub maximum_bubble_number: i32,
    /// Chance to pop, in percent, a group needs to be preferred as ammunition.
    pub chance_to_pop_threshold: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            colors: BubbleColor::ALL
                .iter()
                .map(|&color| ColorWeight { color, weight: 1 })
                .collect(),
            missed_shots_till_new_row: 5,
            shots_till_new_row: 6,
            relativity_mode: RelativityMode::OddR,
            grid_width: 12,
            initial_grid_height: 8,
            grid_height_threshold: 14,
            use_numbers: false,
            minimum_bubble_number: 1,
            maximum_bubble_number: 6,
            chance_to_pop_threshold: 50.0,
        }
    }
}

/// Why a config was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("grid must be at least 1x2, got {width}x{height}")]
    GridTooSmall { width: usize, height: usize },
    #[error("at least one row must be filled at the start")]
    EmptyInitialGrid,
    #[error("initial height {initial} must be below the height threshold {threshold}")]
    InitialHeightTooLarge { initial: usize, threshold: usize },
    #[error("at least one bubble color is required")]
    NoColors,
    #[error("row intervals must be positive")]
    ZeroRowInterval,
    #[error("bubble number range {min}..={max} is empty")]
    EmptyNumberRange { min: i32, max: i32 },
    #[error("chance to pop threshold {0} is not a percentage")]
    InvalidThreshold(f32),
}

impl GameConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height_threshold < 2 {
            return Err(ConfigError::GridTooSmall {
                width: self.grid_width,
                height: self.grid_height_threshold,
            });
        }
        if self.initial_grid_height == 0 {
            return Err(ConfigError::EmptyInitialGrid);
        }
        if self.initial_grid_height >= self.grid_height_threshold {
            return Err(ConfigError::InitialHeightTooLarge {
                initial: self.initial_grid_height,
                threshold: self.grid_height_threshold,
            });
        }
        if self.colors.is_empty() {
            return Err(ConfigError::NoColors);
        }
        if self.missed_shots_till_new_row == 0 || self.shots_till_new_row == 0 {
            return Err(ConfigError::ZeroRowInterval);
        }
        if self.use_numbers && self.minimum_bubble_number > self.maximum_bubble_number {
            return Err(ConfigError::EmptyNumberRange {
                min: self.minimum_bubble_number,
                max: self.maximum_bubble_number,
            });
        }
        if !(0.0..=100.0).contains(&self.chance_to_pop_threshold) {
            return Err(ConfigError::InvalidThreshold(self.chance_to_pop_threshold));
        }
        Ok(())
    }

    /// Which ammunition strategy fits the bubbles this config generates.
    pub fn pool_kind(&self) -> PoolKind {
        if self.use_numbers {
            PoolKind::Numbered
        } else {
            PoolKind::Colored
        }
    }

    /// Pick a color according to the configured weights.
    pub fn random_color(&self, rng: &mut impl Rng) -> BubbleColor {
        let total: u32 = self.colors.iter().map(|c| c.weight).sum();
        if total == 0 {
            return self.colors[rng.random_range(0..self.colors.len())].color;
        }

        let hit = rng.random_range(0..total);
        let mut running = 0;
        for entry in &self.colors {
            running += entry.weight;
            if hit < running {
                return entry.color;
            }
        }

        // Unreachable: `hit` is below the sum of all weights.
        self.colors[self.colors.len() - 1].color
    }

    /// Make a random bubble of the configured kind.
    pub fn random_bubble(&self, rng: &mut impl Rng) -> Bubble {
        let color = self.random_color(rng);
        if self.use_numbers {
            let number =
                rng.random_range(self.minimum_bubble_number..=self.maximum_bubble_number);
            Bubble::numbered(color, number)
        } else {
            Bubble::colored(color)
        }
    }

    /// A generator for grid rows that owns its own random source.
    pub fn bubble_generator<R>(&self, mut rng: R) -> impl FnMut() -> Bubble + Send + Sync + use<R>
    where
        R: Rng + Send + Sync + 'static,
    {
        let config = self.clone();
        move || config.random_bubble(&mut rng)
    }
}
