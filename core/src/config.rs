use serde::{Deserialize, Serialize};

use crate::*;

/// Designer-tunable durations for every timed step of a level.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Full reveal flip, back to face.
    pub reveal_flip: Seconds,
    /// Full hide flip, face to back.
    pub hide_flip: Seconds,
    /// Pause after the second card of a pair lands, before comparing.
    pub settle: Seconds,
    /// How long a mismatched pair stays visible.
    pub mismatch_delay: Seconds,
    pub match_pop: Seconds,
    pub match_effect: Seconds,
    pub match_shrink: Seconds,
    pub preview_easy: Seconds,
    pub preview_medium: Seconds,
    pub preview_hard: Seconds,
}

impl Timings {
    /// Every step completes within the tick it starts in. Useful for headless hosts.
    pub const INSTANT: Timings = Timings {
        reveal_flip: 0.0,
        hide_flip: 0.0,
        settle: 0.0,
        mismatch_delay: 0.0,
        match_pop: 0.0,
        match_effect: 0.0,
        match_shrink: 0.0,
        preview_easy: 0.0,
        preview_medium: 0.0,
        preview_hard: 0.0,
    };

    pub const fn preview(&self, difficulty: Difficulty) -> Seconds {
        match difficulty {
            Difficulty::Easy => self.preview_easy,
            Difficulty::Medium => self.preview_medium,
            Difficulty::Hard => self.preview_hard,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            reveal_flip: 0.3,
            hide_flip: 0.4,
            settle: 0.1,
            mismatch_delay: 0.5,
            match_pop: 0.25,
            match_effect: 0.2,
            match_shrink: 0.3,
            preview_easy: 2.0,
            preview_medium: 1.2,
            preview_hard: 0.7,
        }
    }
}

fn default_symbol_count() -> SymbolId {
    16
}

/// Everything a [`Game`] needs at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub levels: Vec<LevelConfig>,
    /// Size of the host's symbol pool; symbols are `0..symbol_count`.
    #[serde(default = "default_symbol_count")]
    pub symbol_count: SymbolId,
    #[serde(default)]
    pub start_level: usize,
    /// Fixed seed for reproducible shuffles. Entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub timings: Timings,
    #[serde(default)]
    pub layout: LayoutHints,
}

impl GameConfig {
    pub fn new(levels: Vec<LevelConfig>, symbol_count: SymbolId) -> Self {
        Self {
            levels,
            symbol_count,
            start_level: 0,
            seed: None,
            timings: Timings::default(),
            layout: LayoutHints::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn symbol_pool(&self) -> Vec<SymbolId> {
        (0..self.symbol_count).collect()
    }

    pub fn level(&self, index: usize) -> core::result::Result<&LevelConfig, ConfigError> {
        self.levels.get(index).ok_or(ConfigError::InvalidLevelIndex {
            index,
            count: self.levels.len(),
        })
    }

    /// Checks the settings shared by every level. Grid parity is checked per level on load.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }
        if self.symbol_count == 0 {
            return Err(ConfigError::EmptySymbolPool);
        }
        self.level(self.start_level)?;
        Ok(())
    }
}
