use thiserror::Error;

use crate::{CardId, Coord};

/// Problems with author-supplied configuration. Fatal to the load attempt.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Grid {rows}x{cols} is not even, needs an even number of cards")]
    OddCardCount { rows: Coord, cols: Coord },
    #[error("Grid has no cards")]
    EmptyGrid,
    #[error("Symbol pool is empty")]
    EmptySymbolPool,
    #[error("Pair count must be positive")]
    NoPairs,
    #[error("Level index {index} out of range, {count} levels configured")]
    InvalidLevelIndex { index: usize, count: usize },
    #[error("No levels configured")]
    NoLevels,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Corrupt save record: {0}")]
    CorruptSave(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Card {0} is not hidden or is still flipping")]
    CardBusy(CardId),
    #[error("Card {0} is not on the grid")]
    InvalidCard(CardId),
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        Self::CorruptSave(err.to_string())
    }
}

impl From<std::io::Error> for GameError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, GameError>;
