use serde::{Deserialize, Serialize};

pub use card::*;
pub use config::*;
pub use error::*;
pub use game::*;
pub use generator::*;
pub use highscores::*;
pub use progress::*;
pub use session::*;
pub use storage::*;
pub use types::*;

mod card;
mod config;
mod error;
mod game;
mod generator;
mod highscores;
mod progress;
mod session;
mod storage;
mod types;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];

    /// Stable lowercase code, used for storage keys and display.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "normal",
            Self::Hard => "hard",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "normal" | "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Medium
    }
}

/// Static, author-supplied description of one level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub name: String,
    pub rows: Coord,
    pub cols: Coord,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl LevelConfig {
    pub fn new(name: impl Into<String>, rows: Coord, cols: Coord, difficulty: Difficulty) -> Self {
        Self {
            name: name.into(),
            rows,
            cols,
            difficulty,
        }
    }

    pub const fn total_cards(&self) -> CardCount {
        card_count(self.rows, self.cols)
    }

    pub const fn total_pairs(&self) -> CardCount {
        self.total_cards() / 2
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.total_cards() == 0 {
            Err(ConfigError::EmptyGrid)
        } else if self.total_cards() % 2 != 0 {
            Err(ConfigError::OddCardCount {
                rows: self.rows,
                cols: self.cols,
            })
        } else {
            Ok(())
        }
    }
}

/// Spacing handed to the layout collaborator together with the grid size.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutHints {
    pub spacing: (f32, f32),
    pub top_padding: f32,
}

impl Default for LayoutHints {
    fn default() -> Self {
        Self {
            spacing: (15.0, 15.0),
            top_padding: 20.0,
        }
    }
}

/// Outcome of a player selection
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SelectOutcome {
    Ignored,
    Revealing,
}

impl SelectOutcome {
    /// Whether this outcome could have caused an update to the session
    pub const fn has_update(self) -> bool {
        match self {
            Self::Ignored => false,
            Self::Revealing => true,
        }
    }
}

/// Outcome of asking a card to flip
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FlipOutcome {
    Ignored,
    Started,
}

impl FlipOutcome {
    pub const fn has_update(self) -> bool {
        match self {
            Self::Ignored => false,
            Self::Started => true,
        }
    }
}

/// Formats elapsed seconds as `MM:SS`.
pub fn format_clock(seconds: Seconds) -> String {
    let total = seconds.max(0.0) as u32;
    format!("{:02}:{:02}", total / 60, total % 60)
}
