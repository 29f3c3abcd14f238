//! Per-difficulty high score leaderboard.
//!
//! Keeps the top 10 entries, sorted descending by score. Entries with equal scores stay in
//! the order they were added.

use serde::{Deserialize, Serialize};

use crate::*;

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// Name recorded when the player leaves the name field empty
pub const DEFAULT_PLAYER_NAME: &str = "Player";

const BASE_SCORE: u32 = 10_000;
const SECOND_PENALTY: u32 = 10;
const MOVE_PENALTY: u32 = 50;

const fn difficulty_multiplier(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 1,
        Difficulty::Medium => 2,
        Difficulty::Hard => 3,
    }
}

/// Score for a finished level. Never increases with more time or more moves, never negative,
/// and harder levels have a higher ceiling.
pub fn calculate_score(elapsed_secs: u32, moves: u32, difficulty: Difficulty) -> u32 {
    let penalty = elapsed_secs
        .saturating_mul(SECOND_PENALTY)
        .saturating_add(moves.saturating_mul(MOVE_PENALTY));
    BASE_SCORE.saturating_sub(penalty) * difficulty_multiplier(difficulty)
}

/// A single high score entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub user_name: String,
    pub score: u32,
}

impl ScoreEntry {
    pub fn new(user_name: &str, score: u32) -> Self {
        let user_name = user_name.trim();
        let user_name = if user_name.is_empty() {
            DEFAULT_PLAYER_NAME
        } else {
            user_name
        };
        Self {
            user_name: user_name.to_string(),
            score,
        }
    }
}

/// High score leaderboard for one difficulty
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HighScoreLedger {
    pub difficulty: Difficulty,
    pub entries: Vec<ScoreEntry>,
}

impl HighScoreLedger {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            entries: Vec::new(),
        }
    }

    /// Check if a score would make it onto the leaderboard
    pub fn qualifies(&self, score: u32) -> bool {
        self.potential_rank(score).is_some()
    }

    /// Get the rank a score would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, score: u32) -> Option<usize> {
        let rank = self
            .entries
            .iter()
            .position(|e| score > e.score)
            .unwrap_or(self.entries.len())
            + 1;
        (rank <= MAX_HIGH_SCORES).then_some(rank)
    }

    /// Add a new score to the leaderboard.
    /// Returns the rank achieved (1-indexed) or None if it didn't qualify
    pub fn add_entry(&mut self, entry: ScoreEntry) -> Option<usize> {
        let rank = self.potential_rank(entry.score)?;
        self.entries.insert(rank - 1, entry);
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    /// Restores display order on entries that came from storage: stable sort, then trim.
    pub fn normalize(&mut self) {
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
        self.entries.truncate(MAX_HIGH_SCORES);
    }

    /// Entries in display order, whatever order they were stored in.
    pub fn sorted(&self) -> Vec<&ScoreEntry> {
        let mut entries: Vec<&ScoreEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u32> {
        self.entries.first().map(|e| e.score)
    }
}
