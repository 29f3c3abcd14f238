use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::*;

const KEY_PREFIX: &str = "memento.";
const LEVEL_KEY_PREFIX: &str = "memento.level.";
const PROGRESS_KEY: &str = "memento.progress";
const PLAYER_KEY: &str = "memento.player";
const DIFFICULTY_KEY: &str = "memento.difficulty";

pub fn level_key(level_index: usize) -> String {
    format!("{LEVEL_KEY_PREFIX}{level_index}")
}

fn ledger_key(difficulty: Difficulty) -> String {
    format!("{KEY_PREFIX}highscores.{}", difficulty.code())
}

/// Everything needed to rebuild a level mid-game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub level_index: usize,
    pub elapsed_time: Seconds,
    pub move_count: u32,
    pub score: u32,
    pub matched_pairs: CardCount,
    pub matched_card_ids: BTreeSet<CardId>,
    /// One entry per card, in card id order.
    pub symbol_ids: Vec<SymbolId>,
    #[serde(default)]
    pub is_complete: bool,
}

impl SaveRecord {
    /// Checks that the record describes a reachable state of `level`.
    pub fn validate(&self, level_index: usize, level: &LevelConfig, symbol_count: SymbolId) -> Result<()> {
        let corrupt = |reason: String| -> Result<()> { Err(GameError::CorruptSave(reason)) };
        let total_cards = usize::from(level.total_cards());

        if self.level_index != level_index {
            return corrupt(format!(
                "record is for level {}, expected {}",
                self.level_index, level_index
            ));
        }
        if self.symbol_ids.len() != total_cards {
            return corrupt(format!(
                "{} symbols for a grid of {} cards",
                self.symbol_ids.len(),
                total_cards
            ));
        }
        if let Some(symbol) = self.symbol_ids.iter().find(|&&symbol| symbol >= symbol_count) {
            return corrupt(format!(
                "symbol {} outside a pool of {}",
                symbol, symbol_count
            ));
        }
        if !self.elapsed_time.is_finite() || self.elapsed_time < 0.0 {
            return corrupt(format!("elapsed time {}", self.elapsed_time));
        }
        if self.matched_pairs > level.total_pairs() {
            return corrupt(format!(
                "{} matched pairs of {}",
                self.matched_pairs,
                level.total_pairs()
            ));
        }
        if self.matched_pairs == level.total_pairs() && !self.is_complete {
            return corrupt("every pair matched but the level is not complete".to_string());
        }
        if self.matched_card_ids.len() != 2 * usize::from(self.matched_pairs) {
            return corrupt(format!(
                "{} matched cards for {} matched pairs",
                self.matched_card_ids.len(),
                self.matched_pairs
            ));
        }
        if let Some(id) = self
            .matched_card_ids
            .iter()
            .find(|&&id| usize::from(id) >= total_cards)
        {
            return corrupt(format!("matched card {} outside the grid", id));
        }
        if !pairs_up(self.symbol_ids.iter().copied()) {
            return corrupt("deck does not pair up".to_string());
        }
        let matched_symbols = self
            .matched_card_ids
            .iter()
            .map(|&id| self.symbol_ids[usize::from(id)]);
        if !pairs_up(matched_symbols) {
            return corrupt("matched cards do not pair up".to_string());
        }
        Ok(())
    }
}

fn pairs_up(symbols: impl Iterator<Item = SymbolId>) -> bool {
    let mut counts: BTreeMap<SymbolId, usize> = BTreeMap::new();
    for symbol in symbols {
        *counts.entry(symbol).or_insert(0) += 1;
    }
    counts.values().all(|count| count % 2 == 0)
}

/// Which level is current, so resume logic does not have to scan every level record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPointer {
    pub current_level_index: usize,
    pub is_complete: bool,
}

/// Typed access to the key-value store. The only component that reads or writes it.
#[derive(Debug)]
pub struct ProgressStore<S> {
    store: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Checkpoints the session under its level's key.
    pub fn save(&mut self, session: &MatchSession) -> Result<()> {
        self.save_record(&session.snapshot())
    }

    pub fn save_record(&mut self, record: &SaveRecord) -> Result<()> {
        self.write(&level_key(record.level_index), record)?;
        log::debug!("Progress saved for level {}", record.level_index);
        Ok(())
    }

    /// Unreadable or undecodable records count as absent.
    pub fn load(&self, level_index: usize) -> Option<SaveRecord> {
        self.read(&level_key(level_index))
    }

    pub fn delete(&mut self, level_index: usize) -> Result<()> {
        self.store.remove(&level_key(level_index))
    }

    pub fn load_global_pointer(&self) -> Option<ProgressPointer> {
        self.read(PROGRESS_KEY)
    }

    pub fn save_global_pointer(&mut self, pointer: &ProgressPointer) -> Result<()> {
        self.write(PROGRESS_KEY, pointer)
    }

    /// Deletes every level record and the global pointer. High scores and preferences stay.
    pub fn clear_all(&mut self) -> Result<()> {
        for key in self.store.keys()? {
            if key.starts_with(LEVEL_KEY_PREFIX) {
                self.store.remove(&key)?;
            }
        }
        self.store.remove(PROGRESS_KEY)?;
        log::debug!("All progress cleared");
        Ok(())
    }

    pub fn load_ledger(&self, difficulty: Difficulty) -> HighScoreLedger {
        match self.read::<HighScoreLedger>(&ledger_key(difficulty)) {
            Some(mut ledger) if ledger.difficulty == difficulty => {
                ledger.normalize();
                ledger
            }
            Some(_) => {
                log::warn!("High scores stored under {} belong to another difficulty", difficulty.code());
                HighScoreLedger::new(difficulty)
            }
            None => HighScoreLedger::new(difficulty),
        }
    }

    pub fn save_ledger(&mut self, ledger: &HighScoreLedger) -> Result<()> {
        self.write(&ledger_key(ledger.difficulty), ledger)
    }

    pub fn player_name(&self) -> Option<String> {
        self.read(PLAYER_KEY)
    }

    pub fn set_player_name(&mut self, name: &str) -> Result<()> {
        self.write(PLAYER_KEY, &name)
    }

    pub fn difficulty_preference(&self) -> Difficulty {
        self.read(DIFFICULTY_KEY).unwrap_or_default()
    }

    pub fn set_difficulty_preference(&mut self, difficulty: Difficulty) -> Result<()> {
        self.write(DIFFICULTY_KEY, &difficulty)
    }

    fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("Failed to read {}: {}", key, err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("Ignoring corrupt document {}: {}", key, err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level() -> LevelConfig {
        LevelConfig::new("grid", 2, 2, Difficulty::Easy)
    }

    fn record() -> SaveRecord {
        SaveRecord {
            level_index: 1,
            elapsed_time: 12.5,
            move_count: 3,
            score: 1,
            matched_pairs: 1,
            matched_card_ids: BTreeSet::from([0, 2]),
            symbol_ids: vec![5, 6, 5, 6],
            is_complete: false,
        }
    }

    #[test]
    fn record_round_trips_with_camel_case_fields() {
        let mut progress = ProgressStore::new(MemoryStore::new());

        progress.save_record(&record()).unwrap();

        let raw = progress.store().get("memento.level.1").unwrap().unwrap();
        assert!(raw.contains("\"matchedCardIds\":[0,2]"));
        assert!(raw.contains("\"symbolIds\":[5,6,5,6]"));
        assert!(raw.contains("\"elapsedTime\":12.5"));
        assert_eq!(progress.load(1), Some(record()));
        assert_eq!(progress.load(0), None);
    }

    #[test]
    fn corrupt_document_reads_as_absent() {
        let mut store = MemoryStore::new();
        store.set("memento.level.1", "{not json").unwrap();
        let progress = ProgressStore::new(store);

        assert_eq!(progress.load(1), None);
    }

    #[test]
    fn validate_accepts_consistent_record() {
        assert!(record().validate(1, &level(), 8).is_ok());
    }

    #[test]
    fn validate_rejects_inconsistent_records() {
        let mut wrong_level = record();
        wrong_level.level_index = 0;

        let mut short_deck = record();
        short_deck.symbol_ids.pop();

        let mut out_of_pool = record();
        out_of_pool.symbol_ids = vec![5, 9, 5, 9];

        let mut unpaired_match = record();
        unpaired_match.matched_card_ids = BTreeSet::from([0, 1]);

        let mut miscounted = record();
        miscounted.matched_pairs = 2;

        let mut outside = record();
        outside.matched_card_ids = BTreeSet::from([0, 7]);

        let mut all_matched = record();
        all_matched.matched_pairs = 2;
        all_matched.matched_card_ids = BTreeSet::from([0, 1, 2, 3]);

        for bad in [
            wrong_level,
            short_deck,
            out_of_pool,
            unpaired_match,
            miscounted,
            outside,
            all_matched,
        ] {
            assert!(
                matches!(bad.validate(1, &level(), 8), Err(GameError::CorruptSave(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn validate_accepts_fully_matched_record_only_when_complete() {
        let mut finished = record();
        finished.matched_pairs = 2;
        finished.matched_card_ids = BTreeSet::from([0, 1, 2, 3]);
        finished.is_complete = true;

        assert!(finished.validate(1, &level(), 8).is_ok());
    }

    #[test]
    fn clear_all_removes_progress_but_keeps_scores() {
        let mut progress = ProgressStore::new(MemoryStore::new());
        progress.save_record(&record()).unwrap();
        progress
            .save_global_pointer(&ProgressPointer {
                current_level_index: 1,
                is_complete: false,
            })
            .unwrap();
        let mut ledger = HighScoreLedger::new(Difficulty::Hard);
        ledger.add_entry(ScoreEntry::new("ana", 500));
        progress.save_ledger(&ledger).unwrap();
        progress.set_player_name("ana").unwrap();

        progress.clear_all().unwrap();

        assert_eq!(progress.load(1), None);
        assert_eq!(progress.load_global_pointer(), None);
        assert_eq!(progress.load_ledger(Difficulty::Hard), ledger);
        assert_eq!(progress.player_name(), Some("ana".to_string()));
    }

    #[test]
    fn preferences_default_when_missing() {
        let mut progress = ProgressStore::new(MemoryStore::new());

        assert_eq!(progress.difficulty_preference(), Difficulty::Medium);
        assert_eq!(progress.player_name(), None);

        progress.set_difficulty_preference(Difficulty::Hard).unwrap();
        assert_eq!(progress.difficulty_preference(), Difficulty::Hard);
    }

    #[test]
    fn pointer_uses_flat_document() {
        let mut progress = ProgressStore::new(MemoryStore::new());
        let pointer = ProgressPointer {
            current_level_index: 2,
            is_complete: true,
        };

        progress.save_global_pointer(&pointer).unwrap();

        assert_eq!(
            progress.store().get("memento.progress").unwrap().as_deref(),
            Some(r#"{"currentLevelIndex":2,"isComplete":true}"#)
        );
        assert_eq!(progress.load_global_pointer(), Some(pointer));
    }
}
