use rand::prelude::*;

use crate::*;

fn best_effort(result: Result<()>, action: &str) {
    if let Err(err) = result {
        log::warn!("Failed to {}: {}", action, err);
    }
}

/// Ties a [`MatchSession`] to its level list and to persisted progress.
///
/// The host drives it with [`Game::select_card`] and [`Game::tick`]; checkpoints, the global
/// pointer and the high score ledgers are kept up to date from the session's events.
#[derive(Debug)]
pub struct Game<S> {
    config: GameConfig,
    pool: Vec<SymbolId>,
    session: MatchSession,
    progress: ProgressStore<S>,
    rng: SmallRng,
    /// Epoch of the session whose score was already submitted.
    submitted_epoch: Option<u64>,
}

impl<S: KeyValueStore> Game<S> {
    /// Validates `config` and wires up storage. No level is loaded yet; call [`Game::resume`]
    /// or one of the load operations next.
    pub fn initialize(config: GameConfig, store: S) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        log::debug!(
            "Game initialized: {} levels, {} symbols, seed {}",
            config.levels.len(),
            config.symbol_count,
            seed
        );

        Ok(Self {
            pool: config.symbol_pool(),
            config,
            session: MatchSession::new(),
            progress: ProgressStore::new(store),
            rng: SmallRng::seed_from_u64(seed),
            submitted_epoch: None,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn session(&self) -> &MatchSession {
        &self.session
    }

    pub fn progress(&self) -> &ProgressStore<S> {
        &self.progress
    }

    pub fn layout(&self) -> LayoutHints {
        self.config.layout
    }

    pub fn level_count(&self) -> usize {
        self.config.levels.len()
    }

    pub fn current_level(&self) -> Option<&LevelConfig> {
        match self.session.state() {
            SessionState::Unloaded => None,
            _ => self.config.levels.get(self.session.level_index()),
        }
    }

    pub fn into_store(self) -> S {
        self.progress.into_inner()
    }

    /// Picks up wherever the last run stopped: the level named by the global pointer, or the
    /// configured start level when there is none.
    pub fn resume(&mut self) -> Result<()> {
        let index = match self.progress.load_global_pointer() {
            Some(pointer) if pointer.current_level_index < self.level_count() => {
                pointer.current_level_index
            }
            Some(pointer) => {
                log::warn!(
                    "Saved level {} no longer exists, starting at level {}",
                    pointer.current_level_index,
                    self.config.start_level
                );
                self.config.start_level
            }
            None => self.config.start_level,
        };
        self.continue_level(index)
    }

    /// Resumes `index` from its checkpoint, or starts it fresh when there is nothing usable to
    /// resume.
    pub fn continue_level(&mut self, index: usize) -> Result<()> {
        let level = self.config.level(index)?;

        match self.progress.load(index) {
            Some(record) if !record.is_complete => {
                match self.session.load_resumed(
                    index,
                    level,
                    self.config.timings,
                    &record,
                    self.config.symbol_count,
                ) {
                    Ok(()) => {
                        self.mark_current(index);
                        return Ok(());
                    }
                    Err(GameError::CorruptSave(reason)) => {
                        log::warn!("Discarding save for level {}: {}", index, reason);
                    }
                    Err(err) => return Err(err),
                }
            }
            Some(_) => log::debug!("Level {} was already completed, starting over", index),
            None => {}
        }

        self.load_level(index)
    }

    /// Starts `index` with a new shuffle, discarding any saved progress for it.
    pub fn load_level(&mut self, index: usize) -> Result<()> {
        let level = self.config.level(index)?;
        let seed = self.rng.random();
        self.session
            .load_fresh(index, level, self.config.timings, &self.pool, ShuffledDeck::new(seed))?;

        best_effort(self.progress.delete(index), "delete stale save");
        self.mark_current(index);
        Ok(())
    }

    pub fn restart(&mut self) -> Result<()> {
        self.load_level(self.session.level_index())
    }

    /// Loads the level after the current one. Returns `false` when the current level is the
    /// last.
    pub fn next_level(&mut self) -> Result<bool> {
        let next = self.session.level_index() + 1;
        if next >= self.level_count() {
            log::info!("All {} levels complete", self.level_count());
            return Ok(false);
        }
        self.load_level(next)?;
        Ok(true)
    }

    pub fn select_card(&mut self, id: CardId) -> SelectOutcome {
        self.session.select_card(id)
    }

    /// Advances the session and persists whatever its events call for.
    pub fn tick(&mut self, dt: Seconds) -> Vec<SessionEvent> {
        self.session.tick(dt);
        let events = self.session.drain_events();

        for event in &events {
            match *event {
                SessionEvent::PairRemoved { .. } if !self.session.is_complete() => {
                    best_effort(self.progress.save(&self.session), "save checkpoint");
                }
                SessionEvent::LevelComplete { level_index, .. } => {
                    best_effort(self.progress.delete(level_index), "delete finished save");
                    let pointer = ProgressPointer {
                        current_level_index: level_index,
                        is_complete: true,
                    };
                    best_effort(self.progress.save_global_pointer(&pointer), "save progress");
                }
                _ => {}
            }
        }

        events
    }

    /// Records the finished level on its difficulty's leaderboard. Returns the rank achieved, or
    /// `None` when the level is not complete, was already submitted, or the score did not place.
    pub fn submit_high_score(&mut self, name: &str) -> Option<usize> {
        if !self.session.is_complete() {
            log::debug!("No finished level to submit a score for");
            return None;
        }
        if self.submitted_epoch == Some(self.session.epoch()) {
            log::debug!("Score for this attempt was already submitted");
            return None;
        }
        self.submitted_epoch = Some(self.session.epoch());

        let difficulty = self.session.difficulty();
        let score = calculate_score(
            self.session.elapsed_time().floor() as u32,
            self.session.move_count(),
            difficulty,
        );
        let entry = ScoreEntry::new(name, score);
        best_effort(self.progress.set_player_name(&entry.user_name), "save player name");

        let mut ledger = self.progress.load_ledger(difficulty);
        let rank = ledger.add_entry(entry);
        match rank {
            Some(rank) => {
                log::info!("High score {} ranked #{} on {}", score, rank, difficulty.code());
                best_effort(self.progress.save_ledger(&ledger), "save high scores");
            }
            None => log::debug!("Score {} did not place on {}", score, difficulty.code()),
        }
        rank
    }

    pub fn high_scores(&self, difficulty: Difficulty) -> HighScoreLedger {
        self.progress.load_ledger(difficulty)
    }

    pub fn player_name(&self) -> String {
        self.progress
            .player_name()
            .unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_string())
    }

    /// Forgets every level's progress. High scores and preferences are kept.
    pub fn clear_progress(&mut self) -> Result<()> {
        self.progress.clear_all()
    }

    fn mark_current(&mut self, index: usize) {
        let pointer = ProgressPointer {
            current_level_index: index,
            is_complete: false,
        };
        best_effort(self.progress.save_global_pointer(&pointer), "save progress");
        best_effort(
            self.progress.set_difficulty_preference(self.session.difficulty()),
            "save difficulty",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        GameConfig::new(
            vec![
                LevelConfig::new("first", 2, 2, Difficulty::Easy),
                LevelConfig::new("second", 2, 3, Difficulty::Hard),
                LevelConfig::new("broken", 3, 3, Difficulty::Medium),
            ],
            8,
        )
        .with_seed(11)
    }

    fn game() -> Game<MemoryStore> {
        Game::initialize(config(), MemoryStore::new()).unwrap()
    }

    fn settle<S: KeyValueStore>(game: &mut Game<S>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for _ in 0..10_000 {
            if game.session().is_idle() {
                return events;
            }
            events.extend(game.tick(0.05));
        }
        panic!("game never settled");
    }

    fn matching_pair(session: &MatchSession) -> (CardId, CardId) {
        let cards = session.cards();
        for a in cards.iter().filter(|card| card.can_select()) {
            if let Some(b) = cards
                .iter()
                .find(|b| b.id() != a.id() && b.can_select() && b.symbol() == a.symbol())
            {
                return (a.id(), b.id());
            }
        }
        panic!("no pair left to match");
    }

    fn play_pair<S: KeyValueStore>(game: &mut Game<S>) -> Vec<SessionEvent> {
        let (first, second) = matching_pair(game.session());
        assert_eq!(game.select_card(first), SelectOutcome::Revealing);
        assert_eq!(game.select_card(second), SelectOutcome::Revealing);
        settle(game)
    }

    #[test]
    fn fresh_load_records_current_level() {
        let mut game = game();

        game.load_level(1).unwrap();

        assert_eq!(game.session().state(), SessionState::Previewing);
        assert_eq!(
            game.progress().load_global_pointer(),
            Some(ProgressPointer {
                current_level_index: 1,
                is_complete: false
            })
        );
        assert_eq!(game.progress().difficulty_preference(), Difficulty::Hard);
        assert_eq!(game.current_level().map(|level| level.name.as_str()), Some("second"));
    }

    #[test]
    fn each_removed_pair_is_checkpointed() {
        let mut game = game();
        game.load_level(1).unwrap();
        settle(&mut game);

        play_pair(&mut game);

        let record = game.progress().load(1).unwrap();
        assert_eq!(record.matched_pairs, 1);
        assert_eq!(record.move_count, 1);
        assert_eq!(record.matched_card_ids.len(), 2);
        assert!(!record.is_complete);
    }

    #[test]
    fn completing_level_deletes_save_and_marks_pointer() {
        let mut game = game();
        game.load_level(0).unwrap();
        settle(&mut game);

        play_pair(&mut game);
        assert!(game.progress().load(0).is_some());
        let events = play_pair(&mut game);

        assert!(events
            .iter()
            .any(|event| matches!(event, SessionEvent::LevelComplete { level_index: 0, .. })));
        assert_eq!(game.session().state(), SessionState::Complete);
        assert!(!game.session().timer_running());
        assert_eq!(game.progress().load(0), None);
        assert_eq!(
            game.progress().load_global_pointer(),
            Some(ProgressPointer {
                current_level_index: 0,
                is_complete: true
            })
        );
    }

    #[test]
    fn resume_restores_checkpoint_from_store() {
        let mut game = game();
        game.load_level(1).unwrap();
        settle(&mut game);
        play_pair(&mut game);
        let record = game.progress().load(1).unwrap();
        let cards: Vec<(SymbolId, CardState)> = game
            .session()
            .cards()
            .iter()
            .map(|card| (card.symbol(), card.state()))
            .collect();

        let mut resumed = Game::initialize(config(), game.into_store()).unwrap();
        resumed.resume().unwrap();

        let session = resumed.session();
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.level_index(), 1);
        assert_eq!(session.matched_pairs(), 1);
        assert_eq!(session.score(), 1);
        assert_eq!(session.move_count(), 1);
        assert_eq!(session.elapsed_time(), record.elapsed_time);
        let restored: Vec<(SymbolId, CardState)> = session
            .cards()
            .iter()
            .map(|card| (card.symbol(), card.state()))
            .collect();
        assert_eq!(restored, cards);
    }

    #[test]
    fn resume_without_progress_starts_fresh_at_start_level() {
        let mut game = game();

        game.resume().unwrap();

        assert_eq!(game.session().level_index(), 0);
        assert_eq!(game.session().state(), SessionState::Previewing);
    }

    #[test]
    fn corrupt_save_falls_back_to_fresh_level() {
        let mut store = MemoryStore::new();
        store.set("memento.level.1", "{\"levelIndex\":").unwrap();
        store
            .set("memento.progress", r#"{"currentLevelIndex":1,"isComplete":false}"#)
            .unwrap();
        let mut game = Game::initialize(config(), store).unwrap();

        game.resume().unwrap();

        assert_eq!(game.session().level_index(), 1);
        assert_eq!(game.session().state(), SessionState::Previewing);
        assert_eq!(game.session().move_count(), 0);
        assert!(!game.progress().store().contains("memento.level.1").unwrap());
    }

    #[test]
    fn save_with_unknown_symbol_is_replaced() {
        let record = SaveRecord {
            level_index: 0,
            elapsed_time: 3.0,
            move_count: 2,
            score: 0,
            matched_pairs: 0,
            matched_card_ids: Default::default(),
            symbol_ids: vec![1, 99, 1, 99],
            is_complete: false,
        };
        let mut progress = ProgressStore::new(MemoryStore::new());
        progress.save_record(&record).unwrap();
        let mut game = Game::initialize(config(), progress.into_inner()).unwrap();

        game.continue_level(0).unwrap();

        assert_eq!(game.session().state(), SessionState::Previewing);
        assert!(game.session().cards().iter().all(|card| card.symbol() < 8));
    }

    #[test]
    fn completed_pointer_starts_level_over() {
        let mut game = game();
        game.load_level(0).unwrap();
        settle(&mut game);
        play_pair(&mut game);
        play_pair(&mut game);

        let mut again = Game::initialize(config(), game.into_store()).unwrap();
        again.resume().unwrap();

        assert_eq!(again.session().level_index(), 0);
        assert_eq!(again.session().state(), SessionState::Previewing);
        assert_eq!(again.session().matched_pairs(), 0);
    }

    #[test]
    fn next_level_walks_through_the_list() {
        let mut game = game();
        game.load_level(0).unwrap();

        assert_eq!(game.next_level(), Ok(true));
        assert_eq!(game.session().level_index(), 1);

        assert_eq!(
            game.next_level(),
            Err(GameError::Config(ConfigError::OddCardCount { rows: 3, cols: 3 }))
        );
        assert_eq!(game.session().state(), SessionState::Unloaded);
    }

    #[test]
    fn next_level_reports_end_of_list() {
        let config = GameConfig::new(vec![LevelConfig::new("only", 2, 2, Difficulty::Easy)], 4);
        let mut game = Game::initialize(config, MemoryStore::new()).unwrap();
        game.load_level(0).unwrap();

        assert_eq!(game.next_level(), Ok(false));
        assert_eq!(game.session().level_index(), 0);
    }

    #[test]
    fn failed_load_keeps_existing_save() {
        let mut game = game();
        game.load_level(1).unwrap();
        settle(&mut game);
        play_pair(&mut game);

        assert!(game.load_level(2).is_err());

        assert!(game.progress().load(1).is_some());
        assert_eq!(
            game.progress().load_global_pointer().map(|p| p.current_level_index),
            Some(1)
        );
    }

    #[test]
    fn invalid_level_index_is_a_config_error() {
        let mut game = game();

        assert_eq!(
            game.load_level(7),
            Err(GameError::Config(ConfigError::InvalidLevelIndex { index: 7, count: 3 }))
        );
    }

    #[test]
    fn restart_reloads_the_same_level() {
        let mut game = game();
        game.load_level(1).unwrap();
        settle(&mut game);
        play_pair(&mut game);

        game.restart().unwrap();

        assert_eq!(game.session().level_index(), 1);
        assert_eq!(game.session().matched_pairs(), 0);
        assert_eq!(game.progress().load(1), None);
    }

    #[test]
    fn high_score_is_submitted_once_per_attempt() {
        let mut game = game();
        game.load_level(0).unwrap();
        assert_eq!(game.submit_high_score("early"), None);

        settle(&mut game);
        play_pair(&mut game);
        play_pair(&mut game);

        assert_eq!(game.submit_high_score(""), Some(1));
        assert_eq!(game.submit_high_score("again"), None);

        let ledger = game.high_scores(Difficulty::Easy);
        assert_eq!(ledger.entries.len(), 1);
        assert_eq!(ledger.entries[0].user_name, DEFAULT_PLAYER_NAME);
        assert!(ledger.entries[0].score > 0);
        assert_eq!(game.player_name(), DEFAULT_PLAYER_NAME);
        assert!(game.high_scores(Difficulty::Hard).is_empty());
    }

    #[test]
    fn clear_progress_keeps_high_scores() {
        let mut game = game();
        game.load_level(0).unwrap();
        settle(&mut game);
        play_pair(&mut game);
        play_pair(&mut game);
        game.submit_high_score("kim");
        game.load_level(1).unwrap();
        settle(&mut game);
        play_pair(&mut game);

        game.clear_progress().unwrap();

        assert_eq!(game.progress().load(1), None);
        assert_eq!(game.progress().load_global_pointer(), None);
        assert_eq!(game.high_scores(Difficulty::Easy).entries.len(), 1);
        assert_eq!(game.player_name(), "kim");
    }

    /// Store whose every call fails, like a full disk or revoked permissions.
    #[derive(Debug)]
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Err(GameError::Storage(format!("cannot read {key}")))
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<()> {
            Err(GameError::Storage(format!("cannot write {key}")))
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            Err(GameError::Storage(format!("cannot remove {key}")))
        }

        fn keys(&self) -> Result<Vec<String>> {
            Err(GameError::Storage("cannot list keys".to_string()))
        }
    }

    fn finished_record() -> SaveRecord {
        SaveRecord {
            level_index: 0,
            elapsed_time: 9.0,
            move_count: 2,
            score: 2,
            matched_pairs: 2,
            matched_card_ids: [0, 1, 2, 3].into_iter().collect(),
            symbol_ids: vec![3, 3, 5, 5],
            is_complete: true,
        }
    }

    #[test]
    fn storage_failures_do_not_block_play() {
        let mut game = Game::initialize(config(), FailingStore).unwrap();

        game.resume().unwrap();
        assert_eq!(game.session().level_index(), 0);
        assert_eq!(game.session().state(), SessionState::Previewing);

        settle(&mut game);
        play_pair(&mut game);
        assert_eq!(game.session().matched_pairs(), 1);
        play_pair(&mut game);

        assert_eq!(game.session().state(), SessionState::Complete);
        assert_eq!(game.submit_high_score("kim"), Some(1));
        assert_eq!(game.player_name(), DEFAULT_PLAYER_NAME);
        assert!(game.high_scores(Difficulty::Easy).is_empty());
        assert!(matches!(game.clear_progress(), Err(GameError::Storage(_))));
    }

    #[test]
    fn completed_record_is_deleted_before_a_fresh_attempt() {
        let mut progress = ProgressStore::new(MemoryStore::new());
        progress.save_record(&finished_record()).unwrap();
        let mut game = Game::initialize(config(), progress.into_inner()).unwrap();

        game.continue_level(0).unwrap();

        assert_eq!(game.session().state(), SessionState::Previewing);
        assert_eq!(game.session().matched_pairs(), 0);
        assert_eq!(game.progress().load(0), None);
    }

    #[test]
    fn fully_matched_record_without_completion_is_not_resumed() {
        let mut record = finished_record();
        record.is_complete = false;
        let mut progress = ProgressStore::new(MemoryStore::new());
        progress.save_record(&record).unwrap();
        let mut game = Game::initialize(config(), progress.into_inner()).unwrap();

        game.continue_level(0).unwrap();

        assert_eq!(game.session().state(), SessionState::Previewing);
        assert_eq!(game.submit_high_score("kim"), None);
        assert_eq!(game.progress().load(0), None);
    }
}
