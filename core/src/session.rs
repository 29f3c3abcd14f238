use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;

use crate::*;

/// Score awarded for every confirmed pair.
pub const MATCH_REWARD: u32 = 1;

/// Valid transitions:
/// - Unloaded -> Previewing (fresh load)
/// - Unloaded -> Playing (resumed load)
/// - Previewing -> Playing
/// - Playing -> Complete
/// - any -> Unloaded (next load, or a load that failed validation)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Unloaded,
    Previewing,
    Playing,
    Complete,
}

impl SessionState {
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Unloaded
    }
}

/// Notifications for the presentation layer and for the progress bookkeeping in [`Game`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SessionEvent {
    PreviewStarted,
    PreviewEnded,
    FlipStarted { card: CardId, to_face: bool },
    CardRevealed(CardId),
    CardHidden(CardId),
    MoveCounted { moves: u32 },
    PairMatched { first: CardId, second: CardId },
    PairMismatched { first: CardId, second: CardId },
    /// Midpoint of the removal sequence, where the host spawns its match effect.
    MatchEffect { first: CardId, second: CardId },
    PairRemoved { first: CardId, second: CardId },
    LevelComplete {
        level_index: usize,
        score: u32,
        moves: u32,
        elapsed: Seconds,
    },
}

/// Timed sequence that runs once two cards are open.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Resolution {
    Idle,
    Settling { remaining: Seconds },
    MismatchDelay { remaining: Seconds },
    Pop { remaining: Seconds },
    Effect { remaining: Seconds },
    Shrink { remaining: Seconds },
}

impl Resolution {
    const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }

    const fn is_removing(self) -> bool {
        matches!(self, Self::Pop { .. } | Self::Effect { .. } | Self::Shrink { .. })
    }

    const fn remaining(self) -> Option<Seconds> {
        use Resolution::*;
        match self {
            Idle => None,
            Settling { remaining }
            | MismatchDelay { remaining }
            | Pop { remaining }
            | Effect { remaining }
            | Shrink { remaining } => Some(remaining),
        }
    }

    const fn with_remaining(self, remaining: Seconds) -> Self {
        use Resolution::*;
        match self {
            Idle => Idle,
            Settling { .. } => Settling { remaining },
            MismatchDelay { .. } => MismatchDelay { remaining },
            Pop { .. } => Pop { remaining },
            Effect { .. } => Effect { remaining },
            Shrink { .. } => Shrink { remaining },
        }
    }
}

/// One level's play: cards, open pair, counters and the timed steps between them.
#[derive(Clone, Debug)]
pub struct MatchSession {
    level_index: usize,
    rows: Coord,
    cols: Coord,
    difficulty: Difficulty,
    total_pairs: CardCount,
    matched_pairs: CardCount,
    score: u32,
    move_count: u32,
    elapsed: Seconds,
    timer_running: bool,
    cards: Vec<Card>,
    open_cards: SmallVec<[CardId; 2]>,
    pending_reveals: SmallVec<[CardId; 2]>,
    resolution: Resolution,
    preview_remaining: Option<Seconds>,
    state: SessionState,
    timings: Timings,
    epoch: u64,
    events: Vec<SessionEvent>,
}

impl Default for MatchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchSession {
    pub fn new() -> Self {
        Self {
            level_index: 0,
            rows: 0,
            cols: 0,
            difficulty: Difficulty::default(),
            total_pairs: 0,
            matched_pairs: 0,
            score: 0,
            move_count: 0,
            elapsed: 0.0,
            timer_running: false,
            cards: Vec::new(),
            open_cards: SmallVec::new(),
            pending_reveals: SmallVec::new(),
            resolution: Resolution::Idle,
            preview_remaining: None,
            state: SessionState::Unloaded,
            timings: Timings::default(),
            epoch: 0,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_final()
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn rows(&self) -> Coord {
        self.rows
    }

    pub fn cols(&self) -> Coord {
        self.cols
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn total_pairs(&self) -> CardCount {
        self.total_pairs
    }

    pub fn matched_pairs(&self) -> CardCount {
        self.matched_pairs
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn elapsed_time(&self) -> Seconds {
        self.elapsed
    }

    pub fn timer_running(&self) -> bool {
        self.timer_running
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(usize::from(id))
    }

    /// Revealed cards awaiting resolution, in the order they landed.
    pub fn open_cards(&self) -> &[CardId] {
        &self.open_cards
    }

    pub fn is_resolving(&self) -> bool {
        self.resolution.is_active()
    }

    /// Bumped on every load. Host-side callbacks tagged with an older epoch are stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Nothing is in flight: no preview, no flips, no pending resolution.
    pub fn is_idle(&self) -> bool {
        self.preview_remaining.is_none()
            && !self.resolution.is_active()
            && self.pending_reveals.is_empty()
            && !self.cards.iter().any(Card::is_transitioning)
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        core::mem::take(&mut self.events)
    }

    /// Loads a level with a newly generated deck and runs the preview.
    pub fn load_fresh<G: DeckGenerator>(
        &mut self,
        level_index: usize,
        level: &LevelConfig,
        timings: Timings,
        pool: &[SymbolId],
        generator: G,
    ) -> Result<()> {
        self.unload();
        level.validate()?;
        let deck = generator.generate(pool, level.total_pairs())?;

        self.install(level_index, level, timings, &deck);
        self.start_preview();
        log::debug!(
            "Loaded level {} fresh ({}x{}, {} pairs)",
            level_index,
            level.rows,
            level.cols,
            self.total_pairs
        );
        Ok(())
    }

    /// Rebuilds a level from a checkpoint. Matched cards come back removed, all others hidden.
    pub fn load_resumed(
        &mut self,
        level_index: usize,
        level: &LevelConfig,
        timings: Timings,
        record: &SaveRecord,
        symbol_count: SymbolId,
    ) -> Result<()> {
        self.unload();
        level.validate()?;
        record.validate(level_index, level, symbol_count)?;

        self.install(level_index, level, timings, &record.symbol_ids);
        self.score = record.score;
        self.move_count = record.move_count;
        self.elapsed = record.elapsed_time;
        self.matched_pairs = record.matched_pairs;
        for &id in &record.matched_card_ids {
            self.cards[usize::from(id)].mark_removed();
        }

        if self.matched_pairs == self.total_pairs {
            self.timer_running = false;
            self.state = SessionState::Complete;
        } else {
            self.state = SessionState::Playing;
        }
        log::debug!(
            "Restored level {}: score={}, pairs={}, moves={}, time={:.1}s",
            level_index,
            self.score,
            self.matched_pairs,
            self.move_count,
            self.elapsed
        );
        Ok(())
    }

    /// Discards every card and in-flight sequence of the current level.
    pub fn unload(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.timer_running = false;
        self.cards.clear();
        self.open_cards.clear();
        self.pending_reveals.clear();
        self.resolution = Resolution::Idle;
        self.preview_remaining = None;
        self.events.clear();
        self.total_pairs = 0;
        self.matched_pairs = 0;
        self.score = 0;
        self.move_count = 0;
        self.elapsed = 0.0;
        self.state = SessionState::Unloaded;
    }

    /// Replaces the face of a hidden, idle card. Keeping the deck paired is up to the caller.
    pub fn set_symbol(&mut self, id: CardId, symbol: SymbolId) -> Result<()> {
        let card = self
            .cards
            .get_mut(usize::from(id))
            .ok_or(GameError::InvalidCard(id))?;
        card.set_symbol(symbol)
    }

    /// Player input. Ignored unless the card is hidden, no pair is resolving and fewer than two
    /// cards are open or opening.
    pub fn select_card(&mut self, id: CardId) -> SelectOutcome {
        if !matches!(self.state, SessionState::Playing) || self.resolution.is_active() {
            return SelectOutcome::Ignored;
        }
        if self.open_cards.len() + self.pending_reveals.len() >= 2 {
            return SelectOutcome::Ignored;
        }

        let reveal_flip = self.timings.reveal_flip;
        let Some(card) = self.cards.get_mut(usize::from(id)) else {
            log::debug!("Ignoring selection of card {} outside the grid", id);
            return SelectOutcome::Ignored;
        };
        if !card.reveal(reveal_flip).has_update() {
            return SelectOutcome::Ignored;
        }

        self.pending_reveals.push(id);
        self.events.push(SessionEvent::FlipStarted {
            card: id,
            to_face: true,
        });
        SelectOutcome::Revealing
    }

    /// Advances the level clock and every timed step by `dt` seconds.
    ///
    /// A step that ends partway through `dt` hands the rest of the tick to the step after it,
    /// so the outcome does not depend on how the host slices time.
    pub fn tick(&mut self, dt: Seconds) {
        if matches!(self.state, SessionState::Unloaded) {
            return;
        }
        let dt = dt.max(0.0);
        if self.timer_running {
            self.elapsed += dt;
        }

        // a pair opened by advance_cards starts its own resolution with the leftover time
        let resolving = self.resolution.is_active();

        self.advance_cards(dt);
        self.advance_preview(dt);
        if resolving {
            self.advance_resolution(dt);
        }
    }

    /// Snapshot of the level for the progress store.
    pub fn snapshot(&self) -> SaveRecord {
        let mut matched_card_ids: BTreeSet<CardId> = self
            .cards
            .iter()
            .filter(|card| card.state().is_removed())
            .map(Card::id)
            .collect();
        // a confirmed pair still playing its removal already counts as matched
        if self.resolution.is_removing() {
            matched_card_ids.extend(self.open_cards.iter().copied());
        }

        SaveRecord {
            level_index: self.level_index,
            elapsed_time: self.elapsed,
            move_count: self.move_count,
            score: self.score,
            matched_pairs: self.matched_pairs,
            matched_card_ids,
            symbol_ids: self.cards.iter().map(Card::symbol).collect(),
            is_complete: self.is_complete(),
        }
    }

    fn install(&mut self, level_index: usize, level: &LevelConfig, timings: Timings, symbols: &[SymbolId]) {
        self.level_index = level_index;
        self.rows = level.rows;
        self.cols = level.cols;
        self.difficulty = level.difficulty;
        self.timings = timings;
        self.total_pairs = level.total_pairs();
        self.cards = symbols
            .iter()
            .zip(0..)
            .map(|(&symbol, id)| Card::new(id, symbol))
            .collect();
        self.timer_running = true;
    }

    fn start_preview(&mut self) {
        for card in &mut self.cards {
            card.show_instant();
        }
        self.preview_remaining = Some(self.timings.preview(self.difficulty));
        self.state = SessionState::Previewing;
        self.events.push(SessionEvent::PreviewStarted);
    }

    fn advance_preview(&mut self, dt: Seconds) {
        let Some(remaining) = self.preview_remaining else {
            return;
        };
        if remaining > dt {
            self.preview_remaining = Some(remaining - dt);
            return;
        }

        let leftover = dt - remaining;
        let hide_flip = self.timings.hide_flip;
        for card in &mut self.cards {
            card.hide(hide_flip);
        }
        self.preview_remaining = None;
        self.state = SessionState::Playing;
        self.events.push(SessionEvent::PreviewEnded);

        for index in 0..self.cards.len() {
            self.advance_card(index, leftover);
        }
    }

    /// Advances one card's flip. Returns the part of `dt` left over when the flip lands.
    fn advance_card(&mut self, index: usize, dt: Seconds) -> Option<Seconds> {
        let card = &mut self.cards[index];
        let remaining = card.remaining();
        let done = card.advance(dt)?;
        let id = card.id();
        self.events.push(match done {
            FlipDone::Revealed => SessionEvent::CardRevealed(id),
            FlipDone::Hidden => SessionEvent::CardHidden(id),
        });
        Some((dt - remaining).max(0.0))
    }

    fn advance_cards(&mut self, dt: Seconds) {
        let mut revealed: SmallVec<[(CardId, Seconds); 2]> = SmallVec::new();
        for index in 0..self.cards.len() {
            if let Some(leftover) = self.advance_card(index, dt) {
                let card = &self.cards[index];
                if card.state() == CardState::Revealed {
                    revealed.push((card.id(), leftover));
                }
            }
        }

        // open in selection order, so the pair is always the two latest selections
        while let Some(&id) = self.pending_reveals.first() {
            if self.cards[usize::from(id)].state() != CardState::Revealed {
                break;
            }
            self.pending_reveals.remove(0);
            let leftover = revealed
                .iter()
                .find(|(landed, _)| *landed == id)
                .map_or(dt, |&(_, leftover)| leftover);
            self.open_card(id, leftover);
        }
    }

    fn open_card(&mut self, id: CardId, leftover: Seconds) {
        self.open_cards.push(id);
        log::trace!("card {} open ({} open)", id, self.open_cards.len());

        if self.open_cards.len() == 2 {
            self.move_count += 1;
            self.events.push(SessionEvent::MoveCounted {
                moves: self.move_count,
            });
            self.resolution = Resolution::Settling {
                remaining: self.timings.settle,
            };
            self.advance_resolution(leftover);
        }
    }

    /// Runs resolution phases until `dt` is used up or the pair is resolved.
    fn advance_resolution(&mut self, mut dt: Seconds) {
        use Resolution::*;

        while let Some(remaining) = self.resolution.remaining() {
            if remaining > dt {
                self.resolution = self.resolution.with_remaining(remaining - dt);
                return;
            }
            dt -= remaining;

            let current = self.resolution;
            self.resolution = match current {
                Idle => Idle,
                Settling { .. } => self.compare_open_pair(),
                MismatchDelay { .. } => self.hide_open_pair(dt),
                Pop { .. } => {
                    let (first, second) = self.open_pair();
                    self.events.push(SessionEvent::MatchEffect { first, second });
                    Effect {
                        remaining: self.timings.match_effect,
                    }
                }
                Effect { .. } => Shrink {
                    remaining: self.timings.match_shrink,
                },
                Shrink { .. } => self.remove_open_pair(),
            };
        }
    }

    fn open_pair(&self) -> (CardId, CardId) {
        (self.open_cards[0], self.open_cards[1])
    }

    fn compare_open_pair(&mut self) -> Resolution {
        let (first, second) = self.open_pair();
        let first_symbol = self.cards[usize::from(first)].symbol();
        let second_symbol = self.cards[usize::from(second)].symbol();

        if first_symbol != second_symbol {
            log::debug!("Cards {} and {} do not match", first, second);
            self.events.push(SessionEvent::PairMismatched { first, second });
            return Resolution::MismatchDelay {
                remaining: self.timings.mismatch_delay,
            };
        }

        self.score += MATCH_REWARD;
        self.matched_pairs += 1;
        log::debug!(
            "Cards {} and {} match ({}/{} pairs)",
            first,
            second,
            self.matched_pairs,
            self.total_pairs
        );
        self.events.push(SessionEvent::PairMatched { first, second });

        if self.matched_pairs >= self.total_pairs {
            self.complete();
        }

        Resolution::Pop {
            remaining: self.timings.match_pop,
        }
    }

    fn hide_open_pair(&mut self, leftover: Seconds) -> Resolution {
        let hide_flip = self.timings.hide_flip;
        let open = core::mem::take(&mut self.open_cards);
        for &id in &open {
            if self.cards[usize::from(id)].hide(hide_flip).has_update() {
                self.events.push(SessionEvent::FlipStarted {
                    card: id,
                    to_face: false,
                });
                self.advance_card(usize::from(id), leftover);
            }
        }
        Resolution::Idle
    }

    fn remove_open_pair(&mut self) -> Resolution {
        let (first, second) = self.open_pair();
        self.cards[usize::from(first)].mark_removed();
        self.cards[usize::from(second)].mark_removed();
        self.open_cards.clear();
        self.events.push(SessionEvent::PairRemoved { first, second });
        Resolution::Idle
    }

    fn complete(&mut self) {
        self.timer_running = false;
        self.state = SessionState::Complete;
        log::info!(
            "Level {} complete: score={}, moves={}, time={:.1}s",
            self.level_index,
            self.score,
            self.move_count,
            self.elapsed
        );
        self.events.push(SessionEvent::LevelComplete {
            level_index: self.level_index,
            score: self.score,
            moves: self.move_count,
            elapsed: self.elapsed,
        });
    }
}
