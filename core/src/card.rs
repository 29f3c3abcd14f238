use serde::{Deserialize, Serialize};

use crate::*;

/// Canonical state of a single grid cell.
///
/// Flip cycle: `Hidden -> Revealing -> Revealed -> Hiding -> Hidden`.
/// `MatchedRemoved` is terminal and only reachable from `Hidden` or `Revealed`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardState {
    Hidden,
    Revealing,
    Revealed,
    Hiding,
    MatchedRemoved,
}

impl CardState {
    pub const fn is_transitioning(self) -> bool {
        matches!(self, Self::Revealing | Self::Hiding)
    }

    pub const fn is_removed(self) -> bool {
        matches!(self, Self::MatchedRemoved)
    }
}

impl Default for CardState {
    fn default() -> Self {
        Self::Hidden
    }
}

/// A flip that finished during [`Card::advance`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlipDone {
    Revealed,
    Hidden,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    id: CardId,
    symbol: SymbolId,
    state: CardState,
    elapsed: Seconds,
    duration: Seconds,
}

impl Card {
    pub fn new(id: CardId, symbol: SymbolId) -> Self {
        Self {
            id,
            symbol,
            state: CardState::Hidden,
            elapsed: 0.0,
            duration: 0.0,
        }
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    pub fn symbol(&self) -> SymbolId {
        self.symbol
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn is_transitioning(&self) -> bool {
        self.state.is_transitioning()
    }

    /// `false` exactly when the card has been matched and removed.
    pub fn is_interactable(&self) -> bool {
        !self.state.is_removed()
    }

    /// Whether a player selection on this card would be accepted by the card itself.
    pub fn can_select(&self) -> bool {
        matches!(self.state, CardState::Hidden)
    }

    /// Fraction of the current flip that has played, `0.0` when idle.
    pub fn flip_progress(&self) -> f32 {
        if !self.is_transitioning() || self.duration <= 0.0 {
            return 0.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    /// Time until the current flip lands, `0.0` when idle.
    pub fn remaining(&self) -> Seconds {
        if !self.is_transitioning() {
            return 0.0;
        }
        (self.duration - self.elapsed).max(0.0)
    }

    /// Whether the face (rather than the back) is currently displayed. The image swaps at the
    /// midpoint of a flip.
    pub fn face_visible(&self) -> bool {
        use CardState::*;
        match self.state {
            Hidden | MatchedRemoved => false,
            Revealed => true,
            Revealing => self.flip_progress() >= 0.5,
            Hiding => self.flip_progress() < 0.5,
        }
    }

    /// Assigns a new face. Only valid while hidden and idle; the back is displayed afterwards.
    pub fn set_symbol(&mut self, symbol: SymbolId) -> Result<()> {
        if !matches!(self.state, CardState::Hidden) {
            return Err(GameError::CardBusy(self.id));
        }
        self.symbol = symbol;
        Ok(())
    }

    pub fn reveal(&mut self, duration: Seconds) -> FlipOutcome {
        if !matches!(self.state, CardState::Hidden) {
            return FlipOutcome::Ignored;
        }
        self.start_flip(CardState::Revealing, duration);
        log::trace!("card {} revealing", self.id);
        FlipOutcome::Started
    }

    pub fn hide(&mut self, duration: Seconds) -> FlipOutcome {
        if !matches!(self.state, CardState::Revealed) {
            return FlipOutcome::Ignored;
        }
        self.start_flip(CardState::Hiding, duration);
        log::trace!("card {} hiding", self.id);
        FlipOutcome::Started
    }

    /// Shows the face immediately, without a flip.
    pub fn show_instant(&mut self) -> FlipOutcome {
        if !matches!(self.state, CardState::Hidden) {
            return FlipOutcome::Ignored;
        }
        self.state = CardState::Revealed;
        FlipOutcome::Started
    }

    /// Moves the card to its terminal state. Returns `false` when the card was mid-flip or
    /// already removed.
    pub fn mark_removed(&mut self) -> bool {
        match self.state {
            CardState::Hidden | CardState::Revealed => {
                self.state = CardState::MatchedRemoved;
                self.elapsed = 0.0;
                self.duration = 0.0;
                true
            }
            _ => false,
        }
    }

    /// Advances an in-flight flip, reporting when it lands.
    pub fn advance(&mut self, dt: Seconds) -> Option<FlipDone> {
        let landed = match self.state {
            CardState::Revealing => (CardState::Revealed, FlipDone::Revealed),
            CardState::Hiding => (CardState::Hidden, FlipDone::Hidden),
            _ => return None,
        };

        self.elapsed += dt.max(0.0);
        if self.elapsed < self.duration {
            return None;
        }

        self.state = landed.0;
        self.elapsed = 0.0;
        self.duration = 0.0;
        Some(landed.1)
    }

    fn start_flip(&mut self, state: CardState, duration: Seconds) {
        self.state = state;
        self.elapsed = 0.0;
        self.duration = duration.max(0.0);
    }
}
