use std::collections::BTreeMap;

use memento_core::{CardId, MatchSession, SessionEvent, SessionState, SymbolId};

/// Scripted player that never forgets a face it has flipped. Faces shown during the preview are
/// not memorized.
#[derive(Clone, Debug, Default)]
pub struct Autoplayer {
    epoch: u64,
    seen: BTreeMap<CardId, SymbolId>,
}

impl Autoplayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, session: &MatchSession, event: &SessionEvent) {
        self.sync(session);
        match *event {
            SessionEvent::CardRevealed(id) => {
                if let Some(card) = session.card(id) {
                    self.seen.insert(id, card.symbol());
                }
            }
            SessionEvent::PairRemoved { first, second } => {
                self.seen.remove(&first);
                self.seen.remove(&second);
            }
            _ => {}
        }
    }

    /// Next card to select, or `None` while the session is busy.
    pub fn choose(&mut self, session: &MatchSession) -> Option<CardId> {
        self.sync(session);
        if session.state() != SessionState::Playing || !session.is_idle() {
            return None;
        }

        match session.open_cards() {
            [] => self.known_pair(session).or_else(|| self.unknown(session)),
            &[open] => {
                let symbol = session.card(open)?.symbol();
                self.known_partner(session, open, symbol)
                    .or_else(|| self.unknown(session))
                    .or_else(|| selectable(session).find(|&id| id != open))
            }
            _ => None,
        }
    }

    /// Memory only holds cards from the session currently loaded.
    fn sync(&mut self, session: &MatchSession) {
        if self.epoch != session.epoch() {
            self.epoch = session.epoch();
            self.seen.clear();
        }
    }

    fn known_pair(&self, session: &MatchSession) -> Option<CardId> {
        let known: Vec<(CardId, SymbolId)> = selectable(session)
            .filter_map(|id| self.seen.get(&id).map(|&symbol| (id, symbol)))
            .collect();
        known
            .iter()
            .find(|(id, symbol)| known.iter().any(|(other, s)| other != id && s == symbol))
            .map(|&(id, _)| id)
    }

    fn known_partner(&self, session: &MatchSession, open: CardId, symbol: SymbolId) -> Option<CardId> {
        selectable(session).find(|&id| id != open && self.seen.get(&id) == Some(&symbol))
    }

    fn unknown(&self, session: &MatchSession) -> Option<CardId> {
        selectable(session).find(|id| !self.seen.contains_key(id))
    }
}

fn selectable(session: &MatchSession) -> impl Iterator<Item = CardId> + '_ {
    session
        .cards()
        .iter()
        .filter(|card| card.can_select())
        .map(|card| card.id())
}
