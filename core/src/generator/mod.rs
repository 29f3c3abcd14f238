use crate::*;
pub use shuffled::*;

mod shuffled;

pub trait DeckGenerator {
    /// Produces `2 * pair_count` symbols where every symbol taken from the pool appears in pairs.
    fn generate(self, pool: &[SymbolId], pair_count: CardCount) -> Result<Vec<SymbolId>>;
}

/// The deck before shuffling: two copies of `pool[i % pool.len()]` for each pair `i`.
pub fn unshuffled_deck(pool: &[SymbolId], pair_count: CardCount) -> Result<Vec<SymbolId>> {
    if pool.is_empty() {
        return Err(ConfigError::EmptySymbolPool.into());
    }
    if pair_count == 0 {
        return Err(ConfigError::NoPairs.into());
    }
    if usize::from(pair_count) > pool.len() {
        log::debug!(
            "Symbol pool of {} is smaller than {} pairs, symbols will repeat",
            pool.len(),
            pair_count
        );
    }

    let mut deck = Vec::with_capacity(2 * usize::from(pair_count));
    for i in 0..usize::from(pair_count) {
        let symbol = pool[i % pool.len()];
        deck.push(symbol);
        deck.push(symbol);
    }
    Ok(deck)
}
