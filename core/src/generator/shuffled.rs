use super::*;

/// Uniformly shuffled deck, reproducible from its seed.
#[derive(Clone, Debug, PartialEq)]
pub struct ShuffledDeck {
    seed: u64,
}

impl ShuffledDeck {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl DeckGenerator for ShuffledDeck {
    fn generate(self, pool: &[SymbolId], pair_count: CardCount) -> Result<Vec<SymbolId>> {
        use rand::prelude::*;

        let mut deck = unshuffled_deck(pool, pair_count)?;
        let mut rng = SmallRng::seed_from_u64(self.seed);

        // Fisher-Yates, from the last index down to 1
        for i in (1..deck.len()).rev() {
            let j = rng.random_range(0..=i);
            deck.swap(i, j);
        }

        Ok(deck)
    }
}
