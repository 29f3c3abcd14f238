/// Single grid axis, used for row and column counts.
pub type Coord = u8;

/// Index of a card in the grid, row-major, `0..rows * cols`.
pub type CardId = u16;

/// Opaque face identifier. The host maps it to an image; the engine only compares it.
pub type SymbolId = u16;

/// Count type used for card and pair totals.
pub type CardCount = u16;

/// Durations and elapsed time, in seconds.
pub type Seconds = f32;

pub const fn card_count(rows: Coord, cols: Coord) -> CardCount {
    let rows = rows as CardCount;
    let cols = cols as CardCount;
    rows.saturating_mul(cols)
}
