//! Piece reserves and per-size allotments.

use serde::{Deserialize, Serialize};

use crate::board::{Color, PieceKind, MAX_SIZE, MIN_SIZE};
use crate::error::SetupError;

/// A count of stones and capstones.
///
/// Used both for a player's remaining reserve and for the fixed allotment a
/// board size hands each player. Standing stones draw on `stones`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct Stock {
    pub stones: u8,
    pub capstones: u8,
}

impl Stock {
    pub const fn new(stones: u8, capstones: u8) -> Stock {
        Stock { stones, capstones }
    }

    #[inline]
    pub fn total(self) -> u16 {
        self.stones as u16 + self.capstones as u16
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.total() == 0
    }

    /// Whether one piece of this kind is available.
    #[inline]
    pub fn has(self, kind: PieceKind) -> bool {
        match kind {
            PieceKind::Flat | PieceKind::Standing => self.stones > 0,
            PieceKind::Capstone => self.capstones > 0,
        }
    }

    /// Take one piece of a kind. Caller checks `has` first.
    #[inline]
    pub(crate) fn take(&mut self, kind: PieceKind) {
        match kind {
            PieceKind::Flat | PieceKind::Standing => self.stones -= 1,
            PieceKind::Capstone => self.capstones -= 1,
        }
    }

    #[inline]
    pub(crate) fn restore(&mut self, kind: PieceKind) {
        match kind {
            PieceKind::Flat | PieceKind::Standing => self.stones += 1,
            PieceKind::Capstone => self.capstones += 1,
        }
    }

    /// What remains of this allotment after `used` pieces, or None if overdrawn.
    pub fn checked_sub(self, used: Stock) -> Option<Stock> {
        Some(Stock {
            stones: self.stones.checked_sub(used.stones)?,
            capstones: self.capstones.checked_sub(used.capstones)?,
        })
    }
}

/// Standard allotment for a board size.
pub fn default_allotment(size: u8) -> Option<Stock> {
    match size {
        3 => Some(Stock::new(10, 0)),
        4 => Some(Stock::new(15, 0)),
        5 => Some(Stock::new(21, 1)),
        6 => Some(Stock::new(30, 1)),
        7 => Some(Stock::new(40, 2)),
        8 => Some(Stock::new(50, 2)),
        _ => None,
    }
}

/// One configured allotment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllotmentOverride {
    pub size: u8,
    pub stones: u8,
    pub capstones: u8,
}

/// Allotments by board size, with optional overrides from configuration.
///
/// ```toml
/// [[allotment]]
/// size = 6
/// stones = 28
/// capstones = 2
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllotmentTable {
    overrides: Vec<AllotmentOverride>,
}

impl AllotmentTable {
    pub fn with_override(mut self, size: u8, stock: Stock) -> AllotmentTable {
        self.overrides.retain(|o| o.size != size);
        self.overrides.push(AllotmentOverride {
            size,
            stones: stock.stones,
            capstones: stock.capstones,
        });
        self
    }

    pub fn for_size(&self, size: u8) -> Result<Stock, SetupError> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
            return Err(SetupError::InvalidSize(size));
        }
        self.overrides
            .iter()
            .find(|o| o.size == size)
            .map(|o| Stock::new(o.stones, o.capstones))
            .or_else(|| default_allotment(size))
            .ok_or(SetupError::InvalidSize(size))
    }
}

/// Both players' remaining reserves.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct Reserves {
    pub white: Stock,
    pub black: Stock,
}

impl Reserves {
    /// Full reserves for both colors.
    pub fn full(allotment: Stock) -> Reserves {
        Reserves {
            white: allotment,
            black: allotment,
        }
    }

    #[inline]
    pub fn get(&self, color: Color) -> Stock {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, color: Color) -> &mut Stock {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    /// True once either player has nothing left to place.
    #[inline]
    pub fn any_exhausted(&self) -> bool {
        self.white.is_empty() || self.black.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allotments() {
        assert_eq!(default_allotment(5), Some(Stock::new(21, 1)));
        assert_eq!(default_allotment(8), Some(Stock::new(50, 2)));
        assert_eq!(default_allotment(2), None);
    }

    #[test]
    fn test_table_override() {
        let table = AllotmentTable::default().with_override(6, Stock::new(28, 2));
        assert_eq!(table.for_size(6), Ok(Stock::new(28, 2)));
        assert_eq!(table.for_size(5), Ok(Stock::new(21, 1)));
        assert_eq!(table.for_size(9), Err(SetupError::InvalidSize(9)));
    }

    #[test]
    fn test_stock_take_restore() {
        let mut stock = Stock::new(1, 1);
        assert!(stock.has(PieceKind::Standing));
        stock.take(PieceKind::Standing);
        assert!(!stock.has(PieceKind::Flat));
        assert!(stock.has(PieceKind::Capstone));
        stock.take(PieceKind::Capstone);
        assert!(stock.is_empty());
        stock.restore(PieceKind::Flat);
        assert_eq!(stock, Stock::new(1, 0));
    }

    #[test]
    fn test_checked_sub() {
        let allot = Stock::new(10, 1);
        assert_eq!(allot.checked_sub(Stock::new(4, 1)), Some(Stock::new(6, 0)));
        assert_eq!(allot.checked_sub(Stock::new(4, 2)), None);
    }

    #[test]
    fn test_table_deserializes() {
        let json = r#"[{"size": 6, "stones": 28, "capstones": 2}]"#;
        let table: AllotmentTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.for_size(6), Ok(Stock::new(28, 2)));
    }
}
