//! Move notation.
//!
//! Squares are a file letter (`a` + column) and a rank (`row + 1`), so `a1`
//! is (0,0). Placements are `a1`, `Sa1` (wall) and `Ca1` (capstone); spreads
//! are the origin, a direction symbol and the drop counts: `a1>12`.
//!
//! Parsing also accepts the longer forms: an explicit `F` for flats, a pickup
//! count prefix (`3a1>12`), omitted drops (`a1>` moves one piece, `3a1>`
//! drops all three on the first cell) and trailing annotation marks.

use std::fmt;
use std::str::FromStr;

use crate::board::{Direction, PieceKind, Pos};
use crate::error::NotationError;
use crate::moves::Move;

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.col) as char, self.row + 1)
    }
}

impl FromStr for Pos {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Pos, NotationError> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(file @ 'a'..='h'), Some(rank @ '1'..='8'), None) => {
                Ok(Pos::new(rank as u8 - b'1', file as u8 - b'a'))
            }
            _ => Err(NotationError::Square(s.to_string())),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Place { pos, kind } => {
                match kind {
                    PieceKind::Flat => {}
                    PieceKind::Standing => f.write_str("S")?,
                    PieceKind::Capstone => f.write_str("C")?,
                }
                write!(f, "{pos}")
            }
            Move::Spread { from, dir, drops } => {
                write!(f, "{from}{}", dir.symbol())?;
                for d in drops {
                    write!(f, "{d}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Move {
    type Err = NotationError;

    fn from_str(input: &str) -> Result<Move, NotationError> {
        let text = input
            .trim()
            .trim_end_matches(['\'', '"', '!', '?', '*']);
        if text.is_empty() {
            return Err(NotationError::Empty);
        }

        let (kind, rest) = match text.as_bytes()[0] {
            b'F' => (Some(PieceKind::Flat), &text[1..]),
            b'S' => (Some(PieceKind::Standing), &text[1..]),
            b'C' => (Some(PieceKind::Capstone), &text[1..]),
            _ => (None, text),
        };
        if let Some(kind) = kind {
            let pos = rest.parse::<Pos>()?;
            return Ok(Move::place(pos, kind));
        }

        let (count, rest) = match rest.as_bytes()[0] {
            c @ b'1'..=b'8' => (Some((c - b'0') as usize), &rest[1..]),
            _ => (None, rest),
        };
        let square = rest.get(..2).ok_or_else(|| NotationError::Square(input.to_string()))?;
        let pos = square
            .parse::<Pos>()
            .map_err(|_| NotationError::Square(input.to_string()))?;
        let rest = &rest[2..];

        let mut tail = rest.chars();
        let Some(symbol) = tail.next() else {
            if count.is_some() {
                return Err(NotationError::Trailing(input.to_string()));
            }
            return Ok(Move::place(pos, PieceKind::Flat));
        };
        let dir = Direction::from_symbol(symbol).ok_or(NotationError::Direction(symbol))?;

        let mut drops = Vec::new();
        for c in tail {
            match c.to_digit(10) {
                Some(d @ 1..=8) => drops.push(d as u8),
                _ => return Err(NotationError::Drops(input.to_string())),
            }
        }
        if drops.is_empty() {
            drops.push(count.unwrap_or(1) as u8);
        }
        let carried: usize = drops.iter().map(|&d| d as usize).sum();
        if count.is_some_and(|c| c != carried) {
            return Err(NotationError::CountMismatch(input.to_string()));
        }
        Ok(Move::spread(pos, dir, drops))
    }
}
