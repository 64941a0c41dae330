//! Method color allocation.
//!
//! Every method registered on a recorder receives a [`ColorToken`] that tags
//! all of its rendered lines. The first `N` allocations walk a fixed palette in
//! order; once the palette is exhausted, tokens are uniformly random RGB
//! triples. Random tokens may collide, which is accepted.
//!
//! Reproducibility: given the same seed, [`ColorAllocator::seeded`] produces
//! the same sequence of random-phase tokens.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// An RGB display color assigned to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorToken {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorToken {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        ColorToken { r, g, b }
    }

    /// Neutral grey used for steps recorded without an owning method.
    pub const UNATTRIBUTED: ColorToken = ColorToken::rgb(128, 128, 128);
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Parses `#rrggbb` or `rgb(r, g, b)` literals.
impl FromStr for ColorToken {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let literal = s.trim();
        let invalid = || CoreError::InvalidColor {
            literal: s.to_string(),
        };

        if let Some(hex) = literal.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(invalid());
            }
            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
            };
            return Ok(ColorToken::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?));
        }

        let inner = literal
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let channels = inner
            .split(',')
            .map(|part| part.trim().parse::<u8>().map_err(|_| invalid()))
            .collect::<Result<Vec<u8>, CoreError>>()?;
        match channels.as_slice() {
            [r, g, b] => Ok(ColorToken::rgb(*r, *g, *b)),
            _ => Err(invalid()),
        }
    }
}

/// The built-in palette: blue, green, red, navy.
pub const DEFAULT_PALETTE: [ColorToken; 4] = [
    ColorToken::rgb(0, 136, 255),
    ColorToken::rgb(0, 200, 0),
    ColorToken::rgb(200, 0, 0),
    ColorToken::rgb(0, 0, 200),
];

/// Hands out palette colors in order, then random RGB triples.
#[derive(Debug, Clone)]
pub struct ColorAllocator {
    palette: Vec<ColorToken>,
    cursor: usize,
    rng: ChaCha8Rng,
}

impl Default for ColorAllocator {
    fn default() -> Self {
        ColorAllocator::new(DEFAULT_PALETTE.to_vec())
    }
}

impl ColorAllocator {
    /// Creates an allocator whose random phase is seeded from OS entropy.
    pub fn new(palette: Vec<ColorToken>) -> Self {
        ColorAllocator {
            palette,
            cursor: 0,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Creates an allocator with a deterministic random phase.
    pub fn seeded(palette: Vec<ColorToken>, seed: u64) -> Self {
        ColorAllocator {
            palette,
            cursor: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Returns the next color token.
    pub fn next_color(&mut self) -> ColorToken {
        let position = self.cursor;
        self.cursor += 1;
        match self.palette.get(position) {
            Some(color) => *color,
            None => ColorToken::rgb(self.rng.gen(), self.rng.gen(), self.rng.gen()),
        }
    }

    /// Number of tokens handed out so far.
    pub fn allocated(&self) -> usize {
        self.cursor
    }

    /// Returns `true` once every palette entry has been handed out.
    pub fn palette_exhausted(&self) -> bool {
        self.cursor >= self.palette.len()
    }

    pub fn palette(&self) -> &[ColorToken] {
        &self.palette
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_phase_returns_entries_in_order() {
        let mut colors = ColorAllocator::default();
        let first: Vec<ColorToken> = (0..DEFAULT_PALETTE.len())
            .map(|_| colors.next_color())
            .collect();
        assert_eq!(first, DEFAULT_PALETTE.to_vec());
        assert!(colors.palette_exhausted());
        assert_eq!(colors.allocated(), 4);
    }

    #[test]
    fn random_phase_is_reproducible_with_seed() {
        let mut a = ColorAllocator::seeded(vec![ColorToken::rgb(1, 2, 3)], 42);
        let mut b = ColorAllocator::seeded(vec![ColorToken::rgb(1, 2, 3)], 42);

        assert_eq!(a.next_color(), ColorToken::rgb(1, 2, 3));
        assert_eq!(b.next_color(), ColorToken::rgb(1, 2, 3));
        for _ in 0..8 {
            assert_eq!(a.next_color(), b.next_color());
        }
    }

    #[test]
    fn empty_palette_goes_straight_to_random() {
        let mut colors = ColorAllocator::seeded(Vec::new(), 7);
        assert!(colors.palette_exhausted());
        colors.next_color();
        assert_eq!(colors.allocated(), 1);
    }

    #[test]
    fn parse_hex_and_rgb_literals() {
        assert_eq!("#0088ff".parse::<ColorToken>(), Ok(ColorToken::rgb(0, 136, 255)));
        assert_eq!(
            "rgb(200, 0, 0)".parse::<ColorToken>(),
            Ok(ColorToken::rgb(200, 0, 0))
        );
        assert_eq!(
            " rgb(1,2,3) ".parse::<ColorToken>(),
            Ok(ColorToken::rgb(1, 2, 3))
        );
    }

    #[test]
    fn parse_rejects_malformed_literals() {
        for literal in ["", "#12345", "#gg0000", "rgb(1, 2)", "rgb(1, 2, 300)", "blue"] {
            assert_eq!(
                literal.parse::<ColorToken>(),
                Err(CoreError::InvalidColor {
                    literal: literal.to_string()
                }),
                "{literal}"
            );
        }
    }

    #[test]
    fn display_matches_css_rgb() {
        assert_eq!(ColorToken::rgb(0, 0, 200).to_string(), "rgb(0, 0, 200)");
    }
}
