use core::fmt;
use serde::{Deserialize, Serialize};

/// Blackjack ranks. Jacks, queens and kings are folded into `Ten`; a
/// single deck therefore carries sixteen ten-valued cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rank {
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Ace = 11,
}

impl Rank {
    pub const ORDERED: [Rank; 10] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Ace,
    ];

    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            2 => Some(Rank::Two),
            3 => Some(Rank::Three),
            4 => Some(Rank::Four),
            5 => Some(Rank::Five),
            6 => Some(Rank::Six),
            7 => Some(Rank::Seven),
            8 => Some(Rank::Eight),
            9 => Some(Rank::Nine),
            10 => Some(Rank::Ten),
            1 | 11 => Some(Rank::Ace),
            _ => None,
        }
    }

    /// Hard value of the rank; aces report 11 and are reduced by [`Hand`](super::hand::Hand).
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Position of this rank in the 2..=11 distribution buckets.
    pub const fn bucket(self) -> usize {
        (self as u8 - 2) as usize
    }

    /// Copies of this rank in one 52-card deck.
    pub const fn copies_per_deck(self) -> usize {
        match self {
            Rank::Ten => 16,
            _ => 4,
        }
    }

    /// Hi-Lo tag: low cards +1, neutral 0, tens and aces -1.
    pub const fn hi_lo_weight(self) -> i32 {
        match self {
            Rank::Two | Rank::Three | Rank::Four | Rank::Five | Rank::Six => 1,
            Rank::Seven | Rank::Eight | Rank::Nine => 0,
            Rank::Ten | Rank::Ace => -1,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Ace => f.write_str("A"),
            other => write!(f, "{}", other.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Rank;

    #[test]
    fn from_value_maps() {
        assert_eq!(Rank::from_value(10), Some(Rank::Ten));
        assert_eq!(Rank::from_value(1), Some(Rank::Ace));
        assert_eq!(Rank::from_value(11), Some(Rank::Ace));
        assert_eq!(Rank::from_value(12), None);
    }

    #[test]
    fn display_matches_symbols() {
        assert_eq!(Rank::Ace.to_string(), "A");
        assert_eq!(Rank::Ten.to_string(), "10");
        assert_eq!(Rank::Seven.to_string(), "7");
    }

    #[test]
    fn deck_composition_totals_fifty_two() {
        let total: usize = Rank::ORDERED.iter().map(|r| r.copies_per_deck()).sum();
        assert_eq!(total, 52);
    }

    #[test]
    fn hi_lo_tags_balance_over_a_deck() {
        let balance: i32 = Rank::ORDERED
            .iter()
            .map(|r| r.hi_lo_weight() * r.copies_per_deck() as i32)
            .sum();
        assert_eq!(balance, 0);
    }
}
