use crate::model::rank::Rank;
use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Card {
    pub rank: Rank,
}

impl Card {
    pub const fn new(rank: Rank) -> Self {
        Self { rank }
    }

    pub const fn value(self) -> u8 {
        self.rank.value()
    }

    pub const fn is_ace(self) -> bool {
        matches!(self.rank, Rank::Ace)
    }

    pub const fn is_ten_value(self) -> bool {
        matches!(self.rank, Rank::Ten)
    }

    pub const fn hi_lo_weight(self) -> i32 {
        self.rank.hi_lo_weight()
    }
}

impl From<Rank> for Card {
    fn from(rank: Rank) -> Self {
        Card::new(rank)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::{Card, Rank};

    #[test]
    fn ace_is_identified() {
        let card = Card::new(Rank::Ace);
        assert!(card.is_ace());
        assert!(!card.is_ten_value());
        assert_eq!(card.value(), 11);
        assert_eq!(card.hi_lo_weight(), -1);
    }

    #[test]
    fn serializes_as_bare_rank() {
        let json = serde_json::to_string(&Card::new(Rank::Ten)).unwrap();
        assert_eq!(json, "\"Ten\"");
        let back: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Card::new(Rank::Ten));
    }
}
