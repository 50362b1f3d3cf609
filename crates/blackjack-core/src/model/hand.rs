use crate::model::card::Card;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BLACKJACK: u8 = 21;

/// Cards in the order they were dealt. Totals are derived on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Self {
        Self { cards: Vec::new() }
    }

    pub fn with_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn add(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn first(&self) -> Option<Card> {
        self.cards.first().copied()
    }

    /// Best total: aces count 11 until that busts the hand, then drop to 1
    /// one at a time.
    pub fn total(&self) -> u8 {
        self.evaluate().0
    }

    /// At least one ace is still counted as 11.
    pub fn is_soft(&self) -> bool {
        self.evaluate().1 > 0
    }

    pub fn is_bust(&self) -> bool {
        self.total() > BLACKJACK
    }

    /// Exactly two cards: one ace and one ten-value.
    pub fn is_natural(&self) -> bool {
        match self.cards.as_slice() {
            [a, b] => (a.is_ace() && b.is_ten_value()) || (b.is_ace() && a.is_ten_value()),
            _ => false,
        }
    }

    /// Exactly two cards of equal rank.
    pub fn is_pair(&self) -> bool {
        matches!(self.cards.as_slice(), [a, b] if a.rank == b.rank)
    }

    fn evaluate(&self) -> (u8, u8) {
        let mut total: u32 = 0;
        let mut soft_aces: u8 = 0;
        for card in &self.cards {
            total += u32::from(card.value());
            if card.is_ace() {
                soft_aces += 1;
            }
        }
        while total > u32::from(BLACKJACK) && soft_aces > 0 {
            total -= 10;
            soft_aces -= 1;
        }
        (total.min(u32::from(u8::MAX)) as u8, soft_aces)
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, card) in self.cards.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{card}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::Hand;
    use crate::model::card::Card;
    use crate::model::rank::Rank;

    fn hand(ranks: &[Rank]) -> Hand {
        Hand::with_cards(ranks.iter().copied().map(Card::new).collect())
    }

    #[test]
    fn soft_ace_counts_eleven() {
        let h = hand(&[Rank::Ace, Rank::Six]);
        assert_eq!(h.total(), 17);
        assert!(h.is_soft());
    }

    #[test]
    fn ace_drops_to_one_to_avoid_bust() {
        let h = hand(&[Rank::Ace, Rank::Six, Rank::Nine]);
        assert_eq!(h.total(), 16);
        assert!(!h.is_soft());
        assert!(!h.is_bust());
    }

    #[test]
    fn multiple_aces_reduce_one_at_a_time() {
        let h = hand(&[Rank::Ace, Rank::Ace, Rank::Nine]);
        assert_eq!(h.total(), 21);
        assert!(h.is_soft());

        let h = hand(&[Rank::Ace, Rank::Ace, Rank::Ace, Rank::Ace]);
        assert_eq!(h.total(), 14);
        assert!(h.is_soft());
    }

    #[test]
    fn total_never_busts_while_an_ace_can_drop() {
        for extra in Rank::ORDERED {
            for other in Rank::ORDERED {
                let h = hand(&[Rank::Ace, extra, other]);
                let all_low: u32 = h
                    .iter()
                    .map(|c| if c.is_ace() { 1 } else { u32::from(c.value()) })
                    .sum();
                if all_low <= 21 {
                    assert!(h.total() <= 21, "{h} totals {}", h.total());
                }
            }
        }
    }

    #[test]
    fn natural_requires_two_cards() {
        assert!(hand(&[Rank::Ten, Rank::Ace]).is_natural());
        assert!(hand(&[Rank::Ace, Rank::Ten]).is_natural());
        assert!(!hand(&[Rank::Seven, Rank::Four, Rank::Ten]).is_natural());
        assert_eq!(hand(&[Rank::Seven, Rank::Four, Rank::Ten]).total(), 21);
    }

    #[test]
    fn bust_over_twenty_one() {
        assert!(hand(&[Rank::Ten, Rank::Nine, Rank::Five]).is_bust());
    }

    #[test]
    fn pair_requires_equal_ranks() {
        assert!(hand(&[Rank::Eight, Rank::Eight]).is_pair());
        assert!(!hand(&[Rank::Eight, Rank::Nine]).is_pair());
        assert!(!hand(&[Rank::Eight, Rank::Eight, Rank::Two]).is_pair());
    }

    #[test]
    fn display_lists_cards() {
        assert_eq!(hand(&[Rank::Ace, Rank::Ten]).to_string(), "[A 10]");
    }
}
