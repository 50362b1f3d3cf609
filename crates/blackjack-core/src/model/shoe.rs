use crate::model::card::Card;
use crate::model::rank::Rank;
use crate::model::round::MAX_SPLITS;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::debug;

pub const CARDS_PER_DECK: usize = 52;
pub const DEFAULT_DECKS: usize = 6;
pub const DEFAULT_PENETRATION: f64 = 0.25;
/// Value buckets 2..=11 reported by [`Shoe::distribution`].
pub const DISTRIBUTION_BUCKETS: usize = 10;
/// Cards a single round can consume: every hand a full split sequence
/// produces plus the dealer, eleven cards each (A A A A 2 2 2 2 3 3 3).
pub const MIN_RESHUFFLE_CARDS: usize = (MAX_SPLITS as usize + 2) * 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShoeError {
    #[error("shoe exhausted: no cards left to draw")]
    Exhausted,
}

/// Multi-deck pool of cards. The top of the shoe is the end of `cards`.
#[derive(Debug, Clone)]
pub struct Shoe {
    cards: Vec<Card>,
    decks: usize,
    penetration: f64,
    rng: StdRng,
    reshuffles: u64,
    floor: usize,
}

impl Shoe {
    pub fn new(decks: usize, penetration: f64) -> Self {
        Self::with_seed(decks, penetration, rand::random())
    }

    pub fn with_seed(decks: usize, penetration: f64, seed: u64) -> Self {
        let decks = decks.max(1);
        let mut shoe = Self {
            cards: Vec::new(),
            decks,
            penetration: penetration.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
            reshuffles: 0,
            floor: MIN_RESHUFFLE_CARDS.min(decks * CARDS_PER_DECK),
        };
        shoe.refill();
        shoe
    }

    /// Build a shoe that deals `cards` in the given order. Penetration and the
    /// reshuffle floor are zero so the stack is only replaced once it runs dry.
    pub fn stacked(cards: Vec<Card>) -> Self {
        let decks = cards.len().div_ceil(CARDS_PER_DECK).max(1);
        let mut cards = cards;
        cards.reverse();
        Self {
            cards,
            decks,
            penetration: 0.0,
            rng: StdRng::seed_from_u64(0),
            reshuffles: 0,
            floor: 0,
        }
    }

    pub fn decks(&self) -> usize {
        self.decks
    }

    pub fn penetration(&self) -> f64 {
        self.penetration
    }

    pub fn capacity(&self) -> usize {
        self.decks * CARDS_PER_DECK
    }

    pub fn remaining_count(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Number of full regenerations since construction.
    pub fn reshuffles(&self) -> u64 {
        self.reshuffles
    }

    /// Remaining cards, top of the shoe last.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn try_draw(&mut self) -> Result<Card, ShoeError> {
        self.cards.pop().ok_or(ShoeError::Exhausted)
    }

    /// Remove the top card.
    ///
    /// # Panics
    /// Panics when the shoe is empty. Rounds only start after
    /// [`maybe_reshuffle`](Self::maybe_reshuffle), so running dry mid-round is
    /// a broken invariant rather than a recoverable condition.
    pub fn draw(&mut self) -> Card {
        match self.try_draw() {
            Ok(card) => card,
            Err(err) => panic!("{err} ({} decks)", self.decks),
        }
    }

    /// True at the cut card, or when fewer than [`MIN_RESHUFFLE_CARDS`] remain
    /// (capped at the shoe's capacity) so a round is never dealt from a shoe
    /// that cannot finish it.
    pub fn needs_reshuffle(&self) -> bool {
        let remaining = self.remaining_count();
        remaining < self.floor || remaining as f64 <= self.penetration * self.capacity() as f64
    }

    /// Regenerate the whole shoe when the cut card has been reached. The
    /// remaining cards are discarded, not topped up.
    pub fn maybe_reshuffle(&mut self) -> bool {
        if !self.needs_reshuffle() {
            return false;
        }
        debug!(
            target: "blackjack_core::shoe",
            remaining = self.remaining_count(),
            decks = self.decks,
            "reshuffling shoe"
        );
        self.refill();
        self.reshuffles += 1;
        true
    }

    /// Per-bucket remaining counts for values 2..=11.
    pub fn counts(&self) -> [usize; DISTRIBUTION_BUCKETS] {
        let mut counts = [0usize; DISTRIBUTION_BUCKETS];
        for card in &self.cards {
            counts[card.rank.bucket()] += 1;
        }
        counts
    }

    /// Fraction of the remaining cards in each value bucket 2..=11. All zero
    /// for an empty shoe.
    pub fn distribution(&self) -> [f64; DISTRIBUTION_BUCKETS] {
        let total = self.remaining_count();
        let mut fractions = [0.0f64; DISTRIBUTION_BUCKETS];
        if total == 0 {
            return fractions;
        }
        for (slot, count) in fractions.iter_mut().zip(self.counts()) {
            *slot = count as f64 / total as f64;
        }
        fractions
    }

    /// Hi-Lo running count of the cards already dealt, derived from what is
    /// left: a remaining low card means one fewer was dealt.
    pub fn running_count(&self) -> i32 {
        -self.cards.iter().map(|c| c.hi_lo_weight()).sum::<i32>()
    }

    pub fn decks_remaining(&self) -> f64 {
        self.remaining_count() as f64 / CARDS_PER_DECK as f64
    }

    pub fn true_count(&self) -> f64 {
        let decks_remaining = self.decks_remaining();
        if decks_remaining > 0.0 {
            f64::from(self.running_count()) / decks_remaining
        } else {
            0.0
        }
    }

    fn refill(&mut self) {
        let mut cards = Vec::with_capacity(self.capacity());
        for rank in Rank::ORDERED {
            for _ in 0..rank.copies_per_deck() * self.decks {
                cards.push(Card::new(rank));
            }
        }
        cards.shuffle(&mut self.rng);
        self.cards = cards;
    }
}

#[cfg(test)]
mod tests {
    use super::{CARDS_PER_DECK, MIN_RESHUFFLE_CARDS, Shoe, ShoeError};
    use crate::model::card::Card;
    use crate::model::rank::Rank;

    #[test]
    fn fresh_shoe_is_full_and_balanced() {
        let shoe = Shoe::with_seed(6, 0.25, 7);
        assert_eq!(shoe.remaining_count(), 6 * CARDS_PER_DECK);
        assert_eq!(shoe.running_count(), 0);
        assert_eq!(shoe.true_count(), 0.0);
        let counts = shoe.counts();
        assert_eq!(counts[Rank::Ten.bucket()], 6 * 16);
        assert_eq!(counts[Rank::Ace.bucket()], 6 * 4);
    }

    #[test]
    fn shuffle_with_seed_is_deterministic() {
        let a = Shoe::with_seed(2, 0.25, 42);
        let b = Shoe::with_seed(2, 0.25, 42);
        assert_eq!(a.cards(), b.cards());
        let c = Shoe::with_seed(2, 0.25, 43);
        assert_ne!(a.cards(), c.cards());
    }

    #[test]
    fn stacked_shoe_deals_in_order() {
        let mut shoe = Shoe::stacked(vec![Card::new(Rank::Two), Card::new(Rank::Ace)]);
        assert_eq!(shoe.draw(), Card::new(Rank::Two));
        assert_eq!(shoe.draw(), Card::new(Rank::Ace));
        assert_eq!(shoe.try_draw(), Err(ShoeError::Exhausted));
    }

    #[test]
    #[should_panic(expected = "shoe exhausted")]
    fn drawing_from_empty_shoe_panics() {
        let mut shoe = Shoe::stacked(Vec::new());
        let _ = shoe.draw();
    }

    #[test]
    fn distribution_sums_to_one_while_draining() {
        let mut shoe = Shoe::with_seed(1, 0.0, 3);
        while !shoe.is_empty() {
            let sum: f64 = shoe.distribution().iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "sum was {sum}");
            shoe.draw();
        }
        assert_eq!(shoe.distribution(), [0.0; 10]);
    }

    #[test]
    fn running_count_tracks_dealt_cards() {
        let mut shoe = Shoe::stacked(vec![
            Card::new(Rank::Five),
            Card::new(Rank::Two),
            Card::new(Rank::Ten),
            Card::new(Rank::Ace),
            Card::new(Rank::Eight),
        ]);
        // Remaining: 5, 2, 10, A, 8 -> tags +1 +1 -1 -1 0 -> count of dealt = 0.
        assert_eq!(shoe.running_count(), 0);
        shoe.draw();
        shoe.draw();
        // Two low cards dealt.
        assert_eq!(shoe.running_count(), 2);
        let expected = 2.0 / (3.0 / 52.0);
        assert!((shoe.true_count() - expected).abs() < 1e-9);
    }

    #[test]
    fn reshuffle_replaces_entire_shoe_at_penetration() {
        let mut shoe = Shoe::with_seed(1, 0.25, 11);
        assert!(!shoe.maybe_reshuffle());
        while shoe.remaining_count() > 13 {
            shoe.draw();
        }
        assert!(shoe.needs_reshuffle());
        assert!(shoe.maybe_reshuffle());
        assert_eq!(shoe.remaining_count(), CARDS_PER_DECK);
        assert_eq!(shoe.reshuffles(), 1);
    }

    #[test]
    fn remaining_above_threshold_is_kept() {
        let mut shoe = Shoe::with_seed(6, 0.25, 11);
        while shoe.remaining_count() > 79 {
            shoe.draw();
        }
        let before = shoe.cards().to_vec();
        assert!(!shoe.maybe_reshuffle());
        assert_eq!(shoe.cards(), before.as_slice());
    }

    #[test]
    fn reshuffles_below_round_floor_even_without_penetration() {
        let mut shoe = Shoe::with_seed(6, 0.0, 19);
        while shoe.remaining_count() > MIN_RESHUFFLE_CARDS {
            shoe.draw();
        }
        assert!(!shoe.needs_reshuffle());
        shoe.draw();
        assert!(shoe.needs_reshuffle());
        assert!(shoe.maybe_reshuffle());
        assert_eq!(shoe.remaining_count(), 6 * CARDS_PER_DECK);
    }

    #[test]
    fn small_shoe_reshuffles_before_every_round() {
        let mut shoe = Shoe::with_seed(1, 0.0, 23);
        assert!(!shoe.needs_reshuffle());
        shoe.draw();
        assert!(shoe.maybe_reshuffle());
        assert_eq!(shoe.remaining_count(), CARDS_PER_DECK);
    }

    #[test]
    fn stacked_shoe_has_no_floor() {
        let shoe = Shoe::stacked(vec![Card::new(Rank::Nine); 4]);
        assert!(!shoe.needs_reshuffle());
    }
}
