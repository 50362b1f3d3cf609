use blackjack_core::model::round::Round;
use blackjack_core::model::shoe::{DISTRIBUTION_BUCKETS, Shoe};
use serde::{Deserialize, Serialize};

/// Observation schema version, bumped whenever the feature layout changes.
pub const SCHEMA_VERSION: &str = "blackjack-obs/1";

/// Playing observation layout:
///
/// | index | feature                                   |
/// |-------|-------------------------------------------|
/// | 0     | cards in the current hand                 |
/// | 1     | hand total                                |
/// | 2     | soft flag                                 |
/// | 3     | dealer upcard value (ace = 11)            |
/// | 4     | split legal                               |
/// | 5     | double legal                              |
/// | 6-15  | remaining-shoe fraction for values 2..=11 |
/// | 16    | true count clipped to +-8, divided by 8   |
pub const FEATURE_DIM: usize = 17;

/// Index of the normalised true count in the playing observation.
pub const TRUE_COUNT_FEATURE: usize = 16;

/// Divisor applied to the clipped true count.
pub const TRUE_COUNT_SCALE: f64 = 8.0;

/// Distribution plus running count, true count, decks and cards remaining.
pub const BETTING_FEATURE_DIM: usize = DISTRIBUTION_BUCKETS + 4;

const DISTRIBUTION_OFFSET: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub num_cards: f32,
    pub total: f32,
    pub is_soft: f32,
    pub dealer_value: f32,
    pub can_split: f32,
    pub can_double: f32,
    pub distribution: [f32; DISTRIBUTION_BUCKETS],
    pub true_count: f32,
}

impl Observation {
    pub fn as_array(&self) -> [f32; FEATURE_DIM] {
        let mut arr = [0.0f32; FEATURE_DIM];
        arr[0] = self.num_cards;
        arr[1] = self.total;
        arr[2] = self.is_soft;
        arr[3] = self.dealer_value;
        arr[4] = self.can_split;
        arr[5] = self.can_double;
        arr[DISTRIBUTION_OFFSET..DISTRIBUTION_OFFSET + DISTRIBUTION_BUCKETS]
            .copy_from_slice(&self.distribution);
        arr[TRUE_COUNT_FEATURE] = self.true_count;
        arr
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.as_array().to_vec()
    }

    /// Inverse of [`as_array`](Self::as_array); `None` on a length mismatch.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        if values.len() != FEATURE_DIM {
            return None;
        }
        let mut distribution = [0.0f32; DISTRIBUTION_BUCKETS];
        distribution.copy_from_slice(
            &values[DISTRIBUTION_OFFSET..DISTRIBUTION_OFFSET + DISTRIBUTION_BUCKETS],
        );
        Some(Self {
            num_cards: values[0],
            total: values[1],
            is_soft: values[2],
            dealer_value: values[3],
            can_split: values[4],
            can_double: values[5],
            distribution,
            true_count: values[TRUE_COUNT_FEATURE],
        })
    }

    /// True count recovered from the normalised feature (clipped to +-8).
    pub fn clipped_true_count(&self) -> f64 {
        f64::from(self.true_count) * TRUE_COUNT_SCALE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BettingObservation {
    pub distribution: [f32; DISTRIBUTION_BUCKETS],
    pub running_count: f32,
    pub true_count: f32,
    pub decks_remaining: f32,
    pub cards_remaining: f32,
}

impl BettingObservation {
    pub fn as_array(&self) -> [f32; BETTING_FEATURE_DIM] {
        let mut arr = [0.0f32; BETTING_FEATURE_DIM];
        arr[..DISTRIBUTION_BUCKETS].copy_from_slice(&self.distribution);
        arr[DISTRIBUTION_BUCKETS] = self.running_count;
        arr[DISTRIBUTION_BUCKETS + 1] = self.true_count;
        arr[DISTRIBUTION_BUCKETS + 2] = self.decks_remaining;
        arr[DISTRIBUTION_BUCKETS + 3] = self.cards_remaining;
        arr
    }
}

/// Builds observations from a round and the shoe it draws from.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObservationBuilder;

impl ObservationBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, round: &Round, shoe: &Shoe) -> Observation {
        let hand = &round.current_hand().cards;
        let dealer_value = round
            .dealer_upcard()
            .map(|card| f32::from(card.value()))
            .unwrap_or(0.0);
        let clipped = shoe.true_count().clamp(-TRUE_COUNT_SCALE, TRUE_COUNT_SCALE);

        Observation {
            num_cards: hand.len() as f32,
            total: f32::from(hand.total()),
            is_soft: flag(hand.is_soft()),
            dealer_value,
            can_split: flag(round.can_split()),
            can_double: flag(round.can_double()),
            distribution: encode_distribution(shoe),
            true_count: (clipped / TRUE_COUNT_SCALE) as f32,
        }
    }

    pub fn build_betting(&self, shoe: &Shoe) -> BettingObservation {
        BettingObservation {
            distribution: encode_distribution(shoe),
            running_count: shoe.running_count() as f32,
            true_count: shoe.true_count() as f32,
            decks_remaining: shoe.decks_remaining() as f32,
            cards_remaining: shoe.remaining_count() as f32,
        }
    }
}

fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

fn encode_distribution(shoe: &Shoe) -> [f32; DISTRIBUTION_BUCKETS] {
    shoe.distribution().map(|fraction| fraction as f32)
}
