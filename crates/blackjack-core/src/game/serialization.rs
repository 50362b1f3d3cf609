use crate::model::hand::Hand;
use crate::model::payout::PayoutTracker;
use crate::model::player::PlayerHand;
use crate::model::round::{MAX_SPLITS, Round, RoundPhase, RoundRules};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot has no player hands")]
    EmptyHands,
    #[error("cursor {cursor} out of range for {hands} hands")]
    CursorOutOfRange { cursor: usize, hands: usize },
    #[error("split count {0} exceeds the table maximum")]
    TooManySplits(u8),
    #[error("dealer play is not a resumable phase")]
    DealerPlayPhase,
}

/// Everything needed to resume a round: hands with their stakes and
/// statuses, the dealer hand, the split counter and the ledger totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub hands: Vec<PlayerHand>,
    pub dealer: Hand,
    pub current_hand_index: usize,
    pub split_count: u8,
    pub phase: RoundPhase,
    pub base_bet: f64,
    pub total_staked: f64,
    pub payout: f64,
    #[serde(default)]
    pub rules: RoundRules,
    #[serde(default)]
    pub true_count_at_deal: f64,
}

impl RoundSnapshot {
    pub fn capture(round: &Round) -> Self {
        let ledger = round.ledger();
        RoundSnapshot {
            version: SNAPSHOT_VERSION,
            hands: round.hands().to_vec(),
            dealer: round.dealer().clone(),
            current_hand_index: round.current_hand_index(),
            split_count: round.split_count(),
            phase: round.phase(),
            base_bet: ledger.base_bet(),
            total_staked: ledger.total_staked(),
            payout: ledger.payout(),
            rules: round.rules(),
            true_count_at_deal: round.true_count_at_deal(),
        }
    }

    pub fn restore(self) -> Result<Round, SnapshotError> {
        if self.hands.is_empty() {
            return Err(SnapshotError::EmptyHands);
        }
        if self.current_hand_index >= self.hands.len() {
            return Err(SnapshotError::CursorOutOfRange {
                cursor: self.current_hand_index,
                hands: self.hands.len(),
            });
        }
        match self.phase {
            RoundPhase::Acting { hand_index } if hand_index != self.current_hand_index => {
                return Err(SnapshotError::CursorOutOfRange {
                    cursor: hand_index,
                    hands: self.hands.len(),
                });
            }
            // Only exists while the round settles itself.
            RoundPhase::DealerPlay => return Err(SnapshotError::DealerPlayPhase),
            _ => {}
        }
        if self.split_count > MAX_SPLITS {
            return Err(SnapshotError::TooManySplits(self.split_count));
        }
        let ledger = PayoutTracker::from_totals(self.base_bet, self.total_staked, self.payout);
        Ok(Round::from_parts(
            self.hands,
            self.dealer,
            self.current_hand_index,
            self.split_count,
            self.phase,
            ledger,
            self.rules,
            self.true_count_at_deal,
        ))
    }

    pub fn to_json(round: &Round) -> serde_json::Result<String> {
        let snapshot = Self::capture(round);
        serde_json::to_string_pretty(&snapshot)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
