use crate::model::hand::Hand;
use crate::model::settlement::Outcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandStatus {
    Active,
    Stood,
    Doubled,
    Busted,
    Forfeited,
}

impl HandStatus {
    pub const fn is_finished(self) -> bool {
        !matches!(self, HandStatus::Active)
    }
}

/// One seat position in `Round::hands`: the cards together with the stake
/// riding on them, so a split insertion moves both at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerHand {
    pub cards: Hand,
    pub stake: f64,
    pub status: HandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl PlayerHand {
    pub fn new(cards: Hand, stake: f64) -> Self {
        Self {
            cards,
            stake,
            status: HandStatus::Active,
            outcome: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.is_some()
    }

    /// Dollar result of this hand once settled.
    pub fn realized(&self) -> Option<f64> {
        self.outcome.map(|outcome| self.stake * outcome.multiplier())
    }
}
