use crate::model::hand::Hand;
use crate::model::player::PlayerHand;
use crate::model::settlement::Outcome;
use serde::{Deserialize, Serialize};

/// Dollar ledger for one round.
///
/// `payout` starts at `base_bet` (the opening stake is already on the table)
/// so the net result starts at zero. Stakes are stored on the
/// [`PlayerHand`] records the ledger is handed, keeping them aligned with the
/// hand list through every split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoutTracker {
    base_bet: f64,
    total_staked: f64,
    payout: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_staked: f64,
    pub payout: f64,
    pub net_result: f64,
}

impl PayoutTracker {
    pub fn new(base_bet: f64) -> Self {
        Self {
            base_bet,
            total_staked: base_bet,
            payout: base_bet,
        }
    }

    pub(crate) fn from_totals(base_bet: f64, total_staked: f64, payout: f64) -> Self {
        Self {
            base_bet,
            total_staked,
            payout,
        }
    }

    pub fn base_bet(&self) -> f64 {
        self.base_bet
    }

    pub fn total_staked(&self) -> f64 {
        self.total_staked
    }

    pub fn payout(&self) -> f64 {
        self.payout
    }

    /// The first hand of the round, carrying the opening stake.
    pub fn opening_hand(&self, cards: Hand) -> PlayerHand {
        PlayerHand::new(cards, self.base_bet)
    }

    /// Insert the second half of a split directly after `index` with a fresh
    /// base stake.
    pub fn on_split_at(&mut self, hands: &mut Vec<PlayerHand>, index: usize, cards: Hand) {
        hands.insert(index + 1, PlayerHand::new(cards, self.base_bet));
        self.total_staked += self.base_bet;
        self.payout += self.base_bet;
    }

    pub fn on_double(&mut self, hands: &mut [PlayerHand], index: usize) {
        let hand = &mut hands[index];
        self.payout += hand.stake;
        hand.stake *= 2.0;
        self.total_staked += self.base_bet;
    }

    /// Record `outcome` for hand `index` and return its dollar delta.
    pub fn settle(&mut self, hands: &mut [PlayerHand], index: usize, outcome: Outcome) -> f64 {
        let hand = &mut hands[index];
        let delta = hand.stake * outcome.multiplier();
        self.payout += delta;
        hand.outcome = Some(outcome);
        delta
    }

    pub fn profit(&self) -> f64 {
        self.payout - self.total_staked
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            total_staked: self.total_staked,
            payout: self.payout,
            net_result: self.profit(),
        }
    }
}
