use crate::model::hand::Hand;
use serde::{Deserialize, Serialize};

/// Result of comparing one player hand with the dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Blackjack,
    Push,
    Loss,
}

impl Outcome {
    /// Stake multiplier applied by the ledger, also the unit reward.
    pub const fn multiplier(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Blackjack => 1.5,
            Outcome::Push => 0.0,
            Outcome::Loss => -1.0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Blackjack => "blackjack",
            Outcome::Push => "push",
            Outcome::Loss => "loss",
        }
    }

    pub const fn is_win(self) -> bool {
        matches!(self, Outcome::Win | Outcome::Blackjack)
    }
}

/// Settle an unsplit hand after the dealer has finished drawing.
pub fn compare_hands(player: &Hand, dealer: &Hand) -> Outcome {
    let player_natural = player.is_natural();
    let dealer_natural = dealer.is_natural();
    if player_natural {
        return if dealer_natural {
            Outcome::Push
        } else {
            Outcome::Blackjack
        };
    }
    if dealer_natural || player.is_bust() {
        return Outcome::Loss;
    }
    compare_totals(player.total(), dealer.total())
}

/// Settle one hand of a split round. A two-card 21 here is not a natural:
/// it pays even money and only pushes against a dealer natural.
pub fn compare_split_hand(player: &Hand, dealer: &Hand) -> Outcome {
    if player.is_bust() {
        return Outcome::Loss;
    }
    if player.is_natural() {
        return if dealer.is_natural() {
            Outcome::Push
        } else {
            Outcome::Win
        };
    }
    compare_totals(player.total(), dealer.total())
}

fn compare_totals(player: u8, dealer: u8) -> Outcome {
    if dealer > 21 || player > dealer {
        Outcome::Win
    } else if player < dealer {
        Outcome::Loss
    } else {
        Outcome::Push
    }
}

fn default_limit() -> f64 {
    2.0
}

fn default_tau() -> f64 {
    2.0
}

/// How the per-hand outcomes of a split round are folded into the single
/// reward the agent sees. The dollar ledger is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitRewardMode {
    #[serde(rename = "avg")]
    Average,
    Sum,
    SumClip {
        #[serde(default = "default_limit")]
        limit: f64,
    },
    SumSqrt,
    SumTanh {
        #[serde(default = "default_tau")]
        tau: f64,
    },
}

impl Default for SplitRewardMode {
    fn default() -> Self {
        SplitRewardMode::SumClip {
            limit: default_limit(),
        }
    }
}

impl SplitRewardMode {
    pub fn aggregate(self, raw_sum: f64, hands: usize) -> f64 {
        let k = hands.max(1) as f64;
        match self {
            SplitRewardMode::Average => raw_sum / k,
            SplitRewardMode::Sum => raw_sum,
            SplitRewardMode::SumClip { limit } => {
                let limit = limit.abs();
                raw_sum.clamp(-limit, limit)
            }
            SplitRewardMode::SumSqrt => raw_sum / k.sqrt(),
            SplitRewardMode::SumTanh { tau } => {
                if tau == 0.0 {
                    0.0
                } else {
                    (raw_sum / tau).tanh() * tau
                }
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SplitRewardMode::Average => "avg",
            SplitRewardMode::Sum => "sum",
            SplitRewardMode::SumClip { .. } => "sum_clip",
            SplitRewardMode::SumSqrt => "sum_sqrt",
            SplitRewardMode::SumTanh { .. } => "sum_tanh",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Outcome, SplitRewardMode, compare_hands, compare_split_hand};
    use crate::model::card::Card;
    use crate::model::hand::Hand;
    use crate::model::rank::Rank;

    fn hand(ranks: &[Rank]) -> Hand {
        Hand::with_cards(ranks.iter().copied().map(Card::new).collect())
    }

    #[test]
    fn natural_beats_three_card_twenty_one() {
        let player = hand(&[Rank::Ace, Rank::Ten]);
        let dealer = hand(&[Rank::Seven, Rank::Four, Rank::Ten]);
        assert_eq!(compare_hands(&player, &dealer), Outcome::Blackjack);
    }

    #[test]
    fn dealer_natural_beats_player_twenty_one() {
        let player = hand(&[Rank::Seven, Rank::Four, Rank::Ten]);
        let dealer = hand(&[Rank::Ten, Rank::Ace]);
        assert_eq!(compare_hands(&player, &dealer), Outcome::Loss);
        let both = hand(&[Rank::Ace, Rank::Ten]);
        assert_eq!(compare_hands(&both, &dealer), Outcome::Push);
    }

    #[test]
    fn totals_decide_otherwise() {
        let dealer = hand(&[Rank::Ten, Rank::Seven]);
        assert_eq!(compare_hands(&hand(&[Rank::Ten, Rank::Eight]), &dealer), Outcome::Win);
        assert_eq!(compare_hands(&hand(&[Rank::Ten, Rank::Six]), &dealer), Outcome::Loss);
        assert_eq!(compare_hands(&hand(&[Rank::Ten, Rank::Seven]), &dealer), Outcome::Push);
        let busted_dealer = hand(&[Rank::Ten, Rank::Six, Rank::Nine]);
        assert_eq!(
            compare_hands(&hand(&[Rank::Ten, Rank::Two]), &busted_dealer),
            Outcome::Win
        );
    }

    #[test]
    fn split_twenty_one_pays_even_money() {
        let player = hand(&[Rank::Ace, Rank::Ten]);
        let dealer = hand(&[Rank::Ten, Rank::Nine]);
        assert_eq!(compare_split_hand(&player, &dealer), Outcome::Win);
        let dealer_natural = hand(&[Rank::Ace, Rank::Ten]);
        assert_eq!(compare_split_hand(&player, &dealer_natural), Outcome::Push);
    }

    #[test]
    fn split_bust_is_a_loss_even_when_dealer_busts() {
        let player = hand(&[Rank::Eight, Rank::Ten, Rank::Five]);
        let dealer = hand(&[Rank::Ten, Rank::Six, Rank::Ten]);
        assert_eq!(compare_split_hand(&player, &dealer), Outcome::Loss);
    }

    #[test]
    fn aggregation_modes() {
        assert_eq!(SplitRewardMode::Average.aggregate(3.0, 4), 0.75);
        assert_eq!(SplitRewardMode::Sum.aggregate(3.0, 4), 3.0);
        assert_eq!(SplitRewardMode::default().aggregate(3.0, 4), 2.0);
        assert_eq!(SplitRewardMode::default().aggregate(-4.0, 4), -2.0);
        assert_eq!(SplitRewardMode::SumSqrt.aggregate(3.0, 4), 1.5);
        let tanh = SplitRewardMode::SumTanh { tau: 2.0 }.aggregate(2.0, 2);
        assert!((tanh - 1.0f64.tanh() * 2.0).abs() < 1e-12);
    }

    #[test]
    fn mode_deserializes_with_defaults() {
        let mode: SplitRewardMode = serde_json::from_str(r#"{"mode":"sum_clip"}"#).unwrap();
        assert_eq!(mode, SplitRewardMode::SumClip { limit: 2.0 });
        let mode: SplitRewardMode = serde_json::from_str(r#"{"mode":"avg"}"#).unwrap();
        assert_eq!(mode, SplitRewardMode::Average);
        let mode: SplitRewardMode =
            serde_json::from_str(r#"{"mode":"sum_tanh","tau":3.0}"#).unwrap();
        assert_eq!(mode, SplitRewardMode::SumTanh { tau: 3.0 });
    }
}
