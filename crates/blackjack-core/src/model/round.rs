use crate::model::action::Action;
use crate::model::card::Card;
use crate::model::hand::Hand;
use crate::model::payout::PayoutTracker;
use crate::model::player::{HandStatus, PlayerHand};
use crate::model::settlement::{Outcome, SplitRewardMode, compare_hands, compare_split_hand};
use crate::model::shoe::Shoe;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub const MAX_SPLITS: u8 = 4;
pub const MAX_HANDS: usize = 8;
pub const DEALER_STANDS_ON: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RoundPhase {
    Acting { hand_index: usize },
    DealerPlay,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RoundRules {
    #[serde(default)]
    pub split_reward: SplitRewardMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForfeitReason {
    InvalidCode(u8),
    DoubleNotAllowed,
    SplitNotAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    /// Sum of the per-hand unit outcomes, busts included.
    pub raw_sum: f64,
    pub hands_played: usize,
    pub dealer_total: u8,
    pub dealer_played: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StepEvent {
    Continue,
    NextHand { hand_index: usize },
    Split { hand_index: usize },
    RoundOver(Settlement),
    Forfeited { reason: ForfeitReason },
    AlreadyDone,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub reward: f64,
    pub done: bool,
    pub event: StepEvent,
}

impl StepOutcome {
    fn pending(event: StepEvent) -> Self {
        Self {
            reward: 0.0,
            done: false,
            event,
        }
    }
}

/// One round at a single seat: the player's hand list (grown by splits),
/// the dealer hand and the round ledger.
#[derive(Debug, Clone)]
pub struct Round {
    hands: Vec<PlayerHand>,
    dealer: Hand,
    cursor: usize,
    split_count: u8,
    phase: RoundPhase,
    ledger: PayoutTracker,
    rules: RoundRules,
    true_count_at_deal: f64,
}

impl Round {
    /// Check the shoe's cut card, then deal player, player, dealer, dealer.
    pub fn deal(shoe: &mut Shoe, base_bet: f64, rules: RoundRules) -> Self {
        let reshuffled = shoe.maybe_reshuffle();
        let true_count_at_deal = shoe.true_count();
        let first = shoe.draw();
        let second = shoe.draw();
        let dealer_first = shoe.draw();
        let dealer_second = shoe.draw();

        let ledger = PayoutTracker::new(base_bet);
        let hands = vec![ledger.opening_hand(Hand::with_cards(vec![first, second]))];
        let dealer = Hand::with_cards(vec![dealer_first, dealer_second]);

        debug!(
            target: "blackjack_core::round",
            player = %hands[0].cards,
            upcard = %dealer_first,
            base_bet,
            true_count = true_count_at_deal,
            reshuffled,
            "round dealt"
        );

        Self {
            hands,
            dealer,
            cursor: 0,
            split_count: 0,
            phase: RoundPhase::Acting { hand_index: 0 },
            ledger,
            rules,
            true_count_at_deal,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        hands: Vec<PlayerHand>,
        dealer: Hand,
        cursor: usize,
        split_count: u8,
        phase: RoundPhase,
        ledger: PayoutTracker,
        rules: RoundRules,
        true_count_at_deal: f64,
    ) -> Self {
        Self {
            hands,
            dealer,
            cursor,
            split_count,
            phase,
            ledger,
            rules,
            true_count_at_deal,
        }
    }

    pub fn hands(&self) -> &[PlayerHand] {
        &self.hands
    }

    pub fn current_hand_index(&self) -> usize {
        self.cursor
    }

    pub fn current_hand(&self) -> &PlayerHand {
        &self.hands[self.cursor]
    }

    pub fn dealer(&self) -> &Hand {
        &self.dealer
    }

    pub fn dealer_upcard(&self) -> Option<Card> {
        self.dealer.first()
    }

    pub fn split_count(&self) -> u8 {
        self.split_count
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, RoundPhase::Settled)
    }

    pub fn ledger(&self) -> &PayoutTracker {
        &self.ledger
    }

    pub fn rules(&self) -> RoundRules {
        self.rules
    }

    /// True count of the shoe at the moment the round was dealt.
    pub fn true_count_at_deal(&self) -> f64 {
        self.true_count_at_deal
    }

    pub fn can_double(&self) -> bool {
        !self.is_done() && self.current_hand().cards.len() == 2
    }

    pub fn can_split(&self) -> bool {
        !self.is_done()
            && self.current_hand().cards.is_pair()
            && self.split_count < MAX_SPLITS
            && self.hands.len() < MAX_HANDS
    }

    /// Legal actions for the current hand; empty once the round is settled.
    pub fn legal_actions(&self) -> Vec<Action> {
        if self.is_done() {
            return Vec::new();
        }
        let mut actions = vec![Action::Hit, Action::Stand];
        if self.can_double() {
            actions.push(Action::Double);
        }
        if self.can_split() {
            actions.push(Action::Split);
        }
        actions
    }

    /// Apply a raw action code. Codes outside 0..=3 forfeit the round.
    pub fn apply_code(&mut self, code: u8, shoe: &mut Shoe) -> StepOutcome {
        if self.is_done() {
            return already_done();
        }
        match Action::from_code(code) {
            Some(action) => self.apply(action, shoe),
            None => self.forfeit(ForfeitReason::InvalidCode(code)),
        }
    }

    pub fn apply(&mut self, action: Action, shoe: &mut Shoe) -> StepOutcome {
        let index = match self.phase {
            RoundPhase::Acting { hand_index } => hand_index,
            RoundPhase::DealerPlay | RoundPhase::Settled => return already_done(),
        };
        trace!(target: "blackjack_core::round", hand = index, %action, "apply");

        match action {
            Action::Hit => self.hit(index, shoe),
            Action::Stand => {
                self.hands[index].status = HandStatus::Stood;
                self.advance(index, shoe)
            }
            Action::Double => {
                if !self.can_double() {
                    return self.forfeit(ForfeitReason::DoubleNotAllowed);
                }
                self.double(index, shoe)
            }
            Action::Split => {
                if !self.can_split() {
                    return self.forfeit(ForfeitReason::SplitNotAllowed);
                }
                self.split(index, shoe)
            }
        }
    }

    /// End the round immediately: the current hand loses, hands not yet
    /// compared against the dealer are returned as pushes.
    pub fn forfeit(&mut self, reason: ForfeitReason) -> StepOutcome {
        if self.is_done() {
            return already_done();
        }
        let index = self.cursor;
        self.hands[index].status = HandStatus::Forfeited;
        self.ledger.settle(&mut self.hands, index, Outcome::Loss);
        for other in 0..self.hands.len() {
            if !self.hands[other].is_settled() {
                self.ledger.settle(&mut self.hands, other, Outcome::Push);
            }
        }
        self.phase = RoundPhase::Settled;
        debug!(
            target: "blackjack_core::round",
            ?reason,
            hand = index,
            net = self.ledger.profit(),
            "round forfeited"
        );
        StepOutcome {
            reward: Outcome::Loss.multiplier(),
            done: true,
            event: StepEvent::Forfeited { reason },
        }
    }

    fn hit(&mut self, index: usize, shoe: &mut Shoe) -> StepOutcome {
        let card = shoe.draw();
        self.hands[index].cards.add(card);
        if self.hands[index].cards.is_bust() {
            self.bust(index);
            return self.advance(index, shoe);
        }
        StepOutcome::pending(StepEvent::Continue)
    }

    fn double(&mut self, index: usize, shoe: &mut Shoe) -> StepOutcome {
        let card = shoe.draw();
        self.hands[index].cards.add(card);
        self.ledger.on_double(&mut self.hands, index);
        if self.hands[index].cards.is_bust() {
            self.bust(index);
        } else {
            self.hands[index].status = HandStatus::Doubled;
        }
        self.advance(index, shoe)
    }

    fn split(&mut self, index: usize, shoe: &mut Shoe) -> StepOutcome {
        let (left, right) = match self.hands[index].cards.cards() {
            [left, right] => (*left, *right),
            _ => return self.forfeit(ForfeitReason::SplitNotAllowed),
        };
        let first = Hand::with_cards(vec![left, shoe.draw()]);
        let second = Hand::with_cards(vec![right, shoe.draw()]);
        self.hands[index].cards = first;
        self.ledger.on_split_at(&mut self.hands, index, second);
        self.split_count += 1;
        debug!(
            target: "blackjack_core::round",
            hand = index,
            splits = self.split_count,
            hands = self.hands.len(),
            "hand split"
        );
        StepOutcome::pending(StepEvent::Split { hand_index: index })
    }

    fn bust(&mut self, index: usize) {
        self.hands[index].status = HandStatus::Busted;
        self.ledger.settle(&mut self.hands, index, Outcome::Loss);
    }

    fn advance(&mut self, index: usize, shoe: &mut Shoe) -> StepOutcome {
        let next = (index + 1..self.hands.len()).find(|&i| !self.hands[i].status.is_finished());
        match next {
            Some(hand_index) => {
                self.cursor = hand_index;
                self.phase = RoundPhase::Acting { hand_index };
                StepOutcome::pending(StepEvent::NextHand { hand_index })
            }
            None => self.finish(shoe),
        }
    }

    fn finish(&mut self, shoe: &mut Shoe) -> StepOutcome {
        self.phase = RoundPhase::DealerPlay;
        let dealer_played = self
            .hands
            .iter()
            .any(|hand| hand.status != HandStatus::Busted);
        if dealer_played {
            self.play_dealer(shoe);
        }

        let split_round = self.split_count > 0;
        for index in 0..self.hands.len() {
            if self.hands[index].is_settled() {
                continue;
            }
            let outcome = if split_round {
                compare_split_hand(&self.hands[index].cards, &self.dealer)
            } else {
                compare_hands(&self.hands[index].cards, &self.dealer)
            };
            self.ledger.settle(&mut self.hands, index, outcome);
        }

        let raw_sum: f64 = self
            .hands
            .iter()
            .filter_map(|hand| hand.outcome)
            .map(Outcome::multiplier)
            .sum();
        let hands_played = self.hands.len();
        let reward = if split_round {
            self.rules.split_reward.aggregate(raw_sum, hands_played)
        } else {
            raw_sum
        };
        self.phase = RoundPhase::Settled;

        let settlement = Settlement {
            raw_sum,
            hands_played,
            dealer_total: self.dealer.total(),
            dealer_played,
        };
        debug!(
            target: "blackjack_core::round",
            dealer = %self.dealer,
            raw_sum,
            reward,
            hands = hands_played,
            net = self.ledger.profit(),
            "round settled"
        );
        StepOutcome {
            reward,
            done: true,
            event: StepEvent::RoundOver(settlement),
        }
    }

    fn play_dealer(&mut self, shoe: &mut Shoe) {
        while self.dealer.total() < DEALER_STANDS_ON {
            self.dealer.add(shoe.draw());
        }
        trace!(
            target: "blackjack_core::round",
            dealer = %self.dealer,
            total = self.dealer.total(),
            "dealer finished"
        );
    }
}

fn already_done() -> StepOutcome {
    StepOutcome {
        reward: 0.0,
        done: true,
        event: StepEvent::AlreadyDone,
    }
}

#[cfg(test)]
mod tests {
    use super::{Round, RoundPhase, RoundRules, StepEvent};
    use crate::model::action::Action;
    use crate::model::card::Card;
    use crate::model::player::HandStatus;
    use crate::model::rank::Rank;
    use crate::model::shoe::Shoe;

    fn stacked(ranks: &[Rank]) -> Shoe {
        Shoe::stacked(ranks.iter().copied().map(Card::new).collect())
    }

    #[test]
    fn deal_order_is_player_player_dealer_dealer() {
        let mut shoe = stacked(&[Rank::Two, Rank::Three, Rank::Four, Rank::Five]);
        let round = Round::deal(&mut shoe, 10.0, RoundRules::default());
        assert_eq!(round.current_hand().cards.to_string(), "[2 3]");
        assert_eq!(round.dealer().to_string(), "[4 5]");
        assert_eq!(round.phase(), RoundPhase::Acting { hand_index: 0 });
    }

    #[test]
    fn legal_actions_follow_current_hand() {
        let mut shoe = stacked(&[Rank::Eight, Rank::Eight, Rank::Ten, Rank::Seven, Rank::Two]);
        let mut round = Round::deal(&mut shoe, 10.0, RoundRules::default());
        assert_eq!(
            round.legal_actions(),
            vec![Action::Hit, Action::Stand, Action::Double, Action::Split]
        );
        let outcome = round.apply(Action::Hit, &mut shoe);
        assert_eq!(outcome.event, StepEvent::Continue);
        assert_eq!(round.legal_actions(), vec![Action::Hit, Action::Stand]);
    }

    #[test]
    fn bust_skips_dealer_draw() {
        let mut shoe = stacked(&[Rank::Ten, Rank::Six, Rank::Ten, Rank::Two, Rank::Ten]);
        let mut round = Round::deal(&mut shoe, 10.0, RoundRules::default());
        let outcome = round.apply(Action::Hit, &mut shoe);
        assert!(outcome.done);
        assert_eq!(outcome.reward, -1.0);
        assert_eq!(round.dealer().len(), 2);
        assert_eq!(round.current_hand().status, HandStatus::Busted);
        assert_eq!(round.ledger().profit(), -10.0);
    }
}
