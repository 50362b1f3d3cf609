use super::{Agent, PolicyContext};
use blackjack_core::model::action::Action;
use tracing::{Level, event};

/// Hit/stand table for a dealer standing on all 17s.
///
/// Hard totals: 17+ stand, 11 or less hit, 12 stands against 4-6, 13-16
/// stand against 2-6. Soft totals: 17 or less hit, soft 18 stands against
/// 2, 7 and 8, soft 19+ stands.
pub fn basic_strategy_action(total: u8, soft: bool, dealer_value: u8) -> Action {
    let stand = if soft {
        match total {
            0..=17 => false,
            18 => matches!(dealer_value, 2 | 7 | 8),
            _ => true,
        }
    } else {
        match total {
            17.. => true,
            0..=11 => false,
            12 => matches!(dealer_value, 4..=6),
            _ => matches!(dealer_value, 2..=6),
        }
    };
    if stand { Action::Stand } else { Action::Hit }
}

/// Totals the table was tabulated for: hard 5-17 and soft 13-20. Outside
/// that range the decision is forced and makes a poor training label.
pub fn table_covers(total: u8, soft: bool) -> bool {
    if soft {
        (13..=20).contains(&total)
    } else {
        (5..=17).contains(&total)
    }
}

/// Plays the hit/stand table and never doubles or splits.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicStrategyPolicy;

impl BasicStrategyPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl Agent for BasicStrategyPolicy {
    fn choose_action(&mut self, ctx: &PolicyContext) -> Action {
        let hand = &ctx.round.current_hand().cards;
        let dealer_value = ctx
            .round
            .dealer_upcard()
            .map(|card| card.value())
            .unwrap_or(10);
        let action = basic_strategy_action(hand.total(), hand.is_soft(), dealer_value);
        event!(
            target: "blackjack_bot::basic",
            Level::TRACE,
            total = hand.total(),
            soft = hand.is_soft(),
            dealer_value,
            %action,
            "basic strategy decision"
        );
        if ctx.legal_actions.contains(&action) {
            action
        } else {
            ctx.legal_actions.first().copied().unwrap_or(Action::Stand)
        }
    }
}
