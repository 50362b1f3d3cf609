mod basic;
mod epsilon;
mod random;

pub use basic::{BasicStrategyPolicy, basic_strategy_action, table_covers};
pub use epsilon::{EpsilonGreedy, EpsilonSchedule};
pub use random::RandomPolicy;

use blackjack_core::model::action::Action;
use blackjack_core::model::round::Round;
use serde::{Deserialize, Serialize};

/// Context handed to an agent for a single decision.
pub struct PolicyContext<'a> {
    /// Observation vector for the current hand.
    pub observation: &'a [f32],
    /// Never empty while the round is live.
    pub legal_actions: &'a [Action],
    pub round: &'a Round,
}

/// One environment step as seen by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: Action,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub terminal: bool,
}

/// Decision-maker driven by the simulator.
pub trait Agent: Send {
    /// Must return a member of `ctx.legal_actions`.
    fn choose_action(&mut self, ctx: &PolicyContext) -> Action;

    /// Pushed once per environment step.
    fn observe_transition(&mut self, _transition: &Transition) {}

    /// Optional: a replay batch drawn by the driver, for learning agents.
    fn observe_batch(&mut self, _batch: &[Transition]) {}
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn choose_action(&mut self, ctx: &PolicyContext) -> Action {
        (**self).choose_action(ctx)
    }

    fn observe_transition(&mut self, transition: &Transition) {
        (**self).observe_transition(transition)
    }

    fn observe_batch(&mut self, batch: &[Transition]) {
        (**self).observe_batch(batch)
    }
}
