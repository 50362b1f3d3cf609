use super::{Agent, PolicyContext};
use blackjack_core::model::action::Action;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Uniformly random legal action. Useful as a floor in comparisons.
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomPolicy {
    fn choose_action(&mut self, ctx: &PolicyContext) -> Action {
        ctx.legal_actions
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Action::Stand)
    }
}
