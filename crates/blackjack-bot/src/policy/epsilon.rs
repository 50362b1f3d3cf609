use super::{Agent, PolicyContext, Transition};
use blackjack_core::model::action::Action;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpsilonSchedule {
    pub epsilon_start: f64,
    pub epsilon_min: f64,
    pub epsilon_decay: f64,
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        Self {
            epsilon_start: 1.0,
            epsilon_min: 0.1,
            epsilon_decay: 0.995,
        }
    }
}

/// Explores with a uniformly random legal action with probability epsilon,
/// otherwise defers to `inner`. Epsilon decays once per finished round.
pub struct EpsilonGreedy<A> {
    inner: A,
    schedule: EpsilonSchedule,
    epsilon: f64,
    rng: StdRng,
    explored: u64,
}

impl<A: Agent> EpsilonGreedy<A> {
    pub fn new(inner: A, schedule: EpsilonSchedule, seed: u64) -> Self {
        Self {
            inner,
            epsilon: schedule.epsilon_start.clamp(0.0, 1.0),
            schedule,
            rng: StdRng::seed_from_u64(seed),
            explored: 0,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of decisions taken at random so far.
    pub fn explored(&self) -> u64 {
        self.explored
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn decay(&mut self) {
        if self.epsilon > self.schedule.epsilon_min {
            self.epsilon =
                (self.epsilon * self.schedule.epsilon_decay).max(self.schedule.epsilon_min);
        }
    }
}

impl<A: Agent> Agent for EpsilonGreedy<A> {
    fn choose_action(&mut self, ctx: &PolicyContext) -> Action {
        if self.rng.r#gen::<f64>() < self.epsilon {
            if let Some(&action) = ctx.legal_actions.choose(&mut self.rng) {
                self.explored += 1;
                event!(
                    target: "blackjack_bot::epsilon",
                    Level::TRACE,
                    epsilon = self.epsilon,
                    %action,
                    "exploring"
                );
                return action;
            }
        }
        self.inner.choose_action(ctx)
    }

    fn observe_transition(&mut self, transition: &Transition) {
        if transition.terminal {
            self.decay();
        }
        self.inner.observe_transition(transition);
    }

    fn observe_batch(&mut self, batch: &[Transition]) {
        self.inner.observe_batch(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::{EpsilonGreedy, EpsilonSchedule};
    use crate::policy::{Agent, BasicStrategyPolicy, Transition};
    use blackjack_core::model::action::Action;

    fn terminal() -> Transition {
        Transition {
            state: vec![0.0],
            action: Action::Stand,
            reward: 0.0,
            next_state: vec![0.0],
            terminal: true,
        }
    }

    #[test]
    fn epsilon_decays_to_floor_on_terminal_steps() {
        let schedule = EpsilonSchedule {
            epsilon_start: 1.0,
            epsilon_min: 0.5,
            epsilon_decay: 0.5,
        };
        let mut agent = EpsilonGreedy::new(BasicStrategyPolicy::new(), schedule, 1);
        let mut step = terminal();
        step.terminal = false;
        agent.observe_transition(&step);
        assert_eq!(agent.epsilon(), 1.0);
        agent.observe_transition(&terminal());
        assert_eq!(agent.epsilon(), 0.5);
        agent.observe_transition(&terminal());
        assert_eq!(agent.epsilon(), 0.5);
    }

    #[test]
    fn schedule_deserializes_with_defaults() {
        let schedule: EpsilonSchedule = serde_json::from_str(r#"{"epsilon_min":0.2}"#).unwrap();
        assert_eq!(schedule.epsilon_start, 1.0);
        assert_eq!(schedule.epsilon_min, 0.2);
        assert_eq!(schedule.epsilon_decay, 0.995);
    }
}
