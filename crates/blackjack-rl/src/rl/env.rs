use crate::rl::observation::{BettingObservation, Observation, ObservationBuilder};
use crate::rl::rewards::{RewardComputer, StepRewardMode};
use blackjack_core::model::action::Action;
use blackjack_core::model::payout::LedgerSummary;
use blackjack_core::model::round::{Round, RoundRules, StepEvent, StepOutcome};
use blackjack_core::model::shoe::{DEFAULT_DECKS, DEFAULT_PENETRATION, Shoe};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Level, event};

/// RL environment configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub decks: usize,
    pub penetration: f64,
    pub rules: RoundRules,
    pub reward_mode: StepRewardMode,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            decks: DEFAULT_DECKS,
            penetration: DEFAULT_PENETRATION,
            rules: RoundRules::default(),
            reward_mode: StepRewardMode::Terminal,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("no round in progress; call reset first")]
    NotStarted,
}

/// Single step result
#[derive(Debug, Clone)]
pub struct Step {
    /// Observation after the action; the final hand's view once done.
    pub obs: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Additional step information
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub event: StepEvent,
    /// Reward reported by the round before shaping.
    pub round_reward: f64,
    pub shaping: f32,
    pub hand_index: usize,
    /// Present on the terminal step.
    pub ledger: Option<LedgerSummary>,
}

/// RL environment wrapping one seat at a shoe
pub struct BlackjackEnv {
    shoe: Shoe,
    round: Option<Round>,
    config: EnvConfig,
    obs_builder: ObservationBuilder,
    rewards: RewardComputer,
    rounds_played: u64,
    step_count: u32,
}

impl BlackjackEnv {
    pub fn new(config: EnvConfig, seed: u64) -> Self {
        Self::with_shoe(config, Shoe::with_seed(config.decks, config.penetration, seed))
    }

    /// Environment drawing from a prepared shoe.
    pub fn with_shoe(config: EnvConfig, shoe: Shoe) -> Self {
        Self {
            shoe,
            round: None,
            config,
            obs_builder: ObservationBuilder::new(),
            rewards: RewardComputer::new(config.reward_mode),
            rounds_played: 0,
            step_count: 0,
        }
    }

    /// Deal a new round for `base_bet`, discarding any round in progress.
    pub fn reset(&mut self, base_bet: f64) -> Observation {
        let round = Round::deal(&mut self.shoe, base_bet, self.config.rules);
        let obs = self.obs_builder.build(&round, &self.shoe);
        self.round = Some(round);
        self.rounds_played += 1;
        self.step_count = 0;
        obs
    }

    pub fn legal_actions(&self) -> Vec<Action> {
        self.round
            .as_ref()
            .map(Round::legal_actions)
            .unwrap_or_default()
    }

    pub fn step(&mut self, action: Action) -> Result<Step, EnvError> {
        self.step_with(Some(action), |round, shoe| round.apply(action, shoe))
    }

    /// Step with a raw action code; codes outside 0..=3 forfeit the round.
    pub fn step_code(&mut self, code: u8) -> Result<Step, EnvError> {
        let action = Action::from_code(code);
        self.step_with(action, |round, shoe| round.apply_code(code, shoe))
    }

    fn step_with(
        &mut self,
        action: Option<Action>,
        apply: impl FnOnce(&mut Round, &mut Shoe) -> StepOutcome,
    ) -> Result<Step, EnvError> {
        let round = self.round.as_mut().ok_or(EnvError::NotStarted)?;
        let before = self.obs_builder.build(round, &self.shoe);
        let true_count = self.shoe.true_count();

        let outcome = apply(round, &mut self.shoe);
        let shaping = match (action, outcome.event) {
            (_, StepEvent::AlreadyDone) | (None, _) => 0.0,
            (Some(action), _) => self.rewards.shaping(&before, action, true_count),
        };
        let reward = outcome.reward as f32 + shaping;
        self.step_count += 1;

        let ledger = outcome.done.then(|| round.ledger().summary());
        event!(
            target: "blackjack_rl::env",
            Level::TRACE,
            step = self.step_count,
            ?action,
            reward,
            done = outcome.done,
            "env step"
        );

        Ok(Step {
            obs: self.obs_builder.build(round, &self.shoe),
            reward,
            done: outcome.done,
            info: StepInfo {
                event: outcome.event,
                round_reward: outcome.reward,
                shaping,
                hand_index: round.current_hand_index(),
                ledger,
            },
        })
    }

    /// Observation for the current hand; `None` before the first reset.
    pub fn observation(&self) -> Option<Observation> {
        self.round
            .as_ref()
            .map(|round| self.obs_builder.build(round, &self.shoe))
    }

    /// Pre-round features for a bet sizer.
    pub fn betting_observation(&self) -> BettingObservation {
        self.obs_builder.build_betting(&self.shoe)
    }

    pub fn ledger_summary(&self) -> Option<LedgerSummary> {
        self.round.as_ref().map(|round| round.ledger().summary())
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn shoe(&self) -> &Shoe {
        &self.shoe
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn is_done(&self) -> bool {
        self.round.as_ref().is_none_or(Round::is_done)
    }

    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackjack_core::model::card::Card;
    use blackjack_core::model::rank::Rank;
    use blackjack_core::model::round::ForfeitReason;

    fn stacked_env(ranks: &[Rank], config: EnvConfig) -> BlackjackEnv {
        let shoe = Shoe::stacked(ranks.iter().copied().map(Card::new).collect());
        BlackjackEnv::with_shoe(config, shoe)
    }

    #[test]
    fn step_before_reset_fails() {
        let mut env = BlackjackEnv::new(EnvConfig::default(), 1);
        assert_eq!(env.step(Action::Stand).unwrap_err(), EnvError::NotStarted);
        assert!(env.is_done());
        assert!(env.legal_actions().is_empty());
    }

    #[test]
    fn stand_settles_and_reports_ledger() {
        // Player 10+9, dealer 10+7.
        let mut env = stacked_env(
            &[Rank::Ten, Rank::Nine, Rank::Ten, Rank::Seven],
            EnvConfig::default(),
        );
        let obs = env.reset(10.0);
        assert_eq!(obs.total, 19.0);
        let step = env.step(Action::Stand).unwrap();
        assert!(step.done);
        assert_eq!(step.reward, 1.0);
        let ledger = step.info.ledger.unwrap();
        assert_eq!(ledger.net_result, 10.0);
        assert!(matches!(step.info.event, StepEvent::RoundOver(_)));
    }

    #[test]
    fn invalid_code_forfeits_without_shaping() {
        let config = EnvConfig {
            reward_mode: StepRewardMode::Shaped,
            ..EnvConfig::default()
        };
        let mut env = stacked_env(&[Rank::Ten, Rank::Seven, Rank::Ten, Rank::Seven], config);
        env.reset(10.0);
        let step = env.step_code(9).unwrap();
        assert!(step.done);
        assert_eq!(step.reward, -1.0);
        assert_eq!(step.info.shaping, 0.0);
        assert_eq!(
            step.info.event,
            StepEvent::Forfeited {
                reason: ForfeitReason::InvalidCode(9)
            }
        );
        let again = env.step(Action::Hit).unwrap();
        assert_eq!(again.reward, 0.0);
        assert_eq!(again.info.event, StepEvent::AlreadyDone);
    }

    #[test]
    fn shaped_mode_penalises_hitting_hard_seventeen() {
        let config = EnvConfig {
            reward_mode: StepRewardMode::Shaped,
            ..EnvConfig::default()
        };
        // Player 10+7 hits a Two; dealer 10+8.
        let mut env = stacked_env(
            &[Rank::Ten, Rank::Seven, Rank::Ten, Rank::Eight, Rank::Two],
            config,
        );
        env.reset(10.0);
        let step = env.step(Action::Hit).unwrap();
        assert!(!step.done);
        assert_eq!(step.info.round_reward, 0.0);
        assert_eq!(step.reward, -0.4);
        assert_eq!(step.obs.total, 19.0);
    }

    #[test]
    fn seeded_envs_deal_identically() {
        let mut a = BlackjackEnv::new(EnvConfig::default(), 11);
        let mut b = BlackjackEnv::new(EnvConfig::default(), 11);
        for _ in 0..20 {
            assert_eq!(a.reset(10.0), b.reset(10.0));
            while !a.is_done() {
                let sa = a.step(Action::Stand).unwrap();
                let sb = b.step(Action::Stand).unwrap();
                assert_eq!(sa.reward, sb.reward);
            }
        }
        assert_eq!(a.rounds_played(), 20);
    }
}
