//! Reward computation for reinforcement learning.
//!
//! The round itself reports unit outcomes (and the split aggregate). This
//! module optionally layers a small, clipped shaping bonus on top that nudges
//! exploration away from plays basic strategy never makes.

use crate::rl::observation::Observation;
use blackjack_core::model::action::Action;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Bound on the absolute shaping bonus.
pub const SHAPING_CLIP: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRewardMode {
    /// Only the round's own reward.
    #[default]
    Terminal,
    /// Round reward plus [`shaping_bonus`].
    Shaped,
}

impl StepRewardMode {
    pub fn as_str(&self) -> &str {
        match self {
            StepRewardMode::Terminal => "terminal",
            StepRewardMode::Shaped => "shaped",
        }
    }
}

impl FromStr for StepRewardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" => Ok(StepRewardMode::Terminal),
            "shaped" => Ok(StepRewardMode::Shaped),
            _ => Err(format!("Unknown step reward mode: {}", s)),
        }
    }
}

/// Heuristic bonus for the decision `action` taken in `state`, clipped to
/// [`SHAPING_CLIP`]. `true_count` is the unclipped decision-time count.
pub fn shaping_bonus(state: &Observation, action: Action, true_count: f64) -> f32 {
    let num_cards = state.num_cards as u8;
    let total = state.total as u8;
    let soft = state.is_soft > 0.5;
    let dealer = state.dealer_value as u8;
    let can_split = state.can_split > 0.5;
    let can_double = state.can_double > 0.5;

    let mut bonus = 0.0f32;
    // Never split tens.
    if can_split && action == Action::Split && total == 20 {
        bonus -= 0.4;
    }
    // Always split aces.
    if can_split && action == Action::Split && total == 12 && soft {
        bonus += 0.2;
    }
    if !soft && total >= 17 && action == Action::Hit {
        bonus -= 0.4;
    }
    if true_count >= 3.0
        && can_double
        && num_cards == 2
        && matches!(total, 10 | 11)
        && (2..=9).contains(&dealer)
    {
        bonus += if action == Action::Double { 0.2 } else { -0.1 };
    }
    if true_count <= 0.0 && action == Action::Double {
        bonus -= 0.05;
    }
    bonus.clamp(-SHAPING_CLIP, SHAPING_CLIP)
}

/// Computes the reward fed to the learner for one step.
#[derive(Debug, Clone, Copy)]
pub struct RewardComputer {
    mode: StepRewardMode,
}

impl RewardComputer {
    pub fn new(mode: StepRewardMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> StepRewardMode {
        self.mode
    }

    /// Shaping component only; zero in terminal mode.
    pub fn shaping(&self, state: &Observation, action: Action, true_count: f64) -> f32 {
        match self.mode {
            StepRewardMode::Terminal => 0.0,
            StepRewardMode::Shaped => shaping_bonus(state, action, true_count),
        }
    }

    /// # Arguments
    /// * `state` - Observation the decision was made from
    /// * `action` - Action taken
    /// * `true_count` - Shoe true count at decision time
    /// * `round_reward` - Reward reported by the round for this step
    pub fn compute_step_reward(
        &self,
        state: &Observation,
        action: Action,
        true_count: f64,
        round_reward: f64,
    ) -> f32 {
        round_reward as f32 + self.shaping(state, action, true_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(total: f32, soft: bool, dealer: f32, can_split: bool) -> Observation {
        Observation {
            num_cards: 2.0,
            total,
            is_soft: if soft { 1.0 } else { 0.0 },
            dealer_value: dealer,
            can_split: if can_split { 1.0 } else { 0.0 },
            can_double: 1.0,
            distribution: [0.1; 10],
            true_count: 0.0,
        }
    }

    #[test]
    fn reward_mode_from_str() {
        assert_eq!(
            "terminal".parse::<StepRewardMode>().unwrap(),
            StepRewardMode::Terminal
        );
        assert_eq!("Shaped".parse::<StepRewardMode>().unwrap(), StepRewardMode::Shaped);
        assert!("per_trick".parse::<StepRewardMode>().is_err());
    }

    #[test]
    fn terminal_mode_passes_round_reward_through() {
        let computer = RewardComputer::new(StepRewardMode::Terminal);
        let s = state(18.0, false, 6.0, false);
        assert_eq!(computer.compute_step_reward(&s, Action::Hit, 0.0, -1.0), -1.0);
    }

    #[test]
    fn splitting_tens_is_penalised() {
        let s = state(20.0, false, 6.0, true);
        assert_eq!(shaping_bonus(&s, Action::Split, 1.0), -0.4);
        assert_eq!(shaping_bonus(&s, Action::Stand, 1.0), 0.0);
    }

    #[test]
    fn splitting_aces_is_encouraged() {
        let s = state(12.0, true, 10.0, true);
        assert_eq!(shaping_bonus(&s, Action::Split, 1.0), 0.2);
    }

    #[test]
    fn hitting_hard_seventeen_is_penalised() {
        let s = state(17.0, false, 10.0, false);
        assert_eq!(shaping_bonus(&s, Action::Hit, 1.0), -0.4);
        let soft = state(17.0, true, 10.0, false);
        assert_eq!(shaping_bonus(&soft, Action::Hit, 1.0), 0.0);
    }

    #[test]
    fn high_count_rewards_doubling_ten_and_eleven() {
        let s = state(11.0, false, 6.0, false);
        assert_eq!(shaping_bonus(&s, Action::Double, 3.5), 0.2);
        assert_eq!(shaping_bonus(&s, Action::Hit, 3.5), -0.1);
        assert_eq!(shaping_bonus(&s, Action::Double, 1.0), 0.0);
        assert_eq!(shaping_bonus(&s, Action::Double, -1.0), -0.05);
    }

    #[test]
    fn shaped_mode_adds_bonus() {
        let computer = RewardComputer::new(StepRewardMode::Shaped);
        let s = state(20.0, false, 6.0, true);
        let reward = computer.compute_step_reward(&s, Action::Split, 0.5, 0.0);
        assert_eq!(reward, -0.4);
    }
}
