use blackjack_bot::{Agent, BasicStrategyPolicy, EpsilonGreedy, EpsilonSchedule, RandomPolicy};
use thiserror::Error;

use crate::config::{AgentConfig, AgentKind};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid parameters for agent '{name}': {message}")]
    InvalidParams { name: String, message: String },
}

/// Parsed agent definition; spawns a fresh policy for each run.
pub(super) struct AgentBlueprint {
    pub(super) name: String,
    pub(super) kind: AgentKind,
    implementation: AgentImplementation,
}

enum AgentImplementation {
    BasicStrategy,
    Random,
    Epsilon(EpsilonSchedule),
}

impl AgentBlueprint {
    pub(super) fn from_configs(configs: &[AgentConfig]) -> Result<Vec<Self>, AgentError> {
        configs.iter().map(Self::from_config).collect()
    }

    fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let implementation = match config.kind {
            AgentKind::BasicStrategy => AgentImplementation::BasicStrategy,
            AgentKind::Random => AgentImplementation::Random,
            AgentKind::Epsilon => {
                let schedule =
                    config
                        .epsilon_schedule()
                        .map_err(|err| AgentError::InvalidParams {
                            name: config.name.clone(),
                            message: err.to_string(),
                        })?;
                AgentImplementation::Epsilon(schedule)
            }
        };

        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            implementation,
        })
    }

    pub(super) fn spawn_policy(&self, seed: u64) -> Box<dyn Agent> {
        match &self.implementation {
            AgentImplementation::BasicStrategy => Box::new(BasicStrategyPolicy::new()),
            AgentImplementation::Random => Box::new(RandomPolicy::new(seed)),
            AgentImplementation::Epsilon(schedule) => Box::new(EpsilonGreedy::new(
                BasicStrategyPolicy::new(),
                *schedule,
                seed,
            )),
        }
    }
}
