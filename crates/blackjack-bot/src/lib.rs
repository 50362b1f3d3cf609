pub mod betting;
pub mod policy;

pub use betting::{BetSizer, DEFAULT_RAMP, DEFAULT_UNIT};
pub use policy::{
    Agent, BasicStrategyPolicy, EpsilonGreedy, EpsilonSchedule, PolicyContext, RandomPolicy,
    Transition,
};
