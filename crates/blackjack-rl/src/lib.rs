pub mod dataset;
pub mod rl;

pub use rl::{
    BettingObservation, BlackjackEnv, BucketRule, CountBucket, EnvConfig, EnvError, Observation,
    ObservationBuilder, RewardComputer, SharedExperienceStore, Step, StepInfo, StepRewardMode,
};
pub use rl::{ExperienceCollector, ExperienceError, ExperienceRecord, ExperienceStore};
