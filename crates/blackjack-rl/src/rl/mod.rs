mod env;
pub mod experience;
pub mod observation;
pub mod rewards;

pub use env::{BlackjackEnv, EnvConfig, EnvError, Step, StepInfo};
pub use experience::{
    BucketRule, BucketSizes, Composition, CountBucket, ExperienceCollector, ExperienceError,
    ExperienceRecord, ExperienceStore, SharedExperienceStore,
};
pub use observation::{
    BETTING_FEATURE_DIM, BettingObservation, FEATURE_DIM, Observation, ObservationBuilder,
    SCHEMA_VERSION, TRUE_COUNT_FEATURE, TRUE_COUNT_SCALE,
};
pub use rewards::{RewardComputer, StepRewardMode, shaping_bonus};
