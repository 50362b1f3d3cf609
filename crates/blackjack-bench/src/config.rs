use blackjack_bot::{BetSizer, EpsilonSchedule};
use blackjack_core::model::round::RoundRules;
use blackjack_core::model::settlement::SplitRewardMode;
use blackjack_core::model::shoe::{
    CARDS_PER_DECK, DEFAULT_DECKS, DEFAULT_PENETRATION, MIN_RESHUFFLE_CARDS,
};
use blackjack_rl::{EnvConfig, StepRewardMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_BASE_BET: f64 = 10.0;
const DEFAULT_CAPACITY: usize = 50_000;
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_HIGH_FRACTION: f64 = 0.7;
const DEFAULT_SAMPLE_EVERY: usize = 100;
const DEFAULT_INITIAL_BANKROLL: f64 = 100_000.0;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root simulation configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub run_id: String,
    #[serde(default)]
    pub table: TableConfig,
    pub rounds: RoundsConfig,
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub betting: BetSizer,
    #[serde(default)]
    pub experience: ExperienceConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: SimulationConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.table.validate()?;
        self.rounds.validate()?;
        validate_betting(&self.betting)?;
        self.experience.validate(&self.run_id)?;
        self.outputs.validate(&self.run_id)?;
        self.metrics.validate(&self.agents)?;
        self.logging.normalize();
        validate_agents(&mut self.agents)?;
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            experience_jsonl: self
                .experience
                .export_jsonl
                .as_deref()
                .map(|template| resolve_template(&self.run_id, template)),
        }
    }
}

/// Table rules shared by every agent.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    pub decks: usize,
    pub penetration: f64,
    pub base_bet: f64,
    pub split_reward: SplitRewardMode,
    pub reward_mode: StepRewardMode,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            decks: DEFAULT_DECKS,
            penetration: DEFAULT_PENETRATION,
            base_bet: DEFAULT_BASE_BET,
            split_reward: SplitRewardMode::default(),
            reward_mode: StepRewardMode::default(),
        }
    }
}

impl TableConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.decks == 0 {
            return Err(invalid("table.decks", "shoe needs at least one deck"));
        }
        if !(0.0..1.0).contains(&self.penetration) {
            return Err(invalid("table.penetration", "penetration must be in [0, 1)"));
        }
        let cut_card = self.penetration * (self.decks * CARDS_PER_DECK) as f64;
        if cut_card < MIN_RESHUFFLE_CARDS as f64 {
            return Err(invalid(
                "table.penetration",
                &format!(
                    "penetration x decks leaves {cut_card:.1} cards at the cut; a round may need {MIN_RESHUFFLE_CARDS}"
                ),
            ));
        }
        if !is_positive(self.base_bet) {
            return Err(invalid("table.base_bet", "base bet must be greater than zero"));
        }
        match self.split_reward {
            SplitRewardMode::SumClip { limit } if !is_positive(limit) => {
                return Err(invalid("table.split_reward.limit", "limit must be positive"));
            }
            SplitRewardMode::SumTanh { tau } if !is_positive(tau) => {
                return Err(invalid("table.split_reward.tau", "tau must be positive"));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn env_config(&self) -> EnvConfig {
        EnvConfig {
            decks: self.decks,
            penetration: self.penetration,
            rules: RoundRules {
                split_reward: self.split_reward,
            },
            reward_mode: self.reward_mode,
        }
    }
}

/// How many rounds each agent plays, and from which seed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RoundsConfig {
    pub count: usize,
    pub seed: Option<u64>,
}

impl RoundsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(invalid(
                "rounds.count",
                "number of rounds must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Definition of a simulated seat.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

impl AgentConfig {
    /// Exploration schedule for `epsilon` agents; missing keys take defaults.
    pub fn epsilon_schedule(&self) -> Result<EpsilonSchedule, ValidationError> {
        if self.params.is_null() {
            return Ok(EpsilonSchedule::default());
        }
        let schedule: EpsilonSchedule =
            serde_yaml::from_value(self.params.clone()).map_err(|err| {
                ValidationError::InvalidField {
                    field: format!("agents[{}].params", self.name),
                    message: err.to_string(),
                }
            })?;
        if !(0.0..=1.0).contains(&schedule.epsilon_min)
            || !(0.0..=1.0).contains(&schedule.epsilon_start)
            || !(0.0..=1.0).contains(&schedule.epsilon_decay)
        {
            return Err(ValidationError::InvalidField {
                field: format!("agents[{}].params", self.name),
                message: "epsilon values must lie in [0, 1]".to_string(),
            });
        }
        Ok(schedule)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    BasicStrategy,
    Random,
    Epsilon,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::BasicStrategy => "basic_strategy",
            AgentKind::Random => "random",
            AgentKind::Epsilon => "epsilon",
        }
    }
}

/// Replay buffer settings for the per-agent experience store.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperienceConfig {
    pub capacity: usize,
    pub batch_size: usize,
    pub high_fraction: f64,
    /// Rounds between biased batch draws; zero disables sampling.
    pub sample_every: usize,
    pub export_jsonl: Option<String>,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            high_fraction: DEFAULT_HIGH_FRACTION,
            sample_every: DEFAULT_SAMPLE_EVERY,
            export_jsonl: None,
        }
    }
}

impl ExperienceConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        if self.capacity == 0 {
            return Err(invalid("experience.capacity", "capacity must be at least 1"));
        }
        if self.batch_size > self.capacity {
            return Err(invalid(
                "experience.batch_size",
                "batch size must not exceed capacity",
            ));
        }
        if !(0.0..=1.0).contains(&self.high_fraction) {
            return Err(invalid(
                "experience.high_fraction",
                "high fraction must be in [0, 1]",
            ));
        }
        if let Some(template) = &self.export_jsonl {
            validate_path("experience.export_jsonl", run_id, template)?;
        }
        Ok(())
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
        ] {
            validate_path(label, run_id, value)?;
        }
        Ok(())
    }
}

/// Metrics configuration block.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default)]
    pub baseline: Option<String>,
    #[serde(default = "default_initial_bankroll")]
    pub initial_bankroll: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            baseline: None,
            initial_bankroll: DEFAULT_INITIAL_BANKROLL,
        }
    }
}

impl MetricsConfig {
    fn validate(&self, agents: &[AgentConfig]) -> Result<(), ValidationError> {
        let Some(baseline) = self.baseline.as_ref() else {
            return Err(invalid(
                "metrics.baseline",
                "baseline agent must be specified",
            ));
        };

        if !agents.iter().any(|a| &a.name == baseline) {
            return Err(ValidationError::InvalidField {
                field: "metrics.baseline".to_string(),
                message: format!("baseline agent '{baseline}' is not defined in agents list"),
            });
        }

        if !is_positive(self.initial_bankroll) {
            return Err(invalid(
                "metrics.initial_bankroll",
                "initial bankroll must be greater than zero",
            ));
        }

        Ok(())
    }
}

fn default_initial_bankroll() -> f64 {
    DEFAULT_INITIAL_BANKROLL
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(invalid("run_id", "run_id must not be empty"));
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(invalid(
            "run_id",
            "run_id may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }

    Ok(())
}

fn validate_betting(betting: &BetSizer) -> Result<(), ValidationError> {
    if !is_positive(betting.unit()) {
        return Err(invalid("betting.unit", "unit must be greater than zero"));
    }
    if let BetSizer::TrueCountRamp { ramp, .. } = betting {
        if ramp.is_empty() {
            return Err(invalid("betting.ramp", "ramp must list at least one multiple"));
        }
        if ramp.contains(&0) {
            return Err(invalid("betting.ramp", "ramp multiples must be positive"));
        }
    }
    Ok(())
}

fn validate_path(label: &str, run_id: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid(label, "path must not be empty"));
    }

    let resolved = resolve_template(run_id, value);
    if resolved.components().count() == 0 {
        return Err(invalid(label, "resolved path is invalid"));
    }
    Ok(())
}

fn validate_agents(agents: &mut [AgentConfig]) -> Result<(), ValidationError> {
    if agents.is_empty() {
        return Err(invalid("agents", "at least one agent must be specified"));
    }

    let mut seen = HashSet::new();
    for agent in agents.iter_mut() {
        if agent.name.trim().is_empty() {
            return Err(invalid("agents.name", "agent name must not be empty"));
        }

        if !agent
            .name
            .chars()
            .all(|c| RUN_ID_ALLOWED.contains(c) || c == '/')
        {
            return Err(ValidationError::InvalidField {
                field: format!("agents[{}].name", agent.name),
                message: "agent name contains invalid characters".to_string(),
            });
        }

        if !seen.insert(agent.name.clone()) {
            return Err(ValidationError::InvalidField {
                field: "agents".to_string(),
                message: format!("agent name '{}' defined more than once", agent.name),
            });
        }

        if agent.params.is_null() {
            agent.params = serde_yaml::Value::Mapping(Default::default());
        }
        if agent.kind == AgentKind::Epsilon {
            agent.epsilon_schedule()?;
        }
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub experience_jsonl: Option<PathBuf>,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_YAML: &str = r#"
run_id: "basic_vs_random"
table:
  decks: 6
  penetration: 0.25
  base_bet: 10
  split_reward: { mode: sum_clip, limit: 2.0 }
rounds:
  count: 2000
  seed: 42
agents:
  - name: "basic"
    kind: "basic_strategy"
  - name: "explorer"
    kind: "epsilon"
    params:
      epsilon_start: 1.0
      epsilon_min: 0.1
      epsilon_decay: 0.995
betting:
  kind: true_count_ramp
  unit: 10
  ramp: [1, 2, 4, 8, 16]
experience:
  capacity: 5000
  batch_size: 32
  high_fraction: 0.7
  export_jsonl: "bench/out/{run_id}/experience.jsonl"
outputs:
  jsonl: "bench/out/{run_id}/rounds.jsonl"
  summary_md: "bench/out/{run_id}/summary.md"
metrics:
  baseline: "basic"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    #[test]
    fn loads_and_validates_basic_config() {
        let mut cfg: SimulationConfig = serde_yaml::from_str(BASIC_YAML).expect("parse yaml");
        cfg.validate().expect("validate");

        assert_eq!(cfg.experience.sample_every, DEFAULT_SAMPLE_EVERY);
        assert_eq!(cfg.table.split_reward, SplitRewardMode::SumClip { limit: 2.0 });
        assert!(cfg.logging.enable_structured);
        assert_eq!(cfg.logging.level(), Some(Level::DEBUG));
        assert_eq!(
            cfg.betting,
            BetSizer::TrueCountRamp {
                unit: 10.0,
                ramp: vec![1, 2, 4, 8, 16]
            }
        );

        let outputs = cfg.resolved_outputs();
        assert_eq!(
            outputs.jsonl,
            PathBuf::from("bench/out/basic_vs_random/rounds.jsonl")
        );
        assert_eq!(
            outputs.experience_jsonl,
            Some(PathBuf::from("bench/out/basic_vs_random/experience.jsonl"))
        );
    }

    #[test]
    fn optional_blocks_take_defaults() {
        let yaml = r#"
run_id: "minimal"
rounds:
  count: 10
agents:
  - name: "basic"
    kind: "basic_strategy"
outputs:
  jsonl: "out/rounds.jsonl"
  summary_md: "out/summary.md"
metrics:
  baseline: "basic"
"#;
        let mut cfg: SimulationConfig = serde_yaml::from_str(yaml).expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.table, TableConfig::default());
        assert_eq!(cfg.betting, BetSizer::default());
        assert_eq!(cfg.experience, ExperienceConfig::default());
        assert!(cfg.resolved_outputs().experience_jsonl.is_none());
    }

    #[test]
    fn epsilon_params_are_parsed() {
        let mut cfg: SimulationConfig = serde_yaml::from_str(BASIC_YAML).expect("parse");
        cfg.validate().expect("valid");
        let schedule = cfg.agents[1].epsilon_schedule().expect("schedule");
        assert_eq!(schedule.epsilon_decay, 0.995);
        assert_eq!(schedule.epsilon_min, 0.1);
    }

    #[test]
    fn rejects_missing_baseline() {
        let yaml = BASIC_YAML.replace("baseline: \"basic\"\n", "");
        let mut cfg: SimulationConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("should fail");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "metrics.baseline"
        ));
    }

    #[test]
    fn rejects_duplicate_agents() {
        let yaml = BASIC_YAML.replace("name: \"explorer\"", "name: \"basic\"");
        let mut cfg: SimulationConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("duplicate agents should fail");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "agents"
        ));
    }

    #[test]
    fn rejects_invalid_run_id() {
        let yaml = BASIC_YAML.replace("basic_vs_random", "basic vs random");
        let mut cfg: SimulationConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("invalid run id");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "run_id"
        ));
    }

    #[test]
    fn rejects_full_penetration() {
        let yaml = BASIC_YAML.replace("penetration: 0.25", "penetration: 1.0");
        let mut cfg: SimulationConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("penetration");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "table.penetration"
        ));
    }

    #[test]
    fn rejects_cut_card_below_one_round_of_cards() {
        let shallow = [
            ("decks: 1", "penetration: 0.0"),
            ("decks: 1", "penetration: 0.05"),
            ("decks: 6", "penetration: 0.2"),
        ];
        for (decks, penetration) in shallow {
            let yaml = BASIC_YAML
                .replace("decks: 6", decks)
                .replace("penetration: 0.25", penetration);
            let mut cfg: SimulationConfig = serde_yaml::from_str(&yaml).expect("parse");
            let err = cfg.validate().expect_err("cut card too shallow");
            assert!(matches!(
                err,
                ValidationError::InvalidField { field, .. } if field == "table.penetration"
            ));
        }

        let yaml = BASIC_YAML.replace("penetration: 0.25", "penetration: 0.22");
        let mut cfg: SimulationConfig = serde_yaml::from_str(&yaml).expect("parse");
        cfg.validate().expect("6 decks at 0.22 leaves enough cards");
    }

    #[test]
    fn rejects_batch_larger_than_capacity() {
        let yaml = BASIC_YAML.replace("capacity: 5000", "capacity: 8");
        let mut cfg: SimulationConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("batch");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "experience.batch_size"
        ));
    }

    #[test]
    fn rejects_out_of_range_epsilon() {
        let yaml = BASIC_YAML.replace("epsilon_decay: 0.995", "epsilon_decay: 1.5");
        let mut cfg: SimulationConfig = serde_yaml::from_str(&yaml).expect("parse");
        assert!(cfg.validate().is_err());
    }
}
