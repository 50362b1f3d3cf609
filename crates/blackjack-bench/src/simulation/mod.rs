mod agents;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use blackjack_bot::{Agent, PolicyContext, Transition};
use blackjack_core::model::action::Action;
use blackjack_core::model::round::StepEvent;
use blackjack_core::model::settlement::Outcome;
use blackjack_rl::{
    BlackjackEnv, EnvError, ExperienceCollector, ExperienceError, ExperienceRecord,
    ExperienceStore,
};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError};
use crate::config::{ResolvedOutputs, SimulationConfig};

pub use agents::AgentError;
use agents::AgentBlueprint;

/// Primary entry point for running a configured simulation.
pub struct SimulationRunner {
    config: SimulationConfig,
    outputs: ResolvedOutputs,
    agents: Vec<AgentBlueprint>,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub rounds_per_agent: usize,
    pub agents: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub experience_paths: Vec<PathBuf>,
}

/// Everything the analytics need about one finished round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round_index: usize,
    /// Shoe true count observed before the bet was placed.
    pub true_count: f64,
    pub units: u32,
    pub bet: f64,
    pub reward: f64,
    pub net_result: f64,
    pub total_staked: f64,
    pub hands: usize,
    pub splits: u8,
    pub forfeited: bool,
    pub actions: Vec<Action>,
    pub outcomes: Vec<Outcome>,
    pub dealer_total: u8,
}

impl SimulationRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: SimulationConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let agents = AgentBlueprint::from_configs(&config.agents)?;
        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            agents,
        })
    }

    /// Play every agent through the configured rounds, streaming JSONL rows
    /// to disk, then write the Markdown summary.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut analytics = AnalyticsCollector::new(&self.config)?;
        let mut rows_written = 0usize;
        let mut experience_paths = Vec::new();

        for (agent_index, blueprint) in self.agents.iter().enumerate() {
            let mut collector = match &self.outputs.experience_jsonl {
                Some(path) => {
                    let path = agent_path(path, &blueprint.name);
                    ensure_parent(path.parent())?;
                    let collector = ExperienceCollector::new(&path)?;
                    experience_paths.push(path);
                    Some(collector)
                }
                None => None,
            };

            rows_written += self.run_agent(
                agent_index,
                blueprint,
                &mut writer,
                &mut analytics,
                collector.as_mut(),
            )?;

            if let Some(collector) = collector.as_mut() {
                collector.flush()?;
            }
        }

        writer.flush()?;

        let summary = analytics.finalize()?;
        summary.write_markdown(&self.outputs.summary_md)?;

        Ok(RunSummary {
            rounds_per_agent: self.config.rounds.count,
            agents: self.agents.len(),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            experience_paths,
        })
    }

    fn run_agent(
        &self,
        agent_index: usize,
        blueprint: &AgentBlueprint,
        writer: &mut BufWriter<File>,
        analytics: &mut AnalyticsCollector,
        mut collector: Option<&mut ExperienceCollector>,
    ) -> Result<usize, RunnerError> {
        let seed = self.config.rounds.seed.unwrap_or(0);
        let agent_seed = seed.wrapping_add(agent_index as u64 + 1);
        // Every agent faces the same shoe seed.
        let mut env = BlackjackEnv::new(self.config.table.env_config(), seed);
        let mut agent = blueprint.spawn_policy(agent_seed);
        let mut store = ExperienceStore::new(self.config.experience.capacity);
        let mut sample_rng = StdRng::seed_from_u64(agent_seed.rotate_left(32));
        let mut batches = 0u64;
        let mut rows_written = 0usize;

        for round_index in 0..self.config.rounds.count {
            let outcome = self.play_round(
                round_index,
                &mut env,
                agent.as_mut(),
                &mut store,
                collector.as_deref_mut(),
            )?;

            if self.logging_enabled && tracing::enabled!(Level::DEBUG) {
                event!(
                    target: "blackjack_bench::round",
                    Level::DEBUG,
                    run_id = %self.config.run_id,
                    agent = %blueprint.name,
                    round_index = round_index as u64,
                    true_count = outcome.true_count,
                    bet = outcome.bet,
                    net_result = outcome.net_result
                );
            }

            analytics.record_round(&blueprint.name, &outcome)?;
            write_round_row(writer, &self.config.run_id, &blueprint.name, &outcome)?;
            rows_written += 1;

            let experience = &self.config.experience;
            if experience.sample_every > 0
                && (round_index + 1) % experience.sample_every == 0
                && store.len() >= experience.batch_size
            {
                let batch = store.sample_biased(
                    experience.batch_size,
                    experience.high_fraction,
                    &mut sample_rng,
                )?;
                agent.observe_batch(&batch);
                batches += 1;
            }
        }

        let composition = store.composition();
        event!(
            target: "blackjack_bench::experience",
            Level::INFO,
            agent = %blueprint.name,
            kind = blueprint.kind.as_str(),
            stored = store.len(),
            low = composition.buckets.low,
            mid = composition.buckets.mid,
            high = composition.buckets.high,
            batches,
            "agent run complete"
        );
        analytics.record_composition(&blueprint.name, composition, batches)?;
        Ok(rows_written)
    }

    fn play_round(
        &self,
        round_index: usize,
        env: &mut BlackjackEnv,
        agent: &mut dyn Agent,
        store: &mut ExperienceStore,
        mut collector: Option<&mut ExperienceCollector>,
    ) -> Result<RoundOutcome, RunnerError> {
        let true_count = env.betting_observation().true_count as f64;
        let units = self.config.betting.units_for(true_count);
        let bet = f64::from(units) * self.config.betting.unit();

        let mut state = env.reset(bet).to_vec();
        let mut actions = Vec::new();
        let mut reward = 0.0f64;
        let mut step_id = 0u32;

        let last = loop {
            let action = {
                let round = env.round().ok_or(EnvError::NotStarted)?;
                let legal = round.legal_actions();
                agent.choose_action(&PolicyContext {
                    observation: &state,
                    legal_actions: &legal,
                    round,
                })
            };
            actions.push(action);

            let step = env.step(action)?;
            reward += f64::from(step.reward);
            let next_state = step.obs.to_vec();
            let transition = Transition {
                state,
                action,
                reward: step.reward,
                next_state: next_state.clone(),
                terminal: step.done,
            };
            agent.observe_transition(&transition);
            let bucket = store.add(transition.clone());
            if let Some(collector) = collector.as_deref_mut() {
                collector.record(&ExperienceRecord {
                    round_id: round_index as u64,
                    step_id,
                    bucket,
                    transition,
                })?;
            }
            step_id += 1;

            if step.done {
                break step;
            }
            state = next_state;
        };

        let round = env.round().ok_or(EnvError::NotStarted)?;
        let ledger = last
            .info
            .ledger
            .unwrap_or_else(|| round.ledger().summary());
        Ok(RoundOutcome {
            round_index,
            true_count,
            units,
            bet,
            reward,
            net_result: ledger.net_result,
            total_staked: ledger.total_staked,
            hands: round.hands().len(),
            splits: round.split_count(),
            forfeited: matches!(last.info.event, StepEvent::Forfeited { .. }),
            actions,
            outcomes: round.hands().iter().filter_map(|hand| hand.outcome).collect(),
            dealer_total: round.dealer().total(),
        })
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// `dir/experience.jsonl` becomes `dir/experience.<agent>.jsonl`.
fn agent_path(path: &Path, agent: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "experience".to_string());
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}.{}.{}", agent.replace('/', "_"), ext.to_string_lossy()),
        None => format!("{stem}.{}", agent.replace('/', "_")),
    };
    path.with_file_name(file_name)
}

fn write_round_row(
    writer: &mut BufWriter<File>,
    run_id: &str,
    agent: &str,
    outcome: &RoundOutcome,
) -> Result<(), RunnerError> {
    let row = RoundLogRow {
        run_id,
        round_id: format!("R{:06}", outcome.round_index),
        agent,
        round_index: outcome.round_index,
        true_count: outcome.true_count,
        units: outcome.units,
        bet: outcome.bet,
        actions: outcome.actions.iter().map(|a| a.as_str()).collect(),
        outcomes: outcome.outcomes.iter().map(|o| o.as_str()).collect(),
        hands: outcome.hands,
        splits: outcome.splits,
        dealer_total: outcome.dealer_total,
        forfeited: outcome.forfeited,
        reward: outcome.reward,
        total_staked: outcome.total_staked,
        net_result: outcome.net_result,
    };
    serde_json::to_writer(&mut *writer, &row)?;
    writer.write_all(b"\n")?;
    Ok(())
}

#[derive(Serialize)]
struct RoundLogRow<'a> {
    run_id: &'a str,
    round_id: String,
    agent: &'a str,
    round_index: usize,
    true_count: f64,
    units: u32,
    bet: f64,
    actions: Vec<&'static str>,
    outcomes: Vec<&'static str>,
    hands: usize,
    splits: u8,
    dealer_total: u8,
    forfeited: bool,
    reward: f64,
    total_staked: f64,
    net_result: f64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("environment error: {0}")]
    Env(#[from] EnvError),
    #[error("experience error: {0}")]
    Experience(#[from] ExperienceError),
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}
