//! Labelled hit/stand samples for supervised warm starts.
//!
//! Fresh rounds are dealt from a seeded shoe and the opening state is
//! labelled with the basic strategy table. Only totals the table covers are
//! kept, and each label is capped so the two classes stay balanced.

use crate::rl::{BlackjackEnv, EnvConfig};
use crate::rl::observation::SCHEMA_VERSION;
use blackjack_bot::policy::{basic_strategy_action, table_covers};
use blackjack_core::model::action::Action;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize dataset row: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub per_label: usize,
    pub seed: u64,
    pub base_bet: f64,
    /// Upper bound on rounds dealt, reached only if one label is starved.
    pub max_deals: u64,
    pub env: EnvConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            per_label: 20_000,
            seed: 0,
            base_bet: 10.0,
            max_deals: 10_000_000,
            env: EnvConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledSample {
    pub features: Vec<f32>,
    pub total: u8,
    pub soft: bool,
    pub dealer_value: u8,
    pub label: Action,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub schema: String,
    pub hits: usize,
    pub stands: usize,
    pub deals: u64,
    pub samples: Vec<LabelledSample>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// One sample per line.
    pub fn write_jsonl<P: AsRef<Path>>(&self, path: P) -> Result<(), DatasetError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for sample in &self.samples {
            serde_json::to_writer(&mut writer, sample)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

pub fn generate(config: &DatasetConfig) -> Dataset {
    let mut env = BlackjackEnv::new(config.env, config.seed);
    let mut dataset = Dataset {
        schema: SCHEMA_VERSION.to_string(),
        ..Dataset::default()
    };

    while (dataset.hits < config.per_label || dataset.stands < config.per_label)
        && dataset.deals < config.max_deals
    {
        let obs = env.reset(config.base_bet);
        dataset.deals += 1;

        let total = obs.total as u8;
        let soft = obs.is_soft > 0.5;
        let dealer_value = obs.dealer_value as u8;
        if !table_covers(total, soft) {
            continue;
        }

        let label = basic_strategy_action(total, soft, dealer_value);
        let slot = match label {
            Action::Hit => &mut dataset.hits,
            _ => &mut dataset.stands,
        };
        if *slot >= config.per_label {
            continue;
        }
        *slot += 1;
        dataset.samples.push(LabelledSample {
            features: obs.to_vec(),
            total,
            soft,
            dealer_value,
            label,
        });
    }

    if dataset.deals >= config.max_deals {
        debug!(
            target: "blackjack_rl::dataset",
            hits = dataset.hits,
            stands = dataset.stands,
            "deal limit reached before both labels filled"
        );
    }
    info!(
        target: "blackjack_rl::dataset",
        samples = dataset.len(),
        deals = dataset.deals,
        "dataset generated"
    );
    dataset
}
