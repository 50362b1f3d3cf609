use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use blackjack_bench::config::{ResolvedOutputs, SimulationConfig};
use blackjack_bench::logging::init_logging;
use blackjack_bench::simulation::SimulationRunner;

/// Batch simulation harness for blackjack agents.
#[derive(Debug, Parser)]
#[command(
    name = "blackjack-bench",
    author,
    version,
    about = "Deterministic blackjack simulation harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of rounds each agent plays.
    #[arg(long, value_name = "ROUNDS")]
    rounds: Option<usize>,

    /// Override the RNG seed for the shoe.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Exit after validating the configuration (no simulation is run).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = SimulationConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(rounds) = cli.rounds {
        config.rounds.count = rounds;
    }

    if let Some(seed) = cli.seed {
        config.rounds.seed = Some(seed);
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let agent_count = config.agents.len();
    let run_id = config.run_id.clone();
    let rounds = config.rounds.count;

    println!(
        "Loaded configuration '{run_id}' with {agent_count} agent{} ({rounds} rounds each, betting: {})",
        if agent_count == 1 { "" } else { "s" },
        config.betting.as_str()
    );

    let logging_guard = init_logging(&config.logging, &outputs, &run_id)?;
    let runner = SimulationRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: simulation skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Simulation complete for '{run_id}': {} agents × {} rounds → {} rows at {}",
        summary.agents,
        summary.rounds_per_agent,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    for path in &summary.experience_paths {
        println!("Experience export: {}", path.display());
    }
    if let Some(guard) = logging_guard.as_ref() {
        println!("Event log: {}", guard.log_path.display());
    }

    Ok(())
}
