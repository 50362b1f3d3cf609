use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use blackjack_core::model::action::Action;
use blackjack_rl::rl::Composition;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::config::{AgentKind, SimulationConfig};
use crate::simulation::RoundOutcome;

const CONFIDENCE_Z: f64 = 1.96; // 95% CI

/// Pre-round true count bins, truncated toward zero and clamped at +-5.
pub const TRUE_COUNT_BINS: [&str; 11] = [
    "≤-5", "-4", "-3", "-2", "-1", "0", "1", "2", "3", "4", "≥5",
];

pub fn true_count_bin(true_count: f64) -> usize {
    if true_count <= -5.0 {
        0
    } else if true_count >= 5.0 {
        TRUE_COUNT_BINS.len() - 1
    } else {
        (true_count.trunc() as i64 + 5) as usize
    }
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("baseline agent '{0}' not present in simulation results")]
    MissingBaseline(String),
    #[error("agent '{0}' defined in results but missing from configuration")]
    UnknownAgent(String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub struct AnalyticsCollector {
    baseline: String,
    agents: HashMap<String, AgentAccumulator>,
    agent_order: Vec<String>,
}

impl AnalyticsCollector {
    pub fn new(config: &SimulationConfig) -> Result<Self, AnalyticsError> {
        let baseline = config
            .metrics
            .baseline
            .clone()
            .ok_or_else(|| AnalyticsError::MissingBaseline("<unset>".into()))?;

        let mut agents = HashMap::new();
        let mut order = Vec::new();
        for agent in &config.agents {
            agents.insert(
                agent.name.clone(),
                AgentAccumulator::new(
                    agent.name.clone(),
                    agent.kind,
                    config.metrics.initial_bankroll,
                ),
            );
            order.push(agent.name.clone());
        }

        Ok(Self {
            baseline,
            agents,
            agent_order: order,
        })
    }

    pub fn record_round(
        &mut self,
        agent: &str,
        outcome: &RoundOutcome,
    ) -> Result<(), AnalyticsError> {
        self.agent_mut(agent)?.record_round(outcome);
        Ok(())
    }

    pub fn record_composition(
        &mut self,
        agent: &str,
        composition: Composition,
        batches: u64,
    ) -> Result<(), AnalyticsError> {
        let acc = self.agent_mut(agent)?;
        acc.composition = Some(composition);
        acc.batches = batches;
        Ok(())
    }

    fn agent_mut(&mut self, agent: &str) -> Result<&mut AgentAccumulator, AnalyticsError> {
        self.agents
            .get_mut(agent)
            .ok_or_else(|| AnalyticsError::UnknownAgent(agent.to_string()))
    }

    pub fn finalize(mut self) -> Result<AnalyticsSummary, AnalyticsError> {
        let baseline_nets = self
            .agents
            .get(&self.baseline)
            .map(|acc| acc.per_round_net.clone())
            .ok_or_else(|| AnalyticsError::MissingBaseline(self.baseline.clone()))?;

        let mut reports = Vec::new();
        for name in &self.agent_order {
            if let Some(acc) = self.agents.remove(name) {
                let p_value_vs_baseline = if *name == self.baseline {
                    1.0
                } else {
                    welch_p_value(&acc.per_round_net, &baseline_nets)
                };
                reports.push(acc.into_report(p_value_vs_baseline));
            }
        }

        Ok(AnalyticsSummary {
            baseline: self.baseline,
            agents: reports,
        }
        .enrich())
    }
}

struct AgentAccumulator {
    name: String,
    kind: AgentKind,
    initial_bankroll: f64,
    per_round_net: Vec<f64>,
    wins: usize,
    losses: usize,
    pushes: usize,
    forfeits: usize,
    splits: usize,
    actions: [u64; 4],
    ev_bins: [BinAccumulator; 11],
    total_bet: f64,
    total_staked: f64,
    bankroll: f64,
    min_bankroll: f64,
    bet_units: BTreeMap<u32, u64>,
    composition: Option<Composition>,
    batches: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct BinAccumulator {
    rounds: u64,
    net: f64,
}

impl AgentAccumulator {
    fn new(name: String, kind: AgentKind, initial_bankroll: f64) -> Self {
        Self {
            name,
            kind,
            initial_bankroll,
            per_round_net: Vec::new(),
            wins: 0,
            losses: 0,
            pushes: 0,
            forfeits: 0,
            splits: 0,
            actions: [0; 4],
            ev_bins: [BinAccumulator::default(); 11],
            total_bet: 0.0,
            total_staked: 0.0,
            bankroll: initial_bankroll,
            min_bankroll: initial_bankroll,
            bet_units: BTreeMap::new(),
            composition: None,
            batches: 0,
        }
    }

    fn record_round(&mut self, outcome: &RoundOutcome) {
        let net = outcome.net_result;
        self.per_round_net.push(net);
        if net > 0.0 {
            self.wins += 1;
        } else if net < 0.0 {
            self.losses += 1;
        } else {
            self.pushes += 1;
        }
        if outcome.forfeited {
            self.forfeits += 1;
        }
        self.splits += usize::from(outcome.splits);
        for action in &outcome.actions {
            self.actions[usize::from(action.code())] += 1;
        }

        let bin = &mut self.ev_bins[true_count_bin(outcome.true_count)];
        bin.rounds += 1;
        bin.net += net;

        self.total_bet += outcome.bet;
        self.total_staked += outcome.total_staked;
        self.bankroll += net;
        self.min_bankroll = self.min_bankroll.min(self.bankroll);
        *self.bet_units.entry(outcome.units).or_insert(0) += 1;
    }

    fn into_report(self, p_value_vs_baseline: f64) -> AgentReport {
        let rounds = self.per_round_net.len();
        let total_net: f64 = self.per_round_net.iter().sum();
        let mean_net = if rounds == 0 {
            0.0
        } else {
            total_net / rounds as f64
        };
        let rate = |count: usize| {
            if rounds == 0 {
                0.0
            } else {
                count as f64 / rounds as f64
            }
        };
        let total_actions: u64 = self.actions.iter().sum();
        let action_mix = Action::ALL
            .iter()
            .map(|action| ActionShare {
                action: action.as_str(),
                count: self.actions[usize::from(action.code())],
                share: if total_actions == 0 {
                    0.0
                } else {
                    self.actions[usize::from(action.code())] as f64 / total_actions as f64
                },
            })
            .collect();
        let ev_by_true_count = TRUE_COUNT_BINS
            .iter()
            .zip(self.ev_bins.iter())
            .filter(|(_, bin)| bin.rounds > 0)
            .map(|(label, bin)| TrueCountBin {
                bin: *label,
                rounds: bin.rounds,
                ev_per_round: bin.net / bin.rounds as f64,
            })
            .collect();

        AgentReport {
            name: self.name,
            kind: self.kind,
            rounds,
            total_net,
            mean_net,
            ci95: confidence_interval(&self.per_round_net),
            p_value: z_test_p_value(&self.per_round_net),
            p_value_vs_baseline,
            win_rate: rate(self.wins),
            loss_rate: rate(self.losses),
            push_rate: rate(self.pushes),
            forfeits: self.forfeits,
            splits: self.splits,
            action_mix,
            ev_by_true_count,
            betting: BettingReport {
                initial_bankroll: self.initial_bankroll,
                final_bankroll: self.bankroll,
                min_bankroll: self.min_bankroll,
                total_bet: self.total_bet,
                total_staked: self.total_staked,
                average_bet: if rounds == 0 {
                    0.0
                } else {
                    self.total_bet / rounds as f64
                },
                roi_percent: if self.total_bet > 0.0 {
                    total_net / self.total_bet * 100.0
                } else {
                    0.0
                },
                bet_frequency: self.bet_units,
            },
            composition: self.composition,
            batches: self.batches,
            delta_vs_baseline: 0.0, // Filled later once we know baseline report
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub baseline: String,
    pub agents: Vec<AgentReport>,
}

impl AnalyticsSummary {
    pub fn enrich(mut self) -> Self {
        let baseline_mean = self
            .agents
            .iter()
            .find(|agent| agent.name == self.baseline)
            .map(|agent| agent.mean_net)
            .unwrap_or(0.0);
        for agent in &mut self.agents {
            agent.delta_vs_baseline = agent.mean_net - baseline_mean;
        }
        self
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Simulation Summary\n\n");
        let _ = writeln!(out, "Baseline: `{}`\n", self.baseline);

        out.push_str("| Agent | Kind | Rounds | Mean $/round | Δ vs baseline | 95% CI | p (≠0) | p (vs baseline) | Win % | Loss % | Push % |\n");
        out.push_str("|-------|------|--------|--------------|---------------|--------|--------|-----------------|-------|--------|--------|\n");
        for agent in &self.agents {
            let _ = writeln!(
                out,
                "| {name} | {kind} | {rounds} | {mean:+.3} | {delta:+.3} | [{lo:.3}, {hi:.3}] | {p:.3} | {pb:.3} | {win:.1}% | {loss:.1}% | {push:.1}% |",
                name = agent.name,
                kind = agent.kind.as_str(),
                rounds = agent.rounds,
                mean = agent.mean_net,
                delta = agent.delta_vs_baseline,
                lo = agent.ci95.0,
                hi = agent.ci95.1,
                p = agent.p_value,
                pb = agent.p_value_vs_baseline,
                win = agent.win_rate * 100.0,
                loss = agent.loss_rate * 100.0,
                push = agent.push_rate * 100.0,
            );
        }

        out.push_str("\n## Action mix\n\n");
        out.push_str("| Agent | Hit | Stand | Double | Split | Forfeits |\n");
        out.push_str("|-------|-----|-------|--------|-------|----------|\n");
        for agent in &self.agents {
            let shares: Vec<String> = agent
                .action_mix
                .iter()
                .map(|share| format!("{:.1}%", share.share * 100.0))
                .collect();
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                agent.name,
                shares.join(" | "),
                agent.forfeits
            );
        }

        out.push_str("\n## EV by true count\n\n");
        let _ = write!(out, "| Agent |");
        for label in TRUE_COUNT_BINS {
            let _ = write!(out, " {label} |");
        }
        out.push('\n');
        out.push_str("|-------|");
        out.push_str(&"-----|".repeat(TRUE_COUNT_BINS.len()));
        out.push('\n');
        for agent in &self.agents {
            let _ = write!(out, "| {} |", agent.name);
            for label in TRUE_COUNT_BINS {
                match agent.ev_by_true_count.iter().find(|bin| bin.bin == label) {
                    Some(bin) => {
                        let _ = write!(out, " {:+.3} |", bin.ev_per_round);
                    }
                    None => out.push_str(" - |"),
                }
            }
            out.push('\n');
        }

        out.push_str("\n## Betting\n\n");
        out.push_str("| Agent | Final bankroll | Min bankroll | Avg bet | ROI % | Bet frequency (units: rounds) |\n");
        out.push_str("|-------|----------------|--------------|---------|-------|-------------------------------|\n");
        for agent in &self.agents {
            let betting = &agent.betting;
            let frequency: Vec<String> = betting
                .bet_frequency
                .iter()
                .map(|(units, count)| format!("{units}: {count}"))
                .collect();
            let _ = writeln!(
                out,
                "| {} | {:.2} | {:.2} | {:.2} | {:+.2} | {} |",
                agent.name,
                betting.final_bankroll,
                betting.min_bankroll,
                betting.average_bet,
                betting.roi_percent,
                frequency.join(", ")
            );
        }

        out.push_str("\n## Experience composition\n\n");
        out.push_str("| Agent | Hit | Stand | Double | Split | Low | Mid | High | Batches |\n");
        out.push_str("|-------|-----|-------|--------|-------|-----|-----|------|---------|\n");
        for agent in &self.agents {
            match &agent.composition {
                Some(c) => {
                    let _ = writeln!(
                        out,
                        "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                        agent.name,
                        c.hit,
                        c.stand,
                        c.double,
                        c.split,
                        c.buckets.low,
                        c.buckets.mid,
                        c.buckets.high,
                        agent.batches
                    );
                }
                None => {
                    let _ = writeln!(out, "| {} | - | - | - | - | - | - | - | - |", agent.name);
                }
            }
        }
        out
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        fs::write(path.as_ref(), self.to_markdown()).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub name: String,
    pub kind: AgentKind,
    pub rounds: usize,
    pub total_net: f64,
    pub mean_net: f64,
    pub ci95: (f64, f64),
    /// Two-sided normal-approximation test of a zero mean.
    pub p_value: f64,
    pub p_value_vs_baseline: f64,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub push_rate: f64,
    pub forfeits: usize,
    pub splits: usize,
    pub action_mix: Vec<ActionShare>,
    pub ev_by_true_count: Vec<TrueCountBin>,
    pub betting: BettingReport,
    pub composition: Option<Composition>,
    pub batches: u64,
    #[serde(skip)]
    pub delta_vs_baseline: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionShare {
    pub action: &'static str,
    pub count: u64,
    pub share: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrueCountBin {
    pub bin: &'static str,
    pub rounds: u64,
    pub ev_per_round: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BettingReport {
    pub initial_bankroll: f64,
    pub final_bankroll: f64,
    pub min_bankroll: f64,
    pub total_bet: f64,
    pub total_staked: f64,
    pub average_bet: f64,
    pub roi_percent: f64,
    pub bet_frequency: BTreeMap<u32, u64>,
}

fn mean_and_variance(points: &[f64]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean = points.iter().sum::<f64>() / n;
    let variance = points
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    Some((mean, variance))
}

fn confidence_interval(points: &[f64]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let Some((mean, variance)) = mean_and_variance(points) else {
        return (points[0], points[0]);
    };
    let std_error = (variance / points.len() as f64).sqrt();
    let margin = CONFIDENCE_Z * std_error;
    (mean - margin, mean + margin)
}

fn two_sided_p(z: f64) -> f64 {
    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return 1.0;
    };
    (2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0)
}

fn z_test_p_value(points: &[f64]) -> f64 {
    let Some((mean, variance)) = mean_and_variance(points) else {
        return 1.0;
    };
    let std_error = (variance / points.len() as f64).sqrt();
    if std_error <= 0.0 {
        return if mean == 0.0 { 1.0 } else { 0.0 };
    }
    two_sided_p(mean / std_error)
}

fn welch_p_value(a: &[f64], b: &[f64]) -> f64 {
    let (Some((mean_a, var_a)), Some((mean_b, var_b))) =
        (mean_and_variance(a), mean_and_variance(b))
    else {
        return 1.0;
    };
    let std_error = (var_a / a.len() as f64 + var_b / b.len() as f64).sqrt();
    if std_error <= 0.0 {
        return if mean_a == mean_b { 1.0 } else { 0.0 };
    }
    two_sided_p((mean_a - mean_b) / std_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_truncate_toward_zero() {
        assert_eq!(TRUE_COUNT_BINS[true_count_bin(-7.2)], "≤-5");
        assert_eq!(TRUE_COUNT_BINS[true_count_bin(-5.0)], "≤-5");
        assert_eq!(TRUE_COUNT_BINS[true_count_bin(-4.9)], "-4");
        assert_eq!(TRUE_COUNT_BINS[true_count_bin(-0.5)], "0");
        assert_eq!(TRUE_COUNT_BINS[true_count_bin(0.0)], "0");
        assert_eq!(TRUE_COUNT_BINS[true_count_bin(3.99)], "3");
        assert_eq!(TRUE_COUNT_BINS[true_count_bin(5.0)], "≥5");
    }

    #[test]
    fn confidence_interval_brackets_mean() {
        let points = [10.0, -10.0, 10.0, -10.0, 0.0];
        let (lo, hi) = confidence_interval(&points);
        assert!(lo < 0.0 && hi > 0.0);
        assert!((lo + hi).abs() < 1e-12);
        assert_eq!(confidence_interval(&[4.0]), (4.0, 4.0));
    }

    #[test]
    fn p_values_behave_at_extremes() {
        let symmetric = [1.0, -1.0, 1.0, -1.0];
        assert!((z_test_p_value(&symmetric) - 1.0).abs() < 1e-9);
        let shifted: Vec<f64> = (0..200).map(|i| 5.0 + (i % 3) as f64).collect();
        assert!(z_test_p_value(&shifted) < 1e-6);
        assert_eq!(welch_p_value(&[1.0], &[2.0, 3.0]), 1.0);
        assert!(welch_p_value(&shifted, &symmetric) < 0.05);
    }
}
