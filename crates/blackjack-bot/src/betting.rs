use serde::{Deserialize, Serialize};

pub const DEFAULT_UNIT: f64 = 10.0;
pub const DEFAULT_RAMP: [u32; 5] = [1, 2, 4, 8, 16];

fn default_unit() -> f64 {
    DEFAULT_UNIT
}

fn default_ramp() -> Vec<u32> {
    DEFAULT_RAMP.to_vec()
}

/// Chooses the opening stake of a round from the shoe's true count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BetSizer {
    Flat {
        #[serde(default = "default_unit")]
        unit: f64,
    },
    /// Bets `ramp[i] * unit` where `i` is the floored true count, clamped
    /// to the ramp; counts below one bet the first step.
    TrueCountRamp {
        #[serde(default = "default_unit")]
        unit: f64,
        #[serde(default = "default_ramp")]
        ramp: Vec<u32>,
    },
}

impl Default for BetSizer {
    fn default() -> Self {
        BetSizer::Flat {
            unit: DEFAULT_UNIT,
        }
    }
}

impl BetSizer {
    pub fn unit(&self) -> f64 {
        match self {
            BetSizer::Flat { unit } | BetSizer::TrueCountRamp { unit, .. } => *unit,
        }
    }

    /// Units wagered at `true_count`.
    pub fn units_for(&self, true_count: f64) -> u32 {
        match self {
            BetSizer::Flat { .. } => 1,
            BetSizer::TrueCountRamp { ramp, .. } => {
                let Some(last) = ramp.len().checked_sub(1) else {
                    return 1;
                };
                let step = if true_count < 1.0 {
                    0
                } else {
                    (true_count.floor() as usize).min(last)
                };
                ramp[step]
            }
        }
    }

    pub fn bet_for(&self, true_count: f64) -> f64 {
        f64::from(self.units_for(true_count)) * self.unit()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BetSizer::Flat { .. } => "flat",
            BetSizer::TrueCountRamp { .. } => "true_count_ramp",
        }
    }
}
