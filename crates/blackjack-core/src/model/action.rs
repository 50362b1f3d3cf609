use serde::{Deserialize, Serialize};
use std::fmt;

/// Player decisions. Integer codes 0..=3 are accepted at the boundary and
/// parsed with [`Action::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Hit,
    Stand,
    Double,
    Split,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Hit, Action::Stand, Action::Double, Action::Split];

    pub const fn code(self) -> u8 {
        match self {
            Action::Hit => 0,
            Action::Stand => 1,
            Action::Double => 2,
            Action::Split => 3,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Action::Hit),
            1 => Some(Action::Stand),
            2 => Some(Action::Double),
            3 => Some(Action::Split),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Hit => "hit",
            Action::Stand => "stand",
            Action::Double => "double",
            Action::Split => "split",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
