// Actuator drive mode, relayed to the channel without interpretation
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Eco,
    Sport,
}

impl Mode {
    /// Numeric value written to the actuator field
    pub fn channel_value(self) -> u8 {
        match self {
            Mode::Eco => 0,
            Mode::Sport => 1,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Eco => f.write_str("eco"),
            Mode::Sport => f.write_str("sport"),
        }
    }
}
