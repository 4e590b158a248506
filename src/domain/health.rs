// State-of-health scoring from one instantaneous sample
use super::battery::BatterySpec;
use serde::{Deserialize, Serialize};

/// Scoring strategy. The two models use different scales and are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthModel {
    /// Start at 100 and subtract threshold penalties
    #[default]
    Penalty,
    /// Multiply independent factors in [0, 1]
    Factor,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthEstimator {
    spec: BatterySpec,
    model: HealthModel,
}

impl HealthEstimator {
    pub fn new(spec: BatterySpec, model: HealthModel) -> Self {
        Self { spec, model }
    }

    pub fn model(&self) -> HealthModel {
        self.model
    }

    /// SOH in percent, clamped to [0, 100]. Current is only used by the
    /// penalty model.
    pub fn estimate(&self, voltage: f64, temperature: f64, current: Option<f64>) -> f64 {
        let soh = match self.model {
            HealthModel::Penalty => 100.0 - self.penalty_total(voltage, temperature, current),
            HealthModel::Factor => {
                self.voltage_factor(voltage) * temperature_factor(temperature) * 100.0
            }
        };
        soh.clamp(0.0, 100.0)
    }

    fn penalty_total(&self, voltage: f64, temperature: f64, current: Option<f64>) -> f64 {
        let current = current.filter(|c| c.is_finite()).unwrap_or(0.0);

        self.voltage_sag_penalty(voltage, current)
            + temperature_penalty(temperature)
            + deep_discharge_penalty(voltage)
            + self.discharge_rate_penalty(current)
            + overcharge_penalty(voltage)
    }

    fn voltage_sag_penalty(&self, voltage: f64, current: f64) -> f64 {
        if current == 0.0 {
            return 0.0;
        }
        let expected = self.spec.nominal_voltage - 0.1 * current.abs();
        let shortfall = expected - voltage;
        if shortfall > 0.2 {
            10.0
        } else if shortfall > 0.1 {
            5.0
        } else {
            0.0
        }
    }

    fn discharge_rate_penalty(&self, current: f64) -> f64 {
        let c_rate = self.spec.c_rate(current);
        if c_rate > 2.0 {
            8.0
        } else if c_rate > 1.5 {
            5.0
        } else if c_rate > 1.0 {
            2.0
        } else {
            0.0
        }
    }

    fn voltage_factor(&self, voltage: f64) -> f64 {
        if voltage < self.spec.min_voltage + 0.2 {
            0.8
        } else if voltage < self.spec.nominal_voltage {
            0.9
        } else {
            1.0
        }
    }
}

// 20-40 °C is the optimal band
fn temperature_penalty(temperature: f64) -> f64 {
    if temperature > 60.0 {
        15.0
    } else if temperature > 50.0 {
        10.0
    } else if temperature > 40.0 {
        5.0
    } else if temperature < 0.0 {
        8.0
    } else if temperature < 10.0 {
        3.0
    } else {
        0.0
    }
}

fn deep_discharge_penalty(voltage: f64) -> f64 {
    if voltage < 3.0 {
        20.0
    } else if voltage < 3.2 {
        10.0
    } else if voltage < 3.4 {
        3.0
    } else {
        0.0
    }
}

fn overcharge_penalty(voltage: f64) -> f64 {
    if voltage > 4.25 {
        15.0
    } else if voltage > 4.22 {
        5.0
    } else {
        0.0
    }
}

fn temperature_factor(temperature: f64) -> f64 {
    if temperature > 45.0 || temperature < 0.0 {
        0.85
    } else if temperature > 35.0 || temperature < 10.0 {
        0.95
    } else {
        1.0
    }
}
