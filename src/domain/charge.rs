// Coulomb-counting state-of-charge estimator
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// SOC asserted by a calibration call that carries no explicit value
pub const DEFAULT_CALIBRATION_SOC: f64 = 100.0;

/// What happens to the accumulator while current flows into the pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RechargePolicy {
    /// Charging current is ignored; SOC only rises through calibration
    #[default]
    Manual,
    /// Charging current is integrated back into the accumulator
    Integrate,
}

/// Accumulated charge bookkeeping for one physical battery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeState {
    pub rated_capacity_ah: f64,
    pub consumed_capacity_ah: f64,
    pub last_update: Option<DateTime<Utc>>,
    pub is_charging: bool,
}

impl ChargeState {
    /// Unrounded SOC, always within [0, 100]
    pub fn soc_percent(&self) -> f64 {
        if !(self.rated_capacity_ah > 0.0) {
            return 0.0;
        }
        let remaining = self.rated_capacity_ah - self.consumed_capacity_ah;
        (100.0 * remaining / self.rated_capacity_ah).clamp(0.0, 100.0)
    }
}

/// Integrates current over wall-clock time between successive samples.
///
/// The estimator is not synchronised; callers serialise `update` and `reset`
/// for a given battery.
#[derive(Debug, Clone)]
pub struct ChargeEstimator {
    state: ChargeState,
    policy: RechargePolicy,
}

impl ChargeEstimator {
    /// Starts from a full pack with no time anchor.
    pub fn new(rated_capacity_ah: f64, policy: RechargePolicy) -> Self {
        Self {
            state: ChargeState {
                rated_capacity_ah,
                consumed_capacity_ah: 0.0,
                last_update: None,
                is_charging: false,
            },
            policy,
        }
    }

    pub fn state(&self) -> &ChargeState {
        &self.state
    }

    pub fn soc_percent(&self) -> f64 {
        self.state.soc_percent()
    }

    /// Integrate `current_amps` since the previous update and return the new SOC.
    ///
    /// The first call only anchors the clock. A clock that did not advance (or
    /// went backwards) leaves the state untouched and returns the last SOC.
    pub fn update(&mut self, current_amps: f64, now: DateTime<Utc>) -> f64 {
        let current = if current_amps.is_finite() {
            current_amps
        } else {
            0.0
        };

        let Some(last_update) = self.state.last_update else {
            self.state.last_update = Some(now);
            return self.soc_percent();
        };

        let delta_hours = (now - last_update).num_milliseconds() as f64 / MILLIS_PER_HOUR;
        if delta_hours <= 0.0 {
            tracing::trace!(delta_hours, "clock did not advance, skipping integration");
            return self.soc_percent();
        }

        let delta_capacity_ah = current * delta_hours;
        if current > 0.0 {
            self.state.consumed_capacity_ah += delta_capacity_ah;
            self.state.is_charging = false;
        } else {
            self.state.is_charging = true;
            if self.policy == RechargePolicy::Integrate {
                self.state.consumed_capacity_ah += delta_capacity_ah;
            }
        }
        self.state.consumed_capacity_ah = self
            .state
            .consumed_capacity_ah
            .clamp(0.0, self.state.rated_capacity_ah.max(0.0));
        self.state.last_update = Some(now);

        self.soc_percent()
    }

    /// Re-seed the accumulator from an externally known SOC and return the
    /// resulting consumed capacity. Out-of-range values are clamped.
    pub fn reset(&mut self, asserted_soc_percent: f64, now: DateTime<Utc>) -> f64 {
        let asserted = if asserted_soc_percent.is_nan() {
            DEFAULT_CALIBRATION_SOC
        } else {
            asserted_soc_percent.clamp(0.0, 100.0)
        };

        self.state.consumed_capacity_ah =
            self.state.rated_capacity_ah.max(0.0) * (100.0 - asserted) / 100.0;
        self.state.last_update = Some(now);

        self.state.consumed_capacity_ah
    }
}
