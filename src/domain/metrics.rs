// Derived battery metrics and the response record built from them
use super::battery::BatterySpec;
use super::health::HealthModel;
use super::telemetry::TelemetrySample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EFFICIENCY_FACTOR: f64 = 0.85;
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 25.0;

/// Runtime reported when no discharge current flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Idle runtime is the available capacity figure (Ah reported as hours)
    #[default]
    Legacy,
    /// Idle runtime is zero hours
    Fixed,
}

/// Pure functions of SOC, voltage and current.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCalculator {
    spec: BatterySpec,
    efficiency_factor: f64,
    average_speed_kmh: f64,
    runtime_mode: RuntimeMode,
}

impl MetricsCalculator {
    pub fn new(
        spec: BatterySpec,
        efficiency_factor: f64,
        average_speed_kmh: f64,
        runtime_mode: RuntimeMode,
    ) -> Self {
        Self {
            spec,
            efficiency_factor,
            average_speed_kmh,
            runtime_mode,
        }
    }

    pub fn runtime_hours(&self, soc_percent: f64, current_amps: f64) -> f64 {
        let available_ah = self.spec.available_capacity_ah(soc_percent);
        // NaN current falls through here too
        if !(current_amps > 0.0) {
            return match self.runtime_mode {
                RuntimeMode::Legacy => available_ah.max(0.0),
                RuntimeMode::Fixed => 0.0,
            };
        }
        (available_ah / current_amps.abs() * self.efficiency_factor).max(0.0)
    }

    pub fn range_km(&self, soc_percent: f64, current_amps: f64) -> f64 {
        self.runtime_hours(soc_percent, current_amps) * self.average_speed_kmh
    }

    pub fn power_watts(&self, voltage: f64, current_amps: f64) -> f64 {
        voltage * current_amps.abs()
    }

    pub fn energy_watt_hours(&self, voltage: f64, soc_percent: f64) -> f64 {
        voltage * self.spec.available_capacity_ah(soc_percent)
    }
}

/// Metrics returned to API clients for one estimation cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryMetrics {
    pub soc_percent: u8,
    pub soh_percent: u8,
    pub runtime_hours: f64,
    pub range_km: f64,
    pub power_watts: f64,
    pub energy_watt_hours: f64,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub charging_status: String,
    pub health_model: HealthModel,
    pub sampled_at: DateTime<Utc>,
}

impl BatteryMetrics {
    /// Build the record from unrounded estimates, rounding each field to its
    /// display precision. Runtime, range and energy derive from the displayed
    /// SOC so the record agrees with itself.
    pub fn assemble(
        sample: &TelemetrySample,
        soc_percent: f64,
        soh_percent: f64,
        health_model: HealthModel,
        calculator: &MetricsCalculator,
    ) -> Self {
        let displayed_soc = to_percent(soc_percent);
        let soc = f64::from(displayed_soc);
        Self {
            soc_percent: displayed_soc,
            soh_percent: to_percent(soh_percent),
            runtime_hours: round_to(calculator.runtime_hours(soc, sample.current), 2),
            range_km: round_to(calculator.range_km(soc, sample.current), 1),
            power_watts: round_to(calculator.power_watts(sample.voltage, sample.current), 2),
            energy_watt_hours: round_to(calculator.energy_watt_hours(sample.voltage, soc), 2),
            voltage: round_to(sample.voltage, 2),
            current: round_to(sample.current, 2),
            temperature: round_to(sample.temperature, 1),
            charging_status: sample.charging_status().to_string(),
            health_model,
            sampled_at: sample.observed_at,
        }
    }
}

fn to_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

/// Round to a fixed number of decimals for display
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator(mode: RuntimeMode) -> MetricsCalculator {
        MetricsCalculator::new(
            BatterySpec::default(),
            DEFAULT_EFFICIENCY_FACTOR,
            DEFAULT_AVERAGE_SPEED_KMH,
            mode,
        )
    }

    #[test]
    fn test_runtime_and_range_under_load() {
        let calc = calculator(RuntimeMode::Legacy);
        assert!((calc.runtime_hours(50.0, 1.0) - 0.85).abs() < 1e-9);
        assert!((calc.range_km(50.0, 1.0) - 21.25).abs() < 1e-9);
    }

    #[test]
    fn test_legacy_idle_runtime_reports_capacity() {
        let calc = calculator(RuntimeMode::Legacy);
        assert_eq!(calc.runtime_hours(50.0, 0.0), 1.0);
        assert_eq!(calc.runtime_hours(50.0, -1.5), 1.0);
        assert_eq!(calc.runtime_hours(50.0, f64::NAN), 1.0);
        assert_eq!(calc.range_km(50.0, 0.0), 25.0);
    }

    #[test]
    fn test_fixed_idle_runtime_is_zero() {
        let calc = calculator(RuntimeMode::Fixed);
        assert_eq!(calc.runtime_hours(50.0, 0.0), 0.0);
        assert_eq!(calc.runtime_hours(50.0, -1.5), 0.0);
        assert_eq!(calc.range_km(80.0, 0.0), 0.0);
        assert!((calc.runtime_hours(50.0, 1.0) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_power_and_energy() {
        let calc = calculator(RuntimeMode::Legacy);
        assert!((calc.power_watts(3.7, -2.0) - 7.4).abs() < 1e-9);
        assert!((calc.energy_watt_hours(3.7, 100.0) - 7.4).abs() < 1e-9);
        assert_eq!(calc.energy_watt_hours(3.7, 0.0), 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(21.26, 1), 21.3);
        assert_eq!(round_to(-0.456, 2), -0.46);
    }

    #[test]
    fn test_assemble_rounds_for_display() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let sample = TelemetrySample::new(3.7123, 1.0049, 24.56, false, now);
        let calc = calculator(RuntimeMode::Legacy);

        let metrics = BatteryMetrics::assemble(&sample, 49.6, 97.4, HealthModel::Penalty, &calc);

        assert_eq!(metrics.soc_percent, 50);
        assert_eq!(metrics.soh_percent, 97);
        assert_eq!(metrics.voltage, 3.71);
        assert_eq!(metrics.current, 1.0);
        assert_eq!(metrics.temperature, 24.6);
        assert_eq!(metrics.charging_status, "Discharging");
        assert_eq!(metrics.sampled_at, now);
        assert!(metrics.runtime_hours >= 0.0);
    }

    #[test]
    fn test_derived_fields_follow_displayed_soc() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let sample = TelemetrySample::new(4.0, 0.5, 25.0, false, now);
        let calc = calculator(RuntimeMode::Legacy);

        let metrics = BatteryMetrics::assemble(&sample, 49.6, 100.0, HealthModel::Penalty, &calc);

        // 50 % of 2 Ah at 4 V, and 1 Ah / 0.5 A * 0.85
        assert_eq!(metrics.soc_percent, 50);
        assert_eq!(metrics.energy_watt_hours, 4.0);
        assert_eq!(metrics.runtime_hours, 1.7);
        assert_eq!(metrics.range_km, 42.5);
    }

    #[test]
    fn test_metrics_serialize_camel_case() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let sample = TelemetrySample::new(3.7, 0.0, 25.0, true, now);
        let calc = calculator(RuntimeMode::Legacy);
        let metrics = BatteryMetrics::assemble(&sample, 100.0, 100.0, HealthModel::Factor, &calc);

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["socPercent"], 100);
        assert_eq!(json["runtimeHours"], 2.0);
        assert_eq!(json["chargingStatus"], "Charging");
        assert_eq!(json["healthModel"], "factor");
    }
}
