// Battery service - one estimation cycle per request, plus calibration
use crate::application::clock::Clock;
use crate::application::telemetry_channel::{TelemetryChannel, TelemetryError};
use crate::domain::charge::{ChargeEstimator, ChargeState, DEFAULT_CALIBRATION_SOC};
use crate::domain::health::HealthEstimator;
use crate::domain::metrics::{BatteryMetrics, MetricsCalculator};
use crate::domain::mode::Mode;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of a calibration call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationOutcome {
    pub consumed_capacity_ah: f64,
    pub soc_percent: f64,
}

#[derive(Clone)]
pub struct BatteryService {
    channel: Arc<dyn TelemetryChannel>,
    clock: Arc<dyn Clock>,
    // Single writer per battery: update and reset never interleave
    estimator: Arc<Mutex<ChargeEstimator>>,
    health: HealthEstimator,
    calculator: MetricsCalculator,
}

impl BatteryService {
    pub fn new(
        channel: Arc<dyn TelemetryChannel>,
        clock: Arc<dyn Clock>,
        estimator: ChargeEstimator,
        health: HealthEstimator,
        calculator: MetricsCalculator,
    ) -> Self {
        Self {
            channel,
            clock,
            estimator: Arc::new(Mutex::new(estimator)),
            health,
            calculator,
        }
    }

    /// Fetch a sample, advance the charge integrator and derive all metrics
    pub async fn current_metrics(&self) -> Result<BatteryMetrics, TelemetryError> {
        let sample = self.channel.latest_sample().await?;

        let now = self.clock.now();
        let soc = self.lock_estimator().update(sample.current, now);
        let soh = self
            .health
            .estimate(sample.voltage, sample.temperature, Some(sample.current));

        tracing::debug!(
            soc,
            soh,
            voltage = sample.voltage,
            current = sample.current,
            temperature = sample.temperature,
            "Estimation cycle complete"
        );

        Ok(BatteryMetrics::assemble(
            &sample,
            soc,
            soh,
            self.health.model(),
            &self.calculator,
        ))
    }

    /// Assert a known SOC (full charge when omitted)
    pub fn calibrate(&self, asserted_soc_percent: Option<f64>) -> CalibrationOutcome {
        let asserted = asserted_soc_percent.unwrap_or(DEFAULT_CALIBRATION_SOC);
        let now = self.clock.now();

        let mut estimator = self.lock_estimator();
        let consumed_capacity_ah = estimator.reset(asserted, now);
        let soc_percent = estimator.soc_percent();
        drop(estimator);

        tracing::info!(
            asserted,
            consumed_capacity_ah,
            soc_percent,
            "Charge estimator calibrated"
        );

        CalibrationOutcome {
            consumed_capacity_ah,
            soc_percent,
        }
    }

    pub fn charge_snapshot(&self) -> ChargeState {
        self.lock_estimator().state().clone()
    }

    pub async fn set_mode(&self, mode: Mode) -> Result<(), TelemetryError> {
        self.channel.send_mode(mode).await?;
        tracing::info!(%mode, value = mode.channel_value(), "Mode relayed");
        Ok(())
    }

    fn lock_estimator(&self) -> MutexGuard<'_, ChargeEstimator> {
        // Plain numeric state stays valid across a poisoned lock
        self.estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::ManualClock;
    use crate::application::telemetry_channel::MockTelemetryChannel;
    use crate::domain::battery::BatterySpec;
    use crate::domain::charge::RechargePolicy;
    use crate::domain::health::HealthModel;
    use crate::domain::metrics::{
        DEFAULT_AVERAGE_SPEED_KMH, DEFAULT_EFFICIENCY_FACTOR, RuntimeMode,
    };
    use crate::domain::telemetry::TelemetrySample;
    use chrono::{DateTime, TimeDelta, Utc};

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn service(channel: MockTelemetryChannel, clock: Arc<ManualClock>) -> BatteryService {
        let spec = BatterySpec::default();
        BatteryService::new(
            Arc::new(channel),
            clock,
            ChargeEstimator::new(spec.rated_capacity_ah, RechargePolicy::Manual),
            HealthEstimator::new(spec, HealthModel::Penalty),
            MetricsCalculator::new(
                spec,
                DEFAULT_EFFICIENCY_FACTOR,
                DEFAULT_AVERAGE_SPEED_KMH,
                RuntimeMode::Legacy,
            ),
        )
    }

    fn discharging(current: f64) -> TelemetrySample {
        TelemetrySample::new(3.7, current, 25.0, false, start())
    }

    #[tokio::test]
    async fn test_cycles_integrate_between_requests() {
        let mut channel = MockTelemetryChannel::new();
        channel
            .expect_latest_sample()
            .times(2)
            .returning(|| Ok(discharging(1.0)));
        let clock = Arc::new(ManualClock::new(start()));
        let service = service(channel, clock.clone());

        let first = service.current_metrics().await.unwrap();
        assert_eq!(first.soc_percent, 100);

        clock.advance(TimeDelta::minutes(30));
        let second = service.current_metrics().await.unwrap();
        assert_eq!(second.soc_percent, 75);
        assert_eq!(second.soh_percent, 100);
        assert_eq!(second.power_watts, 3.7);
        // 1.5 Ah left at 1 A with 0.85 efficiency
        assert!((second.runtime_hours - 1.275).abs() <= 0.005 + 1e-9);
        assert!((second.range_km - 31.875).abs() <= 0.05 + 1e-9);
        assert_eq!(service.charge_snapshot().consumed_capacity_ah, 0.5);
    }

    #[tokio::test]
    async fn test_unavailable_telemetry_leaves_state_untouched() {
        let mut channel = MockTelemetryChannel::new();
        channel
            .expect_latest_sample()
            .returning(|| Err(TelemetryError::RateLimited));
        let clock = Arc::new(ManualClock::new(start()));
        let service = service(channel, clock);

        let result = service.current_metrics().await;
        assert!(matches!(result, Err(TelemetryError::RateLimited)));
        assert_eq!(service.charge_snapshot().last_update, None);
    }

    #[tokio::test]
    async fn test_calibrate_defaults_to_full() {
        let mut channel = MockTelemetryChannel::new();
        channel
            .expect_latest_sample()
            .returning(|| Ok(discharging(2.0)));
        let clock = Arc::new(ManualClock::new(start()));
        let service = service(channel, clock.clone());

        service.current_metrics().await.unwrap();
        clock.advance(TimeDelta::minutes(30));
        assert_eq!(service.current_metrics().await.unwrap().soc_percent, 50);

        let outcome = service.calibrate(None);
        assert_eq!(outcome.consumed_capacity_ah, 0.0);
        assert_eq!(outcome.soc_percent, 100.0);
        assert_eq!(service.charge_snapshot().last_update, Some(clock.now()));
    }

    #[test]
    fn test_calibrate_clamps_asserted_soc() {
        let clock = Arc::new(ManualClock::new(start()));
        let service = service(MockTelemetryChannel::new(), clock);

        let outcome = service.calibrate(Some(250.0));
        assert_eq!(outcome.soc_percent, 100.0);

        let outcome = service.calibrate(Some(25.0));
        assert_eq!(outcome.consumed_capacity_ah, 1.5);
        assert_eq!(outcome.soc_percent, 25.0);
    }

    #[tokio::test]
    async fn test_set_mode_relays_to_channel() {
        let mut channel = MockTelemetryChannel::new();
        channel
            .expect_send_mode()
            .withf(|mode| *mode == Mode::Sport)
            .times(1)
            .returning(|_| Ok(()));
        let clock = Arc::new(ManualClock::new(start()));
        let service = service(channel, clock);

        service.set_mode(Mode::Sport).await.unwrap();
    }
}
