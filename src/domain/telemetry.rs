// Telemetry sample domain model
use chrono::{DateTime, Utc};

/// One reading pulled from the remote channel. Positive current means discharge.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub charging: bool,
    pub observed_at: DateTime<Utc>,
}

impl TelemetrySample {
    pub fn new(
        voltage: f64,
        current: f64,
        temperature: f64,
        charging: bool,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            voltage,
            current,
            temperature,
            charging,
            observed_at,
        }
    }

    /// Human readable status derived from the charger flag
    pub fn charging_status(&self) -> &'static str {
        if self.charging {
            "Charging"
        } else {
            "Discharging"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charging_status() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let sample = TelemetrySample::new(3.9, -0.5, 24.0, true, now);
        assert_eq!(sample.charging_status(), "Charging");

        let sample = TelemetrySample::new(3.6, 0.8, 24.0, false, now);
        assert_eq!(sample.charging_status(), "Discharging");
    }
}
