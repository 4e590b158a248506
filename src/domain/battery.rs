// Battery pack nameplate parameters

/// Nameplate values of a single-cell Li-ion pack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterySpec {
    pub rated_capacity_ah: f64,
    pub nominal_voltage: f64,
    pub min_voltage: f64,
}

impl BatterySpec {
    pub fn new(rated_capacity_ah: f64, nominal_voltage: f64, min_voltage: f64) -> Self {
        Self {
            rated_capacity_ah,
            nominal_voltage,
            min_voltage,
        }
    }

    /// Capacity (Ah) still available at the given state of charge
    pub fn available_capacity_ah(&self, soc_percent: f64) -> f64 {
        soc_percent / 100.0 * self.rated_capacity_ah
    }

    /// Discharge current expressed as a multiple of rated capacity
    pub fn c_rate(&self, current_amps: f64) -> f64 {
        if self.rated_capacity_ah > 0.0 {
            current_amps.abs() / self.rated_capacity_ah
        } else {
            0.0
        }
    }
}

impl Default for BatterySpec {
    // 3.7 V / 2000 mAh cell
    fn default() -> Self {
        Self::new(2.0, 3.7, 3.0)
    }
}
