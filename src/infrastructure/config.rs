use crate::domain::battery::BatterySpec;
use crate::domain::charge::RechargePolicy;
use crate::domain::health::HealthModel;
use crate::domain::metrics::{DEFAULT_AVERAGE_SPEED_KMH, DEFAULT_EFFICIENCY_FACTOR, RuntimeMode};
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub channel: ChannelSettings,
    #[serde(default)]
    pub battery: BatterySettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub static_dir: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            static_dir: None,
            request_timeout_secs: 10,
        }
    }
}

/// Remote channel location, credentials and field layout
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChannelSettings {
    pub base_url: String,
    pub channel_id: String,
    pub read_api_key: String,
    pub write_api_key: String,
    pub voltage_field: String,
    pub current_field: String,
    pub temperature_field: String,
    pub charging_field: String,
    pub mode_field: String,
    pub timeout_secs: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.thingspeak.com".to_string(),
            channel_id: String::new(),
            read_api_key: String::new(),
            write_api_key: String::new(),
            voltage_field: "field1".to_string(),
            current_field: "field2".to_string(),
            temperature_field: "field3".to_string(),
            charging_field: "field4".to_string(),
            mode_field: "field5".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatterySettings {
    pub rated_capacity_ah: f64,
    pub nominal_voltage: f64,
    pub min_voltage: f64,
    pub efficiency_factor: f64,
    pub average_speed_kmh: f64,
    pub health_model: HealthModel,
    pub runtime_mode: RuntimeMode,
    pub recharge_policy: RechargePolicy,
}

impl Default for BatterySettings {
    fn default() -> Self {
        let spec = BatterySpec::default();
        Self {
            rated_capacity_ah: spec.rated_capacity_ah,
            nominal_voltage: spec.nominal_voltage,
            min_voltage: spec.min_voltage,
            efficiency_factor: DEFAULT_EFFICIENCY_FACTOR,
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            health_model: HealthModel::default(),
            runtime_mode: RuntimeMode::default(),
            recharge_policy: RechargePolicy::default(),
        }
    }
}

impl BatterySettings {
    pub fn spec(&self) -> BatterySpec {
        BatterySpec::new(self.rated_capacity_ah, self.nominal_voltage, self.min_voltage)
    }
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let battery = &self.battery;
        if !(battery.rated_capacity_ah.is_finite() && battery.rated_capacity_ah > 0.0) {
            anyhow::bail!("battery.rated_capacity_ah must be a positive number");
        }
        if !(battery.efficiency_factor > 0.0 && battery.efficiency_factor <= 1.0) {
            anyhow::bail!("battery.efficiency_factor must be within (0, 1]");
        }
        if !(battery.average_speed_kmh.is_finite() && battery.average_speed_kmh >= 0.0) {
            anyhow::bail!("battery.average_speed_kmh must be non-negative");
        }
        if battery.min_voltage >= battery.nominal_voltage {
            anyhow::bail!("battery.min_voltage must be below battery.nominal_voltage");
        }
        if self.channel.channel_id.trim().is_empty() {
            anyhow::bail!("channel.channel_id must be set");
        }
        Ok(())
    }
}

/// Load `config/battery.*` (optional) overlaid with `BATTERY__SECTION__KEY`
/// environment variables.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/battery").required(false))
        .add_source(
            config::Environment::with_prefix("BATTERY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration")?;

    let config: AppConfig = settings
        .try_deserialize()
        .context("Failed to parse configuration")?;
    config.validate()?;

    Ok(config)
}
