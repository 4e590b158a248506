// ThingSpeak channel implementation
use crate::application::clock::Clock;
use crate::application::telemetry_channel::{TelemetryChannel, TelemetryError};
use crate::domain::mode::Mode;
use crate::domain::telemetry::TelemetrySample;
use crate::infrastructure::config::ChannelSettings;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Body ThingSpeak returns for the last entry of an empty channel
const EMPTY_CHANNEL_BODY: i64 = -1;

/// Last readable value of each telemetry field, substituted when a newer
/// entry lacks that field (e.g. an entry written by the mode relay).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LastReadings {
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub charging: bool,
}

impl From<&TelemetrySample> for LastReadings {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            voltage: sample.voltage,
            current: sample.current,
            temperature: sample.temperature,
            charging: sample.charging,
        }
    }
}

#[derive(Clone)]
pub struct ThingSpeakChannel {
    client: reqwest::Client,
    settings: ChannelSettings,
    clock: Arc<dyn Clock>,
    last_readings: Arc<Mutex<LastReadings>>,
}

impl ThingSpeakChannel {
    pub fn new(mut settings: ChannelSettings, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            settings,
            clock,
            last_readings: Arc::new(Mutex::new(LastReadings::default())),
        })
    }

    fn last_entry_url(&self) -> String {
        format!(
            "{}/channels/{}/feeds/last.json?api_key={}",
            self.settings.base_url,
            urlencoding::encode(&self.settings.channel_id),
            urlencoding::encode(&self.settings.read_api_key)
        )
    }

    fn update_url(&self, field: &str, value: u8) -> String {
        format!(
            "{}/update?api_key={}&{}={}",
            self.settings.base_url,
            urlencoding::encode(&self.settings.write_api_key),
            urlencoding::encode(field),
            value
        )
    }

    async fn fetch_body(&self, url: &str) -> Result<String, TelemetryError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TelemetryError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))
    }
}

#[async_trait]
impl TelemetryChannel for ThingSpeakChannel {
    async fn latest_sample(&self) -> Result<TelemetrySample, TelemetryError> {
        let body = self.fetch_body(&self.last_entry_url()).await?;
        tracing::debug!("Fetched last entry from channel {}", self.settings.channel_id);

        let mut last_readings = self
            .last_readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sample = parse_last_entry(&body, &self.settings, &last_readings, self.clock.now())?;
        *last_readings = LastReadings::from(&sample);

        Ok(sample)
    }

    async fn send_mode(&self, mode: Mode) -> Result<(), TelemetryError> {
        let url = self.update_url(&self.settings.mode_field, mode.channel_value());
        let body = self.fetch_body(&url).await?;
        parse_update_response(&body)
    }
}

/// Parse a `feeds/last.json` body. Missing or unreadable fields take their
/// previous value (zero before any reading) instead of failing the sample.
pub fn parse_last_entry(
    body: &str,
    settings: &ChannelSettings,
    previous: &LastReadings,
    fallback_time: DateTime<Utc>,
) -> Result<TelemetrySample, TelemetryError> {
    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| TelemetryError::Malformed(e.to_string()))?;

    let entry = match value {
        Value::Object(entry) => entry,
        Value::Number(n) if n.as_i64() == Some(EMPTY_CHANNEL_BODY) => {
            return Err(TelemetryError::Empty);
        }
        other => {
            return Err(TelemetryError::Malformed(format!(
                "expected an entry object, got {}",
                other
            )));
        }
    };

    let observed_at = entry
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(fallback_time);

    Ok(TelemetrySample::new(
        numeric_field(&entry, &settings.voltage_field, previous.voltage),
        numeric_field(&entry, &settings.current_field, previous.current),
        numeric_field(&entry, &settings.temperature_field, previous.temperature),
        flag_field(&entry, &settings.charging_field, previous.charging),
        observed_at,
    ))
}

/// ThingSpeak answers an update with the new entry id, or `0` when the
/// write was refused (update rate limit).
pub fn parse_update_response(body: &str) -> Result<(), TelemetryError> {
    match body.trim().parse::<i64>() {
        Ok(0) => Err(TelemetryError::RateLimited),
        Ok(_) => Ok(()),
        Err(_) => Err(TelemetryError::Malformed(format!(
            "unexpected update response: {}",
            body.trim()
        ))),
    }
}

fn read_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

fn numeric_field(entry: &Map<String, Value>, field: &str, previous: f64) -> f64 {
    match entry.get(field).and_then(read_number) {
        Some(value) => value,
        None => {
            tracing::warn!(
                "Telemetry field {} missing or unreadable, keeping {}",
                field,
                previous
            );
            previous
        }
    }
}

fn flag_field(entry: &Map<String, Value>, field: &str, previous: bool) -> bool {
    match entry.get(field) {
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => true,
        Some(value) => read_number(value).is_some_and(|v| v != 0.0),
        None => {
            tracing::warn!("Telemetry flag {} missing, keeping {}", field, previous);
            previous
        }
    }
}
