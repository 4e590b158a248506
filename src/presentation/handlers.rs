// HTTP request handlers
use crate::application::battery_service::CalibrationOutcome;
use crate::domain::charge::ChargeState;
use crate::domain::metrics::BatteryMetrics;
use crate::domain::mode::Mode;
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct CalibrateRequest {
    pub soc: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: Mode,
}

#[derive(Debug, Serialize)]
pub struct ModeResponse {
    pub mode: Mode,
    pub value: u8,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Run one estimation cycle against the latest telemetry
pub async fn battery_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BatteryMetrics>, ApiError> {
    let metrics = state
        .battery_service
        .current_metrics()
        .await
        .map_err(ApiError::TelemetryUnavailable)?;
    Ok(Json(metrics))
}

/// Current accumulator state, without fetching telemetry
pub async fn charge_state(State(state): State<Arc<AppState>>) -> Json<ChargeState> {
    Json(state.battery_service.charge_snapshot())
}

/// Reset the accumulator to an asserted SOC; an empty body means fully charged
pub async fn calibrate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CalibrationOutcome>, ApiError> {
    let asserted = parse_calibration(&headers, &body)?;
    Ok(Json(state.battery_service.calibrate(asserted)))
}

/// Only a blank body falls back to the default; anything else must be a
/// readable JSON `CalibrateRequest`.
fn parse_calibration(headers: &HeaderMap, body: &[u8]) -> Result<Option<f64>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !is_json_content_type(content_type) {
        return Err(ApiError::InvalidCalibration(format!(
            "expected an application/json body, got content type '{}'",
            content_type
        )));
    }

    let Json(request) = Json::<CalibrateRequest>::from_bytes(body)
        .map_err(|rejection| ApiError::InvalidCalibration(rejection.body_text()))?;
    Ok(request.soc)
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Relay the drive mode to the actuator channel
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModeRequest>,
) -> Result<Json<ModeResponse>, ApiError> {
    state
        .battery_service
        .set_mode(request.mode)
        .await
        .map_err(ApiError::ModeRejected)?;

    Ok(Json(ModeResponse {
        mode: request.mode,
        value: request.mode.channel_value(),
    }))
}
