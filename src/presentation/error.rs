// API error mapping
use crate::application::telemetry_channel::TelemetryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("telemetry unavailable: {0}")]
    TelemetryUnavailable(#[source] TelemetryError),

    #[error("mode relay failed: {0}")]
    ModeRejected(#[source] TelemetryError),

    #[error("invalid calibration request: {0}")]
    InvalidCalibration(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::TelemetryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ModeRejected(_) => StatusCode::BAD_GATEWAY,
            ApiError::InvalidCalibration(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::TelemetryUnavailable(_) => "telemetry unavailable",
            ApiError::ModeRejected(_) => "mode relay failed",
            ApiError::InvalidCalibration(_) => "invalid calibration request",
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::TelemetryUnavailable(e) | ApiError::ModeRejected(e) => e.to_string(),
            ApiError::InvalidCalibration(reason) => reason.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }
        let body = json!({
            "error": self.label(),
            "detail": self.detail(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let unavailable = ApiError::TelemetryUnavailable(TelemetryError::Empty).into_response();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let rejected = ApiError::ModeRejected(TelemetryError::RateLimited).into_response();
        assert_eq!(rejected.status(), StatusCode::BAD_GATEWAY);

        let invalid = ApiError::InvalidCalibration("soc must be a number".to_string());
        assert_eq!(invalid.detail(), "soc must be a number");
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_detail_carries_cause() {
        let error = ApiError::TelemetryUnavailable(TelemetryError::Status {
            status: 400,
            body: "bad key".to_string(),
        });
        assert_eq!(
            error.detail(),
            "telemetry channel returned status 400: bad key"
        );
        assert_eq!(error.label(), "telemetry unavailable");
    }
}
