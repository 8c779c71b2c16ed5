use crate::config::ConfigError;
use crate::risk::replay::ScoreReplayError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Caller-facing classification shared by every command and query error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadySent,
    DeliveryFailure,
    InfrastructureFailure,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadySent => "already_sent",
            ErrorKind::DeliveryFailure => "delivery_failure",
            ErrorKind::InfrastructureFailure => "infrastructure_failure",
        }
    }

    pub const fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadySent => StatusCode::CONFLICT,
            ErrorKind::DeliveryFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::InfrastructureFailure => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Structured JSON error body used by the alert and scheduler routers.
pub fn error_response(kind: ErrorKind, message: impl fmt::Display) -> Response {
    let payload = json!({
        "error": message.to_string(),
        "kind": kind.as_str(),
    });
    (kind.status_code(), Json(payload)).into_response()
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Replay(ScoreReplayError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Replay(err) => write!(f, "score replay error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Replay(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ScoreReplayError> for AppError {
    fn from(value: ScoreReplayError) -> Self {
        Self::Replay(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[tokio::test]
    async fn error_response_carries_kind_and_message() {
        let response = error_response(ErrorKind::AlreadySent, "alert 7 was already sent");

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(payload["kind"], json!("already_sent"));
        assert_eq!(payload["error"], json!("alert 7 was already sent"));
    }

    #[test]
    fn app_error_exposes_its_source() {
        let err = AppError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "scores.csv missing",
        ));

        assert_eq!(err.to_string(), "io error: scores.csv missing");
        assert!(err.source().is_some());
    }
}
