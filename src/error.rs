use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::session::Phase;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PilotError {
    #[error("API specification must not be empty")]
    EmptySpecification,

    #[error("Test plan must not be empty")]
    EmptyPlan,

    #[error("No script has been generated yet")]
    MissingScript,

    #[error("Invalid duration '{0}': expected e.g. 30s, 2m, 1m30s or a plain number of seconds")]
    InvalidDuration(String),

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("Operation requires the {expected} step, but the wizard is at {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("Cannot go back from the {0} step")]
    CannotGoBack(Phase),

    #[error("A simulated run is in progress")]
    RunInProgress,

    #[error("{0} is already in progress")]
    Busy(&'static str),

    #[error("Session was reset while the request was in flight")]
    SessionReset,

    #[error("{0}")]
    PromptService(String),

    #[error("{0}")]
    Archive(String),
}

impl IntoResponse for PilotError {
    fn into_response(self) -> Response {
        let status = match &self {
            PilotError::EmptySpecification
            | PilotError::EmptyPlan
            | PilotError::MissingScript
            | PilotError::InvalidDuration(_)
            | PilotError::InvalidConcurrency => StatusCode::BAD_REQUEST,
            PilotError::WrongPhase { .. }
            | PilotError::CannotGoBack(_)
            | PilotError::RunInProgress
            | PilotError::Busy(_)
            | PilotError::SessionReset => StatusCode::CONFLICT,
            PilotError::PromptService(_) | PilotError::Archive(_) => StatusCode::BAD_GATEWAY,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
