use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::session::Phase;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub started_at: String,
    pub prompt_service: PromptServiceHealth,
    pub session: SessionHealth,
}

#[derive(Serialize)]
pub struct PromptServiceHealth {
    pub model_id: String,
    pub api_key_configured: bool,
}

#[derive(Serialize)]
pub struct SessionHealth {
    pub id: String,
    pub phase: Phase,
    pub running: bool,
    pub samples: usize,
}

/// Overall status: "degraded" when the prompt service cannot be called.
pub fn determine_overall_status(api_key_configured: bool) -> &'static str {
    if api_key_configured {
        "healthy"
    } else {
        "degraded"
    }
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let session = state.wizard.session().await;
    let api_key_configured = state.config.api_key.is_some();

    Json(HealthResponse {
        status: determine_overall_status(api_key_configured).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at.to_rfc3339(),
        prompt_service: PromptServiceHealth {
            model_id: state.config.model_id.clone(),
            api_key_configured,
        },
        session: SessionHealth {
            id: session.id.to_string(),
            phase: session.phase,
            running: session.running,
            samples: session.samples.len(),
        },
    })
}
