use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::unfold;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;

use crate::config::PROGRESS_STREAM_INTERVAL_MS;
use crate::error::PilotError;
use crate::session::{RunConfig, RunProgress};
use crate::state::SharedState;
use crate::wizard::{ExportedArchive, SessionSnapshot};

// --- Request types ---

#[derive(Deserialize)]
pub struct SpecificationRequest {
    pub specification: String,
}

#[derive(Deserialize)]
pub struct PlanRequest {
    pub edited_plan: String,
    #[serde(default)]
    pub run_config: RunConfig,
}

#[derive(Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub run_config: RunConfig,
}

// --- Route handlers ---

/// GET /session
pub async fn snapshot(State(state): State<SharedState>) -> Json<SessionSnapshot> {
    Json(state.wizard.snapshot().await)
}

/// POST /session/specification: analyze the API and suggest a plan.
pub async fn submit_specification(
    State(state): State<SharedState>,
    Json(body): Json<SpecificationRequest>,
) -> Result<Json<SessionSnapshot>, PilotError> {
    state.wizard.submit_specification(body.specification).await?;
    Ok(Json(state.wizard.snapshot().await))
}

/// POST /session/plan: save plan edits without generating.
pub async fn edit_plan(
    State(state): State<SharedState>,
    Json(body): Json<PlanRequest>,
) -> Result<Json<SessionSnapshot>, PilotError> {
    state.wizard.edit_plan(body.edited_plan, body.run_config).await?;
    Ok(Json(state.wizard.snapshot().await))
}

/// POST /session/script: generate the k6 script.
pub async fn request_script(
    State(state): State<SharedState>,
    Json(body): Json<PlanRequest>,
) -> Result<Json<SessionSnapshot>, PilotError> {
    state
        .wizard
        .request_script(body.edited_plan, body.run_config)
        .await?;
    Ok(Json(state.wizard.snapshot().await))
}

/// GET /session/script/download: the script as a plain file.
pub async fn download_script(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, PilotError> {
    let download = state.wizard.script_download().await?;
    let disposition = format!("attachment; filename=\"{}\"", download.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, download.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.body,
    ))
}

/// POST /session/run: start the simulated run.
pub async fn start_run(
    State(state): State<SharedState>,
    Json(body): Json<RunRequest>,
) -> Result<Json<SessionSnapshot>, PilotError> {
    state.wizard.start_run(body.run_config).await?;
    Ok(Json(state.wizard.snapshot().await))
}

/// POST /session/back
pub async fn go_back(State(state): State<SharedState>) -> Result<Json<SessionSnapshot>, PilotError> {
    state.wizard.go_back().await?;
    Ok(Json(state.wizard.snapshot().await))
}

/// POST /session/reset: start a new test.
pub async fn reset(State(state): State<SharedState>) -> Json<SessionSnapshot> {
    state.wizard.reset().await;
    Json(state.wizard.snapshot().await)
}

/// POST /session/export: archive of script and report, base64 encoded.
pub async fn export(State(state): State<SharedState>) -> Result<Json<ExportedArchive>, PilotError> {
    Ok(Json(state.wizard.export_artifacts().await?))
}

/// GET /session/progress
pub async fn progress(State(state): State<SharedState>) -> Json<RunProgress> {
    Json(state.wizard.progress().await)
}

struct StreamState {
    shared: SharedState,
    last: Option<RunProgress>,
}

/// GET /session/stream: SSE stream of run progress, sent on change.
pub async fn progress_stream(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let initial = StreamState {
        shared: state,
        last: None,
    };

    let event_stream = unfold(initial, |mut ss| async move {
        loop {
            let progress = ss.shared.wizard.progress().await;
            if ss.last.as_ref() != Some(&progress) {
                let data = serde_json::to_string(&progress).unwrap_or_default();
                ss.last = Some(progress);
                let event = Ok(Event::default().event("progress").data(data));
                return Some((event, ss));
            }
            tokio::time::sleep(Duration::from_millis(PROGRESS_STREAM_INTERVAL_MS)).await;
        }
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}
