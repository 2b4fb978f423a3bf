use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::page;
use crate::config::Config;
use crate::errors::{QueueError, RoadmapError};
use crate::jobs::JobQueue;
use crate::results::LastRunStore;
use crate::roadmap::RoadmapReader;
use crate::selection::{RunRequest, SelectionMode};
use crate::status::StatusStore;
use crate::tasks::{KnownPhase, WorkItem};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub queue: JobQueue,
    pub roadmap: RoadmapReader,
    pub status: StatusStore,
    pub last_run: LastRunStore,
}

impl AppState {
    pub fn new(config: &Config, queue: JobQueue) -> Result<Self, RoadmapError> {
        Ok(Self {
            queue,
            roadmap: RoadmapReader::new(config.roadmap_file(), &config.roadmap.heading_word)?,
            status: StatusStore::new(config.status_file()),
            last_run: LastRunStore::new(config.last_run_file()),
        })
    }
}

pub type SharedState = Arc<AppState>;

// ── Request / response payloads ───────────────────────────────────────

/// Form posted by the dashboard.
#[derive(Debug, Deserialize)]
pub struct RunForm {
    pub user_input: String,
    #[serde(default)]
    pub mode: Option<SelectionMode>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status_url: String,
}

#[derive(Debug, Serialize)]
pub struct PhaseView {
    /// 1-based position used in selections
    pub index: usize,
    pub number: u32,
    pub title: String,
    pub name: String,
    pub work_items: Vec<WorkItem>,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub completed_items: Vec<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}

impl From<RoadmapError> for ApiError {
    fn from(err: RoadmapError) -> Self {
        match err {
            RoadmapError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(page::dashboard))
        .route("/runs", post(submit_form))
        .route("/api/runs", post(submit_json))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/status", get(get_status))
        .route("/api/roadmap", get(get_roadmap))
        .route("/api/last-run", get(get_last_run))
        .route("/health", get(health_check))
}

fn enqueue(state: &SharedState, request: RunRequest) -> Result<Uuid, ApiError> {
    if request.input.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Provide phase numbers (e.g. 1,2) or an instruction".into(),
        ));
    }
    Ok(state.queue.enqueue(request)?)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn submit_form(
    State(state): State<SharedState>,
    Form(form): Form<RunForm>,
) -> Result<Redirect, ApiError> {
    let request = RunRequest::new(form.user_input, form.mode.unwrap_or_default());
    let id = enqueue(&state, request)?;
    Ok(Redirect::to(&format!("/?job={}", id)))
}

async fn submit_json(
    State(state): State<SharedState>,
    Json(request): Json<RunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = enqueue(&state, request)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: id,
            status_url: format!("/api/jobs/{}", id),
        }),
    ))
}

async fn list_jobs(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.queue.list())
}

async fn get_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("'{}' is not a job id", id)))?;
    let job = state
        .queue
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", id)))?;
    Ok(Json(job))
}

async fn get_status(State(state): State<SharedState>) -> impl IntoResponse {
    let completed = state.status.load_async().await;
    Json(StatusView {
        completed_items: completed.to_vec(),
    })
}

async fn get_roadmap(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let phases = state.roadmap.read_phases_async().await?;
    let views: Vec<PhaseView> = phases
        .into_iter()
        .enumerate()
        .map(|(pos, phase)| PhaseView {
            index: pos + 1,
            number: phase.number,
            work_items: KnownPhase::from_title(&phase.title)
                .map(|known| known.work_items().to_vec())
                .unwrap_or_default(),
            title: phase.title,
            name: phase.name,
        })
        .collect();
    Ok(Json(views))
}

async fn get_last_run(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    state
        .last_run
        .load_async()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No run has finished yet".into()))
}
