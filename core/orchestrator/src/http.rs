use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use workstream_memory::{AssetStore, MemoryError, MemoryService};
use workstream_schemas::{MeetingDelta, TopicId};

use crate::pipeline::ActionOrchestrator;

#[derive(Clone)]
pub struct OrchestratorState {
    pub memory: Arc<MemoryService>,
    pub orchestrator: Arc<ActionOrchestrator>,
    pub assets: Arc<AssetStore>,
}

/// Routes for action generation: delta processing, raw-transcript
/// ingestion, asset-driven processing, and on-demand briefings.
pub fn router(state: OrchestratorState) -> Router {
    Router::new()
        .route("/topics/:topic_id/process", post(process_delta))
        .route("/topics/:topic_id/ingest_raw", post(ingest_raw))
        .route("/topics/:topic_id/assets/process", post(process_assets))
        .route("/topics/:topic_id/actions/:user_id", get(on_demand_actions))
        .route("/assets", get(list_assets))
        .route("/members/from_file", get(members_from_file))
        .with_state(state)
}

fn error_response(err: MemoryError) -> (StatusCode, String) {
    let status = match err {
        MemoryError::TopicNotFound(_) => StatusCode::NOT_FOUND,
        MemoryError::InvalidDelta(_) => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

async fn process_delta(
    State(state): State<OrchestratorState>,
    Path(topic_id): Path<String>,
    Json(delta): Json<MeetingDelta>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = state
        .orchestrator
        .process_delta(&TopicId(topic_id), &delta)
        .await
        .map_err(error_response)?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct RawIngestPayload {
    #[serde(default)]
    meeting_id: Option<String>,
    transcript: String,
}

async fn ingest_raw(
    State(state): State<OrchestratorState>,
    Path(topic_id): Path<String>,
    Json(payload): Json<RawIngestPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topic_id = TopicId(topic_id);
    let topic = state
        .memory
        .get_topic(&topic_id)
        .await
        .map_err(error_response)?;

    // The caller asked for an extraction, so its failure is theirs to see.
    let delta = state
        .orchestrator
        .extract_delta(&topic, &payload.transcript, payload.meeting_id)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let topic = state
        .memory
        .ingest_delta(&topic_id, &delta)
        .await
        .map_err(error_response)?;
    Ok(Json(topic))
}

#[derive(Debug, Deserialize)]
struct AssetQuery {
    date: String,
    user_id: String,
}

async fn process_assets(
    State(state): State<OrchestratorState>,
    Path(topic_id): Path<String>,
    Query(query): Query<AssetQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = state
        .orchestrator
        .process_assets(&TopicId(topic_id), &query.user_id, &query.date)
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}

async fn on_demand_actions(
    State(state): State<OrchestratorState>,
    Path((topic_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actions = state
        .orchestrator
        .on_demand_actions(&TopicId(topic_id), &user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "actions": actions })))
}

#[derive(Debug, Deserialize)]
struct AssetListQuery {
    date: String,
}

/// Asset files dated on or before the given day, without persisting them.
async fn list_assets(
    State(state): State<OrchestratorState>,
    Query(query): Query<AssetListQuery>,
) -> impl IntoResponse {
    let docs = state.assets.list_upto(&query.date);
    Json(docs)
}

async fn members_from_file(State(state): State<OrchestratorState>) -> impl IntoResponse {
    Json(serde_json::json!({ "members": state.assets.member_emails() }))
}
