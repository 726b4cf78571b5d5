use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use workstream_schemas::{MeetingDelta, TopicId, TopicMember, TopicState};

use crate::error::MemoryError;
use crate::service::MemoryService;

#[derive(Clone)]
pub struct MemoryState {
    pub service: Arc<MemoryService>,
}

/// Routes for topic memory: lifecycle, ingestion, views, imported context.
pub fn router(state: MemoryState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/topics", post(create_topic).get(list_topics))
        .route("/topics/:topic_id", get(get_topic))
        .route(
            "/topics/:topic_id/members",
            post(add_member).get(list_members),
        )
        .route("/topics/:topic_id/ingest", post(ingest_delta))
        .route("/topics/:topic_id/view/:user_id", get(personal_view))
        .route(
            "/topics/:topic_id/context",
            post(add_context).get(list_context),
        )
        .route("/topics/:topic_id/memory/recent", get(recent_memory))
        .route("/topics/:topic_id/memory/range", get(memory_range))
        .route("/reset", post(reset_memory))
        .with_state(state)
}

fn error_response(err: MemoryError) -> (StatusCode, String) {
    let status = match err {
        MemoryError::TopicNotFound(_) => StatusCode::NOT_FOUND,
        MemoryError::InvalidDelta(_) => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "memory",
        "status": "healthy",
        "version": "0.1.0"
    }))
}

#[derive(Debug, Deserialize)]
struct TopicCreatePayload {
    title: String,
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    members: Vec<TopicMember>,
    #[serde(default)]
    topic_id: Option<String>,
}

async fn create_topic(
    State(state): State<MemoryState>,
    Json(payload): Json<TopicCreatePayload>,
) -> Json<TopicState> {
    let topic = state
        .service
        .create_topic(
            payload.title,
            payload.goal,
            payload.members,
            payload.topic_id.map(TopicId),
        )
        .await;
    Json(topic)
}

async fn list_topics(State(state): State<MemoryState>) -> Json<Vec<TopicState>> {
    Json(state.service.list_topics().await)
}

async fn get_topic(
    State(state): State<MemoryState>,
    Path(topic_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topic = state
        .service
        .get_topic(&TopicId(topic_id))
        .await
        .map_err(error_response)?;
    Ok(Json(topic))
}

async fn add_member(
    State(state): State<MemoryState>,
    Path(topic_id): Path<String>,
    Json(member): Json<TopicMember>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topic = state
        .service
        .add_member(&TopicId(topic_id), member)
        .await
        .map_err(error_response)?;
    Ok(Json(topic))
}

async fn list_members(
    State(state): State<MemoryState>,
    Path(topic_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let members = state
        .service
        .list_members(&TopicId(topic_id))
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "members": members })))
}

async fn ingest_delta(
    State(state): State<MemoryState>,
    Path(topic_id): Path<String>,
    Json(delta): Json<MeetingDelta>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topic = state
        .service
        .ingest_delta(&TopicId(topic_id), &delta)
        .await
        .map_err(error_response)?;
    Ok(Json(topic))
}

async fn personal_view(
    State(state): State<MemoryState>,
    Path((topic_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .service
        .build_personal_view(&TopicId(topic_id), &user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct ContextPayload {
    author: String,
    text: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    source: Option<String>,
}

async fn add_context(
    State(state): State<MemoryState>,
    Path(topic_id): Path<String>,
    Json(payload): Json<ContextPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entry = state
        .service
        .add_context(
            &TopicId(topic_id),
            payload.author,
            payload.text,
            payload.tags,
            payload.source,
        )
        .await
        .map_err(error_response)?;
    Ok(Json(entry))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_context(
    State(state): State<MemoryState>,
    Path(topic_id): Path<String>,
    query: Option<Query<ListQuery>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let params = query.map(|q| q.0).unwrap_or_default();
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let entries = state
        .service
        .recent_context(&TopicId(topic_id), limit)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "entries": entries })))
}

async fn recent_memory(
    State(state): State<MemoryState>,
    Path(topic_id): Path<String>,
    query: Option<Query<ListQuery>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let params = query.map(|q| q.0).unwrap_or_default();
    let limit = params.limit.unwrap_or(100).clamp(1, 500);

    let items = state
        .service
        .recent_items(&TopicId(topic_id), limit)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "items": items })))
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: String,
    end: String,
}

async fn memory_range(
    State(state): State<MemoryState>,
    Path(topic_id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let start = parse_bound(&range.start)?;
    let end = parse_bound(&range.end)?;

    let items = state
        .service
        .items_between(&TopicId(topic_id), start, end)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "items": items })))
}

fn parse_bound(raw: &str) -> Result<DateTime<Utc>, (StatusCode, String)> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("invalid RFC3339 timestamp '{}': {}", raw, e),
            )
        })
}

async fn reset_memory(State(state): State<MemoryState>) -> impl IntoResponse {
    state.service.reset().await;
    Json(serde_json::json!({ "status": "ok" }))
}
