//! Session handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::session_dto::*},
    error::AppError,
};

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListSessionsParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = params.user_id.as_deref().unwrap_or("default");
    debug!(user = user_id, "listing sessions");

    let sessions = state.session_service.list_sessions(user_id).await?;
    Ok(Json(SessionListResponse { sessions }))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    debug!(session = id.as_str(), "getting session");

    let session = state
        .session_service
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("session not found: {}", id)))?;

    Ok(Json(SessionResponse::from(session)))
}

pub async fn rename_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RenameSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("session name must not be empty".into()));
    }
    debug!(session = id.as_str(), name = request.name.as_str(), "renaming session");

    let session = state.session_service.rename(&id, request.name.trim()).await?;
    Ok(Json(SessionResponse::from(session)))
}

pub async fn list_turns(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let turns = state.session_service.turns(&id, 1000, 0).await?;
    let turns: Vec<TurnResponse> = turns.into_iter().map(TurnResponse::from).collect();
    Ok(Json(turns))
}

pub async fn tool_call_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    let n = params.n.unwrap_or(10);
    let calls = state.session_service.tool_call_history(&id, n).await?;
    Ok(Json(calls))
}
