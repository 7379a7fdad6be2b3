//! Session routes

use axum::{
    Router,
    routing::{get, put},
};

use crate::api::app_state::AppState;
use crate::api::handlers::session_handler::*;

pub fn create_session_router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id", put(rename_session))
        .route("/sessions/:id/turns", get(list_turns))
        .route("/sessions/:id/tool-calls", get(tool_call_history))
}
