//! API module
//!
//! REST surface of the service: the chat boundary (streaming) and the
//! session endpoints.

pub mod app_state;
pub mod dto;
pub mod handlers;
pub mod routes;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::app_state::AppState;

pub fn create_router(app_state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::session_routes::create_session_router())
        .merge(routes::chat_routes::create_chat_router());

    Router::new()
        .nest("/api/v1", api)
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
