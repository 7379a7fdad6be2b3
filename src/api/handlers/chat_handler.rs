//! Chat handler
//!
//! Accepts a user message and streams the assistant's response as
//! server-sent events: content deltas, tool-call notifications, and a
//! terminal marker, in emission order.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::{
    api::{app_state::AppState, dto::chat_dto::*},
    controller::EventSink,
    error::AppError,
};

const EVENT_BUFFER: usize = 64;

pub async fn chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if request.role != "user" {
        return Err(AppError::Validation(format!(
            "chat turns must carry role \"user\", got \"{}\"",
            request.role
        )));
    }
    if request.content.trim().is_empty() {
        return Err(AppError::Validation("empty question".to_string()));
    }

    let user_id = request.user_id.as_deref().unwrap_or("default");
    let model_id = request
        .model
        .as_deref()
        .unwrap_or(&state.model_config.default_model);
    // Unknown providers must fail here, before any turn state exists.
    crate::providers::ModelId::parse(model_id)?;
    let debug = request.debug.unwrap_or(state.model_config.debug);

    let session = state
        .session_service
        .load_or_create(Some(&session_id), user_id, model_id, debug)
        .await?;
    info!(session = %session.id, "chat turn accepted");

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let sink = EventSink::new(tx);
    let controller = state.controller.clone();
    let question = request.content.clone();

    tokio::spawn(async move {
        if let Err(e) = controller.handle_turn(&session, &question, &sink).await {
            error!(session = %session.id, "turn failed: {}", e);
            sink.content(&format!("Sorry, I encountered an error: {}", e))
                .await;
            sink.terminal().await;
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let dto = ChatStreamEvent::from(event);
        Ok(Event::default()
            .json_data(&dto)
            .unwrap_or_else(|_| Event::default().data("{\"terminal\":true}")))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
