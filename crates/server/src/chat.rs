//! Chat API routes.
//!
//! - `POST /api/v1/chat`                                    process one guest message
//! - `GET  /api/v1/chat/conversations/{id}`                 stored conversation
//! - `GET  /api/v1/chat/clients/{client_id}/conversations`  conversations of a client

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use posada_agent::{BookingAgent, ChatRequest, ChatResponse};
use posada_core::domain::conversation::ConversationHistory;
use posada_core::{ApplicationError, InterfaceError};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Clone)]
pub struct ChatState {
    agent: Arc<BookingAgent>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(agent: Arc<BookingAgent>) -> Router {
    Router::new()
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/chat/conversations/{id}", get(conversation))
        .route("/api/v1/chat/clients/{client_id}/conversations", get(client_conversations))
        .with_state(ChatState { agent })
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    if request.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "El mensaje no puede estar vacío"));
    }

    match state.agent.process_message(request).await {
        Ok(response) => Ok(Json(response)),
        Err(turn_error) => {
            error!(event_name = "api.chat.turn_failed", error = %turn_error, "chat turn failed");
            Err(api_error(StatusCode::SERVICE_UNAVAILABLE, turn_error.user_message()))
        }
    }
}

pub async fn conversation(
    Path(id): Path<String>,
    State(state): State<ChatState>,
) -> ApiResult<ConversationHistory> {
    match state.agent.conversation(&id).await {
        Ok(Some(conversation)) => Ok(Json(conversation)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Conversación no encontrada")),
        Err(lookup_error) => {
            warn!(event_name = "api.chat.conversation_failed", conversation_id = %id, error = %lookup_error, "conversation lookup failed");
            Err(interface_error(
                ApplicationError::Persistence(lookup_error.to_string()).into_interface(id),
            ))
        }
    }
}

pub async fn client_conversations(
    Path(client_id): Path<i64>,
    State(state): State<ChatState>,
) -> ApiResult<Vec<ConversationHistory>> {
    state.agent.client_conversations(client_id).await.map(Json).map_err(|lookup_error| {
        warn!(event_name = "api.chat.client_conversations_failed", client_id, error = %lookup_error, "conversation listing failed");
        interface_error(
            ApplicationError::Persistence(lookup_error.to_string())
                .into_interface(format!("client_{client_id}")),
        )
    })
}

fn api_error(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: message.to_string() }))
}

fn interface_error(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!(
        event_name = "api.chat.interface_error",
        correlation_id = error.correlation_id(),
        error = %error,
        "request failed"
    );
    api_error(status, error.user_message())
}
