use axum::{Json, extract::rejection::JsonRejection};
use chrono::Utc;
use tracing::info;

use crate::{
    error::AppError,
    message::{ChatMessage, ChatReply},
    services::chatbot::respond,
};

pub async fn chat_handler(
    payload: Result<Json<ChatMessage>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    // Every body rejection is a client error, whatever status axum would pick.
    let Json(request) = payload.map_err(|rejection| {
        info!(%rejection, "rejected chat request body");
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let reply = respond(&request, Utc::now()).map_err(|e| {
        info!(error = %e, "rejected chat message");
        AppError::from(e)
    })?;

    info!(conversation_id = %reply.conversation_id, "chat reply generated");
    Ok(Json(reply))
}
