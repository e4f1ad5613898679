use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::message::{ChatMessage, ChatReply};

pub const REPLY_PREFIX: &str = "You said: ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Field 'message' is required and must not be empty")]
    MissingMessage,
}

/// Placeholder for real conversational processing.
pub fn generate_reply(trimmed: &str) -> String {
    format!("{REPLY_PREFIX}{trimmed}")
}

/// Carry the caller's conversation id forward, or mint a new one.
pub fn resolve_conversation_id(requested: Option<&str>) -> String {
    match requested {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// Validate a chat turn and build the reply stamped with `now`.
pub fn respond(request: &ChatMessage, now: DateTime<Utc>) -> Result<ChatReply, ChatError> {
    let trimmed = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or(ChatError::MissingMessage)?;

    Ok(ChatReply {
        reply: generate_reply(trimmed),
        conversation_id: resolve_conversation_id(request.conversation_id.as_deref()),
        timestamp: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_echoes_trimmed_message() {
        assert_eq!(generate_reply("hi"), "You said: hi");
    }

    #[test]
    fn whitespace_conversation_id_is_replaced() {
        let id = resolve_conversation_id(Some("   "));
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn blank_message_is_rejected() {
        let req = ChatMessage::new(" \t\n");
        assert_eq!(respond(&req, Utc::now()).unwrap_err(), ChatError::MissingMessage);
    }
}
