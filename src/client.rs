// src/client.rs
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::message::{ChatMessage, ChatReply};

pub const CHAT_PATH: &str = "/api/chat";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Thin caller of the chat endpoint. One POST per message, no retries.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), CHAT_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn send_message(&self, message: &ChatMessage) -> Result<ChatReply, ClientError> {
        debug!(endpoint = %self.endpoint, "posting chat message");
        let resp = self.http.post(&self.endpoint).json(message).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(resp.json().await?)
    }
}
