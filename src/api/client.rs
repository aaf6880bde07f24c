use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::Sender;

use super::backend::{ChatBackend, pump_events};
use super::error::ApiError;
use super::types::{ChatRequest, Conversation, Message, SuccessResponse, TitleBody};
use crate::stream::{StreamEvent, TextReader};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the chat backend.
///
/// Every call maps failures into [`ApiError`]: connection problems become
/// `Transport`, non-2xx replies become `Api`, undecodable bodies become
/// `Protocol`. Callers decide whether to degrade or surface them.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl ApiClient {
    /// Creates a client for the backend at `base_url` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client whose non-streaming calls give up after `request_timeout`.
    pub fn with_timeout(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            request_timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turns a non-2xx response into `ApiError::Api`.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("Backend error: {} - {}", status, message);
        Err(ApiError::Api { status, message })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.timeout(self.request_timeout).send().await?;
        debug!("Backend response status: {}", response.status());
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// `GET /` with its own timeout. Any 2xx means the backend is up.
    pub async fn health(&self, timeout: Duration) -> Result<bool, ApiError> {
        let response = self
            .client
            .get(self.url("/"))
            .timeout(timeout)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// `GET /api/conversations`
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.send_json(self.client.get(self.url("/api/conversations")))
            .await
    }

    /// `GET /api/conversations/{id}/messages`
    pub async fn conversation_messages(&self, id: &str) -> Result<Vec<Message>, ApiError> {
        self.send_json(
            self.client
                .get(self.url(&format!("/api/conversations/{id}/messages"))),
        )
        .await
    }

    /// `POST /api/conversations`
    pub async fn create_conversation(&self, title: &str) -> Result<Conversation, ApiError> {
        self.send_json(
            self.client
                .post(self.url("/api/conversations"))
                .json(&TitleBody { title }),
        )
        .await
    }

    /// `PUT /api/conversations/{id}`, returns the server's `success` flag.
    pub async fn rename_conversation(&self, id: &str, title: &str) -> Result<bool, ApiError> {
        let reply: SuccessResponse = self
            .send_json(
                self.client
                    .put(self.url(&format!("/api/conversations/{id}")))
                    .json(&TitleBody { title }),
            )
            .await?;
        Ok(reply.success)
    }

    /// `DELETE /api/conversations/{id}`, returns the server's `success` flag.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool, ApiError> {
        let reply: SuccessResponse = self
            .send_json(
                self.client
                    .delete(self.url(&format!("/api/conversations/{id}"))),
            )
            .await?;
        Ok(reply.success)
    }

    /// Legacy `GET /api/history`: one flat message list for the whole backend.
    pub async fn history(&self) -> Result<Vec<Message>, ApiError> {
        self.send_json(self.client.get(self.url("/api/history")))
            .await
    }

    /// `POST /api/chat`, returning the response once headers are in.
    ///
    /// No overall timeout: replies stream for as long as the model talks.
    pub async fn open_chat(&self, request: &ChatRequest) -> Result<reqwest::Response, ApiError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!("Chat response status: {}", response.status());
        Self::ensure_success(response).await
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        sender: Sender<StreamEvent>,
    ) -> Result<(), ApiError> {
        info!(
            "Chat request: conversation={:?}, prompt_len={}",
            request.conversation_id,
            request.message.len()
        );

        let response = self.open_chat(&request).await?;
        let mut reader = TextReader::new(Box::pin(response.bytes_stream()));
        pump_events(&mut reader, &sender).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/api/chat"), "http://localhost:8000/api/chat");
    }

    #[test]
    fn test_name_is_base_url() {
        let client = ApiClient::new(DEFAULT_BASE_URL);
        assert_eq!(client.name(), "http://localhost:8000");
    }
}
