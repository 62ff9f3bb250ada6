use bytes::Bytes;
use futures_util::Stream;
use reqwest::StatusCode;
use serde::Serialize;

use super::{error_message, ApiClient, CHAT_PATH};
use crate::error::ChatError;
use crate::state::ChatMessage;

/// Body of a chat request: the transcript so far plus the new input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub user_input: String,
}

impl ApiClient {
    /// Send a chat request and hand back the reply body as a byte stream.
    ///
    /// The body is plain incremental text with no framing.
    pub async fn open_chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, ChatError> {
        let credential = self.credential.as_ref().ok_or(ChatError::NotSignedIn)?;

        let response = self
            .client
            .post(self.url(CHAT_PATH))
            .bearer_auth(&credential.token)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Err(ChatError::MissingBody);
        }

        tracing::debug!(status = %status, "chat reply stream opened");
        Ok(response.bytes_stream())
    }
}
