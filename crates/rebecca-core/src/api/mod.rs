//! HTTP client for the Rebecca backend.
//!
//! One [`ApiClient`] covers every endpoint; the per-endpoint request and
//! response shapes live in the submodules.

mod auth;
mod chat;
mod conversations;
mod speech;

pub use chat::ChatRequest;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use crate::credentials::Credential;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const CHAT_PATH: &str = "/chat/stream";
pub const CONVERSATIONS_PATH: &str = "/chat/conversations";
pub const SPEECH_PATH: &str = "/tts";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credential: Option<Credential>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn set_credential(&mut self, credential: Option<Credential>) {
        self.credential = credential;
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token when signed in
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(credential) => request.bearer_auth(&credential.token),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct MessageBody {
    message: Option<String>,
}

/// Pull a human readable message out of an error body.
///
/// The backend answers failures with `{ "message": ... }`; anything else is
/// passed through trimmed, falling back to the status reason.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(MessageBody { message: Some(message) }) = serde_json::from_str(body) {
        return message;
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_message_prefers_json_message() {
        let msg = error_message(StatusCode::UNAUTHORIZED, r#"{"message":"Invalid credentials"}"#);
        assert_eq!(msg, "Invalid credentials");
    }

    #[test]
    fn test_error_message_falls_back_to_body_then_reason() {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, " upstream down \n"), "upstream down");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/");
        assert_eq!(client.url(CHAT_PATH), "http://localhost:5000/chat/stream");
    }
}
