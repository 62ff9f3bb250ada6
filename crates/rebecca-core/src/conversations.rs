//! Process-wide list of past conversations.
//!
//! Fetched once at startup and read-only afterwards. Only the first
//! [`install`] takes effect.

use std::sync::OnceLock;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};

use crate::api::ApiClient;

/// One stored prompt/response pair as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub response: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

static CONVERSATIONS: OnceLock<Vec<Conversation>> = OnceLock::new();

/// Install the list. Returns false if one was already installed.
pub fn install(conversations: Vec<Conversation>) -> bool {
    CONVERSATIONS.set(conversations).is_ok()
}

/// The installed list, or an empty slice before startup has loaded it
pub fn all() -> &'static [Conversation] {
    CONVERSATIONS.get().map(Vec::as_slice).unwrap_or(&[])
}

pub fn is_loaded() -> bool {
    CONVERSATIONS.get().is_some()
}

/// Fetch the list from the backend and install it
pub async fn load(client: &ApiClient) -> Result<usize> {
    let conversations = client.list_conversations().await?;
    let count = conversations.len();

    if !install(conversations) {
        tracing::debug!("conversation list already installed, ignoring reload");
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_with_extra_fields_parses() {
        let row: Conversation = serde_json::from_str(
            r#"{"id": 4, "prompt": "hi", "response": "hello", "metadata": null,
                "timestamp": "Tue, 15 Oct 2024 10:00:00 GMT", "user_id": null}"#,
        )
        .unwrap();
        assert_eq!(row.prompt, "hi");
        assert_eq!(row.response, "hello");
        assert_eq!(row.timestamp.as_deref(), Some("Tue, 15 Oct 2024 10:00:00 GMT"));
    }

    #[test]
    fn test_null_or_missing_response_is_empty() {
        let row: Conversation = serde_json::from_str(r#"{"prompt": "hi"}"#).unwrap();
        assert_eq!(row.response, "");

        let row: Conversation = serde_json::from_str(r#"{"prompt": "hi", "response": null}"#).unwrap();
        assert_eq!(row.response, "");
    }

    // The only test touching the global, since it can be set once per process
    #[test]
    fn test_install_is_write_once() {
        let first = vec![Conversation {
            prompt: "p".to_string(),
            response: "r".to_string(),
            timestamp: None,
        }];

        assert!(install(first.clone()));
        assert!(is_loaded());
        assert!(!install(Vec::new()));
        assert_eq!(all(), first.as_slice());
    }
}
