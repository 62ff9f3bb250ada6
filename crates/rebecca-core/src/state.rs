//! UI-agnostic chat state types
//!
//! These types are shared by every front end and carry no rendering concerns.
//! The wire shape of [`ChatMessage`] is what the chat endpoint expects in its
//! `messages` array.

use serde::{Deserialize, Serialize};

/// A single entry in the chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub display_name: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            display_name: display_name.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            display_name: display_name.into(),
        }
    }
}

/// Ordered, append-only list of messages for one chat session.
///
/// At most one assistant message is open (still being streamed into) at a
/// time, and while open it is always the last element.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    open: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Whether the trailing assistant message is still receiving text
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Append a user message. Any open assistant message is closed first.
    pub fn push_user(&mut self, content: impl Into<String>, display_name: impl Into<String>) {
        self.open = false;
        self.messages.push(ChatMessage::user(content, display_name));
    }

    /// Fold the full running reply buffer into the transcript.
    ///
    /// Replaces the content of the open assistant message, or opens a new one
    /// holding `buffer` if none is open yet.
    pub fn fold_assistant(&mut self, buffer: &str, display_name: &str) {
        if self.open {
            if let Some(last) = self.messages.last_mut() {
                if last.role == ChatRole::Assistant {
                    last.content.clear();
                    last.content.push_str(buffer);
                    return;
                }
            }
        }

        self.messages.push(ChatMessage::assistant(buffer, display_name));
        self.open = true;
    }

    /// Close the open assistant message, returning it if there was one
    pub fn close(&mut self) -> Option<&ChatMessage> {
        if std::mem::take(&mut self.open) {
            self.messages.last()
        } else {
            None
        }
    }
}
