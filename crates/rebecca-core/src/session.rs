//! The chat session: transcript, input field and the single-send gate.
//!
//! A send moves the session from idle to streaming. Stream events are then
//! folded in with [`ChatSession::apply`] until a `Finished` or `Failed` event
//! returns it to idle. Sends made while streaming are ignored.

use crate::api::ChatRequest;
use crate::error::ChatError;
use crate::state::{ChatMessage, Transcript};
use crate::stream::StreamEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamState {
    pub active: bool,
}

/// Fired once per successful reply with the final text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
}

type Observer = Box<dyn FnMut(&Transcript) + Send>;

pub struct ChatSession {
    pub input: String,
    transcript: Transcript,
    state: StreamState,
    buffer: String,
    model: String,
    user_name: String,
    assistant_name: String,
    last_error: Option<ChatError>,
    observers: Vec<Observer>,
}

impl ChatSession {
    pub fn new(
        model: impl Into<String>,
        user_name: impl Into<String>,
        assistant_name: impl Into<String>,
    ) -> Self {
        Self {
            input: String::new(),
            transcript: Transcript::new(),
            state: StreamState::default(),
            buffer: String::new(),
            model: model.into(),
            user_name: user_name.into(),
            assistant_name: assistant_name.into(),
            last_error: None,
            observers: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state.active
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn set_user_name(&mut self, name: impl Into<String>) {
        self.user_name = name.into();
    }

    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    /// Error from the most recent send, cleared by the next send
    pub fn last_error(&self) -> Option<&ChatError> {
        self.last_error.as_ref()
    }

    /// Register a callback run after every transcript change
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&Transcript) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Start sending the current input.
    ///
    /// Returns the request to issue, or `None` when the input is blank or a
    /// reply is still streaming. In both of those cases nothing changes.
    pub fn begin_send(&mut self) -> Option<ChatRequest> {
        if self.input.trim().is_empty() {
            return None;
        }
        if self.state.active {
            tracing::debug!("send ignored, a reply is still streaming");
            return None;
        }

        let history = self.transcript.messages().to_vec();
        let user_input = self.input.clone();

        self.transcript.push_user(user_input.clone(), self.user_name.clone());
        self.state.active = true;
        self.buffer.clear();
        self.last_error = None;
        self.notify();

        Some(ChatRequest {
            model: self.model.clone(),
            messages: history,
            user_input,
        })
    }

    /// Fold one stream event into the session.
    ///
    /// Returns the completion when the reply finished successfully.
    pub fn apply(&mut self, event: StreamEvent) -> Option<Completion> {
        if !self.state.active {
            tracing::warn!(?event, "stream event with no reply in flight, dropping");
            return None;
        }

        match event {
            StreamEvent::Chunk(piece) => {
                self.buffer.push_str(&piece);
                self.transcript.fold_assistant(&self.buffer, &self.assistant_name);
                self.notify();
                None
            }
            StreamEvent::Finished { malformed } => {
                if malformed > 0 {
                    self.last_error = Some(ChatError::Malformed(malformed));
                }
                self.finish();
                Some(Completion {
                    text: std::mem::take(&mut self.buffer),
                })
            }
            StreamEvent::Failed(err) => {
                self.last_error = Some(err);
                self.buffer.clear();
                self.finish();
                None
            }
        }
    }

    /// Drop the transcript, draft and any error, as when another user signs in.
    ///
    /// Only valid while idle; returns false and changes nothing mid-reply.
    pub fn reset(&mut self) -> bool {
        if self.state.active {
            return false;
        }

        self.transcript = Transcript::new();
        self.buffer.clear();
        self.input.clear();
        self.last_error = None;
        self.notify();
        true
    }

    fn finish(&mut self) {
        self.state.active = false;
        self.input.clear();
        if self.transcript.close().is_some() {
            self.notify();
        }
    }

    fn notify(&mut self) {
        for observer in &mut self.observers {
            observer(&self.transcript);
        }
    }
}
