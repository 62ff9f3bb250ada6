//! Reading a chat reply off the wire.
//!
//! [`consume`] pulls chunks from a byte stream in order, decodes them and
//! hands each decoded piece to a callback. [`spawn_reply`] runs the whole
//! request in a background task and reports progress as [`StreamEvent`]s,
//! which the owner of the [`ChatSession`](crate::session::ChatSession) folds
//! into the transcript on its own task.

use std::fmt::Display;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ChatRequest};
use crate::decode::Utf8StreamDecoder;
use crate::error::ChatError;

/// Progress of one in-flight reply, delivered in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Newly decoded text, to be appended to the running reply
    Chunk(String),
    /// The stream ended normally
    Finished { malformed: usize },
    /// The request or the stream failed; text already delivered stays
    Failed(ChatError),
}

/// What a completed stream produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub text: String,
    pub chunks: usize,
    pub malformed: usize,
}

/// Drain `body`, calling `on_text` with each non-empty decoded piece.
///
/// With a `stall_timeout`, a single pull that waits longer than the limit
/// ends the stream with [`ChatError::Stalled`].
pub async fn consume<S, B, E, F>(
    body: S,
    stall_timeout: Option<Duration>,
    mut on_text: F,
) -> Result<StreamSummary, ChatError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&str),
{
    let mut body = std::pin::pin!(body);
    let mut decoder = Utf8StreamDecoder::new();
    let mut text = String::new();
    let mut chunks = 0;

    loop {
        let next = match stall_timeout {
            Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                Ok(next) => next,
                Err(_) => return Err(ChatError::Stalled(limit)),
            },
            None => body.next().await,
        };

        let Some(item) = next else { break };
        let bytes = item.map_err(|e| ChatError::Interrupted(e.to_string()))?;
        chunks += 1;

        let piece = decoder.decode(bytes.as_ref());
        if !piece.is_empty() {
            text.push_str(&piece);
            on_text(&piece);
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        text.push_str(&tail);
        on_text(&tail);
    }

    Ok(StreamSummary {
        text,
        chunks,
        malformed: decoder.malformed(),
    })
}

/// Issue `request` and stream the reply in a background task.
///
/// `emit` sees zero or more `Chunk`s followed by exactly one `Finished` or
/// `Failed`.
pub fn spawn_reply<F>(
    client: ApiClient,
    request: ChatRequest,
    stall_timeout: Option<Duration>,
    mut emit: F,
) -> JoinHandle<()>
where
    F: FnMut(StreamEvent) + Send + 'static,
{
    tokio::spawn(async move {
        // The stall limit also covers the wait for response headers
        let opened = match stall_timeout {
            Some(limit) => tokio::time::timeout(limit, client.open_chat_stream(&request))
                .await
                .unwrap_or(Err(ChatError::Stalled(limit))),
            None => client.open_chat_stream(&request).await,
        };

        let outcome = match opened {
            Ok(body) => {
                consume(body, stall_timeout, |piece| {
                    emit(StreamEvent::Chunk(piece.to_string()))
                })
                .await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(summary) => {
                tracing::info!(
                    chunks = summary.chunks,
                    chars = summary.text.chars().count(),
                    "chat reply finished"
                );
                emit(StreamEvent::Finished {
                    malformed: summary.malformed,
                });
            }
            Err(err) => {
                tracing::warn!("chat reply failed: {}", err);
                emit(StreamEvent::Failed(err));
            }
        }
    })
}
