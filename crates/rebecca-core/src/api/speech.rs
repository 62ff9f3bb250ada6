use anyhow::{anyhow, Result};
use bytes::Bytes;
use serde::Serialize;

use super::{ApiClient, SPEECH_PATH};

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

impl ApiClient {
    /// Synthesize `text` and return the encoded audio payload
    pub async fn synthesize(&self, text: &str) -> Result<Bytes> {
        let response = self
            .authorize(self.client.post(self.url(SPEECH_PATH)))
            .json(&SpeechRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Speech synthesis failed with status: {}", response.status()));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(anyhow!("Speech synthesis returned no audio"));
        }

        Ok(audio)
    }
}
