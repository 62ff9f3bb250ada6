use anyhow::{anyhow, Result};

use super::{ApiClient, CONVERSATIONS_PATH};
use crate::conversations::Conversation;

impl ApiClient {
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let response = self
            .authorize(self.client.get(self.url(CONVERSATIONS_PATH)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list conversations: {}", response.status()));
        }

        let conversations: Vec<Conversation> = response.json().await?;
        Ok(conversations)
    }
}
