//! Discord webhook notifications.

use serde::Serialize;

use crate::client::post_json;
use crate::domain::PipelineError;

/// Webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscordMessage {
    pub username: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct DiscordClient {
    webhook_url: String,
}

impl DiscordClient {
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
        }
    }

    /// # Errors
    /// Returns an error if the webhook can't be reached or rejects the message.
    pub fn post(&self, message: &DiscordMessage) -> Result<(), PipelineError> {
        post_json(&self.webhook_url, &[], message)?;
        Ok(())
    }
}
