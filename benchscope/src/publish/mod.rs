//! Publishing analysis reports
//!
//! Reports are uploaded as private gists and announced on a Discord webhook.
//! Both credentials are optional; without them publishing is skipped and the
//! report stays on local disk.

pub mod discord;
pub mod gist;

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

pub use discord::{DiscordClient, DiscordMessage};
pub use gist::{GistClient, GITHUB_API_BASE};

use crate::domain::PipelineError;

/// Username used for webhook messages when none is configured.
pub const DEFAULT_BOT_NAME: &str = "bot";

/// Upload and notification credentials.
///
/// Serialized with the field names the analysis endpoints expect. Empty
/// strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    #[serde(rename = "botName")]
    pub bot_name: String,
    #[serde(rename = "githubToken")]
    pub github_token: String,
    #[serde(rename = "discordWebhookURL")]
    pub discord_webhook_url: String,
}

impl Credentials {
    #[must_use]
    pub fn new(
        bot_name: impl Into<String>,
        github_token: impl Into<String>,
        discord_webhook_url: impl Into<String>,
    ) -> Self {
        Self {
            bot_name: bot_name.into(),
            github_token: github_token.into(),
            discord_webhook_url: discord_webhook_url.into(),
        }
    }

    /// Both the gist token and the webhook URL are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.github_token.is_empty() && !self.discord_webhook_url.is_empty()
    }
}

/// Gist upload followed by a webhook announcement.
#[derive(Debug, Clone)]
pub struct Publisher {
    gist: GistClient,
    discord: DiscordClient,
    bot_name: String,
}

impl Publisher {
    /// Build a publisher, or `None` if either credential is missing.
    #[must_use]
    pub fn from_credentials(credentials: &Credentials, gist_api_base: &str) -> Option<Self> {
        if !credentials.is_complete() {
            info!("github token or discord webhook url is not found, skip publishing");
            return None;
        }
        let bot_name = if credentials.bot_name.is_empty() {
            DEFAULT_BOT_NAME.to_string()
        } else {
            credentials.bot_name.clone()
        };
        Some(Self {
            gist: GistClient::new(gist_api_base, &credentials.github_token),
            discord: DiscordClient::new(&credentials.discord_webhook_url),
            bot_name,
        })
    }

    #[must_use]
    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Upload `report` and post `"{label}: {url}"`. Returns the gist URL.
    ///
    /// # Errors
    /// Returns an error if the upload or the webhook post fails.
    pub fn publish(
        &self,
        title: &str,
        report: &Path,
        label: &str,
    ) -> Result<String, PipelineError> {
        info!("send {} to gist", report.display());
        let url = self.gist.upload_file(title, report)?;
        self.discord.post(&DiscordMessage {
            username: self.bot_name.clone(),
            content: format!("{label}: {url}"),
        })?;
        Ok(url)
    }
}
