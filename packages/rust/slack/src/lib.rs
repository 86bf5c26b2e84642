//! Slack notifier.
//!
//! Posts Block Kit messages to one channel through `chat.postMessage`.
//! Both message kinds return a `Result` so callers decide whether a failed
//! post matters; the pipeline only ever logs it.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use recruitreport_shared::{ReportError, Result, SlackConfig};

/// Header of the success message.
pub const REPORT_HEADER: &str = "📊 Monthly Recruitment Performance Report";

/// Header of the failure message.
pub const ERROR_HEADER: &str = "❌ Monthly Report Generation Failed";

/// User-Agent string for Slack requests.
const USER_AGENT: &str = concat!("recruitreport/", env!("CARGO_PKG_VERSION"));

/// Slack Web API envelope. HTTP 200 with `ok: false` is still a failure.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Message shapes
// ---------------------------------------------------------------------------

/// Header, summary, divider, link.
pub fn report_blocks(summary: &str, url: &str) -> Value {
    json!([
        {
            "type": "header",
            "text": { "type": "plain_text", "text": REPORT_HEADER, "emoji": true }
        },
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": summary }
        },
        { "type": "divider" },
        {
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("📎 *Full report:* <{url}|View in Confluence>")
            }
        }
    ])
}

/// Header plus the error in a preformatted block.
pub fn error_blocks(message: &str) -> Value {
    json!([
        {
            "type": "header",
            "text": { "type": "plain_text", "text": ERROR_HEADER, "emoji": true }
        },
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("```{message}```") }
        }
    ])
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Bot-token client bound to one channel.
pub struct SlackClient {
    client: Client,
    api_base: String,
    token: String,
    channel: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let token = config
            .bot_token
            .clone()
            .ok_or_else(|| ReportError::NotifyFailed("SLACK_BOT_TOKEN is not set".into()))?;
        let channel = config
            .channel_id
            .clone()
            .ok_or_else(|| ReportError::NotifyFailed("SLACK_CHANNEL_ID is not set".into()))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReportError::NotifyFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            channel,
        })
    }

    /// Share the report summary and link.
    #[instrument(skip(self, summary), fields(channel = %self.channel))]
    pub async fn send_report(&self, summary: &str, url: &str) -> Result<()> {
        let fallback = format!("{REPORT_HEADER}\n{url}");
        self.post_message(report_blocks(summary, url), &fallback).await?;
        info!("report summary posted");
        Ok(())
    }

    /// Announce a failed run.
    #[instrument(skip(self, message), fields(channel = %self.channel))]
    pub async fn send_error(&self, message: &str) -> Result<()> {
        let fallback = format!("{ERROR_HEADER}: {message}");
        self.post_message(error_blocks(message), &fallback).await?;
        info!("failure notice posted");
        Ok(())
    }

    async fn post_message(&self, blocks: Value, text: &str) -> Result<()> {
        let payload = json!({
            "channel": self.channel,
            "blocks": blocks,
            "text": text,
        });

        let response = self
            .client
            .post(format!("{}/api/chat.postMessage", self.api_base))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReportError::NotifyFailed(format!("chat.postMessage: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::NotifyFailed(format!(
                "chat.postMessage: HTTP {status}"
            )));
        }

        let api: ApiResponse = response.json().await.map_err(|e| {
            ReportError::NotifyFailed(format!("chat.postMessage: invalid response body: {e}"))
        })?;

        if !api.ok {
            let code = api.error.unwrap_or_else(|| "unknown_error".into());
            warn!(error = %code, "slack rejected message");
            return Err(ReportError::NotifyFailed(code));
        }

        Ok(())
    }
}
