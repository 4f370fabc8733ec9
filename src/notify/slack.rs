// src/notify/slack.rs
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use super::NotificationSink;

pub const SLACK_POST_URL: &str = "https://slack.com/api/chat.postMessage";

const COLOR_INFO: &str = "#7CD197";
const COLOR_WARNING: &str = "#EBB424";
const COLOR_ALERT: &str = "#D40E0D";

#[derive(Debug, Deserialize)]
struct PostResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts notifications to a Slack channel through `chat.postMessage`.
pub struct SlackNotifier {
    agent: ureq::Agent,
    endpoint: String,
    token: String,
    channel: String,
    notifee: Option<String>,
}

impl SlackNotifier {
    pub fn new(token: String, channel: String, notifee: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(10))
            .build();

        Self {
            agent,
            endpoint: SLACK_POST_URL.to_string(),
            token,
            channel,
            notifee: notifee.filter(|n| !n.is_empty()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload(&self, title: &str, text: &str, color: &str) -> Value {
        json!({
            "channel": self.channel,
            "text": title,
            "attachments": [{ "text": text, "color": color }],
        })
    }

    fn alert_title(&self, title: &str) -> String {
        match &self.notifee {
            Some(notifee) => format!("{} <@{}>", title, notifee),
            None => title.to_string(),
        }
    }

    fn post(&self, title: &str, text: &str, color: &str) -> Result<()> {
        let body = self.payload(title, text, color).to_string();

        let response = match self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                let error_body = resp.into_string().unwrap_or_default();
                return Err(anyhow!("slack http {}: {}", status, error_body));
            }
            Err(e) => return Err(anyhow!("slack request error: {}", e)),
        };

        let text = response
            .into_string()
            .context("reading slack response")?;
        check_response(&text)
    }
}

fn check_response(text: &str) -> Result<()> {
    let parsed: PostResponse = serde_json::from_str(text).context("decoding slack response")?;
    if parsed.ok {
        Ok(())
    } else {
        Err(anyhow!(
            "slack rejected message: {}",
            parsed.error.unwrap_or_else(|| "unknown error".into())
        ))
    }
}

impl NotificationSink for SlackNotifier {
    fn info(&self, title: &str, body: &str) -> Result<()> {
        self.post(title, body, COLOR_INFO)
    }

    fn warning(&self, title: &str, body: &str) -> Result<()> {
        self.post(title, body, COLOR_WARNING)
    }

    fn alert(&self, title: &str, body: &str) -> Result<()> {
        self.post(&self.alert_title(title), body, COLOR_ALERT)
    }
}
