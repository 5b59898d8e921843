//! Conversational weather summaries from an OpenAI-compatible chat
//! completions endpoint.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::SummaryConfig;
use crate::weather::client::AlertFeature;

const SYSTEM_PROMPT: &str = "You are a virtual meteorologist built into an app. Never talk about the location the data comes from or the time. Always respond in conversational text, giving recommendations based on conditions where appropriate.";
const MAX_TOKENS: u32 = 500;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// One-line digest of active alerts fed to the model alongside the raw data.
pub fn alerts_digest(alerts: &[AlertFeature]) -> String {
    if alerts.is_empty() {
        return "There are no active weather alerts at this time.".to_string();
    }
    let listed: Vec<String> = alerts
        .iter()
        .map(|alert| {
            format!(
                "{}: {}",
                alert.properties.event,
                alert.properties.description.as_deref().unwrap_or_default()
            )
        })
        .collect();
    format!("Active alerts: {}", listed.join("; "))
}

pub struct Summarizer {
    http: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl Summarizer {
    pub fn new(config: &SummaryConfig) -> Self {
        Self {
            http: Client::new(),
            api_base: config.openai_api_base.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone().filter(|key| !key.is_empty()),
            model: config.openai_model.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Summarizes current conditions. Yields `None` when no key is configured
    /// or the endpoint does not produce a usable answer.
    pub async fn summarize(&self, conditions: &Value, alerts_summary: &str) -> Option<String> {
        let api_key = self.api_key.as_deref()?;

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "Generate a summary of the current weather conditions based on the following data: {conditions}\n\n{alerts_summary}"
                    ),
                },
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": 1.0,
        });

        let response = match self
            .http
            .post(format!("{}/v1/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Summary request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Summary endpoint returned an error");
            return None;
        }

        match response.json::<ChatCompletion>().await {
            Ok(completion) => {
                let content = completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .map(|content| content.trim().to_string())
                    .filter(|content| !content.is_empty());
                debug!(produced = content.is_some(), "Summary received");
                content
            }
            Err(err) => {
                warn!(error = %err, "Malformed summary response");
                None
            }
        }
    }
}
