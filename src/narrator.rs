//! Optional recommendation prose from an OpenAI-compatible chat endpoint.
//!
//! Strictly best effort: any failure is logged and yields `None`.

use std::time::Duration;

use super::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct NarratorConfig {
    /// Full URL of the chat-completions endpoint.
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Clone)]
pub struct Narrator {
    client: reqwest::Client,
    config: NarratorConfig,
}

impl Narrator {
    pub fn new(config: NarratorConfig) -> Result<Narrator> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("narrator client: {}", e)))?;

        Ok(Narrator { client, config })
    }

    /// The user prompt sent for `styles`.
    pub fn prompt(styles: &[String]) -> String {
        format!(
            "I enjoy these beer styles: {}. Recommend a few beers I might like and say why.",
            styles.join(", ")
        )
    }

    pub async fn describe(&self, styles: &[String]) -> Option<String> {
        if styles.is_empty() {
            return None;
        }

        match self.complete(Self::prompt(styles)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Narrator request failed: {}", e);
                None
            }
        }
    }

    async fn complete(&self, prompt: String) -> std::result::Result<Option<String>, reqwest::Error> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system".to_owned(),
                    content: "You are a friendly beer sommelier. Keep answers short.".to_owned(),
                },
                Message {
                    role: "user".to_owned(),
                    content: prompt,
                },
            ],
        };

        let mut request = self.client.post(&self.config.api_url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response: CompletionResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content))
    }
}
