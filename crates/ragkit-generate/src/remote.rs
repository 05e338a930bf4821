use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ragkit_core::backoff::{with_backoff, Attempt};
use ragkit_core::config::RemoteSettings;
use ragkit_core::traits::Generator;
use ragkit_core::{Error, Result};

use crate::prompt::chat_prompt;

/// Generator that calls an OpenAI-compatible `POST {endpoint}/chat/completions` API.
pub struct RemoteGenerator {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_retries: u32,
    name: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// `choices[0].message.content`, verbatim.
    pub fn into_answer(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::GenerationFailed("response has no message content".to_string()))
    }
}

impl RemoteGenerator {
    pub fn new(settings: &RemoteSettings) -> Result<Self> {
        let (endpoint, model) = settings.require("generator.remote")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::ModelUnavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            model: model.to_string(),
            api_key: settings.api_key.clone(),
            temperature: settings.temperature,
            max_retries: settings.max_retries,
            name: format!("remote:{model}"),
        })
    }

    fn request(&self, prompt: &str) -> Attempt<ChatResponse> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        match req.send() {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return match resp.json::<ChatResponse>() {
                        Ok(parsed) => Attempt::Done(parsed),
                        Err(e) => Attempt::Fail(Error::GenerationFailed(format!("invalid completion response: {e}"))),
                    };
                }
                let text = resp.text().unwrap_or_default();
                let err = Error::GenerationFailed(format!("completion API error {status}: {text}"));
                if status.as_u16() == 429 || status.is_server_error() { Attempt::Retry(err) } else { Attempt::Fail(err) }
            }
            Err(e) => Attempt::Retry(Error::GenerationFailed(format!("completion API unreachable: {e}"))),
        }
    }
}

impl Generator for RemoteGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, query: &str, context: &[String]) -> Result<String> {
        let start = Instant::now();
        let prompt = chat_prompt(query, context);
        let response = with_backoff(self.max_retries, || self.request(&prompt)).map_err(|e| {
            warn!(model = %self.model, error = %e, "remote generation failed");
            e
        })?;
        let answer = response.into_answer()?;
        debug!(model = %self.model, elapsed_ms = start.elapsed().as_millis() as u64, chars = answer.len(), "remote generation finished");
        Ok(answer)
    }
}
