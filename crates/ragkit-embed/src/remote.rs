//! Embeddings from an OpenAI-compatible `POST {endpoint}/embeddings` API.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::debug;

use ragkit_core::backoff::{with_backoff, Attempt};
use ragkit_core::config::RemoteSettings;
use ragkit_core::traits::Embedder;
use ragkit_core::types::Embedding;
use ragkit_core::{Error, Result};

pub struct RemoteEmbedder {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
    max_retries: u32,
}

impl RemoteEmbedder {
    pub fn new(settings: &RemoteSettings, dim: usize) -> Result<Self> {
        let (endpoint, model) = settings.require("embedder.remote")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::ModelUnavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", endpoint.trim_end_matches('/')),
            model: model.to_string(),
            api_key: settings.api_key.clone(),
            dim,
            max_retries: settings.max_retries,
        })
    }

    fn request(&self, texts: &[String]) -> Attempt<Value> {
        let mut req = self.client.post(&self.url).json(&json!({ "model": self.model, "input": texts }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        match req.send() {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return match resp.json::<Value>() {
                        Ok(v) => Attempt::Done(v),
                        Err(e) => Attempt::Fail(Error::ModelUnavailable(format!("invalid embeddings response: {e}"))),
                    };
                }
                let body = resp.text().unwrap_or_default();
                let err = Error::ModelUnavailable(format!("embeddings API error {status}: {body}"));
                if status.as_u16() == 429 || status.is_server_error() { Attempt::Retry(err) } else { Attempt::Fail(err) }
            }
            Err(e) => Attempt::Retry(Error::ModelUnavailable(format!("embeddings API unreachable: {e}"))),
        }
    }
}

impl Embedder for RemoteEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::ModelUnavailable("empty embeddings response".to_string()))
    }

    /// Blank inputs are answered locally with zero vectors; everything else
    /// goes to the API in one request.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let pending: Vec<String> = texts.iter().filter(|t| !t.trim().is_empty()).cloned().collect();
        let mut fetched = if pending.is_empty() {
            Vec::new().into_iter()
        } else {
            let payload = with_backoff(self.max_retries, || self.request(&pending))?;
            let vectors = parse_embeddings_response(&payload)?;
            if vectors.len() != pending.len() {
                return Err(Error::ModelUnavailable(format!(
                    "embeddings API returned {} vectors for {} inputs",
                    vectors.len(),
                    pending.len()
                )));
            }
            debug!(n = vectors.len(), "fetched remote embeddings");
            vectors.into_iter()
        };

        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let v = if text.trim().is_empty() {
                vec![0f32; self.dim]
            } else {
                fetched.next().unwrap_or_default()
            };
            if v.len() != self.dim {
                return Err(Error::DimensionMismatch { expected: self.dim, actual: v.len() });
            }
            out.push(v);
        }
        Ok(out)
    }
}

/// `data[].embedding` arrays, ordered by their `index` field when present.
pub fn parse_embeddings_response(json: &Value) -> Result<Vec<Embedding>> {
    let data = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::ModelUnavailable("invalid embeddings response: missing data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::ModelUnavailable("invalid embeddings response: missing embedding".to_string()))?;
        let index = item.get("index").and_then(Value::as_u64).map_or(pos, |i| i as usize);
        let vec: Embedding = embedding.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect();
        indexed.push((index, vec));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
