//! Request/response shapes for the chat and post front ends.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use ragkit_core::types::AnswerEnvelope;
use ragkit_core::Result;

use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_query: String,
    /// Accepted for compatibility; not used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_context: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: ChatBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBody {
    pub initial_response: String,
    pub chain_of_thought: Vec<String>,
    pub sources: Vec<String>,
    pub final_response: String,
}

impl ChatResponse {
    pub fn new(query: &str, envelope: AnswerEnvelope) -> Self {
        let AnswerEnvelope { answer, sources } = envelope;
        Self {
            response: ChatBody {
                initial_response: answer.clone(),
                chain_of_thought: vec![format!("Query: {query}"), "Analyzing relevant sources:".to_string()],
                sources,
                final_response: answer,
            },
        }
    }
}

/// Post ids arrive as either JSON strings or numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostId {
    Number(i64),
    Text(String),
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Number(n) => write!(f, "{n}"),
            PostId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRequest {
    pub post_id: PostId,
    pub post_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResponse {
    pub status: PostStatus,
    pub message: String,
}

impl Pipeline {
    pub fn handle_query(&self, request: &QueryRequest, k: usize) -> Result<ChatResponse> {
        let envelope = self.answer(&request.user_query, k)?;
        Ok(ChatResponse::new(&request.user_query, envelope))
    }

    /// Ingest and persist one post. Failures are reported in the response.
    pub fn handle_post(&self, request: PostRequest) -> PostResponse {
        let id = request.post_id.to_string();
        match self.ingest(id.clone(), request.post_text).and_then(|()| self.persist()) {
            Ok(()) => PostResponse { status: PostStatus::Success, message: format!("Post {id} indexed") },
            Err(e) => {
                warn!(id = %id, error = %e, "post ingest failed");
                PostResponse { status: PostStatus::Error, message: e.to_string() }
            }
        }
    }
}
