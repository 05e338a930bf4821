//! Embedder implementations.
//!
//! - [`BertEmbedder`]: local sentence-transformer on candle
//! - [`RemoteEmbedder`]: OpenAI-compatible embeddings API
//! - [`HashEmbedder`]: deterministic stand-in for development and tests

pub mod bert;
pub mod device;
pub mod hash;
pub mod pool;
pub mod remote;
pub mod tokenize;

use tracing::info;

use ragkit_core::config::{require_dir, EmbedderKind, EmbedderSettings};
use ragkit_core::traits::Embedder;
use ragkit_core::Result;

pub use bert::BertEmbedder;
pub use hash::HashEmbedder;
pub use pool::masked_mean_l2;
pub use remote::RemoteEmbedder;

/// Build the embedder named by `settings.kind`. Fails with
/// `ModelUnavailable` when a local model cannot be loaded.
pub fn embedder_from_settings(settings: &EmbedderSettings) -> Result<Box<dyn Embedder>> {
    match settings.kind {
        EmbedderKind::Hash => {
            info!(dim = settings.dim, "using hash embedder");
            Ok(Box::new(HashEmbedder::new(settings.dim)))
        }
        EmbedderKind::Remote => Ok(Box::new(RemoteEmbedder::new(&settings.remote, settings.dim)?)),
        EmbedderKind::Bert => {
            let dir = require_dir(settings.model_dir.as_deref(), "embedder.model_dir")?;
            Ok(Box::new(BertEmbedder::load(&dir, settings.max_len)?))
        }
    }
}
