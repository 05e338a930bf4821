//! Local sentence-transformer embedder (BERT family) on candle.
//!
//! Expects `tokenizer.json`, `config.json` and `model.safetensors` in the
//! model directory, the layout of a Hugging Face sentence-transformers
//! checkpoint such as `all-MiniLM-L6-v2`.

use std::fs;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use ragkit_core::traits::Embedder;
use ragkit_core::types::Embedding;
use ragkit_core::{Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

fn unavailable(what: &str, path: &Path, e: impl std::fmt::Display) -> Error {
    Error::ModelUnavailable(format!("failed to load {what} from {}: {e}", path.display()))
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| unavailable("tokenizer", &tokenizer_path, e))?;

        let config_path = model_dir.join("config.json");
        let config_text = fs::read_to_string(&config_path).map_err(|e| unavailable("model config", &config_path, e))?;
        let config: BertConfig = serde_json::from_str(&config_text).map_err(|e| unavailable("model config", &config_path, e))?;
        let raw: serde_json::Value = serde_json::from_str(&config_text).map_err(|e| unavailable("model config", &config_path, e))?;
        let dim = raw["hidden_size"]
            .as_u64()
            .ok_or_else(|| unavailable("model config", &config_path, "missing hidden_size"))? as usize;
        let max_positions = raw["max_position_embeddings"].as_u64().unwrap_or(512) as usize;

        let weights_path = model_dir.join("model.safetensors");
        let weights = candle_core::safetensors::load(&weights_path, &device).map_err(|e| unavailable("model weights", &weights_path, e))?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config).map_err(|e| unavailable("model", model_dir, e))?;

        info!(dim, max_len = max_len.min(max_positions), "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len: max_len.min(max_positions) })
    }

    fn forward(&self, text: &str) -> candle_core::Result<Embedding> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)
            .map_err(|e| candle_core::Error::Msg(e.to_string()))?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        pooled.squeeze(0)?.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec1::<f32>()
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Embedding> {
        let start = Instant::now();
        let embedding = self.forward(text).map_err(|e| Error::Operation(format!("embedding failed: {e}")))?;
        if embedding.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: embedding.len() });
        }
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, chars = text.len(), "embedded text");
        Ok(embedding)
    }
}
