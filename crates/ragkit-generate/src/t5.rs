//! T5 (and Flan-T5) on candle.

use std::fs;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use tracing::info;

use ragkit_core::{Error, Result};
use ragkit_embed::device::select_device;

use crate::decoding::Seq2Seq;

pub struct T5Model {
    model: T5ForConditionalGeneration,
    device: Device,
    decoder_start_id: u32,
    eos_id: u32,
}

fn unavailable(what: &str, path: &Path, e: impl std::fmt::Display) -> Error {
    Error::ModelUnavailable(format!("failed to load {what} from {}: {e}", path.display()))
}

fn failed(e: candle_core::Error) -> Error {
    Error::GenerationFailed(e.to_string())
}

impl T5Model {
    /// Loads `config.json` and `model.safetensors` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();

        let config_path = model_dir.join("config.json");
        let config_text = fs::read_to_string(&config_path).map_err(|e| unavailable("model config", &config_path, e))?;
        let mut config: T5Config = serde_json::from_str(&config_text).map_err(|e| unavailable("model config", &config_path, e))?;
        // Every step re-runs the decoder over the full prefix, since beams
        // reorder between steps.
        config.use_cache = false;

        let weights_path = model_dir.join("model.safetensors");
        let weights = candle_core::safetensors::load(&weights_path, &device).map_err(|e| unavailable("model weights", &weights_path, e))?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = T5ForConditionalGeneration::load(vb, &config).map_err(|e| unavailable("model", model_dir, e))?;

        let decoder_start_id = config.decoder_start_token_id.unwrap_or(config.pad_token_id) as u32;
        let eos_id = config.eos_token_id as u32;
        info!(dir = %model_dir.display(), decoder_start_id, eos_id, "loaded T5 model");
        Ok(Self { model, device, decoder_start_id, eos_id })
    }

    fn row(&self, ids: &[u32]) -> Result<Tensor> {
        Tensor::new(ids, &self.device).and_then(|t| t.unsqueeze(0)).map_err(failed)
    }
}

impl Seq2Seq for T5Model {
    type Encoded = Tensor;

    fn encode(&mut self, input_ids: &[u32]) -> Result<Tensor> {
        let input = self.row(input_ids)?;
        self.model.encode(&input).map_err(failed)
    }

    fn next_token_logits(&mut self, encoded: &Tensor, prefix: &[u32]) -> Result<Vec<f32>> {
        let decoder_input = self.row(prefix)?;
        self.model.clear_kv_cache();
        let logits = self.model.decode(&decoder_input, encoded).map_err(failed)?;
        logits
            .squeeze(0)
            .and_then(|l| l.to_dtype(DType::F32))
            .and_then(|l| l.to_vec1::<f32>())
            .map_err(failed)
    }

    fn decoder_start_id(&self) -> u32 {
        self.decoder_start_id
    }

    fn eos_id(&self) -> u32 {
        self.eos_id
    }
}
