use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use ragkit_core::config::{require_dir, LocalGeneratorSettings};
use ragkit_core::traits::Generator;
use ragkit_core::{Error, Result};

use crate::codec::TextCodec;
use crate::decoding::{beam_sample, DecodeOptions, Seq2Seq};
use crate::prompt::fit_seq2seq_input;
use crate::t5::T5Model;

/// Generator backed by an in-process seq2seq model.
///
/// The model and RNG sit behind mutexes, so concurrent calls decode one at a time.
pub struct LocalGenerator<M, C> {
    model: Mutex<M>,
    codec: C,
    rng: Mutex<StdRng>,
    options: DecodeOptions,
    max_input_len: usize,
    name: String,
}

impl<M, C> LocalGenerator<M, C>
where
    M: Seq2Seq + Send,
    C: TextCodec,
{
    pub fn new(model: M, codec: C, settings: &LocalGeneratorSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            model: Mutex::new(model),
            codec,
            rng: Mutex::new(rng),
            options: DecodeOptions::from(settings),
            max_input_len: settings.max_input_len,
            name: "local".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }
}

impl<M, C> Generator for LocalGenerator<M, C>
where
    M: Seq2Seq + Send,
    C: TextCodec,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, query: &str, context: &[String]) -> Result<String> {
        let input_ids = fit_seq2seq_input(&self.codec, query, context, self.max_input_len)?;
        let output_ids = {
            let mut model = self.model.lock().map_err(|_| Error::Operation("generator model lock poisoned".into()))?;
            let mut rng = self.rng.lock().map_err(|_| Error::Operation("generator rng lock poisoned".into()))?;
            let encoded = model.encode(&input_ids)?;
            beam_sample(&mut *model, &encoded, &self.options, &mut *rng)?
        };
        debug!(input_tokens = input_ids.len(), output_tokens = output_ids.len(), "local generation finished");
        self.codec.decode(&output_ids)
    }
}

/// T5 model and tokenizer from `settings.model_dir`.
pub fn load_t5(settings: &LocalGeneratorSettings) -> Result<LocalGenerator<T5Model, Tokenizer>> {
    let dir = require_dir(settings.model_dir.as_deref(), "generator.local.model_dir")?;
    let tokenizer_path = dir.join("tokenizer.json");
    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| Error::ModelUnavailable(format!("failed to load tokenizer from {}: {e}", tokenizer_path.display())))?;
    let model = T5Model::load(&dir)?;
    info!(
        num_beams = settings.num_beams,
        top_k = settings.top_k,
        top_p = settings.top_p,
        max_length = settings.max_length,
        "local generator ready"
    );
    Ok(LocalGenerator::new(model, tokenizer, settings).with_name("local:t5"))
}
