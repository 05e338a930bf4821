//! Answer generators.
//!
//! - [`RemoteGenerator`]: OpenAI-compatible chat completions API
//! - [`LocalGenerator`]: seq2seq model with beam-sample decoding, T5 on candle by default

pub mod codec;
pub mod decoding;
pub mod local;
pub mod prompt;
pub mod remote;
pub mod t5;

use ragkit_core::config::{GeneratorKind, GeneratorSettings};
use ragkit_core::traits::Generator;
use ragkit_core::Result;

pub use codec::{TextCodec, TokenizedText};
pub use decoding::{beam_sample, DecodeOptions, Seq2Seq};
pub use local::LocalGenerator;
pub use remote::RemoteGenerator;
pub use t5::T5Model;

/// Build the generator named by `settings.kind`. Missing endpoints or model
/// directories are `InvalidConfig`; unloadable models are `ModelUnavailable`.
pub fn generator_from_settings(settings: &GeneratorSettings) -> Result<Box<dyn Generator>> {
    match settings.kind {
        GeneratorKind::Remote => Ok(Box::new(RemoteGenerator::new(&settings.remote)?)),
        GeneratorKind::Local => Ok(Box::new(local::load_t5(&settings.local)?)),
    }
}
