use std::ops::Deref;

use tokenizers::Tokenizer;

use ragkit_core::{Error, Result};

/// Token ids for a text plus the byte span each token covers.
/// Special tokens have `special == true` and an empty span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedText {
    pub ids: Vec<u32>,
    pub offsets: Vec<(usize, usize)>,
    pub special: Vec<bool>,
}

impl TokenizedText {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Text ↔ token ids for a generation model.
pub trait TextCodec: Send + Sync {
    /// Encode with the model's special tokens added.
    fn encode(&self, text: &str) -> Result<TokenizedText>;

    /// Decode, skipping special tokens.
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

impl TextCodec for Tokenizer {
    fn encode(&self, text: &str) -> Result<TokenizedText> {
        let enc = self.deref().encode(text, true).map_err(|e| Error::GenerationFailed(format!("tokenization failed: {e}")))?;
        Ok(TokenizedText {
            ids: enc.get_ids().to_vec(),
            offsets: enc.get_offsets().to_vec(),
            special: enc.get_special_tokens_mask().iter().map(|&m| m == 1).collect(),
        })
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.deref().decode(ids, true).map_err(|e| Error::GenerationFailed(format!("detokenization failed: {e}")))
    }
}
