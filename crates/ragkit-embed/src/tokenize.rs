use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use ragkit_core::{Error, Result};

/// Encode `text` as a single-row batch, truncated to `max_len` tokens.
/// Returns `(input_ids, attention_mask)`, both `[1, T]` u32.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer
        .encode(text, true)
        .map_err(|e| Error::Operation(format!("tokenization failed: {e}")))?;
    let mut ids = enc.get_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
    let to_row = |v: Vec<u32>| -> candle_core::Result<Tensor> { Tensor::new(v.as_slice(), device)?.unsqueeze(0) };
    let input_ids = to_row(ids).map_err(|e| Error::Operation(e.to_string()))?;
    let attention_mask = to_row(mask).map_err(|e| Error::Operation(e.to_string()))?;
    Ok((input_ids, attention_mask))
}
