//! Prompt text for both generators, and input truncation for the local one.

use tracing::debug;

use ragkit_core::Result;

use crate::codec::TextCodec;

pub const NOT_FOUND_ANSWER: &str = "I apologize, but I couldn't find the answer to your question in the provided context.";

/// Chat prompt for the remote generator. The fallback answer is only an
/// instruction to the model.
pub fn chat_prompt(query: &str, context: &[String]) -> String {
    format!(
        "Answer the question as detailed as possible from the provided context.\n\
         If the answer is not in the provided context, respond with \"{NOT_FOUND_ANSWER}\"\n\
         Please maintain a professional and helpful tone.\n\n\
         Context:\n{}\n\n\
         Question:\n{}\n\n\
         Answer:",
        context.join("\n\n"),
        query
    )
}

/// `Query: {query}\nContext: {passages joined by spaces}`
pub fn seq2seq_input(query: &str, context: &[String]) -> String {
    format!("Query: {query}\nContext: {}", context.join(" "))
}

/// Model input for `query` and `context` that fits in `max_len` tokens.
///
/// Context is cut from its end at a token boundary; the query is kept whole.
/// When the query alone is over budget the context is dropped and the ids
/// are truncated.
pub fn fit_seq2seq_input(codec: &dyn TextCodec, query: &str, context: &[String], max_len: usize) -> Result<Vec<u32>> {
    let prefix = seq2seq_input(query, &[]);
    let full = seq2seq_input(query, context);
    let encoded = codec.encode(&full)?;
    if encoded.len() <= max_len {
        return Ok(encoded.ids);
    }

    let overflow = encoded.len() - max_len;
    // Start offsets of the tokens that fall inside the context.
    let context_starts: Vec<usize> = encoded
        .offsets
        .iter()
        .zip(&encoded.special)
        .filter(|((start, _), special)| !**special && *start >= prefix.len())
        .map(|((start, _), _)| *start)
        .collect();

    let mut keep = context_starts.len().saturating_sub(overflow);
    while keep > 0 {
        let cut = context_starts[keep];
        let candidate = codec.encode(full[..cut].trim_end())?;
        if candidate.len() <= max_len {
            debug!(
                input_tokens = encoded.len(),
                kept_tokens = candidate.len(),
                context_chars_dropped = full.len() - cut,
                "truncated generator context"
            );
            return Ok(candidate.ids);
        }
        keep -= 1;
    }

    let mut ids = codec.encode(prefix.trim_end())?.ids;
    if ids.len() > max_len {
        debug!(query_tokens = ids.len(), max_len, "query exceeds input budget; truncating");
        ids.truncate(max_len);
    }
    Ok(ids)
}
