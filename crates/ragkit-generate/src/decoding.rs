//! Beam search with sampling for encoder-decoder models.
//!
//! Each step scores every live beam's next token, filters each beam's
//! candidates with top-k then top-p, and samples `2 * num_beams` of the
//! pooled candidates without replacement. The samples are walked best
//! first: end-of-sequence tokens close a hypothesis, everything else
//! becomes a beam for the next step.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::trace;

use ragkit_core::config::LocalGeneratorSettings;
use ragkit_core::Result;

/// An encoder-decoder language model driven one token at a time.
pub trait Seq2Seq {
    /// Encoder output, computed once per input.
    type Encoded;

    fn encode(&mut self, input_ids: &[u32]) -> Result<Self::Encoded>;

    /// Logits over the vocabulary for the token after `prefix`.
    fn next_token_logits(&mut self, encoded: &Self::Encoded, prefix: &[u32]) -> Result<Vec<f32>>;

    fn decoder_start_id(&self) -> u32;
    fn eos_id(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    pub num_beams: usize,
    pub top_k: usize,
    pub top_p: f32,
    /// Zero disables the constraint.
    pub no_repeat_ngram_size: usize,
    /// Includes the decoder start token.
    pub max_length: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::from(&LocalGeneratorSettings::default())
    }
}

impl From<&LocalGeneratorSettings> for DecodeOptions {
    fn from(s: &LocalGeneratorSettings) -> Self {
        Self {
            num_beams: s.num_beams.max(1),
            top_k: s.top_k,
            top_p: s.top_p,
            no_repeat_ngram_size: s.no_repeat_ngram_size,
            max_length: s.max_length.max(2),
        }
    }
}

#[derive(Debug, Clone)]
struct Beam {
    tokens: Vec<u32>,
    score: f32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    beam: usize,
    token: u32,
    score: f32,
}

/// Decode one sequence. Returns the generated ids without the decoder
/// start token and without end-of-sequence.
pub fn beam_sample<M, R>(model: &mut M, encoded: &M::Encoded, opts: &DecodeOptions, rng: &mut R) -> Result<Vec<u32>>
where
    M: Seq2Seq + ?Sized,
    R: Rng + ?Sized,
{
    let start = model.decoder_start_id();
    let eos = model.eos_id();
    let num_beams = opts.num_beams.max(1);

    let mut beams = vec![Beam { tokens: vec![start], score: 0.0 }];
    let mut finished: Vec<Beam> = Vec::new();

    while !beams.is_empty() && finished.len() < num_beams {
        if beams[0].tokens.len() >= opts.max_length {
            break;
        }

        let mut candidates = Vec::new();
        for (b, beam) in beams.iter().enumerate() {
            let logits = model.next_token_logits(encoded, &beam.tokens)?;
            let mut scores = log_softmax(&logits);
            ban_repeated_ngrams(&beam.tokens, opts.no_repeat_ngram_size, &mut scores);
            for (token, score) in nucleus(&scores, opts.top_k, opts.top_p) {
                candidates.push(Candidate { beam: b, token, score: beam.score + score });
            }
        }

        let mut picked = sample_without_replacement(&candidates, 2 * num_beams, rng);
        picked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut next = Vec::with_capacity(num_beams);
        for (rank, c) in picked.iter().enumerate() {
            let parent = &beams[c.beam];
            if c.token == eos {
                if rank < num_beams {
                    finished.push(Beam { tokens: parent.tokens.clone(), score: c.score / parent.tokens.len() as f32 });
                }
                continue;
            }
            let mut tokens = parent.tokens.clone();
            tokens.push(c.token);
            next.push(Beam { tokens, score: c.score });
            if next.len() == num_beams {
                break;
            }
        }
        trace!(live = next.len(), finished = finished.len(), "decode step");
        beams = next;
    }

    // Beams cut off by max_length compete with the finished hypotheses.
    if finished.len() < num_beams {
        for beam in beams {
            let len = beam.tokens.len() as f32;
            finished.push(Beam { score: beam.score / len, tokens: beam.tokens });
        }
    }

    let best = finished.into_iter().max_by(|a, b| a.score.total_cmp(&b.score));
    Ok(best
        .map(|b| b.tokens.into_iter().skip(1).filter(|&t| t != eos).collect())
        .unwrap_or_default())
}

pub(crate) fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = logits.iter().map(|&x| (x - max).exp()).sum();
    let log_sum = sum.ln() + max;
    logits.iter().map(|&x| x - log_sum).collect()
}

/// Forbid any token that would repeat an n-gram already present in `tokens`.
pub(crate) fn ban_repeated_ngrams(tokens: &[u32], n: usize, scores: &mut [f32]) {
    if n == 0 || tokens.len() + 1 < n {
        return;
    }
    let prefix = &tokens[tokens.len() + 1 - n..];
    for window in tokens.windows(n) {
        if &window[..n - 1] == prefix {
            if let Some(s) = scores.get_mut(window[n - 1] as usize) {
                *s = f32::NEG_INFINITY;
            }
        }
    }
}

/// Surviving `(token, log-prob)` pairs after top-k then top-p, best first.
pub(crate) fn nucleus(scores: &[f32], top_k: usize, top_p: f32) -> Vec<(u32, f32)> {
    let mut ranked: Vec<(u32, f32)> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .map(|(i, &s)| (i as u32, s))
        .collect();
    if top_k > 0 && ranked.len() > top_k {
        ranked.select_nth_unstable_by(top_k - 1, |a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_k);
    }
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    if top_p < 1.0 && !ranked.is_empty() {
        let max = ranked[0].1;
        let weights: Vec<f32> = ranked.iter().map(|(_, s)| (s - max).exp()).collect();
        let total: f32 = weights.iter().sum();
        let mut mass = 0.0;
        let mut keep = 0;
        for w in &weights {
            keep += 1;
            mass += w / total;
            if mass >= top_p {
                break;
            }
        }
        ranked.truncate(keep);
    }
    ranked
}

fn sample_without_replacement<R: Rng + ?Sized>(candidates: &[Candidate], n: usize, rng: &mut R) -> Vec<Candidate> {
    let Some(max) = candidates.iter().map(|c| c.score).max_by(f32::total_cmp) else {
        return Vec::new();
    };
    let mut weights: Vec<f32> = candidates.iter().map(|c| (c.score - max).exp()).collect();
    let mut picked = Vec::with_capacity(n.min(candidates.len()));
    while picked.len() < n {
        // Fails once every remaining weight is zero.
        let Ok(dist) = WeightedIndex::new(&weights) else { break };
        let i = dist.sample(rng);
        picked.push(candidates[i]);
        weights[i] = 0.0;
    }
    picked
}
