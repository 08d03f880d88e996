//! Tokenizer trait with a BPE implementation and a byte heuristic.
//!
//! Token budgets only need a count, but the trait exposes the token
//! sequence so any encoder can be plugged in unchanged.

use tiktoken_rs::CoreBPE;

use crate::error::TokenizerError;

/// Turns text into an ordered sequence of token ids.
pub trait Tokenizer: Send + Sync {
    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// Byte-pair encoder backed by `tiktoken-rs`.
///
/// Counts match the prompt tokens OpenAI-family models report.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// The `cl100k_base` encoding (GPT-3.5/GPT-4 family).
    pub fn cl100k() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| TokenizerError {
            encoding: "cl100k_base".into(),
            reason: e.to_string(),
        })?;
        Ok(Self { bpe })
    }

    /// The encoding used by `model`; unknown models get `cl100k_base`.
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Ok(Self { bpe }),
            Err(_) => Self::cl100k(),
        }
    }
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer").finish_non_exhaustive()
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_with_special_tokens(text)
    }
}

/// Character-based heuristic: one token per 4 bytes, rounded up.
///
/// Fallback when the BPE tables cannot be loaded, and a deterministic
/// encoder for tests. Within ~10% of BPE counts on English text; CJK
/// text is overestimated, which keeps packing under budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

const BYTES_PER_TOKEN: usize = 4;

impl Tokenizer for HeuristicTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.as_bytes()
            .chunks(BYTES_PER_TOKEN)
            .map(|chunk| {
                let mut buf = [0u8; BYTES_PER_TOKEN];
                buf[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(buf)
            })
            .collect()
    }

    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(BYTES_PER_TOKEN)
    }
}
