//! Tokenizers used for chunking and context budgeting.
//!
//! Chunk sizes and context budgets are measured in model tokens, so the
//! same [`Tokenizer`] must be used at ingestion time and query time.
//!
//! - [`BpeTokenizer`] wraps `tiktoken-rs`'s `cl100k_base`, the encoding of
//!   `text-embedding-3-small` and `gpt-3.5-turbo`.
//! - [`CharTokenizer`] treats every Unicode scalar as one token. It is
//!   lossless and deterministic, which makes it useful offline and in tests.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::{RagError, RagResult};

/// Number of edge tokens we are willing to drop when a window boundary
/// splits a multibyte character. UTF-8 sequences are at most 4 bytes.
const MAX_PARTIAL_TOKENS: usize = 3;

pub trait Tokenizer: Send + Sync {
    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token ids back into text.
    fn decode(&self, tokens: &[u32]) -> String;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// Byte-pair tokenizer backed by the `cl100k_base` vocabulary.
pub struct BpeTokenizer {
    bpe: CoreBPE,
}

impl BpeTokenizer {
    pub fn cl100k() -> RagResult<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| RagError::Configuration(format!("failed to load tokenizer: {}", e)))?;
        Ok(Self { bpe })
    }

    fn try_decode(&self, tokens: &[u32]) -> Option<String> {
        self.bpe
            .decode(tokens.iter().map(|&t| t as _).collect())
            .ok()
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as u32)
            .collect()
    }

    /// Decodes the tokens; if the slice starts or ends inside a multibyte
    /// character, the partial edge tokens are dropped from the text.
    fn decode(&self, tokens: &[u32]) -> String {
        if let Some(text) = self.try_decode(tokens) {
            return text;
        }
        for trim_end in 0..=MAX_PARTIAL_TOKENS.min(tokens.len()) {
            for trim_start in 0..=MAX_PARTIAL_TOKENS.min(tokens.len() - trim_end) {
                let inner = &tokens[trim_start..tokens.len() - trim_end];
                if let Some(text) = self.try_decode(inner) {
                    tracing::debug!(trim_start, trim_end, "decoded window with partial edges");
                    return text;
                }
            }
        }
        tracing::warn!(tokens = tokens.len(), "token window could not be decoded");
        String::new()
    }
}

/// One token per Unicode scalar value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        tokens
            .iter()
            .map(|&t| char::from_u32(t).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Arc<T> {
    fn encode(&self, text: &str) -> Vec<u32> {
        (**self).encode(text)
    }

    fn decode(&self, tokens: &[u32]) -> String {
        (**self).decode(tokens)
    }

    fn count(&self, text: &str) -> usize {
        (**self).count(text)
    }
}

/// Build a tokenizer by its configuration name (`"cl100k"` or `"char"`).
pub fn tokenizer_by_name(name: &str) -> RagResult<Arc<dyn Tokenizer>> {
    match name {
        "cl100k" => Ok(Arc::new(BpeTokenizer::cl100k()?)),
        "char" => Ok(Arc::new(CharTokenizer)),
        other => Err(RagError::Configuration(format!(
            "unknown tokenizer '{}'; expected cl100k or char",
            other
        ))),
    }
}
