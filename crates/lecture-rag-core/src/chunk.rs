//! Overlapping token-window chunker.
//!
//! Splits lecture text into windows of `chunk_size_tokens` tokens that
//! advance by `chunk_size_tokens - overlap_tokens`, so consecutive windows
//! share exactly `overlap_tokens` tokens.
//!
//! # Algorithm
//!
//! 1. Tokenize the whole text once with the configured [`Tokenizer`].
//! 2. Emit the window `[start, min(start + size, len))` and decode it.
//! 3. Stop once a window reaches the end of the token stream; otherwise
//!    advance `start` by `size - overlap` and repeat.
//!
//! Windows are produced lazily. [`TokenWindows::iter`] can be called any
//! number of times and always restarts from the first window.
//!
//! # Example
//!
//! ```rust
//! use lecture_rag_core::chunk::{Chunker, ChunkingParams};
//! use lecture_rag_core::tokenizer::CharTokenizer;
//!
//! let params = ChunkingParams::new(4, 1).unwrap();
//! let chunker = Chunker::new(CharTokenizer, params);
//! let windows = chunker.windows("abcdefghij");
//! let texts: Vec<String> = windows.iter().map(|w| w.text).collect();
//! assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
//! ```

use crate::error::{RagError, RagResult};
use crate::tokenizer::Tokenizer;

/// Validated window size and overlap, both in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingParams {
    /// # Errors
    ///
    /// [`RagError::Configuration`] if `chunk_size` is zero or `overlap` is not
    /// strictly smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> RagResult<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size_tokens must be > 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "overlap_tokens ({}) must be smaller than chunk_size_tokens ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// One decoded window of tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Position of the window in the sequence, starting at 0.
    pub index: usize,
    /// First token offset (inclusive).
    pub start: usize,
    /// Last token offset (exclusive).
    pub end: usize,
    pub text: String,
}

impl Window {
    pub fn token_count(&self) -> usize {
        self.end - self.start
    }
}

pub struct Chunker<T: Tokenizer> {
    tokenizer: T,
    params: ChunkingParams,
}

impl<T: Tokenizer> Chunker<T> {
    pub fn new(tokenizer: T, params: ChunkingParams) -> Self {
        Self { tokenizer, params }
    }

    pub fn params(&self) -> ChunkingParams {
        self.params
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    /// Tokenize `text` and return its (lazy) window sequence.
    pub fn windows(&self, text: &str) -> TokenWindows<'_, T> {
        TokenWindows {
            chunker: self,
            tokens: self.tokenizer.encode(text),
        }
    }

    /// Convenience: collect every window's text.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.windows(text).iter().map(|w| w.text).collect()
    }
}

/// The tokenized text plus the parameters needed to walk its windows.
pub struct TokenWindows<'a, T: Tokenizer> {
    chunker: &'a Chunker<T>,
    tokens: Vec<u32>,
}

impl<'a, T: Tokenizer> TokenWindows<'a, T> {
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    /// Number of windows the iterator will yield.
    pub fn len(&self) -> usize {
        let n = self.tokens.len();
        let size = self.chunker.params.chunk_size;
        if n == 0 {
            0
        } else if n <= size {
            1
        } else {
            1 + (n - size).div_ceil(self.chunker.params.step())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate from the first window. Each call starts over.
    pub fn iter(&self) -> WindowIter<'_, T> {
        WindowIter {
            chunker: self.chunker,
            tokens: &self.tokens,
            start: 0,
            index: 0,
            done: self.tokens.is_empty(),
        }
    }
}

pub struct WindowIter<'w, T: Tokenizer> {
    chunker: &'w Chunker<T>,
    tokens: &'w [u32],
    start: usize,
    index: usize,
    done: bool,
}

impl<T: Tokenizer> Iterator for WindowIter<'_, T> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.done {
            return None;
        }
        let params = self.chunker.params;
        let end = (self.start + params.chunk_size).min(self.tokens.len());
        let window = Window {
            index: self.index,
            start: self.start,
            end,
            text: self.chunker.tokenizer.decode(&self.tokens[self.start..end]),
        };

        if end >= self.tokens.len() {
            self.done = true;
        } else {
            self.start += params.step();
            self.index += 1;
        }
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::CharTokenizer;

    fn char_chunker(size: usize, overlap: usize) -> Chunker<CharTokenizer> {
        Chunker::new(CharTokenizer, ChunkingParams::new(size, overlap).unwrap())
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            ChunkingParams::new(50, 50),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            ChunkingParams::new(50, 80),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            ChunkingParams::new(0, 0),
            Err(RagError::Configuration(_))
        ));
        assert!(ChunkingParams::new(50, 49).is_ok());
    }

    #[test]
    fn test_empty_text() {
        let chunker = char_chunker(500, 50);
        let windows = chunker.windows("");
        assert!(windows.is_empty());
        assert_eq!(windows.len(), 0);
        assert_eq!(windows.iter().count(), 0);
    }

    #[test]
    fn test_1200_token_document() {
        let chunker = char_chunker(500, 50);
        let text = "x".repeat(1200);
        let windows: Vec<Window> = chunker.windows(&text).iter().collect();

        let sizes: Vec<usize> = windows.iter().map(|w| w.token_count()).collect();
        assert_eq!(sizes, vec![500, 500, 300]);
        let starts: Vec<usize> = windows.iter().map(|w| w.start).collect();
        assert_eq!(starts, vec![0, 450, 900]);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 50);
        }
    }

    #[test]
    fn test_short_text_single_window() {
        let chunker = char_chunker(500, 50);
        let windows: Vec<Window> = chunker.windows("Hello, world!").iter().collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].text, "Hello, world!");
        assert_eq!(windows[0].index, 0);
    }

    #[test]
    fn test_no_pure_overlap_tail() {
        // 950 tokens: the second window already reaches the end.
        let chunker = char_chunker(500, 50);
        let text = "y".repeat(950);
        let sizes: Vec<usize> = chunker
            .windows(&text)
            .iter()
            .map(|w| w.token_count())
            .collect();
        assert_eq!(sizes, vec![500, 500]);
    }

    #[test]
    fn test_len_matches_iteration() {
        for n in [0usize, 1, 9, 10, 11, 19, 20, 21, 57, 100] {
            let chunker = char_chunker(10, 3);
            let text = "z".repeat(n);
            let windows = chunker.windows(&text);
            assert_eq!(windows.len(), windows.iter().count(), "n = {}", n);
        }
    }

    #[test]
    fn test_iteration_is_restartable() {
        let chunker = char_chunker(4, 1);
        let windows = chunker.windows("abcdefghij");
        let first: Vec<Window> = windows.iter().collect();
        let second: Vec<Window> = windows.iter().collect();
        assert_eq!(first, second);
        let mut it = windows.iter();
        assert_eq!(it.next().map(|w| w.text), Some("abcd".to_string()));
        assert_eq!(windows.iter().next().map(|w| w.index), Some(0));
    }

    #[test]
    fn test_non_overlapping_regions_reconstruct_tokens() {
        let cases = [(7usize, 0usize), (7, 3), (5, 4), (13, 6), (1, 0)];
        let text = "The quick brown fox jumps over the lazy dog. 다람쥐 헌 쳇바퀴에 타고파.";
        for (size, overlap) in cases {
            let chunker = char_chunker(size, overlap);
            let windows = chunker.windows(text);
            let tokens = windows.tokens().to_vec();

            let mut rebuilt: Vec<u32> = Vec::new();
            for w in windows.iter() {
                // Skip the part already covered by the previous window.
                let skip = rebuilt.len() - w.start;
                rebuilt.extend_from_slice(&tokens[w.start + skip..w.end]);
                assert!(skip <= overlap);
            }
            assert_eq!(rebuilt, tokens, "size={} overlap={}", size, overlap);
        }
    }

    #[test]
    fn test_window_text_matches_tokens() {
        let chunker = char_chunker(6, 2);
        let windows = chunker.windows("lecture retrieval");
        for w in windows.iter() {
            assert_eq!(w.text.chars().count(), w.token_count());
        }
        assert_eq!(
            chunker.chunk("abcdefgh"),
            vec!["abcdef".to_string(), "efgh".to_string()]
        );
    }

    #[test]
    fn test_bpe_windows_bounded() {
        let tokenizer = crate::tokenizer::BpeTokenizer::cl100k().unwrap();
        let chunker = Chunker::new(tokenizer, ChunkingParams::new(16, 4).unwrap());
        let text = "Gradient descent updates parameters in the direction of the negative gradient. "
            .repeat(10);
        let windows = chunker.windows(&text);
        assert!(windows.len() > 1);
        for w in windows.iter() {
            assert!(w.token_count() <= 16);
            assert!(!w.text.is_empty());
        }
    }
}
