//! Token-budgeted context assembly.
//!
//! Takes retrieved chunks in relevance order and builds the context block
//! handed to the completion model. The result is the longest prefix of
//! distinct chunks whose total token count fits the budget: assembly stops
//! at the first chunk that does not fit, even if a later, smaller chunk
//! would.
//!
//! Token cost of the output is the sum of each trimmed chunk's tokens plus
//! the newline separator between consecutive chunks.

use std::collections::HashSet;

use crate::models::Chunk;
use crate::tokenizer::Tokenizer;

const SEPARATOR: &str = "\n";

/// Assemble context from `ranked` within `max_tokens`.
///
/// Returns an empty string when no chunk fits; callers treat that as
/// "no usable context" rather than an error.
pub fn assemble(ranked: &[Chunk], max_tokens: usize, tokenizer: &dyn Tokenizer) -> String {
    let separator_tokens = tokenizer.count(SEPARATOR);
    let mut used_ids = HashSet::new();
    let mut parts: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for chunk in ranked {
        if used_ids.contains(&chunk.id) {
            continue;
        }
        let text = chunk.content.trim();
        let mut cost = tokenizer.count(text);
        if !parts.is_empty() {
            cost += separator_tokens;
        }
        if total + cost > max_tokens {
            break;
        }
        total += cost;
        used_ids.insert(chunk.id);
        parts.push(text);
    }

    tracing::debug!(
        chunks = parts.len(),
        tokens = total,
        budget = max_tokens,
        "assembled context"
    );
    parts.join(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::CharTokenizer;

    fn chunk(id: i64, content: &str) -> Chunk {
        Chunk {
            id,
            document_id: 1,
            chunk_index: id,
            content: content.to_string(),
            embedding: Vec::new(),
        }
    }

    #[test]
    fn test_strict_greedy_prefix() {
        let chunks = vec![
            chunk(1, &"a".repeat(300)),
            chunk(2, &"b".repeat(300)),
            chunk(3, &"c".repeat(300)),
        ];
        let context = assemble(&chunks, 650, &CharTokenizer);
        assert_eq!(context, format!("{}\n{}", "a".repeat(300), "b".repeat(300)));
        assert!(CharTokenizer.count(&context) <= 650);
    }

    #[test]
    fn test_stops_at_first_misfit() {
        let chunks = vec![
            chunk(1, &"a".repeat(50)),
            chunk(2, &"b".repeat(500)),
            chunk(3, &"c".repeat(10)),
        ];
        let context = assemble(&chunks, 100, &CharTokenizer);
        assert_eq!(context, "a".repeat(50));
    }

    #[test]
    fn test_nothing_fits() {
        let chunks = vec![chunk(1, &"a".repeat(200))];
        assert_eq!(assemble(&chunks, 100, &CharTokenizer), "");
        assert_eq!(assemble(&[], 100, &CharTokenizer), "");
    }

    #[test]
    fn test_duplicate_ids_skipped() {
        let chunks = vec![chunk(1, "alpha"), chunk(1, "alpha"), chunk(2, "beta")];
        assert_eq!(assemble(&chunks, 100, &CharTokenizer), "alpha\nbeta");
    }

    #[test]
    fn test_chunks_are_trimmed() {
        let chunks = vec![chunk(1, "  alpha \n"), chunk(2, "\tbeta")];
        // 5 + 1 + 4 = 10 tokens exactly.
        assert_eq!(assemble(&chunks, 10, &CharTokenizer), "alpha\nbeta");
        assert_eq!(assemble(&chunks, 9, &CharTokenizer), "alpha");
    }

    #[test]
    fn test_budget_respected_across_inputs() {
        let sizes = [17usize, 3, 40, 1, 22, 9, 60, 5];
        let chunks: Vec<Chunk> = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| chunk(i as i64 % 5, &"x".repeat(n)))
            .collect();
        for budget in 0..150 {
            let context = assemble(&chunks, budget, &CharTokenizer);
            assert!(CharTokenizer.count(&context) <= budget, "budget {}", budget);
        }
    }
}
