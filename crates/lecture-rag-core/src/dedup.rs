//! Exact and near-duplicate chunk removal.
//!
//! Lecture material repeats itself: slide headers, footers, and OCR'd copies
//! of the same page produce chunks that add nothing to retrieval. Removal
//! happens in two passes before anything is stored:
//!
//! 1. **Exact**: drop chunks shorter than `min_chars` and chunks whose
//!    SHA-256 content hash was already seen.
//! 2. **Near**: embed the survivors and greedily cluster them in original
//!    order: each chunk not yet marked is kept, and every later unmarked
//!    chunk with cosine similarity `>= similarity_threshold` to it is marked
//!    as a duplicate and never compared again.
//!
//! The near pass is O(n²) in comparisons, so the input size is capped by
//! [`DedupParams::max_chunks`].

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{RagError, RagResult};

pub const DEFAULT_MAX_CHUNKS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupParams {
    pub min_chars: usize,
    pub similarity_threshold: f32,
    pub max_chunks: usize,
}

impl DedupParams {
    pub fn new(min_chars: usize, similarity_threshold: f32) -> RagResult<Self> {
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(RagError::Configuration(format!(
                "similarity_threshold must be in [0.0, 1.0], got {}",
                similarity_threshold
            )));
        }
        Ok(Self {
            min_chars,
            similarity_threshold,
            max_chunks: DEFAULT_MAX_CHUNKS,
        })
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }
}

/// A chunk that survived both passes, with the embedding computed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct KeptChunk {
    /// Position in the deduplicator's input.
    pub source_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// SHA-256 of the text, hex-encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Exact pass. Returns the indices of surviving chunks, in order.
pub fn exact_dedupe(chunks: &[String], min_chars: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .enumerate()
        .filter(|(_, text)| text.trim().chars().count() >= min_chars)
        .filter(|(_, text)| seen.insert(content_hash(text.trim())))
        .map(|(i, _)| i)
        .collect()
}

/// Near pass over precomputed embeddings. Returns kept indices, in order.
pub fn near_duplicate_keep(embeddings: &[Vec<f32>], threshold: f32) -> Vec<usize> {
    let mut used = vec![false; embeddings.len()];
    let mut kept = Vec::new();

    for i in 0..embeddings.len() {
        if used[i] {
            continue;
        }
        kept.push(i);
        for j in (i + 1)..embeddings.len() {
            if !used[j] && cosine_similarity(&embeddings[i], &embeddings[j]) >= threshold {
                used[j] = true;
            }
        }
    }

    kept
}

pub struct Deduplicator {
    params: DedupParams,
}

impl Deduplicator {
    pub fn new(params: DedupParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> DedupParams {
        self.params
    }

    /// Run both passes, embedding the exact-pass survivors with `embedder`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Configuration`] if `chunks` exceeds `max_chunks`.
    /// - [`RagError::EmbeddingService`] if embedding fails or returns the
    ///   wrong number of vectors.
    pub async fn dedupe(
        &self,
        embedder: &dyn Embedder,
        chunks: &[String],
    ) -> RagResult<Vec<KeptChunk>> {
        if chunks.len() > self.params.max_chunks {
            return Err(RagError::Configuration(format!(
                "{} chunks exceeds the dedup limit of {}",
                chunks.len(),
                self.params.max_chunks
            )));
        }

        let survivors = exact_dedupe(chunks, self.params.min_chars);
        if survivors.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = survivors.iter().map(|&i| chunks[i].clone()).collect();
        let embeddings = embedder.embed(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingService(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let kept = near_duplicate_keep(&embeddings, self.params.similarity_threshold);
        tracing::debug!(
            input = chunks.len(),
            exact_survivors = survivors.len(),
            kept = kept.len(),
            "deduplicated chunks"
        );

        let mut embeddings: Vec<Option<Vec<f32>>> = embeddings.into_iter().map(Some).collect();
        Ok(kept
            .into_iter()
            .map(|k| KeptChunk {
                source_index: survivors[k],
                text: texts[k].clone(),
                embedding: embeddings[k].take().unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Returns a fixed vector per text; unknown texts get a unit vector on a
    /// fresh axis.
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn model_name(&self) -> &str {
            "table"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| self.table.get(t).cloned().unwrap_or(vec![0.0, 0.0, 1.0]))
                .collect())
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_drops_repeats_and_short() {
        let chunks = strings(&[
            "Lecture 1: gradient descent",
            "ok",
            "Lecture 1: gradient descent",
            "  Lecture 1: gradient descent  ",
            "Lecture 2: backpropagation",
        ]);
        assert_eq!(exact_dedupe(&chunks, 5), vec![0, 4]);
        assert_eq!(exact_dedupe(&chunks, 0), vec![0, 1, 4]);
    }

    #[test]
    fn test_near_greedy_order() {
        let e = vec![
            vec![1.0, 0.0],
            vec![0.99, 0.01],
            vec![0.0, 1.0],
            vec![0.01, 0.99],
        ];
        assert_eq!(near_duplicate_keep(&e, 0.95), vec![0, 2]);
        assert_eq!(near_duplicate_keep(&e, 1.01), vec![0, 1, 2, 3]);
        assert!(near_duplicate_keep(&[], 0.95).is_empty());
    }

    #[test]
    fn test_marked_chunk_is_not_compared_again() {
        // b is close to a and c; a marks b, so c is judged only against a.
        let a = vec![1.0, 0.0];
        let b = vec![0.8, 0.6];
        let c = vec![0.28, 0.96];
        let sim_ab = cosine_similarity(&a, &b);
        let sim_bc = cosine_similarity(&b, &c);
        let sim_ac = cosine_similarity(&a, &c);
        let threshold = 0.79;
        assert!(sim_ab >= threshold && sim_bc >= threshold && sim_ac < threshold);
        assert_eq!(near_duplicate_keep(&[a, b, c], threshold), vec![0, 2]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let a = vec![1.0f32, 0.0];
        let b = vec![0.6f32, 0.8];
        let sim = cosine_similarity(&a, &b);
        assert!(sim > 0.0);
        let just_above = f32::from_bits(sim.to_bits() + 1);

        assert_eq!(near_duplicate_keep(&[a.clone(), b.clone()], sim), vec![0]);
        assert_eq!(near_duplicate_keep(&[a, b], just_above), vec![0, 1]);
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(matches!(
            DedupParams::new(10, 1.5),
            Err(RagError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_dedupe_pipeline_keeps_order_and_embeddings() {
        let table = HashMap::from([
            ("alpha chunk text".to_string(), vec![1.0, 0.0, 0.0]),
            ("alpha chunk text, reworded".to_string(), vec![0.99, 0.05, 0.0]),
            ("beta chunk text".to_string(), vec![0.0, 1.0, 0.0]),
        ]);
        let embedder = TableEmbedder { table };
        let dedup = Deduplicator::new(DedupParams::new(5, 0.95).unwrap());
        let chunks = strings(&[
            "alpha chunk text",
            "tiny",
            "alpha chunk text, reworded",
            "beta chunk text",
            "alpha chunk text",
        ]);

        let kept = dedup.dedupe(&embedder, &chunks).await.unwrap();
        let indices: Vec<usize> = kept.iter().map(|k| k.source_index).collect();
        assert_eq!(indices, vec![0, 3]);
        assert_eq!(kept[1].text, "beta chunk text");
        assert_eq!(kept[1].embedding, vec![0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_dedupe_is_idempotent() {
        let table = HashMap::from([
            ("one one one".to_string(), vec![1.0, 0.0, 0.0]),
            ("one one one!".to_string(), vec![0.97, 0.1, 0.0]),
            ("two two two".to_string(), vec![0.0, 1.0, 0.0]),
            ("three three".to_string(), vec![0.5, 0.5, 0.7]),
        ]);
        let embedder = TableEmbedder { table };
        let dedup = Deduplicator::new(DedupParams::new(3, 0.95).unwrap());
        let chunks = strings(&["one one one", "one one one!", "two two two", "three three"]);

        let first: Vec<String> = dedup
            .dedupe(&embedder, &chunks)
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.text)
            .collect();
        let second: Vec<String> = dedup
            .dedupe(&embedder, &first)
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.text)
            .collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn test_dedupe_rejects_unbounded_input() {
        let embedder = TableEmbedder {
            table: HashMap::new(),
        };
        let dedup = Deduplicator::new(DedupParams::new(0, 0.95).unwrap().with_max_chunks(2));
        let chunks = strings(&["a", "b", "c"]);
        assert!(matches!(
            dedup.dedupe(&embedder, &chunks).await,
            Err(RagError::Configuration(_))
        ));
    }
}
