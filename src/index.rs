//! Process-wide vector index shared by the server, ingestion, and queries.
//!
//! Wraps [`FlatL2Index`] in an `Arc<tokio::sync::RwLock<_>>`. tokio's lock is
//! fair and write-preferring, so a stream of searches cannot starve an
//! upload. Searches hold a read guard for the duration of one scan; every
//! mutation holds one write guard for its whole call, so readers never
//! observe a half-applied batch.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockWriteGuard};

use lecture_rag_core::index::{FlatL2Index, SearchHit};
use lecture_rag_core::store::Store;
use lecture_rag_core::RagResult;

#[derive(Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<FlatL2Index>>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn search(&self, query: &[f32], top_k: usize) -> RagResult<Vec<SearchHit>> {
        self.inner.read().await.search(query, top_k)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Append a batch of vectors atomically.
    pub async fn add_batch(&self, entries: Vec<(i64, Vec<f32>)>) -> RagResult<()> {
        self.inner.write().await.extend(entries)
    }

    /// Rebuild from every chunk vector in `store`. Returns the new size.
    pub async fn rebuild_from_store(&self, store: &dyn Store) -> RagResult<usize> {
        let mut guard = self.inner.write().await;
        rebuild_locked(&mut guard, store).await
    }

    /// Exclusive access for callers that must keep a store write and the
    /// matching index update together (ingestion, deletion).
    pub async fn write(&self) -> RwLockWriteGuard<'_, FlatL2Index> {
        self.inner.write().await
    }
}

/// Rebuild through an already-held write guard.
pub async fn rebuild_locked(index: &mut FlatL2Index, store: &dyn Store) -> RagResult<usize> {
    let vectors = store.all_chunk_vectors().await?;
    index.build(vectors).map_err(|e| {
        tracing::error!(error = %e, "failed to rebuild vector index");
        e
    })?;
    tracing::info!(chunks = index.len(), "vector index rebuilt");
    Ok(index.len())
}
