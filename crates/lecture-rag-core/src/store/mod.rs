//! Storage abstraction for Lecture RAG.
//!
//! The [`Store`] trait defines the persistence operations the ingestion
//! pipeline and the answer orchestrator need, so the SQLite backend and the
//! in-memory backend are interchangeable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::RagResult;
use crate::models::{Chunk, Document, DocumentSummary, NewChunk, QaRecord};

/// Result of [`Store::save_document`].
#[derive(Debug, Clone)]
pub struct SavedDocument {
    pub document: Document,
    /// Stored chunks in `chunk_index` order, with their assigned ids.
    pub chunks: Vec<Chunk>,
    /// True when an earlier version of the same filename was replaced.
    pub replaced: bool,
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_document`](Store::save_document) | Insert or replace a document and all its chunks atomically |
/// | [`get_document`](Store::get_document) | Fetch a document by filename |
/// | [`list_documents`](Store::list_documents) | Document summaries with chunk counts |
/// | [`delete_document`](Store::delete_document) | Delete a document and its chunks |
/// | [`get_chunks`](Store::get_chunks) | Fetch chunks by id, in the requested order |
/// | [`all_chunk_vectors`](Store::all_chunk_vectors) | Every `(chunk_id, embedding)` for index rebuilds |
/// | [`find_answer`](Store::find_answer) | Cached answer lookup by `(user_id, question)` |
/// | [`insert_answer`](Store::insert_answer) | Record a new answer |
/// | [`list_answers`](Store::list_answers) | One user's history, newest first |
/// | [`list_all_answers`](Store::list_all_answers) | Every user's history, newest first |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a document, or replace the content and every chunk of an
    /// existing document with the same filename. Chunk ids are assigned here.
    async fn save_document(
        &self,
        filename: &str,
        file_path: &str,
        content: &str,
        chunks: &[NewChunk],
    ) -> RagResult<SavedDocument>;

    async fn get_document(&self, filename: &str) -> RagResult<Option<Document>>;

    async fn list_documents(&self) -> RagResult<Vec<DocumentSummary>>;

    /// Returns `false` if no document had that filename.
    async fn delete_document(&self, filename: &str) -> RagResult<bool>;

    /// Chunks for the given ids, in the order of `ids`. Unknown ids are skipped.
    async fn get_chunks(&self, ids: &[i64]) -> RagResult<Vec<Chunk>>;

    /// Every stored chunk vector, ordered by document then chunk index.
    async fn all_chunk_vectors(&self) -> RagResult<Vec<(i64, Vec<f32>)>>;

    async fn find_answer(&self, user_id: i64, question: &str) -> RagResult<Option<QaRecord>>;

    /// Insert an answer. If the same `(user_id, question)` already exists,
    /// the existing record is returned unchanged.
    async fn insert_answer(&self, user_id: i64, question: &str, answer: &str)
        -> RagResult<QaRecord>;

    async fn list_answers(&self, user_id: i64) -> RagResult<Vec<QaRecord>>;

    async fn list_all_answers(&self) -> RagResult<Vec<QaRecord>>;
}
