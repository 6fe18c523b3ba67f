//! Core data models used throughout Lecture RAG.
//!
//! These types represent the lecture documents, their chunks, and the
//! cached question/answer records that flow through ingestion and
//! retrieval. Timestamps are Unix seconds.

use serde::Serialize;

/// An uploaded lecture document, identified by its unique filename.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Lightweight document listing entry (no body text).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub chunk_count: i64,
    pub updated_at: i64,
}

/// A chunk waiting to be written; ids are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A stored chunk of a document's text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A cached answer to one user's question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaRecord {
    pub id: i64,
    pub user_id: i64,
    pub question: String,
    pub answer: String,
    pub created_at: i64,
}
