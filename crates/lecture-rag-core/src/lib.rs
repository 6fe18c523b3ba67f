//! # Lecture RAG Core
//!
//! Runtime-free logic for Lecture RAG: data models, the error taxonomy,
//! tokenization and chunking, deduplication, the flat L2 vector index,
//! context assembly, and the storage/provider traits.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. The
//! application crate supplies SQLite storage, OpenAI-backed providers,
//! and the shared index wrapper on top of it.

pub mod chunk;
pub mod context;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod store;
pub mod tokenizer;

pub use error::{RagError, RagResult};
