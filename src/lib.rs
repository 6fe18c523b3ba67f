//! # Lecture RAG
//!
//! Retrieval-augmented question answering over lecture material.
//!
//! Uploaded lecture text is split into overlapping token windows,
//! deduplicated, embedded, and indexed. A student's question is embedded,
//! matched against the index, and answered by a completion model from a
//! token-budgeted context. Answers are cached per (user, question).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌──────────┐
//! │  Upload  │──▶│ Chunk+Dedup+Embed │──▶│  SQLite  │
//! └──────────┘   └──────────────────┘   └────┬─────┘
//!                                            │ rebuild
//!                                            ▼
//! ┌──────────┐   ┌──────────────────┐   ┌──────────┐
//! │ Question │──▶│  AnswerService   │◀──│ FlatL2   │
//! └──────────┘   └──────────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lrag init
//! lrag ingest ./notes/week1.txt
//! lrag ask "What is gradient descent?" --user 1
//! lrag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`embedding`] | OpenAI embedding client |
//! | [`completion`] | OpenAI chat-completion client |
//! | [`index`] | Shared vector index |
//! | [`state`] | Component wiring |
//! | [`ingest`] | Upload and delete pipeline |
//! | [`answer`] | Question-answering orchestrator |
//! | [`server`] | HTTP API |
//! | [`stats`] | Database statistics |
//!
//! Pure logic (chunking, dedup, index, context assembly) lives in the
//! `lecture-rag-core` crate.

pub mod answer;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod openai;
pub mod server;
pub mod sqlite_store;
pub mod state;
pub mod stats;
