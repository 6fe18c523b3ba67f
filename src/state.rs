//! Wiring of the long-lived components.
//!
//! [`AppContext`] owns the store, the providers, the tokenizer, and the
//! shared vector index. The CLI builds one per command and the HTTP server
//! shares one across all handlers.

use std::sync::Arc;

use anyhow::Result;

use lecture_rag_core::embedding::{Completer, Embedder};
use lecture_rag_core::store::Store;
use lecture_rag_core::tokenizer::{tokenizer_by_name, Tokenizer};

use crate::completion::create_completer;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::index::SharedIndex;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub embedder: Arc<dyn Embedder>,
    pub completer: Arc<dyn Completer>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub index: SharedIndex,
}

impl AppContext {
    /// Assemble a context from already-built parts. The index starts empty;
    /// call [`AppContext::load_index`] to populate it from the store.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Result<Self> {
        let tokenizer = tokenizer_by_name(&config.chunking.tokenizer)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            embedder,
            completer,
            tokenizer,
            index: SharedIndex::new(),
        })
    }

    /// Open the SQLite database (creating the schema if needed), build the
    /// configured providers, and load the index from stored chunks.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::apply(&pool).await?;

        let embedder = create_embedder(&config.embedding)?;
        let completer = create_completer(&config.completion)?;
        let ctx = Self::new(
            config,
            Arc::new(SqliteStore::new(pool)),
            embedder,
            completer,
        )?;
        ctx.load_index().await?;
        Ok(ctx)
    }

    /// Open the database without building providers. For commands that only
    /// read stored data (documents, history, stats).
    pub async fn open_offline(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::apply(&pool).await?;
        Self::new(
            config,
            Arc::new(SqliteStore::new(pool)),
            Arc::new(crate::embedding::DisabledEmbedder),
            Arc::new(crate::completion::DisabledCompleter),
        )
    }

    pub async fn load_index(&self) -> Result<usize> {
        Ok(self.index.rebuild_from_store(self.store.as_ref()).await?)
    }
}
