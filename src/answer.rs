//! The question-answering path.
//!
//! # Stages
//!
//! ```text
//! CacheCheck ─hit──────────────────────────────────────────────▶ Done
//!     │ miss
//!     ▼
//! EmbedQuery → VectorSearch → AssembleContext → GenerateAnswer → Persist → Done
//! ```
//!
//! Each request runs inside a `tracing` span carrying a fresh request id;
//! every stage transition is logged within it. Any failure before
//! `Persist` ends the request with that stage's error. A persistence
//! failure is logged and reported through [`Answer::persisted`], but the
//! generated answer is still returned.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use lecture_rag_core::context::assemble;
use lecture_rag_core::embedding::{Completer, Embedder};
use lecture_rag_core::store::Store;
use lecture_rag_core::tokenizer::Tokenizer;
use lecture_rag_core::{RagError, RagResult};

use crate::config::{CompletionConfig, RetrievalConfig};
use crate::index::SharedIndex;
use crate::state::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CacheCheck,
    EmbedQuery,
    VectorSearch,
    AssembleContext,
    GenerateAnswer,
    Persist,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CacheCheck => "cache_check",
            Stage::EmbedQuery => "embed_query",
            Stage::VectorSearch => "vector_search",
            Stage::AssembleContext => "assemble_context",
            Stage::GenerateAnswer => "generate_answer",
            Stage::Persist => "persist",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    #[serde(rename = "answer")]
    pub text: String,
    /// Served from a previous answer to the same question.
    pub cached: bool,
    /// The answer is stored (always true for cache hits).
    pub persisted: bool,
}

/// Build the completion prompt around the assembled lecture excerpts.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the student's question accurately and concisely, using the lecture excerpts below.\n\
         \n\
         --- Lecture excerpts begin ---\n\
         {}\n\
         --- Lecture excerpts end ---\n\
         \n\
         Question: {}\n\
         Answer:",
        context, question
    )
}

pub struct AnswerService {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    index: SharedIndex,
    tokenizer: Arc<dyn Tokenizer>,
    retrieval: RetrievalConfig,
    completion: CompletionConfig,
}

impl AnswerService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            store: ctx.store.clone(),
            embedder: ctx.embedder.clone(),
            completer: ctx.completer.clone(),
            index: ctx.index.clone(),
            tokenizer: ctx.tokenizer.clone(),
            retrieval: ctx.config.retrieval.clone(),
            completion: ctx.config.completion.clone(),
        }
    }

    /// Answer `question` for `user_id`, reusing a stored answer to the same
    /// question when one exists.
    ///
    /// The cache key is the question with surrounding whitespace removed.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for an empty question.
    /// - [`RagError::Storage`] if the cache lookup fails.
    /// - [`RagError::EmbeddingService`] if the query cannot be embedded.
    /// - [`RagError::EmptyIndex`] if no lecture material is indexed.
    /// - [`RagError::NoRelevantContext`] if no retrieved chunk fits the budget.
    /// - [`RagError::CompletionService`] if generation fails.
    pub async fn ask(&self, user_id: i64, question: &str) -> RagResult<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".to_string()));
        }

        let span = tracing::info_span!("ask", request_id = %Uuid::new_v4(), user_id);
        self.run(user_id, question).instrument(span).await
    }

    async fn run(&self, user_id: i64, question: &str) -> RagResult<Answer> {
        tracing::info!(stage = %Stage::CacheCheck, "answering question");
        if let Some(hit) = self.store.find_answer(user_id, question).await? {
            tracing::info!(stage = %Stage::Done, cached = true, "served cached answer");
            return Ok(Answer {
                text: hit.answer,
                cached: true,
                persisted: true,
            });
        }

        tracing::debug!(stage = %Stage::EmbedQuery);
        let query = self.embedder.embed_one(question).await.map_err(|e| {
            tracing::warn!(stage = %Stage::EmbedQuery, error = %e, "query embedding failed");
            e
        })?;

        tracing::debug!(stage = %Stage::VectorSearch);
        let hits = self
            .index
            .search(&query, self.retrieval.top_k)
            .await
            .map_err(|e| {
                if matches!(e, RagError::DimensionMismatch { .. }) {
                    tracing::error!(stage = %Stage::VectorSearch, error = %e, "query does not match index");
                }
                e
            })?;
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        let ranked = self.store.get_chunks(&ids).await?;

        tracing::debug!(stage = %Stage::AssembleContext, retrieved = ranked.len());
        let context = assemble(
            &ranked,
            self.retrieval.max_context_tokens,
            self.tokenizer.as_ref(),
        );
        if context.is_empty() {
            tracing::info!(stage = %Stage::AssembleContext, "no chunk fits the context budget");
            return Err(RagError::NoRelevantContext);
        }

        tracing::debug!(stage = %Stage::GenerateAnswer, model = self.completer.model_name());
        let prompt = build_prompt(&context, question);
        let text = self
            .completer
            .complete(
                &prompt,
                self.completion.max_output_tokens,
                self.completion.temperature,
            )
            .await
            .map_err(|e| {
                tracing::warn!(stage = %Stage::GenerateAnswer, error = %e, "completion failed");
                e
            })?
            .trim()
            .to_string();

        tracing::debug!(stage = %Stage::Persist);
        // A concurrent request may have stored its answer first; that one
        // stays authoritative and is what this caller gets back.
        let stored = self.store.insert_answer(user_id, question, &text).await;
        let (text, persisted) = match stored {
            Ok(record) => {
                if record.answer != text {
                    tracing::info!(stage = %Stage::Persist, "kept previously stored answer");
                }
                (record.answer, true)
            }
            Err(e) => {
                tracing::error!(stage = %Stage::Persist, error = %e, "failed to store answer");
                (text, false)
            }
        };

        tracing::info!(stage = %Stage::Done, cached = false, persisted, "answered question");
        Ok(Answer {
            text,
            cached: false,
            persisted,
        })
    }
}

pub async fn run_ask(ctx: &AppContext, user_id: i64, question: &str) -> anyhow::Result<()> {
    let answer = AnswerService::new(ctx).ask(user_id, question).await?;
    println!("{}", answer.text);
    if answer.cached {
        println!();
        println!("(cached answer)");
    } else if !answer.persisted {
        println!();
        println!("(warning: answer could not be saved)");
    }
    Ok(())
}

pub async fn run_history(ctx: &AppContext, user_id: Option<i64>) -> anyhow::Result<()> {
    let records = match user_id {
        Some(id) => ctx.store.list_answers(id).await?,
        None => ctx.store.list_all_answers().await?,
    };
    if records.is_empty() {
        println!("No questions yet.");
        return Ok(());
    }
    for record in records {
        let asked = chrono::DateTime::from_timestamp(record.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| record.created_at.to_string());
        println!("[{}] user {}  {}", asked, record.user_id, record.question);
        println!("  {}", record.answer.replace('\n', "\n  "));
        println!();
    }
    Ok(())
}
