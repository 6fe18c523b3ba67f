//! Document ingestion and removal.
//!
//! Flow for one upload: chunk → dedup (which embeds the survivors) → store
//! → index. Re-uploading a filename replaces the stored document and all of
//! its chunks; since the index can only append, a replacement is followed
//! by a full rebuild from the store so no stale chunk id stays searchable.
//!
//! The index write guard is taken before the store write and released
//! after the index update, so two concurrent uploads cannot interleave
//! their commits and index changes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use lecture_rag_core::chunk::Chunker;
use lecture_rag_core::dedup::Deduplicator;
use lecture_rag_core::models::NewChunk;
use lecture_rag_core::{RagError, RagResult};

use crate::index::rebuild_locked;
use crate::state::AppContext;

/// Outcome of one upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub document_id: i64,
    pub filename: String,
    /// Token windows produced by the chunker.
    pub windows: usize,
    /// Chunks stored after deduplication.
    pub kept: usize,
    /// True if an earlier upload with the same filename was replaced.
    pub replaced: bool,
}

/// Chunk, deduplicate, embed, store, and index one document's text.
///
/// # Errors
///
/// - [`RagError::InvalidInput`] for an empty filename.
/// - [`RagError::Configuration`] for invalid chunking/dedup settings or a
///   document larger than the dedup limit.
/// - [`RagError::EmbeddingService`] if embedding fails; nothing is stored.
/// - [`RagError::DimensionMismatch`] if the new vectors do not match the
///   indexed ones; nothing is stored.
/// - [`RagError::Storage`] if the write fails; the index is unchanged.
pub async fn ingest_document(
    ctx: &AppContext,
    filename: &str,
    file_path: &str,
    text: &str,
) -> RagResult<IngestReport> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(RagError::InvalidInput("filename must not be empty".to_string()));
    }

    let chunker = Chunker::new(ctx.tokenizer.clone(), ctx.config.chunking.params()?);
    let windows: Vec<String> = chunker.windows(text).iter().map(|w| w.text).collect();

    let dedup = Deduplicator::new(ctx.config.dedup.params()?);
    let kept = dedup.dedupe(ctx.embedder.as_ref(), &windows).await?;

    let chunks: Vec<NewChunk> = kept
        .into_iter()
        .enumerate()
        .map(|(i, k)| NewChunk {
            chunk_index: i as i64,
            content: k.text,
            embedding: k.embedding,
        })
        .collect();

    let mut index = ctx.index.write().await;
    // Every stored vector must fit the index; check before writing.
    index
        .check_dims(chunks.iter().map(|c| c.embedding.as_slice()))
        .map_err(|e| {
            tracing::error!(filename, error = %e, "embeddings do not match the index");
            e
        })?;
    let saved = ctx
        .store
        .save_document(filename, file_path, text, &chunks)
        .await?;

    if saved.replaced {
        rebuild_locked(&mut index, ctx.store.as_ref()).await?;
    } else {
        index
            .extend(saved.chunks.iter().map(|c| (c.id, c.embedding.clone())))
            .map_err(|e| {
                tracing::error!(filename, error = %e, "stored chunks do not fit the index");
                e
            })?;
    }
    drop(index);

    let report = IngestReport {
        document_id: saved.document.id,
        filename: filename.to_string(),
        windows: windows.len(),
        kept: saved.chunks.len(),
        replaced: saved.replaced,
    };
    tracing::info!(
        filename,
        document_id = report.document_id,
        windows = report.windows,
        kept = report.kept,
        replaced = report.replaced,
        "ingested document"
    );
    Ok(report)
}

/// Delete a document and its chunks, then rebuild the index.
/// Returns `false` if no document had that filename.
pub async fn delete_document(ctx: &AppContext, filename: &str) -> RagResult<bool> {
    let mut index = ctx.index.write().await;
    let deleted = ctx.store.delete_document(filename).await?;
    if deleted {
        rebuild_locked(&mut index, ctx.store.as_ref()).await?;
        tracing::info!(filename, "deleted document");
    }
    Ok(deleted)
}

/// CLI entry: read a UTF-8 text file (already extracted from the lecture
/// source) and ingest it under `name` or the file's own name.
pub async fn run_ingest(ctx: &AppContext, path: &Path, name: Option<String>) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?,
    };

    let report = ingest_document(ctx, &filename, &path.display().to_string(), &text).await?;

    println!("ingest {}", report.filename);
    println!("  document id: {}", report.document_id);
    println!("  windows: {}", report.windows);
    println!("  chunks kept: {}", report.kept);
    if report.replaced {
        println!("  replaced previous upload");
    }
    Ok(())
}

pub async fn run_delete(ctx: &AppContext, filename: &str) -> Result<()> {
    if delete_document(ctx, filename).await? {
        println!("Deleted {}", filename);
        Ok(())
    } else {
        Err(RagError::NotFound(format!("no document named '{}'", filename)).into())
    }
}

pub async fn run_list_documents(ctx: &AppContext) -> Result<()> {
    let documents = ctx.store.list_documents().await?;
    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in documents {
        let updated = chrono::DateTime::from_timestamp(doc.updated_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| doc.updated_at.to_string());
        println!(
            "{:>4}  {:<40} {:>5} chunks  {}",
            doc.id, doc.filename, doc.chunk_count, updated
        );
    }
    Ok(())
}
