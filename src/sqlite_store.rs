//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `documents`, `chunks`, and
//! `qa_records` tables created by [`crate::migrate`]. Embeddings are stored
//! as little-endian `f32` BLOBs. All `sqlx` errors surface as
//! [`RagError::Storage`].

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use lecture_rag_core::embedding::{blob_to_vec, vec_to_blob};
use lecture_rag_core::models::{Chunk, Document, DocumentSummary, NewChunk, QaRecord};
use lecture_rag_core::store::{SavedDocument, Store};
use lecture_rag_core::{RagError, RagResult};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn storage(err: sqlx::Error) -> RagError {
    RagError::Storage(err.to_string())
}

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn chunk_from_row(row: &SqliteRow) -> Chunk {
    let blob: Vec<u8> = row.get("embedding");
    Chunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        content: row.get("content"),
        embedding: blob_to_vec(&blob),
    }
}

fn answer_from_row(row: &SqliteRow) -> QaRecord {
    QaRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        question: row.get("question"),
        answer: row.get("answer"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn save_document(
        &self,
        filename: &str,
        file_path: &str,
        content: &str,
        chunks: &[NewChunk],
    ) -> RagResult<SavedDocument> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM documents WHERE filename = ?")
            .bind(filename)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?;

        let document_id = match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE documents SET file_path = ?, content = ?, updated_at = ? WHERE id = ?",
                )
                .bind(file_path)
                .bind(content)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;

                sqlx::query("DELETE FROM chunks WHERE document_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?;
                id
            }
            None => sqlx::query(
                r#"
                INSERT INTO documents (filename, file_path, content, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(filename)
            .bind(file_path)
            .bind(content)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(storage)?
            .last_insert_rowid(),
        };

        let mut stored = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = sqlx::query(
                r#"
                INSERT INTO chunks (document_id, chunk_index, content, embedding)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await
            .map_err(storage)?
            .last_insert_rowid();

            stored.push(Chunk {
                id,
                document_id,
                chunk_index: chunk.chunk_index,
                content: chunk.content.clone(),
                embedding: chunk.embedding.clone(),
            });
        }

        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;
        let document = document_from_row(&row);

        tx.commit().await.map_err(storage)?;

        Ok(SavedDocument {
            document,
            chunks: stored,
            replaced: existing.is_some(),
        })
    }

    async fn get_document(&self, filename: &str) -> RagResult<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE filename = ?")
            .bind(filename)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.as_ref().map(document_from_row))
    }

    async fn list_documents(&self) -> RagResult<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.filename, d.file_path, d.updated_at, COUNT(c.id) AS chunk_count
            FROM documents d
            LEFT JOIN chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .iter()
            .map(|row| DocumentSummary {
                id: row.get("id"),
                filename: row.get("filename"),
                file_path: row.get("file_path"),
                chunk_count: row.get("chunk_count"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    async fn delete_document(&self, filename: &str) -> RagResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE filename = ?")
            .bind(filename)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_chunks(&self, ids: &[i64]) -> RagResult<Vec<Chunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT * FROM chunks WHERE id IN ({})", placeholders);
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(storage)?;

        let by_id: HashMap<i64, Chunk> = rows
            .iter()
            .map(chunk_from_row)
            .map(|c| (c.id, c))
            .collect();
        // Preserve the caller's (relevance) order.
        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    async fn all_chunk_vectors(&self) -> RagResult<Vec<(i64, Vec<f32>)>> {
        let rows = sqlx::query("SELECT id, embedding FROM chunks ORDER BY document_id, chunk_index")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                (row.get("id"), blob_to_vec(&blob))
            })
            .collect())
    }

    async fn find_answer(&self, user_id: i64, question: &str) -> RagResult<Option<QaRecord>> {
        let row = sqlx::query("SELECT * FROM qa_records WHERE user_id = ? AND question = ?")
            .bind(user_id)
            .bind(question)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.as_ref().map(answer_from_row))
    }

    async fn insert_answer(
        &self,
        user_id: i64,
        question: &str,
        answer: &str,
    ) -> RagResult<QaRecord> {
        sqlx::query(
            r#"
            INSERT INTO qa_records (user_id, question, answer, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, question) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(question)
        .bind(answer)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        self.find_answer(user_id, question).await?.ok_or_else(|| {
            RagError::Storage(format!(
                "answer for user {} vanished after insert",
                user_id
            ))
        })
    }

    async fn list_answers(&self, user_id: i64) -> RagResult<Vec<QaRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM qa_records WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.iter().map(answer_from_row).collect())
    }

    async fn list_all_answers(&self) -> RagResult<Vec<QaRecord>> {
        let rows = sqlx::query("SELECT * FROM qa_records ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(rows.iter().map(answer_from_row).collect())
    }
}
