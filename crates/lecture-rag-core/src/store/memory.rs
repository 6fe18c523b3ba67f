//! In-memory [`Store`] implementation for tests and offline runs.
//!
//! Uses `Vec`s behind a single `std::sync::RwLock` so a document and its
//! chunks are always replaced together. Ids are assigned sequentially.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{RagError, RagResult};
use crate::models::{Chunk, Document, DocumentSummary, NewChunk, QaRecord};

use super::{SavedDocument, Store};

#[derive(Default)]
struct Tables {
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    answers: Vec<QaRecord>,
    next_document_id: i64,
    next_chunk_id: i64,
    next_answer_id: i64,
}

/// In-memory store for testing and offline use.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RagResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| RagError::Storage("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> RagResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| RagError::Storage("in-memory store lock poisoned".to_string()))
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn newest_first(mut records: Vec<QaRecord>) -> Vec<QaRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    records
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_document(
        &self,
        filename: &str,
        file_path: &str,
        content: &str,
        chunks: &[NewChunk],
    ) -> RagResult<SavedDocument> {
        let mut t = self.write()?;
        let now = now_ts();

        let existing = t.documents.iter().position(|d| d.filename == filename);
        let replaced = existing.is_some();
        let document = match existing {
            Some(pos) => {
                let doc = &mut t.documents[pos];
                doc.file_path = file_path.to_string();
                doc.content = content.to_string();
                doc.updated_at = now;
                doc.clone()
            }
            None => {
                t.next_document_id += 1;
                let doc = Document {
                    id: t.next_document_id,
                    filename: filename.to_string(),
                    file_path: file_path.to_string(),
                    content: content.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                t.documents.push(doc.clone());
                doc
            }
        };

        t.chunks.retain(|c| c.document_id != document.id);
        let mut stored = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            t.next_chunk_id += 1;
            let c = Chunk {
                id: t.next_chunk_id,
                document_id: document.id,
                chunk_index: chunk.chunk_index,
                content: chunk.content.clone(),
                embedding: chunk.embedding.clone(),
            };
            t.chunks.push(c.clone());
            stored.push(c);
        }

        Ok(SavedDocument {
            document,
            chunks: stored,
            replaced,
        })
    }

    async fn get_document(&self, filename: &str) -> RagResult<Option<Document>> {
        let t = self.read()?;
        Ok(t.documents.iter().find(|d| d.filename == filename).cloned())
    }

    async fn list_documents(&self) -> RagResult<Vec<DocumentSummary>> {
        let t = self.read()?;
        Ok(t.documents
            .iter()
            .map(|d| DocumentSummary {
                id: d.id,
                filename: d.filename.clone(),
                file_path: d.file_path.clone(),
                chunk_count: t.chunks.iter().filter(|c| c.document_id == d.id).count() as i64,
                updated_at: d.updated_at,
            })
            .collect())
    }

    async fn delete_document(&self, filename: &str) -> RagResult<bool> {
        let mut t = self.write()?;
        let Some(pos) = t.documents.iter().position(|d| d.filename == filename) else {
            return Ok(false);
        };
        let doc = t.documents.remove(pos);
        t.chunks.retain(|c| c.document_id != doc.id);
        Ok(true)
    }

    async fn get_chunks(&self, ids: &[i64]) -> RagResult<Vec<Chunk>> {
        let t = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| t.chunks.iter().find(|c| c.id == *id).cloned())
            .collect())
    }

    async fn all_chunk_vectors(&self) -> RagResult<Vec<(i64, Vec<f32>)>> {
        let t = self.read()?;
        let mut chunks: Vec<&Chunk> = t.chunks.iter().collect();
        chunks.sort_by_key(|c| (c.document_id, c.chunk_index));
        Ok(chunks
            .into_iter()
            .map(|c| (c.id, c.embedding.clone()))
            .collect())
    }

    async fn find_answer(&self, user_id: i64, question: &str) -> RagResult<Option<QaRecord>> {
        let t = self.read()?;
        Ok(t.answers
            .iter()
            .find(|r| r.user_id == user_id && r.question == question)
            .cloned())
    }

    async fn insert_answer(
        &self,
        user_id: i64,
        question: &str,
        answer: &str,
    ) -> RagResult<QaRecord> {
        let mut t = self.write()?;
        if let Some(existing) = t
            .answers
            .iter()
            .find(|r| r.user_id == user_id && r.question == question)
        {
            return Ok(existing.clone());
        }
        t.next_answer_id += 1;
        let record = QaRecord {
            id: t.next_answer_id,
            user_id,
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: now_ts(),
        };
        t.answers.push(record.clone());
        Ok(record)
    }

    async fn list_answers(&self, user_id: i64) -> RagResult<Vec<QaRecord>> {
        let t = self.read()?;
        Ok(newest_first(
            t.answers
                .iter()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_all_answers(&self) -> RagResult<Vec<QaRecord>> {
        let t = self.read()?;
        Ok(newest_first(t.answers.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_chunks(texts: &[&str]) -> Vec<NewChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| NewChunk {
                chunk_index: i as i64,
                content: t.to_string(),
                embedding: vec![i as f32, 1.0],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_save_and_replace_document() {
        let store = InMemoryStore::new();
        let first = store
            .save_document("week1.pdf", "uploads/week1.pdf", "v1", &new_chunks(&["a", "b"]))
            .await
            .unwrap();
        assert!(!first.replaced);
        assert_eq!(first.chunks.len(), 2);

        let second = store
            .save_document("week1.pdf", "uploads/week1.pdf", "v2", &new_chunks(&["c"]))
            .await
            .unwrap();
        assert!(second.replaced);
        assert_eq!(second.document.id, first.document.id);

        let vectors = store.all_chunk_vectors().await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].0, second.chunks[0].id);

        let old_ids: Vec<i64> = first.chunks.iter().map(|c| c.id).collect();
        assert!(store.get_chunks(&old_ids).await.unwrap().is_empty());

        let doc = store.get_document("week1.pdf").await.unwrap().unwrap();
        assert_eq!(doc.content, "v2");
    }

    #[tokio::test]
    async fn test_get_chunks_preserves_requested_order() {
        let store = InMemoryStore::new();
        let saved = store
            .save_document("a.pdf", "a.pdf", "", &new_chunks(&["x", "y", "z"]))
            .await
            .unwrap();
        let ids = vec![saved.chunks[2].id, 999, saved.chunks[0].id];
        let chunks = store.get_chunks(&ids).await.unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["z", "x"]);
    }

    #[tokio::test]
    async fn test_delete_document_cascades() {
        let store = InMemoryStore::new();
        store
            .save_document("a.pdf", "a.pdf", "", &new_chunks(&["x"]))
            .await
            .unwrap();
        assert!(store.delete_document("a.pdf").await.unwrap());
        assert!(!store.delete_document("a.pdf").await.unwrap());
        assert!(store.all_chunk_vectors().await.unwrap().is_empty());
        assert!(store.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answers_keyed_by_user_and_question() {
        let store = InMemoryStore::new();
        let first = store.insert_answer(1, "What is RAG?", "first").await.unwrap();
        let dup = store.insert_answer(1, "What is RAG?", "second").await.unwrap();
        assert_eq!(first, dup);
        store.insert_answer(2, "What is RAG?", "other").await.unwrap();

        let hit = store.find_answer(1, "What is RAG?").await.unwrap().unwrap();
        assert_eq!(hit.answer, "first");
        assert!(store.find_answer(1, "what is rag?").await.unwrap().is_none());
        assert_eq!(store.list_answers(1).await.unwrap().len(), 1);
        assert_eq!(store.list_all_answers().await.unwrap().len(), 2);
    }
}
