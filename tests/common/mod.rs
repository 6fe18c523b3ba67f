#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lecture_rag::config::{parse_config, Config};
use lecture_rag::state::AppContext;
use lecture_rag_core::embedding::{Completer, Embedder};
use lecture_rag_core::store::memory::InMemoryStore;
use lecture_rag_core::store::Store;
use lecture_rag_core::RagResult;

pub const TOPICS: [&str; 5] = ["gradient", "backprop", "kernel", "entropy", "tree"];

pub const WEEK1: &str = "Gradient descent moves the weights against the gradient. \
    Each gradient step uses the learning rate.";
pub const WEEK2: &str = "Backprop applies the chain rule layer by layer; backprop stores \
    activations from the forward pass.";
pub const WEEK3: &str = "A decision tree picks the split with the lowest entropy, and each \
    tree node repeats the entropy test.";

/// Embeds text as normalized topic-word counts plus a small bias, so
/// texts about the same topic land close together.
#[derive(Default)]
pub struct TopicEmbedder {
    pub calls: AtomicUsize,
}

impl TopicEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = TOPICS
            .iter()
            .map(|t| lower.matches(t).count() as f32)
            .collect();
        v.push(0.1);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for TopicEmbedder {
    fn model_name(&self) -> &str {
        "topic"
    }

    fn dims(&self) -> usize {
        TOPICS.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
pub struct RecordingCompleter {
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingCompleter {
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Completer for RecordingCompleter {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, prompt: &str, _max: u32, _temperature: f32) -> RagResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("  Follow the negative gradient.\nRepeat until converged.  ".to_string())
    }
}

const DEFAULT_CHUNKING: &str = r#"
[chunking]
chunk_size_tokens = 400
overlap_tokens = 40
tokenizer = "char"
"#;

/// Offline config: char tokenizer, providers disabled. `extra` may add
/// sections, or replace `[chunking]`.
pub fn test_config(extra: &str) -> Config {
    let chunking = if extra.contains("[chunking]") {
        ""
    } else {
        DEFAULT_CHUNKING
    };
    parse_config(&format!(
        r#"
[db]
path = "unused.sqlite"

[dedup]
min_chars = 10

[embedding]
provider = "disabled"

[completion]
provider = "disabled"
{}
{}
"#,
        chunking, extra
    ))
    .unwrap()
}

pub struct Harness {
    pub ctx: AppContext,
    pub embedder: Arc<TopicEmbedder>,
    pub completer: Arc<RecordingCompleter>,
}

pub fn harness_with_store(store: Arc<dyn Store>, extra_config: &str) -> Harness {
    let embedder = Arc::new(TopicEmbedder::default());
    let completer = Arc::new(RecordingCompleter::default());
    let ctx = AppContext::new(
        test_config(extra_config),
        store,
        embedder.clone(),
        completer.clone(),
    )
    .unwrap();
    Harness {
        ctx,
        embedder,
        completer,
    }
}

pub fn harness(extra_config: &str) -> Harness {
    harness_with_store(Arc::new(InMemoryStore::new()), extra_config)
}
