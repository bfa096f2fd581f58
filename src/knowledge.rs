use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::{fs, io::AsyncWriteExt};

use crate::error::{EngineError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, document: Document, embedding: Vec<f32>) -> Result<()>;
    async fn search(&self, embedding: Vec<f32>, top_k: usize) -> Result<Vec<ScoredDocument>>;
    async fn len(&self) -> usize;
}

/// Basic whitespace tokenizer with hashed buckets for deterministic embeddings.
pub struct WhitespaceEmbedder {
    buckets: usize,
}

impl Default for WhitespaceEmbedder {
    fn default() -> Self {
        Self { buckets: 64 }
    }
}

impl WhitespaceEmbedder {
    pub fn new(buckets: usize) -> Self {
        Self {
            buckets: buckets.max(1),
        }
    }
}

#[async_trait]
impl Embedder for WhitespaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.buckets];

        for token in text.split_whitespace() {
            let token: String = token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if token.is_empty() {
                continue;
            }
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.buckets;
            vector[idx] += 1.0;
        }

        Ok(vector)
    }
}

/// Embeddings from a local Ollama server (`/api/embed`).
pub struct OllamaEmbedder {
    http: reqwest::Client,
    model: String,
    base_url: String,
}

impl OllamaEmbedder {
    pub const DEFAULT_MODEL: &'static str = "nomic-embed-text";

    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| EngineError::LanguageModel(format!("http client error: {err}")))?;
        Ok(Self {
            http,
            model: model.into(),
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let resp = self
            .http
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| EngineError::LanguageModel(format!("Ollama embed request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::LanguageModel(format!(
                "Ollama embed failed with {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .map_err(|e| EngineError::LanguageModel(format!("Ollama embed parse error: {e}")))?;
        body.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::LanguageModel("Ollama returned no embeddings".into()))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredEntry {
    document: Document,
    embedding: Vec<f32>,
}

/// The first stored entry fixes the collection dimension.
fn check_dimension(entries: &[StoredEntry], embedding: &[f32]) -> Result<()> {
    match entries.first() {
        Some(first) if first.embedding.len() != embedding.len() => {
            Err(EngineError::Storage(format!(
                "embedding dimension {} does not match collection dimension {}",
                embedding.len(),
                first.embedding.len()
            )))
        }
        _ => Ok(()),
    }
}

fn rank(entries: &[StoredEntry], embedding: &[f32], top_k: usize) -> Result<Vec<ScoredDocument>> {
    check_dimension(entries, embedding)?;
    let mut scored: Vec<ScoredDocument> = entries
        .iter()
        .map(|entry| ScoredDocument {
            document: entry.document.clone(),
            score: cosine_similarity(&entry.embedding, embedding),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    Ok(scored)
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<StoredEntry>>,
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, document: Document, embedding: Vec<f32>) -> Result<()> {
        let mut entries = self.entries.write().await;
        check_dimension(&entries, &embedding)?;
        entries.push(StoredEntry {
            document,
            embedding,
        });
        Ok(())
    }

    async fn search(&self, embedding: Vec<f32>, top_k: usize) -> Result<Vec<ScoredDocument>> {
        rank(&self.entries.read().await, &embedding, top_k)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// A vector store persisted as JSON lines under a directory.
///
/// Opening an existing directory reloads what was stored before, so embeddings
/// are only computed once per collection.
pub struct FileVectorStore {
    path: PathBuf,
    entries: RwLock<Vec<StoredEntry>>,
}

impl FileVectorStore {
    const COLLECTION_FILE: &'static str = "collection.jsonl";

    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await.map_err(|err| {
            EngineError::Storage(format!("failed to create `{}`: {err}", dir.display()))
        })?;
        let path = dir.join(Self::COLLECTION_FILE);

        let content = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(EngineError::Storage(format!(
                    "failed to read `{}`: {err}",
                    path.display()
                )))
            }
        };

        let mut entries = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            entries.push(serde_json::from_str::<StoredEntry>(line)?);
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened vector store");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Whether the store already holds a persisted collection.
    pub async fn exists(dir: impl AsRef<Path>) -> bool {
        fs::metadata(dir.as_ref().join(Self::COLLECTION_FILE))
            .await
            .is_ok()
    }

    /// Delete everything persisted so far.
    pub async fn reset(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(EngineError::Storage(format!(
                    "failed to remove `{}`: {err}",
                    self.path.display()
                )))
            }
        }
        entries.clear();
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn add(&self, document: Document, embedding: Vec<f32>) -> Result<()> {
        let mut entries = self.entries.write().await;
        check_dimension(&entries, &embedding)?;

        let entry = StoredEntry {
            document,
            embedding,
        };
        let mut serialized = serde_json::to_string(&entry)?;
        serialized.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| {
                EngineError::Storage(format!("failed to open `{}`: {err}", self.path.display()))
            })?;
        file.write_all(serialized.as_bytes()).await.map_err(|err| {
            EngineError::Storage(format!("failed to write `{}`: {err}", self.path.display()))
        })?;
        entries.push(entry);
        Ok(())
    }

    async fn search(&self, embedding: Vec<f32>, top_k: usize) -> Result<Vec<ScoredDocument>> {
        rank(&self.entries.read().await, &embedding, top_k)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Embedder + store pair. Both handles are injected by the caller and live as
/// long as the knowledge base does.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl KnowledgeBase {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn add_document(&self, document: Document) -> Result<()> {
        let embedding = self.embedder.embed(&document.text).await?;
        self.store.add(document, embedding).await
    }

    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<usize> {
        let count = documents.len();
        for document in documents {
            self.add_document(document).await?;
        }
        Ok(count)
    }

    pub async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>> {
        let embedding = self.embedder.embed(query).await?;
        self.store.search(embedding, top_k).await
    }

    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>>;
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>> {
        self.similarity_search(query, top_k).await
    }
}
