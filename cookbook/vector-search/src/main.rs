//! Index a few course documents and print ranked similarity hits with scores.

use std::sync::Arc;

use serde_json::json;

use react_engine::{
    init_tracing, load_dotenv, AppConfig, Document, InMemoryVectorStore, KnowledgeBase,
    OllamaClient, OllamaEmbedder, ScoredDocument,
};

const QUERIES: [&str; 3] = [
    "Tell me about mobile app development frameworks",
    "How many students enrolled in Kotlin course?",
    "What is LangChain used for?",
];

fn documents() -> Vec<Document> {
    vec![
        Document::new(
            "flutter",
            "Flutter is a cross-platform mobile development framework created by Google. It uses Dart programming language and allows building apps for iOS, Android, and web from a single codebase. Flutter has hot reload, rich widgets, and excellent performance.",
        )
        .with_metadata(json!({"course": "Flutter", "topic": "Mobile Development", "students": 150})),
        Document::new(
            "kotlin",
            "Kotlin is a modern programming language for Android development. It's officially supported by Google and offers null safety, coroutines, and concise syntax. Kotlin is 100% interoperable with Java.",
        )
        .with_metadata(json!({"course": "Kotlin", "topic": "Android Development", "students": 120})),
        Document::new(
            "langchain",
            "LangChain is a framework for developing applications powered by language models. It provides tools for chains, agents, memory management, and RAG (Retrieval Augmented Generation).",
        )
        .with_metadata(json!({"course": "LangChain", "topic": "AI Development", "students": 80})),
    ]
}

fn field(hit: &ScoredDocument, key: &str) -> String {
    match &hit.document.metadata[key] {
        serde_json::Value::Null => "N/A".to_string(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// One ranked hit: score, course metadata, then the first 150 characters.
fn format_hit(rank: usize, hit: &ScoredDocument) -> String {
    let preview: String = hit.document.text.chars().take(150).collect();
    format!(
        "Result {rank} (similarity: {:.4}):\n  Course: {}\n  Topic: {}\n  Students: {}\n  Content: {preview}...",
        hit.score,
        field(hit, "course"),
        field(hit, "topic"),
        field(hit, "students"),
    )
}

#[tokio::main]
async fn main() -> react_engine::Result<()> {
    load_dotenv();
    init_tracing()?;

    let cfg = AppConfig::from_env()?;
    let host = cfg
        .model
        .base_url
        .clone()
        .unwrap_or_else(|| OllamaClient::DEFAULT_HOST.to_string());
    let embedder = Arc::new(OllamaEmbedder::new(host, cfg.knowledge.embed_model.clone())?);
    let kb = KnowledgeBase::new(embedder, Arc::new(InMemoryVectorStore::default()));

    let rule = "=".repeat(60);
    let indexed = kb.add_documents(documents()).await?;
    println!("Indexed {indexed} documents with {}\n{rule}", cfg.knowledge.embed_model);

    for query in QUERIES {
        println!("\nQuery: {query}\n{}", "-".repeat(60));
        match kb.similarity_search(query, cfg.knowledge.top_k).await {
            Ok(hits) if hits.is_empty() => println!("  No documents in collection"),
            Ok(hits) => {
                for (idx, hit) in hits.iter().enumerate() {
                    println!("\n{}", format_hit(idx + 1, hit));
                }
            }
            Err(err) => println!("  Search error: {err}"),
        }
    }
    println!("\n{rule}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use react_engine::WhitespaceEmbedder;

    #[tokio::test]
    async fn hits_print_score_and_metadata() {
        let kb = KnowledgeBase::new(
            Arc::new(WhitespaceEmbedder::default()),
            Arc::new(InMemoryVectorStore::default()),
        );
        kb.add_documents(documents()).await.unwrap();

        let hits = kb.similarity_search("Kotlin Android Java", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);

        let text = format_hit(1, &hits[0]);
        assert!(text.starts_with(&format!("Result 1 (similarity: {:.4}):", hits[0].score)));
        assert!(text.contains("Course: Kotlin"));
        assert!(text.contains("Students: 120"));
    }

    #[test]
    fn missing_metadata_reads_as_not_available() {
        let hit = ScoredDocument {
            document: Document::new("x", "plain"),
            score: 0.5,
        };
        let text = format_hit(2, &hit);
        assert!(text.contains("Course: N/A"));
        assert!(text.ends_with("Content: plain..."));
    }
}
