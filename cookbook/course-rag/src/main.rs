//! Course assistant: keyword catalog tools plus a persisted vector store.
//!
//! Usage: `course-rag [--reset] [query]`

mod catalog;

use std::sync::Arc;

use react_engine::tools::RetrieverTool;
use react_engine::{
    init_tracing, load_dotenv, model_from_config, Agent, AppConfig, FileVectorStore,
    KnowledgeBase, OllamaClient, OllamaEmbedder, ToolRegistry,
};

const DEFAULT_QUERY: &str = "Tell me about Flutter and how many students are enrolled?";

async fn open_knowledge_base(cfg: &AppConfig, reset: bool) -> react_engine::Result<KnowledgeBase> {
    let path = &cfg.knowledge.persist_path;
    let store = Arc::new(FileVectorStore::open(path).await?);
    if reset {
        println!("Deleting existing collection...");
        store.reset().await?;
    }

    let host = cfg
        .model
        .base_url
        .clone()
        .unwrap_or_else(|| OllamaClient::DEFAULT_HOST.to_string());
    let embedder = Arc::new(OllamaEmbedder::new(host, cfg.knowledge.embed_model.clone())?);
    let kb = KnowledgeBase::new(embedder, store);

    if kb.is_empty().await {
        println!(
            "Creating collection, embedding with {}...",
            cfg.knowledge.embed_model
        );
        let stored = kb.add_documents(catalog::documents()).await?;
        println!("Stored {stored} documents at {}\n", path.display());
    } else {
        println!("Loaded existing collection from {}\n", path.display());
    }
    Ok(kb)
}

#[tokio::main]
async fn main() -> react_engine::Result<()> {
    load_dotenv();
    init_tracing()?;

    let mut reset = false;
    let mut query = None;
    for arg in std::env::args().skip(1) {
        if arg == "--reset" {
            reset = true;
        } else {
            query = Some(arg);
        }
    }
    let query = query.unwrap_or_else(|| DEFAULT_QUERY.to_string());

    let cfg = AppConfig::from_env()?;
    let kb = open_knowledge_base(&cfg, reset).await?;

    let mut tools = ToolRegistry::new();
    tools.register(catalog::SearchCourses);
    tools.register(catalog::CourseDetails);
    tools.register(
        RetrieverTool::new(
            "search_knowledge_base",
            "Semantic search over course descriptions and platform information",
            Arc::new(kb),
        )
        .with_top_k(cfg.knowledge.top_k)
        .with_formatter(catalog::render_hit),
    );

    let model = model_from_config(&cfg.model)?;
    let agent = Agent::from_config(model, &cfg.agent).with_tools(tools);

    println!("Query: {query}\n");
    let run = agent.invoke(query).await?;

    let rule = "=".repeat(60);
    println!("\n{rule}\n{}\n{rule}", run.answer);
    println!("\nTotal messages: {}", run.state.len());
    Ok(())
}
