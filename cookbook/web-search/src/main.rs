//! Web search with Tavily, then a structured `{answer, sources}` reply.
//!
//! Usage: `web-search [query]`

use serde::Deserialize;
use serde_json::json;

use react_engine::tools::{SearchResult, TavilySearchTool};
use react_engine::{
    complete_structured, init_tracing, load_dotenv, model_from_config, AppConfig, Message,
    ModelResponse, ToolRegistry,
};

#[derive(Debug, Deserialize)]
struct Source {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    answer: String,
    #[serde(default)]
    sources: Vec<Source>,
}

fn print_sources(sources: &[SearchResult]) {
    for (idx, source) in sources.iter().enumerate() {
        println!("  {}. {}", idx + 1, source.title);
        println!("     {}\n", source.url);
    }
}

#[tokio::main]
async fn main() -> react_engine::Result<()> {
    load_dotenv();
    init_tracing()?;

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What are the latest news about AI?".to_string());

    let cfg = AppConfig::from_env()?;
    let search = TavilySearchTool::from_config(&cfg.search)?;
    let model = model_from_config(&cfg.model)?;
    let mut tools = ToolRegistry::new();
    tools.register(search.clone());
    let rule = "=".repeat(80);

    println!("Query: {query}\n\n{rule}\n");
    let question = Message::user(query.as_str());
    let first = model
        .complete_chat(std::slice::from_ref(&question), &tools.describe())
        .await?;

    let mut sources: Vec<SearchResult> = Vec::new();
    let mut history = vec![question];
    if let ModelResponse::ToolRequest(calls) = first {
        println!("Agent is using {} tool(s)\n", calls.len());
        history.push(Message::tool_request(calls.clone()));
        for call in calls {
            let search_query = call
                .arguments
                .get("query")
                .and_then(|q| q.as_str())
                .unwrap_or(query.as_str())
                .to_string();
            let output = match search.search(&search_query).await {
                Ok(results) => {
                    print_sources(&results);
                    let text = serde_json::to_string(&results)?;
                    sources.extend(results);
                    text
                }
                Err(err) => format!("Error: {err}"),
            };
            history.push(Message::tool(call.id, call.name, output));
        }
    }

    let listed: Vec<String> = sources
        .iter()
        .map(|s| format!("- {} ({})", s.title, s.url))
        .collect();
    history.push(Message::user(format!(
        "Based on the search results above, provide a comprehensive answer to the query: \"{query}\"\n\n\
         1. Write a clear, concise answer in the \"answer\" field.\n\
         2. List ALL the sources you used in the \"sources\" field with their exact URLs and titles.\n\n\
         Available sources from search:\n{}",
        listed.join("\n")
    )));

    println!("{rule}\n\nGenerating structured response...\n");
    let schema = json!({
        "answer": "string",
        "sources": [{"url": "string", "title": "string"}]
    });
    match complete_structured::<AgentResponse>(model.as_ref(), &history, &schema).await {
        Ok(response) => {
            println!("Answer:\n{}\n\nSources:", response.answer);
            if response.sources.is_empty() {
                print_sources(&sources);
            } else {
                for (idx, source) in response.sources.iter().enumerate() {
                    println!("  {}. {}", idx + 1, source.title.as_deref().unwrap_or("Untitled"));
                    println!("     {}\n", source.url);
                }
            }
        }
        Err(err) => {
            println!("Error generating structured response: {err}");
            println!("\nFallback - showing search results:");
            print_sources(&sources);
        }
    }
    Ok(())
}
