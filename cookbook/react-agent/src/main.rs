//! The reason/act loop with a calculator and Tavily web search.
//!
//! Usage: `react-agent [query]`

use std::sync::Arc;

use react_engine::tools::{CalculatorTool, TavilySearchTool};
use react_engine::{init_tracing, load_dotenv, model_from_config, Agent, AppConfig, ToolRegistry};

#[tokio::main]
async fn main() -> react_engine::Result<()> {
    load_dotenv();
    init_tracing()?;

    let cfg = AppConfig::from_env()?;
    // fail before any model call when the search key is missing
    let search = TavilySearchTool::from_config(&cfg.search)?;
    let model = model_from_config(&cfg.model)?;

    let mut tools = ToolRegistry::new();
    tools.register(search);
    tools.register(CalculatorTool);

    let agent = Agent::from_config(Arc::clone(&model), &cfg.agent).with_tools(tools);

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What is 1234 multiplied by 5678?".to_string());
    println!("Query: {query}\n");

    let run = agent.invoke(query).await?;

    let rule = "=".repeat(60);
    println!("\n{rule}\n{}\n{rule}", run.answer);
    println!("\nTotal messages: {}", run.state.len());
    tracing::info!(steps = run.steps, "agent finished");
    Ok(())
}
