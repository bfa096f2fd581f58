//! One model call with tools bound, manual dispatch of whatever it asks for,
//! then a second call that turns the tool output into an answer.

use async_trait::async_trait;
use serde_json::{json, Value};

use react_engine::tools::TavilySearchTool;
use react_engine::{
    init_tracing, load_dotenv, model_from_config, render_output, AppConfig, LanguageModel,
    Message, ModelResponse, Tool, ToolRegistry,
};

struct CourseInfoTool;

#[async_trait]
impl Tool for CourseInfoTool {
    fn name(&self) -> &str {
        "get_course_info"
    }

    fn description(&self) -> &str {
        "Get information about Ruby Learner courses (Flutter, Kotlin)."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "The name of the course (e.g., 'Flutter', 'Kotlin')"
                }
            },
            "required": ["course_name"]
        }))
    }

    async fn call(&self, input: Value) -> react_engine::Result<Value> {
        let name = input
            .get("course_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let info = match name {
            "Flutter" => "Flutter course teaches cross-platform mobile app development. Duration: 12 weeks, 45 students enrolled.".to_string(),
            "Kotlin" => "Kotlin course teaches Android app development. Duration: 10 weeks, 32 students enrolled.".to_string(),
            other => format!("Course '{other}' not found."),
        };
        Ok(Value::String(info))
    }
}

const QUERIES: [&str; 3] = [
    "What is the latest news about AI?",
    "Tell me about the Flutter course at Ruby Learner",
    "What is the current price of Bitcoin?",
];

async fn answer(model: &dyn LanguageModel, tools: &ToolRegistry, query: &str) -> react_engine::Result<()> {
    let question = Message::user(query);
    let first = model
        .complete_chat(std::slice::from_ref(&question), &tools.describe())
        .await?;

    let calls = match first {
        ModelResponse::PlainAnswer(text) => {
            println!("Direct answer (no tools used):\n\n{text}");
            return Ok(());
        }
        ModelResponse::ToolRequest(calls) => calls,
    };

    println!("Tools called by LLM:\n");
    let mut history = vec![question, Message::tool_request(calls.clone())];
    for call in calls {
        println!("  Tool: {}", call.name);
        println!("     Args: {}", call.arguments);
        let output = match tools.get(&call.name) {
            Some(tool) => match tool.call(call.arguments.clone()).await {
                Ok(value) => render_output(&value),
                Err(err) => format!("Error: {err}"),
            },
            None => format!("Unknown tool: {}", call.name),
        };
        println!("     Result: {output}\n");
        history.push(Message::tool(call.id, call.name, output));
    }

    println!("Final Answer:\n");
    match model.complete_chat(&history, &[]).await? {
        ModelResponse::PlainAnswer(text) => println!("{text}"),
        ModelResponse::ToolRequest(more) => {
            println!("(model asked for {} more tool call(s); stopping here)", more.len())
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> react_engine::Result<()> {
    load_dotenv();
    init_tracing()?;

    let cfg = AppConfig::from_env()?;
    let search = TavilySearchTool::from_config(&cfg.search)?;
    let model = model_from_config(&cfg.model)?;

    let mut tools = ToolRegistry::new();
    tools.register(CourseInfoTool);
    tools.register(search);

    let rule = "=".repeat(80);
    for query in QUERIES {
        println!("\n{rule}\nQuery: {query}\n{rule}\n");
        if let Err(err) = answer(model.as_ref(), &tools, query).await {
            println!("Error: {err}");
        }
        println!("\n{rule}\n");
    }
    Ok(())
}
