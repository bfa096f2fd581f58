use std::collections::HashMap;

use react_engine::{init_tracing, load_dotenv, model_from_config, AppConfig, LlmChain, PromptTemplate};

const INFORMATION: &str = "\
Ruby Learner in Myanmar offers online tech training, primarily focusing on Flutter and Kotlin \
for app development, with video lessons available on YouTube, teaching local learners how to \
build mobile apps in Burmese.
Key Offerings & Platform:
Focus: Mobile development with Flutter (cross-platform) and Kotlin (Android).
Format: Video-based courses, accessible through a dedicated YouTube playlist.
Language: Lessons are in Burmese, making tech education accessible in Myanmar.";

const SUMMARY_TEMPLATE: &str = "\
1. Give a short summary of Ruby Learner using the information: {information}
2. Provide two important facts about it.";

#[tokio::main]
async fn main() -> react_engine::Result<()> {
    load_dotenv();
    init_tracing()?;

    let cfg = AppConfig::from_env()?;
    let model = model_from_config(&cfg.model)?;
    let chain = LlmChain::new(PromptTemplate::new(SUMMARY_TEMPLATE)?, model);

    let mut values = HashMap::new();
    values.insert("information".to_string(), INFORMATION.to_string());

    match chain.invoke(&values).await {
        Ok(summary) => println!("{summary}"),
        Err(err) => println!("Failed to run LLM chain: {err}"),
    }
    Ok(())
}
