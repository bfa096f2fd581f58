//! Interactive chat that remembers the last `MEMORY_K` exchanges.

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use react_engine::{
    init_tracing, load_dotenv, model_from_config, AppConfig, ConversationChain, WindowMemory,
};

#[tokio::main]
async fn main() -> react_engine::Result<()> {
    load_dotenv();
    init_tracing()?;

    let mut cfg = AppConfig::from_env()?;
    cfg.model.temperature = 0.7;
    let model = model_from_config(&cfg.model)?;

    let rule = "-".repeat(60);
    println!("Short-Term Memory Chat\n{}", "=".repeat(60));
    println!("Using model: {}", cfg.model.model);
    println!("Memory window size: {} interactions\n", cfg.memory.window);
    println!("Type 'quit' to exit\n{rule}");

    let mut chain = ConversationChain::new(model, WindowMemory::new(cfg.memory.window));
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }
        if input.is_empty() {
            continue;
        }

        match chain.run(input).await {
            Ok(reply) => println!("AI: {reply}"),
            Err(err) => println!("Error: {err}"),
        }
        println!("{rule}");
    }

    println!("\nConversation ended!");
    println!("Final memory buffer:\n{}", chain.memory().buffer());
    Ok(())
}
