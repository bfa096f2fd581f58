//! Building blocks for small tool-using language model programs.
//!
//! The crate provides:
//! - A chat model abstraction (`LanguageModel`) returning a `ModelResponse`.
//! - A tool interface (`Tool` and `ToolRegistry`) plus built-in tools.
//! - An `Agent` that alternates reasoning and action phases over a `ConversationState`.
//! - Prompt templates, windowed chat memory and a vector-store knowledge base.

mod agent;
mod chain;
mod config;
mod error;
mod knowledge;
mod llm;
mod memory;
mod message;
mod prompt;
mod state;
mod telemetry;
mod tool;
pub mod tools;

pub use agent::{should_continue, Agent, AgentRun, Route};
pub use chain::{ConversationChain, LlmChain};
pub use config::{
    load_dotenv, AgentConfig, AppConfig, KnowledgeConfig, MemoryConfig, ModelConfig,
    SearchConfig, StepLimitPolicy,
};
pub use error::{EngineError, Result};
pub use knowledge::{
    Document, Embedder, FileVectorStore, InMemoryVectorStore, KnowledgeBase, OllamaEmbedder,
    Retriever, ScoredDocument, VectorStore, WhitespaceEmbedder,
};
pub use llm::{
    complete_structured, model_from_config, LanguageModel, ModelResponse, OllamaClient,
    OpenAIClient, StubModel, StubRequest,
};
pub use memory::{Exchange, WindowMemory};
pub use message::{Message, Role, ToolCall, ToolResult};
pub use prompt::PromptTemplate;
pub use state::ConversationState;
pub use telemetry::init_tracing;
pub use tool::{render_output, Tool, ToolDescription, ToolRegistry};
