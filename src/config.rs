use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: 0.0,
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "ollama".into()
}

fn default_model() -> String {
    "llama3.1:8b".into()
}

fn default_timeout_secs() -> u64 {
    300
}

/// What the agent does once the reasoning step ceiling is reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepLimitPolicy {
    /// Fail the run with [`EngineError::StepLimit`].
    #[default]
    Error,
    /// Ask the model once more, with no tools offered, and return that text.
    ForceAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub on_step_limit: StepLimitPolicy,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            on_step_limit: StepLimitPolicy::default(),
            system_prompt: None,
        }
    }
}

fn default_max_steps() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default)]
    pub tavily_api_key: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    3
}

impl SearchConfig {
    /// The Tavily key, or a fatal configuration error if absent.
    pub fn require_tavily_key(&self) -> Result<&str> {
        self.tavily_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EngineError::MissingConfig("TAVILY_API_KEY".into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Number of human/AI exchanges kept in the window.
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
        }
    }
}

fn default_window() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeConfig {
    #[serde(default = "default_persist_path")]
    pub persist_path: PathBuf,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            persist_path: default_persist_path(),
            embed_model: default_embed_model(),
            top_k: default_top_k(),
        }
    }
}

fn default_persist_path() -> PathBuf {
    PathBuf::from("./chroma_db")
}

fn default_embed_model() -> String {
    "nomic-embed-text".into()
}

fn default_top_k() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

/// Load variables from a `.env` file in the working directory, if there is one.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(%err, "failed to read .env"),
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)
            .map_err(|err| EngineError::Config(format!("failed to parse configuration: {err}")))?;
        Ok(cfg)
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(provider) = env::var("REACT_PROVIDER") {
            self.model.provider = provider;
        }
        if let Ok(model) = env::var("OLLAMA_MODEL") {
            self.model.model = model;
        }
        if let Ok(host) = env::var("OLLAMA_HOST") {
            self.model.base_url = Some(host);
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Ok(steps) = env::var("REACT_MAX_STEPS") {
            self.agent.max_steps = parse_var("REACT_MAX_STEPS", &steps)?;
        }
        if let Ok(key) = env::var("TAVILY_API_KEY") {
            self.search.tavily_api_key = Some(key);
        }
        if let Ok(window) = env::var("MEMORY_K") {
            self.memory.window = parse_var("MEMORY_K", &window)?;
        }
        if let Ok(path) = env::var("CHROMA_DB_PATH") {
            self.knowledge.persist_path = PathBuf::from(path);
        }
        if let Ok(model) = env::var("OLLAMA_EMBED_MODEL") {
            self.knowledge.embed_model = model;
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| EngineError::Config(format!("invalid `{name}` value `{raw}`: {err}")))
}
