//! Tavily web search.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SearchConfig;
use crate::error::{EngineError, Result};
use crate::tool::Tool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Clone)]
pub struct TavilySearchTool {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
}

impl TavilySearchTool {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.tavily.com/search";

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| EngineError::Protocol(format!("http client error: {err}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            max_results: 3,
        })
    }

    /// Fails with `MissingConfig` when no key is configured.
    pub fn from_config(cfg: &SearchConfig) -> Result<Self> {
        let key = cfg.require_tavily_key()?;
        Ok(Self::new(key)?.with_max_results(cfg.max_results))
    }

    pub fn from_env() -> Result<Self> {
        let key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| EngineError::MissingConfig("TAVILY_API_KEY".into()))?;
        Self::from_config(&SearchConfig {
            tavily_api_key: Some(key),
            ..SearchConfig::default()
        })
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "query": query, "max_results": self.max_results }))
            .send()
            .await
            .map_err(|err| EngineError::Protocol(format!("Tavily request failed: {err}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Protocol(format!(
                "Tavily search failed with {status}: {body}"
            )));
        }

        let mut parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|err| EngineError::Protocol(format!("Tavily parse error: {err}")))?;
        parsed.results.truncate(self.max_results);
        Ok(parsed.results)
    }
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "Search the web for real-time information. Use this when you need current news, facts, or information from the internet."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        // only the query is forwarded; models tend to invent extra parameters
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Protocol("missing `query` for tavily_search".into()))?;
        let results = self.search(query).await?;
        Ok(serde_json::to_value(results)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_trimmed_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "ai news",
                "results": [
                    {"title": "One", "url": "https://one.example", "content": "first", "score": 0.9},
                    {"title": "Two", "url": "https://two.example", "content": "second", "score": 0.8},
                    {"title": "Three", "url": "https://three.example", "content": "third", "score": 0.7}
                ]
            })))
            .mount(&server)
            .await;

        let tool = TavilySearchTool::new("tvly-test")
            .unwrap()
            .with_endpoint(format!("{}/search", server.uri()))
            .with_max_results(2);

        let out = tool
            .call(json!({"query": "ai news", "topic": "ignored"}))
            .await
            .unwrap();
        let results: Vec<SearchResult> = serde_json::from_value(out).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].url, "https://two.example");
    }

    #[test]
    fn missing_key_is_reported() {
        let err = TavilySearchTool::from_config(&SearchConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::MissingConfig(_)));
    }
}
