//! Expose a [`Retriever`] to the model as a search tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{EngineError, Result};
use crate::knowledge::{Document, Retriever};
use crate::tool::Tool;

/// Renders one retrieved document for the model.
pub type HitFormatter = Arc<dyn Fn(&Document) -> String + Send + Sync>;

/// Document text, followed by its metadata as compact JSON when there is any.
pub fn render_with_metadata(document: &Document) -> String {
    let empty = match &document.metadata {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        document.text.clone()
    } else {
        format!("{}\n{}", document.text, document.metadata)
    }
}

pub struct RetrieverTool {
    name: String,
    description: String,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    format: HitFormatter,
}

impl RetrieverTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            retriever,
            top_k: 3,
            format: Arc::new(render_with_metadata),
        }
    }

    pub fn with_formatter<F>(mut self, format: F) -> Self
    where
        F: Fn(&Document) -> String + Send + Sync + 'static,
    {
        self.format = Arc::new(format);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Protocol(format!("missing `query` for {}", self.name)))?;

        let hits = self.retriever.retrieve(query, self.top_k).await?;
        if hits.is_empty() {
            return Ok(Value::String("No relevant documents found.".into()));
        }
        let text = hits
            .into_iter()
            .map(|hit| (self.format)(&hit.document))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Value::String(text))
    }
}
