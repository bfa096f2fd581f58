//! Single-call pipelines: a prompt template feeding a model, and a chat that
//! remembers the last few exchanges.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::llm::{LanguageModel, ModelResponse};
use crate::memory::WindowMemory;
use crate::message::Message;
use crate::prompt::PromptTemplate;

fn expect_text(response: ModelResponse) -> Result<String> {
    match response {
        ModelResponse::PlainAnswer(text) => Ok(text),
        ModelResponse::ToolRequest(calls) => Err(EngineError::Protocol(format!(
            "expected a text reply, model requested {} tool call(s)",
            calls.len()
        ))),
    }
}

pub struct LlmChain<M: LanguageModel + ?Sized = dyn LanguageModel> {
    prompt: PromptTemplate,
    model: Arc<M>,
}

impl<M: LanguageModel + ?Sized> LlmChain<M> {
    pub fn new(prompt: PromptTemplate, model: Arc<M>) -> Self {
        Self { prompt, model }
    }

    pub async fn invoke(&self, values: &HashMap<String, String>) -> Result<String> {
        let rendered = self.prompt.format(values)?;
        let response = self
            .model
            .complete_chat(&[Message::user(rendered)], &[])
            .await?;
        expect_text(response)
    }
}

const CONVERSATION_PREAMBLE: &str = "The following is a friendly conversation between a human and an AI. \
The AI is talkative and provides lots of specific details from its context. \
If the AI does not know the answer to a question, it truthfully says it does not know.";

/// Chat whose context is the last `k` exchanges held in a [`WindowMemory`].
pub struct ConversationChain<M: LanguageModel + ?Sized = dyn LanguageModel> {
    model: Arc<M>,
    memory: WindowMemory,
}

impl<M: LanguageModel + ?Sized> ConversationChain<M> {
    pub fn new(model: Arc<M>, memory: WindowMemory) -> Self {
        Self { model, memory }
    }

    pub fn memory(&self) -> &WindowMemory {
        &self.memory
    }

    pub async fn run(&mut self, input: impl Into<String>) -> Result<String> {
        let input = input.into();
        let mut request = vec![Message::system(CONVERSATION_PREAMBLE)];
        request.extend(self.memory.as_messages());
        request.push(Message::user(input.clone()));

        let reply = expect_text(self.model.complete_chat(&request, &[]).await?)?;
        self.memory.save_context(input, reply.clone());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::StubModel;

    #[tokio::test]
    async fn llm_chain_renders_template_into_one_user_message() {
        let model = StubModel::new(vec!["A short summary.".into()]);
        let prompt = PromptTemplate::new("Summarize: {information}").unwrap();
        let chain = LlmChain::new(prompt, model.clone());

        let mut values = HashMap::new();
        values.insert("information".to_string(), "Ruby Learner teaches Flutter".to_string());
        let out = chain.invoke(&values).await.unwrap();

        assert_eq!(out, "A short summary.");
        let sent = &model.requests()[0].messages;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "Summarize: Ruby Learner teaches Flutter");
    }

    #[tokio::test]
    async fn conversation_replays_only_the_window() {
        let model = StubModel::new(vec!["r1".into(), "r2".into(), "r3".into()]);
        let mut chat = ConversationChain::new(model.clone(), WindowMemory::new(1));

        chat.run("q1").await.unwrap();
        chat.run("q2").await.unwrap();
        chat.run("q3").await.unwrap();

        let third = &model.requests()[2].messages;
        let texts: Vec<&str> = third.iter().skip(1).map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["q2", "r2", "q3"]);
        assert_eq!(third[0].role, Role::System);
        assert_eq!(chat.memory().buffer(), "Human: q3\nAI: r3");
    }

    #[tokio::test]
    async fn failed_turns_are_not_remembered() {
        let model = StubModel::new(vec![]);
        let mut chat = ConversationChain::new(model, WindowMemory::new(3));

        assert!(chat.run("hello").await.is_err());
        assert!(chat.memory().is_empty());
    }
}
