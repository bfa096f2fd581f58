use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{AgentConfig, StepLimitPolicy};
use crate::error::{EngineError, Result};
use crate::llm::{LanguageModel, ModelResponse};
use crate::message::{Message, ToolCall};
use crate::state::ConversationState;
use crate::tool::{render_output, ToolRegistry};

/// Where the loop goes after a reasoning phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Act,
    End,
}

/// Decide the next phase from the most recent message only.
pub fn should_continue(state: &ConversationState) -> Route {
    match state.last() {
        Some(message) if message.has_tool_calls() => {
            debug!(tool_calls = message.tool_calls.len(), "routing to act");
            Route::Act
        }
        Some(_) => {
            debug!("done reasoning");
            Route::End
        }
        None => Route::End,
    }
}

/// Outcome of one [`Agent::invoke`].
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub answer: String,
    pub state: ConversationState,
    /// Number of reasoning phases that ran.
    pub steps: usize,
}

/// A reason/act agent: the model reasons over the full history, requested tools
/// run, and their results feed the next reasoning phase.
pub struct Agent<M: LanguageModel + ?Sized = dyn LanguageModel> {
    model: Arc<M>,
    tools: ToolRegistry,
    system_prompt: Option<String>,
    max_steps: usize,
    on_step_limit: StepLimitPolicy,
}

impl<M: LanguageModel + ?Sized> Agent<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            tools: ToolRegistry::new(),
            system_prompt: None,
            max_steps: 10,
            on_step_limit: StepLimitPolicy::Error,
        }
    }

    pub fn from_config(model: Arc<M>, cfg: &AgentConfig) -> Self {
        let mut agent = Self::new(model)
            .with_max_steps(cfg.max_steps)
            .with_step_limit_policy(cfg.on_step_limit);
        agent.system_prompt = cfg.system_prompt.clone();
        agent
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_step_limit_policy(mut self, policy: StepLimitPolicy) -> Self {
        self.on_step_limit = policy;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    fn request(&self, state: &ConversationState) -> Vec<Message> {
        let mut request = Vec::with_capacity(state.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            request.push(Message::system(prompt.clone()));
        }
        request.extend(state.iter().cloned());
        request
    }

    /// Send the full history to the model and append its single reply.
    pub async fn reason(&self, state: &mut ConversationState) -> Result<()> {
        let response = self
            .model
            .complete_chat(&self.request(state), &self.tools.describe())
            .await?;
        if let ModelResponse::ToolRequest(calls) = &response {
            info!(count = calls.len(), "model requested tool call(s)");
        }
        state.push(response.into_message());
        Ok(())
    }

    /// Run every tool call in the last message, appending one result per call in order.
    pub async fn act(&self, state: &mut ConversationState) -> Result<()> {
        let calls: Vec<ToolCall> = match state.last() {
            Some(message) => message.tool_calls.clone(),
            None => return Ok(()),
        };

        for call in calls {
            info!(tool = %call.name, arguments = %call.arguments, "invoking tool");
            let output = match self.tools.call(&call.name, call.arguments.clone()).await {
                Ok(value) => render_output(&value),
                Err(EngineError::ToolNotFound(name)) => {
                    warn!(tool = %name, "model requested an unknown tool");
                    format!("Error: unknown tool `{name}`")
                }
                Err(err) => {
                    warn!(tool = %call.name, error = %err, "tool call failed");
                    format!("Error: {err}")
                }
            };
            state.push(Message::tool(call.id, call.name, output));
        }
        Ok(())
    }

    /// Drive reason -> act -> reason until the model stops requesting tools.
    pub async fn invoke(&self, query: impl Into<String>) -> Result<AgentRun> {
        let mut state = ConversationState::from_query(query);
        let mut steps = 0;

        loop {
            if steps == self.max_steps {
                return self.finish_at_limit(state, steps).await;
            }
            self.reason(&mut state).await?;
            steps += 1;

            match should_continue(&state) {
                Route::Act => self.act(&mut state).await?,
                Route::End => {
                    let answer = state
                        .last()
                        .map(|m| m.content.clone())
                        .unwrap_or_default();
                    return Ok(AgentRun {
                        answer,
                        state,
                        steps,
                    });
                }
            }
        }
    }

    async fn finish_at_limit(
        &self,
        mut state: ConversationState,
        steps: usize,
    ) -> Result<AgentRun> {
        warn!(max_steps = self.max_steps, "step limit reached");
        match self.on_step_limit {
            StepLimitPolicy::Error => Err(EngineError::StepLimit(self.max_steps)),
            StepLimitPolicy::ForceAnswer => {
                let answer = match self.model.complete_chat(&self.request(&state), &[]).await? {
                    ModelResponse::PlainAnswer(text) => text,
                    ModelResponse::ToolRequest(_) => {
                        return Err(EngineError::StepLimit(self.max_steps))
                    }
                };
                state.push(Message::assistant(answer.clone()));
                Ok(AgentRun {
                    answer,
                    state,
                    steps: steps + 1,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::message::Role;
    use crate::tool::Tool;
    use crate::StubModel;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the `text` field back"
        }

        fn parameters(&self) -> Option<Value> {
            Some(json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
            }))
        }

        async fn call(&self, input: Value) -> Result<Value> {
            Ok(input.get("text").cloned().unwrap_or(Value::Null))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn call(&self, _input: Value) -> Result<Value> {
            Err(EngineError::Protocol("backend unavailable".into()))
        }
    }

    fn echo_tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        tools.register(FailingTool);
        tools
    }

    fn state_with_last(message: Message) -> ConversationState {
        let mut state = ConversationState::from_query("hi");
        state.push(message);
        state
    }

    #[test]
    fn routes_on_last_message_only() {
        let mut state = state_with_last(Message::tool_request(vec![ToolCall::new(
            "c1",
            "echo",
            json!({}),
        )]));
        assert_eq!(should_continue(&state), Route::Act);

        state.push(Message::assistant("done"));
        assert_eq!(should_continue(&state), Route::End);
        assert_eq!(should_continue(&ConversationState::new()), Route::End);
    }

    #[tokio::test]
    async fn act_preserves_request_order_and_ids() {
        let agent = Agent::new(StubModel::new(vec![])).with_tools(echo_tools());
        let mut state = state_with_last(Message::tool_request(vec![
            ToolCall::new("first", "echo", json!({"text": "one"})),
            ToolCall::new("second", "echo", json!({"text": "two"})),
        ]));

        agent.act(&mut state).await.unwrap();

        let results: Vec<(&str, &str)> = state.messages()[2..]
            .iter()
            .map(|m| {
                let r = m.tool_result.as_ref().unwrap();
                (r.tool_call_id.as_str(), r.output.as_str())
            })
            .collect();
        assert_eq!(results, vec![("first", "one"), ("second", "two")]);
    }

    #[tokio::test]
    async fn unknown_and_failing_tools_become_placeholders() {
        let agent = Agent::new(StubModel::new(vec![])).with_tools(echo_tools());
        let mut state = state_with_last(Message::tool_request(vec![
            ToolCall::new("a", "teleport", json!({})),
            ToolCall::new("b", "broken", json!({})),
        ]));

        agent.act(&mut state).await.unwrap();

        assert_eq!(state.len(), 4);
        assert_eq!(state.messages()[2].content, "Error: unknown tool `teleport`");
        assert!(state.messages()[3].content.contains("backend unavailable"));
        assert!(state.messages()[2..].iter().all(|m| m.role == Role::Tool));
    }

    #[tokio::test]
    async fn returns_llm_response_without_tools() {
        let model = StubModel::new(vec![r#"{"action":"respond","content":"Hello!"}"#.into()]);
        let agent = Agent::new(model);

        let run = agent.invoke("hi").await.unwrap();

        assert_eq!(run.answer, "Hello!");
        assert_eq!(run.state.len(), 2);
        assert_eq!(run.steps, 1);
    }

    #[tokio::test]
    async fn executes_tool_then_replies() {
        let model = StubModel::new(vec![
            r#"{"action":"call_tool","name":"echo","arguments":{"text":"ping"}}"#.into(),
            r#"{"action":"respond","content":"Echoed your request."}"#.into(),
        ]);

        let agent = Agent::new(model.clone()).with_tools(echo_tools());
        let run = agent.invoke("say ping").await.unwrap();

        assert_eq!(run.answer, "Echoed your request.");
        assert_eq!(run.state.len(), 4);
        assert_eq!(run.steps, 2);

        // second reasoning phase sees the tool result
        let second = &model.requests()[1];
        assert_eq!(second.messages.last().unwrap().content, "ping");
        assert_eq!(second.tools, vec!["broken".to_string(), "echo".to_string()]);
    }

    #[tokio::test]
    async fn system_prompt_leads_every_request() {
        let model = StubModel::new(vec!["ok".into()]);
        let agent = Agent::new(model.clone()).with_system_prompt("Be brief.");

        agent.invoke("hi").await.unwrap();

        let sent = &model.requests()[0].messages;
        assert_eq!(sent[0], Message::system("Be brief."));
        assert_eq!(sent[1], Message::user("hi"));
    }

    #[tokio::test]
    async fn step_limit_errors_by_default() {
        let looping = r#"{"action":"call_tool","name":"echo","arguments":{"text":"again"}}"#;
        let model = StubModel::new(vec![looping.into(); 5]);
        let agent = Agent::new(model.clone())
            .with_tools(echo_tools())
            .with_max_steps(3);

        let err = agent.invoke("loop forever").await.unwrap_err();

        assert!(matches!(err, EngineError::StepLimit(3)));
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn step_limit_can_force_a_final_answer() {
        let looping = r#"{"action":"call_tool","name":"echo","arguments":{"text":"again"}}"#;
        let model = StubModel::new(vec![looping.into(), looping.into(), "best effort".into()]);
        let agent = Agent::new(model.clone())
            .with_tools(echo_tools())
            .with_max_steps(2)
            .with_step_limit_policy(StepLimitPolicy::ForceAnswer);

        let run = agent.invoke("loop").await.unwrap();

        assert_eq!(run.answer, "best effort");
        assert_eq!(run.steps, 3);
        assert!(model.requests()[2].tools.is_empty());
        assert_eq!(should_continue(&run.state), Route::End);
    }

    #[tokio::test]
    async fn forced_answer_that_still_wants_tools_hits_the_limit() {
        let looping = r#"{"action":"call_tool","name":"echo","arguments":{"text":"again"}}"#;
        let model = StubModel::new(vec![looping.into(); 3]);
        let agent = Agent::new(model.clone())
            .with_tools(echo_tools())
            .with_max_steps(2)
            .with_step_limit_policy(StepLimitPolicy::ForceAnswer);

        let err = agent.invoke("loop").await.unwrap_err();

        assert!(matches!(err, EngineError::StepLimit(2)));
        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].tools.is_empty());
    }

    #[tokio::test]
    async fn backend_failures_propagate() {
        let agent = Agent::new(StubModel::new(vec![]));
        let err = agent.invoke("hi").await.unwrap_err();
        assert!(matches!(err, EngineError::LanguageModel(_)));
    }
}
