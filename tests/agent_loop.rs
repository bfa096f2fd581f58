//! End-to-end runs of the reason/act loop through the public API.

use std::sync::Arc;

use react_engine::tools::{arithmetic_toolkit, CalculatorTool};
use react_engine::{
    should_continue, Agent, EngineError, LanguageModel, Message, OllamaClient, Role, Route,
    StubModel, ToolRegistry,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn adds_twelve_and_seven() {
    let model = StubModel::new(vec![
        r#"{"action":"call_tool","id":"call_add","name":"add","arguments":{"a":12,"b":7}}"#.into(),
        r#"{"action":"respond","content":"12 + 7 = 19"}"#.into(),
    ]);
    let agent = Agent::new(model).with_tools(arithmetic_toolkit());

    let run = agent.invoke("what is 12 + 7").await.unwrap();

    let messages = run.state.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].tool_calls[0].name, "add");

    let result = messages[2].tool_result.as_ref().unwrap();
    assert_eq!(result.tool_call_id, "call_add");
    assert!(result.output.contains("19"));

    assert_eq!(run.answer, "12 + 7 = 19");
    assert_eq!(should_continue(&run.state), Route::End);
}

#[tokio::test]
async fn multiple_calls_in_one_phase_are_all_answered() {
    let model = StubModel::new(vec![
        r#"{"action":"call_tools","calls":[
            {"name":"calculator","arguments":{"operation":"multiply","x":1234,"y":5678}},
            {"name":"tavily_search","arguments":{"query":"tokyo weather"}},
            {"name":"add","arguments":{"a":1,"b":2}}
        ]}"#
        .into(),
        r#"{"action":"respond","content":"1234 * 5678 = 7006652"}"#.into(),
    ]);
    let mut tools = arithmetic_toolkit();
    tools.register(CalculatorTool);
    let agent = Agent::new(model.clone()).with_tools(tools);

    let run = agent.invoke("What is 1234 multiplied by 5678?").await.unwrap();

    let request = &run.state.messages()[1];
    let results = &run.state.messages()[2..5];
    for (call, result) in request.tool_calls.iter().zip(results) {
        assert_eq!(result.tool_result.as_ref().unwrap().tool_call_id, call.id);
    }
    assert_eq!(results[0].content, "7006652");
    assert_eq!(results[1].content, "Error: unknown tool `tavily_search`");
    assert_eq!(results[2].content, "3");

    // the follow-up reasoning call carried all three results
    assert_eq!(model.requests()[1].messages.len(), 5);
}

#[tokio::test]
async fn runs_against_an_ollama_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"messages": [{"role": "user"}, {"role": "assistant"}, {"role": "tool", "content": "19"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "The answer is 19."}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "add", "arguments": {"a": 12, "b": 7}}}]
            }
        })))
        .mount(&server)
        .await;

    let model: Arc<dyn LanguageModel> =
        Arc::new(OllamaClient::new(server.uri(), "llama3.1:8b").unwrap());
    let agent: Agent = Agent::new(model).with_tools(arithmetic_toolkit());

    let run = agent.invoke("what is 12 + 7").await.unwrap();

    assert_eq!(run.answer, "The answer is 19.");
    assert_eq!(run.steps, 2);
}

#[tokio::test]
async fn step_ceiling_stops_a_model_that_never_answers() {
    let looping = r#"{"action":"call_tool","name":"add","arguments":{"a":1,"b":1}}"#;
    let model = StubModel::new(vec![looping.to_string(); 20]);
    let agent = Agent::new(model.clone())
        .with_tools(arithmetic_toolkit())
        .with_max_steps(4);

    let err = agent.invoke("keep adding").await.unwrap_err();

    assert!(matches!(err, EngineError::StepLimit(4)));
    assert_eq!(model.remaining(), 16);
}

#[tokio::test]
async fn no_tools_means_a_single_reasoning_phase() {
    let model = StubModel::new(vec!["Hello there".into()]);
    let agent = Agent::new(model.clone()).with_tools(ToolRegistry::new());

    let run = agent.invoke("hi").await.unwrap();

    assert_eq!(run.steps, 1);
    assert_eq!(run.state.messages()[1], Message::assistant("Hello there"));
    assert!(model.requests()[0].tools.is_empty());
}
