#![cfg(feature = "openai")]

use std::sync::Arc;
use std::time::Duration;

use scorecard_core::{Rubric, VerdictStatus};
use scorecard_runtime::{
    ChatCompletionsProvider, ChatMessage, CompletionConfig, LlmProvider, ProviderError,
    RuntimeConfig, ScoringOrchestrator,
};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const PATH: &str = "/v1/chat/completions";

fn provider(server: &MockServer) -> ChatCompletionsProvider {
    ChatCompletionsProvider::new("test-key").with_endpoint(format!("{}{}", server.uri(), PATH))
}

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("你是一位评委。"),
        ChatMessage::user("[0] evidence"),
    ]
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "model": "deepseek-chat",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 42, "completion_tokens": 7, "total_tokens": 49}
    })
}

#[tokio::test]
async fn test_successful_completion() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(PATH))
        .and(matchers::header("authorization", "Bearer test-key"))
        .and(matchers::header("content-type", "application/json"))
        .and(matchers::body_partial_json(serde_json::json!({
            "model": "deepseek-chat",
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": "你是一位评委。"},
                {"role": "user", "content": "[0] evidence"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion(r#"{"score": 5, "reason": "ok"}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server)
        .complete(messages(), &CompletionConfig::default())
        .await
        .unwrap();

    assert_eq!(response.content, r#"{"score": 5, "reason": "ok"}"#);
    assert_eq!(response.usage.prompt_tokens, 42);
    assert_eq!(response.usage.total(), 49);
    assert_eq!(response.stop_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn test_server_error_maps_to_api_error() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": {"message": "upstream overloaded", "type": "server_error"}
        })))
        .mount(&server)
        .await;

    let result = provider(&server)
        .complete(messages(), &CompletionConfig::default())
        .await;

    match result {
        Err(ProviderError::ApiError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream overloaded");
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_choices_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-2",
            "object": "chat.completion"
        })))
        .mount(&server)
        .await;

    let result = provider(&server)
        .complete(messages(), &CompletionConfig::default())
        .await;

    assert!(matches!(result, Err(ProviderError::ParseError(_))));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let result = provider(&server)
        .complete(messages(), &CompletionConfig::default())
        .await;

    assert!(matches!(result, Err(ProviderError::ParseError(_))));
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&server)
        .await;

    let result = provider(&server)
        .complete(messages(), &CompletionConfig::default())
        .await;

    assert!(matches!(
        result,
        Err(ProviderError::RateLimited { retry_after: Some(d) }) if d == Duration::from_secs(30)
    ));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(r#"{"score": 5, "reason": "late"}"#))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = CompletionConfig {
        timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let result = provider(&server).complete(messages(), &config).await;

    assert!(matches!(result, Err(ProviderError::Timeout(_))));
}

#[tokio::test]
async fn test_run_absorbs_failures_end_to_end() {
    let server = MockServer::start().await;

    // The patent criterion fails upstream; everything else is scored
    Mock::given(matchers::method("POST"))
        .and(matchers::path(PATH))
        .and(matchers::body_string_contains("patent portfolio"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"Assessment follows. {"score": 3, "reason": "see [1]"}"#,
        )))
        .mount(&server)
        .await;

    let rubric = Rubric::from_json(
        r#"[
            {"id": "E", "subcriteria": [{"id": "E1", "text": "team experience"}]},
            {"id": "I", "subcriteria": [{"id": "I1", "text": "patent portfolio"}]}
        ]"#,
    )
    .unwrap();

    let orchestrator = ScoringOrchestrator::builder()
        .provider(Arc::new(provider(&server)))
        .config(RuntimeConfig {
            concurrency: 2,
            ..Default::default()
        })
        .build()
        .unwrap();

    let run = orchestrator
        .score_document(
            "Our team has ten years of experience.\nWe filed two patent applications.",
            &rubric,
        )
        .await
        .unwrap();

    let scored = &run.report.detail["E1"];
    assert_eq!(scored.score, 3);
    assert_eq!(scored.status, VerdictStatus::Extracted);

    let failed = &run.report.detail["I1"];
    assert_eq!(failed.score, 1);
    assert_eq!(failed.status, VerdictStatus::ApiError);

    // E: 3 * 30 / 5, I: 1 * 30 / 5
    assert_eq!(run.report.total, 24.0);
    assert_eq!(run.usage.llm_calls, 2);
    assert_eq!(run.usage.degraded_calls, 1);
}
