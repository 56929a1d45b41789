use std::sync::Arc;
use std::time::Duration;

use bgvoice_core::types::{ConversationId, Role};
use bgvoice_engine::traits::TranscriptSource;
use bgvoice_engine::transcript_fetch::{FetchError, RetryPolicy, TranscriptFetcher};
use bgvoice_providers::convai::{ConvaiConfig, build_conversation_request};
use bgvoice_providers::parse::{ConversationSnapshot, parse_conversation};
use bgvoice_providers::runtime;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct HttpTranscripts {
    cfg: ConvaiConfig,
}

#[async_trait::async_trait]
impl TranscriptSource for HttpTranscripts {
    async fn fetch_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> anyhow::Result<ConversationSnapshot> {
        let req = build_conversation_request(&self.cfg, conversation_id.as_str())?;
        let resp = runtime::execute(&req)
            .await?
            .ensure_success("fetch conversation")?;
        parse_conversation(&resp.body)
    }
}

fn fetcher(server: &MockServer, max_attempts: u32) -> TranscriptFetcher {
    TranscriptFetcher::new(
        Arc::new(HttpTranscripts {
            cfg: ConvaiConfig {
                base_url: server.uri(),
                api_key: "xi-test".into(),
            },
        }),
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(5),
        },
    )
}

#[tokio::test]
async fn processing_twice_then_done_returns_non_blank_entries_after_three_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversations/abc123"))
        .and(header("xi-api-key", "xi-test"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"conversation_id":"abc123","status":"processing","transcript":[]}"#,
            "application/json",
        ))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversations/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "conversation_id": "abc123",
                "status": "done",
                "transcript": [
                    {"role": "user", "message": "hi", "time_in_call_secs": 0},
                    {"role": "assistant", "message": "", "time_in_call_secs": 1}
                ]
            }"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let out = fetcher(&server, 10)
        .fetch(&ConversationId::new("abc123"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].role, Role::User);
    assert_eq!(out[0].message, "hi");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn always_processing_issues_exactly_max_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversations/abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"status":"processing"}"#, "application/json"),
        )
        .expect(10)
        .mount(&server)
        .await;

    let err = fetcher(&server, 10)
        .fetch(&ConversationId::new("abc123"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::NotReady { attempts: 10, .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 10);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversations/abc123"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversations/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"status":"done","transcript":[{"role":"agent","message":"All set.","time_in_call_secs":3.5}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let out = fetcher(&server, 3)
        .fetch(&ConversationId::new("abc123"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].role, Role::Assistant);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
