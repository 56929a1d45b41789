use bgvoice_core::transcript::ChatHistoryRow;
use bgvoice_core::types::{ConversationId, Role};
use bgvoice_engine::traits::{ChatHistorySink, ConversationTokenSource, TranscriptSource};
use bgvoice_providers::parse::ConversationStatus;
use bgvoice_runtime::chat_history::HttpChatHistory;
use bgvoice_runtime::convai::ElevenLabsConvai;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn conversation_token_uses_agent_id_and_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversation/token"))
        .and(query_param("agent_id", "agent_7"))
        .and(header("xi-api-key", "xi-test"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"token":"tok_abc"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ElevenLabsConvai::new(server.uri(), "xi-test");
    assert_eq!(client.conversation_token("agent_7").await.unwrap(), "tok_abc");
}

#[tokio::test]
async fn conversation_token_without_token_field_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversation/token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let client = ElevenLabsConvai::new(server.uri(), "xi-test");
    let err = client.conversation_token("agent_7").await.unwrap_err();
    assert!(format!("{err:#}").contains("no conversation token"));
}

#[tokio::test]
async fn conversation_token_rejected_key_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversation/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = ElevenLabsConvai::new(server.uri(), "xi-bad");
    let err = client.conversation_token("agent_7").await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("status=401"), "{msg}");
}

#[tokio::test]
async fn fetch_conversation_decodes_transcript() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/convai/conversations/conv_42"))
        .and(header("xi-api-key", "xi-test"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "agent_id": "agent_7",
                "conversation_id": "conv_42",
                "status": "done",
                "transcript": [
                    {"role": "user", "message": "Book a table", "time_in_call_secs": 1},
                    {"role": "agent", "message": null, "time_in_call_secs": 2}
                ]
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = ElevenLabsConvai::new(server.uri(), "xi-test");
    let snap = client
        .fetch_conversation(&ConversationId::new("conv_42"))
        .await
        .unwrap();

    assert_eq!(snap.status, ConversationStatus::Done);
    assert_eq!(snap.transcript.len(), 2);
    assert_eq!(snap.transcript[1].role, Role::Assistant);
    assert!(snap.transcript[1].is_blank());
}

#[tokio::test]
async fn chat_history_posts_messages_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/chat-history/user-1"))
        .and(body_json(serde_json::json!({
            "messages": [
                {"text": "hi", "sender": "user", "chatId": "chat-9", "sentDate": "2025-03-01T10:00:00.000Z"},
                {"text": "hello!", "sender": "assistant", "chatId": "chat-9", "sentDate": "2025-03-01T10:00:00.000Z"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let rows = vec![
        ChatHistoryRow {
            text: "hi".into(),
            sender: Role::User,
            chat_id: "chat-9".into(),
            sent_date: "2025-03-01T10:00:00.000Z".into(),
        },
        ChatHistoryRow {
            text: "hello!".into(),
            sender: Role::Assistant,
            chat_id: "chat-9".into(),
            sent_date: "2025-03-01T10:00:00.000Z".into(),
        },
    ];

    let sink = HttpChatHistory::new(format!("{}/webhook", server.uri()));
    sink.save("user-1", &rows).await.unwrap();
}

#[tokio::test]
async fn chat_history_non_2xx_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let sink = HttpChatHistory::new(server.uri());
    let err = sink.save("user-1", &[]).await.unwrap_err();
    assert!(format!("{err:#}").contains("status=503"));
}
