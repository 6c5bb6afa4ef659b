use std::sync::Arc;
use std::time::Duration;

use studyhive_core::*;
use studyhive_memory::MemoryKvStore;
use studyhive_provider::{create_provider, ProviderConfig, ProviderKind};
use studyhive_schema::Message;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/models/gemini-1.5-flash:generateContent";

fn mock_gemini_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
    })
}

async fn orchestrator(server: &MockServer) -> Arc<ChatOrchestrator> {
    let mut config = StudyConfig::default();
    config.provider = ProviderConfig::new(ProviderKind::Gemini)
        .with_api_key("test-key")
        .with_base_url(server.uri());
    config.notes.debounce_ms = 0;
    config.roadmap.debounce_ms = 0;
    validate_config(&config).unwrap();

    let provider = create_provider(&config.provider).unwrap();
    ChatOrchestrator::open(&config, provider, Arc::new(MemoryKvStore::new())).await
}

#[tokio::test]
async fn gemini_turn_drives_roadmap_and_notes() {
    let server = MockServer::start().await;

    let roadmap = "```json\n[{\"title\":\"Intro\",\"descriptions\":[{\"concept\":\"Base case\",\"description\":\"stop\",\"link\":\"\"}]}]\n```";
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(body_string_contains("learning roadmap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_gemini_response(roadmap)))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(body_string_contains("study notes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(mock_gemini_response("# Recursion notes")),
        )
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_gemini_response(
            "Recursion is when a function calls itself.",
        )))
        .mount(&server)
        .await;

    let orch = orchestrator(&server).await;
    orch.set_input("What is recursion?").await;
    let outcome = orch.submit().await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Replied {
            reply: "Recursion is when a function calls itself.".into()
        }
    );

    let mut roadmap_rx = orch.roadmap().subscribe();
    let view = tokio::time::timeout(
        Duration::from_secs(5),
        roadmap_rx.wait_for(|v| !v.loading && !v.steps.is_empty()),
    )
    .await
    .expect("roadmap in time")
    .unwrap()
    .clone();
    assert_eq!(view.concepts(), vec!["Base case"]);

    let mut notes_rx = orch.notes().subscribe();
    let notes = tokio::time::timeout(
        Duration::from_secs(5),
        notes_rx.wait_for(|v| v.last_processed_len == 2),
    )
    .await
    .expect("notes in time")
    .unwrap()
    .clone();
    assert!(matches!(notes.state, NotesState::Ready(ref doc) if doc.markdown == "# Recursion notes"));
}

#[tokio::test]
async fn gemini_server_error_appends_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let orch = orchestrator(&server).await;
    orch.set_input("What is recursion?").await;
    let outcome = orch.submit().await.unwrap();

    match outcome {
        TurnOutcome::Failed { error } => assert!(error.contains("[retryable]")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(
        orch.transcript().await,
        vec![
            Message::user("What is recursion?"),
            Message::assistant(REPLY_FALLBACK),
        ]
    );
    assert_eq!(orch.context().await, "");
}
