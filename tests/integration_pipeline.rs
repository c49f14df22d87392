#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end conversation tests against a mocked OpenAI-compatible API

use mnemosyne::commands::open_conversation;
use mnemosyne::config::{Config, OpenAiConfig, PromptConfig, VectorStoreConfig};
use mnemosyne::conversation::{ConversationPipeline, Sender};
use mnemosyne::database::{LanceVectorStore, VectorIndex};
use mnemosyne::{MnemosyneError, RemoteErrorKind};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const DIMENSION: usize = 8;

/// Answers embedding requests with a vector derived from the input text
struct EmbeddingResponder;

impl Respond for EmbeddingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("request should be JSON");
        let input = body["input"].as_str().expect("input should be a string");
        let bytes = input.as_bytes();
        let embedding: Vec<f32> = (0..DIMENSION)
            .map(|i| f32::from(bytes.get(i).copied().unwrap_or(0)) / 255.0)
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": embedding }],
            "model": "text-embedding-ada-002"
        }))
    }
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn create_test_config(server: &MockServer, retry_attempts: u32) -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        openai: OpenAiConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: Some("sk-test".to_string()),
            retry_attempts,
            ..OpenAiConfig::default()
        },
        vector_store: VectorStoreConfig {
            dimension: DIMENSION as u32,
            ..VectorStoreConfig::default()
        },
        prompt: PromptConfig::default(),
        base_dir: temp_dir.path().to_path_buf(),
    };
    (config, temp_dir)
}

async fn mount_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(EmbeddingResponder)
        .mount(server)
        .await;
}

async fn chat_prompts(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("request recording should be enabled")
        .iter()
        .filter(|request| request.url.path() == "/v1/chat/completions")
        .map(|request| {
            let body: Value =
                serde_json::from_slice(&request.body).expect("request should be JSON");
            body["messages"][0]["content"]
                .as_str()
                .expect("prompt should be a string")
                .to_string()
        })
        .collect()
}

async fn open(config: &Config, ephemeral: bool) -> ConversationPipeline {
    init_test_tracing();
    open_conversation(config, ephemeral)
        .await
        .expect("conversation should open")
}

#[tokio::test]
async fn second_turn_recalls_the_first() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("Nice to meet you, Bob."))
        .mount(&server)
        .await;
    let (config, _temp_dir) = create_test_config(&server, 1);
    let pipeline = open(&config, true).await;

    pipeline
        .send_message("my name is bob")
        .await
        .expect("first turn should succeed");
    pipeline
        .send_message("What is my name?")
        .await
        .expect("second turn should succeed");

    let prompts = chat_prompts(&server).await;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].starts_with("Given the queries I have asked previously"));
    assert!(prompts[0].ends_with("New query:\nmy name is bob"));

    let (context, new_query) = prompts[1]
        .split_once("New query:\n")
        .expect("prompt should have a new query section");
    let (previous, replied) = context
        .split_once("Replied section:\n")
        .expect("prompt should have a replied section");
    assert!(previous.contains("my name is bob\n"));
    assert!(replied.contains("Nice to meet you, Bob.\n"));
    assert_eq!(new_query, "What is my name?");

    let messages = pipeline.messages().snapshot().await;
    let senders: Vec<Sender> = messages.iter().map(|message| message.sender).collect();
    assert_eq!(
        senders,
        vec![Sender::User, Sender::Assistant, Sender::User, Sender::Assistant]
    );
}

#[tokio::test]
async fn turns_are_persisted_in_lancedb() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("Paris is lovely."))
        .mount(&server)
        .await;
    let (config, _temp_dir) = create_test_config(&server, 1);

    {
        let pipeline = open(&config, false).await;
        pipeline
            .send_message("I live in Paris")
            .await
            .expect("turn should succeed");
    }

    // A new session over the same store remembers the earlier one
    let pipeline = open(&config, false).await;
    pipeline
        .send_message("Where do I live?")
        .await
        .expect("turn should succeed");

    let prompts = chat_prompts(&server).await;
    assert!(prompts[1].contains("I live in Paris\n"));
    assert!(prompts[1].contains("Paris is lovely.\n"));

    let store = LanceVectorStore::new(&config)
        .await
        .expect("should open vector store");
    assert_eq!(store.count("queries").await.expect("should count"), 2);
    assert_eq!(store.count("replies").await.expect("should count"), 2);
}

#[tokio::test]
async fn rejected_key_fails_the_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;
    let (config, _temp_dir) = create_test_config(&server, 3);
    let pipeline = open(&config, true).await;

    let error = pipeline
        .send_message("hello")
        .await
        .expect_err("turn should fail");

    match error {
        MnemosyneError::Embedding(remote) => {
            assert_eq!(remote.kind, RemoteErrorKind::Authentication);
        }
        other => panic!("expected embedding error, got {other:?}"),
    }
    // Authentication failures are not retried
    assert_eq!(
        server
            .received_requests()
            .await
            .expect("request recording should be enabled")
            .len(),
        1
    );

    let messages = pipeline.messages().snapshot().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, Sender::User);
    assert!(chat_prompts(&server).await.is_empty());
}

#[tokio::test]
async fn transient_completion_failure_is_retried() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("Back online."))
        .mount(&server)
        .await;
    let (config, _temp_dir) = create_test_config(&server, 2);
    let pipeline = open(&config, true).await;

    let reply = pipeline
        .send_message("are you there?")
        .await
        .expect("retry should recover the turn");

    assert_eq!(reply.content, "Back online.");
    assert_eq!(chat_prompts(&server).await.len(), 2);
}

#[tokio::test]
async fn server_error_without_retry_fails_the_turn() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (config, _temp_dir) = create_test_config(&server, 1);
    let pipeline = open(&config, true).await;

    let error = pipeline
        .send_message("hello")
        .await
        .expect_err("turn should fail");

    assert!(matches!(
        error.remote().map(|remote| remote.kind),
        Some(RemoteErrorKind::Server)
    ));
    assert!(matches!(error, MnemosyneError::Completion(_)));
    assert_eq!(chat_prompts(&server).await.len(), 1);
    assert_eq!(pipeline.messages().len().await, 1);
}
