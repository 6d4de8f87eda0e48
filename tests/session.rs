//! Session behavior over an in-memory transport
//!
//! No network: the fake transport serves scripted chunks and records
//! every request it receives.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use reqwest::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ollamachat::streaming::{
    BufferedResponse, ByteStream, Callbacks, Exchange, Outcome, RequestPayload, ResponseBody,
    Transport,
};
use ollamachat::{ClientError, Config, Message, OllamaClient, Result, SharedConfig};

/// What the fake server answers on the streaming path
#[derive(Clone)]
enum StreamReply {
    Chunks(Vec<&'static str>),
    /// Chunks, then the body hangs forever
    ChunksThenHang(Vec<&'static str>),
    Status(u16),
}

struct FakeTransport {
    stream_reply: StreamReply,
    buffered_reply: serde_json::Value,
    requests: AtomicUsize,
    payloads: Mutex<Vec<serde_json::Value>>,
}

impl FakeTransport {
    fn new(stream_reply: StreamReply) -> Arc<Self> {
        Self::with_buffered(stream_reply, serde_json::json!({}))
    }

    fn with_buffered(stream_reply: StreamReply, buffered_reply: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            stream_reply,
            buffered_reply,
            requests: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn record(&self, body: Option<&RequestPayload>) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(payload) = body {
            let json = serde_json::to_value(payload).expect("payload serializes");
            self.payloads.lock().unwrap().push(json);
        }
    }

    fn last_payload(&self) -> serde_json::Value {
        self.payloads.lock().unwrap().last().cloned().expect("a request was sent")
    }
}

fn byte_chunks(parts: Vec<&'static str>) -> impl futures_util::Stream<Item = Result<Bytes>> {
    stream::iter(
        parts
            .into_iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect::<Vec<_>>(),
    )
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request_buffered(
        &self,
        _method: Method,
        _path: &str,
        body: Option<&RequestPayload>,
    ) -> Result<BufferedResponse> {
        self.record(body);
        Ok(BufferedResponse {
            status: 200,
            body: ResponseBody::Json(self.buffered_reply.clone()),
        })
    }

    async fn request_streaming(&self, _path: &str, body: &RequestPayload) -> Result<ByteStream> {
        self.record(Some(body));
        match self.stream_reply.clone() {
            StreamReply::Chunks(parts) => Ok(ByteStream::new(byte_chunks(parts))),
            StreamReply::ChunksThenHang(parts) => Ok(ByteStream::new(
                byte_chunks(parts).chain(stream::pending()),
            )),
            StreamReply::Status(code) => Err(ClientError::HttpStatus {
                code,
                reason: "Internal Server Error".to_string(),
            }),
        }
    }
}

fn settings(model: &str, stream: bool) -> Arc<SharedConfig> {
    let mut config = Config::default();
    config.ollama.current_model = model.to_string();
    config.ollama.stream_response = stream;
    Arc::new(SharedConfig::new(config))
}

fn client(transport: Arc<FakeTransport>, model: &str, stream: bool) -> OllamaClient {
    OllamaClient::with_transport(transport, settings(model, stream))
}

#[derive(Default, Clone)]
struct Recorder {
    tokens: Arc<Mutex<Vec<String>>>,
    completed: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn callbacks(&self) -> Callbacks<'static> {
        let tokens = self.tokens.clone();
        let completed = self.completed.clone();
        let errors = self.errors.clone();
        Callbacks::new()
            .on_token(move |t| tokens.lock().unwrap().push(t.to_string()))
            .on_complete(move |t| completed.lock().unwrap().push(t.to_string()))
            .on_error(move |e| errors.lock().unwrap().push(e.to_string()))
    }

    fn terminal_count(&self) -> usize {
        self.completed.lock().unwrap().len() + self.errors.lock().unwrap().len()
    }
}

#[tokio::test]
async fn test_generate_scenario_split_inside_record() {
    let transport = FakeTransport::new(StreamReply::Chunks(vec![
        "{\"response\":\"Hel",
        "lo\"}\n{\"response\":\" world\"}\n{\"done\":true}\n",
    ]));
    let client = client(transport, "llama3", true);
    let recorder = Recorder::default();

    let outcome = client
        .generate("greet", None, recorder.callbacks())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed("Hello world".to_string()));
    assert_eq!(*recorder.tokens.lock().unwrap(), vec!["Hello", " world"]);
    assert_eq!(*recorder.completed.lock().unwrap(), vec!["Hello world"]);
}

#[tokio::test]
async fn test_chat_scenario_done_on_last_token() {
    let transport = FakeTransport::new(StreamReply::Chunks(vec![
        "{\"message\":{\"content\":\"Hi\"}}\n",
        "{\"message\":{\"content\":\"!\"},\"done\":true}\n",
    ]));
    let client = client(transport.clone(), "llama3", true);
    let recorder = Recorder::default();

    let outcome = client
        .chat(&[Message::user("hey")], None, recorder.callbacks())
        .await
        .unwrap();

    assert_eq!(outcome.text(), Some("Hi!"));
    assert_eq!(*recorder.tokens.lock().unwrap(), vec!["Hi", "!"]);

    let payload = transport.last_payload();
    assert_eq!(payload["model"], "llama3");
    assert_eq!(payload["stream"], true);
    assert_eq!(payload["messages"][0]["role"], "user");
}

#[tokio::test]
async fn test_bytes_after_done_are_ignored() {
    let transport = FakeTransport::new(StreamReply::Chunks(vec![
        "{\"response\":\"a\",\"done\":true}\n{\"response\":\"ignored\"}\n",
        "{\"response\":\"also ignored\"}\n",
    ]));
    let client = client(transport, "m", true);
    let recorder = Recorder::default();

    let outcome = client.generate("x", None, recorder.callbacks()).await.unwrap();

    assert_eq!(outcome.text(), Some("a"));
    assert_eq!(*recorder.tokens.lock().unwrap(), vec!["a"]);
    assert_eq!(recorder.terminal_count(), 1);
}

#[tokio::test]
async fn test_empty_model_fails_without_request() {
    let transport = FakeTransport::new(StreamReply::Chunks(vec![]));
    let client = client(transport.clone(), "", true);
    let recorder = Recorder::default();

    let outcome = client
        .chat(&[Message::user("hi")], None, recorder.callbacks())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(
        *recorder.errors.lock().unwrap(),
        vec![ClientError::NoModelSelected.to_string()]
    );
    assert_eq!(transport.request_count(), 0);

    let err = client
        .generate("hi", Some(""), Callbacks::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoModelSelected));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_explicit_model_overrides_setting() {
    let transport = FakeTransport::new(StreamReply::Chunks(vec!["{\"done\":true}\n"]));
    let client = client(transport.clone(), "configured", true);

    client
        .generate("x", Some("explicit"), Recorder::default().callbacks())
        .await
        .unwrap();

    assert_eq!(transport.last_payload()["model"], "explicit");
}

#[tokio::test]
async fn test_streaming_disabled_gives_one_completion() {
    let transport = FakeTransport::with_buffered(
        StreamReply::Chunks(vec![]),
        serde_json::json!({"message": {"role": "assistant", "content": "full reply"}, "done": true}),
    );
    let client = client(transport.clone(), "m", false);
    let recorder = Recorder::default();

    let outcome = client
        .chat(&[Message::user("hi")], None, recorder.callbacks())
        .await
        .unwrap();

    assert_eq!(outcome.text(), Some("full reply"));
    assert!(recorder.tokens.lock().unwrap().is_empty());
    assert_eq!(*recorder.completed.lock().unwrap(), vec!["full reply"]);
    assert_eq!(transport.last_payload()["stream"], false);
}

#[tokio::test]
async fn test_missing_field_is_invalid_format() {
    let transport = FakeTransport::with_buffered(
        StreamReply::Chunks(vec![]),
        serde_json::json!({"unexpected": true}),
    );
    let client = client(transport, "m", false);
    let recorder = Recorder::default();

    let outcome = client.generate("x", None, recorder.callbacks()).await.unwrap();

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(
        *recorder.errors.lock().unwrap(),
        vec![ClientError::InvalidResponseFormat.to_string()]
    );
}

#[tokio::test]
async fn test_status_error_fires_only_on_error() {
    let transport = FakeTransport::new(StreamReply::Status(500));
    let client = client(transport, "m", true);
    let recorder = Recorder::default();

    let outcome = client.generate("x", None, recorder.callbacks()).await.unwrap();

    assert_eq!(outcome, Outcome::Failed);
    assert!(recorder.tokens.lock().unwrap().is_empty());
    assert!(recorder.completed.lock().unwrap().is_empty());
    assert_eq!(
        *recorder.errors.lock().unwrap(),
        vec!["HTTP 500: Internal Server Error"]
    );
}

#[tokio::test]
async fn test_line_overflow_terminates_session() {
    let transport = FakeTransport::new(StreamReply::Chunks(vec![
        "{\"response\":\"ok\"}\n",
        "{\"response\":\"this line never ends and keeps growing past the bound",
    ]));
    let client = client(transport, "m", true).max_line_bytes(32);
    let recorder = Recorder::default();

    let outcome = client.generate("x", None, recorder.callbacks()).await.unwrap();

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(*recorder.tokens.lock().unwrap(), vec!["ok"]);
    assert_eq!(recorder.terminal_count(), 1);
}

#[tokio::test]
async fn test_cancel_mid_stream_fires_no_terminal_callback() {
    let transport = FakeTransport::new(StreamReply::ChunksThenHang(vec![
        "{\"response\":\"first\"}\n",
    ]));
    let client = client(transport, "m", true);
    let recorder = Recorder::default();
    let cancel = client.session_token();

    let trigger = cancel.clone();
    let tokens = recorder.tokens.clone();
    let watcher = tokio::spawn(async move {
        while tokens.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        trigger.cancel();
    });

    let outcome = client
        .send_with_cancel(
            Exchange::Generate("x".to_string()),
            None,
            recorder.callbacks(),
            cancel,
        )
        .await
        .unwrap();
    watcher.await.unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(*recorder.tokens.lock().unwrap(), vec!["first"]);
    assert_eq!(recorder.terminal_count(), 0);
    assert!(!client.is_destroyed());
}

#[tokio::test]
async fn test_destroy_cancels_in_flight_sessions() {
    let transport = FakeTransport::new(StreamReply::ChunksThenHang(vec![]));
    let client = Arc::new(client(transport, "m", true));
    let recorder = Recorder::default();

    let destroyer = {
        let client = client.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.destroy();
            client.destroy();
        })
    };

    let outcome = client.generate("x", None, recorder.callbacks()).await.unwrap();
    destroyer.await.unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(recorder.terminal_count(), 0);

    // Later calls on a destroyed client are cancelled up front
    let later = Recorder::default();
    let outcome = client.generate("x", None, later.callbacks()).await.unwrap();
    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(later.terminal_count(), 0);
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let hanging = FakeTransport::new(StreamReply::ChunksThenHang(vec!["{\"response\":\"a\"}\n"]));
    let finishing = FakeTransport::new(StreamReply::Chunks(vec![
        "{\"response\":\"b\"}\n",
        "{\"done\":true}\n",
    ]));
    let slow = client(hanging, "m", true);
    let fast = client(finishing, "m", true);

    let cancelled = Recorder::default();
    let completed = Recorder::default();
    let cancel = slow.session_token();
    let trigger = cancel.clone();

    let (slow_outcome, fast_outcome) = tokio::join!(
        slow.send_with_cancel(
            Exchange::Generate("x".to_string()),
            None,
            cancelled.callbacks(),
            cancel,
        ),
        async {
            let outcome = fast.generate("y", None, completed.callbacks()).await;
            trigger.cancel();
            outcome
        }
    );

    assert_eq!(slow_outcome.unwrap(), Outcome::Cancelled);
    assert_eq!(fast_outcome.unwrap(), Outcome::Completed("b".to_string()));
    assert_eq!(cancelled.terminal_count(), 0);
    assert_eq!(*completed.completed.lock().unwrap(), vec!["b"]);
}

#[tokio::test]
async fn test_sessions_on_one_client_do_not_cancel_each_other() {
    let transport = FakeTransport::new(StreamReply::Chunks(vec![
        "{\"response\":\"same\",\"done\":true}\n",
    ]));
    let client = client(transport, "m", true);

    let first = client.session_token();
    first.cancel();
    let outcome = client
        .send_with_cancel(
            Exchange::Generate("x".to_string()),
            None,
            Recorder::default().callbacks(),
            first,
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Cancelled);

    let outcome = client
        .generate("x", None, Recorder::default().callbacks())
        .await
        .unwrap();
    assert_eq!(outcome.text(), Some("same"));
}

#[tokio::test]
async fn test_idle_timeout_fails_session() {
    let transport = FakeTransport::new(StreamReply::ChunksThenHang(vec![
        "{\"response\":\"stalled\"}\n",
    ]));
    let client = client(transport, "m", true).idle_timeout(Duration::from_millis(50));
    let recorder = Recorder::default();

    let outcome = client.generate("x", None, recorder.callbacks()).await.unwrap();

    assert_eq!(outcome, Outcome::Failed);
    let errors = recorder.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("50ms"), "unexpected error: {}", errors[0]);
}
