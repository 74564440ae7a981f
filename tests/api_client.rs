//! End-to-end checks of the HTTP client against a loopback server

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use menu_chat::api::streaming::StreamHandler;
use menu_chat::api::{ApiClient, ApiError, Backoff, ChatApi};
use menu_chat::chat::{ChatSession, SendOutcome};
use menu_chat::types::config::ClientConfig;
use menu_chat::types::payload::{ChatRequest, CompletedStream};

struct Reply {
    status: u16,
    content_type: &'static str,
    parts: Vec<Vec<u8>>,
}

impl Reply {
    fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            parts: vec![body.as_bytes().to_vec()],
        }
    }

    fn events(parts: Vec<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            parts,
        }
    }
}

type Requests = Arc<Mutex<Vec<String>>>;

/// Serves `replies` in order, one connection each, and records the raw requests
async fn serve(replies: Vec<Reply>) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        for reply in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            seen.lock().unwrap().push(request);

            let head = format!(
                "HTTP/1.1 {} Scripted\r\ncontent-type: {}\r\nconnection: close\r\n\r\n",
                reply.status, reply.content_type
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for part in reply.parts {
                socket.write_all(&part).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let _ = socket.shutdown().await;
        }
    });

    (url, requests)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

fn client(url: &str) -> ApiClient {
    let config = ClientConfig {
        request_timeout: Duration::from_secs(2),
        ..ClientConfig::new(url)
    };
    ApiClient::new(config)
        .unwrap()
        .with_backoff(RecordingBackoff::default())
}

fn request(message: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        conversation_id: None,
        history: Vec::new(),
    }
}

#[derive(Clone, Default)]
struct RecordingBackoff {
    waits: Rc<RefCell<Vec<Duration>>>,
}

#[async_trait(?Send)]
impl Backoff for RecordingBackoff {
    async fn wait(&self, delay: Duration) {
        self.waits.borrow_mut().push(delay);
    }
}

#[derive(Default)]
struct Collect {
    chunks: Vec<String>,
    completed: u32,
    errors: u32,
}

impl StreamHandler for Collect {
    fn on_chunk(&mut self, delta: &str) {
        self.chunks.push(delta.to_string());
    }

    fn on_complete(&mut self, _stream: &CompletedStream) {
        self.completed += 1;
    }

    fn on_error(&mut self, _error: &ApiError) {
        self.errors += 1;
    }
}

async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

#[tokio::test]
async fn test_send_chat_success() {
    let body = r#"{"response":"전주비빔밥 추천","sources":[],"recommended_menus":[{"restaurant":"가족회관","menu":"전주비빔밥","price":13000}],"conversation_id":"abc","timestamp":"2024-05-01T12:00:00"}"#;
    let (url, requests) = serve(vec![Reply::json(200, body)]).await;

    let response = client(&url).send_chat(&request("점심 메뉴 추천해줘")).await.unwrap();

    assert_eq!(response.response, "전주비빔밥 추천");
    assert_eq!(response.conversation_id, "abc");
    assert_eq!(response.recommended_menus[0].price, Some(13000));

    let raw = requests.lock().unwrap()[0].clone();
    assert!(raw.starts_with("POST /chat HTTP/1.1"));
    assert!(raw.contains("점심 메뉴 추천해줘"));
}

#[tokio::test]
async fn test_send_chat_rejects_malformed_body() {
    let (url, _) = serve(vec![Reply::json(200, r#"{"response":"missing fields"}"#)]).await;

    let err = client(&url).send_chat(&request("hi")).await.unwrap_err();

    assert!(matches!(err, ApiError::Validation(_)));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_send_chat_server_error() {
    let (url, _) = serve(vec![Reply::json(500, r#"{"detail":"boom"}"#)]).await;

    let err = client(&url).send_chat(&request("hi")).await.unwrap_err();

    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_send_chat_unreachable() {
    let url = closed_port_url().await;

    let err = client(&url).send_chat(&request("hi")).await.unwrap_err();

    assert!(matches!(err, ApiError::Network(_)));
}

#[tokio::test]
async fn test_send_chat_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(socket);
    });

    let config = ClientConfig {
        request_timeout: Duration::from_secs(1),
        ..ClientConfig::new(&url)
    };
    let err = ApiClient::new(config)
        .unwrap()
        .send_chat(&request("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Timeout(1)));
}

#[tokio::test]
async fn test_stream_chat_reassembles_split_reads() {
    let body = "data: {\"content\":\"한식\"}\n\ndata: {\"content\":\" 추천\"}\n\ndata: {\"done\":true,\"conversation_id\":\"conv-1\"}\n\n";
    let bytes = body.as_bytes();
    // cut inside the first multibyte character and inside the second event
    let parts = vec![bytes[..20].to_vec(), bytes[20..35].to_vec(), bytes[35..].to_vec()];
    let (url, requests) = serve(vec![Reply::events(parts)]).await;

    let mut handler = Collect::default();
    let done = client(&url)
        .stream_chat(&request("한식 추천"), &mut handler)
        .await
        .unwrap();

    assert_eq!(done.content, "한식 추천");
    assert_eq!(done.conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(handler.chunks, vec!["한식", " 추천"]);
    assert_eq!(handler.completed, 1);
    assert_eq!(handler.errors, 0);

    let raw = requests.lock().unwrap()[0].to_ascii_lowercase();
    assert!(raw.starts_with("post /chat/stream http/1.1"));
    assert!(raw.contains("accept: text/event-stream"));
}

#[tokio::test]
async fn test_stream_chat_retries_after_server_error() {
    let body = b"data: {\"content\":\"ok\"}\n\ndata: {\"done\":true}\n\n".to_vec();
    let (url, requests) = serve(vec![
        Reply::json(503, "unavailable"),
        Reply::events(vec![body]),
    ])
    .await;

    let backoff = RecordingBackoff::default();
    let api = ApiClient::new(ClientConfig::new(&url))
        .unwrap()
        .with_backoff(backoff.clone());
    let mut handler = Collect::default();
    let done = api.stream_chat(&request("hi"), &mut handler).await.unwrap();

    assert_eq!(done.content, "ok");
    assert_eq!(requests.lock().unwrap().len(), 2);
    assert_eq!(*backoff.waits.borrow(), vec![Duration::from_secs(2)]);
    assert_eq!(handler.errors, 0);
}

#[tokio::test]
async fn test_session_falls_back_when_stream_unavailable() {
    let answer = r#"{"response":"전주비빔밥 추천","conversation_id":"abc","timestamp":"2024-05-01T12:00:00"}"#;
    let (url, requests) = serve(vec![
        Reply::json(503, "down"),
        Reply::json(503, "down"),
        Reply::json(503, "down"),
        Reply::json(200, answer),
    ])
    .await;

    let session = ChatSession::new(client(&url));
    let outcome = session.send_message("점심 메뉴 추천해줘", true).await;

    assert_eq!(outcome, SendOutcome::Completed);
    let messages = session.messages();
    assert_eq!(messages[1].content, "전주비빔밥 추천");
    assert_eq!(session.conversation_id().as_deref(), Some("abc"));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    assert!(requests[3].starts_with("POST /chat HTTP/1.1"));
}

#[tokio::test]
async fn test_health_check() {
    let (url, requests) = serve(vec![Reply::json(200, r#"{"status":"ok"}"#)]).await;
    assert!(client(&url).health_check().await);
    assert!(requests.lock().unwrap()[0].starts_with("GET /health HTTP/1.1"));

    let (url, _) = serve(vec![Reply::json(503, "starting")]).await;
    assert!(!client(&url).health_check().await);

    let url = closed_port_url().await;
    assert!(!client(&url).health_check().await);
}
