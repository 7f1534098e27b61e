//! Integration tests for the chat client against a local HTTP server.
//!
//! Each test starts a one-shot HTTP/1.1 server on a loopback port that
//! replays a scripted response, then drives `ChatClient` against it.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tp_backend::{ChatClient, StreamHandler, Transcript, TransportError};
use tp_protocol::{EventKind, SessionId, StreamEvent};

/// One step of a scripted response.
enum Step {
    Send(Vec<u8>),
    Pause(u64),
}

fn send(text: &str) -> Step {
    Step::Send(text.as_bytes().to_vec())
}

const STREAM_HEAD: &str =
    "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

/// Received request: request line and body.
struct Captured {
    request_line: String,
    body: String,
}

/// Read one request, replay `steps`, close. Returns the base URL.
async fn serve_once(steps: Vec<Step>) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        for step in steps {
            match step {
                Step::Send(bytes) => {
                    if socket.write_all(&bytes).await.is_err() {
                        break;
                    }
                    let _ = socket.flush().await;
                }
                Step::Pause(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            }
        }
        let _ = socket.shutdown().await;

        Captured {
            request_line: head.lines().next().unwrap_or_default().to_string(),
            body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
        }
    });

    (format!("http://{addr}"), handle)
}

fn session() -> SessionId {
    SessionId::new("session_1760000000000_abcdefghi")
}

#[tokio::test]
async fn streams_itinerary_over_http() {
    let (url, server) = serve_once(vec![
        send(STREAM_HEAD),
        send("data: {\"type\":\"tool_call\",\"content\":\"Searching\",\"metadata\":{\"tool_name\":\"get_weather\"}}\n"),
        Step::Pause(20),
        send("data: {\"type\":\"tool_result\",\"content\":\"Found 3 results\"}\n: keep-alive\n"),
        send("data: {\"type\":\"token\",\"content\":\"Day 1: \"}\ndata: {\"type\":\"tok"),
        Step::Pause(20),
        send("en\",\"content\":\"Visit the museum.\"}\n"),
    ])
    .await;

    let client = ChatClient::new(url).unwrap();
    let mut transcript = Transcript::new();
    client
        .stream_chat(&session(), "Plan a day in Hangzhou", &mut transcript)
        .await;

    assert_eq!(transcript.events.len(), 4);
    assert_eq!(transcript.events[0].kind, EventKind::ToolCall);
    assert_eq!(
        transcript.events[0]
            .metadata
            .as_ref()
            .and_then(|m| m.tool_name()),
        Some("get_weather")
    );
    assert_eq!(
        transcript.final_text(),
        Some("\nSearching\nFound 3 results\n\nDay 1: Visit the museum.")
    );

    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "POST /chat/stream HTTP/1.1");
    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["session_id"], "session_1760000000000_abcdefghi");
    assert_eq!(body["input"], "Plan a day in Hangzhou");
}

#[tokio::test]
async fn multibyte_text_split_across_writes() {
    let line = "data: {\"type\":\"final\",\"content\":\"西湖一日游\"}\n".as_bytes();
    let split = line.len() - 8;
    let (url, _server) = serve_once(vec![
        send(STREAM_HEAD),
        Step::Send(line[..split].to_vec()),
        Step::Pause(20),
        Step::Send(line[split..].to_vec()),
    ])
    .await;

    let client = ChatClient::new(url).unwrap();
    let mut transcript = Transcript::new();
    client.stream_chat(&session(), "plan", &mut transcript).await;

    assert_eq!(transcript.final_text(), Some("西湖一日游"));
}

#[tokio::test]
async fn error_status_reports_transport_error() {
    let (url, _server) = serve_once(vec![send(
        "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 5\r\nconnection: close\r\n\r\noops!",
    )])
    .await;

    let client = ChatClient::new(url).unwrap();
    let mut transcript = Transcript::new();
    client.stream_chat(&session(), "plan", &mut transcript).await;

    assert!(transcript.events.is_empty());
    match transcript.error() {
        Some(TransportError::Status { status, body }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "oops!");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn truncated_body_reports_transport_error() {
    let (url, _server) = serve_once(vec![
        send("HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 4096\r\n\r\n"),
        send("data: {\"type\":\"token\",\"content\":\"Day 1\"}\n"),
        Step::Pause(20),
    ])
    .await;

    let client = ChatClient::new(url).unwrap();
    let mut transcript = Transcript::new();
    client.stream_chat(&session(), "plan", &mut transcript).await;

    assert_eq!(transcript.events, vec![StreamEvent::token("Day 1")]);
    assert!(transcript.final_text().is_none());
    assert!(matches!(
        transcript.error(),
        Some(TransportError::Interrupted(_))
    ));
}

#[tokio::test]
async fn connection_refused_reports_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ChatClient::new(format!("http://{addr}")).unwrap();
    let mut transcript = Transcript::new();
    client.stream_chat(&session(), "plan", &mut transcript).await;

    assert!(transcript.events.is_empty());
    assert!(matches!(transcript.error(), Some(TransportError::Http(_))));
}

/// Counts terminal callbacks.
#[derive(Default)]
struct Terminals {
    events: usize,
    terminals: usize,
}

impl StreamHandler for Terminals {
    fn on_event(&mut self, _event: &StreamEvent) {
        self.events += 1;
    }

    fn on_complete(&mut self, _final_text: String) {
        self.terminals += 1;
    }

    fn on_error(&mut self, _error: TransportError) {
        self.terminals += 1;
    }
}

#[tokio::test]
async fn caller_deadline_cancels_ingestion() {
    let (url, server) = serve_once(vec![
        send(STREAM_HEAD),
        send("data: {\"type\":\"token\",\"content\":\"Day 1\"}\n"),
        Step::Pause(5_000),
        send("data: {\"type\":\"token\",\"content\":\"never seen\"}\n"),
    ])
    .await;

    let client = ChatClient::new(url).unwrap();
    let mut handler = Terminals::default();
    let result = tokio::time::timeout(
        Duration::from_millis(300),
        client.stream_chat(&session(), "plan", &mut handler),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(handler.events, 1);
    assert_eq!(handler.terminals, 0);
    server.abort();
}

#[tokio::test]
async fn non_streaming_chat() {
    let body = r#"{"response":"Day 1: West Lake"}"#;
    let (url, server) = serve_once(vec![send(&format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    ))])
    .await;

    let client = ChatClient::new(url).unwrap();
    let response = client
        .send_chat_message(&session(), "Plan a day in Hangzhou")
        .await
        .unwrap();

    assert_eq!(response.response, "Day 1: West Lake");
    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "POST /chat HTTP/1.1");
}
