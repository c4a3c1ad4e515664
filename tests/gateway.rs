mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gateway_api::{GatewayClient, GatewayConfig};
use pretty_assertions::assert_eq;
use stream_chat::{Message, Role, SessionId, StreamOutcome, StreamRuntime};
use support::{lock_unpoisoned, plain_model};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One canned HTTP response, written as separately flushed chunks.
#[derive(Clone)]
struct Reply {
    status: u16,
    content_type: &'static str,
    chunks: Vec<(Duration, Vec<u8>)>,
}

impl Reply {
    fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            chunks: vec![(Duration::ZERO, body.as_bytes().to_vec())],
        }
    }

    fn events(chunks: &[&[u8]]) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            chunks: chunks
                .iter()
                .map(|chunk| (Duration::ZERO, chunk.to_vec()))
                .collect(),
        }
    }

    fn then_after(mut self, delay: Duration, chunk: &[u8]) -> Self {
        self.chunks.push((delay, chunk.to_vec()));
        self
    }
}

/// Loopback HTTP server answering requests with `replies` in order.
struct Backend {
    base_url: String,
    paths: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl Backend {
    /// `None` when the sandbox refuses a loopback listener.
    async fn start(replies: Vec<Reply>) -> Option<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let base_url = format!("http://{}", listener.local_addr().ok()?);
        let paths = Arc::new(Mutex::new(Vec::new()));
        let replies = Arc::new(Mutex::new(replies.into_iter()));

        let handle = tokio::spawn({
            let paths = Arc::clone(&paths);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let paths = Arc::clone(&paths);
                    let replies = Arc::clone(&replies);
                    tokio::spawn(async move { serve(socket, paths, replies).await });
                }
            }
        });

        Some(Self {
            base_url,
            paths,
            handle,
        })
    }

    fn runtime(&self) -> StreamRuntime {
        let config = GatewayConfig::new(&self.base_url).with_session_cookie("access_token=old");
        let client = GatewayClient::new(config).expect("client");
        StreamRuntime::new(Arc::new(client))
    }

    fn paths(&self) -> Vec<String> {
        lock_unpoisoned(&self.paths).clone()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    mut socket: TcpStream,
    paths: Arc<Mutex<Vec<String>>>,
    replies: Arc<Mutex<std::vec::IntoIter<Reply>>>,
) {
    let Some(request_line) = read_request(&mut socket).await else {
        return;
    };
    lock_unpoisoned(&paths).push(request_line);
    let reply = lock_unpoisoned(&replies)
        .next()
        .unwrap_or_else(|| Reply::json(500, r#"{"error":"unexpected request"}"#));

    let head = format!(
        "HTTP/1.1 {} X\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        reply.status, reply.content_type
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for (delay, bytes) in reply.chunks {
        tokio::time::sleep(delay).await;
        let frame = [
            format!("{:X}\r\n", bytes.len()).into_bytes(),
            bytes,
            b"\r\n".to_vec(),
        ]
        .concat();
        if socket.write_all(&frame).await.is_err() || socket.flush().await.is_err() {
            return;
        }
    }
    let _ = socket.write_all(b"0\r\n\r\n").await;
    let _ = socket.shutdown().await;
}

/// Read one request and return its `METHOD path` line.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];
    let header_end = loop {
        let n = socket.read(&mut buffer).await.ok()?;
        if n == 0 {
            return None;
        }
        request.extend_from_slice(&buffer[..n]);
        if let Some(position) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..header_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while request.len() < header_end + content_length {
        let n = socket.read(&mut buffer).await.ok()?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..n]);
    }

    let mut parts = head.lines().next()?.split_whitespace();
    Some(format!("{} {}", parts.next()?, parts.next()?))
}

fn assistant_reply(runtime: &StreamRuntime) -> Option<String> {
    runtime
        .snapshot()
        .messages
        .into_iter()
        .rev()
        .find(|message| message.role == Role::Assistant)
        .map(|message| message.content)
}

fn send(runtime: &StreamRuntime, prompt: &str) -> stream_chat::StreamCompletion {
    runtime.with_controller(|controller| controller.push_message(Message::user(prompt)));
    runtime.start_stream(prompt, &plain_model(), &SessionId::new("S1"), None)
}

#[tokio::test]
async fn gateway_body_streams_into_the_runtime() {
    let body = "data: {\"thought\":true,\"content\":\"plan\"}\ndata: {\"content\":\"Hé\"}\ndata: {\"content\":\"llo\"}\n";
    let bytes = body.as_bytes();
    let split = body.find('é').expect("multibyte char") + 1;
    let Some(backend) = Backend::start(vec![Reply::events(&[&bytes[..split], &bytes[split..]])
        .then_after(Duration::from_millis(20), b"data: {\"type\":\"stream_end\"}\n")])
    .await
    else {
        return;
    };
    let runtime = backend.runtime();

    assert_eq!(send(&runtime, "hi").await, StreamOutcome::Completed);

    assert_eq!(
        assistant_reply(&runtime).as_deref(),
        Some("<think>plan</think>Héllo")
    );
    assert_eq!(runtime.snapshot().last_error, None);
    assert_eq!(backend.paths(), vec!["POST /api/chat/stream"]);
}

#[tokio::test]
async fn expired_session_is_refreshed_before_streaming() {
    let Some(backend) = Backend::start(vec![
        Reply::json(401, r#"{"detail":"expired"}"#),
        Reply::json(200, r#"{"status":"refresh_required"}"#),
        Reply::json(200, r#"{"status":"Success"}"#),
        Reply::events(&[&b"data: {\"content\":\"ok\"}\ndata: {\"type\":\"stream_end\"}\n"[..]]),
    ])
    .await
    else {
        return;
    };
    let runtime = backend.runtime();

    assert_eq!(send(&runtime, "hi").await, StreamOutcome::Completed);

    assert_eq!(assistant_reply(&runtime).as_deref(), Some("ok"));
    assert_eq!(
        backend.paths(),
        vec![
            "POST /api/chat/stream",
            "GET /auth/check",
            "POST /auth/refresh",
            "POST /api/chat/stream",
        ]
    );
}

#[tokio::test]
async fn gateway_status_error_is_annotated() {
    let Some(backend) = Backend::start(vec![Reply::json(
        500,
        r#"{"error":{"message":"backend exploded"}}"#,
    )])
    .await
    else {
        return;
    };
    let runtime = backend.runtime();

    let outcome = send(&runtime, "hi").await;

    assert_eq!(
        outcome,
        StreamOutcome::Failed("API Error 500: backend exploded".to_owned())
    );
    assert_eq!(
        assistant_reply(&runtime).as_deref(),
        Some("[API Error 500: backend exploded]")
    );
}

#[tokio::test]
async fn abort_stops_a_slow_gateway_body() {
    let Some(backend) = Backend::start(vec![Reply::events(&[&b"data: {\"content\":\"first\"}\n"[..]])
        .then_after(Duration::from_secs(5), b"data: {\"content\":\" late\"}\n")])
    .await
    else {
        return;
    };
    let runtime = backend.runtime();

    let completion = send(&runtime, "hi");
    let mut changes = runtime.subscribe();
    while assistant_reply(&runtime).as_deref() != Some("first") {
        tokio::time::timeout(Duration::from_secs(2), changes.changed())
            .await
            .expect("first chunk should arrive")
            .expect("runtime alive");
    }

    assert!(runtime.abort_stream("stopped by user"));
    let outcome = tokio::time::timeout(Duration::from_secs(1), completion)
        .await
        .expect("abort should resolve before the slow chunk");

    assert_eq!(outcome, StreamOutcome::Aborted("stopped by user".to_owned()));
    assert_eq!(runtime.snapshot().streaming_session, None);
    assert_eq!(
        assistant_reply(&runtime).as_deref().map(|reply| reply.starts_with("first")),
        Some(true)
    );
}
