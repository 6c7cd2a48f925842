//! Shared utilities for integration tests.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, Response, Uri},
    routing::any,
    Router,
};
use futures_util::{stream, StreamExt};
use gemini_relay::config::RelayConfig;
use gemini_relay::{HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

/// A request as the mock upstream saw it.
#[derive(Debug)]
pub struct Captured {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    /// Header names other than `host`, which the client adds itself.
    pub fn forwarded_header_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .headers
            .keys()
            .map(|name| name.as_str().to_string())
            .filter(|name| name != "host")
            .collect();
        names.sort();
        names
    }
}

#[derive(Clone)]
struct Recorder {
    captured: mpsc::UnboundedSender<Captured>,
    respond: fn(&Captured) -> Response<Body>,
}

async fn record(State(recorder): State<Recorder>, request: Request<Body>) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let captured = Captured {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    };
    let response = (recorder.respond)(&captured);
    let _ = recorder.captured.send(captured);
    response
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start a mock upstream that records every request and answers with `respond`.
pub async fn start_recording_upstream(
    respond: fn(&Captured) -> Response<Body>,
) -> (SocketAddr, mpsc::UnboundedReceiver<Captured>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let router = Router::new()
        .route("/{*path}", any(record))
        .route("/", any(record))
        .with_state(Recorder { captured: tx, respond });
    (serve(router).await, rx)
}

/// Start a mock upstream whose response body is fed chunk by chunk from `chunks`.
///
/// The body ends when the sender side is dropped.
pub async fn start_streaming_upstream(chunks: mpsc::UnboundedReceiver<&'static str>) -> SocketAddr {
    let chunks = Arc::new(tokio::sync::Mutex::new(Some(chunks)));
    let router = Router::new().route(
        "/{*path}",
        any(move || {
            let chunks = chunks.clone();
            async move {
                let rx = chunks.lock().await.take().expect("streaming upstream serves one request");
                let body = stream::unfold(rx, |mut rx| async move {
                    rx.recv()
                        .await
                        .map(|chunk| (Ok::<_, Infallible>(Bytes::from_static(chunk.as_bytes())), rx))
                });
                Response::builder()
                    .header("content-type", "text/event-stream")
                    .body(Body::from_stream(body))
                    .unwrap()
            }
        }),
    );
    serve(router).await
}

/// Start the relay pointed at `upstream`. Returns its address and shutdown handle.
pub async fn start_relay(upstream: &str) -> (SocketAddr, Shutdown) {
    let mut config = RelayConfig::default();
    config.upstream.origin = upstream.to_string();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Read from a body stream until `len` bytes have arrived.
pub async fn read_bytes<S>(stream: &mut S, len: usize) -> Vec<u8>
where
    S: futures_util::Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    let mut out = Vec::new();
    while out.len() < len {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for relayed bytes")
            .expect("body ended early")
            .unwrap();
        out.extend_from_slice(&chunk);
    }
    out
}

/// Collects the relay's log lines for the current thread.
///
/// `#[tokio::test]` runs on a current-thread runtime, so the relay and mock
/// servers spawned by a test log through the subscriber installed here.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install a capturing subscriber until the returned guard is dropped.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("gemini_relay=trace")
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    /// Lines containing `needle`.
    pub fn lines_with(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
