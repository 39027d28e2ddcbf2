//! HttpProber against a loopback HTTP server.
//!
//! Each test starts a tiny server that answers every connection with a
//! canned response and reports the raw request it received.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use slotguard_probe::*;

struct Canned {
    status_line: &'static str,
    body: String,
    delay: Duration,
}

impl Canned {
    fn new(status_line: &'static str, body: impl Into<String>) -> Self {
        Self {
            status_line,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Serve `canned` on a loopback port; returns the base URL and a channel of
/// raw request heads.
async fn serve(canned: Canned) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            let _ = tx.send(String::from_utf8_lossy(&head).to_string());

            tokio::time::sleep(canned.delay).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                canned.status_line,
                canned.body.len(),
                canned.body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{addr}"), rx)
}

fn prober() -> HttpProber {
    HttpProber::new(TlsConfig::with_webpki_roots().unwrap())
}

#[tokio::test]
async fn success_reports_status_and_latency() {
    let (base, _rx) = serve(Canned::new("200 OK", "[]")).await;

    let result = prober()
        .probe(&format!("{base}/api/products"), Duration::from_secs(2))
        .await;

    match result {
        ProbeResult::Success { status, latency } => {
            assert_eq!(status, 200);
            assert!(latency < Duration::from_secs(2));
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn non_2xx_keeps_body_snippet() {
    let (base, _rx) = serve(Canned::new("503 Service Unavailable", "slot is warming up")).await;

    let result = prober().probe(&base, Duration::from_secs(2)).await;

    assert_eq!(result.status(), Some(503));
    match result {
        ProbeResult::HttpError { body_snippet, .. } => {
            assert_eq!(body_snippet, "slot is warming up");
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn large_error_body_is_truncated() {
    let (base, _rx) = serve(Canned::new("500 Internal Server Error", "e".repeat(4096))).await;

    let result = prober().probe(&base, Duration::from_secs(2)).await;

    match result {
        ProbeResult::HttpError { body_snippet, status, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body_snippet.len(), SNIPPET_LIMIT);
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn redirect_is_an_http_error() {
    let (base, _rx) = serve(Canned::new("302 Found", "")).await;

    let result = prober().probe(&base, Duration::from_secs(2)).await;

    assert_eq!(result.kind(), "http_error");
    assert_eq!(result.status(), Some(302));
}

#[tokio::test]
async fn slow_server_times_out_as_transport_error() {
    let (base, _rx) =
        serve(Canned::new("200 OK", "late").delayed(Duration::from_millis(800))).await;

    let result = prober().probe(&base, Duration::from_millis(100)).await;

    match result {
        ProbeResult::TransportError { error } => assert!(error.contains("timed out")),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn request_carries_path_host_and_user_agent() {
    let (base, mut rx) = serve(Canned::new("200 OK", "ok")).await;
    let authority = base.trim_start_matches("http://").to_string();

    prober()
        .with_user_agent("slotguard-test")
        .probe(&format!("{base}/health?deep=1"), Duration::from_secs(2))
        .await;

    let head = rx.recv().await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /health?deep=1 http/1.1\r\n"));
    assert!(head.contains(&format!("host: {authority}")));
    assert!(head.contains("user-agent: slotguard-test"));
}

#[tokio::test]
async fn sampler_estimates_live_endpoint() {
    let (base, _rx) = serve(Canned::new("200 OK", "ok")).await;
    let sampler = Sampler::new(
        prober(),
        SamplerConfig {
            count: 3,
            timeout: Duration::from_secs(2),
            delay: Duration::from_millis(10),
            retries: 0,
            warmup: true,
            slow_threshold_ms: 1000.0,
        },
    );

    let estimate = sampler.estimate("production", &base).await;

    assert!(estimate.is_present());
    assert_eq!(estimate.samples, 3);
    assert_eq!(estimate.successes, 3);
}
