//! Single timed HTTP probe.
//!
//! A probe is exactly one GET. Its latency runs from the start of the
//! request to the moment the status line has been read. Every failure is
//! folded into a [`ProbeResult`]; nothing here returns an error or retries.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{CONNECTION, HOST, USER_AGENT};
use http::{Method, Request, Response, Uri};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tracing::debug;

use crate::tls::TlsConfig;

/// Upper bound, in bytes, on retained response bodies and error messages.
pub const SNIPPET_LIMIT: usize = 240;

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The endpoint answered with a 2xx status.
    Success { latency: Duration, status: u16 },
    /// The endpoint answered with a non-2xx status.
    HttpError {
        latency: Duration,
        status: u16,
        body_snippet: String,
    },
    /// No status line was received: DNS, connect, TLS, or timeout failure.
    TransportError { error: String },
}

impl ProbeResult {
    /// Build a transport error with a truncated message.
    pub fn transport(error: impl AsRef<str>) -> Self {
        Self::TransportError {
            error: truncate_snippet(error.as_ref()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Latency of a successful probe.
    pub fn success_latency(&self) -> Option<Duration> {
        match self {
            Self::Success { latency, .. } => Some(*latency),
            _ => None,
        }
    }

    /// Latency of any probe that got a status line.
    pub fn latency(&self) -> Option<Duration> {
        match self {
            Self::Success { latency, .. } | Self::HttpError { latency, .. } => Some(*latency),
            Self::TransportError { .. } => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } | Self::HttpError { status, .. } => Some(*status),
            Self::TransportError { .. } => None,
        }
    }

    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::HttpError { .. } => "http_error",
            Self::TransportError { .. } => "transport_error",
        }
    }
}

/// Boxed future returned by [`Prober::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>>;

/// Issues one probe against a URL. Injected so samplers can be tested
/// without a network.
pub trait Prober: Send + Sync {
    /// Probe `url` once, giving up after `timeout`.
    fn probe<'a>(&'a self, url: &'a str, timeout: Duration) -> ProbeFuture<'a>;
}

impl<P: Prober + ?Sized> Prober for Arc<P> {
    fn probe<'a>(&'a self, url: &'a str, timeout: Duration) -> ProbeFuture<'a> {
        (**self).probe(url, timeout)
    }
}

/// Prober backed by hyper over a fresh TCP (or TLS) connection per probe.
#[derive(Clone)]
pub struct HttpProber {
    tls: TlsConfig,
    user_agent: String,
}

impl HttpProber {
    pub fn new(tls: TlsConfig) -> Self {
        Self {
            tls,
            user_agent: concat!("slotguard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Override the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    async fn get(&self, url: &str, timeout: Duration) -> ProbeResult {
        let target = match ProbeTarget::parse(url) {
            Ok(t) => t,
            Err(e) => {
                debug!(%url, error = %e, "probe url rejected");
                return ProbeResult::transport(e);
            }
        };

        let started = Instant::now();
        let response = match tokio::time::timeout(timeout, self.send(&target)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                debug!(%url, error = %e, "probe failed");
                return ProbeResult::transport(e);
            }
            Err(_) => {
                debug!(%url, timeout_ms = timeout.as_millis() as u64, "probe timed out");
                return ProbeResult::transport(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                ));
            }
        };
        let latency = started.elapsed();
        let status = response.status();

        if status.is_success() {
            return ProbeResult::Success {
                latency,
                status: status.as_u16(),
            };
        }

        debug!(%url, %status, "probe non-2xx");
        let body_snippet = read_snippet(response.into_body(), timeout.saturating_sub(latency)).await;
        ProbeResult::HttpError {
            latency,
            status: status.as_u16(),
            body_snippet,
        }
    }

    async fn send(&self, target: &ProbeTarget) -> Result<Response<Incoming>, String> {
        let stream = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(|e| format!("connect {}: {e}", target.authority))?;

        if target.tls {
            let server_name = ServerName::try_from(target.host.as_str())
                .map_err(|e| format!("invalid tls server name {}: {e}", target.host))?
                .to_owned();
            let connector = tokio_rustls::TlsConnector::from(self.tls.client_config.clone());
            let stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| format!("tls handshake with {}: {e}", target.authority))?;
            self.request(TokioIo::new(stream), target).await
        } else {
            self.request(TokioIo::new(stream), target).await
        }
    }

    async fn request<I>(&self, io: I, target: &ProbeTarget) -> Result<Response<Incoming>, String>
    where
        I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("http handshake: {e}"))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "probe connection closed with error");
            }
        });

        let req = Request::builder()
            .method(Method::GET)
            .uri(target.path_and_query.as_str())
            .header(HOST, target.authority.as_str())
            .header(USER_AGENT, self.user_agent.as_str())
            .header(CONNECTION, "close")
            .body(Empty::<Bytes>::new())
            .map_err(|e| format!("build request: {e}"))?;

        sender
            .send_request(req)
            .await
            .map_err(|e| format!("request: {e}"))
    }
}

impl Prober for HttpProber {
    fn probe<'a>(&'a self, url: &'a str, timeout: Duration) -> ProbeFuture<'a> {
        Box::pin(self.get(url, timeout))
    }
}

/// Connection details extracted from an absolute probe URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProbeTarget {
    tls: bool,
    host: String,
    port: u16,
    authority: String,
    path_and_query: String,
}

impl ProbeTarget {
    fn parse(url: &str) -> Result<Self, String> {
        let uri: Uri = url.parse().map_err(|e| format!("invalid url {url:?}: {e}"))?;

        let tls = match uri.scheme_str() {
            Some("http") => false,
            Some("https") => true,
            Some(other) => return Err(format!("unsupported scheme {other:?}")),
            None => return Err(format!("url {url:?} is not absolute")),
        };
        let authority = uri
            .authority()
            .ok_or_else(|| format!("url {url:?} has no host"))?;
        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = authority.port_u16().unwrap_or(if tls { 443 } else { 80 });
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
            .to_string();

        Ok(Self {
            tls,
            host,
            port,
            authority: authority.as_str().to_string(),
            path_and_query,
        })
    }
}

/// Read at most [`SNIPPET_LIMIT`] bytes of a response body within `budget`.
async fn read_snippet(mut body: Incoming, budget: Duration) -> String {
    let mut buf: Vec<u8> = Vec::with_capacity(SNIPPET_LIMIT);
    let _ = tokio::time::timeout(budget, async {
        while buf.len() < SNIPPET_LIMIT {
            match body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        let take = (SNIPPET_LIMIT - buf.len()).min(data.len());
                        buf.extend_from_slice(&data[..take]);
                    }
                }
                Some(Err(e)) => {
                    debug!(error = %e, "error reading probe body");
                    break;
                }
                None => break,
            }
        }
    })
    .await;
    truncate_snippet(&String::from_utf8_lossy(&buf))
}

/// Trim `text` and cut it to at most [`SNIPPET_LIMIT`] bytes on a char boundary.
pub fn truncate_snippet(text: &str) -> String {
    let text = text.trim();
    if text.len() <= SNIPPET_LIMIT {
        return text.to_string();
    }
    let mut end = SNIPPET_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
