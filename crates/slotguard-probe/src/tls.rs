//! TLS client configuration for https probes.

use std::sync::Arc;

const HTTP1_ALPN: &[u8] = b"http/1.1";

/// Client TLS settings shared by every https probe.
#[derive(Clone)]
pub struct TlsConfig {
    /// Pre-built `rustls` client configuration.
    pub client_config: Arc<rustls::ClientConfig>,
}

impl TlsConfig {
    /// Mozilla roots, ring crypto, and ALPN pinned to `http/1.1`.
    ///
    /// Probes only speak HTTP/1.1, so the handshake must never settle on h2.
    pub fn with_webpki_roots() -> Result<Self, String> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let mut config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| format!("tls protocol version error: {e}"))?
        .with_root_certificates(root_store)
        .with_no_client_auth();
        config.alpn_protocols = vec![HTTP1_ALPN.to_vec()];

        Ok(Self {
            client_config: Arc::new(config),
        })
    }
}

impl From<Arc<rustls::ClientConfig>> for TlsConfig {
    fn from(client_config: Arc<rustls::ClientConfig>) -> Self {
        Self { client_config }
    }
}
