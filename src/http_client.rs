//! Shared HTTP client for stream handlers
//!
//! Features:
//! - HTTP/2 when the server offers it, HTTP/1.1 otherwise
//! - TLS 1.3 via rustls
//! - Brotli, Zstd, Gzip compression (auto-negotiated)
//! - Connection pooling with keep-alive
//!
//! No overall request timeout is set: stream bodies are long-lived. A
//! stalled body is detected by the per-read stream timeout, which applies
//! to buffered and direct streams alike.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::SessionOptions;

/// Build the client used to open every stream of a session.
pub fn build_client(options: &SessionOptions) -> Result<Client, reqwest::Error> {
    debug!(
        user_agent = %options.user_agent,
        connect_timeout = ?options.connect_timeout(),
        "Building HTTP client"
    );

    Client::builder()
        // ═══════════════════════════════════════════════════════════════
        // CONNECTIONS
        // ═══════════════════════════════════════════════════════════════
        .http2_adaptive_window(true)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .use_rustls_tls()
        // ═══════════════════════════════════════════════════════════════
        // COMPRESSION (auto-negotiated via Accept-Encoding)
        // ═══════════════════════════════════════════════════════════════
        .brotli(true)
        .zstd(true)
        .gzip(true)
        .deflate(true)
        // ═══════════════════════════════════════════════════════════════
        // IDENTITY, TIMEOUTS, REDIRECTS
        // ═══════════════════════════════════════════════════════════════
        .user_agent(options.user_agent.as_str())
        .connect_timeout(options.connect_timeout())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}
