//! A session ties the plugin registry, options and HTTP client together.
//!
//! ```rust,no_run
//! use tapline::{Session, SessionOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let session = Session::new(SessionOptions::default())?;
//! let mut stream = session.open_url("https://cdn.example/clip.mp4").await?;
//!
//! let mut out = tokio::io::stdout();
//! stream.copy_to(&mut out, 8192).await?;
//! stream.close().await;
//! # Ok(())
//! # }
//! ```

use thiserror::Error;
use tracing::{debug, info};

use crate::config::SessionOptions;
use crate::http_client::build_client;
use crate::plugin::{OpenContext, PluginRegistry, Resolved};
use crate::stream::{ChunkReader, ReadaheadBuffer, StreamError, StreamHandle};

#[derive(Error, Debug)]
pub enum SessionError {
    /// No handler's patterns matched the URL.
    #[error("No plugin can handle URL: {0}")]
    NoPlugin(String),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct Session {
    registry: PluginRegistry,
    client: reqwest::Client,
    options: SessionOptions,
}

impl Session {
    /// Create a session, loading the builtin handlers and every configured
    /// handler directory as one batch.
    pub fn new(options: SessionOptions) -> Result<Self, SessionError> {
        Self::with_registry(options, PluginRegistry::new())
    }

    /// Create a session around an existing registry.
    pub fn with_registry(
        options: SessionOptions,
        registry: PluginRegistry,
    ) -> Result<Self, SessionError> {
        let client = build_client(&options)?;

        if registry.load_sources(options.builtin_plugins, &options.plugin_dirs) {
            info!("Loaded {} plugins", registry.len());
        }

        Ok(Self {
            registry,
            client,
            options,
        })
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Resolve `url` to its handler.
    pub fn resolve_url(&self, url: &str) -> Result<Resolved, SessionError> {
        self.registry
            .resolve(url)
            .ok_or_else(|| SessionError::NoPlugin(url.to_string()))
    }

    /// Resolve `url`, open its source and wrap it according to
    /// [`SessionOptions::buffered`].
    pub async fn open_url(&self, url: &str) -> Result<StreamHandle, SessionError> {
        let resolved = self.resolve_url(url)?;
        self.open_resolved(url, resolved, self.options.buffered).await
    }

    /// Open an already resolved URL.
    pub async fn open_resolved(
        &self,
        url: &str,
        resolved: Resolved,
        buffered: bool,
    ) -> Result<StreamHandle, SessionError> {
        let ctx = OpenContext {
            client: self.client.clone(),
            matcher: resolved.matcher,
            captures: resolved.captures,
            headers: self.options.headers.clone(),
        };

        debug!(plugin = %resolved.name, buffered, "Opening stream for {url}");
        let source = resolved.handler.open(url, &ctx).await?;
        let reader = ChunkReader::new(source);

        if !buffered {
            let reader = reader.with_timeout(self.options.stream_timeout());
            return Ok(StreamHandle::Direct(reader));
        }
        let buffer = ReadaheadBuffer::new(reader, self.options.readahead());
        buffer.open()?;
        Ok(StreamHandle::Buffered(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::plugin::{Handler, Matchers};
    use crate::stream::ChunkSource;

    struct Echo {
        matchers: Matchers,
    }

    #[async_trait]
    impl Handler for Echo {
        fn matchers(&self) -> &Matchers {
            &self.matchers
        }

        async fn open(&self, _url: &str, ctx: &OpenContext) -> Result<ChunkSource, StreamError> {
            let id = ctx.capture("id").unwrap_or("none").to_string();
            Ok(ChunkSource::from_chunks(vec![Ok(Bytes::from(id))]))
        }
    }

    struct Stalled {
        matchers: Matchers,
    }

    #[async_trait]
    impl Handler for Stalled {
        fn matchers(&self) -> &Matchers {
            &self.matchers
        }

        async fn open(&self, _url: &str, _ctx: &OpenContext) -> Result<ChunkSource, StreamError> {
            Ok(ChunkSource::new(futures::stream::pending()))
        }
    }

    fn session(buffered: bool) -> Session {
        let options = SessionOptions {
            buffered,
            builtin_plugins: false,
            ..SessionOptions::default()
        };
        let session = Session::new(options).unwrap();
        session.registry().register(
            "echo",
            Arc::new(Echo {
                matchers: Matchers::from_patterns([r"^echo://(?P<id>\w+)"]).unwrap(),
            }),
        );
        session
    }

    #[tokio::test]
    async fn unsupported_url_is_reported() {
        let err = session(true).open_url("ftp://unrelated/path").await.unwrap_err();
        assert!(matches!(err, SessionError::NoPlugin(ref url) if url == "ftp://unrelated/path"));
        assert_eq!(err.to_string(), "No plugin can handle URL: ftp://unrelated/path");
    }

    #[tokio::test]
    async fn captures_reach_the_handler() {
        for buffered in [true, false] {
            let mut stream = session(buffered).open_url("echo://abc").await.unwrap();
            assert_eq!(stream.is_buffered(), buffered);

            let mut out = Vec::new();
            stream.copy_to(&mut out, 16).await.unwrap();
            assert_eq!(out, b"abc");
            stream.close().await;
        }
    }

    #[tokio::test]
    async fn stalled_source_times_out_in_both_modes() {
        for buffered in [true, false] {
            let options = SessionOptions {
                buffered,
                builtin_plugins: false,
                stream_timeout_secs: 1,
                ..SessionOptions::default()
            };
            let session = Session::new(options).unwrap();
            session.registry().register(
                "stalled",
                Arc::new(Stalled {
                    matchers: Matchers::from_patterns([r"^stall://"]).unwrap(),
                }),
            );

            let mut stream = session.open_url("stall://x").await.unwrap();
            let err = tokio::time::timeout(std::time::Duration::from_secs(5), stream.read(64))
                .await
                .expect("read must give up on its own")
                .unwrap_err();
            assert!(err.is_timeout(), "buffered={buffered}: {err}");

            stream.close().await;
            assert!(matches!(stream.read(64).await, Err(StreamError::Closed)));
        }
    }

    #[tokio::test]
    async fn builtin_handlers_are_loaded_by_default() {
        let session = Session::new(SessionOptions::default()).unwrap();
        assert_eq!(session.registry().names(), ["dash", "hls", "http"]);
        assert_eq!(session.resolve_url("https://a.example/x.mp4").unwrap().name, "http");
    }

    #[tokio::test]
    async fn adaptive_open_failure_surfaces() {
        let session = Session::new(SessionOptions::default()).unwrap();
        let err = session
            .open_url("https://a.example/master.m3u8")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Stream(StreamError::Open(_))));
    }
}
