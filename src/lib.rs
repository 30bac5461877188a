//! `tapline` - resolve URLs to stream handlers and read their bytes
//!
//! # Features
//!
//! - **Plugin registry**: handlers matched by ordered regex patterns, with
//!   site-specific handlers always resolved ahead of the generic `hls`,
//!   `dash` and `http` fallbacks
//! - **Handler directories**: TOML manifests loaded as one batch, bad
//!   files logged and skipped
//! - **Readahead buffering**: a background fill task behind a bounded
//!   queue, with read timeouts distinct from end of stream and errors
//!
//! # Example
//!
//! ```rust,no_run
//! use tapline::{PluginRegistry, Session, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = PluginRegistry::with_builtin();
//!     if let Some(hit) = registry.resolve("https://cdn.example/clip.mp4") {
//!         println!("handled by {}", hit.name);
//!     }
//!
//!     let session = Session::new(SessionOptions::default())?;
//!     let mut stream = session.open_url("https://cdn.example/clip.mp4").await?;
//!     while !stream.read(8192).await?.is_empty() {}
//!     stream.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod http_client;
pub mod plugin;
pub mod session;
pub mod stream;

pub use config::{load_options, SessionOptions};
pub use plugin::{Handler, LoadError, Matcher, Matchers, OpenContext, PluginRegistry, Resolved};
pub use session::{Session, SessionError};
pub use stream::{
    BufferState, ChunkReader, ChunkSource, ReadaheadBuffer, ReadaheadOptions, StreamError,
    StreamHandle,
};

/// Version of tapline
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
