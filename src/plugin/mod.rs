//! Stream handler plugins.
//!
//! A handler recognizes URLs through an ordered set of regex matchers and
//! opens a [`ChunkSource`](crate::stream::ChunkSource) for the ones it
//! accepts. The [`PluginRegistry`] holds handlers by name and resolves a
//! URL to exactly one of them.
//!
//! # Handler directories
//!
//! Handlers can be loaded from a directory of TOML manifests. The file stem
//! is the handler name:
//!
//! ```toml
//! # ~/.config/tapline/plugins/sitea.toml
//! [plugin]
//! kind = "http"
//! url = "https://cdn.sitea.example/{id}.mp4"
//!
//! [[plugin.matchers]]
//! name = "video"
//! pattern = '^https://sitea\.example/video/(?P<id>\d+)'
//! ```
//!
//! Files without a `[plugin]` table, or with an unknown `kind`, contribute
//! no handler. Unreadable or malformed files are logged and skipped.

pub mod builtin;
pub mod handler;
pub mod loader;
pub mod matcher;
pub mod registry;

use std::path::PathBuf;

use thiserror::Error;

pub use builtin::{AdaptiveHandler, HttpHandler};
pub use handler::{Handler, OpenContext, Priority, FALLBACK_ORDER};
pub use loader::{KindFactory, MatcherSpec, PluginLoader, PluginSpec};
pub use matcher::{Captures, MatchResult, Matcher, Matchers};
pub use registry::{PluginRegistry, Resolved};

/// Failure to load a single handler. Never aborts a batch.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest for handler {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid pattern '{pattern}' in handler {name}: {source}")]
    Pattern {
        name: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid handler name '{0}'")]
    InvalidName(String),

    #[error("handler {name}: {message}")]
    Invalid { name: String, message: String },
}
