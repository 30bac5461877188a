//! Byte stream delivery
//!
//! A handler's `open` produces a [`ChunkSource`]: a single-use sequence of
//! byte chunks. [`ChunkReader`] turns it into a bounded `read(max_bytes)`
//! interface, and [`ReadaheadBuffer`] runs that reader on a background fill
//! task behind a bounded queue so a slow consumer never stalls the network
//! and a slow network never blocks the consumer past a timeout.

pub mod handle;
pub mod readahead;
pub mod reader;
pub mod source;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use handle::{CopyError, StreamHandle};
pub use readahead::{BufferState, ReadaheadBuffer, ReadaheadOptions};
pub use reader::ChunkReader;
pub use source::ChunkSource;

/// Stream-time errors. These always reach the caller of `open`/`read`.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// The handler could not establish its underlying source.
    #[error("failed to open stream: {0}")]
    Open(String),

    /// The source failed mid-stream. Reported again on every later read.
    #[error("stream read error: {0}")]
    Read(Arc<io::Error>),

    /// Nothing arrived within the configured wait. The stream stays usable.
    #[error("no data received within {0:?}")]
    Timeout(Duration),

    #[error("stream is closed")]
    Closed,

    #[error("stream has not been opened")]
    NotOpen,

    #[error("stream is already open")]
    AlreadyOpen,
}

impl StreamError {
    pub(crate) fn read(err: io::Error) -> Self {
        Self::Read(Arc::new(err))
    }

    /// True for [`StreamError::Timeout`], the only retryable condition.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Open(err.to_string())
    }
}
