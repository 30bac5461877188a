//! Consumer-facing handle for an opened stream.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::readahead::ReadaheadBuffer;
use super::reader::ChunkReader;
use super::StreamError;

/// An opened stream, either read directly or through a readahead buffer.
#[derive(Debug)]
pub enum StreamHandle {
    /// Unbuffered: reads pull straight from the source.
    Direct(ChunkReader),
    /// Buffered: a background task fills a bounded queue.
    Buffered(ReadaheadBuffer),
}

impl StreamHandle {
    /// Read up to `max_bytes`; an empty result is end of stream.
    pub async fn read(&mut self, max_bytes: usize) -> Result<Bytes, StreamError> {
        match self {
            Self::Direct(reader) => reader.read(max_bytes).await,
            Self::Buffered(buffer) => buffer.read(max_bytes).await,
        }
    }

    /// Release the stream. Idempotent.
    pub async fn close(&mut self) {
        match self {
            Self::Direct(reader) => reader.close(),
            Self::Buffered(buffer) => buffer.close().await,
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, Self::Buffered(_))
    }

    /// Drain the stream into `output`, returning the number of bytes written.
    ///
    /// Stops at end of stream. Timeouts and read errors are returned as-is;
    /// the handle is left open so the caller decides whether to retry.
    pub async fn copy_to<W>(&mut self, output: &mut W, chunk_size: usize) -> Result<u64, CopyError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut written = 0u64;
        loop {
            let chunk = self.read(chunk_size).await?;
            if chunk.is_empty() {
                break;
            }
            output.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        output.flush().await?;
        Ok(written)
    }
}

/// Failure while draining a stream into a writer.
#[derive(thiserror::Error, Debug)]
pub enum CopyError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("failed to write output: {0}")]
    Write(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ChunkSource, ReadaheadOptions};

    fn source(parts: &[&'static str]) -> ChunkSource {
        ChunkSource::from_chunks(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn direct_handle_copies_everything() {
        let mut handle = StreamHandle::Direct(ChunkReader::new(source(&["hello ", "world"])));
        let mut out = Vec::new();

        let n = handle.copy_to(&mut out, 4).await.unwrap();
        assert_eq!(n, 11);
        assert_eq!(out, b"hello world");
        assert!(!handle.is_buffered());
    }

    #[tokio::test]
    async fn buffered_handle_copies_everything() {
        let buffer = ReadaheadBuffer::new(
            ChunkReader::new(source(&["a", "bc", "def"])),
            ReadaheadOptions::default(),
        );
        buffer.open().unwrap();
        let mut handle = StreamHandle::Buffered(buffer);
        let mut out = Vec::new();

        let n = handle.copy_to(&mut out, 2).await.unwrap();
        assert_eq!(n, 6);
        assert_eq!(out, b"abcdef");

        handle.close().await;
        handle.close().await;
    }

    #[tokio::test]
    async fn both_modes_report_closed_after_close() {
        let buffer = ReadaheadBuffer::new(
            ChunkReader::new(source(&["abc"])),
            ReadaheadOptions::default(),
        );
        buffer.open().unwrap();

        for mut handle in [
            StreamHandle::Direct(ChunkReader::new(source(&["abc"]))),
            StreamHandle::Buffered(buffer),
        ] {
            handle.close().await;
            assert!(matches!(handle.read(8).await, Err(StreamError::Closed)));
        }
    }

    #[tokio::test]
    async fn copy_reports_source_failure() {
        let failing = ChunkSource::from_chunks(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("reset by peer")),
        ]);
        let mut handle = StreamHandle::Direct(ChunkReader::new(failing));
        let mut out = Vec::new();

        let err = handle.copy_to(&mut out, 64).await.unwrap_err();
        assert!(matches!(err, CopyError::Stream(StreamError::Read(_))));
        assert_eq!(out, b"partial");
    }
}
