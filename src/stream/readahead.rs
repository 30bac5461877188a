//! Readahead buffer
//!
//! Runs a [`ChunkReader`] on a dedicated fill task that pushes chunks into
//! a bounded queue. The consumer pops from the queue with a bounded wait.
//!
//! - Backpressure: when the queue holds `capacity` chunks the fill task
//!   waits on the send instead of reading further from the network.
//! - Ordering: chunks reach the consumer exactly in the order the reader
//!   produced them.
//! - Termination: a clean end drops the sender (consumer sees an empty
//!   read), a failure is queued behind the data that preceded it and then
//!   reported on every read until close.
//! - Cancellation: `close` cancels a token that the fill task selects on at
//!   both of its suspension points (source read and queue send), then joins
//!   the task.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::reader::ChunkReader;
use super::StreamError;

type Message = Result<Bytes, Arc<io::Error>>;

/// Lifecycle of a [`ReadaheadBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Constructed, fill task not started.
    Idle,
    /// Fill task running, nothing consumed yet.
    Filling,
    /// Consumer has started reading.
    Draining,
    /// The source failed. Set by the fill task as soon as it sees the
    /// failure; reads still return the data queued ahead of it first.
    Failed,
    /// Fill task stopped and joined.
    Closed,
}

/// Tuning for a [`ReadaheadBuffer`].
#[derive(Debug, Clone)]
pub struct ReadaheadOptions {
    /// Queue capacity in chunks. Values below 1 are treated as 1.
    pub capacity: usize,
    /// Largest chunk the fill task pulls from the reader at once.
    pub chunk_size: usize,
    /// How long a read waits for the next chunk. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for ReadaheadOptions {
    fn default() -> Self {
        Self {
            capacity: 64,
            chunk_size: 8192,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// What the consumer has learned about the end of the stream.
#[derive(Debug, Clone)]
enum Terminal {
    Eof,
    Failed(Arc<io::Error>),
}

#[derive(Debug)]
struct Lifecycle {
    state: BufferState,
    reader: Option<ChunkReader>,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct Consumer {
    rx: Option<mpsc::Receiver<Message>>,
    pending: Bytes,
    terminal: Option<Terminal>,
}

/// Background-filled, bounded buffer in front of a [`ChunkReader`].
///
/// All methods take `&self`, so `close` can run from another task while a
/// `read` is waiting; the pending read then returns [`StreamError::Closed`].
#[derive(Debug)]
pub struct ReadaheadBuffer {
    options: ReadaheadOptions,
    lifecycle: Arc<Mutex<Lifecycle>>,
    consumer: tokio::sync::Mutex<Consumer>,
    cancel: CancellationToken,
}

impl ReadaheadBuffer {
    pub fn new(reader: ChunkReader, options: ReadaheadOptions) -> Self {
        Self {
            options,
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                state: BufferState::Idle,
                reader: Some(reader),
                task: None,
            })),
            consumer: tokio::sync::Mutex::new(Consumer::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &ReadaheadOptions {
        &self.options
    }

    pub fn state(&self) -> BufferState {
        self.lifecycle().state
    }

    /// Start the fill task. Must be called from within a Tokio runtime.
    pub fn open(&self) -> Result<(), StreamError> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            BufferState::Idle => {}
            BufferState::Closed => return Err(StreamError::Closed),
            _ => return Err(StreamError::AlreadyOpen),
        }
        let reader = lifecycle.reader.take().ok_or(StreamError::AlreadyOpen)?;

        let (tx, rx) = mpsc::channel(self.options.capacity.max(1));
        // Not opened yet, so no read can be holding the consumer lock.
        match self.consumer.try_lock() {
            Ok(mut consumer) => consumer.rx = Some(rx),
            Err(_) => return Err(StreamError::AlreadyOpen),
        }

        let task = tokio::spawn(fill(
            reader,
            tx,
            Arc::clone(&self.lifecycle),
            self.cancel.clone(),
            self.options.chunk_size.max(1),
        ));
        lifecycle.task = Some(task);
        lifecycle.state = BufferState::Filling;
        debug!(capacity = self.options.capacity, "readahead fill task started");
        Ok(())
    }

    /// Read up to `max_bytes`.
    ///
    /// - `Ok` with bytes: data, possibly fewer than requested.
    /// - `Ok` empty: the source ended cleanly.
    /// - [`StreamError::Timeout`]: nothing arrived in time; retrying is fine.
    /// - [`StreamError::Read`]: the source failed; repeated until close.
    /// - [`StreamError::Closed`]: the buffer was closed.
    pub async fn read(&self, max_bytes: usize) -> Result<Bytes, StreamError> {
        match self.state() {
            BufferState::Idle => return Err(StreamError::NotOpen),
            BufferState::Closed => return Err(StreamError::Closed),
            _ => {}
        }

        let mut consumer = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(StreamError::Closed),
            guard = self.consumer.lock() => guard,
        };

        if max_bytes == 0 {
            return Ok(Bytes::new());
        }
        if !consumer.pending.is_empty() {
            self.mark_draining();
            return Ok(split_pending(&mut consumer.pending, max_bytes));
        }
        match &consumer.terminal {
            Some(Terminal::Eof) => return Ok(Bytes::new()),
            Some(Terminal::Failed(err)) => return Err(StreamError::Read(Arc::clone(err))),
            None => {}
        }

        let Some(rx) = consumer.rx.as_mut() else {
            return Err(StreamError::Closed);
        };

        let received = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(StreamError::Closed),
            received = recv_within(rx, self.options.timeout) => received,
        };

        match received {
            Ok(Some(Ok(chunk))) => {
                self.mark_draining();
                consumer.pending = chunk;
                Ok(split_pending(&mut consumer.pending, max_bytes))
            }
            Ok(Some(Err(err))) => {
                warn!("readahead source failed: {err}");
                consumer.terminal = Some(Terminal::Failed(Arc::clone(&err)));
                consumer.rx = None;
                self.set_state(BufferState::Failed);
                Err(StreamError::Read(err))
            }
            Ok(None) => {
                debug!("readahead source exhausted");
                consumer.terminal = Some(Terminal::Eof);
                consumer.rx = None;
                self.mark_draining();
                Ok(Bytes::new())
            }
            Err(waited) => Err(StreamError::Timeout(waited)),
        }
    }

    /// Stop the fill task, wait for it to exit, and release the source.
    ///
    /// Safe to call more than once and from a different task than the
    /// reader. Returns promptly even when the fill task is blocked on a
    /// full queue or on a stalled source.
    pub async fn close(&self) {
        self.cancel.cancel();

        let task = {
            let mut lifecycle = self.lifecycle();
            lifecycle.state = BufferState::Closed;
            lifecycle.reader = None;
            lifecycle.task.take()
        };

        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!("readahead fill task ended abnormally: {err}");
            }
            debug!("readahead fill task joined");
        }

        // A read racing this close releases the lock once it sees the token.
        let mut consumer = self.consumer.lock().await;
        consumer.rx = None;
        consumer.pending = Bytes::new();
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        lock(&self.lifecycle)
    }

    fn set_state(&self, state: BufferState) {
        set_state(&self.lifecycle, state);
    }

    fn mark_draining(&self) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state == BufferState::Filling {
            lifecycle.state = BufferState::Draining;
        }
    }
}

impl Drop for ReadaheadBuffer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock(lifecycle: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_state(lifecycle: &Mutex<Lifecycle>, state: BufferState) {
    let mut lifecycle = lock(lifecycle);
    if lifecycle.state != BufferState::Closed {
        lifecycle.state = state;
    }
}

fn split_pending(pending: &mut Bytes, max_bytes: usize) -> Bytes {
    let n = max_bytes.min(pending.len());
    pending.split_to(n)
}

async fn recv_within(
    rx: &mut mpsc::Receiver<Message>,
    timeout: Option<Duration>,
) -> Result<Option<Message>, Duration> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, rx.recv())
            .await
            .map_err(|_| limit),
        None => Ok(rx.recv().await),
    }
}

/// Fill loop: pull from the reader, push into the queue, stop on end of
/// stream, failure, a dropped receiver, or cancellation.
async fn fill(
    mut reader: ChunkReader,
    tx: mpsc::Sender<Message>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    cancel: CancellationToken,
    chunk_size: usize,
) {
    let mut chunks = 0u64;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = reader.read(chunk_size) => next,
        };

        let message = match next {
            // The consumer applies its own wait; a reader deadline just retries.
            Err(StreamError::Timeout(_)) => continue,
            Ok(chunk) if chunk.is_empty() => break,
            Ok(chunk) => Ok(chunk),
            Err(StreamError::Read(err)) => Err(err),
            Err(other) => Err(Arc::new(io::Error::other(other.to_string()))),
        };
        let failed = message.is_err();
        if failed {
            set_state(&lifecycle, BufferState::Failed);
        }

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = tx.send(message) => sent,
        };
        if sent.is_err() || failed {
            break;
        }
        chunks += 1;
    }

    reader.close();
    debug!(chunks, cancelled = cancel.is_cancelled(), "readahead fill task finished");
}
