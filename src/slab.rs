//! A single version of a file's bytes: one producer appending sequentially,
//! any number of consumers reading from offset 0 forward, with a sticky
//! terminal state once the producer finishes or fails.
//!
//! The content lock ([`parking_lot::RwLock`]) admits one writer or many
//! readers and guards the byte buffer and the two terminal flags together.
//! The state condition variable is a [`tokio::sync::Notify`]: every
//! writer-side mutation wakes all parked readers, who re-check their
//! predicate against the content lock after waking (spurious wakeups are
//! harmless, matching the standard monitor pattern this type follows).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::contracts::{ConsumerSink, ProducerSource, SinkOutcome};
use crate::error::{Error, Result};

/// Chunk size used when copying bytes out of the content lock during
/// catch-up reads (§4.1 recommends 16 KiB).
pub const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Outcome of a completed (or aborted) [`Slab::append`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The source reached normal end-of-stream; `complete` is now set.
    Completed,
    /// The source errored or the append was cancelled; `failed` is now set.
    Failed,
}

struct SlabContent {
    buf: BytesMut,
    complete: bool,
    failed: bool,
    /// Diagnostic-only message from the `SourceError` (or cancellation)
    /// that set `failed`. Never part of the public read protocol.
    fail_reason: Option<String>,
}

impl SlabContent {
    fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            complete: false,
            failed: false,
            fail_reason: None,
        }
    }
}

struct SlabInner {
    path: String,
    content_type: String,
    content: RwLock<SlabContent>,
    notify: Notify,
    append_started: AtomicBool,
}

/// A single streaming byte container. Cheap to clone — every clone shares
/// the same underlying buffer and terminal state via `Arc`.
#[derive(Clone)]
pub struct Slab {
    inner: Arc<SlabInner>,
}

impl Slab {
    /// Create a fresh, empty, not-yet-appended Slab.
    pub fn new(path: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SlabInner {
                path: path.into(),
                content_type: content_type.into(),
                content: RwLock::new(SlabContent::new()),
                notify: Notify::new(),
                append_started: AtomicBool::new(false),
            }),
        }
    }

    /// The path this Slab was created under.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// The content type supplied at creation.
    pub fn content_type(&self) -> &str {
        &self.inner.content_type
    }

    /// Current committed length. Never blocks.
    pub fn length(&self) -> usize {
        self.inner.content.read().buf.len()
    }

    /// Whether the producer finished normally.
    pub fn is_complete(&self) -> bool {
        self.inner.content.read().complete
    }

    /// Whether the producer aborted before completion.
    pub fn is_failed(&self) -> bool {
        self.inner.content.read().failed
    }

    /// Diagnostic message describing why the Slab failed, if it has.
    pub fn fail_reason(&self) -> Option<String> {
        self.inner.content.read().fail_reason.clone()
    }

    /// Consume `source` until it signals end-of-stream, errors, or `cancel`
    /// fires. May be called at most once per Slab; a second call returns
    /// [`Error::AlreadyAppending`] without touching the buffer.
    ///
    /// On each chunk the content lock is taken just long enough to append
    /// and release; `cancel`/`notify_waiters` never happen while the lock
    /// is held across an `.await`.
    #[tracing::instrument(skip(self, source, cancel), fields(path = %self.inner.path))]
    pub async fn append<S: ProducerSource>(
        &self,
        mut source: S,
        cancel: CancellationToken,
    ) -> Result<AppendOutcome> {
        if self.inner.append_started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyAppending {
                path: self.inner.path.clone(),
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.mark_failed("append cancelled");
                    return Ok(AppendOutcome::Failed);
                }
                chunk = source.next_chunk() => {
                    match chunk {
                        Ok(Some(bytes)) => {
                            self.push(&bytes);
                        }
                        Ok(None) => {
                            self.mark_complete();
                            return Ok(AppendOutcome::Completed);
                        }
                        Err(source_err) => {
                            self.mark_failed(source_err.to_string());
                            return Ok(AppendOutcome::Failed);
                        }
                    }
                }
            }
        }
    }

    fn push(&self, bytes: &[u8]) {
        {
            let mut content = self.inner.content.write();
            content.buf.extend_from_slice(bytes);
        }
        self.inner.notify.notify_waiters();
    }

    fn mark_complete(&self) {
        {
            let mut content = self.inner.content.write();
            content.complete = true;
        }
        debug!(path = %self.inner.path, len = self.length(), "append completed");
        self.inner.notify.notify_waiters();
    }

    fn mark_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        {
            let mut content = self.inner.content.write();
            if !content.complete {
                content.failed = true;
                content.fail_reason = Some(reason.clone());
            }
        }
        warn!(path = %self.inner.path, reason, "append failed");
        self.inner.notify.notify_waiters();
    }

    /// Copy bytes from offset 0 forward into `sink`, blocking at the append
    /// frontier and resuming as the writer appends. Returns `Ok(())` once
    /// the Slab is `complete` and fully drained, [`Error::Incomplete`] if
    /// `failed` is observed once caught up, or [`Error::SinkClosed`] if the
    /// sink (or `cancel`) signals the consumer is gone.
    pub async fn read<K: ConsumerSink>(
        &self,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut pos = 0usize;
        loop {
            // Register interest in the next notification *before* checking
            // state, so an append/complete/fail that lands between our
            // check and the `.await` below is never missed.
            let notified = self.inner.notify.notified();

            let (chunk, is_complete, is_failed) = {
                let content = self.inner.content.read();
                if pos < content.buf.len() {
                    let end = (pos + READ_CHUNK_SIZE).min(content.buf.len());
                    let chunk = Bytes::copy_from_slice(&content.buf[pos..end]);
                    (Some(chunk), content.complete, content.failed)
                } else {
                    (None, content.complete, content.failed)
                }
            };

            if let Some(chunk) = chunk {
                let n = chunk.len();
                match sink.write_chunk(chunk).await {
                    SinkOutcome::Cancelled => {
                        return Err(Error::SinkClosed {
                            path: self.inner.path.clone(),
                        });
                    }
                    SinkOutcome::Continue => {}
                }
                pos += n;
                continue;
            }

            // Caught up to the append frontier.
            if is_complete {
                return Ok(());
            }
            if is_failed {
                return Err(Error::Incomplete {
                    path: self.inner.path.clone(),
                });
            }

            tokio::select! {
                _ = notified => continue,
                _ = cancel.cancelled() => {
                    return Err(Error::SinkClosed { path: self.inner.path.clone() });
                }
            }
        }
    }
}
