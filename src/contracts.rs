//! External interfaces (§6): the three contracts an HTTP collaborator (or a
//! test) implements so the core can drive an upload and a download without
//! knowing anything about transport framing.

use bytes::Bytes;
use std::fmt;

/// A producer's pull interface: yields zero or more chunks and terminates
/// with `Ok(None)` (EOF) or `Err(_)` (source error, converted by
/// [`crate::slab::Slab::append`] into the sticky `failed` flag).
///
/// Implementations are not required to be cancel-safe beyond what
/// `tokio_util::sync::CancellationToken` already buys `append`: `append`
/// races `next_chunk` against the token and does not call it again once
/// cancelled.
#[allow(async_fn_in_trait)]
pub trait ProducerSource: Send {
    /// Pull the next chunk, or `None` on normal end-of-stream.
    async fn next_chunk(&mut self) -> std::result::Result<Option<Bytes>, SourceError>;
}

/// Opaque error from a [`ProducerSource`]. The Slab only needs the message
/// for diagnostics — it must stay `Send + Sync + 'static` independent of
/// whatever error type a given source implementation uses, so the original
/// error is stringified rather than boxed and stored.
#[derive(Debug, Clone)]
pub struct SourceError(pub String);

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    /// Build a source error from any displayable cause.
    pub fn new(cause: impl fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// A consumer's chunked write interface. `write_chunk` is the only
/// suspension point `Read` hits while flushing; it must not be called while
/// holding the Slab's content lock.
#[allow(async_fn_in_trait)]
pub trait ConsumerSink: Send {
    /// Flush one chunk downstream. Returns [`SinkOutcome::Cancelled`] once
    /// the consumer is gone and `Read` should stop without error.
    async fn write_chunk(&mut self, chunk: Bytes) -> SinkOutcome;
}

/// Result of a single [`ConsumerSink::write_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    /// The chunk was accepted; keep streaming.
    Continue,
    /// The consumer is gone (completed or cancelled transport-side).
    Cancelled,
}
