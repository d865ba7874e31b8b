//! Shared test doubles for the integration suites. Lives under
//! `tests/support/mod.rs` (rather than `tests/support.rs`) so cargo treats
//! it as a helper module, not its own test binary.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use slabstore::{ConsumerSink, ProducerSource, SinkOutcome, SourceError};

/// Install a `tracing` subscriber for tests that want readable log output
/// while debugging locally, the same way `examples/AharonR-downloader/src/main.rs`
/// installs one for the binary. `try_init` rather than `init`, since every
/// integration test binary in this suite calls this and only the first
/// caller within a process should actually install the subscriber.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// A producer that replays a fixed list of chunks, then ends the stream
/// (or, for `new_failing`, errors out instead of ending cleanly).
pub struct ScriptedSource {
    chunks: VecDeque<Result<Option<Bytes>, SourceError>>,
}

impl ScriptedSource {
    pub fn new(chunks: Vec<&'static [u8]>) -> Self {
        let mut queue: VecDeque<_> = chunks
            .into_iter()
            .map(|c| Ok(Some(Bytes::from_static(c))))
            .collect();
        queue.push_back(Ok(None));
        Self { chunks: queue }
    }

    pub fn new_failing(chunks: Vec<&'static [u8]>, message: &str) -> Self {
        let mut queue: VecDeque<_> = chunks
            .into_iter()
            .map(|c| Ok(Some(Bytes::from_static(c))))
            .collect();
        queue.push_back(Err(SourceError::new(message)));
        Self { chunks: queue }
    }
}

impl ProducerSource for ScriptedSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, SourceError> {
        self.chunks.pop_front().unwrap_or(Ok(None))
    }
}

/// A sink that appends every chunk into a shared buffer so the test can
/// inspect it after the read completes (or after the writer task moves on
/// without the test holding the sink itself).
#[derive(Clone, Default)]
pub struct CollectingSink {
    pub received: Arc<Mutex<Vec<u8>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }
}

impl ConsumerSink for CollectingSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> SinkOutcome {
        self.received.lock().unwrap().extend_from_slice(&chunk);
        SinkOutcome::Continue
    }
}
