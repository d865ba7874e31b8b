//! The keyed store of current [`Slab`]s (§5 "Repository"): atomic
//! create/replace/delete by path, plus a background sweeper that evicts
//! entries idle past their expiration threshold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::clock::{Clock, SystemClock};
use crate::config::Options;
use crate::diagnostics::DiagnosticEntry;
use crate::error::{Error, Result};
use crate::slab::Slab;

struct StoredEntry {
    slab: Slab,
    expiration_threshold: Duration,
    last_access: RwLock<Instant>,
    access_count: AtomicU64,
}

impl StoredEntry {
    fn new(slab: Slab, expiration_threshold: Duration, created_at: Instant) -> Self {
        Self {
            slab,
            expiration_threshold,
            last_access: RwLock::new(created_at),
            access_count: AtomicU64::new(0),
        }
    }

    fn touch(&self, now: Instant) {
        *self.last_access.write() = now;
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_access.read())
    }
}

/// Point-in-time counters for a [`Repository`]. Cheap to read; every field
/// is a plain atomic, no lock involved.
#[derive(Debug, Default)]
struct RepositoryStats {
    created: AtomicU64,
    overwritten: AtomicU64,
    deleted: AtomicU64,
    evicted: AtomicU64,
    lookup_misses: AtomicU64,
}

/// A snapshot of [`RepositoryStats`] at a moment in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepositoryStatsSnapshot {
    pub created: u64,
    pub overwritten: u64,
    pub deleted: u64,
    pub evicted: u64,
    pub lookup_misses: u64,
}

impl RepositoryStats {
    fn snapshot(&self) -> RepositoryStatsSnapshot {
        RepositoryStatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
        }
    }
}

/// The keyed store of current Slabs. Construct with [`Repository::new`] (or
/// [`Repository::with_clock`] for deterministic expiration tests); the
/// returned `Arc` owns a background sweeper task that stops when the last
/// `Arc` is dropped or [`Repository::shutdown`] is called.
pub struct Repository {
    entries: DashMap<String, Arc<StoredEntry>>,
    options: Options,
    clock: Arc<dyn Clock>,
    stats: RepositoryStats,
    shutdown: CancellationToken,
}

impl Repository {
    /// Build a repository backed by the real wall clock.
    pub fn new(options: Options) -> Arc<Self> {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Build a repository backed by a caller-supplied clock, so expiration
    /// can be driven deterministically in tests.
    pub fn with_clock(options: Options, clock: Arc<dyn Clock>) -> Arc<Self> {
        let repo = Arc::new(Self {
            entries: DashMap::new(),
            options,
            clock,
            stats: RepositoryStats::default(),
            shutdown: CancellationToken::new(),
        });
        repo.clone().spawn_sweeper();
        repo
    }

    fn spawn_sweeper(self: Arc<Self>) {
        let weak = Arc::downgrade(&self);
        let interval = self.options.sweep_interval();
        let shutdown = self.shutdown.clone();
        drop(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                match weak.upgrade() {
                    Some(repo) => repo.sweep_once(),
                    None => return,
                }
            }
        });
    }

    /// Stop the background sweeper. Entries already stored are unaffected;
    /// no further idle-expiration happens after this call.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    #[instrument(skip(self))]
    fn sweep_once(&self) {
        let now = self.clock.now();
        let mut expired = Vec::new();
        for entry in self.entries.iter() {
            if entry.value().idle_for(now) >= entry.value().expiration_threshold {
                expired.push((entry.key().clone(), Arc::clone(entry.value())));
            }
        }
        for (path, stale) in expired {
            // Compare-and-remove: only evict if the map still holds the
            // exact entry we decided was stale. A concurrent create/replace
            // that landed after our scan swapped in a different Arc, which
            // this leaves untouched.
            let removed = self
                .entries
                .remove_if(&path, |_, current| Arc::ptr_eq(current, &stale));
            if removed.is_some() {
                self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path, "evicted idle entry");
            }
        }
    }

    /// Create a new current Slab at `path`, replacing whatever was there.
    /// Readers holding a clone of the previous Slab keep reading it to
    /// completion; they simply stop being reachable through `lookup`.
    #[instrument(skip(self))]
    pub fn create(&self, path: impl Into<String>, content_type: impl Into<String>) -> Slab {
        let path = path.into();
        let threshold = self.options.expiration_policy().threshold_for(&path);
        let slab = Slab::new(path.clone(), content_type);
        let entry = Arc::new(StoredEntry::new(slab.clone(), threshold, self.clock.now()));
        if self.entries.insert(path, entry).is_some() {
            self.stats.overwritten.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.created.fetch_add(1, Ordering::Relaxed);
        slab
    }

    /// Look up the current Slab for `path`, refreshing its idle clock.
    #[instrument(skip(self))]
    pub fn lookup(&self, path: &str) -> Result<Slab> {
        match self.entries.get(path) {
            Some(entry) => {
                entry.touch(self.clock.now());
                trace!(path, "lookup hit");
                Ok(entry.slab.clone())
            }
            None => {
                self.stats.lookup_misses.fetch_add(1, Ordering::Relaxed);
                Err(Error::NotFound {
                    path: path.to_string(),
                })
            }
        }
    }

    /// Remove the current entry at `path`, if any. Returns whether an entry
    /// was present.
    #[instrument(skip(self))]
    pub fn delete(&self, path: &str) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            self.stats.deleted.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// A point-in-time listing of every current entry, ordered by path, for
    /// a diagnostics view.
    pub fn snapshot(&self) -> Vec<DiagnosticEntry> {
        let now = self.clock.now();
        let mut rows: Vec<DiagnosticEntry> = self
            .entries
            .iter()
            .map(|entry| {
                let stored = entry.value();
                let idle = stored.idle_for(now);
                DiagnosticEntry {
                    path: entry.key().clone(),
                    content_type: stored.slab.content_type().to_string(),
                    length: stored.slab.length(),
                    access_count: stored.access_count.load(Ordering::Relaxed),
                    expires_in: stored.expiration_threshold.saturating_sub(idle),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.path.cmp(&b.path));
        rows
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> RepositoryStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use std::time::Duration;

    fn repo_with_test_clock(options: Options) -> (Arc<Repository>, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new());
        let repo = Repository::with_clock(options, clock.clone());
        (repo, clock)
    }

    #[tokio::test]
    async fn create_then_lookup_returns_same_slab() {
        let (repo, _clock) = repo_with_test_clock(Options::new());
        let created = repo.create("/a", "text/plain");
        let found = repo.lookup("/a").unwrap();
        assert_eq!(created.path(), found.path());
    }

    #[tokio::test]
    async fn lookup_on_missing_path_returns_not_found() {
        let (repo, _clock) = repo_with_test_clock(Options::new());
        let err = repo.lookup("/missing").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_replaces_previous_entry() {
        let (repo, _clock) = repo_with_test_clock(Options::new());
        let first = repo.create("/a", "text/plain");
        let second = repo.create("/a", "application/json");
        let found = repo.lookup("/a").unwrap();
        assert_eq!(found.content_type(), "application/json");
        assert_ne!(found.content_type(), first.content_type());
        assert_eq!(found.content_type(), second.content_type());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let (repo, _clock) = repo_with_test_clock(Options::new());
        repo.create("/a", "text/plain");
        assert!(repo.delete("/a"));
        assert!(repo.lookup("/a").is_err());
        assert!(!repo.delete("/a"));
    }

    #[tokio::test]
    async fn idle_entry_is_evicted_after_threshold() {
        let (repo, clock) = repo_with_test_clock(
            Options::new()
                .with_default_expiration(Duration::from_secs(5))
                .with_sweep_interval(Duration::from_millis(10)),
        );
        repo.create("/a", "text/plain");
        clock.advance(Duration::from_secs(6));

        // Drive one sweep directly; the background task would eventually
        // observe the same state, but this test doesn't depend on its timing.
        repo.sweep_once();

        assert!(repo.lookup("/a").is_err());
        assert_eq!(repo.stats().evicted, 1);
    }

    #[tokio::test]
    async fn lookup_refreshes_idle_clock_and_prevents_eviction() {
        let (repo, clock) = repo_with_test_clock(
            Options::new().with_default_expiration(Duration::from_secs(5)),
        );
        repo.create("/a", "text/plain");
        clock.advance(Duration::from_secs(4));
        assert!(repo.lookup("/a").is_ok());
        clock.advance(Duration::from_secs(4));
        repo.sweep_once();
        assert!(repo.lookup("/a").is_ok());
    }

    #[tokio::test]
    async fn sweep_does_not_evict_entry_replaced_after_scan_decided_it_was_stale() {
        let (repo, clock) = repo_with_test_clock(
            Options::new().with_default_expiration(Duration::from_secs(5)),
        );
        repo.create("/a", "text/plain");
        clock.advance(Duration::from_secs(10));
        // Simulate a replace landing between scan and remove by replacing
        // before calling sweep_once; remove_if must then be a no-op because
        // the entry behind the path is no longer the stale one.
        repo.create("/a", "text/plain");
        repo.sweep_once();
        assert!(repo.lookup("/a").is_ok());
    }

    #[tokio::test]
    async fn snapshot_is_sorted_by_path() {
        let (repo, _clock) = repo_with_test_clock(Options::new());
        repo.create("/c", "text/plain");
        repo.create("/a", "text/plain");
        repo.create("/b", "text/plain");
        let rows = repo.snapshot();
        let paths: Vec<_> = rows.iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c"]);
    }
}
