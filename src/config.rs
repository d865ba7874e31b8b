//! Tunables for a [`crate::repository::Repository`] (§5, §6). Mirrors the
//! teacher's `download::constants` module: plain constants for the defaults,
//! a small struct for the knobs an operator actually wants to vary.

use std::time::Duration;

use crate::policy::ExpirationPolicy;

/// Default idle-expiration threshold applied when no pattern override
/// matches a path.
pub const DEFAULT_EXPIRATION_THRESHOLD: Duration = Duration::from_secs(60);

/// Default interval between sweeper passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Chunk size `Slab::read` copies out of the content lock per iteration.
pub const DEFAULT_READ_CHUNK_SIZE: usize = crate::slab::READ_CHUNK_SIZE;

/// Construction-time configuration for a [`crate::repository::Repository`].
///
/// `patternOverrides` are compiled into an [`ExpirationPolicy`] once, at
/// construction; they never change for the lifetime of a `Repository`.
#[derive(Debug, Clone)]
pub struct Options {
    expiration_policy: ExpirationPolicy,
    sweep_interval: Duration,
}

impl Options {
    /// Start from the defaults (60s expiration, 10s sweep, no overrides).
    pub fn new() -> Self {
        Self {
            expiration_policy: ExpirationPolicy::new(DEFAULT_EXPIRATION_THRESHOLD, Vec::new()),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Override the default idle-expiration threshold.
    pub fn with_default_expiration(mut self, threshold: Duration) -> Self {
        self.expiration_policy.set_default_threshold(threshold);
        self
    }

    /// Add path-pattern overrides, each a regex paired with the threshold
    /// applied when that pattern is the single match for a path. Patterns
    /// are compiled eagerly; an invalid pattern is a construction-time
    /// error the caller should surface before starting the repository.
    pub fn with_pattern_overrides(
        mut self,
        overrides: Vec<(String, Duration)>,
    ) -> Result<Self, regex::Error> {
        self.expiration_policy = ExpirationPolicy::compile(
            self.expiration_policy.default_threshold(),
            overrides,
        )?;
        Ok(self)
    }

    /// Override the sweeper's poll interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub(crate) fn expiration_policy(&self) -> &ExpirationPolicy {
        &self.expiration_policy
    }

    pub(crate) fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
