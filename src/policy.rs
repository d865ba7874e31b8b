//! Idle-expiration threshold selection (§5 "Expiration policy").
//!
//! A path's threshold is the default unless exactly one pattern override
//! matches it. Zero matches falls back to the default; more than one match
//! *also* falls back to the default rather than picking a winner — this is
//! the documented behavior, not a bug to fix, and a path that happens to
//! match two overrides silently gets the default instead of an error.

use std::time::Duration;

use regex::Regex;

#[derive(Debug, Clone)]
struct Override {
    pattern: Regex,
    threshold: Duration,
}

/// Compiled set of path-pattern expiration overrides plus the fallback
/// default. Built once at [`crate::config::Options`] construction.
#[derive(Debug, Clone)]
pub struct ExpirationPolicy {
    default_threshold: Duration,
    overrides: Vec<Override>,
}

impl ExpirationPolicy {
    /// Build from already-compiled patterns. Used by [`Self::compile`] and
    /// directly when the caller has no string patterns to parse.
    pub(crate) fn new(default_threshold: Duration, overrides: Vec<Override>) -> Self {
        Self {
            default_threshold,
            overrides,
        }
    }

    /// Compile `(pattern, threshold)` string pairs into an `ExpirationPolicy`.
    /// Fails fast on the first invalid regex.
    pub(crate) fn compile(
        default_threshold: Duration,
        patterns: Vec<(String, Duration)>,
    ) -> Result<Self, regex::Error> {
        let overrides = patterns
            .into_iter()
            .map(|(pattern, threshold)| {
                Regex::new(&pattern).map(|pattern| Override { pattern, threshold })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            default_threshold,
            overrides,
        })
    }

    pub(crate) fn set_default_threshold(&mut self, threshold: Duration) {
        self.default_threshold = threshold;
    }

    pub(crate) fn default_threshold(&self) -> Duration {
        self.default_threshold
    }

    /// Resolve the idle-expiration threshold for `path`.
    pub fn threshold_for(&self, path: &str) -> Duration {
        let mut matches = self.overrides.iter().filter(|o| o.pattern.is_match(path));
        match (matches.next(), matches.next()) {
            (Some(single), None) => single.threshold,
            _ => self.default_threshold,
        }
    }
}
