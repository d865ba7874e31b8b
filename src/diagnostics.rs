//! Read-only view of repository state for an external diagnostics page
//! (§6: diagnostics HTML rendering is a collaborator's job, not the core's;
//! the core only owes it a stable, sorted snapshot to render).

use std::time::Duration;

/// One row of [`crate::repository::Repository::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticEntry {
    /// The path this entry is stored under.
    pub path: String,
    /// Content type recorded at creation.
    pub content_type: String,
    /// Bytes committed so far (not necessarily complete).
    pub length: usize,
    /// Number of `lookup` calls served for this entry.
    pub access_count: u64,
    /// Time remaining before the sweeper would consider this entry idle,
    /// saturating at zero rather than going negative.
    pub expires_in: Duration,
}
