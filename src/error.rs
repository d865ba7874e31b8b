//! Error types crossing the core boundary.
//!
//! Three kinds matter to a collaborator: [`Error::NotFound`] (a `Lookup`
//! miss), [`Error::Incomplete`] (a `Read` that discovered the Slab is
//! `failed`), and [`Error::SinkClosed`] (the downstream consumer went away
//! mid-read). None of these should ever be silently swallowed; callers match
//! on them rather than logging-and-continuing.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`crate::repository::Repository`] and
/// [`crate::slab::Slab`] operations.
#[derive(Debug, Error)]
pub enum Error {
    /// `Lookup` found no current entry for the path.
    #[error("no entry for path {path:?}")]
    NotFound {
        /// The path that was looked up.
        path: String,
    },

    /// `Read` observed the Slab's `failed` flag, either on entry or after
    /// waking from a wait. The upload that produced this Slab never
    /// completed.
    #[error("slab for {path:?} failed before completion")]
    Incomplete {
        /// The path whose Slab failed.
        path: String,
    },

    /// The downstream consumer signalled `completed` or `cancelled` on a
    /// sink flush. Not a failure of the Slab; the read simply stops.
    #[error("consumer sink closed for {path:?}")]
    SinkClosed {
        /// The path being read when the sink closed.
        path: String,
    },

    /// `Append` was called a second time on the same Slab. The protocol
    /// allows exactly one producer per Slab.
    #[error("append already in progress or completed for {path:?}")]
    AlreadyAppending {
        /// The path whose Slab was appended to twice.
        path: String,
    },
}
