//! Error types for timelapse reconstruction.
//!
//! Reconstruction is all-or-nothing per file, so every failure surfaces as a
//! single [`TimelapseError`] and no partial [`Timelapse`](crate::Timelapse) is
//! ever handed back. Variants fall into three families:
//!
//! - **Input errors**: the caller pointed at something that cannot be
//!   reconstructed (missing file, no repository, untracked path, bad hash).
//! - **Alignment errors**: the diff and the timelapse disagree. These indicate
//!   malformed collaborator output or an internal consistency bug.
//! - **Collaborator failures**: the history/diff/content backend failed.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the linelapse core
pub type Result<T> = std::result::Result<T, TimelapseError>;

/// Every failure a reconstruction can end with
#[derive(Debug, Error)]
pub enum TimelapseError {
    /// A REMOVED before-side line shares its position with an after-side line,
    /// or the hunk is otherwise structurally impossible
    #[error("Malformed diff: {0}")]
    MalformedDiff(String),

    /// The result cursor had to move past the last segment, or a seek could
    /// not find its target line
    #[error("Alignment overrun: {0}")]
    AlignmentOverrun(String),

    /// Two consecutive history entries produced no hunks for the path
    #[error("No differences for {path} between {older} and {newer}")]
    EmptyDiff {
        /// Older revision of the pair
        older: String,
        /// Newer revision of the pair
        newer: String,
        /// Path the diff was restricted to
        path: String,
    },

    /// History, diff or content retrieval failed in the backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// The requested file does not exist
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    /// No repository encloses the requested path
    #[error("Not a git repository (or any parent directory): {0:?}")]
    NotARepository(PathBuf),

    /// The file exists but is not tracked at the current revision
    #[error("Not under version control: {0:?}")]
    Untracked(PathBuf),

    /// A string that should have been a full commit hash
    #[error("Invalid commit hash: {0:?}")]
    InvalidHash(String),

    /// A finished timelapse failed its structural check
    #[error("Timelapse invariant violated: {0}")]
    InvariantViolated(String),

    /// I/O errors while reading inputs
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TimelapseError {
    /// Create a backend error with a custom message
    pub fn backend(msg: impl Into<String>) -> Self {
        TimelapseError::Backend(msg.into())
    }

    /// Create a malformed-diff error with a custom message
    pub fn malformed(msg: impl Into<String>) -> Self {
        TimelapseError::MalformedDiff(msg.into())
    }

    /// Create an alignment-overrun error with a custom message
    pub fn overrun(msg: impl Into<String>) -> Self {
        TimelapseError::AlignmentOverrun(msg.into())
    }

    /// True for conditions caused by what the caller asked for, as opposed to
    /// backend or consistency failures
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TimelapseError::FileNotFound(_)
                | TimelapseError::NotARepository(_)
                | TimelapseError::Untracked(_)
                | TimelapseError::InvalidHash(_)
        )
    }

    /// True when history and diff data disagreed with the timelapse
    pub fn is_alignment_error(&self) -> bool {
        matches!(
            self,
            TimelapseError::MalformedDiff(_)
                | TimelapseError::AlignmentOverrun(_)
                | TimelapseError::EmptyDiff { .. }
                | TimelapseError::InvariantViolated(_)
        )
    }
}
