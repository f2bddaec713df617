//! Git collaborators for timelapse reconstruction.
//!
//! [`GitRepo`] implements the core's history, diff and content traits over a
//! `git2::Repository`. History is produced on a background thread that opens
//! its own Repository handle and hands commits over a channel; diffs and
//! content are read synchronously on the caller's thread.

mod diff;
#[cfg(test)]
pub(crate) mod fixture;
mod repo;
mod worker;

pub use repo::GitRepo;

fn backend(e: git2::Error) -> linelapse_core::TimelapseError {
    linelapse_core::TimelapseError::backend(e.message())
}
