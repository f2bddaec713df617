//! linelapse-core: line-level timelapse reconstruction for one tracked file.
//!
//! A [`Timelapse`] interleaves a file's current lines with every line its
//! history deleted, each deleted run sitting in the gap it was removed from.
//! [`TimelapseBuilder`] seeds the timelapse with the current content, walks
//! commit history newest-first, and hands each hunk of each consecutive pair's
//! diff to [`align_hunk`].
//!
//! History, diffs and content come from the [`HistorySource`],
//! [`DiffSource`] and [`ContentSource`] traits. [`MemoryRepo`] implements all
//! three over revisions held in memory; the `linelapse` binary implements them
//! over git.

pub mod align;
pub mod builder;
pub mod error;
pub mod memory;
pub mod timelapse;
pub mod types;
pub mod unified;

pub use align::{align_hunk, AlignCursor, HunkReport};
pub use builder::{
    build_timelapse, reconstruct, BuildOptions, CommitStream, ContentSource, DiffSource,
    HistorySource, Revision, TimelapseBuilder,
};
pub use error::{Result, TimelapseError};
pub use memory::{diff_lines, MemoryHistory, MemoryRepo};
pub use timelapse::{Disposition, ResultCursor, Run, Segment, Timelapse};
pub use types::{Commit, CommitHash, DiffHunk, DiffLine, LineMode};
pub use unified::parse_hunks;
