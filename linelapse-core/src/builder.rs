//! Timelapse builder: walks history newest-first and aligns each commit pair.
//!
//! The builder talks to its collaborators only through the traits below, so
//! the same walk runs over a git repository, an in-memory revision list, or a
//! hand-written diff function in tests.

use tracing::{debug, info, instrument, trace};

use crate::align::align_hunk;
use crate::error::{Result, TimelapseError};
use crate::timelapse::Timelapse;
use crate::types::{Commit, CommitHash, DiffHunk};

/// Produces the hunks between two revisions of one file.
pub trait DiffSource {
    /// Hunks turning `older`'s version of `path` into `newer`'s.
    fn diff(&self, older: &CommitHash, newer: &CommitHash, path: &str) -> Result<Vec<DiffHunk>>;
}

impl<F> DiffSource for F
where
    F: Fn(&CommitHash, &CommitHash, &str) -> Result<Vec<DiffHunk>>,
{
    fn diff(&self, older: &CommitHash, newer: &CommitHash, path: &str) -> Result<Vec<DiffHunk>> {
        self(older, newer, path)
    }
}

/// A lazy, finite, non-restartable sequence of commits, newest first.
///
/// Consumers that finish early must call [`CommitStream::stop`] so the
/// producer can release whatever it holds; iterating to exhaustion does not
/// make the call unnecessary.
pub trait CommitStream: Iterator<Item = Result<Commit>> {
    /// Tells the producer no more items will be read. Idempotent.
    fn stop(&mut self);
}

/// Opens commit streams for a path.
pub trait HistorySource {
    type Stream: CommitStream;

    /// Commits that touched `path`, newest first.
    fn history(&self, path: &str) -> Result<Self::Stream>;
}

/// Which revision a [`ContentSource`] should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision<'a> {
    /// The revision reconstruction starts from.
    Current,
    At(&'a CommitHash),
}

/// Reads a file's full text at a revision.
pub trait ContentSource {
    fn content(&self, revision: Revision<'_>, path: &str) -> Result<String>;
}

/// Knobs for a single reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Read at most this many commits from history; `None` reads them all.
    pub max_commits: Option<usize>,
}

/// Drives the alignment engine over a commit stream for one path.
pub struct TimelapseBuilder<'a, D: DiffSource + ?Sized> {
    path: &'a str,
    diffs: &'a D,
    options: BuildOptions,
}

impl<'a, D: DiffSource + ?Sized> TimelapseBuilder<'a, D> {
    pub fn new(path: &'a str, diffs: &'a D) -> Self {
        Self { path, diffs, options: BuildOptions::default() }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Seeds a timelapse with `current` and aligns every consecutive commit
    /// pair `history` yields.
    ///
    /// The stream is stopped before returning, whether the walk finished,
    /// hit the commit limit, or failed. Any error discards the timelapse.
    #[instrument(skip_all, fields(path = %self.path))]
    pub fn build<S>(&self, current: &str, history: &mut S) -> Result<Timelapse>
    where
        S: CommitStream + ?Sized,
    {
        let result = self.walk(current, history);
        history.stop();
        result
    }

    fn walk<S>(&self, current: &str, history: &mut S) -> Result<Timelapse>
    where
        S: CommitStream + ?Sized,
    {
        let mut timelapse = Timelapse::seed(current);
        let mut newer: Option<Commit> = None;
        let mut consumed = 0usize;

        loop {
            if self.options.max_commits.is_some_and(|max| consumed >= max) {
                debug!(consumed, "commit limit reached");
                break;
            }
            let Some(item) = history.next() else {
                break;
            };
            let commit = item?;
            consumed += 1;
            if let Some(newer) = &newer {
                self.align_pair(&mut timelapse, &commit, newer)?;
            }
            newer = Some(commit);
        }

        info!(
            commits = consumed,
            segments = timelapse.len(),
            deleted_lines = timelapse.deleted_line_count(),
            "timelapse reconstructed"
        );
        Ok(timelapse)
    }

    fn align_pair(&self, timelapse: &mut Timelapse, older: &Commit, newer: &Commit) -> Result<()> {
        let hunks = self.diffs.diff(&older.hash, &newer.hash, self.path)?;
        if hunks.is_empty() {
            return Err(TimelapseError::EmptyDiff {
                older: older.hash.short().to_string(),
                newer: newer.hash.short().to_string(),
                path: self.path.to_string(),
            });
        }
        debug!(
            older = older.hash.short(),
            newer = newer.hash.short(),
            hunks = hunks.len(),
            "aligning commit pair"
        );
        for hunk in &hunks {
            let report = align_hunk(hunk, timelapse)?;
            trace!(
                seek_line = hunk.seek_line(),
                runs = report.deleted_runs,
                deleted = report.deleted_lines,
                departed = report.departed_lines,
                "hunk aligned"
            );
        }
        timelapse.settle();
        Ok(())
    }
}

/// Builds a timelapse from explicit current content, history and diffs.
pub fn build_timelapse<S, D>(current: &str, history: &mut S, path: &str, diffs: &D) -> Result<Timelapse>
where
    S: CommitStream + ?Sized,
    D: DiffSource + ?Sized,
{
    TimelapseBuilder::new(path, diffs).build(current, history)
}

/// Reads the current content and history of `path` from `source` and
/// reconstructs its timelapse.
pub fn reconstruct<R>(source: &R, path: &str, options: &BuildOptions) -> Result<Timelapse>
where
    R: DiffSource + HistorySource + ContentSource,
{
    let current = source.content(Revision::Current, path)?;
    let mut history = source.history(path)?;
    TimelapseBuilder::new(path, source)
        .with_options(options.clone())
        .build(&current, &mut history)
}
