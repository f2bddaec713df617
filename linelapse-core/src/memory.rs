//! In-memory history for one file, with line diffs computed by `similar`.
//!
//! [`MemoryRepo`] implements every collaborator trait, so a caller that
//! already holds a file's revisions can reconstruct its timelapse without a
//! version-control backend.

use std::path::PathBuf;

use chrono::DateTime;
use similar::{Algorithm, ChangeTag, TextDiff};

use crate::builder::{CommitStream, ContentSource, DiffSource, HistorySource, Revision};
use crate::error::{Result, TimelapseError};
use crate::types::{Commit, CommitHash, DiffHunk, DiffLine, LineMode};

/// Timestamp of the first synthetic commit (2017-01-01T00:00:00Z).
const EPOCH_SECONDS: i64 = 1_483_228_800;

const AUTHOR: &str = "linelapse <linelapse@localhost>";

/// Default number of unchanged lines around each change.
pub const DEFAULT_CONTEXT: usize = 3;

/// Commit `n` (1-based) of a synthetic history, one minute after commit `n - 1`.
pub(crate) fn synthetic_commit(n: u64, description: &str) -> Commit {
    let seconds = EPOCH_SECONDS + (n as i64) * 60;
    Commit {
        hash: CommitHash::synthetic(n),
        author: AUTHOR.to_string(),
        date: DateTime::from_timestamp(seconds, 0).unwrap_or_default().fixed_offset(),
        description: description.to_string(),
    }
}

struct Snapshot {
    commit: Commit,
    content: String,
}

/// Append-only list of revisions of a single file, oldest first.
pub struct MemoryRepo {
    path: String,
    context_lines: usize,
    snapshots: Vec<Snapshot>,
}

impl MemoryRepo {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), context_lines: DEFAULT_CONTEXT, snapshots: Vec::new() }
    }

    /// Sets the number of context lines produced around each diff hunk.
    pub fn with_context(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    /// Records `content` as the newest revision and returns its hash.
    pub fn commit(&mut self, content: impl Into<String>, description: &str) -> CommitHash {
        let commit = synthetic_commit(self.snapshots.len() as u64 + 1, description);
        let hash = commit.hash.clone();
        self.snapshots.push(Snapshot { commit, content: content.into() });
        hash
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Every commit, newest first.
    pub fn commits(&self) -> Vec<Commit> {
        self.snapshots.iter().rev().map(|s| s.commit.clone()).collect()
    }

    fn check_path(&self, path: &str) -> Result<()> {
        if path == self.path {
            Ok(())
        } else {
            Err(TimelapseError::FileNotFound(PathBuf::from(path)))
        }
    }

    fn snapshot(&self, hash: &CommitHash) -> Result<&Snapshot> {
        self.snapshots
            .iter()
            .find(|s| &s.commit.hash == hash)
            .ok_or_else(|| TimelapseError::backend(format!("unknown revision {hash}")))
    }
}

impl DiffSource for MemoryRepo {
    fn diff(&self, older: &CommitHash, newer: &CommitHash, path: &str) -> Result<Vec<DiffHunk>> {
        self.check_path(path)?;
        let old = &self.snapshot(older)?.content;
        let new = &self.snapshot(newer)?.content;
        Ok(diff_lines(old, new, self.context_lines))
    }
}

impl ContentSource for MemoryRepo {
    fn content(&self, revision: Revision<'_>, path: &str) -> Result<String> {
        self.check_path(path)?;
        match revision {
            Revision::Current => self
                .snapshots
                .last()
                .map(|s| s.content.clone())
                .ok_or_else(|| TimelapseError::FileNotFound(PathBuf::from(path))),
            Revision::At(hash) => Ok(self.snapshot(hash)?.content.clone()),
        }
    }
}

impl HistorySource for MemoryRepo {
    type Stream = MemoryHistory;

    /// Streams the revisions whose lines differ from their predecessor's,
    /// newest first. A revision that only changes line terminators did not
    /// touch the file as far as [`diff_lines`] can tell, so it is skipped.
    fn history(&self, path: &str) -> Result<MemoryHistory> {
        self.check_path(path)?;
        let mut touched: Vec<Commit> = self
            .snapshots
            .iter()
            .enumerate()
            .filter(|(i, snapshot)| match i.checked_sub(1) {
                Some(prev) => !self.snapshots[prev].content.lines().eq(snapshot.content.lines()),
                None => true,
            })
            .map(|(_, snapshot)| snapshot.commit.clone())
            .collect();
        touched.reverse();
        Ok(MemoryHistory::new(touched))
    }
}

/// Commit stream over an owned list.
#[derive(Debug)]
pub struct MemoryHistory {
    commits: std::vec::IntoIter<Commit>,
    stopped: bool,
}

impl MemoryHistory {
    /// Streams `commits` in the order given, which should be newest first.
    pub fn new(commits: Vec<Commit>) -> Self {
        Self { commits: commits.into_iter(), stopped: false }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Iterator for MemoryHistory {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped {
            return None;
        }
        self.commits.next().map(Ok)
    }
}

impl CommitStream for MemoryHistory {
    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Line-level hunks turning `old` into `new`, with `context` unchanged lines
/// around each change.
///
/// Line terminators are not part of the compared text, so a missing final
/// newline or CRLF endings do not show up as changes. Within a hunk the
/// changes are numbered 1, 2, ... in diff order, which is the shared position
/// both sides use.
pub fn diff_lines(old: &str, new: &str, context: usize) -> Vec<DiffHunk> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(&old_lines, &new_lines);

    let mut hunks = Vec::new();
    for group in diff.grouped_ops(context) {
        let mut hunk = DiffHunk::default();
        let mut position = 0;
        for op in &group {
            for change in diff.iter_changes(op) {
                position += 1;
                let content = change.value().to_string();
                let old_number = change.old_index().map_or(0, |i| i + 1);
                let new_number = change.new_index().map_or(0, |i| i + 1);
                match change.tag() {
                    ChangeTag::Equal => {
                        hunk.before.push(DiffLine::new(position, old_number, content.clone(), LineMode::Unchanged));
                        hunk.after.push(DiffLine::new(position, new_number, content, LineMode::Unchanged));
                    }
                    ChangeTag::Delete => {
                        hunk.before.push(DiffLine::new(position, old_number, content, LineMode::Removed));
                    }
                    ChangeTag::Insert => {
                        hunk.after.push(DiffLine::new(position, new_number, content, LineMode::Added));
                    }
                }
            }
        }
        if hunk.before.is_empty() && hunk.after.is_empty() {
            continue;
        }
        // Header convention: an empty side names the line the change follows.
        if let Some(first) = group.first() {
            let old_start = first.old_range().start;
            let new_start = first.new_range().start;
            hunk.before_start = if hunk.before.is_empty() { old_start } else { old_start + 1 };
            hunk.after_start = if hunk.after.is_empty() { new_start } else { new_start + 1 };
        }
        hunks.push(hunk);
    }
    hunks
}
