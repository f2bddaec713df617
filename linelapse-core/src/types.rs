//! Diff line model and commit metadata shared by every reconstruction stage.
//!
//! All types here are fully owned so hunks and commits can cross the thread
//! boundary between a history producer and the builder that consumes it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::error::{Result, TimelapseError};

/// Which revision a diff line belongs to, and how.
///
/// Before-side lines are `Unchanged` or `Removed`; after-side lines are
/// `Unchanged` or `Added`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineMode {
    /// Context line present in both revisions.
    Unchanged,
    /// Line only in the newer revision.
    Added,
    /// Line only in the older revision.
    Removed,
}

/// One line on one side of a hunk.
///
/// `position` is shared by both sides of the hunk: an unchanged line has the
/// same position on each side, while added and removed lines occupy positions
/// the other side skips. Positions start at 1 within each hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    /// Alignment slot in the hunk's shared position domain.
    pub position: usize,
    /// 1-based line number within this line's own revision.
    pub number: usize,
    /// Line text without its terminator.
    pub content: String,
    /// Unchanged, added or removed.
    pub mode: LineMode,
}

impl DiffLine {
    /// Builds a line; mostly useful for synthetic hunks in tests.
    pub fn new(position: usize, number: usize, content: impl Into<String>, mode: LineMode) -> Self {
        Self { position, number, content: content.into(), mode }
    }
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.mode {
            LineMode::Unchanged => ' ',
            LineMode::Added => '+',
            LineMode::Removed => '-',
        };
        write!(f, "{}{} (position {}, line {})", marker, self.content, self.position, self.number)
    }
}

/// One contiguous change region between two revisions of a file.
///
/// `before_start` and `after_start` carry the unified-diff header numbers
/// (`@@ -before_start,.. +after_start,.. @@`). When a side is empty the number
/// names the line the change follows, `0` meaning the top of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffHunk {
    /// Header start line of the older revision.
    pub before_start: usize,
    /// Header start line of the newer revision.
    pub after_start: usize,
    /// Unchanged and removed lines, in position order.
    pub before: Vec<DiffLine>,
    /// Unchanged and added lines, in position order.
    pub after: Vec<DiffLine>,
}

impl DiffHunk {
    /// Highest position used by either side.
    pub fn last_position(&self) -> usize {
        let before = self.before.last().map_or(0, |l| l.position);
        let after = self.after.last().map_or(0, |l| l.position);
        before.max(after)
    }

    /// Newer-revision line number the hunk starts aligning at.
    pub fn seek_line(&self) -> usize {
        match self.after.first() {
            Some(line) => line.number,
            None => self.after_start + 1,
        }
    }

    /// Number of removed lines on the before side.
    pub fn removed_count(&self) -> usize {
        self.before.iter().filter(|l| l.mode == LineMode::Removed).count()
    }

    /// Number of added lines on the after side.
    pub fn added_count(&self) -> usize {
        self.after.iter().filter(|l| l.mode == LineMode::Added).count()
    }

    /// Checks the structural rules the alignment engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`TimelapseError::MalformedDiff`] when the hunk is empty, a side
    /// carries a mode it cannot hold, positions are not strictly increasing,
    /// or a removed line shares its position with an after-side line.
    pub fn validate(&self) -> Result<()> {
        if self.before.is_empty() && self.after.is_empty() {
            return Err(TimelapseError::malformed("hunk has no lines on either side"));
        }
        check_side(&self.before, "before", LineMode::Removed)?;
        check_side(&self.after, "after", LineMode::Added)?;

        // Both sides are sorted, so one merge pass finds shared positions.
        let mut after = self.after.iter().peekable();
        for line in self.before.iter().filter(|l| l.mode == LineMode::Removed) {
            while after.next_if(|a| a.position < line.position).is_some() {}
            if let Some(twin) = after.peek().filter(|a| a.position == line.position) {
                return Err(TimelapseError::malformed(format!(
                    "deleted line {} shares position {} with after-side line {}",
                    line.number, line.position, twin.number
                )));
            }
        }
        Ok(())
    }
}

fn check_side(lines: &[DiffLine], side: &str, changed: LineMode) -> Result<()> {
    let mut previous = 0;
    for line in lines {
        if line.mode != LineMode::Unchanged && line.mode != changed {
            return Err(TimelapseError::malformed(format!(
                "{side}-side line at position {} is marked {:?}",
                line.position, line.mode
            )));
        }
        if line.position <= previous {
            return Err(TimelapseError::malformed(format!(
                "{side}-side positions are not increasing at position {}",
                line.position
            )));
        }
        previous = line.position;
    }
    Ok(())
}

/// Full 40-character hex commit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CommitHash(String);

impl CommitHash {
    /// Length of a full hash in hex digits.
    pub const LEN: usize = 40;
    /// Length of the abbreviated form.
    pub const SHORT_LEN: usize = 7;

    /// The hash as lowercase hex.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form, as printed by `git log --oneline`.
    pub fn short(&self) -> &str {
        &self.0[..Self::SHORT_LEN]
    }

    /// Deterministic hash for revisions that never lived in a repository.
    ///
    /// `n` leads the hash so that abbreviated forms stay distinct.
    pub(crate) fn synthetic(n: u64) -> Self {
        CommitHash(format!("{:07x}{:033x}", n % 0x1000_0000, n))
    }
}

impl FromStr for CommitHash {
    type Err = TimelapseError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != Self::LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TimelapseError::InvalidHash(s.to_string()));
        }
        Ok(CommitHash(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a file's history, newest first when produced by a history source.
///
/// Serializes as `{hash, author, date, desc}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub hash: CommitHash,
    pub author: String,
    pub date: DateTime<FixedOffset>,
    /// Full commit message; may span several lines.
    #[serde(rename = "desc")]
    pub description: String,
}
