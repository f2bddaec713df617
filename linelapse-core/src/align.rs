//! Alignment engine: merges one hunk's deleted runs into a [`Timelapse`].
//!
//! Both sides of a hunk share a position domain. [`AlignCursor`] walks that
//! domain one position at a time as a plain value, tracking which before-side
//! and after-side line is current; [`align_hunk`] drives it and keeps a
//! [`ResultCursor`] on the timelapse line matching the after-side line at the
//! current position.

use tracing::trace;

use crate::error::{Result, TimelapseError};
use crate::timelapse::{ResultCursor, Timelapse};
use crate::types::{DiffHunk, DiffLine, LineMode};

/// Position state over one hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignCursor {
    position: usize,
    last_position: usize,
    before: usize,
    after: usize,
}

impl AlignCursor {
    /// Cursor at position 1 of `hunk`.
    pub fn new(hunk: &DiffHunk) -> Self {
        Self { position: 1, last_position: hunk.last_position(), before: 0, after: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// True once the cursor stands on the hunk's final position.
    pub fn is_last(&self) -> bool {
        self.position >= self.last_position
    }

    /// Before-side line at the current position, if that side has one.
    pub fn before_line<'h>(&self, hunk: &'h DiffHunk) -> Option<&'h DiffLine> {
        hunk.before.get(self.before).filter(|l| l.position == self.position)
    }

    /// After-side line at the current position, if that side has one.
    pub fn after_line<'h>(&self, hunk: &'h DiffHunk) -> Option<&'h DiffLine> {
        hunk.after.get(self.after).filter(|l| l.position == self.position)
    }

    /// The removed line at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`TimelapseError::MalformedDiff`] if an after-side line claims
    /// the same position.
    pub fn removed_at<'h>(&self, hunk: &'h DiffHunk) -> Result<Option<&'h DiffLine>> {
        let Some(line) = self.before_line(hunk).filter(|l| l.mode == LineMode::Removed) else {
            return Ok(None);
        };
        if let Some(twin) = self.after_line(hunk) {
            return Err(TimelapseError::malformed(format!(
                "deleted line {} shares position {} with after-side line {}",
                line.number, line.position, twin.number
            )));
        }
        Ok(Some(line))
    }

    /// True when the next before-side line extends the removed run at the
    /// current position: removed too, and adjacent both in number and position.
    pub fn continues_run(&self, hunk: &DiffHunk) -> bool {
        match (self.before_line(hunk), hunk.before.get(self.before + 1)) {
            (Some(current), Some(next)) => {
                current.mode == LineMode::Removed
                    && next.mode == LineMode::Removed
                    && next.number == current.number + 1
                    && next.position == current.position + 1
            }
            _ => false,
        }
    }

    /// Moves to the next position, passing whichever lines sit on this one.
    ///
    /// Returns the after-side line passed, if any; the caller steps its result
    /// cursor once for it.
    pub fn advance<'h>(self, hunk: &'h DiffHunk) -> (Self, Option<&'h DiffLine>) {
        let mut next = self;
        if self.before_line(hunk).is_some() {
            next.before += 1;
        }
        let passed = self.after_line(hunk);
        if passed.is_some() {
            next.after += 1;
        }
        next.position += 1;
        (next, passed)
    }
}

/// What one hunk did to the timelapse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HunkReport {
    /// Deleted segments spliced in.
    pub deleted_runs: usize,
    /// Lines across those segments.
    pub deleted_lines: usize,
    /// After-side lines marked as added by this pair.
    pub departed_lines: usize,
}

/// Splices every removed run of `hunk` into `timelapse`.
///
/// The hunk is checked in full before anything is touched: structural
/// problems surface as [`TimelapseError::MalformedDiff`], and a timelapse too
/// short for the after side as [`TimelapseError::AlignmentOverrun`]. On
/// error the timelapse is left exactly as it was.
pub fn align_hunk(hunk: &DiffHunk, timelapse: &mut Timelapse) -> Result<HunkReport> {
    hunk.validate()?;
    let start = timelapse.seek(hunk.seek_line())?;
    let available = timelapse.visible_from(start);
    if available < hunk.after.len() {
        return Err(TimelapseError::overrun(format!(
            "hunk at line {} spans {} lines but only {} remain",
            hunk.seek_line(),
            hunk.after.len(),
            available
        )));
    }

    let mut report = HunkReport::default();
    let mut cursor = AlignCursor::new(hunk);
    let mut result: ResultCursor = start;
    loop {
        if let Some(first) = cursor.removed_at(hunk)? {
            let mut run = vec![first.content.clone()];
            while cursor.continues_run(hunk) {
                cursor = cursor.advance(hunk).0;
                if let Some(line) = cursor.before_line(hunk) {
                    run.push(line.content.clone());
                }
            }
            trace!(position = cursor.position(), lines = run.len(), "splicing deleted run");
            report.deleted_runs += 1;
            report.deleted_lines += run.len();
            result = timelapse.splice(result, run);
        } else if cursor.after_line(hunk).is_some_and(|l| l.mode == LineMode::Added) {
            timelapse.depart(result);
            report.departed_lines += 1;
        }

        if cursor.is_last() {
            break;
        }
        let (next, passed) = cursor.advance(hunk);
        if passed.is_some() {
            result = timelapse.next_visible(result)?;
        }
        cursor = next;
    }
    Ok(report)
}
