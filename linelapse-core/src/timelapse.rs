//! Result model: the ordered segment arena a reconstruction grows.
//!
//! A [`Timelapse`] is a `Vec<Segment>` addressed by index. Every structural
//! edit goes through [`Timelapse::splice`], which replaces one segment with
//! up to three, so cursors are plain `(segment, line)` pairs that the editing
//! code repositions explicitly.
//!
//! Besides its text and disposition, every line carries a horizon marker that
//! records whether it belongs to the newer revision of the commit pair being
//! aligned. Seeks and cursor steps count only those lines, which keeps the
//! diff's after-side numbering valid once deleted lines from later pairs and
//! lines added in earlier pairs are both in the arena.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, TimelapseError};

/// Whether a segment's lines survive in the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Present,
    Deleted,
}

/// Where a line stands relative to the commit pair being aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Horizon {
    /// In the newer revision, and in the older one unless a hunk says otherwise.
    Visible,
    /// Spliced in by the current pair; only in the older revision.
    Arriving,
    /// Added by the current pair; only in the newer revision.
    Departing,
    /// Not in any revision still to be visited.
    Gone,
}

impl Horizon {
    fn in_newer(self) -> bool {
        matches!(self, Horizon::Visible | Horizon::Departing)
    }

    fn settled(self) -> Self {
        match self {
            Horizon::Arriving => Horizon::Visible,
            Horizon::Departing => Horizon::Gone,
            other => other,
        }
    }
}

/// A non-empty run of lines sharing one disposition.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    disposition: Disposition,
    lines: Vec<String>,
    #[serde(skip)]
    horizon: Vec<Horizon>,
}

impl Segment {
    fn new(disposition: Disposition, lines: Vec<String>, horizon: Horizon) -> Self {
        let horizon = vec![horizon; lines.len()];
        Self { disposition, lines, horizon }
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_present(&self) -> bool {
        self.disposition == Disposition::Present
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Splits off `lines[at..]` into a new segment with the same disposition.
    fn split_off(&mut self, at: usize) -> Segment {
        Segment {
            disposition: self.disposition,
            lines: self.lines.split_off(at),
            horizon: self.horizon.split_off(at),
        }
    }
}

// Horizon markers are walk bookkeeping, not content.
impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.disposition == other.disposition && self.lines == other.lines
    }
}

impl Eq for Segment {}

/// Address of one line in a [`Timelapse`].
///
/// `segment == len()` with `line == 0` is the end position, one past the last
/// line; splicing there appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultCursor {
    pub segment: usize,
    pub line: usize,
}

/// A consecutive stretch of segments with one disposition, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run<'a> {
    pub disposition: Disposition,
    /// Current-file line number of the first line, for present runs.
    pub first_line: Option<usize>,
    pub lines: Vec<&'a str>,
}

/// A file's current lines interleaved with every line its history deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Timelapse {
    segments: Vec<Segment>,
}

impl Timelapse {
    /// One present segment holding `current` split into lines.
    ///
    /// Empty content yields a timelapse with no segments.
    pub fn seed(current: &str) -> Self {
        let lines: Vec<String> = current.lines().map(str::to_owned).collect();
        if lines.is_empty() {
            return Self::default();
        }
        Self { segments: vec![Segment::new(Disposition::Present, lines, Horizon::Visible)] }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn present_line_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_present()).map(Segment::len).sum()
    }

    pub fn deleted_line_count(&self) -> usize {
        self.segments.iter().filter(|s| !s.is_present()).map(Segment::len).sum()
    }

    /// Concatenated lines of every present segment, in order.
    pub fn present_lines(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| s.is_present())
            .flat_map(|s| s.lines.iter().map(String::as_str))
            .collect()
    }

    /// Every line of every segment, in order.
    pub fn all_lines(&self) -> Vec<&str> {
        self.segments.iter().flat_map(|s| s.lines.iter().map(String::as_str)).collect()
    }

    /// Segment-by-segment view, handy for asserting on a whole reconstruction.
    pub fn outline(&self) -> Vec<(Disposition, Vec<&str>)> {
        self.segments
            .iter()
            .map(|s| (s.disposition, s.lines.iter().map(String::as_str).collect()))
            .collect()
    }

    /// Alternating present/deleted runs.
    ///
    /// Deleted segments spliced into the same gap by different commit pairs
    /// are adjacent in the arena; they are merged here because display has no
    /// use for the boundary between them.
    pub fn runs(&self) -> Vec<Run<'_>> {
        let mut runs: Vec<Run<'_>> = Vec::new();
        let mut line_number = 1;
        for segment in &self.segments {
            let lines = segment.lines.iter().map(String::as_str);
            match runs.last_mut() {
                Some(run) if run.disposition == segment.disposition => run.lines.extend(lines),
                _ => runs.push(Run {
                    disposition: segment.disposition,
                    first_line: segment.is_present().then_some(line_number),
                    lines: lines.collect(),
                }),
            }
            if segment.is_present() {
                line_number += segment.len();
            }
        }
        runs
    }

    /// The position one past the last line.
    pub fn end(&self) -> ResultCursor {
        ResultCursor { segment: self.segments.len(), line: 0 }
    }

    pub fn is_end(&self, cursor: ResultCursor) -> bool {
        cursor.segment >= self.segments.len()
    }

    /// Locates line `number` (1-based) of the newer revision.
    ///
    /// Only lines of that revision are counted; with nothing but the seed
    /// applied this means present lines, with deleted segments skipped.
    /// `number` one past the last counted line resolves to [`Timelapse::end`].
    ///
    /// # Errors
    ///
    /// Returns [`TimelapseError::AlignmentOverrun`] when `number` is zero or
    /// lies beyond the end.
    pub fn seek(&self, number: usize) -> Result<ResultCursor> {
        if number == 0 {
            return Err(TimelapseError::overrun("line numbers start at 1"));
        }
        let mut remaining = number;
        for (s, segment) in self.segments.iter().enumerate() {
            for (l, horizon) in segment.horizon.iter().enumerate() {
                if horizon.in_newer() {
                    remaining -= 1;
                    if remaining == 0 {
                        return Ok(ResultCursor { segment: s, line: l });
                    }
                }
            }
        }
        if remaining == 1 {
            return Ok(self.end());
        }
        Err(TimelapseError::overrun(format!(
            "seek to line {} but the revision has {} lines",
            number,
            number - remaining
        )))
    }

    /// Steps from `cursor` to the next line of the newer revision, rolling
    /// over segment boundaries; returns the end position when none is left.
    ///
    /// # Errors
    ///
    /// Returns [`TimelapseError::AlignmentOverrun`] when `cursor` is already
    /// at the end.
    pub fn next_visible(&self, cursor: ResultCursor) -> Result<ResultCursor> {
        if self.is_end(cursor) {
            return Err(TimelapseError::overrun(
                "result cursor advanced past the last segment",
            ));
        }
        let mut line = cursor.line + 1;
        for (s, segment) in self.segments.iter().enumerate().skip(cursor.segment) {
            if let Some(offset) = segment.horizon.iter().skip(line).position(|h| h.in_newer()) {
                return Ok(ResultCursor { segment: s, line: line + offset });
            }
            line = 0;
        }
        Ok(self.end())
    }

    /// Number of newer-revision lines at or after `cursor`.
    pub fn visible_from(&self, cursor: ResultCursor) -> usize {
        self.segments
            .iter()
            .enumerate()
            .skip(cursor.segment)
            .map(|(s, segment)| {
                let from = if s == cursor.segment { cursor.line } else { 0 };
                segment.horizon.iter().skip(from).filter(|h| h.in_newer()).count()
            })
            .sum()
    }

    /// Inserts a deleted segment holding `lines` immediately before `cursor`.
    ///
    /// The segment under the cursor is split into its fragments, with empty
    /// fragments dropped. Returns the cursor of the line that was at `cursor`,
    /// now at line 0 of the segment after the inserted one (or the end).
    pub fn splice(&mut self, cursor: ResultCursor, lines: Vec<String>) -> ResultCursor {
        if lines.is_empty() {
            return cursor;
        }
        let deleted = Segment::new(Disposition::Deleted, lines, Horizon::Arriving);
        if self.is_end(cursor) {
            self.segments.push(deleted);
            return self.end();
        }

        let mut at = cursor.segment;
        let aft = self.segments[at].split_off(cursor.line);
        if self.segments[at].is_empty() {
            self.segments.remove(at);
        } else {
            at += 1;
        }
        self.segments.insert(at, deleted);
        at += 1;
        if !aft.is_empty() {
            self.segments.insert(at, aft);
        }
        ResultCursor { segment: at, line: 0 }
    }

    /// Marks the line at `cursor` as added by the pair being aligned.
    pub(crate) fn depart(&mut self, cursor: ResultCursor) {
        if let Some(horizon) = self
            .segments
            .get_mut(cursor.segment)
            .and_then(|s| s.horizon.get_mut(cursor.line))
        {
            *horizon = Horizon::Departing;
        }
    }

    /// Closes a commit pair: its older revision becomes the next pair's newer one.
    pub(crate) fn settle(&mut self) {
        for horizon in self.segments.iter_mut().flat_map(|s| s.horizon.iter_mut()) {
            *horizon = horizon.settled();
        }
    }

    /// Checks that present lines reproduce `current` and no segment is empty.
    ///
    /// # Errors
    ///
    /// Returns [`TimelapseError::InvariantViolated`] describing the first mismatch.
    pub fn verify(&self, current: &str) -> Result<()> {
        if let Some(index) = self.segments.iter().position(Segment::is_empty) {
            return Err(TimelapseError::InvariantViolated(format!("segment {index} is empty")));
        }
        let expected: Vec<&str> = current.lines().collect();
        let present = self.present_lines();
        if let Some(index) = expected.iter().zip(&present).position(|(a, b)| a != b) {
            return Err(TimelapseError::InvariantViolated(format!(
                "present line {} is {:?}, current content has {:?}",
                index + 1,
                present[index],
                expected[index]
            )));
        }
        if expected.len() != present.len() {
            return Err(TimelapseError::InvariantViolated(format!(
                "{} present lines for {} lines of current content",
                present.len(),
                expected.len()
            )));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Timelapse {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Timelapse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for run in self.runs() {
            match run.first_line {
                Some(first) => {
                    for (offset, line) in run.lines.iter().enumerate() {
                        writeln!(f, "{:>6} | {}", first + offset, line)?;
                    }
                }
                None => {
                    for line in &run.lines {
                        writeln!(f, "{:>6} - {}", "", line)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_seed() {
        let timelapse = Timelapse::seed("a\nb\nc\n");
        assert_eq!(timelapse.outline(), vec![(Disposition::Present, vec!["a", "b", "c"])]);
        assert_eq!(timelapse.present_line_count(), 3);
        assert!(timelapse.verify("a\nb\nc").is_ok());

        let empty = Timelapse::seed("");
        assert!(empty.is_empty());
        assert_eq!(empty.seek(1).unwrap(), empty.end());
    }

    #[test]
    fn test_splice_middle_splits_segment() {
        let mut timelapse = Timelapse::seed("one\nthree");
        let cursor = timelapse.seek(2).unwrap();
        assert_eq!(cursor, ResultCursor { segment: 0, line: 1 });

        let after = timelapse.splice(cursor, owned(&["two"]));
        assert_eq!(after, ResultCursor { segment: 2, line: 0 });
        assert_eq!(
            timelapse.outline(),
            vec![
                (Disposition::Present, vec!["one"]),
                (Disposition::Deleted, vec!["two"]),
                (Disposition::Present, vec!["three"]),
            ]
        );
        assert!(timelapse.verify("one\nthree").is_ok());
    }

    #[test]
    fn test_splice_at_edges_omits_empty_fragments() {
        let mut timelapse = Timelapse::seed("b");
        let front = timelapse.splice(ResultCursor::default(), owned(&["a"]));
        assert_eq!(front, ResultCursor { segment: 1, line: 0 });

        let end = timelapse.splice(timelapse.end(), owned(&["c"]));
        assert_eq!(end, timelapse.end());
        assert_eq!(
            timelapse.outline(),
            vec![
                (Disposition::Deleted, vec!["a"]),
                (Disposition::Present, vec!["b"]),
                (Disposition::Deleted, vec!["c"]),
            ]
        );
    }

    #[test]
    fn test_seek_skips_spliced_lines_until_settled() {
        let mut timelapse = Timelapse::seed("a\nc");
        let cursor = timelapse.seek(2).unwrap();
        timelapse.splice(cursor, owned(&["b"]));

        // Still aligning the same pair: "b" is not part of the newer revision.
        assert_eq!(timelapse.seek(2).unwrap(), ResultCursor { segment: 2, line: 0 });
        assert_eq!(timelapse.visible_from(ResultCursor::default()), 2);

        // Next pair: "b" belongs to the newer revision.
        timelapse.settle();
        assert_eq!(timelapse.seek(2).unwrap(), ResultCursor { segment: 1, line: 0 });
        assert_eq!(timelapse.visible_from(ResultCursor::default()), 3);
    }

    #[test]
    fn test_departed_lines_leave_after_settle() {
        let mut timelapse = Timelapse::seed("a\nnew\nc");
        timelapse.depart(ResultCursor { segment: 0, line: 1 });
        assert_eq!(timelapse.seek(3).unwrap(), ResultCursor { segment: 0, line: 2 });

        timelapse.settle();
        assert_eq!(timelapse.seek(2).unwrap(), ResultCursor { segment: 0, line: 2 });
        assert!(timelapse.seek(4).is_err());
        assert_eq!(timelapse.present_line_count(), 3);
    }

    #[test]
    fn test_next_visible_rolls_over_and_overruns() {
        let mut timelapse = Timelapse::seed("a\nb");
        timelapse.splice(ResultCursor { segment: 0, line: 1 }, owned(&["x"]));
        timelapse.settle();

        let first = ResultCursor::default();
        let second = timelapse.next_visible(first).unwrap();
        assert_eq!(second, ResultCursor { segment: 1, line: 0 });
        let third = timelapse.next_visible(second).unwrap();
        assert_eq!(third, ResultCursor { segment: 2, line: 0 });
        let end = timelapse.next_visible(third).unwrap();
        assert!(timelapse.is_end(end));

        let err = timelapse.next_visible(end).unwrap_err();
        assert!(matches!(err, TimelapseError::AlignmentOverrun(_)));
    }

    #[test]
    fn test_seek_errors() {
        let timelapse = Timelapse::seed("a\nb");
        assert!(matches!(timelapse.seek(0), Err(TimelapseError::AlignmentOverrun(_))));
        assert_eq!(timelapse.seek(3).unwrap(), timelapse.end());
        assert!(matches!(timelapse.seek(4), Err(TimelapseError::AlignmentOverrun(_))));
    }

    #[test]
    fn test_runs_merge_adjacent_deleted_segments() {
        let mut timelapse = Timelapse::seed("a\nd");
        let cursor = timelapse.splice(ResultCursor { segment: 0, line: 1 }, owned(&["c"]));
        timelapse.settle();
        let deleted = ResultCursor { segment: cursor.segment - 1, line: 0 };
        timelapse.splice(deleted, owned(&["b"]));

        assert_eq!(timelapse.len(), 4);
        let runs = timelapse.runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].disposition, Disposition::Deleted);
        assert_eq!(runs[1].lines, vec!["b", "c"]);
        assert_eq!(runs[2].first_line, Some(2));
    }

    #[test]
    fn test_verify_reports_mismatch() {
        let timelapse = Timelapse::seed("a\nb");
        let err = timelapse.verify("a\nc").unwrap_err();
        assert!(err.to_string().contains("present line 2"));
        assert!(timelapse.verify("a").is_err());
    }

    #[test]
    fn test_display() {
        let mut timelapse = Timelapse::seed("one\nthree");
        timelapse.splice(ResultCursor { segment: 0, line: 1 }, owned(&["two"]));
        assert_eq!(
            timelapse.to_string(),
            "     1 | one\n       - two\n     2 | three\n"
        );
    }

    #[test]
    fn test_serialize_shape() {
        let mut timelapse = Timelapse::seed("one\nthree");
        timelapse.splice(ResultCursor { segment: 0, line: 1 }, owned(&["two"]));
        let json = serde_json::to_value(&timelapse).unwrap();
        assert_eq!(json[1]["disposition"], "deleted");
        assert_eq!(json[1]["lines"][0], "two");
        assert!(json[0].get("horizon").is_none());
    }
}
