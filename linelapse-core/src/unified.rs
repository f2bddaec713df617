//! Unified-diff text to [`DiffHunk`]s.
//!
//! Accepts the output of `git diff` or `diff -u` for a single file. File
//! headers and any other text outside `@@` hunks are skipped; each hunk's
//! header counts decide where its body ends.

use crate::error::{Result, TimelapseError};
use crate::types::{DiffHunk, DiffLine, LineMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    old_start: usize,
    old_count: usize,
    new_start: usize,
    new_count: usize,
}

/// Parses every hunk in `text`.
///
/// # Errors
///
/// Returns [`TimelapseError::MalformedDiff`] for an unreadable `@@` header, a
/// body line with an unknown marker, or a body shorter than its header says.
pub fn parse_hunks(text: &str) -> Result<Vec<DiffHunk>> {
    let mut lines = text.lines();
    let mut hunks = Vec::new();
    while let Some(line) = lines.next() {
        if line.starts_with("@@") {
            let header = parse_header(line)?;
            hunks.push(parse_body(header, &mut lines)?);
        }
    }
    Ok(hunks)
}

fn parse_header(line: &str) -> Result<Header> {
    let bad = || TimelapseError::malformed(format!("bad hunk header {line:?}"));
    let ranges = line
        .strip_prefix("@@ ")
        .and_then(|rest| rest.split_once(" @@"))
        .map(|(ranges, _)| ranges)
        .ok_or_else(bad)?;
    let (old, new) = ranges.split_once(' ').ok_or_else(bad)?;
    let (old_start, old_count) = parse_range(old, '-').ok_or_else(bad)?;
    let (new_start, new_count) = parse_range(new, '+').ok_or_else(bad)?;
    Ok(Header { old_start, old_count, new_start, new_count })
}

/// `-12,3` or `+7`; a missing count means 1.
fn parse_range(range: &str, sign: char) -> Option<(usize, usize)> {
    let range = range.strip_prefix(sign)?;
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

fn parse_body<'a>(header: Header, lines: &mut impl Iterator<Item = &'a str>) -> Result<DiffHunk> {
    let mut hunk = DiffHunk {
        before_start: header.old_start,
        after_start: header.new_start,
        ..Default::default()
    };
    let (mut old_seen, mut new_seen, mut position) = (0, 0, 0);

    while old_seen < header.old_count || new_seen < header.new_count {
        let Some(line) = lines.next() else {
            return Err(TimelapseError::malformed(format!(
                "hunk at -{},{} ended after {} of {} old and {} of {} new lines",
                header.old_start, header.old_count, old_seen, header.old_count, new_seen, header.new_count
            )));
        };
        // "\ No newline at end of file"
        if line.starts_with('\\') {
            continue;
        }
        let (marker, content) = match line.chars().next() {
            Some(marker) => (marker, &line[marker.len_utf8()..]),
            // Some tools strip the space from empty context lines.
            None => (' ', ""),
        };
        position += 1;
        let old_number = header.old_start + old_seen;
        let new_number = header.new_start + new_seen;
        match marker {
            ' ' => {
                hunk.before.push(DiffLine::new(position, old_number, content, LineMode::Unchanged));
                hunk.after.push(DiffLine::new(position, new_number, content, LineMode::Unchanged));
                old_seen += 1;
                new_seen += 1;
            }
            '-' => {
                hunk.before.push(DiffLine::new(position, old_number, content, LineMode::Removed));
                old_seen += 1;
            }
            '+' => {
                hunk.after.push(DiffLine::new(position, new_number, content, LineMode::Added));
                new_seen += 1;
            }
            _ => {
                return Err(TimelapseError::malformed(format!("unexpected line in hunk: {line:?}")));
            }
        }
    }

    if old_seen > header.old_count || new_seen > header.new_count {
        return Err(TimelapseError::malformed(format!(
            "hunk at -{},{} has more lines than its header declares",
            header.old_start, header.old_count
        )));
    }
    Ok(hunk)
}
