//! Per-file tree diffs converted to owned [`DiffHunk`]s.

use std::cell::{Cell, RefCell};

use git2::{Diff, DiffOptions, Oid, Repository, Tree};
use linelapse_core::{CommitHash, DiffHunk, DiffLine, LineMode};

/// Hunks turning `older`'s version of `path` into `newer`'s.
///
/// The pathspec is matched literally, so paths containing glob characters
/// select only themselves.
///
/// # Errors
///
/// Returns `git2::Error` if either commit cannot be found or the diff fails.
pub(crate) fn file_diff(
    repo: &Repository,
    older: &CommitHash,
    newer: &CommitHash,
    path: &str,
    context_lines: usize,
) -> Result<Vec<DiffHunk>, git2::Error> {
    let old_tree = commit_tree(repo, older)?;
    let new_tree = commit_tree(repo, newer)?;

    let mut opts = DiffOptions::new();
    opts.pathspec(path)
        .disable_pathspec_match(true)
        .context_lines(u32::try_from(context_lines).unwrap_or(u32::MAX));
    let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;
    extract_hunks(&diff)
}

/// Resolves a commit hash to its root tree.
pub(crate) fn commit_tree<'r>(repo: &'r Repository, hash: &CommitHash) -> Result<Tree<'r>, git2::Error> {
    let oid = Oid::from_str(hash.as_str())?;
    repo.find_commit(oid)?.tree()
}

/// Walks diff hunks and lines, converting to owned types.
///
/// Positions restart at 1 in every hunk and advance once per context, removed
/// or added line, which is exactly the shared position domain the alignment
/// engine expects. End-of-file newline markers are skipped.
fn extract_hunks(diff: &Diff<'_>) -> Result<Vec<DiffHunk>, git2::Error> {
    // Both callbacks run sequentially on this thread, so RefCell borrows
    // never overlap.
    let hunks: RefCell<Vec<DiffHunk>> = RefCell::new(Vec::new());
    let position = Cell::new(0usize);

    diff.foreach(
        &mut |_delta, _progress| true,
        None,
        Some(&mut |_delta, hunk| {
            position.set(0);
            hunks.borrow_mut().push(DiffHunk {
                before_start: hunk.old_start() as usize,
                after_start: hunk.new_start() as usize,
                ..Default::default()
            });
            true
        }),
        Some(&mut |_delta, _hunk, line| {
            let mode = match line.origin() {
                ' ' => LineMode::Unchanged,
                '-' => LineMode::Removed,
                '+' => LineMode::Added,
                _ => return true,
            };
            let mut hunks = hunks.borrow_mut();
            let Some(current) = hunks.last_mut() else {
                return true;
            };
            position.set(position.get() + 1);
            let at = position.get();
            let content = String::from_utf8_lossy(line.content())
                .trim_end_matches(|c| c == '\n' || c == '\r')
                .to_owned();
            let old_number = line.old_lineno().map_or(0, |n| n as usize);
            let new_number = line.new_lineno().map_or(0, |n| n as usize);
            match mode {
                LineMode::Unchanged => {
                    current.before.push(DiffLine::new(at, old_number, content.clone(), mode));
                    current.after.push(DiffLine::new(at, new_number, content, mode));
                }
                LineMode::Removed => current.before.push(DiffLine::new(at, old_number, content, mode)),
                LineMode::Added => current.after.push(DiffLine::new(at, new_number, content, mode)),
            }
            true
        }),
    )?;

    Ok(hunks.into_inner())
}
