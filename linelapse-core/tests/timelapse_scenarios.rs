//! End-to-end reconstructions over in-memory histories.
//!
//! Exercises: reconstruct, TimelapseBuilder (commit limit, error paths),
//! align_hunk atomicity, Timelapse::verify.

use linelapse_core::Disposition::{Deleted, Present};
use linelapse_core::{
    align_hunk, reconstruct, BuildOptions, Commit, CommitHash, CommitStream, ContentSource,
    DiffHunk, DiffLine, HistorySource, LineMode, MemoryHistory, MemoryRepo, Revision, Timelapse,
    TimelapseBuilder, TimelapseError,
};

const PATH: &str = "notes.txt";

fn repo(revisions: &[&str]) -> MemoryRepo {
    let mut repo = MemoryRepo::new(PATH);
    for (i, content) in revisions.iter().enumerate() {
        repo.commit(*content, &format!("revision {}", i + 1));
    }
    repo
}

fn rebuild(repo: &MemoryRepo) -> Timelapse {
    let timelapse = reconstruct(repo, PATH, &BuildOptions::default()).unwrap();
    let current = repo.content(Revision::Current, PATH).unwrap();
    timelapse.verify(&current).unwrap();
    timelapse
}

#[test]
fn single_deletion_lands_between_neighbours() {
    let timelapse = rebuild(&repo(&["one\ntwo\nthree", "one\nthree"]));
    assert_eq!(
        timelapse.outline(),
        vec![(Present, vec!["one"]), (Deleted, vec!["two"]), (Present, vec!["three"])]
    );
}

#[test]
fn no_history_is_a_single_present_segment() {
    let timelapse = rebuild(&repo(&["a\nb\nc"]));
    assert_eq!(timelapse.outline(), vec![(Present, vec!["a", "b", "c"])]);
    assert_eq!(timelapse.len(), 1);
}

#[test]
fn sequential_deletions_keep_their_own_neighbours() {
    let timelapse = rebuild(&repo(&["a\nb\nc\nd", "a\nc\nd", "a\nc"]));
    assert_eq!(
        timelapse.outline(),
        vec![
            (Present, vec!["a"]),
            (Deleted, vec!["b"]),
            (Present, vec!["c"]),
            (Deleted, vec!["d"]),
        ]
    );
}

#[test]
fn removed_run_is_one_segment() {
    let timelapse = rebuild(&repo(&["a\nb\nc\nd\ne\n", "a\ne\n"]));
    assert_eq!(
        timelapse.outline(),
        vec![(Present, vec!["a"]), (Deleted, vec!["b", "c", "d"]), (Present, vec!["e"])]
    );
    assert_eq!(timelapse.deleted_line_count(), 3);
}

#[test]
fn older_deletion_is_placed_among_newer_deleted_lines() {
    let timelapse = rebuild(&repo(&["a\nb\nc\nd", "a\nb\nc", "c"]));
    assert_eq!(
        timelapse.outline(),
        vec![(Deleted, vec!["a", "b"]), (Present, vec!["c"]), (Deleted, vec!["d"])]
    );
}

#[test]
fn modified_line_shows_old_text_before_new() {
    let timelapse = rebuild(&repo(&["a\nold\nc", "a\nnew\nc"]));
    assert_eq!(
        timelapse.outline(),
        vec![(Present, vec!["a"]), (Deleted, vec!["old"]), (Present, vec!["new", "c"])]
    );
}

#[test]
fn line_added_then_removed_is_recorded_once() {
    let timelapse = rebuild(&repo(&["a", "a\nx", "a"]));
    assert_eq!(timelapse.outline(), vec![(Present, vec!["a"]), (Deleted, vec!["x"])]);
}

#[test]
fn several_hunks_in_one_pair() {
    let old: Vec<String> = (1..=12).map(|n| format!("l{n}")).collect();
    let mut new = old.clone();
    new.remove(10);
    new[1] = "N".to_string();

    let mut repo = MemoryRepo::new(PATH).with_context(1);
    repo.commit(old.join("\n"), "first");
    repo.commit(new.join("\n"), "second");
    let timelapse = rebuild(&repo);

    let middle: Vec<String> = std::iter::once("N".to_string())
        .chain((3..=10).map(|n| format!("l{n}")))
        .collect();
    let middle: Vec<&str> = middle.iter().map(String::as_str).collect();
    assert_eq!(
        timelapse.outline(),
        vec![
            (Present, vec!["l1"]),
            (Deleted, vec!["l2"]),
            (Present, middle),
            (Deleted, vec!["l11"]),
            (Present, vec!["l12"]),
        ]
    );
}

#[test]
fn commit_limit_stops_history_early() {
    let repo = repo(&["a\nb\nc\n", "a\nc\n", "c\n"]);
    let mut history = repo.history(PATH).unwrap();
    let options = BuildOptions { max_commits: Some(2) };

    let timelapse = TimelapseBuilder::new(PATH, &repo)
        .with_options(options)
        .build("c\n", &mut history)
        .unwrap();

    assert_eq!(timelapse.outline(), vec![(Deleted, vec!["a"]), (Present, vec!["c"])]);
    assert!(history.is_stopped());
    assert!(history.next().is_none());
}

#[test]
fn empty_diff_between_touching_commits_is_an_error() {
    let repo = repo(&["one\n", "two\n"]);
    let empty = |_: &CommitHash, _: &CommitHash, _: &str| -> linelapse_core::Result<Vec<DiffHunk>> {
        Ok(vec![])
    };
    let mut history = MemoryHistory::new(repo.commits());
    let err = TimelapseBuilder::new(PATH, &empty).build("two\n", &mut history).unwrap_err();
    match &err {
        TimelapseError::EmptyDiff { older, newer, path } => {
            assert_eq!(older, repo.commits()[1].hash.short());
            assert_eq!(newer, repo.commits()[0].hash.short());
            assert_ne!(older, newer);
            assert_eq!(path, PATH);
        }
        other => panic!("expected an empty diff, got {other:?}"),
    }
    assert!(err.is_alignment_error());
    assert!(history.is_stopped());
}

#[test]
fn line_ending_only_revisions_are_skipped() {
    let timelapse = rebuild(&repo(&["a\r\nb\r\n", "a\nb\n"]));
    assert_eq!(timelapse.outline(), vec![(Present, vec!["a", "b"])]);

    let timelapse = rebuild(&repo(&["a\nb\nc\n", "a\r\nc\r\n", "a\nc\n"]));
    assert_eq!(
        timelapse.outline(),
        vec![(Present, vec!["a"]), (Deleted, vec!["b"]), (Present, vec!["c"])]
    );
}

#[test]
fn malformed_diff_aborts_reconstruction() {
    let repo = repo(&["one\ntwo\n", "one\n2\n"]);
    let bad = |_: &CommitHash, _: &CommitHash, _: &str| -> linelapse_core::Result<Vec<DiffHunk>> {
        Ok(vec![DiffHunk {
            before_start: 1,
            after_start: 1,
            before: vec![
                DiffLine::new(1, 1, "one", LineMode::Unchanged),
                DiffLine::new(2, 2, "two", LineMode::Removed),
            ],
            after: vec![
                DiffLine::new(1, 1, "one", LineMode::Unchanged),
                DiffLine::new(2, 2, "2", LineMode::Added),
            ],
        }])
    };
    let mut history = repo.history(PATH).unwrap();
    let err = TimelapseBuilder::new(PATH, &bad).build("one\n2\n", &mut history).unwrap_err();
    assert!(matches!(err, TimelapseError::MalformedDiff(_)));
    assert!(history.is_stopped());

    // The same hunk applied directly leaves the timelapse as it was.
    let hunks = bad(&repo.commits()[1].hash, &repo.commits()[0].hash, PATH).unwrap();
    let mut timelapse = Timelapse::seed("one\n2\n");
    let untouched = timelapse.clone();
    assert!(align_hunk(&hunks[0], &mut timelapse).is_err());
    assert_eq!(timelapse, untouched);
}

/// Yields its items once, then nothing; records whether it was stopped.
struct ScriptedHistory {
    items: std::vec::IntoIter<linelapse_core::Result<Commit>>,
    stopped: bool,
}

impl Iterator for ScriptedHistory {
    type Item = linelapse_core::Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

impl CommitStream for ScriptedHistory {
    fn stop(&mut self) {
        self.stopped = true;
    }
}

#[test]
fn history_errors_propagate_and_stop_the_stream() {
    let repo = repo(&["a\nb\n", "a\n"]);
    let newest = repo.commits()[0].clone();
    let mut history = ScriptedHistory {
        items: vec![Ok(newest), Err(TimelapseError::backend("log stream closed"))].into_iter(),
        stopped: false,
    };

    let err = TimelapseBuilder::new(PATH, &repo).build("a\n", &mut history).unwrap_err();
    assert!(matches!(err, TimelapseError::Backend(_)));
    assert!(history.stopped);
}
