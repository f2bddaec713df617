//! Background thread that streams a file's history, newest first.
//!
//! The thread opens its own `git2::Repository` and walks first-parent history
//! from HEAD, emitting each commit whose blob at the path differs from its
//! parent's. Commits cross a bounded(1) channel, so at most one is in flight.
//! A second, zero-capacity channel is never written: dropping its sender is
//! the stop signal. The producer selects on both, so a consumer that stops
//! early never leaves it blocked on a send, and it polls the stop channel
//! before every revwalk step, so long stretches of commits that leave the
//! file alone do not delay a stop.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use git2::{ErrorCode, Oid, Repository, Revwalk, Sort, Tree};
use linelapse_core::{Commit, CommitStream, Result};
use tracing::{debug, warn};

use super::backend;

/// Consumer end of a history producer thread.
///
/// Dropping the stream stops the producer and joins it.
pub struct HistoryStream {
    rx: Receiver<Result<Commit>>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

/// Spawns the producer for `path` (relative to the working tree) in the
/// repository at `repo_path`.
///
/// # Errors
///
/// Returns [`linelapse_core::TimelapseError::Io`] if the thread cannot be spawned.
pub fn spawn_history(repo_path: PathBuf, path: String) -> Result<HistoryStream> {
    let (tx, rx) = bounded(1);
    let (stop_tx, stop_rx) = bounded::<()>(0);
    let handle = thread::Builder::new()
        .name("linelapse-history".to_owned())
        .spawn(move || history_loop(&repo_path, &path, &tx, &stop_rx))?;
    Ok(HistoryStream { rx, stop_tx: Some(stop_tx), handle: Some(handle) })
}

impl Iterator for HistoryStream {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stop_tx.is_none() {
            return None;
        }
        self.rx.recv().ok()
    }
}

impl CommitStream for HistoryStream {
    fn stop(&mut self) {
        // Disconnecting the stop channel wakes the producer's select.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("history producer panicked");
            }
        }
    }
}

impl Drop for HistoryStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Entry point for the producer thread.
///
/// Runs until history is exhausted, an error has been delivered, or the
/// consumer stops listening.
fn history_loop(repo_path: &Path, path: &str, tx: &Sender<Result<Commit>>, stop_rx: &Receiver<()>) {
    let repo = match Repository::open(repo_path) {
        Ok(r) => r,
        Err(e) => {
            deliver(tx, stop_rx, Err(backend(e)));
            return;
        }
    };
    let mut walk = match FileHistory::new(&repo, path, stop_rx) {
        Ok(w) => w,
        Err(e) => {
            deliver(tx, stop_rx, Err(backend(e)));
            return;
        }
    };

    let mut sent = 0usize;
    for item in walk.by_ref() {
        let failed = item.is_err();
        if !deliver(tx, stop_rx, item) {
            debug!(path, sent, "history consumer stopped early");
            return;
        }
        if failed {
            return;
        }
        sent += 1;
    }
    if walk.stopped {
        debug!(path, sent, "history consumer stopped during the walk");
    } else {
        debug!(path, sent, "history exhausted");
    }
}

/// Hands one item to the consumer. Returns false once the consumer is gone.
fn deliver(tx: &Sender<Result<Commit>>, stop_rx: &Receiver<()>, item: Result<Commit>) -> bool {
    select! {
        send(tx, item) -> sent => sent.is_ok(),
        recv(stop_rx) -> _ => false,
    }
}

/// How a commit relates to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Touch {
    Changed,
    /// The file first appears here.
    Created,
    Unchanged,
    /// The file does not exist here.
    Absent,
}

/// First-parent walk from HEAD yielding the commits that changed one path.
///
/// Ends early once the consumer drops its end of `stop_rx`.
struct FileHistory<'r> {
    repo: &'r Repository,
    revwalk: Revwalk<'r>,
    path: PathBuf,
    stop_rx: &'r Receiver<()>,
    done: bool,
    stopped: bool,
}

impl<'r> FileHistory<'r> {
    fn new(
        repo: &'r Repository,
        path: &str,
        stop_rx: &'r Receiver<()>,
    ) -> std::result::Result<Self, git2::Error> {
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.simplify_first_parent()?;
        revwalk.push_head()?;
        Ok(Self {
            repo,
            revwalk,
            path: PathBuf::from(path),
            stop_rx,
            done: false,
            stopped: false,
        })
    }

    fn stop_requested(&self) -> bool {
        matches!(self.stop_rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn touch(&self, commit: &git2::Commit<'_>) -> std::result::Result<Touch, git2::Error> {
        let Some(here) = blob_id(&commit.tree()?, &self.path)? else {
            return Ok(Touch::Absent);
        };
        let before = match commit.parents().next() {
            Some(parent) => blob_id(&parent.tree()?, &self.path)?,
            None => None,
        };
        Ok(match before {
            None => Touch::Created,
            Some(id) if id == here => Touch::Unchanged,
            Some(_) => Touch::Changed,
        })
    }

    fn step(&mut self, oid: Oid) -> Result<Option<Commit>> {
        let commit = self.repo.find_commit(oid).map_err(backend)?;
        match self.touch(&commit).map_err(backend)? {
            Touch::Unchanged => Ok(None),
            Touch::Changed => to_commit(&commit).map(Some),
            Touch::Created => {
                self.done = true;
                to_commit(&commit).map(Some)
            }
            Touch::Absent => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

impl Iterator for FileHistory<'_> {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.stop_requested() {
                self.done = true;
                self.stopped = true;
                return None;
            }
            let step = self.revwalk.next()?.map_err(backend).and_then(|oid| self.step(oid));
            match step {
                Ok(Some(commit)) => return Some(Ok(commit)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

fn blob_id(tree: &Tree<'_>, path: &Path) -> std::result::Result<Option<Oid>, git2::Error> {
    match tree.get_path(path) {
        Ok(entry) => Ok(Some(entry.id())),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Converts a git2 commit to the owned core type.
fn to_commit(commit: &git2::Commit<'_>) -> Result<Commit> {
    let author = commit.author();
    let time = commit.time();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    let date = DateTime::from_timestamp(time.seconds(), 0)
        .unwrap_or_default()
        .with_timezone(&offset);
    Ok(Commit {
        hash: commit.id().to_string().parse()?,
        author: format!(
            "{} <{}>",
            String::from_utf8_lossy(author.name_bytes()),
            String::from_utf8_lossy(author.email_bytes())
        ),
        date,
        description: String::from_utf8_lossy(commit.message_bytes()).trim().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fixture::TempRepo;

    fn collect(stream: HistoryStream) -> Vec<Commit> {
        stream.map(|c| c.unwrap()).collect()
    }

    #[test]
    fn test_history_is_newest_first_and_skips_other_files() {
        let fixture = TempRepo::new();
        let first = fixture.commit_file("notes.txt", "a\n", "first");
        fixture.commit_file("other.txt", "x\n", "unrelated");
        let second = fixture.commit_file("notes.txt", "a\nb\n", "second\n\nwith a body\n");

        let stream = spawn_history(fixture.repo().path().to_path_buf(), "notes.txt".into()).unwrap();
        let commits = collect(stream);
        let hashes: Vec<_> = commits.iter().map(|c| c.hash.clone()).collect();
        assert_eq!(hashes, vec![second, first]);
        assert_eq!(commits[0].description, "second\n\nwith a body");
        assert_eq!(commits[0].author, "Linelapse Test <test@linelapse.invalid>");
    }

    #[test]
    fn test_history_stops_at_creation() {
        let fixture = TempRepo::new();
        fixture.commit_file("other.txt", "x\n", "before the file");
        let created = fixture.commit_file("notes.txt", "a\n", "create");

        let stream = spawn_history(fixture.repo().path().to_path_buf(), "notes.txt".into()).unwrap();
        let commits = collect(stream);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].hash, created);
    }

    #[test]
    fn test_early_stop_joins_producer() {
        let fixture = TempRepo::new();
        for n in 0..5 {
            fixture.commit_file("notes.txt", &"line\n".repeat(n + 1), "grow");
        }

        let mut stream = spawn_history(fixture.repo().path().to_path_buf(), "notes.txt".into()).unwrap();
        assert!(stream.next().is_some());
        stream.stop();
        assert!(stream.handle.is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_walk_stops_between_unrelated_commits() {
        let fixture = TempRepo::new();
        fixture.commit_file("notes.txt", "a\n", "create");
        for n in 0..20 {
            fixture.commit_file("other.txt", &format!("{n}\n"), "unrelated");
        }
        let changed = fixture.commit_file("notes.txt", "a\nb\n", "change");

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let mut walk = FileHistory::new(fixture.repo(), "notes.txt", &stop_rx).unwrap();
        assert_eq!(walk.next().unwrap().unwrap().hash, changed);

        // The creating commit is still 20 commits away.
        drop(stop_tx);
        assert!(walk.next().is_none());
        assert!(walk.stopped);
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_walk_runs_to_creation_while_listened_to() {
        let fixture = TempRepo::new();
        let created = fixture.commit_file("notes.txt", "a\n", "create");
        for n in 0..5 {
            fixture.commit_file("other.txt", &format!("{n}\n"), "unrelated");
        }

        let (_stop_tx, stop_rx) = bounded::<()>(0);
        let walk = FileHistory::new(fixture.repo(), "notes.txt", &stop_rx).unwrap();
        let hashes: Vec<_> = walk.map(|c| c.unwrap().hash).collect();
        assert_eq!(hashes, vec![created]);
    }

    #[test]
    fn test_missing_repository_is_delivered_as_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut stream = spawn_history(dir.path().join("nope"), "f".into()).unwrap();
        assert!(matches!(stream.next(), Some(Err(_))));
        assert!(stream.next().is_none());
    }
}
