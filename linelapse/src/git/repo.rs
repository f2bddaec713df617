//! Repository discovery and the git implementation of the core collaborators.

use std::path::{Path, PathBuf};

use git2::Repository;
use linelapse_core::{
    CommitHash, ContentSource, DiffHunk, DiffSource, HistorySource, Result, Revision,
    TimelapseError,
};
use tracing::debug;

use super::backend;
use super::diff::{commit_tree, file_diff};
use super::worker::{spawn_history, HistoryStream};

/// Default number of context lines per hunk.
const DEFAULT_CONTEXT: usize = 3;

/// A working-tree repository serving history, diffs and content for its files.
pub struct GitRepo {
    /// Canonical working-tree root.
    root: PathBuf,
    repo: Repository,
    context_lines: usize,
}

impl GitRepo {
    /// Opens the repository closest to `path` and returns it together with
    /// `path` relative to the working tree, `/`-separated.
    ///
    /// # Errors
    ///
    /// - [`TimelapseError::FileNotFound`] if `path` does not name a file.
    /// - [`TimelapseError::NotARepository`] if no enclosing working tree exists.
    /// - [`TimelapseError::Untracked`] if the file is not in HEAD.
    pub fn open(path: &Path) -> Result<(Self, String)> {
        let canonical = path
            .canonicalize()
            .map_err(|_| TimelapseError::FileNotFound(path.to_path_buf()))?;
        if !canonical.is_file() {
            return Err(TimelapseError::FileNotFound(path.to_path_buf()));
        }
        let start = canonical.parent().unwrap_or(&canonical);
        let repo = Repository::discover(start)
            .map_err(|_| TimelapseError::NotARepository(path.to_path_buf()))?;
        let root = repo
            .workdir()
            .ok_or_else(|| TimelapseError::NotARepository(path.to_path_buf()))?
            .canonicalize()?;

        let relative = canonical
            .strip_prefix(&root)
            .map_err(|_| TimelapseError::Untracked(path.to_path_buf()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let tracked = repo
            .head()
            .and_then(|head| head.peel_to_tree())
            .and_then(|tree| tree.get_path(Path::new(&relative)))
            .is_ok();
        if !tracked {
            return Err(TimelapseError::Untracked(path.to_path_buf()));
        }

        debug!(root = %root.display(), path = %relative, "opened repository");
        Ok((Self { root, repo, context_lines: DEFAULT_CONTEXT }, relative))
    }

    /// Sets the number of context lines per diff hunk.
    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DiffSource for GitRepo {
    fn diff(&self, older: &CommitHash, newer: &CommitHash, path: &str) -> Result<Vec<DiffHunk>> {
        file_diff(&self.repo, older, newer, path, self.context_lines).map_err(backend)
    }
}

impl ContentSource for GitRepo {
    /// Reads the blob at HEAD for [`Revision::Current`], so reconstruction
    /// starts from the last committed content rather than the working copy.
    fn content(&self, revision: Revision<'_>, path: &str) -> Result<String> {
        let tree = match revision {
            Revision::Current => self.repo.head().and_then(|head| head.peel_to_tree()),
            Revision::At(hash) => commit_tree(&self.repo, hash),
        }
        .map_err(backend)?;
        let entry = tree
            .get_path(Path::new(path))
            .map_err(|_| TimelapseError::Untracked(PathBuf::from(path)))?;
        let blob = entry
            .to_object(&self.repo)
            .and_then(|object| object.peel_to_blob())
            .map_err(backend)?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }
}

impl HistorySource for GitRepo {
    type Stream = HistoryStream;

    fn history(&self, path: &str) -> Result<HistoryStream> {
        spawn_history(self.repo.path().to_path_buf(), path.to_owned())
    }
}
