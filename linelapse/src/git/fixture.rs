//! Throwaway repositories for tests.

use std::path::Path;

use git2::{Repository, Signature};
use linelapse_core::CommitHash;
use tempfile::TempDir;

/// A non-bare repository in a temporary directory, removed on drop.
pub(crate) struct TempRepo {
    dir: TempDir,
    repo: Repository,
}

impl TempRepo {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Writes `content` to `name`, stages it and commits on HEAD.
    pub(crate) fn commit_file(&self, name: &str, content: &str, message: &str) -> CommitHash {
        let file = self.dir.path().join(name);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&file, content).unwrap();

        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let signature = Signature::now("Linelapse Test", "test@linelapse.invalid").unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap();
        oid.to_string().parse().unwrap()
    }
}
