//! In-memory [`VcsAdapter`] for unit tests, mirroring the corpus's
//! `test-support`-gated fakes (e.g. `adapters::substrates::mock`).

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::domain::error::OrchestratorError;
use crate::domain::ports::vcs::{DiffEntry, VcsAdapter, WorkingTreeStatus};
use crate::domain::DomainResult;

#[derive(Default)]
struct State {
    /// path -> current content
    files: HashMap<String, Vec<u8>>,
    /// commit ref -> snapshot of `files` at that commit
    commits: HashMap<String, HashMap<String, Vec<u8>>>,
    /// path -> most recent commit ref that touched it
    last_ref: HashMap<String, String>,
    head: String,
    next_commit: u64,
    staged: Vec<String>,
}

/// An in-process, deterministic stand-in for a git working tree.
pub struct FakeVcsAdapter {
    state: Mutex<State>,
}

impl FakeVcsAdapter {
    pub fn new() -> Self {
        let mut state = State::default();
        state.head = "root".to_string();
        state.commits.insert("root".to_string(), HashMap::new());
        Self { state: Mutex::new(state) }
    }
}

impl Default for FakeVcsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VcsAdapter for FakeVcsAdapter {
    async fn current_ref(&self) -> DomainResult<String> {
        Ok(self.state.lock().head.clone())
    }

    async fn branch(&self, _name: &str) -> DomainResult<()> {
        Ok(())
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> DomainResult<()> {
        let mut state = self.state.lock();
        state.files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> DomainResult<()> {
        let mut state = self.state.lock();
        state.files.remove(path);
        Ok(())
    }

    async fn stage(&self, paths: &[String]) -> DomainResult<()> {
        let mut state = self.state.lock();
        for p in paths {
            if !state.staged.contains(p) {
                state.staged.push(p.clone());
            }
        }
        Ok(())
    }

    async fn commit(&self, _message: &str) -> DomainResult<String> {
        let mut state = self.state.lock();
        state.next_commit += 1;
        let commit_ref = format!("commit-{}", state.next_commit);
        let snapshot = state.files.clone();
        for path in state.staged.drain(..).collect::<Vec<_>>() {
            state.last_ref.insert(path, commit_ref.clone());
        }
        state.commits.insert(commit_ref.clone(), snapshot);
        state.head = commit_ref.clone();
        Ok(commit_ref)
    }

    async fn checkout_file(&self, path: &str, reference: &str) -> DomainResult<()> {
        let mut state = self.state.lock();
        let snapshot = state
            .commits
            .get(reference)
            .ok_or_else(|| OrchestratorError::Vcs(format!("unknown ref: {reference}")))?
            .clone();
        match snapshot.get(path) {
            Some(contents) => {
                state.files.insert(path.to_string(), contents.clone());
            }
            None => {
                state.files.remove(path);
            }
        }
        Ok(())
    }

    async fn status(&self) -> DomainResult<WorkingTreeStatus> {
        let state = self.state.lock();
        let mut entries: Vec<(String, String)> = state
            .files
            .iter()
            .map(|(path, contents)| {
                let mut hasher = Sha256::new();
                hasher.update(contents);
                (path.clone(), format!("{:x}", hasher.finalize()))
            })
            .collect();
        entries.sort();
        Ok(WorkingTreeStatus { entries })
    }

    async fn diff(&self, _ref_a: &str, _ref_b: &str, _paths: Option<&[String]>) -> DomainResult<Vec<DiffEntry>> {
        Ok(Vec::new())
    }

    async fn file_last_ref(&self, path: &str) -> DomainResult<Option<String>> {
        Ok(self.state.lock().last_ref.get(path).cloned())
    }

    async fn file_exists(&self, path: &str) -> DomainResult<bool> {
        Ok(self.state.lock().files.contains_key(path))
    }
}
