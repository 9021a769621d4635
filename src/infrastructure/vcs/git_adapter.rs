//! Git-backed implementation of [`VcsAdapter`] (spec §4.4).
//!
//! Shells out to the `git` binary the way the corpus's worker-spawning
//! code shells out to child processes: via `tokio::process::Command` with
//! captured stdout/stderr and a typed error on non-zero exit.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;

use crate::domain::error::OrchestratorError;
use crate::domain::ports::vcs::{DiffEntry, VcsAdapter, WorkingTreeStatus};
use crate::domain::DomainResult;

pub struct GitAdapter {
    repo_root: PathBuf,
}

impl GitAdapter {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self { repo_root: repo_root.into() }
    }

    async fn run(&self, args: &[&str]) -> DomainResult<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| OrchestratorError::Vcs(format!("failed to spawn git {args:?}: {e}")))?;

        if !output.status.success() {
            return Err(OrchestratorError::Vcs(format!(
                "git {args:?} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.repo_root.join(path)
    }
}

#[async_trait]
impl VcsAdapter for GitAdapter {
    async fn current_ref(&self) -> DomainResult<String> {
        self.run(&["rev-parse", "HEAD"]).await
    }

    async fn branch(&self, name: &str) -> DomainResult<()> {
        self.run(&["checkout", "-B", name]).await?;
        Ok(())
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> DomainResult<()> {
        let target = self.absolute(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OrchestratorError::Vcs(format!("failed to create {}: {e}", parent.display())))?;
        }
        fs::write(&target, contents)
            .await
            .map_err(|e| OrchestratorError::Vcs(format!("failed to write {}: {e}", target.display())))
    }

    async fn delete_file(&self, path: &str) -> DomainResult<()> {
        let target = self.absolute(path);
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestratorError::Vcs(format!("failed to delete {}: {e}", target.display()))),
        }
    }

    async fn stage(&self, paths: &[String]) -> DomainResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).await?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> DomainResult<String> {
        self.run(&["commit", "-m", message]).await?;
        self.current_ref().await
    }

    async fn checkout_file(&self, path: &str, reference: &str) -> DomainResult<()> {
        self.run(&["checkout", reference, "--", path]).await?;
        Ok(())
    }

    async fn status(&self) -> DomainResult<WorkingTreeStatus> {
        let tracked = self.run(&["ls-files"]).await?;
        let mut entries = Vec::new();
        for path in tracked.lines().filter(|l| !l.is_empty()) {
            let full = self.absolute(path);
            let bytes = fs::read(&full).await.unwrap_or_default();
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            entries.push((path.to_string(), format!("{:x}", hasher.finalize())));
        }
        entries.sort();
        Ok(WorkingTreeStatus { entries })
    }

    async fn diff(&self, ref_a: &str, ref_b: &str, paths: Option<&[String]>) -> DomainResult<Vec<DiffEntry>> {
        let mut args = vec!["diff", ref_a, ref_b];
        if let Some(paths) = paths {
            args.push("--");
            args.extend(paths.iter().map(String::as_str));
        }
        let raw = self.run(&args).await?;
        Ok(split_unified_diff(&raw))
    }

    async fn file_last_ref(&self, path: &str) -> DomainResult<Option<String>> {
        let out = self
            .run(&["log", "-n", "1", "--format=%H", "--", path])
            .await?;
        Ok(if out.is_empty() { None } else { Some(out) })
    }

    async fn file_exists(&self, path: &str) -> DomainResult<bool> {
        Ok(Path::new(&self.absolute(path)).exists())
    }
}

fn split_unified_diff(raw: &str) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    let mut current_path: Option<String> = None;
    let mut current_patch = String::new();

    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("diff --git a/") {
            if let Some(path) = current_path.take() {
                entries.push(DiffEntry { path, patch: std::mem::take(&mut current_patch) });
            }
            current_path = rest.split(' ').next().map(str::to_string);
        }
        current_patch.push_str(line);
        current_patch.push('\n');
    }
    if let Some(path) = current_path {
        entries.push(DiffEntry { path, patch: current_patch });
    }
    entries
}
