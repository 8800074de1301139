//! Ephemeral repository session: one isolated checkout per request.
//!
//! `open` performs a shallow, single-branch clone of the remote into a
//! fresh in-memory filesystem; file edits accumulate there until one
//! `commit_and_push` publishes them as a single commit. The session owns a
//! TempDir for the fetched object store and discards it on drop — nothing
//! persists locally regardless of the publish outcome.
//!
//! Network I/O happens at `open` and `commit_and_push` only; every other
//! operation is synchronous and in-memory.

mod git;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use git2::Oid;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::vfs::{DirEntry, MemFs};

// ─── Types ───────────────────────────────────────────────────────────────────

/// Who a session acts as. The credential is a bearer-style token threaded
/// explicitly through every network call — never ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub remote_url: String,
    /// Branch to check out and push back to. Always explicit.
    pub branch: String,
    pub identity: Identity,
    /// Clone depth; 0 disables shallow fetch (local-path remotes do not
    /// support it).
    pub depth: u32,
    /// Optional deadline applied to `open` and `commit_and_push`.
    pub timeout: Option<Duration>,
}

impl SessionOptions {
    pub fn new(remote_url: impl Into<String>, identity: Identity) -> Self {
        Self {
            remote_url: remote_url.into(),
            branch: "main".to_string(),
            identity,
            depth: 1,
            timeout: None,
        }
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of a publish attempt. `Conflict` means another writer pushed
/// first; the whole session must be retried from a fresh clone by the
/// caller — there is no merge or rebase here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { commit_id: String },
    Conflict { reason: String },
    Failed { reason: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

pub struct RepoSession {
    opts: SessionOptions,
    /// Holds the bare object store of the clone; removed on drop.
    _tmp: TempDir,
    repo_path: PathBuf,
    base_commit: Oid,
    fs: MemFs,
}

impl RepoSession {
    /// Clone `remote_url` at `branch` and materialize the checkout into
    /// memory. Fails with [`StoreError::Clone`] if the remote is
    /// unreachable, the branch does not exist, or the credential is
    /// rejected.
    pub async fn open(opts: SessionOptions) -> Result<Self> {
        let tmp = TempDir::new().context("creating session temp dir")?;
        let repo_path = tmp.path().join("checkout");

        let url = opts.remote_url.clone();
        let branch = opts.branch.clone();
        let depth = opts.depth;
        let credential = opts.identity.credential.clone();
        let clone_path = repo_path.clone();

        let task = tokio::task::spawn_blocking(move || {
            git::clone_blocking(&url, &branch, depth, credential, &clone_path)
        });
        let (base_commit, fs) = match opts.timeout {
            Some(deadline) => tokio::time::timeout(deadline, task)
                .await
                .map_err(|_| StoreError::Clone {
                    reason: format!("clone deadline of {deadline:?} exceeded"),
                })?
                .context("clone task panicked")??,
            None => task.await.context("clone task panicked")??,
        };

        info!(
            remote = %opts.remote_url,
            branch = %opts.branch,
            commit = %base_commit,
            "repository session opened"
        );
        Ok(Self {
            opts,
            _tmp: tmp,
            repo_path,
            base_commit,
            fs,
        })
    }

    /// The commit this session's checkout is based on.
    pub fn base_commit(&self) -> String {
        self.base_commit.to_string()
    }

    pub fn branch(&self) -> &str {
        &self.opts.branch
    }

    pub fn identity(&self) -> &Identity {
        &self.opts.identity
    }

    // ── File I/O (delegates to the in-memory checkout) ──────────────────────

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.fs.read(path)
    }

    pub fn write_file(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.fs.write(path, bytes)
    }

    pub fn delete_file(&mut self, path: &str) -> Result<()> {
        self.fs.delete(path)
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.fs.exists(path)
    }

    pub fn list_dir(&self, dir: &str) -> Result<Vec<DirEntry>> {
        self.fs.list(dir)
    }

    // ── Publish ─────────────────────────────────────────────────────────────

    /// Fold every pending edit into one commit stamped with the session
    /// identity and push it to the original remote branch. No retry, no
    /// rebase, no merge: a rejection is terminal for this session.
    pub async fn commit_and_push(&mut self, message: &str) -> Result<PublishOutcome> {
        let snapshot: Vec<(String, Vec<u8>)> = self
            .fs
            .iter()
            .map(|(p, b)| (p.to_string(), b.to_vec()))
            .collect();

        let repo_path = self.repo_path.clone();
        let branch = self.opts.branch.clone();
        let identity = self.opts.identity.clone();
        let message = message.to_string();
        let base = self.base_commit;

        let task = tokio::task::spawn_blocking(move || {
            git::publish_blocking(&repo_path, &branch, &identity, &message, base, snapshot)
        });
        let outcome = match self.opts.timeout {
            Some(deadline) => tokio::time::timeout(deadline, task)
                .await
                .map_err(|_| StoreError::Conflict {
                    reason: format!("publish deadline of {deadline:?} exceeded"),
                })?
                .context("publish task panicked")??,
            None => task.await.context("publish task panicked")??,
        };

        match &outcome {
            PublishOutcome::Published { commit_id } => {
                info!(branch = %self.opts.branch, commit = %commit_id, "published");
                // Keep the session usable if the caller commits again.
                if let Ok(oid) = Oid::from_str(commit_id) {
                    self.base_commit = oid;
                }
            }
            PublishOutcome::Conflict { reason } => {
                info!(branch = %self.opts.branch, %reason, "publish conflict");
            }
            PublishOutcome::Failed { reason } => {
                info!(branch = %self.opts.branch, %reason, "publish failed");
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for RepoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoSession")
            .field("remote_url", &self.opts.remote_url)
            .field("branch", &self.opts.branch)
            .field("base_commit", &self.base_commit)
            .field("files", &self.fs.len())
            .finish()
    }
}
