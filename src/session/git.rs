//! Blocking libgit2 helpers behind the async session surface.
//!
//! Everything here runs inside `tokio::task::spawn_blocking`. The clone is
//! *bare*: entity bytes live only in the session's `MemFs`; the TempDir
//! holds nothing but the fetched object store.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use git2::build::RepoBuilder;
use git2::{
    Cred, ErrorCode, FetchOptions, IndexEntry, IndexTime, ObjectType, Oid, PushOptions,
    RemoteCallbacks, Repository, Signature, TreeWalkMode, TreeWalkResult,
};
use tracing::{debug, warn};

use super::{Identity, PublishOutcome};
use crate::error::{Result, StoreError};
use crate::vfs::MemFs;

/// Username sent alongside a bearer token over smart HTTP. GitHub-style
/// hosts ignore the username and authenticate on the token alone.
const TOKEN_USERNAME: &str = "x-access-token";

fn credential_callbacks(credential: Option<String>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, _allowed| match &credential {
        Some(token) => {
            let user = username_from_url.unwrap_or(TOKEN_USERNAME);
            Cred::userpass_plaintext(user, token)
        }
        None => Cred::default(),
    });
    callbacks
}

/// Shallow, single-branch bare clone. Returns the base commit id and the
/// head tree materialized into a fresh in-memory filesystem.
pub(super) fn clone_blocking(
    remote_url: &str,
    branch: &str,
    depth: u32,
    credential: Option<String>,
    into: &Path,
) -> Result<(Oid, MemFs)> {
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(credential_callbacks(credential));
    if depth > 0 {
        fetch.depth(depth as i32);
    }

    // Fetch only the requested branch — never "default branch" inference.
    let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
    let repo = RepoBuilder::new()
        .bare(true)
        .branch(branch)
        .fetch_options(fetch)
        .remote_create(move |repo, name, url| repo.remote_with_fetch(name, url, &refspec))
        .clone(remote_url, into)
        .map_err(StoreError::from_clone)?;

    // Bare clones may leave only the remote-tracking ref behind.
    let head = repo
        .find_reference(&format!("refs/heads/{branch}"))
        .or_else(|_| repo.find_reference(&format!("refs/remotes/origin/{branch}")))
        .map_err(|e| StoreError::Clone {
            reason: format!("branch '{branch}' not found after clone: {}", e.message()),
        })?;
    let commit = head
        .peel_to_commit()
        .map_err(StoreError::from_clone)?;

    let fs = materialize_tree(&repo, &commit)?;
    debug!(
        commit = %commit.id(),
        files = fs.len(),
        "checkout materialized into memory"
    );
    Ok((commit.id(), fs))
}

fn materialize_tree(repo: &Repository, commit: &git2::Commit<'_>) -> Result<MemFs> {
    let tree = commit.tree().context("commit has no tree")?;
    let mut fs = MemFs::new();
    let mut walk_err: Option<StoreError> = None;

    let walk_res = tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(ObjectType::Blob) {
            return TreeWalkResult::Ok;
        }
        let name = entry.name().unwrap_or_default();
        let path = format!("{root}{name}");
        let blob = match entry.to_object(repo).and_then(|o| {
            o.into_blob()
                .map_err(|_| git2::Error::from_str("tree entry is not a blob"))
        }) {
            Ok(b) => b,
            Err(e) => {
                walk_err = Some(StoreError::Internal(
                    anyhow::Error::new(e).context(format!("reading blob at {path}")),
                ));
                return TreeWalkResult::Abort;
            }
        };
        if let Err(e) = fs.write(&path, blob.content().to_vec()) {
            walk_err = Some(e);
            return TreeWalkResult::Abort;
        }
        TreeWalkResult::Ok
    });

    // An aborted walk surfaces the captured error, not the walk's own.
    if let Some(e) = walk_err {
        return Err(e);
    }
    walk_res.context("walking checkout tree")?;
    Ok(fs)
}

/// Stage the whole working-tree snapshot through the repository index,
/// commit on top of `base`, and push without force. One commit, one push,
/// no retry.
pub(super) fn publish_blocking(
    repo_path: &Path,
    branch: &str,
    identity: &Identity,
    message: &str,
    base: Oid,
    snapshot: Vec<(String, Vec<u8>)>,
) -> Result<PublishOutcome> {
    let repo = Repository::open(repo_path).context("reopening session repository")?;
    let parent = repo
        .find_commit(base)
        .context("session base commit disappeared")?;

    let mut index = repo.index().context("opening repository index")?;
    index.clear().context("clearing index")?;
    for (path, bytes) in &snapshot {
        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: bytes.len() as u32,
            id: repo.blob(bytes).context("writing blob")?,
            flags: 0,
            flags_extended: 0,
            path: path.clone().into_bytes(),
        };
        index
            .add_frombuffer(&entry, bytes)
            .with_context(|| format!("staging {path}"))?;
    }
    let tree_id = index.write_tree().context("writing tree")?;

    // Nothing changed relative to the base commit — publish nothing.
    if tree_id == parent.tree_id() {
        debug!(commit = %base, "no effective change; skipping publish");
        return Ok(PublishOutcome::Published {
            commit_id: base.to_string(),
        });
    }

    let tree = repo.find_tree(tree_id).context("loading written tree")?;
    let sig = Signature::now(&identity.name, &identity.email).map_err(|e| {
        StoreError::validation(format!("invalid commit identity: {}", e.message()))
    })?;
    let refname = format!("refs/heads/{branch}");
    let commit_id = repo
        .commit(Some(&refname), &sig, &sig, message, &tree, &[&parent])
        .context("creating commit")?;

    // Per-reference rejection reported by the remote during negotiation.
    let rejection: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let rejection_cb = Rc::clone(&rejection);
    let mut callbacks = credential_callbacks(identity.credential.clone());
    callbacks.push_update_reference(move |name, status| {
        if let Some(msg) = status {
            *rejection_cb.borrow_mut() = Some(format!("{name}: {msg}"));
        }
        Ok(())
    });
    let mut opts = PushOptions::new();
    opts.remote_callbacks(callbacks);

    let mut remote = repo.find_remote("origin").context("origin remote missing")?;
    let spec = format!("{refname}:{refname}");
    let pushed = remote.push(&[spec.as_str()], Some(&mut opts));
    let rejection = rejection.borrow_mut().take();

    match pushed {
        Ok(()) => match rejection {
            Some(reason) => {
                warn!(%reason, "push rejected by remote");
                Ok(PublishOutcome::Conflict { reason })
            }
            None => Ok(PublishOutcome::Published {
                commit_id: commit_id.to_string(),
            }),
        },
        Err(e) if is_non_fast_forward(&e) || rejection.is_some() => {
            let reason = rejection.unwrap_or_else(|| e.message().to_string());
            warn!(%reason, "push rejected by remote");
            Ok(PublishOutcome::Conflict { reason })
        }
        Err(e) => Ok(PublishOutcome::Failed {
            reason: e.message().to_string(),
        }),
    }
}

fn is_non_fast_forward(err: &git2::Error) -> bool {
    err.code() == ErrorCode::NotFastForward
        || err.message().contains("non-fast-forward")
        || err.message().contains("cannot push non-fastforwardable")
}
