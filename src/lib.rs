//! Vitrine core — a git-backed project store for annotation exhibits.
//!
//! The remote git repository is the only database: every domain entity
//! (project metadata, events, pages, annotation sets, tags) is one JSON
//! file. A request opens exactly one ephemeral [`session::RepoSession`]
//! (shallow clone into memory), edits files through the entity mapper,
//! and publishes everything as a single commit. The remote's fast-forward
//! check is the whole concurrency story: first push wins, the loser gets
//! a [`error::StoreError::Conflict`] and retries from a fresh clone.

pub mod error;
pub mod import;
pub mod project;
pub mod session;
pub mod store;
pub mod vfs;

pub use error::StoreError;
pub use project::{Project, ProjectMeta};
pub use session::{Identity, PublishOutcome, RepoSession, SessionOptions};
pub use store::{ProjectStore, StoreConfig};
