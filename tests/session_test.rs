//! Integration tests for the ephemeral repository session: clone, file
//! I/O, publish, and the fast-forward-only conflict semantics.

mod common;

use vitrine::{Identity, PublishOutcome, RepoSession, SessionOptions, StoreError};

fn identity() -> Identity {
    Identity {
        name: "Ada Tester".to_string(),
        email: "ada@example.com".to_string(),
        credential: None,
    }
}

/// Local-path remotes do not support shallow fetch, so tests clone full.
fn opts(url: &str) -> SessionOptions {
    SessionOptions::new(url, identity()).depth(0)
}

#[tokio::test]
async fn open_materializes_checkout_into_memory() {
    let (_tmp, url) = common::seed_remote(&[
        ("data/project.json", "{\"title\": \"Demo\"}"),
        ("data/events/e1.json", "{\"id\": \"e1\"}"),
    ]);

    let session = RepoSession::open(opts(&url)).await.expect("open session");
    assert_eq!(session.branch(), "main");
    assert!(!session.base_commit().is_empty());

    let bytes = session.read_file("data/project.json").expect("read");
    assert_eq!(bytes, b"{\"title\": \"Demo\"}");
    assert!(session.file_exists("data/events/e1.json"));
    assert!(!session.file_exists("data/events/e2.json"));

    let entries = session.list_dir("data/events").expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "e1.json");
}

#[tokio::test]
async fn missing_branch_is_a_clone_error() {
    let (_tmp, url) = common::seed_remote(&[("README.md", "hi")]);
    let err = RepoSession::open(opts(&url).branch("does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Clone { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreachable_remote_is_a_clone_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let bogus = tmp.path().join("nope").to_string_lossy().to_string();
    let err = RepoSession::open(opts(&bogus)).await.unwrap_err();
    assert!(matches!(err, StoreError::Clone { .. }));
}

#[tokio::test]
async fn publish_lands_all_writes_in_one_commit() {
    let (_tmp, url) = common::seed_remote(&[("data/project.json", "{}")]);
    let before = common::commit_count(&url);

    let mut session = RepoSession::open(opts(&url)).await.unwrap();
    session
        .write_file("data/events/e1.json", "{\"id\": \"e1\"}")
        .unwrap();
    session
        .write_file("data/project.json", "{\"title\": \"touched\"}")
        .unwrap();

    let outcome = session.commit_and_push("Create event e1").await.unwrap();
    assert!(outcome.is_published(), "got {outcome:?}");

    // Exactly one commit, carrying both files.
    assert_eq!(common::commit_count(&url), before + 1);
    assert_eq!(
        common::remote_file(&url, "data/events/e1.json").unwrap(),
        b"{\"id\": \"e1\"}"
    );
    assert_eq!(
        common::remote_file(&url, "data/project.json").unwrap(),
        b"{\"title\": \"touched\"}"
    );
}

#[tokio::test]
async fn deletes_are_published() {
    let (_tmp, url) = common::seed_remote(&[
        ("data/project.json", "{}"),
        ("data/events/e1.json", "{\"id\": \"e1\"}"),
    ]);

    let mut session = RepoSession::open(opts(&url)).await.unwrap();
    session.delete_file("data/events/e1.json").unwrap();
    let outcome = session.commit_and_push("Delete event e1").await.unwrap();
    assert!(outcome.is_published());

    assert!(common::remote_file(&url, "data/events/e1.json").is_none());
    assert!(common::remote_file(&url, "data/project.json").is_some());
}

#[tokio::test]
async fn no_change_publishes_nothing() {
    let (_tmp, url) = common::seed_remote(&[("data/project.json", "{}")]);
    let before = common::commit_count(&url);

    let mut session = RepoSession::open(opts(&url)).await.unwrap();
    let base = session.base_commit();
    let outcome = session.commit_and_push("noop").await.unwrap();
    assert_eq!(
        outcome,
        PublishOutcome::Published { commit_id: base }
    );
    assert_eq!(common::commit_count(&url), before);
}

#[tokio::test]
async fn second_writer_gets_a_conflict() {
    let (_tmp, url) = common::seed_remote(&[("data/project.json", "{}")]);

    // Both sessions start from the same commit.
    let mut first = RepoSession::open(opts(&url)).await.unwrap();
    let mut second = RepoSession::open(opts(&url)).await.unwrap();
    assert_eq!(first.base_commit(), second.base_commit());

    first
        .write_file("data/events/a.json", "{\"id\": \"a\"}")
        .unwrap();
    second
        .write_file("data/events/b.json", "{\"id\": \"b\"}")
        .unwrap();

    let won = first.commit_and_push("first writer").await.unwrap();
    assert!(won.is_published());

    let lost = second.commit_and_push("second writer").await.unwrap();
    assert!(
        matches!(lost, PublishOutcome::Conflict { .. }),
        "expected conflict, got {lost:?}"
    );

    // The winner's write is on the remote; the loser's never landed.
    assert!(common::remote_file(&url, "data/events/a.json").is_some());
    assert!(common::remote_file(&url, "data/events/b.json").is_none());
}

#[tokio::test]
async fn read_your_writes_within_a_session() {
    let (_tmp, url) = common::seed_remote(&[("data/project.json", "{}")]);
    let mut session = RepoSession::open(opts(&url)).await.unwrap();

    session.write_file("data/pages/p1.json", "{\"id\": \"p1\"}").unwrap();
    assert_eq!(
        session.read_file("data/pages/p1.json").unwrap(),
        b"{\"id\": \"p1\"}"
    );

    let err = session.read_file("data/pages/p2.json").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}
