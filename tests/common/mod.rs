//! Shared plumbing for integration tests: seed a local bare repository
//! that stands in for the remote host.

use git2::{IndexEntry, IndexTime};
use tempfile::TempDir;

/// Create a bare repository containing one seed commit on `main` with the
/// given files. Returns the tempdir (keep it alive) and the repo path used
/// as a remote URL.
pub fn seed_remote(files: &[(&str, &str)]) -> (TempDir, String) {
    let tmp = TempDir::new().expect("tempdir");
    let remote_dir = tmp.path().join("remote.git");
    let repo = git2::Repository::init_bare(&remote_dir).expect("init bare remote");

    let sig = git2::Signature::now("Seed", "seed@example.com").expect("signature");
    let mut index = repo.index().expect("index");
    for (path, contents) in files {
        let entry = blob_entry(&repo, path, contents.as_bytes());
        index
            .add_frombuffer(&entry, contents.as_bytes())
            .expect("stage seed file");
    }
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    repo.commit(Some("refs/heads/main"), &sig, &sig, "Seed project", &tree, &[])
        .expect("seed commit");
    repo.set_head("refs/heads/main").expect("set head");

    let url = remote_dir.to_string_lossy().to_string();
    (tmp, url)
}

pub fn blob_entry(repo: &git2::Repository, path: &str, bytes: &[u8]) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: bytes.len() as u32,
        id: repo.blob(bytes).expect("blob"),
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

/// Minimal project metadata file used to seed a project repository.
pub fn project_json(title: &str) -> String {
    serde_json::json!({
        "title": title,
        "tags": [{"tag": "music", "category": "sound"}],
        "tag_groups": [{"category": "sound", "color": "#336699"}]
    })
    .to_string()
}

/// Number of commits reachable from `refs/heads/main` on the remote.
pub fn commit_count(remote_path: &str) -> usize {
    let repo = git2::Repository::open(remote_path).expect("open remote");
    let mut walk = repo.revwalk().expect("revwalk");
    walk.push_ref("refs/heads/main").expect("push ref");
    walk.count()
}

/// Read a file out of the remote's head commit, if present.
pub fn remote_file(remote_path: &str, file: &str) -> Option<Vec<u8>> {
    let repo = git2::Repository::open(remote_path).expect("open remote");
    let head = repo
        .find_reference("refs/heads/main")
        .expect("main ref")
        .peel_to_commit()
        .expect("head commit");
    let tree = head.tree().expect("tree");
    let entry = tree.get_path(std::path::Path::new(file)).ok()?;
    let blob = repo.find_blob(entry.id()).ok()?;
    Some(blob.content().to_vec())
}
