// SPDX-License-Identifier: MIT
//! In-memory virtual filesystem backing a repository checkout.
//!
//! Every session materializes its working copy into a `MemFs` so entity
//! bytes never touch durable disk. Paths are relative to the checkout root
//! and normalized on entry; writes are visible to subsequent reads
//! immediately.

use std::collections::BTreeMap;

use crate::error::{Result, StoreError};

/// Path-addressed byte store. Keys are normalized `a/b/c.json` paths;
/// directories exist implicitly. `BTreeMap` keeps entries in lexicographic
/// order, which is the listing order the rest of the crate relies on.
#[derive(Debug, Default, Clone)]
pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let path = normalize(path)?;
        self.files.insert(path, bytes.into());
        Ok(())
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path)?;
        self.files
            .get(&path)
            .cloned()
            .ok_or_else(|| StoreError::not_found(path))
    }

    pub fn delete(&mut self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        match self.files.remove(&path) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(path)),
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        match normalize(path) {
            Ok(p) => self.files.contains_key(&p),
            Err(_) => false,
        }
    }

    /// Immediate children of `dir`: files and (implicit) subdirectories,
    /// each exactly once, in lexicographic order.
    pub fn list(&self, dir: &str) -> Result<Vec<DirEntry>> {
        let dir = normalize(dir)?;
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let mut entries: Vec<DirEntry> = Vec::new();
        for key in self.files.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                None => entries.push(DirEntry {
                    name: rest.to_string(),
                    kind: EntryKind::File,
                }),
                Some((child, _)) => {
                    let entry = DirEntry {
                        name: child.to_string(),
                        kind: EntryKind::Dir,
                    };
                    if entries.last() != Some(&entry) {
                        entries.push(entry);
                    }
                }
            }
        }
        Ok(entries)
    }

    /// Number of files in the store.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate every (path, bytes) pair — the commit pipeline snapshots the
    /// whole working tree through this.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

/// Normalize to a relative `a/b/c` form. Rejects absolute paths, `..`,
/// and empty segments so no path can escape the checkout root.
fn normalize(path: &str) -> Result<String> {
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(StoreError::validation(format!(
            "path must be relative: {path}"
        )));
    }
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(StoreError::validation(format!(
                    "path must not contain '..' components: {path}"
                )))
            }
            p => parts.push(p),
        }
    }
    Ok(parts.join("/"))
}
