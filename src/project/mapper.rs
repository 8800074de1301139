// SPDX-License-Identifier: MIT
//! JSON encode/decode and per-kind entity I/O against a session.
//!
//! One file == one entity instance. Directory listings are the membership
//! index; the page order file and the project file are the only explicit
//! indexes. Encoding is pretty-printed with a trailing newline so commits
//! diff cleanly.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::model::{AnnotationPage, Event, Page, Project, ProjectMeta};
use super::paths;
use crate::error::{Result, StoreError};
use crate::session::RepoSession;
use crate::vfs::EntryKind;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value).context("encoding entity")?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(bytes)
        .with_context(|| format!("decoding {what}"))
        .map_err(StoreError::Internal)
}

fn read_entity<T: DeserializeOwned>(
    session: &RepoSession,
    path: &str,
    what: &str,
) -> Result<T> {
    let bytes = session
        .read_file(path)
        .map_err(|_| StoreError::not_found(what.to_string()))?;
    decode(&bytes, what)
}

// ─── Project metadata ────────────────────────────────────────────────────────

pub fn read_project_meta(session: &RepoSession) -> Result<ProjectMeta> {
    read_entity(session, paths::PROJECT_FILE, "project metadata")
}

pub fn write_project_meta(session: &mut RepoSession, meta: &ProjectMeta) -> Result<()> {
    session.write_file(paths::PROJECT_FILE, encode(meta)?)
}

// ─── Events ──────────────────────────────────────────────────────────────────

pub fn read_event(session: &RepoSession, id: &str) -> Result<Event> {
    read_entity(session, &paths::event_path(id)?, &format!("event {id}"))
}

pub fn write_event(session: &mut RepoSession, event: &Event) -> Result<()> {
    session.write_file(&paths::event_path(&event.id)?, encode(event)?)
}

pub fn delete_event(session: &mut RepoSession, id: &str) -> Result<()> {
    let path = paths::event_path(id)?;
    session
        .delete_file(&path)
        .map_err(|_| StoreError::not_found(format!("event {id}")))
}

pub fn list_events(session: &RepoSession) -> Result<Vec<Event>> {
    list_entities(session, paths::EVENTS_DIR, "event", &[])
}

// ─── Pages ───────────────────────────────────────────────────────────────────

pub fn read_page(session: &RepoSession, id: &str) -> Result<Page> {
    read_entity(session, &paths::page_path(id)?, &format!("page {id}"))
}

pub fn write_page(session: &mut RepoSession, page: &Page) -> Result<()> {
    session.write_file(&paths::page_path(&page.id)?, encode(page)?)
}

pub fn delete_page(session: &mut RepoSession, id: &str) -> Result<()> {
    let path = paths::page_path(id)?;
    session
        .delete_file(&path)
        .map_err(|_| StoreError::not_found(format!("page {id}")))
}

/// Pages in directory listing order — the root order `linearize` relies on.
pub fn list_pages(session: &RepoSession) -> Result<Vec<Page>> {
    list_entities(
        session,
        paths::PAGES_DIR,
        "page",
        &[paths::PAGE_ORDER_FILENAME],
    )
}

/// The explicit order index. An absent file reads as empty — the caller
/// derives order from parent pointers in that case.
pub fn read_page_order(session: &RepoSession) -> Result<Vec<String>> {
    if !session.file_exists(paths::PAGE_ORDER_FILE) {
        return Ok(Vec::new());
    }
    let bytes = session.read_file(paths::PAGE_ORDER_FILE)?;
    decode(&bytes, "page order index")
}

pub fn write_page_order(session: &mut RepoSession, order: &[String]) -> Result<()> {
    session.write_file(paths::PAGE_ORDER_FILE, encode(&order)?)
}

// ─── Annotation sets ─────────────────────────────────────────────────────────

pub fn read_annotation_set(session: &RepoSession, id: &str) -> Result<AnnotationPage> {
    read_entity(
        session,
        &paths::annotation_set_path(id)?,
        &format!("annotation set {id}"),
    )
}

pub fn write_annotation_set(session: &mut RepoSession, set: &AnnotationPage) -> Result<()> {
    session.write_file(&paths::annotation_set_path(&set.id)?, encode(set)?)
}

pub fn delete_annotation_set(session: &mut RepoSession, id: &str) -> Result<()> {
    let path = paths::annotation_set_path(id)?;
    session
        .delete_file(&path)
        .map_err(|_| StoreError::not_found(format!("annotation set {id}")))
}

pub fn annotation_set_exists(session: &RepoSession, id: &str) -> Result<bool> {
    Ok(session.file_exists(&paths::annotation_set_path(id)?))
}

pub fn list_annotation_sets(session: &RepoSession) -> Result<Vec<AnnotationPage>> {
    list_entities(session, paths::ANNOTATIONS_DIR, "annotation set", &[])
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// Read the whole project in one pass over the session.
pub fn load_project(session: &RepoSession) -> Result<Project> {
    let meta = read_project_meta(session)?;
    let events = list_events(session)?
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect();
    let pages = list_pages(session)?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();
    let annotation_sets = list_annotation_sets(session)?
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();
    let page_order = read_page_order(session)?;
    Ok(Project {
        meta,
        events,
        pages,
        annotation_sets,
        page_order,
    })
}

fn list_entities<T: DeserializeOwned>(
    session: &RepoSession,
    dir: &str,
    what: &str,
    skip: &[&str],
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for entry in session.list_dir(dir)? {
        if entry.kind != EntryKind::File || skip.contains(&entry.name.as_str()) {
            continue;
        }
        let Some(id) = paths::id_from_filename(&entry.name) else {
            continue;
        };
        let bytes = session.read_file(&format!("{dir}/{}", entry.name))?;
        out.push(decode(&bytes, &format!("{what} {id}"))?);
    }
    Ok(out)
}
