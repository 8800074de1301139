//! Canonical entity paths inside the project repository.
//!
//! The layout is load-bearing for compatibility with existing project
//! repositories — do not change it:
//!
//! ```text
//! data/project.json              project metadata + tag vocabulary
//! data/events/<event-id>.json
//! data/pages/<page-id>.json
//! data/pages/order.json          JSON array of page ids, depth-first
//! data/annotations/<set-id>.json
//! ```

use crate::error::{Result, StoreError};

pub const DATA_DIR: &str = "data";
pub const PROJECT_FILE: &str = "data/project.json";
pub const EVENTS_DIR: &str = "data/events";
pub const PAGES_DIR: &str = "data/pages";
pub const PAGE_ORDER_FILE: &str = "data/pages/order.json";
pub const ANNOTATIONS_DIR: &str = "data/annotations";

/// Name of the order index file inside the pages directory — skipped when
/// listing page entities.
pub const PAGE_ORDER_FILENAME: &str = "order.json";

pub fn event_path(id: &str) -> Result<String> {
    Ok(format!("{EVENTS_DIR}/{}.json", checked_id(id)?))
}

pub fn page_path(id: &str) -> Result<String> {
    let id = checked_id(id)?;
    if format!("{id}.json") == PAGE_ORDER_FILENAME {
        return Err(StoreError::validation("'order' is a reserved page id"));
    }
    Ok(format!("{PAGES_DIR}/{id}.json"))
}

pub fn annotation_set_path(id: &str) -> Result<String> {
    Ok(format!("{ANNOTATIONS_DIR}/{}.json", checked_id(id)?))
}

/// Entity id extracted from a `<id>.json` directory entry, if it is one.
pub fn id_from_filename(name: &str) -> Option<&str> {
    name.strip_suffix(".json")
}

/// Validate an entity id before it becomes part of a path. Ids are slugs:
/// alphanumerics, `-`, `_`, `.` — anything that could change the directory
/// an entity lands in is rejected.
pub fn checked_id(id: &str) -> Result<&str> {
    if id.is_empty() {
        return Err(StoreError::validation("entity id must not be empty"));
    }
    if id == "." || id == ".." {
        return Err(StoreError::validation(format!("invalid entity id: {id}")));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(StoreError::validation(format!(
            "entity id contains invalid characters: {id}"
        )));
    }
    Ok(id)
}
