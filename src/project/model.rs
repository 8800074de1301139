// SPDX-License-Identifier: MIT
//! Domain entities persisted as JSON files in the project repository.
//!
//! Every persisted entity carries a flattened `extra` map so fields this
//! crate does not model survive a decode→encode round trip — partial
//! updates must never strip what another writer put in the file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved pseudo-category for tags that belong to no group.
pub const UNCATEGORIZED: &str = "_uncategorized_";

// ─── Tags ────────────────────────────────────────────────────────────────────

/// A vocabulary entry. `(tag, category)` pairs are unique within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    pub category: String,
}

impl Tag {
    pub fn new(tag: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            category: category.into(),
        }
    }

    pub fn uncategorized(tag: impl Into<String>) -> Self {
        Self::new(tag, UNCATEGORIZED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroup {
    pub category: String,
    pub color: String,
}

/// A tag token produced by an import: either matched against the project
/// vocabulary or passed through verbatim for the caller to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagRef {
    Resolved(Tag),
    Unresolved(String),
}

// ─── Project ─────────────────────────────────────────────────────────────────

/// Project metadata and tag vocabulary — the single project-level file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub tag_groups: Vec<TagGroup>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregate root: everything read from one session in one pass.
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub meta: ProjectMeta,
    pub events: BTreeMap<String, Event>,
    pub pages: BTreeMap<String, Page>,
    pub annotation_sets: BTreeMap<String, AnnotationPage>,
    /// Effective depth-first page order.
    pub page_order: Vec<String>,
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    Audio,
    Video,
    #[serde(other)]
    Other,
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Audio
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default)]
    pub auto_generate_web_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Creation payload for the "new event" flow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub auto_generate_web_page: bool,
}

// ─── Pages ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    /// Rich structured document — opaque to the store.
    #[serde(default)]
    pub content: Value,
    /// Id of the parent page; pages with no parent are roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub parent: Option<String>,
}

// ─── Annotation sets ─────────────────────────────────────────────────────────

/// An annotation set ("AnnotationPage"): the ordered annotations attached
/// to one source within one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPage {
    pub id: String,
    /// Display name of the set.
    pub set: String,
    pub event_id: String,
    pub source_id: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Assigned at creation; the only stable identity for lookup/delete.
    pub uuid: String,
    pub start_time: String,
    pub end_time: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationSetDraft {
    pub set: String,
    pub event_id: String,
    pub source_id: String,
}

/// A parsed-but-unpersisted annotation, as produced by the import
/// pipeline. Tags may still be unresolved tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationDraft {
    pub start_time: String,
    pub end_time: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<TagRef>,
}

impl AnnotationDraft {
    /// Materialize into a persistable annotation with a fresh uuid.
    /// Unresolved tag tokens land in the reserved uncategorized group.
    pub fn into_annotation(self) -> Annotation {
        let tags = self
            .tags
            .into_iter()
            .map(|t| match t {
                TagRef::Resolved(tag) => tag,
                TagRef::Unresolved(token) => Tag::uncategorized(token),
            })
            .collect();
        Annotation {
            uuid: uuid::Uuid::new_v4().to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            text: self.text,
            tags,
            extra: Map::new(),
        }
    }
}
