// SPDX-License-Identifier: MIT
//! High-level project store: one method per mutating API call.
//!
//! Every method here follows the same shape: open exactly one session,
//! perform all file edits for the request (the entity itself, the page
//! order index, the project's `last_updated` stamp), then publish exactly
//! one commit. Either every file lands in one push or none do. A rejected
//! push surfaces as [`StoreError::Conflict`] and the caller retries the
//! whole call — there is no merge and no automatic retry here.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::import::ManifestImport;
use crate::project::model::{
    Annotation, AnnotationDraft, AnnotationPage, AnnotationSetDraft, Event, EventDraft, Page,
    PageDraft, Project, ProjectMeta, Tag, TagGroup, UNCATEGORIZED,
};
use crate::project::{linearize_with, mapper, paths, reconcile};
use crate::session::{Identity, PublishOutcome, RepoSession, SessionOptions};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub remote_url: String,
    pub branch: String,
    pub identity: Identity,
    /// Clone depth; 0 disables shallow fetch.
    pub depth: u32,
    /// Deadline for the network edges of each request (clone and push).
    pub timeout: Option<Duration>,
}

impl StoreConfig {
    pub fn new(remote_url: impl Into<String>, identity: Identity) -> Self {
        Self {
            remote_url: remote_url.into(),
            branch: "main".to_string(),
            identity,
            depth: 1,
            timeout: None,
        }
    }
}

/// Git-backed project store. Cheap to construct; all state lives in the
/// remote repository, and every call gets its own isolated session.
pub struct ProjectStore {
    config: StoreConfig,
}

impl ProjectStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    async fn open_session(&self) -> Result<RepoSession> {
        let mut opts = SessionOptions::new(&self.config.remote_url, self.config.identity.clone())
            .branch(&self.config.branch)
            .depth(self.config.depth);
        if let Some(t) = self.config.timeout {
            opts = opts.timeout(t);
        }
        RepoSession::open(opts).await
    }

    /// Map a publish outcome into the error taxonomy. Every mutating
    /// method goes through here — success is never declared without
    /// checking the push result.
    async fn publish(&self, session: &mut RepoSession, message: &str) -> Result<String> {
        match session.commit_and_push(message).await? {
            PublishOutcome::Published { commit_id } => Ok(commit_id),
            PublishOutcome::Conflict { reason } => Err(StoreError::Conflict { reason }),
            PublishOutcome::Failed { reason } => Err(StoreError::Publish { reason }),
        }
    }

    fn touch_last_updated(session: &mut RepoSession) -> Result<()> {
        let mut meta = mapper::read_project_meta(session)?;
        meta.last_updated = Some(now());
        mapper::write_project_meta(session, &meta)
    }

    // ── Project ─────────────────────────────────────────────────────────────

    /// Read the whole project in one session. Page structure comes from
    /// the parent pointers; the explicit order index only decides sibling
    /// order, so a drifted index can never misnest a page.
    pub async fn load_project(&self) -> Result<Project> {
        let session = self.open_session().await?;
        let mut project = mapper::load_project(&session)?;
        let pages: Vec<Page> = project.pages.values().cloned().collect();
        project.page_order = linearize_with(&pages, &project.page_order);
        debug!(
            events = project.events.len(),
            pages = project.pages.len(),
            sets = project.annotation_sets.len(),
            "project loaded"
        );
        Ok(project)
    }

    pub async fn update_project_meta(&self, mut meta: ProjectMeta) -> Result<ProjectMeta> {
        let mut session = self.open_session().await?;
        // The project file must already exist; a repo without one was
        // never initialized as a project.
        mapper::read_project_meta(&session)?;
        meta.last_updated = Some(now());
        mapper::write_project_meta(&mut session, &meta)?;
        self.publish(&mut session, "Update project metadata").await?;
        Ok(meta)
    }

    // ── Events ──────────────────────────────────────────────────────────────

    pub async fn create_event(&self, draft: EventDraft) -> Result<Event> {
        if draft.label.trim().is_empty() {
            return Err(StoreError::validation("event label must not be empty"));
        }
        let mut session = self.open_session().await?;

        let id = match draft.id {
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        if session.file_exists(&paths::event_path(&id)?) {
            return Err(StoreError::validation(format!("event {id} already exists")));
        }

        let event = Event {
            id,
            label: draft.label,
            item_type: draft.item_type,
            media_url: draft.media_url,
            auto_generate_web_page: draft.auto_generate_web_page,
            created_at: Some(now()),
            created_by: Some(self.config.identity.name.clone()),
            extra: Default::default(),
        };
        mapper::write_event(&mut session, &event)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Create event {}", event.label))
            .await?;
        info!(event = %event.id, "event created");
        Ok(event)
    }

    pub async fn update_event(&self, mut event: Event) -> Result<Event> {
        let mut session = self.open_session().await?;
        let existing = mapper::read_event(&session, &event.id)?;
        // Server-assigned audit fields are kept unless the caller already
        // carries them.
        if event.created_at.is_none() {
            event.created_at = existing.created_at;
        }
        if event.created_by.is_none() {
            event.created_by = existing.created_by;
        }
        mapper::write_event(&mut session, &event)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Update event {}", event.label))
            .await?;
        Ok(event)
    }

    /// Delete an event and every annotation set that references it.
    pub async fn delete_event(&self, id: &str) -> Result<()> {
        let mut session = self.open_session().await?;
        mapper::delete_event(&mut session, id)?;

        let orphaned: Vec<String> = mapper::list_annotation_sets(&session)?
            .into_iter()
            .filter(|s| s.event_id == id)
            .map(|s| s.id)
            .collect();
        for set_id in &orphaned {
            mapper::delete_annotation_set(&mut session, set_id)?;
        }

        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Delete event {id}")).await?;
        info!(event = %id, cascaded = orphaned.len(), "event deleted");
        Ok(())
    }

    // ── Pages ───────────────────────────────────────────────────────────────

    /// Create or update a page. The parent, when present, must reference
    /// an existing page. The order index is recomputed from the parent
    /// pointers in the same commit.
    pub async fn write_page(&self, draft: PageDraft) -> Result<Page> {
        if draft.title.trim().is_empty() {
            return Err(StoreError::validation("page title must not be empty"));
        }
        let mut session = self.open_session().await?;

        let id = match draft.id {
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        if let Some(parent) = draft.parent.as_deref() {
            if parent == id {
                return Err(StoreError::validation("page cannot be its own parent"));
            }
            if !session.file_exists(&paths::page_path(parent)?) {
                return Err(StoreError::validation(format!(
                    "parent page {parent} does not exist"
                )));
            }
        }

        let page = match mapper::read_page(&session, &id) {
            Ok(existing) => Page {
                title: draft.title,
                content: draft.content,
                parent: draft.parent,
                updated_at: Some(now()),
                ..existing
            },
            Err(StoreError::NotFound(_)) => Page {
                id: id.clone(),
                title: draft.title,
                content: draft.content,
                parent: draft.parent,
                created_at: Some(now()),
                updated_at: Some(now()),
                created_by: Some(self.config.identity.name.clone()),
                extra: Default::default(),
            },
            Err(e) => return Err(e),
        };
        mapper::write_page(&mut session, &page)?;

        Self::refresh_page_order(&mut session)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Update page {}", page.title))
            .await?;
        Ok(page)
    }

    pub async fn delete_page(&self, id: &str) -> Result<()> {
        let mut session = self.open_session().await?;
        mapper::delete_page(&mut session, id)?;
        // Children of the deleted page keep their pointer; reads tolerate
        // the dangling parent and treat them as roots.
        Self::refresh_page_order(&mut session)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Delete page {id}")).await?;
        Ok(())
    }

    /// Bulk reorder: the submitted order list is authoritative. Parent
    /// pointers are rewritten to agree with it in the same commit, so the
    /// two representations cannot drift through this path.
    pub async fn reorder_pages(&self, order: Vec<String>) -> Result<Vec<String>> {
        let mut session = self.open_session().await?;
        let pages = mapper::list_pages(&session)?;
        let outcome = reconcile(&pages, &order);

        for page in &pages {
            let effective = outcome.parents.get(&page.id).cloned().flatten();
            if effective != page.parent {
                let mut updated = page.clone();
                updated.parent = effective;
                updated.updated_at = Some(now());
                mapper::write_page(&mut session, &updated)?;
            }
        }
        mapper::write_page_order(&mut session, &outcome.order)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, "Reorder pages").await?;
        Ok(outcome.order)
    }

    fn refresh_page_order(session: &mut RepoSession) -> Result<()> {
        let pages = mapper::list_pages(session)?;
        let previous = mapper::read_page_order(session)?;
        let order = linearize_with(&pages, &previous);
        mapper::write_page_order(session, &order)
    }

    // ── Annotation sets ─────────────────────────────────────────────────────

    pub async fn create_annotation_set(&self, draft: AnnotationSetDraft) -> Result<AnnotationPage> {
        for (field, value) in [
            ("set", &draft.set),
            ("event_id", &draft.event_id),
            ("source_id", &draft.source_id),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::validation(format!(
                    "annotation set requires a non-empty '{field}'"
                )));
            }
        }
        let mut session = self.open_session().await?;
        if !session.file_exists(&paths::event_path(&draft.event_id)?) {
            return Err(StoreError::validation(format!(
                "annotation set references unknown event {}",
                draft.event_id
            )));
        }

        let set = AnnotationPage {
            id: Uuid::new_v4().to_string(),
            set: draft.set,
            event_id: draft.event_id,
            source_id: draft.source_id,
            annotations: Vec::new(),
            extra: Default::default(),
        };
        mapper::write_annotation_set(&mut session, &set)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Create annotation set {}", set.set))
            .await?;
        Ok(set)
    }

    pub async fn delete_annotation_set(&self, id: &str) -> Result<()> {
        let mut session = self.open_session().await?;
        mapper::delete_annotation_set(&mut session, id)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Delete annotation set {id}"))
            .await?;
        Ok(())
    }

    pub async fn add_annotation(
        &self,
        set_id: &str,
        draft: AnnotationDraft,
    ) -> Result<Annotation> {
        let mut session = self.open_session().await?;
        let mut set = mapper::read_annotation_set(&session, set_id)?;
        let annotation = draft.into_annotation();
        set.annotations.push(annotation.clone());
        mapper::write_annotation_set(&mut session, &set)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Add annotation to {}", set.set))
            .await?;
        Ok(annotation)
    }

    pub async fn update_annotation(
        &self,
        set_id: &str,
        annotation: Annotation,
    ) -> Result<Annotation> {
        let mut session = self.open_session().await?;
        let mut set = mapper::read_annotation_set(&session, set_id)?;
        let slot = set
            .annotations
            .iter_mut()
            .find(|a| a.uuid == annotation.uuid)
            .ok_or_else(|| StoreError::not_found(format!("annotation {}", annotation.uuid)))?;
        *slot = annotation.clone();
        mapper::write_annotation_set(&mut session, &set)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Update annotation in {}", set.set))
            .await?;
        Ok(annotation)
    }

    /// Remove one annotation by uuid. Removing the last annotation deletes
    /// the set file entirely — empty sets are not retained.
    pub async fn delete_annotation(&self, set_id: &str, uuid: &str) -> Result<()> {
        let mut session = self.open_session().await?;
        let mut set = mapper::read_annotation_set(&session, set_id)?;
        let before = set.annotations.len();
        set.annotations.retain(|a| a.uuid != uuid);
        if set.annotations.len() == before {
            return Err(StoreError::not_found(format!("annotation {uuid}")));
        }

        if set.annotations.is_empty() {
            mapper::delete_annotation_set(&mut session, set_id)?;
        } else {
            mapper::write_annotation_set(&mut session, &set)?;
        }
        Self::touch_last_updated(&mut session)?;
        self.publish(&mut session, &format!("Delete annotation from {}", set.set))
            .await?;
        Ok(())
    }

    // ── Tags ────────────────────────────────────────────────────────────────

    pub async fn add_tag(&self, mut tag: Tag) -> Result<ProjectMeta> {
        if tag.tag.trim().is_empty() {
            return Err(StoreError::validation("tag name must not be empty"));
        }
        if tag.category.trim().is_empty() {
            tag.category = UNCATEGORIZED.to_string();
        }
        let mut session = self.open_session().await?;
        let mut meta = mapper::read_project_meta(&session)?;
        let duplicate = meta.tags.iter().any(|t| {
            t.tag.eq_ignore_ascii_case(&tag.tag) && t.category.eq_ignore_ascii_case(&tag.category)
        });
        if duplicate {
            return Err(StoreError::validation(format!(
                "tag '{}' already exists in category '{}'",
                tag.tag, tag.category
            )));
        }
        meta.tags.push(tag.clone());
        meta.last_updated = Some(now());
        mapper::write_project_meta(&mut session, &meta)?;
        self.publish(&mut session, &format!("Add tag {}", tag.tag)).await?;
        Ok(meta)
    }

    pub async fn remove_tag(&self, tag: &Tag) -> Result<ProjectMeta> {
        let mut session = self.open_session().await?;
        let mut meta = mapper::read_project_meta(&session)?;
        let before = meta.tags.len();
        meta.tags
            .retain(|t| !(t.tag == tag.tag && t.category == tag.category));
        if meta.tags.len() == before {
            return Err(StoreError::not_found(format!(
                "tag '{}' in category '{}'",
                tag.tag, tag.category
            )));
        }
        meta.last_updated = Some(now());
        mapper::write_project_meta(&mut session, &meta)?;
        self.publish(&mut session, &format!("Remove tag {}", tag.tag))
            .await?;
        Ok(meta)
    }

    pub async fn upsert_tag_group(&self, group: TagGroup) -> Result<ProjectMeta> {
        if group.category.trim().is_empty() || group.category == UNCATEGORIZED {
            return Err(StoreError::validation(format!(
                "'{}' is not a valid tag group category",
                group.category
            )));
        }
        let mut session = self.open_session().await?;
        let mut meta = mapper::read_project_meta(&session)?;
        match meta.tag_groups.iter_mut().find(|g| g.category == group.category) {
            Some(existing) => existing.color = group.color.clone(),
            None => meta.tag_groups.push(group.clone()),
        }
        meta.last_updated = Some(now());
        mapper::write_project_meta(&mut session, &meta)?;
        self.publish(&mut session, &format!("Update tag group {}", group.category))
            .await?;
        Ok(meta)
    }

    // ── Import application ──────────────────────────────────────────────────

    /// Append parsed tabular records to an existing set in one commit.
    pub async fn apply_tabular_import(
        &self,
        set_id: &str,
        records: Vec<AnnotationDraft>,
    ) -> Result<AnnotationPage> {
        if records.is_empty() {
            return Err(StoreError::validation("import produced no records"));
        }
        let mut session = self.open_session().await?;
        let mut set = mapper::read_annotation_set(&session, set_id)?;
        let count = records.len();
        set.annotations
            .extend(records.into_iter().map(AnnotationDraft::into_annotation));
        mapper::write_annotation_set(&mut session, &set)?;
        Self::touch_last_updated(&mut session)?;
        self.publish(
            &mut session,
            &format!("Import {count} annotations into {}", set.set),
        )
        .await?;
        Ok(set)
    }

    /// Persist a parsed manifest: one event per canvas, plus one
    /// annotation set per canvas that carried annotations. All in one
    /// commit — a failed push leaves none of it behind.
    pub async fn apply_manifest_import(&self, import: ManifestImport) -> Result<Vec<Event>> {
        let mut session = self.open_session().await?;
        let mut created = Vec::with_capacity(import.events.len());

        for entry in import.events {
            let event = Event {
                id: Uuid::new_v4().to_string(),
                label: entry.label.clone(),
                item_type: entry.item_type,
                media_url: Some(entry.media_url.clone()),
                auto_generate_web_page: false,
                created_at: Some(now()),
                created_by: Some(entry.created_by.clone()),
                extra: Default::default(),
            };
            mapper::write_event(&mut session, &event)?;

            if !entry.annotations.is_empty() {
                let set = AnnotationPage {
                    id: Uuid::new_v4().to_string(),
                    set: entry.label,
                    event_id: event.id.clone(),
                    source_id: entry.media_url,
                    annotations: entry
                        .annotations
                        .into_iter()
                        .map(AnnotationDraft::into_annotation)
                        .collect(),
                    extra: Default::default(),
                };
                mapper::write_annotation_set(&mut session, &set)?;
            }
            created.push(event);
        }

        Self::touch_last_updated(&mut session)?;
        self.publish(
            &mut session,
            &format!("Import manifest ({} events)", created.len()),
        )
        .await?;
        info!(events = created.len(), "manifest import published");
        Ok(created)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
