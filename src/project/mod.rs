//! Project entity model, canonical paths, JSON mapping, and the page
//! hierarchy reconstructor.

pub mod mapper;
pub mod model;
pub mod order;
pub mod paths;

pub use model::{
    Annotation, AnnotationDraft, AnnotationPage, AnnotationSetDraft, Event, EventDraft, ItemType,
    Page, PageDraft, Project, ProjectMeta, Tag, TagGroup, TagRef, UNCATEGORIZED,
};
pub use order::{linearize, linearize_with, reconcile, Reordered};
