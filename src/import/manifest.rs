//! IIIF manifest import (Presentation 3 subset).
//!
//! One canvas becomes one event candidate; per-canvas supplementing
//! annotation pages become annotation drafts. Anything malformed fails the
//! whole import with a descriptive reason — partially populated entities
//! are never emitted.

use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::project::model::{AnnotationDraft, ItemType};

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestImport {
    /// The manifest's own label, when present.
    pub label: Option<String>,
    pub events: Vec<ManifestEvent>,
}

/// One canvas, normalized into the entity model's shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEvent {
    pub label: String,
    pub item_type: ItemType,
    pub media_url: String,
    pub created_by: String,
    pub annotations: Vec<AnnotationDraft>,
}

/// Parse a manifest document body. `imported_by` is recorded as the
/// creator of every extracted entity.
pub fn parse_manifest(body: &str, imported_by: &str) -> Result<ManifestImport> {
    let root: Value = serde_json::from_str(body).map_err(|e| StoreError::Validation {
        reason: format!("manifest is not valid JSON: {e}"),
    })?;

    let canvases = root
        .get("items")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| StoreError::validation("manifest contains no canvases"))?;

    let mut events = Vec::with_capacity(canvases.len());
    for (index, canvas) in canvases.iter().enumerate() {
        events.push(parse_canvas(canvas, index, imported_by)?);
    }

    Ok(ManifestImport {
        label: label_text(root.get("label")),
        events,
    })
}

fn parse_canvas(canvas: &Value, index: usize, imported_by: &str) -> Result<ManifestEvent> {
    let label = label_text(canvas.get("label")).ok_or_else(|| {
        StoreError::validation(format!("canvas {index} has no usable label"))
    })?;

    let body = painting_body(canvas).ok_or_else(|| {
        StoreError::Validation {
            reason: format!("canvas '{label}' has no painting annotation body"),
        }
    })?;
    let media_url = body
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Validation {
            reason: format!("canvas '{label}' painting body has no media id"),
        })?;
    let item_type = match body.get("type").and_then(Value::as_str) {
        Some("Sound") | Some("Audio") => ItemType::Audio,
        Some("Video") => ItemType::Video,
        _ => ItemType::Other,
    };

    let mut annotations = Vec::new();
    if let Some(pages) = canvas.get("annotations").and_then(Value::as_array) {
        for page in pages {
            let items = page.get("items").and_then(Value::as_array);
            for item in items.into_iter().flatten() {
                annotations.push(parse_annotation(item, &label)?);
            }
        }
    }

    Ok(ManifestEvent {
        label,
        item_type,
        media_url,
        created_by: imported_by.to_string(),
        annotations,
    })
}

/// The first painting-motivation annotation body on the canvas's first
/// annotation page — the media the canvas displays.
fn painting_body(canvas: &Value) -> Option<&Value> {
    let pages = canvas.get("items")?.as_array()?;
    for page in pages {
        let items = page.get("items")?.as_array()?;
        for anno in items {
            let motivation = anno.get("motivation").and_then(Value::as_str);
            if motivation.is_none() || motivation == Some("painting") {
                let body = anno.get("body")?;
                return match body {
                    Value::Array(bodies) => bodies.first(),
                    _ => Some(body),
                };
            }
        }
    }
    None
}

fn parse_annotation(item: &Value, canvas_label: &str) -> Result<AnnotationDraft> {
    let body = match item.get("body") {
        Some(Value::Array(bodies)) => bodies.first(),
        other => other,
    };
    let text = body
        .and_then(|b| b.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Validation {
            reason: format!("annotation on canvas '{canvas_label}' has no body value"),
        })?;

    let target = match item.get("target") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(obj) => obj.get("id").and_then(Value::as_str),
        None => None,
    }
    .ok_or_else(|| StoreError::Validation {
        reason: format!("annotation on canvas '{canvas_label}' has no target"),
    })?;

    let (start_time, end_time) = fragment_times(target).ok_or_else(|| StoreError::Validation {
        reason: format!(
            "annotation on canvas '{canvas_label}' has no time fragment in target '{target}'"
        ),
    })?;

    Ok(AnnotationDraft {
        start_time,
        end_time,
        text,
        tags: Vec::new(),
    })
}

/// Extract `(start, end)` from a media-fragment target like
/// `...#t=12.5,30`. An open end (`#t=12.5`) yields an empty end time.
fn fragment_times(target: &str) -> Option<(String, String)> {
    let fragment = target.split_once('#')?.1;
    let times = fragment
        .split('&')
        .find_map(|part| part.strip_prefix("t="))?;
    match times.split_once(',') {
        Some((start, end)) => Some((start.to_string(), end.to_string())),
        None if !times.is_empty() => Some((times.to_string(), String::new())),
        None => None,
    }
}

/// IIIF labels are either plain strings or language maps
/// (`{"en": ["Side A"]}`); take the first value either way.
fn label_text(label: Option<&Value>) -> Option<String> {
    match label? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .values()
            .find_map(|v| match v {
                Value::Array(vals) => vals.first().and_then(Value::as_str).map(str::to_string),
                Value::String(s) => Some(s.clone()),
                _ => None,
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> String {
        serde_json::json!({
            "@context": "http://iiif.io/api/presentation/3/context.json",
            "id": "https://example.org/manifest",
            "type": "Manifest",
            "label": {"en": ["Oral History Interview"]},
            "items": [{
                "id": "https://example.org/canvas/1",
                "type": "Canvas",
                "label": {"en": ["Side A"]},
                "items": [{
                    "type": "AnnotationPage",
                    "items": [{
                        "type": "Annotation",
                        "motivation": "painting",
                        "body": {
                            "id": "https://example.org/audio/side-a.mp3",
                            "type": "Sound",
                            "format": "audio/mpeg"
                        },
                        "target": "https://example.org/canvas/1"
                    }]
                }],
                "annotations": [{
                    "type": "AnnotationPage",
                    "items": [{
                        "type": "Annotation",
                        "motivation": "supplementing",
                        "body": {"type": "TextualBody", "value": "Opening remarks"},
                        "target": "https://example.org/canvas/1#t=0,12.5"
                    }]
                }]
            }]
        })
        .to_string()
    }

    #[test]
    fn parses_canvas_into_event_and_annotations() {
        let import = parse_manifest(&sample_manifest(), "importer@example.org").unwrap();
        assert_eq!(import.label.as_deref(), Some("Oral History Interview"));
        assert_eq!(import.events.len(), 1);

        let event = &import.events[0];
        assert_eq!(event.label, "Side A");
        assert_eq!(event.item_type, ItemType::Audio);
        assert_eq!(event.media_url, "https://example.org/audio/side-a.mp3");
        assert_eq!(event.created_by, "importer@example.org");

        assert_eq!(event.annotations.len(), 1);
        let ann = &event.annotations[0];
        assert_eq!(ann.start_time, "0");
        assert_eq!(ann.end_time, "12.5");
        assert_eq!(ann.text, "Opening remarks");
    }

    #[test]
    fn zero_canvases_is_a_validation_error() {
        let body = r#"{"type": "Manifest", "items": []}"#;
        let err = parse_manifest(body, "x").unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert!(err.to_string().contains("no canvases"));
    }

    #[test]
    fn invalid_json_is_a_validation_error() {
        let err = parse_manifest("not json", "x").unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn canvas_without_media_fails_whole_import() {
        let body = serde_json::json!({
            "items": [{
                "type": "Canvas",
                "label": "Silent",
                "items": []
            }]
        })
        .to_string();
        let err = parse_manifest(&body, "x").unwrap_err();
        assert!(err.to_string().contains("painting"));
    }

    #[test]
    fn open_ended_time_fragment() {
        assert_eq!(
            fragment_times("https://x/c#t=30"),
            Some(("30".into(), "".into()))
        );
        assert_eq!(fragment_times("https://x/c"), None);
    }
}
