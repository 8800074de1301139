//! Tabular import: spreadsheet-shaped grids and CSV exports.
//!
//! The caller supplies a column→field mapping and the project's tag
//! vocabulary; each row becomes one annotation draft. Cells outside a
//! row's width read as empty — spreadsheet ranges are ragged.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::project::model::{AnnotationDraft, Tag, TagRef};

/// Zero-based column indices for the logical annotation fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColumnMap {
    pub start_time: usize,
    pub end_time: usize,
    pub annotation: usize,
    #[serde(default)]
    pub tags: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct TabularOptions {
    pub map: ColumnMap,
    /// When set, row 0 is stripped before mapping.
    pub has_header: bool,
}

/// Transform a 2-D value grid into annotation drafts. Rows that are empty
/// across all mapped columns are skipped; tag tokens that match nothing in
/// the vocabulary are passed through unresolved, never dropped.
pub fn parse_grid(
    rows: &[Vec<String>],
    opts: &TabularOptions,
    vocabulary: &[Tag],
) -> Vec<AnnotationDraft> {
    let data = if opts.has_header && !rows.is_empty() {
        &rows[1..]
    } else {
        rows
    };

    let mut out = Vec::new();
    for row in data {
        let start_time = cell(row, opts.map.start_time);
        let end_time = cell(row, opts.map.end_time);
        let text = cell(row, opts.map.annotation);
        let tag_cell = opts.map.tags.map(|i| cell(row, i)).unwrap_or_default();

        if start_time.is_empty() && end_time.is_empty() && text.is_empty() && tag_cell.is_empty() {
            continue;
        }

        out.push(AnnotationDraft {
            start_time,
            end_time,
            text,
            tags: resolve_tags(&tag_cell, vocabulary),
        });
    }
    out
}

/// CSV entry point over the same transform.
pub fn parse_csv<R: Read>(
    reader: R,
    opts: &TabularOptions,
    vocabulary: &[Tag],
) -> Result<Vec<AnnotationDraft>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| StoreError::Validation {
            reason: format!("invalid CSV: {e}"),
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(parse_grid(&rows, opts, vocabulary))
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Split a tags cell and match each token against the vocabulary,
/// case-insensitively. A `category:tag` token must match both halves; a
/// bare token matches the first vocabulary entry with that tag name.
fn resolve_tags(cell: &str, vocabulary: &[Tag]) -> Vec<TagRef> {
    cell.split([',', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|token| match lookup(token, vocabulary) {
            Some(tag) => TagRef::Resolved(tag.clone()),
            None => TagRef::Unresolved(token.to_string()),
        })
        .collect()
}

fn lookup<'a>(token: &str, vocabulary: &'a [Tag]) -> Option<&'a Tag> {
    match token.split_once(':') {
        Some((category, tag)) => vocabulary.iter().find(|t| {
            t.tag.eq_ignore_ascii_case(tag.trim()) && t.category.eq_ignore_ascii_case(category.trim())
        }),
        None => vocabulary.iter().find(|t| t.tag.eq_ignore_ascii_case(token)),
    }
}
