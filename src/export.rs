//! Note export for inspection.
//!
//! Decodes notes without publishing them, either as one summary line per
//! note or as a JSON document with the decoded text and, optionally, the
//! style runs.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decode::decode;
use crate::error::Result;
use crate::model::{AttrSet, LinkTarget, Note, Utf16Index};
use crate::publish::output::write_atomic;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedNote {
    pub identifier: String,
    pub title: String,
    pub folder_path: Vec<String>,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    pub text_content: String,
    pub note_links: Vec<ExportedLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_runs: Option<Vec<ExportedRun>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

/// A link to another note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedLink {
    pub note_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedRun {
    pub start: usize,
    pub length: usize,
    pub text: String,
    pub attrs: AttrSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkTarget>,
}

impl ExportedNote {
    pub fn from_note(note: &Note, include_formatting: bool) -> Self {
        let decoded = note.body.as_deref().map(decode).unwrap_or_default();
        let idx = Utf16Index::new(&decoded.text);
        let text_of = |start: usize, length: usize| {
            idx.slice(&decoded.text, start..start.saturating_add(length)).to_string()
        };

        let note_links = decoded
            .runs
            .iter()
            .filter_map(|run| match &run.link {
                Some(LinkTarget::Note(id)) => Some(ExportedLink {
                    note_id: id.clone(),
                    text: text_of(run.start, run.length),
                }),
                _ => None,
            })
            .collect();

        let style_runs = include_formatting.then(|| {
            decoded
                .runs
                .iter()
                .map(|run| ExportedRun {
                    start: run.start,
                    length: run.length,
                    text: text_of(run.start, run.length),
                    attrs: run.attrs,
                    link: run.link.clone(),
                })
                .collect()
        });

        Self {
            identifier: note.id.to_string(),
            title: note.title.clone(),
            folder_path: note.folder_path.clone(),
            creation_date: note.created,
            modification_date: note.modified,
            note_links,
            style_runs,
            issues: decoded.issues.iter().map(ToString::to_string).collect(),
            text_content: decoded.text,
        }
    }

    /// `  [YYYY-MM-DD] Title`, followed by one line per note link.
    pub fn summary(&self) -> String {
        let mut out = format!("  [{}] {}", self.modification_date.format("%Y-%m-%d"), self.title);
        for link in &self.note_links {
            out.push_str(&format!("\n             -> links to: {}", link.note_id));
        }
        out
    }
}

/// Pretty JSON array of exported notes.
pub fn to_json(notes: &[Note], include_formatting: bool) -> Result<String> {
    let exported: Vec<ExportedNote> = notes
        .iter()
        .map(|n| ExportedNote::from_note(n, include_formatting))
        .collect();
    let mut json = serde_json::to_string_pretty(&exported)?;
    json.push('\n');
    Ok(json)
}

pub fn write_json(notes: &[Note], path: &Path, include_formatting: bool) -> Result<()> {
    write_atomic(path, to_json(notes, include_formatting)?.as_bytes())?;
    Ok(())
}
