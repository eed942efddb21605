//! Footnote detection.
//!
//! Two notations are recognized, both written by hand in the notes app:
//!
//! - `[^label]` references with `[^label]: text` (or `[^label] text`)
//!   definition lines
//! - superscript digits as references, with a definition line that starts
//!   with the same superscript digits
//!
//! A reference only counts when its label has a definition; otherwise it is
//! ordinary text. Footnotes are numbered by first reference.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use memchr::memmem;

use super::segments::{FootnoteRef, Mark, Span};
use crate::model::{Attr, StyleRun, Utf16Index};

const MAX_LABEL_LEN: usize = 8;

/// How footnote anchors are named and linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteStyle {
    /// Footnote `n` gets id `{id_prefix}-{n}`, its first reference `{id_prefix}-{n}--anchor`.
    pub id_prefix: String,
    pub back_link: String,
}

impl Default for FootnoteStyle {
    fn default() -> Self {
        Self {
            id_prefix: "footnote".to_string(),
            back_link: "\u{21a9}\u{fe0e}".to_string(),
        }
    }
}

impl FootnoteStyle {
    /// Ids scoped to one page, so pages stay distinct when shown together on the index.
    pub fn for_slug(slug: &str) -> Self {
        Self {
            id_prefix: format!("{}--footnote", slug.replace('/', "-")),
            ..Self::default()
        }
    }

    pub fn target_id(&self, index: usize) -> String {
        format!("{}-{index}", self.id_prefix)
    }

    pub fn anchor_id(&self, index: usize) -> String {
        format!("{}-{index}--anchor", self.id_prefix)
    }
}

/// A rendered footnote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footnote {
    pub index: usize,
    pub label: String,
    /// Inline HTML of the definition text.
    pub html: String,
    /// Whether any reference points at it; unreferenced footnotes get no back link.
    pub referenced: bool,
}

/// Footnote structure of one note, before rendering.
#[derive(Debug, Default)]
pub(crate) struct FootnotePlan {
    /// Lines holding definitions; these are left out of the body.
    pub definition_lines: BTreeSet<usize>,
    pub notes: Vec<PlannedFootnote>,
    /// Reference markers, as [`Mark::Footnote`] spans.
    pub references: Vec<Span>,
}

#[derive(Debug)]
pub(crate) struct PlannedFootnote {
    pub index: usize,
    pub label: String,
    pub body: Range<usize>,
    pub referenced: bool,
}

/// A marker found in the text, bracketed or superscript.
#[derive(Debug, Clone)]
struct Marker {
    range: Range<usize>,
    label: String,
    bracketed: bool,
}

#[derive(Debug)]
struct Definition {
    line: usize,
    label: String,
    body: Range<usize>,
    /// Start of the marker introducing the definition.
    marker_start: usize,
    bracketed: bool,
}

pub(crate) fn plan(
    text: &str,
    idx: &Utf16Index,
    lines: &[Range<usize>],
    runs: &[StyleRun],
) -> FootnotePlan {
    let mut markers = bracket_markers(text, idx);
    markers.extend(superscript_markers(text, idx, runs));
    markers.retain(|m| !super::code_at(runs, m.range.start));
    if markers.is_empty() {
        return FootnotePlan::default();
    }
    markers.sort_by_key(|m| m.range.start);

    let by_start: HashMap<usize, &Marker> = markers.iter().map(|m| (m.range.start, m)).collect();

    let mut candidates = Vec::new();
    for (line_no, line) in lines.iter().enumerate() {
        let Some(marker) = by_start.get(&line.start) else {
            continue;
        };
        if let Some(body) = definition_body(text, idx, line, marker) {
            candidates.push(Definition {
                line: line_no,
                label: marker.label.clone(),
                body,
                marker_start: marker.range.start,
                bracketed: marker.bracketed,
            });
        }
    }

    let def_lines: BTreeSet<usize> = candidates.iter().map(|d| d.line).collect();
    let marker_starts: BTreeSet<usize> = candidates.iter().map(|d| d.marker_start).collect();
    let in_definition = |pos: usize| {
        let line = lines.partition_point(|l| l.end < pos);
        def_lines.contains(&line)
    };

    let references: Vec<&Marker> = markers
        .iter()
        .filter(|m| !marker_starts.contains(&m.range.start) && !in_definition(m.range.start))
        .collect();
    let referenced_labels: BTreeSet<&str> = references.iter().map(|m| m.label.as_str()).collect();

    // Bracketed definitions always stand; superscript ones need a reference.
    let mut definitions: BTreeMap<&str, &Definition> = BTreeMap::new();
    let mut plan = FootnotePlan::default();
    for def in &candidates {
        if !def.bracketed && !referenced_labels.contains(def.label.as_str()) {
            continue;
        }
        plan.definition_lines.insert(def.line);
        definitions.entry(def.label.as_str()).or_insert(def);
    }

    let mut index_of: HashMap<&str, (usize, usize)> = HashMap::new();
    for marker in references {
        let Some(def) = definitions.get(marker.label.as_str()) else {
            continue;
        };
        let next_index = plan.notes.len() + 1;
        let (index, seen) = index_of.entry(marker.label.as_str()).or_insert_with(|| {
            plan.notes.push(PlannedFootnote {
                index: next_index,
                label: marker.label.clone(),
                body: def.body.clone(),
                referenced: true,
            });
            (next_index, 0)
        });
        plan.references.push(Span::marked(
            marker.range.clone(),
            Mark::Footnote(FootnoteRef {
                index: *index,
                occurrence: *seen,
            }),
        ));
        *seen += 1;
    }

    let mut unreferenced: Vec<&Definition> = definitions
        .values()
        .filter(|d| !index_of.contains_key(d.label.as_str()))
        .copied()
        .collect();
    unreferenced.sort_by_key(|d| d.line);
    for def in unreferenced {
        plan.notes.push(PlannedFootnote {
            index: plan.notes.len() + 1,
            label: def.label.clone(),
            body: def.body.clone(),
            referenced: false,
        });
    }

    plan
}

/// The text after a definition marker at the start of `line`, if the line is a definition.
fn definition_body(
    text: &str,
    idx: &Utf16Index,
    line: &Range<usize>,
    marker: &Marker,
) -> Option<Range<usize>> {
    let after = idx.slice(text, marker.range.end..line.end);
    let rest = if marker.bracketed {
        match after.strip_prefix(':') {
            Some(rest) => rest,
            None if after.starts_with(|c: char| c.is_whitespace()) => after,
            None => return None,
        }
    } else {
        after.strip_prefix(':').unwrap_or(after)
    };
    let body = rest.trim_start();
    if body.trim().is_empty() {
        return None;
    }
    let skipped = after.len() - body.len();
    let start = idx.unit_at_byte(idx.byte_offset(marker.range.end) + skipped);
    Some(start..line.end)
}

/// `[^label]` occurrences.
fn bracket_markers(text: &str, idx: &Utf16Index) -> Vec<Marker> {
    let bytes = text.as_bytes();
    let mut markers = Vec::new();
    for open in memmem::find_iter(bytes, b"[^") {
        let label_start = open + 2;
        let label_len = bytes[label_start..]
            .iter()
            .take(MAX_LABEL_LEN + 1)
            .take_while(|b| b.is_ascii_alphanumeric())
            .count();
        if label_len == 0 || label_len > MAX_LABEL_LEN {
            continue;
        }
        let close = label_start + label_len;
        if bytes.get(close) != Some(&b']') {
            continue;
        }
        markers.push(Marker {
            range: idx.unit_at_byte(open)..idx.unit_at_byte(close + 1),
            label: text[label_start..close].to_ascii_lowercase(),
            bracketed: true,
        });
    }
    markers
}

/// Maximal superscript ranges whose text is a number.
fn superscript_markers(text: &str, idx: &Utf16Index, runs: &[StyleRun]) -> Vec<Marker> {
    let mut ranges: Vec<Range<usize>> = runs
        .iter()
        .filter(|r| r.attrs.contains(Attr::Superscript))
        .map(StyleRun::range)
        .collect();
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<Range<usize>> = Vec::new();
    for r in ranges {
        match merged.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => merged.push(r),
        }
    }

    merged
        .into_iter()
        .filter_map(|r| {
            let slice = idx.slice(text, r.clone());
            let label = slice.trim_matches(|c: char| c.is_ascii_whitespace());
            if label.is_empty()
                || label.len() > MAX_LABEL_LEN
                || !label.bytes().all(|b| b.is_ascii_digit())
            {
                return None;
            }
            let lead = slice.len() - slice.trim_start_matches(|c: char| c.is_ascii_whitespace()).len();
            let start = r.start + lead;
            Some(Marker {
                range: start..start + label.len(),
                label: label.to_string(),
                bracketed: false,
            })
        })
        .collect()
}
