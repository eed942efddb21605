//! Binary note body decoder.
//!
//! A note body is a compressed protobuf message. Decoding never fails: any
//! problem is recorded as a [`DecodeIssue`] and the best result extracted so
//! far is returned.
//!
//! ```
//! use notepress::decode::{decode, testing::NoteBlobBuilder};
//! use notepress::model::Attr;
//!
//! let blob = NoteBlobBuilder::new("Hello World")
//!     .styled(5, Attr::Bold)
//!     .fill()
//!     .gzip()
//!     .unwrap();
//! let note = decode(&blob);
//! assert_eq!(note.text, "Hello World");
//! assert_eq!(note.runs.len(), 1);
//! assert!(!note.is_degraded());
//! ```

pub mod schema;
pub mod testing;
pub mod wire;

use std::io::{self, Read};

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use thiserror::Error;

use crate::model::{Attr, AttrSet, LinkTarget, StyleRun, Utf16Index};
use schema::{font_weight, style_type};
use wire::{WireError, WireReader};

/// Upper bound on a decompressed body. Real notes are far smaller.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// A problem confined to one note body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeIssue {
    #[error("body could not be decompressed: {0}")]
    Decompress(String),
    #[error("malformed body ({reason}), kept {runs_kept} style runs")]
    Malformed { reason: String, runs_kept: usize },
    #[error("body contains no text field")]
    MissingText,
    #[error("body text is not valid UTF-8")]
    InvalidUtf8,
    #[error("style runs cover {declared} units but the text has {text_len}")]
    RunsOutOfBounds { declared: u64, text_len: usize },
}

/// Plain text plus normalized style runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedNote {
    pub text: String,
    /// Absolute, sorted, non-empty, within `text`.
    pub runs: Vec<StyleRun>,
    pub issues: Vec<DecodeIssue>,
}

impl DecodedNote {
    /// Plain text with no formatting, e.g. for a body that could not be decoded.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Drop the first line if it repeats `title`, shifting runs to match.
    ///
    /// The source stores the title as the first line of the body; published
    /// pages show it from the template instead.
    pub fn without_title_line(mut self, title: &str) -> Self {
        let first_line = self.text.split('\n').next().unwrap_or_default();
        if first_line.trim() != title.trim() {
            return self;
        }

        let cut_bytes = match self.text.find('\n') {
            Some(nl) => nl + 1,
            None => self.text.len(),
        };
        let cut_units = Utf16Index::new(&self.text).unit_at_byte(cut_bytes);

        self.text.drain(..cut_bytes);
        self.runs = self
            .runs
            .into_iter()
            .filter_map(|run| {
                let start = run.start.saturating_sub(cut_units);
                let end = run.end().saturating_sub(cut_units);
                (end > start).then(|| StyleRun {
                    start,
                    length: end - start,
                    ..run
                })
            })
            .collect();
        self
    }
}

/// Decode a compressed note body.
pub fn decode(blob: &[u8]) -> DecodedNote {
    if blob.is_empty() {
        return DecodedNote::default();
    }
    match decompress(blob) {
        Ok(payload) => decode_payload(&payload),
        Err(err) => {
            tracing::debug!(error = %err, len = blob.len(), "note body decompression failed");
            DecodedNote {
                issues: vec![DecodeIssue::Decompress(err.to_string())],
                ..DecodedNote::default()
            }
        }
    }
}

/// Inflate gzip, zlib or raw deflate, detected from the leading bytes.
pub fn decompress(blob: &[u8]) -> io::Result<Vec<u8>> {
    let limit = MAX_PAYLOAD_BYTES as u64 + 1;
    let mut out = Vec::new();
    match blob {
        [0x1f, 0x8b, ..] => GzDecoder::new(blob).take(limit).read_to_end(&mut out)?,
        [cmf, flg, ..] if is_zlib_header(*cmf, *flg) => {
            ZlibDecoder::new(blob).take(limit).read_to_end(&mut out)?
        }
        _ => DeflateDecoder::new(blob).take(limit).read_to_end(&mut out)?,
    };
    if out.len() > MAX_PAYLOAD_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed body exceeds {MAX_PAYLOAD_BYTES} bytes"),
        ));
    }
    Ok(out)
}

#[inline]
fn is_zlib_header(cmf: u8, flg: u8) -> bool {
    cmf & 0x0f == 8 && cmf >> 4 <= 7 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

/// Decode an already decompressed protobuf payload.
pub fn decode_payload(payload: &[u8]) -> DecodedNote {
    let mut issues = Vec::new();

    let note = match find_note_message(payload) {
        Ok(Some(note)) => note,
        Ok(None) => {
            return DecodedNote {
                issues: vec![DecodeIssue::MissingText],
                ..DecodedNote::default()
            };
        }
        Err(err) => {
            return DecodedNote {
                issues: vec![DecodeIssue::Malformed {
                    reason: err.to_string(),
                    runs_kept: 0,
                }],
                ..DecodedNote::default()
            };
        }
    };

    let mut text_bytes: Vec<u8> = Vec::new();
    let mut saw_text = false;
    let mut raw_runs = Vec::new();
    let mut runs_broken = false;

    for field in WireReader::new(note) {
        let field = match field {
            Ok(field) => field,
            Err(err) => {
                issues.push(DecodeIssue::Malformed {
                    reason: err.to_string(),
                    runs_kept: raw_runs.len(),
                });
                break;
            }
        };
        match (field.number, field.value.as_bytes()) {
            (schema::NOTE_TEXT, Some(bytes)) => {
                saw_text = true;
                text_bytes.extend_from_slice(bytes);
            }
            (schema::NOTE_ATTRIBUTE_RUN, Some(bytes)) if !runs_broken => {
                match parse_run(bytes) {
                    Ok(run) => raw_runs.push(run),
                    Err(err) => {
                        // Later runs would be misplaced, since offsets are cumulative.
                        issues.push(DecodeIssue::Malformed {
                            reason: err.to_string(),
                            runs_kept: raw_runs.len(),
                        });
                        runs_broken = true;
                    }
                }
            }
            _ => {}
        }
    }

    if !saw_text {
        issues.push(DecodeIssue::MissingText);
    }

    let text = match String::from_utf8(text_bytes) {
        Ok(text) => text,
        Err(err) => {
            issues.push(DecodeIssue::InvalidUtf8);
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };

    let text_len = Utf16Index::new(&text).len();
    let (runs, declared) = normalize_runs(raw_runs, text_len);
    if declared > text_len as u64 {
        issues.push(DecodeIssue::RunsOutOfBounds { declared, text_len });
    }

    DecodedNote { text, runs, issues }
}

/// Walk `root.document.note`, skipping everything else.
fn find_note_message(payload: &[u8]) -> Result<Option<&[u8]>, WireError> {
    let Some(document) = find_message(payload, schema::ROOT_DOCUMENT)? else {
        return Ok(None);
    };
    find_message(document, schema::DOCUMENT_NOTE)
}

fn find_message(data: &[u8], number: u32) -> Result<Option<&[u8]>, WireError> {
    for field in WireReader::new(data) {
        let field = field?;
        if field.number == number {
            if let Some(bytes) = field.value.as_bytes() {
                return Ok(Some(bytes));
            }
        }
    }
    Ok(None)
}

/// One attribute run as stored, before offsets are resolved.
#[derive(Debug, Clone, Default, PartialEq)]
struct RawRun {
    length: u64,
    attrs: AttrSet,
    link: Option<LinkTarget>,
}

fn parse_run(data: &[u8]) -> Result<RawRun, WireError> {
    let mut run = RawRun::default();
    for field in WireReader::new(data) {
        let field = field?;
        let value = field.value;
        match field.number {
            schema::RUN_LENGTH => run.length = value.as_u64().unwrap_or(0),
            schema::RUN_PARAGRAPH_STYLE => {
                if let Some(bytes) = value.as_bytes() {
                    run.attrs = run.attrs.union(parse_paragraph_style(bytes)?);
                }
            }
            schema::RUN_FONT_WEIGHT => match value.as_u64() {
                Some(font_weight::BOLD) => run.attrs |= Attr::Bold,
                Some(font_weight::ITALIC) => run.attrs |= Attr::Italic,
                Some(font_weight::BOLD_ITALIC) => {
                    run.attrs |= Attr::Bold;
                    run.attrs |= Attr::Italic;
                }
                _ => {}
            },
            schema::RUN_UNDERLINE if value.as_u64().is_some_and(|v| v != 0) => {
                run.attrs |= Attr::Underline;
            }
            schema::RUN_STRIKETHROUGH if value.as_u64().is_some_and(|v| v != 0) => {
                run.attrs |= Attr::Strikethrough;
            }
            schema::RUN_SUPERSCRIPT if value.as_i64().is_some_and(|v| v > 0) => {
                run.attrs |= Attr::Superscript;
            }
            schema::RUN_LINK => {
                if let Some(url) = value.as_bytes().and_then(|b| std::str::from_utf8(b).ok()) {
                    run.link = Some(LinkTarget::parse(url));
                }
            }
            _ => {}
        }
    }
    Ok(run)
}

fn parse_paragraph_style(data: &[u8]) -> Result<AttrSet, WireError> {
    let mut attrs = AttrSet::EMPTY;
    for field in WireReader::new(data) {
        let field = field?;
        match (field.number, field.value.as_u64()) {
            (schema::PARAGRAPH_STYLE_TYPE, Some(kind)) => {
                if let Some(attr) = style_type_attr(kind) {
                    attrs |= attr;
                }
            }
            (schema::PARAGRAPH_BLOCKQUOTE, Some(v)) if v != 0 => attrs |= Attr::BlockQuote,
            _ => {}
        }
    }
    Ok(attrs)
}

fn style_type_attr(kind: u64) -> Option<Attr> {
    match kind {
        style_type::TITLE | style_type::HEADING => Some(Attr::Heading1),
        style_type::SUBHEADING => Some(Attr::Heading2),
        style_type::MONOSPACED => Some(Attr::CodeBlock),
        style_type::DOTTED_LIST | style_type::DASHED_LIST | style_type::CHECKBOX => {
            Some(Attr::BulletListItem)
        }
        style_type::NUMBERED_LIST => Some(Attr::NumberedListItem),
        _ => None,
    }
}

/// Lay runs end to end and clamp them to the text.
///
/// Returns the runs that carry formatting and the total declared length.
fn normalize_runs(raw: Vec<RawRun>, text_len: usize) -> (Vec<StyleRun>, u64) {
    let mut cursor: u64 = 0;
    let mut runs = Vec::with_capacity(raw.len());
    for RawRun {
        length,
        attrs,
        link,
    } in raw
    {
        let start = cursor;
        cursor = cursor.saturating_add(length);
        if attrs.is_empty() && link.is_none() {
            continue;
        }
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(text_len);
        let end = usize::try_from(cursor).unwrap_or(usize::MAX).min(text_len);
        if end > start {
            runs.push(StyleRun {
                start,
                length: end - start,
                attrs,
                link,
            });
        }
    }
    runs.sort_by_key(|run| run.start);
    (runs, cursor)
}
