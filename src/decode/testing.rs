//! Builders for synthetic note bodies, used by tests and benchmarks.

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

use super::schema::{self, font_weight, style_type};
use super::wire::WireWriter;
use crate::model::{Attr, AttrSet, Utf16Index};

#[derive(Debug, Clone)]
struct RunSpec {
    length: usize,
    attrs: AttrSet,
    link: Option<String>,
}

/// Encodes text and sequential style runs the way the notes app stores them.
///
/// Run lengths are UTF-16 code units, laid end to end from offset 0.
#[derive(Debug, Clone)]
pub struct NoteBlobBuilder {
    text: String,
    runs: Vec<RunSpec>,
}

impl NoteBlobBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            runs: Vec::new(),
        }
    }

    /// Append an unformatted run.
    pub fn plain(self, length: usize) -> Self {
        self.styled(length, AttrSet::EMPTY)
    }

    /// Append a run with the given attributes.
    pub fn styled(mut self, length: usize, attrs: impl Into<AttrSet>) -> Self {
        self.runs.push(RunSpec {
            length,
            attrs: attrs.into(),
            link: None,
        });
        self
    }

    /// Append a run linking to `url`.
    pub fn linked(mut self, length: usize, url: impl Into<String>) -> Self {
        self.runs.push(RunSpec {
            length,
            attrs: AttrSet::EMPTY,
            link: Some(url.into()),
        });
        self
    }

    /// Append a plain run covering whatever text the runs so far leave uncovered.
    pub fn fill(self) -> Self {
        let covered: usize = self.runs.iter().map(|r| r.length).sum();
        let remaining = Utf16Index::new(&self.text).len().saturating_sub(covered);
        if remaining == 0 {
            return self;
        }
        self.plain(remaining)
    }

    /// The uncompressed protobuf payload.
    pub fn payload(&self) -> Vec<u8> {
        WireWriter::new()
            .varint(1, 0)
            .message(schema::ROOT_DOCUMENT, |doc| {
                doc.varint(2, 0).message(schema::DOCUMENT_NOTE, |note| {
                    note.string(schema::NOTE_TEXT, &self.text);
                    for run in &self.runs {
                        note.message(schema::NOTE_ATTRIBUTE_RUN, |m| encode_run(m, run));
                    }
                });
            })
            .finish()
    }

    /// The payload gzip-compressed, as stored in the notes database.
    pub fn gzip(&self) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.payload())?;
        encoder.finish()
    }
}

fn encode_run(m: &mut WireWriter, run: &RunSpec) {
    m.varint(schema::RUN_LENGTH, run.length as u64);

    let kind = [
        (Attr::Heading1, style_type::HEADING),
        (Attr::Heading2, style_type::SUBHEADING),
        (Attr::CodeBlock, style_type::MONOSPACED),
        (Attr::NumberedListItem, style_type::NUMBERED_LIST),
        (Attr::BulletListItem, style_type::DOTTED_LIST),
    ]
    .into_iter()
    .find(|(attr, _)| run.attrs.contains(*attr))
    .map(|(_, kind)| kind);
    let quote = run.attrs.contains(Attr::BlockQuote);
    if kind.is_some() || quote {
        m.message(schema::RUN_PARAGRAPH_STYLE, |p| {
            if let Some(kind) = kind {
                p.varint(schema::PARAGRAPH_STYLE_TYPE, kind);
            }
            if quote {
                p.varint(schema::PARAGRAPH_BLOCKQUOTE, 1);
            }
        });
    }

    match (run.attrs.contains(Attr::Bold), run.attrs.contains(Attr::Italic)) {
        (true, true) => {
            m.varint(schema::RUN_FONT_WEIGHT, font_weight::BOLD_ITALIC);
        }
        (true, false) => {
            m.varint(schema::RUN_FONT_WEIGHT, font_weight::BOLD);
        }
        (false, true) => {
            m.varint(schema::RUN_FONT_WEIGHT, font_weight::ITALIC);
        }
        (false, false) => {}
    }
    if run.attrs.contains(Attr::Underline) {
        m.varint(schema::RUN_UNDERLINE, 1);
    }
    if run.attrs.contains(Attr::Strikethrough) {
        m.varint(schema::RUN_STRIKETHROUGH, 1);
    }
    if run.attrs.contains(Attr::Superscript) {
        m.varint(schema::RUN_SUPERSCRIPT, 1);
    }
    if let Some(link) = &run.link {
        m.string(schema::RUN_LINK, link);
    }
}
