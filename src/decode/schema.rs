//! Field dictionary for note bodies.
//!
//! Reverse-engineered; no published schema exists. Anything not listed here
//! is skipped by the decoder.

/// `NoteStoreProto.document`
pub const ROOT_DOCUMENT: u32 = 2;
/// `Document.note`
pub const DOCUMENT_NOTE: u32 = 3;

/// `Note.note_text`, the plain text body
pub const NOTE_TEXT: u32 = 2;
/// `Note.attribute_run`, repeated
pub const NOTE_ATTRIBUTE_RUN: u32 = 5;

/// Run length in UTF-16 units. Runs are laid end to end, so offsets are implicit.
pub const RUN_LENGTH: u32 = 1;
pub const RUN_PARAGRAPH_STYLE: u32 = 2;
pub const RUN_FONT_WEIGHT: u32 = 5;
pub const RUN_UNDERLINE: u32 = 6;
pub const RUN_STRIKETHROUGH: u32 = 7;
/// Positive is superscript, negative is subscript.
pub const RUN_SUPERSCRIPT: u32 = 8;
pub const RUN_LINK: u32 = 9;

pub const PARAGRAPH_STYLE_TYPE: u32 = 1;
pub const PARAGRAPH_BLOCKQUOTE: u32 = 8;

/// `ParagraphStyle.style_type` values.
pub mod style_type {
    pub const TITLE: u64 = 0;
    pub const HEADING: u64 = 1;
    pub const SUBHEADING: u64 = 2;
    pub const MONOSPACED: u64 = 4;
    pub const DOTTED_LIST: u64 = 100;
    pub const DASHED_LIST: u64 = 101;
    pub const NUMBERED_LIST: u64 = 102;
    pub const CHECKBOX: u64 = 103;
}

/// `AttributeRun.font_weight` values.
pub mod font_weight {
    pub const BOLD: u64 = 1;
    pub const ITALIC: u64 = 2;
    pub const BOLD_ITALIC: u64 = 3;
}
