//! Core data model shared by the decoder, renderer and publisher.
//!
//! - [`Note`] is a source record, keyed by its immutable [`NoteId`]
//! - [`StyleRun`] annotates a range of decoded text with an [`AttrSet`] and
//!   an optional [`LinkTarget`]
//! - [`Utf16Index`] maps the UTF-16 offsets used by runs onto the UTF-8 text

mod attrs;
mod note;
mod run;
mod text;

pub use attrs::{Attr, AttrSet};
pub use note::{Note, NoteId};
pub use run::{LinkTarget, StyleRun};
pub use text::Utf16Index;
