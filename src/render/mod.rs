//! Style-run renderer.
//!
//! Turns decoded text plus [`StyleRun`](crate::model::StyleRun)s into
//! semantic HTML:
//!
//! ```
//! use notepress::model::{Attr, StyleRun};
//! use notepress::render::{render, FootnoteStyle, NoLinks};
//!
//! let runs = [StyleRun::new(0, 5).with(Attr::Bold)];
//! let out = render("Hello World", &runs, &NoLinks, &FootnoteStyle::default());
//! assert_eq!(out.html(), "<p><strong>Hello</strong> World</p>");
//! ```

pub mod escape;
mod footnotes;
mod html;
pub mod links;
pub mod segments;

pub use escape::{cdata_safe, escape_xml};
pub use footnotes::{Footnote, FootnoteStyle};
pub use html::{RenderResult, render};
pub use links::{LinkResolver, NoLinks, StaticLinks};
pub use segments::{CoverageError, SegmentMap};

use crate::model::StyleRun;

/// Whether `unit` lies inside code, where link and footnote syntax stays literal.
fn code_at(runs: &[StyleRun], unit: usize) -> bool {
    runs.iter().any(|r| r.is_code() && r.range().contains(&unit))
}
