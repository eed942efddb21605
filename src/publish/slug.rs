//! Output slugs.
//!
//! A slug is the path of a note's page below the output root, without the
//! `.html` extension: lowercase ASCII segments separated by `/`.

use std::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Note;

/// Top-level slugs taken by aggregate pages.
const RESERVED: [&str; 1] = ["index"];

/// Suffix appended to a computed slug that would take a reserved name.
const RESERVED_SUFFIX: &str = "-note";

/// Fallback when neither title nor identifier yields any slug characters.
const FALLBACK: &str = "note";

/// Why a string is not a usable slug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("slug is empty")]
    Empty,
    #[error("slug has an empty path segment")]
    EmptySegment,
    #[error("slug contains {ch:?} at byte {pos}")]
    InvalidChar { ch: char, pos: usize },
    #[error("slug {0:?} is reserved")]
    Reserved(String),
}

/// A validated slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Validate a stored or user-supplied slug.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        for (pos, ch) in s.char_indices() {
            let ok = ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '-' | '_' | '/');
            if !ok {
                return Err(SlugError::InvalidChar { ch, pos });
            }
        }
        if s.split('/').any(str::is_empty) {
            return Err(SlugError::EmptySegment);
        }
        if RESERVED.contains(&s) {
            return Err(SlugError::Reserved(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Slug::parse(&s)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How slugs are computed for notes published for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugOptions {
    /// Folder names below the published folder become path segments.
    pub include_folders: bool,
    /// Prefix `YYYY/MM/` from the creation date.
    pub date_prefix: bool,
}

impl Default for SlugOptions {
    fn default() -> Self {
        Self {
            include_folders: true,
            date_prefix: false,
        }
    }
}

/// Convert text to a single slug segment.
///
/// Lowercases ASCII letters and turns runs of anything else into one hyphen.
/// Apostrophes are dropped so contractions stay one word.
///
/// ```
/// use notepress::publish::slug::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("Don't Panic"), "dont-panic");
/// assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
/// ```
pub fn slugify(text: &str) -> String {
    text.chars()
        .filter(|&c| c != '\'' && c != '\u{2019}')
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Slug for a note that has never been published.
pub fn compute_slug(note: &Note, options: &SlugOptions) -> Slug {
    let mut segments = Vec::new();
    if options.date_prefix {
        segments.push(format!("{:04}", note.created.year()));
        segments.push(format!("{:02}", note.created.month()));
    }
    if options.include_folders {
        segments.extend(
            note.folder_path
                .iter()
                .map(|folder| slugify(folder))
                .filter(|s| !s.is_empty()),
        );
    }

    let mut leaf = slugify(&note.title);
    if leaf.is_empty() {
        leaf = slugify(note.id.as_str());
    }
    if leaf.is_empty() {
        leaf = FALLBACK.to_string();
    }
    if segments.is_empty() && RESERVED.contains(&leaf.as_str()) {
        leaf.push_str(RESERVED_SUFFIX);
    }
    segments.push(leaf);

    Slug(segments.join("/"))
}
