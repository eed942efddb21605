//! Link resolution.

use std::collections::BTreeMap;

/// Maps internal link targets to hrefs.
///
/// Returning `None` means the target is unknown; the renderer then emits the
/// link text without an anchor.
pub trait LinkResolver {
    /// Resolve a note identifier (as found in an `applenotes:note/` URL).
    fn resolve_note(&self, id: &str) -> Option<String>;

    /// Resolve a note title (as written in `[[Title]]`).
    fn resolve_title(&self, title: &str) -> Option<String>;
}

/// Resolver that knows no notes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLinks;

impl LinkResolver for NoLinks {
    fn resolve_note(&self, _id: &str) -> Option<String> {
        None
    }

    fn resolve_title(&self, _title: &str) -> Option<String> {
        None
    }
}

/// Lookup tables from identifier and title to href.
///
/// Identifiers match case-insensitively. Titles match exactly, then
/// case-insensitively; when several notes share a title the first one
/// inserted wins.
#[derive(Debug, Clone, Default)]
pub struct StaticLinks {
    by_id: BTreeMap<String, String>,
    by_title: BTreeMap<String, String>,
    by_folded_title: BTreeMap<String, String>,
}

impl StaticLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, title: &str, href: impl Into<String>) {
        let href = href.into();
        self.by_id.insert(id.to_lowercase(), href.clone());
        let title = title.trim();
        if !title.is_empty() {
            self.by_title
                .entry(title.to_string())
                .or_insert_with(|| href.clone());
            self.by_folded_title.entry(title.to_lowercase()).or_insert(href);
        }
    }

    pub fn with(mut self, id: &str, title: &str, href: impl Into<String>) -> Self {
        self.insert(id, title, href);
        self
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl LinkResolver for StaticLinks {
    fn resolve_note(&self, id: &str) -> Option<String> {
        self.by_id.get(&id.to_lowercase()).cloned()
    }

    fn resolve_title(&self, title: &str) -> Option<String> {
        let title = title.trim();
        self.by_title
            .get(title)
            .or_else(|| self.by_folded_title.get(&title.to_lowercase()))
            .cloned()
    }
}

/// URL schemes that must never become an `href`.
const UNSAFE_SCHEMES: [&str; 3] = ["javascript:", "data:", "vbscript:"];

/// Whether an external URL may be emitted as an anchor.
pub fn is_safe_url(url: &str) -> bool {
    let trimmed: String = url
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    !trimmed.is_empty() && !UNSAFE_SCHEMES.iter().any(|s| trimmed.starts_with(s))
}
