//! Site settings and URL formatting.

use super::output::PAGE_EXTENSION;

/// Turns slugs into links.
pub trait UrlFormatter: Send + Sync {
    /// Site-relative path of a note page.
    fn path(&self, slug: &str) -> String;

    /// Absolute URL of a note page.
    fn absolute(&self, slug: &str) -> String;
}

/// Site-wide values shown in pages and the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub title: String,
    /// Base URL without a trailing slash.
    pub url: String,
    pub description: String,
}

impl Site {
    pub fn new(title: impl Into<String>, url: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.trim_end_matches('/').to_string(),
            description: description.into(),
        }
    }
}

impl Default for Site {
    fn default() -> Self {
        Site::new("My Blog", "https://example.com", "Notes from the field")
    }
}

impl UrlFormatter for Site {
    fn path(&self, slug: &str) -> String {
        format!("/{slug}.{PAGE_EXTENSION}")
    }

    fn absolute(&self, slug: &str) -> String {
        format!("{}{}", self.url, self.path(slug))
    }
}
