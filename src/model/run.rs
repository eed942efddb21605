//! Style runs and link targets.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::attrs::{Attr, AttrSet};

/// URL scheme the source uses for links between notes.
pub const NOTE_LINK_SCHEME: &str = "applenotes:note/";

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "kebab-case")]
pub enum LinkTarget {
    /// Another note, by source identifier.
    Note(String),
    /// Another note, by title (`[[Title]]` in the text).
    Title(String),
    /// Anything else, kept verbatim.
    Url(String),
}

impl LinkTarget {
    /// Classify a raw link string from a note body.
    ///
    /// ```
    /// use notepress::model::LinkTarget;
    ///
    /// assert_eq!(
    ///     LinkTarget::parse("applenotes:note/ABC-123?ownerIdentifier=x"),
    ///     LinkTarget::Note("ABC-123".to_string())
    /// );
    /// assert_eq!(
    ///     LinkTarget::parse("https://example.com"),
    ///     LinkTarget::Url("https://example.com".to_string())
    /// );
    /// ```
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix(NOTE_LINK_SCHEME) {
            let path = rest.split(['?', '#']).next().unwrap_or_default();
            let id = path.rsplit('/').next().unwrap_or_default();
            if !id.is_empty() {
                return LinkTarget::Note(id.to_string());
            }
        }
        LinkTarget::Url(raw.to_string())
    }

    pub fn is_internal(&self) -> bool {
        !matches!(self, LinkTarget::Url(_))
    }
}

/// A formatting annotation over `[start, start + length)` of the decoded text.
///
/// Offsets are UTF-16 code units, the unit the source format counts in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleRun {
    pub start: usize,
    pub length: usize,
    pub attrs: AttrSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkTarget>,
}

impl StyleRun {
    pub fn new(start: usize, length: usize) -> Self {
        Self {
            start,
            length,
            attrs: AttrSet::EMPTY,
            link: None,
        }
    }

    pub fn with(mut self, attr: Attr) -> Self {
        self.attrs.insert(attr);
        self
    }

    pub fn with_attrs(mut self, attrs: AttrSet) -> Self {
        self.attrs = self.attrs.union(attrs);
        self
    }

    pub fn with_link(mut self, target: LinkTarget) -> Self {
        self.link = Some(target);
        self
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Clamp the run to a text of `len` units.
    ///
    /// Returns `None` if nothing of the run remains inside the text.
    pub fn clamped(&self, len: usize) -> Option<StyleRun> {
        let start = self.start.min(len);
        let end = self.end().min(len);
        (end > start).then(|| StyleRun {
            start,
            length: end - start,
            attrs: self.attrs,
            link: self.link.clone(),
        })
    }

    /// Whether the run carries anything the inline renderer cares about.
    pub fn has_inline(&self) -> bool {
        !self.attrs.inline().is_empty() || self.link.is_some()
    }

    /// Inline code or a code block.
    pub fn is_code(&self) -> bool {
        self.attrs.contains(Attr::Monospace) || self.attrs.contains(Attr::CodeBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_link_variants() {
        assert_eq!(
            LinkTarget::parse("applenotes:note/5F2A?ownerIdentifier=_abc"),
            LinkTarget::Note("5F2A".into())
        );
        assert_eq!(
            LinkTarget::parse("applenotes:note/account/5F2A"),
            LinkTarget::Note("5F2A".into())
        );
        assert_eq!(
            LinkTarget::parse("applenotes:note/"),
            LinkTarget::Url("applenotes:note/".into())
        );
    }

    #[test]
    fn test_clamp_past_end() {
        let run = StyleRun::new(3, 10).with(Attr::Bold);
        let clamped = run.clamped(5).unwrap();
        assert_eq!(clamped.range(), 3..5);
        assert!(StyleRun::new(7, 2).clamped(5).is_none());
    }

    #[test]
    fn test_end_saturates() {
        let run = StyleRun::new(usize::MAX - 1, 10);
        assert_eq!(run.end(), usize::MAX);
    }
}
