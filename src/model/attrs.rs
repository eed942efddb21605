//! Formatting attributes carried by style runs.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// A single formatting attribute.
///
/// Paragraph attributes (headings, list items, block quotes, code blocks)
/// describe a whole line; inline attributes describe exactly the range of
/// their run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Attr {
    Bold = 0,
    Italic = 1,
    Underline = 2,
    Strikethrough = 3,
    Monospace = 4,
    Superscript = 5,
    Heading1 = 6,
    Heading2 = 7,
    BulletListItem = 8,
    NumberedListItem = 9,
    BlockQuote = 10,
    /// Monospaced paragraph style: lines kept verbatim in one `<pre>` block.
    CodeBlock = 11,
}

impl Attr {
    pub const ALL: [Attr; 12] = [
        Attr::Bold,
        Attr::Italic,
        Attr::Underline,
        Attr::Strikethrough,
        Attr::Monospace,
        Attr::Superscript,
        Attr::Heading1,
        Attr::Heading2,
        Attr::BulletListItem,
        Attr::NumberedListItem,
        Attr::BlockQuote,
        Attr::CodeBlock,
    ];

    #[inline]
    const fn bit(self) -> u16 {
        1 << self as u8
    }

    /// Whether this attribute applies to a whole line rather than a range.
    pub fn is_paragraph(self) -> bool {
        AttrSet::PARAGRAPH.contains(self)
    }

    pub fn name(self) -> &'static str {
        match self {
            Attr::Bold => "bold",
            Attr::Italic => "italic",
            Attr::Underline => "underline",
            Attr::Strikethrough => "strikethrough",
            Attr::Monospace => "monospace",
            Attr::Superscript => "superscript",
            Attr::Heading1 => "heading-1",
            Attr::Heading2 => "heading-2",
            Attr::BulletListItem => "bullet-list-item",
            Attr::NumberedListItem => "numbered-list-item",
            Attr::BlockQuote => "block-quote",
            Attr::CodeBlock => "code-block",
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A compact set of [`Attr`]s.
///
/// Iteration order is the declaration order of [`Attr`], independent of the
/// order attributes were inserted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct AttrSet(u16);

impl AttrSet {
    pub const EMPTY: AttrSet = AttrSet(0);

    pub const PARAGRAPH: AttrSet = AttrSet(
        Attr::Heading1.bit()
            | Attr::Heading2.bit()
            | Attr::BulletListItem.bit()
            | Attr::NumberedListItem.bit()
            | Attr::BlockQuote.bit()
            | Attr::CodeBlock.bit(),
    );

    pub const INLINE: AttrSet = AttrSet(
        Attr::Bold.bit()
            | Attr::Italic.bit()
            | Attr::Underline.bit()
            | Attr::Strikethrough.bit()
            | Attr::Monospace.bit()
            | Attr::Superscript.bit(),
    );

    #[inline]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    #[inline]
    pub fn contains(self, attr: Attr) -> bool {
        self.0 & attr.bit() != 0
    }

    #[inline]
    pub fn insert(&mut self, attr: Attr) {
        self.0 |= attr.bit();
    }

    #[inline]
    pub fn remove(&mut self, attr: Attr) {
        self.0 &= !attr.bit();
    }

    #[inline]
    pub fn with(mut self, attr: Attr) -> Self {
        self.insert(attr);
        self
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn union(self, other: AttrSet) -> AttrSet {
        AttrSet(self.0 | other.0)
    }

    #[inline]
    pub fn intersection(self, other: AttrSet) -> AttrSet {
        AttrSet(self.0 & other.0)
    }

    /// The inline subset of this set.
    #[inline]
    pub fn inline(self) -> AttrSet {
        self.intersection(Self::INLINE)
    }

    /// The paragraph-level subset of this set.
    #[inline]
    pub fn paragraph(self) -> AttrSet {
        self.intersection(Self::PARAGRAPH)
    }

    pub fn iter(self) -> impl Iterator<Item = Attr> {
        Attr::ALL.into_iter().filter(move |a| self.contains(*a))
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl From<Attr> for AttrSet {
    fn from(attr: Attr) -> Self {
        AttrSet(attr.bit())
    }
}

impl FromIterator<Attr> for AttrSet {
    fn from_iter<I: IntoIterator<Item = Attr>>(iter: I) -> Self {
        let mut set = AttrSet::EMPTY;
        for attr in iter {
            set.insert(attr);
        }
        set
    }
}

impl BitOr for AttrSet {
    type Output = AttrSet;

    fn bitor(self, rhs: AttrSet) -> AttrSet {
        self.union(rhs)
    }
}

impl BitOr<Attr> for AttrSet {
    type Output = AttrSet;

    fn bitor(self, rhs: Attr) -> AttrSet {
        self.with(rhs)
    }
}

impl BitOrAssign<Attr> for AttrSet {
    fn bitor_assign(&mut self, rhs: Attr) {
        self.insert(rhs);
    }
}

impl fmt::Debug for AttrSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// Serialized as a list of attribute names, e.g. `["bold", "heading-1"]`.
impl Serialize for AttrSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for AttrSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let attrs = Vec::<Attr>::deserialize(deserializer)?;
        Ok(attrs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_and_inline_partition() {
        for attr in Attr::ALL {
            let set = AttrSet::from(attr);
            assert_ne!(set.inline().is_empty(), set.paragraph().is_empty(), "{attr}");
        }
    }

    #[test]
    fn test_iteration_order_is_canonical() {
        let a = AttrSet::new().with(Attr::Superscript).with(Attr::Bold);
        let b = AttrSet::new().with(Attr::Bold).with(Attr::Superscript);
        assert_eq!(a, b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![Attr::Bold, Attr::Superscript]);
    }

    #[test]
    fn test_serde_uses_names() {
        let set = AttrSet::from(Attr::Heading1) | Attr::Italic;
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["italic","heading-1"]"#);
        let back: AttrSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
