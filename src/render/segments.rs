//! Run-length encoding of inline styles.
//!
//! Style runs may overlap, nest or abut in any order. Before any markup is
//! emitted, the runs covering a line are flattened into a [`SegmentMap`]: a
//! sequence of disjoint segments that covers the line exactly, each carrying
//! the full set of attributes active over it. Equal neighbours are merged, so
//! the encoding is canonical for a given set of input spans.

use std::cmp::Reverse;
use std::ops::Range;

use thiserror::Error;

use crate::model::{AttrSet, LinkTarget};

/// A footnote reference marker in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FootnoteRef {
    /// 1-based footnote number.
    pub index: usize,
    /// 0 for the first reference to this footnote, 1 for the second, ...
    pub occurrence: usize,
}

/// How the text of a segment is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mark {
    /// Emitted as escaped text with its attributes.
    #[default]
    Text,
    /// Not emitted at all (link syntax such as `[[` and `]]`).
    Hidden,
    /// Replaced by a footnote reference.
    Footnote(FootnoteRef),
}

/// Everything active over one segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InlineStyle {
    /// Inline attributes only.
    pub attrs: AttrSet,
    pub link: Option<LinkTarget>,
    pub mark: Mark,
}

impl InlineStyle {
    pub fn is_plain(&self) -> bool {
        self.attrs.is_empty() && self.link.is_none() && self.mark == Mark::Text
    }
}

/// An input annotation over a unit range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub range: Range<usize>,
    pub attrs: AttrSet,
    pub link: Option<LinkTarget>,
    pub mark: Mark,
}

impl Span {
    pub fn styled(range: Range<usize>, attrs: AttrSet) -> Self {
        Self {
            range,
            attrs: attrs.inline(),
            link: None,
            mark: Mark::Text,
        }
    }

    pub fn link(range: Range<usize>, target: LinkTarget) -> Self {
        Self {
            range,
            attrs: AttrSet::EMPTY,
            link: Some(target),
            mark: Mark::Text,
        }
    }

    pub fn marked(range: Range<usize>, mark: Mark) -> Self {
        Self {
            range,
            attrs: AttrSet::EMPTY,
            link: None,
            mark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub range: Range<usize>,
    pub style: InlineStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoverageError {
    #[error("segments start at {found}, expected {expected}")]
    Gap { expected: usize, found: usize },
    #[error("empty segment at {0}")]
    Empty(usize),
    #[error("segments end at {found}, expected {expected}")]
    Short { expected: usize, found: usize },
}

/// Disjoint styled segments covering a range exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMap {
    range: Range<usize>,
    segments: Vec<Segment>,
}

impl SegmentMap {
    /// A single unstyled segment (or none, for an empty range).
    pub fn plain(range: Range<usize>) -> Self {
        let segments = if range.is_empty() {
            Vec::new()
        } else {
            vec![Segment {
                range: range.clone(),
                style: InlineStyle::default(),
            }]
        };
        Self { range, segments }
    }

    /// Validate that `segments` are non-empty, contiguous and cover `range`.
    pub fn from_segments(range: Range<usize>, segments: Vec<Segment>) -> Result<Self, CoverageError> {
        let mut cursor = range.start;
        for segment in &segments {
            if segment.range.start != cursor {
                return Err(CoverageError::Gap {
                    expected: cursor,
                    found: segment.range.start,
                });
            }
            if segment.range.is_empty() {
                return Err(CoverageError::Empty(segment.range.start));
            }
            cursor = segment.range.end;
        }
        if cursor != range.end.max(range.start) {
            return Err(CoverageError::Short {
                expected: range.end,
                found: cursor,
            });
        }
        Ok(Self { range, segments })
    }

    /// Flatten `spans` over `range`. Spans are clipped to the range.
    ///
    /// The result does not depend on the order of `spans`.
    pub fn build(range: Range<usize>, spans: &[Span]) -> Result<Self, CoverageError> {
        if range.is_empty() {
            return Self::from_segments(range, Vec::new());
        }

        let clipped: Vec<(Range<usize>, &Span)> = spans
            .iter()
            .filter_map(|span| {
                let start = span.range.start.max(range.start);
                let end = span.range.end.min(range.end);
                (start < end).then_some((start..end, span))
            })
            .collect();

        let mut bounds: Vec<usize> = Vec::with_capacity(clipped.len() * 2 + 2);
        bounds.push(range.start);
        bounds.push(range.end);
        for (r, _) in &clipped {
            bounds.push(r.start);
            bounds.push(r.end);
        }
        bounds.sort_unstable();
        bounds.dedup();

        // Sweep the boundaries, keeping the spans that are active.
        let mut by_start: Vec<usize> = (0..clipped.len()).collect();
        by_start.sort_by_key(|&i| clipped[i].0.start);
        let mut next = 0;
        let mut active: Vec<usize> = Vec::new();

        let mut segments: Vec<Segment> = Vec::with_capacity(bounds.len());
        for pair in bounds.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            active.retain(|&i| clipped[i].0.end > lo);
            while next < by_start.len() && clipped[by_start[next]].0.start <= lo {
                active.push(by_start[next]);
                next += 1;
            }

            let style = fold_style(active.iter().map(|&i| (&clipped[i].0, clipped[i].1)));
            match segments.last_mut() {
                Some(last) if last.style == style => last.range.end = hi,
                _ => segments.push(Segment {
                    range: lo..hi,
                    style,
                }),
            }
        }

        Self::from_segments(range, segments)
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Combine the spans active over one segment.
///
/// Attributes union. Of several links the innermost wins: the one starting
/// last, then the shortest, then the smallest target. A hidden mark beats a
/// footnote mark, and either clears attributes and links.
fn fold_style<'a>(active: impl Iterator<Item = (&'a Range<usize>, &'a Span)>) -> InlineStyle {
    let mut attrs = AttrSet::EMPTY;
    let mut link: Option<(&Range<usize>, &LinkTarget)> = None;
    let mut mark = Mark::Text;

    for (range, span) in active {
        attrs = attrs.union(span.attrs.inline());
        if let Some(target) = &span.link {
            let candidate = (range, target);
            link = match link {
                Some(current) if link_key(current) <= link_key(candidate) => Some(current),
                _ => Some(candidate),
            };
        }
        mark = match (mark, span.mark) {
            (Mark::Hidden, _) | (_, Mark::Hidden) => Mark::Hidden,
            (Mark::Footnote(a), Mark::Footnote(b)) => Mark::Footnote(a.min(b)),
            (Mark::Footnote(a), Mark::Text) | (Mark::Text, Mark::Footnote(a)) => Mark::Footnote(a),
            (Mark::Text, Mark::Text) => Mark::Text,
        };
    }

    if mark != Mark::Text {
        return InlineStyle {
            attrs: AttrSet::EMPTY,
            link: None,
            mark,
        };
    }
    InlineStyle {
        attrs,
        link: link.map(|(_, target)| target.clone()),
        mark,
    }
}

fn link_key<'a>((range, target): (&Range<usize>, &'a LinkTarget)) -> (Reverse<usize>, usize, &'a LinkTarget) {
    (Reverse(range.start), range.end, target)
}
