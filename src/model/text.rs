//! UTF-16 offset mapping.
//!
//! Runs count positions in UTF-16 code units while Rust strings are UTF-8.
//! [`Utf16Index`] precomputes the byte offset of every code unit so that
//! run boundaries can be turned into string slices in O(1).

use std::ops::Range;

#[derive(Debug, Clone)]
pub struct Utf16Index {
    /// `byte_at[u]` is the byte offset of UTF-16 unit `u`; one extra entry
    /// holds the text length. A unit in the middle of a surrogate pair maps
    /// to the start of its character.
    byte_at: Vec<usize>,
}

impl Utf16Index {
    pub fn new(text: &str) -> Self {
        let mut byte_at = Vec::with_capacity(text.len() + 1);
        for (offset, ch) in text.char_indices() {
            for _ in 0..ch.len_utf16() {
                byte_at.push(offset);
            }
        }
        byte_at.push(text.len());
        Self { byte_at }
    }

    /// Text length in UTF-16 code units.
    #[inline]
    pub fn len(&self) -> usize {
        self.byte_at.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte offset of a unit position, clamped to the end of the text.
    #[inline]
    pub fn byte_offset(&self, unit: usize) -> usize {
        self.byte_at[unit.min(self.len())]
    }

    /// Slice `text` by a unit range. `text` must be the string this index was built from.
    pub fn slice<'t>(&self, text: &'t str, range: Range<usize>) -> &'t str {
        let start = self.byte_offset(range.start);
        let end = self.byte_offset(range.end).max(start);
        &text[start..end]
    }

    /// Unit position of the first code unit at or after byte offset `byte`.
    pub fn unit_at_byte(&self, byte: usize) -> usize {
        self.byte_at.partition_point(|&b| b < byte)
    }

    /// Unit ranges of each line, excluding the `\n` terminator.
    ///
    /// A text ending in `\n` yields a trailing empty line; an empty text yields one empty line.
    pub fn lines(&self, text: &str) -> Vec<Range<usize>> {
        let mut lines = Vec::new();
        let mut start = 0;
        for nl in memchr::memchr_iter(b'\n', text.as_bytes()) {
            let unit = self.unit_at_byte(nl);
            lines.push(start..unit);
            start = unit + 1;
        }
        lines.push(start..self.len());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_identity() {
        let idx = Utf16Index::new("hello");
        assert_eq!(idx.len(), 5);
        assert_eq!(idx.byte_offset(3), 3);
        assert_eq!(idx.slice("hello", 1..4), "ell");
    }

    #[test]
    fn test_astral_chars_take_two_units() {
        let text = "a😀b";
        let idx = Utf16Index::new(text);
        assert_eq!(idx.len(), 4);
        assert_eq!(idx.slice(text, 1..3), "😀");
        assert_eq!(idx.slice(text, 3..4), "b");
        // Half a surrogate pair snaps back to the character start.
        assert_eq!(idx.slice(text, 2..4), "😀b");
    }

    #[test]
    fn test_multibyte_bmp() {
        let text = "café";
        let idx = Utf16Index::new(text);
        assert_eq!(idx.len(), 4);
        assert_eq!(idx.slice(text, 3..4), "é");
        assert_eq!(idx.unit_at_byte(5), 4);
    }

    #[test]
    fn test_lines() {
        let text = "ab\n\ncd\n";
        let idx = Utf16Index::new(text);
        assert_eq!(idx.lines(text), vec![0..2, 3..3, 4..6, 7..7]);
        assert_eq!(Utf16Index::new("").lines(""), vec![0..0]);
    }

    #[test]
    fn test_clamps_out_of_range() {
        let idx = Utf16Index::new("abc");
        assert_eq!(idx.byte_offset(99), 3);
        assert_eq!(idx.slice("abc", 2..99), "c");
        assert_eq!(idx.slice("abc", 5..1), "");
    }
}
