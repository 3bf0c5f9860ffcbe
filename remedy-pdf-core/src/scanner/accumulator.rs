//! Page-text accumulation with per-chunk character ranges.

use crate::geometry::Rect;

/// A chunk of appended text with its character range and source info.
#[derive(Debug, Clone)]
pub struct TextChunk {
    /// First character index of the chunk in the accumulated text
    pub start: usize,
    /// One past the last character index
    pub end: usize,
    /// Union bounds of the chunk's source run, when known
    pub bounds: Option<Rect>,
    /// The marked-content id the chunk came from
    pub mcid: Option<i32>,
}

/// Accumulates page text in content order.
///
/// Joins chunks with a single space when neither side already ends/starts
/// with whitespace, and records each chunk's `(start, end)` character range
/// so callers can cut context windows around a position.
#[derive(Debug, Default)]
pub struct TextAccumulator {
    text: String,
    char_len: usize,
    chunks: Vec<TextChunk>,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return its `(start, end)` character range.
    pub fn push(&mut self, text: &str, bounds: Option<Rect>, mcid: Option<i32>) -> (usize, usize) {
        if text.is_empty() {
            let at = self.char_len;
            return (at, at);
        }
        let needs_space = !self.text.is_empty()
            && !self.text.ends_with(char::is_whitespace)
            && !text.starts_with(char::is_whitespace);
        if needs_space {
            self.text.push(' ');
            self.char_len += 1;
        }
        let start = self.char_len;
        self.text.push_str(text);
        self.char_len += text.chars().count();
        let end = self.char_len;
        self.chunks.push(TextChunk {
            start,
            end,
            bounds,
            mcid,
        });
        (start, end)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    /// Up to `max_chars` characters ending just before `at`.
    pub fn context_before(&self, at: usize, max_chars: usize) -> String {
        let at = at.min(self.char_len);
        let from = at.saturating_sub(max_chars);
        self.slice_chars(from, at)
    }

    /// Up to `max_chars` characters starting at `at`.
    pub fn context_after(&self, at: usize, max_chars: usize) -> String {
        let at = at.min(self.char_len);
        let to = (at + max_chars).min(self.char_len);
        self.slice_chars(at, to)
    }

    fn slice_chars(&self, from: usize, to: usize) -> String {
        self.text
            .chars()
            .skip(from)
            .take(to.saturating_sub(from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_joining() {
        let mut acc = TextAccumulator::new();
        acc.push("Hello", None, None);
        acc.push("world", None, None);
        assert_eq!(acc.text(), "Hello world");
    }

    #[test]
    fn test_no_double_space() {
        let mut acc = TextAccumulator::new();
        acc.push("Hello ", None, None);
        acc.push("world", None, None);
        assert_eq!(acc.text(), "Hello world");
    }

    #[test]
    fn test_chunk_ranges() {
        let mut acc = TextAccumulator::new();
        let (s1, e1) = acc.push("ab", None, Some(0));
        let (s2, e2) = acc.push("cd", None, Some(1));
        assert_eq!((s1, e1), (0, 2));
        // One joining space between the chunks.
        assert_eq!((s2, e2), (3, 5));
        assert_eq!(acc.chunks().len(), 2);
    }

    #[test]
    fn test_context_windows() {
        let mut acc = TextAccumulator::new();
        acc.push("0123456789", None, None);
        assert_eq!(acc.context_before(5, 3), "234");
        assert_eq!(acc.context_after(5, 3), "567");
        assert_eq!(acc.context_before(2, 10), "01");
        assert_eq!(acc.context_after(8, 10), "89");
    }

    #[test]
    fn test_multibyte_ranges_are_char_based() {
        let mut acc = TextAccumulator::new();
        let (_, e) = acc.push("héé", None, None);
        assert_eq!(e, 3);
        assert_eq!(acc.context_before(3, 2), "éé");
    }

    #[test]
    fn test_empty_push_is_position_only() {
        let mut acc = TextAccumulator::new();
        acc.push("abc", None, None);
        let (s, e) = acc.push("", None, None);
        assert_eq!((s, e), (3, 3));
        assert_eq!(acc.chunks().len(), 1);
    }
}
