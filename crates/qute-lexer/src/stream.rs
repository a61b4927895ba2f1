//! Character cursor shared by the template and expression scanners.
//!
//! A `CharStream` walks a bounded `[start, end)` byte range of the source.
//! Offsets handed out are byte offsets into the full source, so a scanner
//! working on a sub-range reports positions that are valid for the whole
//! document.

/// Returned by [`CharStream::peek_char`] when the stream is exhausted.
pub const EOS_CHAR: char = '\0';

/// Cursor over a bounded range of a source string.
#[derive(Debug, Clone)]
pub struct CharStream<'a> {
    source: &'a str,
    start: usize,
    pos: usize,
    end: usize,
}

impl<'a> CharStream<'a> {
    /// Create a stream over the whole source.
    pub fn new(source: &'a str) -> Self {
        Self::with_range(source, 0, source.len())
    }

    /// Create a stream over `source[start..end]`.
    ///
    /// Both bounds are clamped to the source length; `start` is clamped to
    /// `end`.
    pub fn with_range(source: &'a str, start: usize, end: usize) -> Self {
        let end = end.min(source.len());
        let start = start.min(end);
        Self {
            source,
            start,
            pos: start,
            end,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn eos(&self) -> bool {
        self.pos >= self.end
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..self.end]
    }

    /// Next character, or [`EOS_CHAR`] at the end of the range.
    pub fn peek_char(&self) -> char {
        self.rest().chars().next().unwrap_or(EOS_CHAR)
    }

    /// Character `n` positions ahead (`0` is the next one).
    pub fn peek_char_at(&self, n: usize) -> char {
        self.rest().chars().nth(n).unwrap_or(EOS_CHAR)
    }

    /// Advance by `n` characters, stopping at the end of the range.
    pub fn advance(&mut self, n: usize) {
        for _ in 0..n {
            match self.rest().chars().next() {
                Some(c) => self.pos += c.len_utf8(),
                None => break,
            }
        }
    }

    pub fn advance_if_char(&mut self, ch: char) -> bool {
        if !self.eos() && self.peek_char() == ch {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consume `chars` only if the whole sequence matches.
    pub fn advance_if_chars(&mut self, chars: &[char]) -> bool {
        let mut it = self.rest().chars();
        let mut len = 0;
        for expected in chars {
            match it.next() {
                Some(c) if c == *expected => len += c.len_utf8(),
                _ => return false,
            }
        }
        self.pos += len;
        true
    }

    /// Advance until one of `stops` is next. Returns `false` when the end of
    /// the range was reached instead.
    pub fn advance_until_char(&mut self, stops: &[char]) -> bool {
        while let Some(c) = self.rest().chars().next() {
            if stops.contains(&c) {
                return true;
            }
            self.pos += c.len_utf8();
        }
        false
    }

    /// Advance until the sequence `seq` starts at the cursor. Returns `false`
    /// when the end of the range was reached instead.
    pub fn advance_until_chars(&mut self, seq: &[char]) -> bool {
        let Some(&first) = seq.first() else {
            return true;
        };
        while self.advance_until_char(&[first]) {
            if self.lookahead_matches(seq) {
                return true;
            }
            self.advance(1);
        }
        false
    }

    fn lookahead_matches(&self, seq: &[char]) -> bool {
        let mut it = self.rest().chars();
        seq.iter().all(|expected| it.next() == Some(*expected))
    }

    /// Advance while `predicate` holds; returns the number of characters
    /// consumed.
    pub fn advance_while_char(&mut self, predicate: impl Fn(char) -> bool) -> usize {
        let mut count = 0;
        while let Some(c) = self.rest().chars().next() {
            if !predicate(c) {
                break;
            }
            self.pos += c.len_utf8();
            count += 1;
        }
        count
    }

    /// Skip whitespace; `true` if anything was consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        self.advance_while_char(char::is_whitespace) > 0
    }

    /// Skip a quoted literal whose opening quote is the next character.
    /// Stops after the closing quote, or at the end of the range. Returns
    /// whether the closing quote was found.
    pub fn skip_quoted(&mut self) -> bool {
        let quote = self.peek_char();
        self.advance(1);
        if self.advance_until_char(&[quote]) {
            self.advance(1);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_peek_and_advance() {
        let mut s = CharStream::new("ab");
        assert_eq!(s.peek_char(), 'a');
        assert_eq!(s.peek_char_at(1), 'b');
        s.advance(1);
        assert_eq!(s.pos(), 1);
        s.advance(5);
        assert!(s.eos());
        assert_eq!(s.peek_char(), EOS_CHAR);
    }

    #[test]
    fn test_advance_if_chars_is_atomic() {
        let mut s = CharStream::new("!x");
        assert!(!s.advance_if_chars(&['!', '}']));
        assert_eq!(s.pos(), 0);
        assert!(s.advance_if_chars(&['!', 'x']));
        assert_eq!(s.pos(), 2);
    }

    #[test]
    fn test_advance_until_char() {
        let mut s = CharStream::new("abc}d");
        assert!(s.advance_until_char(&['}', '{']));
        assert_eq!(s.pos(), 3);

        let mut s = CharStream::new("abc");
        assert!(!s.advance_until_char(&['}']));
        assert_eq!(s.pos(), 3);
    }

    #[test]
    fn test_advance_until_chars_sequence() {
        let mut s = CharStream::new("a ! b !}");
        assert!(s.advance_until_chars(&['!', '}']));
        assert_eq!(s.pos(), 6);

        let mut s = CharStream::new("a ! b");
        assert!(!s.advance_until_chars(&['!', '}']));
        assert!(s.eos());
    }

    #[test]
    fn test_range_is_respected() {
        let src = "{items.size}";
        let mut s = CharStream::with_range(src, 1, 11);
        assert_eq!(s.peek_char(), 'i');
        assert!(!s.advance_until_char(&['}']));
        assert_eq!(s.pos(), 11);
        assert!(s.eos());
    }

    #[test]
    fn test_multibyte_offsets() {
        let mut s = CharStream::new("é{");
        s.advance(1);
        assert_eq!(s.pos(), 2);
        assert!(s.advance_if_char('{'));
        assert!(s.eos());
    }

    #[test]
    fn test_skip_whitespace_and_while() {
        let mut s = CharStream::new("  \tfoo1 ");
        assert!(s.skip_whitespace());
        assert_eq!(s.advance_while_char(|c| c.is_alphanumeric()), 4);
        assert!(!s.advance_if_char('x'));
    }

    #[test]
    fn test_skip_quoted() {
        let mut s = CharStream::new("'a}b' c");
        assert!(s.skip_quoted());
        assert_eq!(s.pos(), 5);

        let mut s = CharStream::new("\"open");
        assert!(!s.skip_quoted());
        assert!(s.eos());
    }

    #[test]
    fn test_range_is_clamped() {
        let s = CharStream::with_range("abcdef", 2, 99);
        assert_eq!((s.start(), s.pos(), s.end()), (2, 2, 6));
        let s = CharStream::with_range("abcdef", 9, 4);
        assert_eq!((s.start(), s.end()), (4, 4));
        assert!(s.eos());
    }
}
