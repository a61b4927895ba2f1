//! Offset to line/column conversion.
//!
//! Editors address text by zero-based line and character, where a character
//! is a UTF-16 code unit as in the language server protocol; the scanners and
//! the tree work with UTF-8 byte offsets. `LineIndex` records where each line
//! starts so both directions are a binary search plus a short walk.

use serde::Serialize;

/// Zero-based line and character position. `character` counts UTF-16 code
/// units, so a character outside the BMP (an emoji) is two wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-based for humans
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("offset {offset} is outside the document (length {len})")]
    OffsetOutOfRange { offset: usize, len: usize },
    #[error("offset {offset} is not on a character boundary")]
    NotCharBoundary { offset: usize },
    #[error("line {line} is outside the document ({lines} lines)")]
    LineOutOfRange { line: usize, lines: usize },
}

/// Start offsets of every line of a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        let bytes = source.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => line_starts.push(i + 1),
                b'\r' => {
                    // \r\n counts once
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    line_starts.push(i + 1);
                }
                _ => {}
            }
            i += 1;
        }
        Self {
            line_starts,
            len: source.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn position_at(&self, source: &str, offset: usize) -> Result<Position, PositionError> {
        if offset > self.len {
            return Err(PositionError::OffsetOutOfRange {
                offset,
                len: self.len,
            });
        }
        if !source.is_char_boundary(offset) {
            return Err(PositionError::NotCharBoundary { offset });
        }
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let character = source[self.line_starts[line]..offset]
            .chars()
            .map(char::len_utf16)
            .sum();
        Ok(Position { line, character })
    }

    /// Offset of `position`. A character past the end of its line clamps to
    /// the line end, as editors expect; one inside a surrogate pair resolves
    /// to the start of that character.
    pub fn offset_at(&self, source: &str, position: Position) -> Result<usize, PositionError> {
        let Some(&line_start) = self.line_starts.get(position.line) else {
            return Err(PositionError::LineOutOfRange {
                line: position.line,
                lines: self.line_starts.len(),
            });
        };
        let line_end = self
            .line_starts
            .get(position.line + 1)
            .copied()
            .unwrap_or(self.len);
        let line_text = &source[line_start..line_end];
        let content = line_text.trim_end_matches(['\n', '\r']);
        let mut units = 0;
        let mut offset = content.len();
        for (i, c) in content.char_indices() {
            units += c.len_utf16();
            if units > position.character {
                offset = i;
                break;
            }
        }
        Ok(line_start + offset)
    }
}
