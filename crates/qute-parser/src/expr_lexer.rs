//! Lexer for Qute expressions.
//!
//! Classifies the body of an expression (`{item.name}`, `{inject:bean.find(id)}`,
//! `{name or 'N/A'}`) and of section parameters into object, namespace,
//! property and method parts. It runs over a bounded byte range of the
//! template source, so every span it reports is a document offset and the
//! template scanner and this lexer share nothing but those offsets.
//!
//! # Examples
//!
//! ```
//! use qute_lexer::Span;
//! use qute_parser::expr_lexer::{ExprLexer, TokenKind};
//!
//! let source = "{item.name}";
//! let tokens = ExprLexer::tokenize(source, Span::new(1, 10), false);
//! assert_eq!(tokens[0].kind, TokenKind::ObjectPart);
//! assert_eq!(tokens[1].kind, TokenKind::Dot);
//! assert_eq!(tokens[2].kind, TokenKind::PropertyPart);
//! ```

use qute_lexer::{CharStream, Span};
use serde::Serialize;

/// Expression token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Whitespace,

    // 'text' / "text"
    StartString,
    String,
    EndString,

    // Parts
    ObjectPart,
    PropertyPart,
    MethodPart,
    NamespacePart,

    // Punctuation
    Dot,
    ColonSpace,
    OpenBracket,
    CloseBracket,
    Comma,

    // `value or default`
    InfixMethodPart,
    InfixParameter,

    Unknown,

    // End of input
    Eos,
}

/// Expression lexer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    /// Start of the expression: the first identifier is the object part.
    WithinExpression,
    /// After a part: dots, brackets, infix groups.
    WithinParts,
    /// After `ns`: expecting `:` then the namespaced member.
    AfterNamespace,
    /// Inside a method argument list.
    WithinMethod,
    WithinString,
}

/// Where a string literal hands control back to once its closing quote is
/// read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringReturn {
    Parts,
    Method,
}

/// A token produced by the expression lexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Qute expression lexer.
///
/// A flat automaton like the template scanner: one state, one dispatch per
/// token, explicit counters instead of recursion. Method-call nesting is a
/// depth counter (`bracket`), the string return point is a `StringReturn`
/// field, and infix groups are classified by the parity of `infix_parts`.
pub struct ExprLexer<'a> {
    stream: CharStream<'a>,
    state: ScannerState,
    infix: bool,
    bracket: usize,
    infix_parts: usize,
    group_pending: bool,
    expect_member: bool,
    quote: char,
    string_return: StringReturn,
}

impl<'a> ExprLexer<'a> {
    /// Create a lexer over `source[span.start..span.end]`. `infix` enables
    /// `a or b` notation at the top level of the expression.
    pub fn new(source: &'a str, span: Span, infix: bool) -> Self {
        Self {
            stream: CharStream::with_range(source, span.start, span.end),
            state: ScannerState::WithinExpression,
            infix,
            bracket: 0,
            infix_parts: 0,
            group_pending: false,
            expect_member: false,
            quote: '"',
            string_return: StringReturn::Parts,
        }
    }

    /// Tokenize the whole range. The last token is always `Eos`.
    pub fn tokenize(source: &str, span: Span, infix: bool) -> Vec<Token> {
        let mut lexer = ExprLexer::new(source, span, infix);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eos = token.kind == TokenKind::Eos;
            tokens.push(token);
            if is_eos {
                break;
            }
        }
        tokens
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn is_infix(&self) -> bool {
        self.infix
    }

    /// Read the next token.
    pub fn next_token(&mut self) -> Token {
        let offset = self.stream.pos();
        if self.stream.eos() {
            if self.bracket > 0 {
                self.bracket = 0;
                return self.error(offset, "Missing ')'");
            }
            return self.finish(offset, TokenKind::Eos);
        }

        match self.state {
            ScannerState::WithinExpression => {
                if self.stream.skip_whitespace() {
                    return self.finish(offset, TokenKind::Whitespace);
                }
                match self.stream.peek_char() {
                    '"' | '\'' => self.start_string(offset, StringReturn::Parts),
                    c if is_part_start(c) => self.scan_leading_part(offset),
                    '!' => {
                        // negation prefix
                        self.stream.advance(1);
                        self.finish(offset, TokenKind::Unknown)
                    }
                    c => self.unexpected_char(offset, c),
                }
            }

            ScannerState::AfterNamespace => {
                if self.stream.advance_if_char(':') {
                    self.expect_member = true;
                    return self.finish(offset, TokenKind::ColonSpace);
                }
                if self.expect_member && is_part_start(self.stream.peek_char()) {
                    return self.scan_member(offset);
                }
                // `ns:` followed by something else, read it as parts
                self.state = ScannerState::WithinParts;
                self.scan_within_parts(offset)
            }

            ScannerState::WithinParts => self.scan_within_parts(offset),

            ScannerState::WithinMethod => {
                if self.stream.skip_whitespace() {
                    return self.finish(offset, TokenKind::Whitespace);
                }
                match self.stream.peek_char() {
                    '(' => {
                        self.stream.advance(1);
                        self.bracket += 1;
                        self.finish(offset, TokenKind::OpenBracket)
                    }
                    ')' => self.close_bracket(offset),
                    ',' if self.bracket > 0 => {
                        self.stream.advance(1);
                        self.finish(offset, TokenKind::Comma)
                    }
                    '"' | '\'' => self.start_string(offset, StringReturn::Method),
                    c if is_part_start(c) => self.scan_leading_part(offset),
                    '!' => {
                        self.stream.advance(1);
                        self.finish(offset, TokenKind::Unknown)
                    }
                    c => self.unexpected_char(offset, c),
                }
            }

            ScannerState::WithinString => {
                let found = self.stream.advance_until_char(&[self.quote]);
                if self.stream.pos() > offset {
                    if found {
                        return self.finish(offset, TokenKind::String);
                    }
                    return self.finish_with_error(
                        offset,
                        TokenKind::String,
                        "Unterminated string",
                    );
                }
                // found is true here: the range is not exhausted
                self.stream.advance(1);
                self.state = match self.string_return {
                    StringReturn::Parts => ScannerState::WithinParts,
                    StringReturn::Method => ScannerState::WithinMethod,
                };
                self.finish(offset, TokenKind::EndString)
            }
        }
    }

    fn scan_within_parts(&mut self, offset: usize) -> Token {
        if self.stream.skip_whitespace() {
            if self.bracket == 0 {
                self.group_pending = true;
            }
            return self.finish(offset, TokenKind::Whitespace);
        }

        if self.group_pending {
            self.group_pending = false;
            return self.scan_infix_group(offset);
        }

        match self.stream.peek_char() {
            '.' => {
                self.stream.advance(1);
                if is_part_start(self.stream.peek_char()) {
                    self.expect_member = true;
                    self.finish(offset, TokenKind::Dot)
                } else {
                    self.error(offset, "Unexpected '.' token")
                }
            }
            c if is_part_start(c) => {
                if self.expect_member {
                    self.scan_member(offset)
                } else {
                    self.stream.advance_while_char(is_part_char);
                    self.error(offset, "Unexpected token")
                }
            }
            '[' => {
                let closed = self.scan_bracket_key();
                self.expect_member = false;
                if closed {
                    self.finish(offset, TokenKind::PropertyPart)
                } else {
                    self.finish_with_error(offset, TokenKind::PropertyPart, "Missing ']'")
                }
            }
            ')' => self.close_bracket(offset),
            ',' if self.bracket > 0 => {
                self.stream.advance(1);
                self.state = ScannerState::WithinMethod;
                self.finish(offset, TokenKind::Comma)
            }
            ':' => {
                self.stream.advance(1);
                self.error(offset, "Unexpected ':' token")
            }
            c => self.unexpected_char(offset, c),
        }
    }

    /// A whitespace-separated group after the first one. In infix notation
    /// odd groups are method names (`or`, `?:`) and even groups their
    /// parameter; without infix notation a second group is an error.
    fn scan_infix_group(&mut self, offset: usize) -> Token {
        if !self.infix {
            self.skip_group();
            return self.error(offset, "Unexpected token");
        }
        self.infix_parts += 1;
        if self.infix_parts % 2 == 1 {
            self.skip_group();
            return self.finish(offset, TokenKind::InfixMethodPart);
        }
        match self.stream.peek_char() {
            '"' | '\'' => self.start_string(offset, StringReturn::Parts),
            _ => {
                self.skip_group();
                self.finish(offset, TokenKind::InfixParameter)
            }
        }
    }

    /// Object part at the start of the expression or of a method argument,
    /// or a namespace when directly followed by `:`.
    fn scan_leading_part(&mut self, offset: usize) -> Token {
        self.stream.advance_while_char(is_part_char);
        match self.stream.peek_char() {
            ':' => {
                self.state = ScannerState::AfterNamespace;
                self.expect_member = false;
                self.finish(offset, TokenKind::NamespacePart)
            }
            '(' => {
                self.state = ScannerState::WithinMethod;
                self.finish(offset, TokenKind::MethodPart)
            }
            _ => {
                self.state = ScannerState::WithinParts;
                self.expect_member = false;
                self.finish(offset, TokenKind::ObjectPart)
            }
        }
    }

    /// Property or method after a `.` or a namespace `:`.
    fn scan_member(&mut self, offset: usize) -> Token {
        self.stream.advance_while_char(is_part_char);
        self.expect_member = false;
        if self.stream.peek_char() == '(' {
            self.state = ScannerState::WithinMethod;
            self.finish(offset, TokenKind::MethodPart)
        } else {
            self.state = ScannerState::WithinParts;
            self.finish(offset, TokenKind::PropertyPart)
        }
    }

    fn close_bracket(&mut self, offset: usize) -> Token {
        self.stream.advance(1);
        if self.bracket == 0 {
            return self.error(offset, "Unexpected ')' token");
        }
        self.bracket -= 1;
        self.state = ScannerState::WithinParts;
        self.finish(offset, TokenKind::CloseBracket)
    }

    fn start_string(&mut self, offset: usize, string_return: StringReturn) -> Token {
        self.quote = self.stream.peek_char();
        self.stream.advance(1);
        self.string_return = string_return;
        self.state = ScannerState::WithinString;
        if self.stream.eos() {
            return self.finish_with_error(offset, TokenKind::StartString, "Unterminated string");
        }
        self.finish(offset, TokenKind::StartString)
    }

    /// `[key]` including both brackets. Quotes inside are kept whole.
    fn scan_bracket_key(&mut self) -> bool {
        self.stream.advance(1);
        loop {
            if !self.stream.advance_until_char(&[']', '"', '\'']) {
                return false;
            }
            if self.stream.advance_if_char(']') {
                return true;
            }
            self.stream.skip_quoted();
        }
    }

    /// Run of non-whitespace characters, with quoted substrings kept whole.
    fn skip_group(&mut self) {
        loop {
            match self.stream.peek_char() {
                _ if self.stream.eos() => return,
                c if c.is_whitespace() => return,
                '"' | '\'' => {
                    self.stream.skip_quoted();
                }
                _ => self.stream.advance(1),
            }
        }
    }

    fn unexpected_char(&mut self, offset: usize, c: char) -> Token {
        self.stream.advance(1);
        self.error(offset, &format!("Unexpected character '{c}'"))
    }

    // --- Helpers ---

    fn finish(&self, offset: usize, kind: TokenKind) -> Token {
        Token {
            kind,
            span: Span::new(offset, self.stream.pos()),
            error: None,
        }
    }

    fn finish_with_error(&self, offset: usize, kind: TokenKind, message: &str) -> Token {
        Token {
            kind,
            span: Span::new(offset, self.stream.pos()),
            error: Some(message.to_string()),
        }
    }

    fn error(&self, offset: usize, message: &str) -> Token {
        self.finish_with_error(offset, TokenKind::Unknown, message)
    }
}

pub fn is_part_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub fn is_part_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}
