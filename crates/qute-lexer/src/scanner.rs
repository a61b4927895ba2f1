use crate::stream::{CharStream, EOS_CHAR};
use crate::token::{Span, Token, TokenKind};

const TAG_NAME_MUST_FOLLOW: &str = "Tag name must directly follow the open bracket.";

/// Template scanner state. The state alone decides how the next character is
/// read; tokens carry no context of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    WithinContent,
    WithinComment,
    WithinCDATA,
    WithinCDATAOld,
    WithinParameterDeclaration,
    WithinExpression,
    AfterOpeningStartTag,
    WithinTag,
    AfterOpeningEndTag,
    WithinEndTag,
}

/// Qute template scanner.
///
/// Splits a template into content, comments, CDATA blocks, section tags,
/// parameter declarations and expressions. Expression bodies come out as a
/// single `ExpressionContent` token; the expression scanner in
/// `qute-parser` classifies what is inside.
///
/// The scanner is a flat automaton: `scan` dispatches on the current state
/// and returns exactly one token. When a construct is abandoned (a `{`
/// showing up before the closing `}`) the state is reset and the dispatch
/// loop runs again on the same character, so scanning never recurses and
/// always makes progress.
pub struct Scanner<'a> {
    stream: CharStream<'a>,
    state: ScannerState,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner over the whole source.
    pub fn new(source: &'a str) -> Self {
        Self::with_state(source, ScannerState::WithinContent)
    }

    /// Create a scanner starting in a specific state.
    pub fn with_state(source: &'a str, state: ScannerState) -> Self {
        Self {
            stream: CharStream::new(source),
            state,
        }
    }

    /// Tokenize the entire source. The last token is always `Eos`.
    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.scan();
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

    pub fn source(&self) -> &'a str {
        self.stream.source()
    }

    /// Read the next token. Once the input is exhausted every call returns
    /// an empty `Eos` token.
    pub fn scan(&mut self) -> Token {
        loop {
            let offset = self.stream.pos();
            if self.stream.eos() {
                return self.finish(offset, TokenKind::Eos);
            }

            match self.state {
                ScannerState::WithinContent => {
                    if let Some(kind) = self.open_construct() {
                        return self.finish(offset, kind);
                    }
                    self.scan_content();
                    return self.finish(offset, TokenKind::Content);
                }

                ScannerState::WithinComment => {
                    return self.scan_verbatim(
                        offset,
                        ['!', '}'],
                        TokenKind::Comment,
                        TokenKind::EndComment,
                    );
                }
                ScannerState::WithinCDATA => {
                    return self.scan_verbatim(
                        offset,
                        ['|', '}'],
                        TokenKind::CDATAContent,
                        TokenKind::CDATATagClose,
                    );
                }
                ScannerState::WithinCDATAOld => {
                    return self.scan_verbatim(
                        offset,
                        [']', '}'],
                        TokenKind::CDATAOldContent,
                        TokenKind::CDATAOldTagClose,
                    );
                }

                ScannerState::WithinParameterDeclaration => {
                    if self.stream.skip_whitespace() {
                        return self.finish(offset, TokenKind::Whitespace);
                    }
                    match self.stream.peek_char() {
                        '}' => {
                            self.stream.advance(1);
                            self.state = ScannerState::WithinContent;
                            return self.finish(offset, TokenKind::EndParameterDeclaration);
                        }
                        '{' => {
                            self.state = ScannerState::WithinContent;
                            continue;
                        }
                        _ => {
                            self.scan_declaration_word();
                            return self.finish(offset, TokenKind::ParameterDeclaration);
                        }
                    }
                }

                ScannerState::WithinExpression => {
                    if self.stream.advance_if_char('}') {
                        self.state = ScannerState::WithinContent;
                        return self.finish(offset, TokenKind::EndExpression);
                    }
                    self.scan_expression_body();
                    if self.stream.pos() > offset {
                        return self.finish(offset, TokenKind::ExpressionContent);
                    }
                    // `{` before the closing `}`
                    self.state = ScannerState::WithinContent;
                    continue;
                }

                ScannerState::AfterOpeningStartTag | ScannerState::AfterOpeningEndTag => {
                    let (name_kind, next) = if self.state == ScannerState::AfterOpeningStartTag {
                        (TokenKind::StartTag, ScannerState::WithinTag)
                    } else {
                        (TokenKind::EndTag, ScannerState::WithinEndTag)
                    };
                    match self.stream.peek_char() {
                        c if is_tag_name_start(c) => {
                            self.stream.advance_while_char(is_tag_name_char);
                            self.state = next;
                            return self.finish(offset, name_kind);
                        }
                        '{' => {
                            self.state = ScannerState::WithinContent;
                            continue;
                        }
                        '}' => {
                            // empty name, the tag state closes it
                            self.state = next;
                            continue;
                        }
                        '/' if self.stream.peek_char_at(1) == '}' => {
                            self.state = next;
                            continue;
                        }
                        c if c.is_whitespace() => {
                            self.stream.skip_whitespace();
                            self.state = next;
                            return self.finish_with_error(
                                offset,
                                TokenKind::Unknown,
                                TAG_NAME_MUST_FOLLOW,
                            );
                        }
                        _ => {
                            self.stream.advance(1);
                            self.stream.advance_while_char(|c| {
                                !c.is_whitespace() && c != '}' && c != '{'
                            });
                            self.state = next;
                            return self.finish_with_error(
                                offset,
                                TokenKind::Unknown,
                                TAG_NAME_MUST_FOLLOW,
                            );
                        }
                    }
                }

                ScannerState::WithinTag => {
                    if self.stream.skip_whitespace() {
                        return self.finish(offset, TokenKind::Whitespace);
                    }
                    if self.stream.advance_if_chars(&['/', '}']) {
                        self.state = ScannerState::WithinContent;
                        return self.finish(offset, TokenKind::StartTagSelfClose);
                    }
                    if self.stream.advance_if_char('}') {
                        self.state = ScannerState::WithinContent;
                        return self.finish(offset, TokenKind::StartTagClose);
                    }
                    if self.stream.peek_char() == '{' {
                        self.state = ScannerState::WithinContent;
                        continue;
                    }
                    self.scan_parameter_fragment(true);
                    return self.finish(offset, TokenKind::ParameterTag);
                }

                ScannerState::WithinEndTag => {
                    if self.stream.skip_whitespace() {
                        return self.finish(offset, TokenKind::Whitespace);
                    }
                    if self.stream.advance_if_char('}') {
                        self.state = ScannerState::WithinContent;
                        return self.finish(offset, TokenKind::EndTagClose);
                    }
                    if self.stream.peek_char() == '{' {
                        self.state = ScannerState::WithinContent;
                        continue;
                    }
                    self.scan_parameter_fragment(false);
                    return self.finish(offset, TokenKind::ParameterTag);
                }
            }
        }
    }

    // --- Content ---

    /// If the cursor sits on a `{` that opens a construct, consume the
    /// opening delimiter, switch state and return the opening token kind.
    fn open_construct(&mut self) -> Option<TokenKind> {
        if self.stream.peek_char() != '{' {
            return None;
        }
        let (kind, state, width) = match self.stream.peek_char_at(1) {
            '!' => (TokenKind::StartComment, ScannerState::WithinComment, 2),
            '|' => (TokenKind::CDATATagOpen, ScannerState::WithinCDATA, 2),
            '[' => (TokenKind::CDATAOldTagOpen, ScannerState::WithinCDATAOld, 2),
            '#' => (TokenKind::StartTagOpen, ScannerState::AfterOpeningStartTag, 2),
            '/' => (TokenKind::EndTagOpen, ScannerState::AfterOpeningEndTag, 2),
            '@' => (
                TokenKind::StartParameterDeclaration,
                ScannerState::WithinParameterDeclaration,
                2,
            ),
            c if is_expression_start(c) => {
                (TokenKind::StartExpression, ScannerState::WithinExpression, 1)
            }
            _ => return None,
        };
        self.stream.advance(width);
        self.state = state;
        Some(kind)
    }

    /// Consume text up to the next `{` that opens a construct. A `{` followed
    /// by anything else is ordinary text.
    fn scan_content(&mut self) {
        loop {
            if !self.stream.advance_until_char(&['{']) {
                return;
            }
            if is_construct_start(self.stream.peek_char_at(1)) {
                return;
            }
            self.stream.advance(1);
        }
    }

    /// Comment and CDATA bodies are never lexed: everything up to the
    /// closing pair is one token.
    fn scan_verbatim(
        &mut self,
        offset: usize,
        close: [char; 2],
        body: TokenKind,
        end: TokenKind,
    ) -> Token {
        if self.stream.advance_if_chars(&close) {
            self.state = ScannerState::WithinContent;
            return self.finish(offset, end);
        }
        self.stream.advance_until_chars(&close);
        self.finish(offset, body)
    }

    // --- Parameter declarations ---

    /// One whitespace-separated word of `{@Type alias}`. Whitespace inside
    /// generic brackets (`Map<String, Item>`) does not split the word.
    fn scan_declaration_word(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.stream.peek_char() {
                EOS_CHAR if self.stream.eos() => return,
                '}' | '{' => return,
                '<' => depth += 1,
                '>' => depth = depth.saturating_sub(1),
                c if c.is_whitespace() && depth == 0 => return,
                _ => {}
            }
            self.stream.advance(1);
        }
    }

    // --- Expressions ---

    /// Expression body up to the closing `}` (or an unquoted `{`). Quoted
    /// strings are skipped whole so a `}` inside a literal does not end the
    /// expression.
    fn scan_expression_body(&mut self) {
        loop {
            if !self.stream.advance_until_char(&['}', '{', '"', '\'']) {
                return;
            }
            match self.stream.peek_char() {
                '"' | '\'' => {
                    if !self.stream.skip_quoted() {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    // --- Tags ---

    /// One whitespace-separated fragment of a tag, with quoted substrings
    /// kept whole.
    fn scan_parameter_fragment(&mut self, stop_at_self_close: bool) {
        loop {
            match self.stream.peek_char() {
                EOS_CHAR if self.stream.eos() => return,
                '}' | '{' => return,
                c if c.is_whitespace() => return,
                '/' if stop_at_self_close && self.stream.peek_char_at(1) == '}' => return,
                '"' | '\'' => {
                    self.stream.skip_quoted();
                }
                _ => self.stream.advance(1),
            }
        }
    }

    // --- Helpers ---

    fn finish(&self, offset: usize, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(offset, self.stream.pos()))
    }

    fn finish_with_error(&self, offset: usize, kind: TokenKind, error: &str) -> Token {
        Token::with_error(kind, Span::new(offset, self.stream.pos()), error)
    }
}

/// Characters that, after a `{`, open a template construct.
pub fn is_construct_start(c: char) -> bool {
    matches!(c, '!' | '|' | '[' | '#' | '/' | '@') || is_expression_start(c)
}

pub fn is_expression_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub fn is_tag_name_start(c: char) -> bool {
    c.is_alphabetic()
}

pub fn is_tag_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}
