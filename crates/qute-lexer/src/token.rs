use serde::Serialize;

/// A byte range `[start, end)` in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Inclusive on both ends, so a cursor placed right after a construct
    /// still hits it.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Template-level token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // {! ... !}
    StartComment,
    Comment,
    EndComment,

    // {| ... |}
    CDATATagOpen,
    CDATAContent,
    CDATATagClose,

    // {[ ... ]}
    CDATAOldTagOpen,
    CDATAOldContent,
    CDATAOldTagClose,

    // {expr}
    StartExpression,
    ExpressionContent,
    EndExpression,

    // {#name params} / {#name /}
    StartTagOpen,
    StartTag,
    StartTagSelfClose,
    StartTagClose,

    // {/name} / {/}
    EndTagOpen,
    EndTag,
    EndTagClose,

    ParameterTag,

    // {@Type alias}
    StartParameterDeclaration,
    ParameterDeclaration,
    EndParameterDeclaration,

    Content,
    Whitespace,
    Unknown,

    // End of input
    Eos,
}

/// A token produced by the template scanner.
///
/// Lexical problems never abort scanning; they travel on the token that
/// covers the offending text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            error: None,
        }
    }

    pub fn with_error(kind: TokenKind, span: Span, error: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            error: Some(error.into()),
        }
    }
}
