//! Parse diagnostics.
//!
//! Nothing in a template is fatal to the parser: malformed tags, unmatched
//! sections and bad expressions are all recorded here and parsing carries on.

use qute_lexer::Span;
use serde::Serialize;

use crate::ast::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Lexical error reported by one of the scanners.
    SyntaxError,
    UnterminatedComment,
    UnterminatedCdata,
    UnterminatedSection,
    SectionEndDoesNotMatchStart,
    SectionBlockEndDoesNotMatchStart,
    NoSectionName,
    MissingParameterAlias,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SyntaxError => "SYNTAX_ERROR",
            ErrorCode::UnterminatedComment => "UNTERMINATED_COMMENT",
            ErrorCode::UnterminatedCdata => "UNTERMINATED_CDATA",
            ErrorCode::UnterminatedSection => "UNTERMINATED_SECTION",
            ErrorCode::SectionEndDoesNotMatchStart => "SECTION_END_DOES_NOT_MATCH_START",
            ErrorCode::SectionBlockEndDoesNotMatchStart => {
                "SECTION_BLOCK_END_DOES_NOT_MATCH_START"
            }
            ErrorCode::NoSectionName => "NO_SECTION_NAME",
            ErrorCode::MissingParameterAlias => "MISSING_PARAMETER_ALIAS",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found while parsing, anchored to the smallest node that
/// contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    pub span: Span,
    pub severity: Severity,
    pub node: NodeId,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
