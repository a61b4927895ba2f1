//! Qute Parser
//!
//! Builds a node tree from a Qute template. The template [`qute_lexer`]
//! scanner supplies the flat token stream; [`Parser`] folds it into a
//! [`Document`] of sections, expressions, comments and text, scanning each
//! expression with the [`expr_lexer::ExprLexer`] on the way. Malformed
//! templates still produce a complete tree plus a list of [`Diagnostic`]s.
//!
//! # Example
//!
//! ```
//! let doc = qute_parser::parse("{#if user}{user.name}{/if}", "hello.html");
//! assert!(doc.diagnostics().is_empty());
//! let offset = "{#if user}{user.".len();
//! let node = doc.find_node_at(offset).unwrap();
//! assert_eq!(doc.node(node).kind.name(), "PropertyPart");
//! ```

pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod expr_lexer;
pub mod parser;

pub use ast::{Document, Node, NodeId, NodeKind, PartKind, Section, SectionKind};
pub use config::ParserConfig;
pub use diagnostic::{Diagnostic, ErrorCode, Severity};
pub use parser::Parser;

/// Parse a template with the default configuration.
pub fn parse(text: &str, uri: &str) -> Document {
    Parser::parse(text, uri)
}
