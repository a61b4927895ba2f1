//! Qute Lexer
//!
//! Tokenizes Qute templates into a stream of template-level tokens.
//! Recognizes content, comments `{! !}`, CDATA `{| |}` and `{[ ]}`, section
//! tags `{#name}` / `{/name}`, parameter declarations `{@Type alias}` and
//! expressions `{item.name}`. Every token carries the exact byte range it
//! covers; malformed input produces tokens with an error message attached,
//! never a failure.
//!
//! # Example
//!
//! ```
//! use qute_lexer::{Scanner, TokenKind};
//!
//! let tokens = Scanner::tokenize("");
//! assert_eq!(tokens.len(), 1); // Just EOS
//! assert_eq!(tokens[0].kind, TokenKind::Eos);
//! ```

pub mod position;
pub mod scanner;
pub mod stream;
pub mod token;

pub use position::{LineIndex, Position, PositionError};
pub use scanner::{Scanner, ScannerState};
pub use stream::CharStream;
pub use token::{Span, Token, TokenKind};
