//! TypeScript/JavaScript syntax: tokens, parser and an arena syntax tree
//!
//! The parser understands the subset of TypeScript the subscription rule
//! needs to see through: declarations with type annotations, classes,
//! functions and arrows, and the full expression grammar. Type-level
//! declarations (`interface`, `type`, `enum`) are skipped. Parsing never
//! fails outright; problems are collected as [`ParseError`]s next to a
//! best-effort tree.

mod ancestors;
mod lexer;
mod parser;
mod span;
mod tree;

pub use ancestors::{is_function_like, is_return_statement, nearest_ancestor};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse, Parsed};
pub use span::{LineIndex, Span};
pub use tree::{Ancestors, Name, NodeId, Preorder, SyntaxKind, SyntaxNode, SyntaxTree};

use thiserror::Error;

/// Error found while tokenizing or parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated {what}")]
    Unterminated { what: &'static str, span: Span },

    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },

    #[error("nesting exceeds {limit} levels")]
    TooDeep { limit: usize, span: Span },

    #[error("expected {expected}, found '{found}'")]
    Expected {
        expected: String,
        found: String,
        span: Span,
    },
}

impl ParseError {
    /// Location of the offending source text
    pub fn span(&self) -> Span {
        match self {
            ParseError::Unterminated { span, .. }
            | ParseError::UnexpectedChar { span, .. }
            | ParseError::TooDeep { span, .. }
            | ParseError::Expected { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::Expected {
            expected: "')'".to_string(),
            found: ";".to_string(),
            span: Span::new(3, 4),
        };
        assert_eq!(format!("{}", err), "expected ')', found ';'");
        assert_eq!(err.span(), Span::new(3, 4));

        let err = ParseError::Unterminated {
            what: "string literal",
            span: Span::new(0, 5),
        };
        assert_eq!(format!("{}", err), "unterminated string literal");
    }
}
