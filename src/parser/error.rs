use thiserror::Error;

use crate::ast::{Location, Span};
use crate::diagnostics::DiagnosticKind;

/// Why the parser gave up on the current declaration.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// Unexpected token encountered
    #[error("Parse error at line {}, column {}: expected {expected}, found '{found}'", .span.start.line, .span.start.column)]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    /// Unexpected end of input
    #[error("Parse error at line {}, column {}: unexpected end of input, expected {expected}", .location.line, .location.column)]
    UnexpectedEndOfInput { expected: String, location: Location },

    /// A token that must simply not be there, e.g. `break 1;`
    #[error("Parse error at line {}, column {}: unexpected token '{token}'", .span.start.line, .span.start.column)]
    DeleteToken { token: String, span: Span },

    /// Invalid syntax
    #[error("Parse error at line {}, column {}: {message}", .span.start.line, .span.start.column)]
    InvalidSyntax { message: String, span: Span },

    /// Java syntax outside the supported subset
    #[error("Parse error at line {}, column {}: {feature} is not supported", .span.start.line, .span.start.column)]
    Unsupported { feature: String, span: Span },

    /// The parser's step budget ran out
    #[error("Parse error: source too complex")]
    TooComplex,
}

impl ParseError {
    pub fn unexpected_token(expected: &str, found: &str, span: Span) -> Self {
        ParseError::UnexpectedToken { expected: expected.to_string(), found: found.to_string(), span }
    }

    pub fn invalid_syntax(message: &str, span: Span) -> Self {
        ParseError::InvalidSyntax { message: message.to_string(), span }
    }

    pub fn unsupported(feature: &str, span: Span) -> Self {
        ParseError::Unsupported { feature: feature.to_string(), span }
    }

    /// The diagnostic reported for this error and where it points.
    pub fn to_diagnostic(&self) -> (DiagnosticKind, Span) {
        match self {
            ParseError::UnexpectedToken { expected, found, span } => (
                DiagnosticKind::UnexpectedToken { found: found.clone(), expected: expected.clone() },
                *span,
            ),
            ParseError::UnexpectedEndOfInput { expected, location } => (
                DiagnosticKind::UnexpectedEof(expected.clone()),
                Span::new(*location, *location),
            ),
            ParseError::DeleteToken { token, span } => (DiagnosticKind::DeleteToken(token.clone()), *span),
            ParseError::InvalidSyntax { message, span } => (DiagnosticKind::InvalidSyntax(message.clone()), *span),
            ParseError::Unsupported { feature, span } => (DiagnosticKind::Unsupported(feature.clone()), *span),
            ParseError::TooComplex => (
                DiagnosticKind::InvalidSyntax("source too complex".to_string()),
                Span::default(),
            ),
        }
    }
}
