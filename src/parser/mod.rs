//! Lexing and parsing of Java source into the [`crate::ast`] tree.

pub mod error;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

pub use error::ParseError;
pub use lexer::{Lexer, Token};
pub use parser::Parser;

use crate::ast::CompilationUnit;
use crate::diagnostics::DiagnosticSink;

/// Parse one source file. Syntax errors are reported to `sink`; the members
/// they occurred in are left out of the returned unit.
pub fn parse(source: &str, sink: &mut DiagnosticSink) -> CompilationUnit {
    let unit = Parser::new(source, sink).parse_unit();
    log::debug!("parsed {} type declaration(s)", unit.decls.len());
    unit
}
