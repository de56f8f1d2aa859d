//! Semantic analysis pipeline, in javac's phase order:
//!
//! - Lower: record member synthesis and default constructors
//! - Enter: the class table of source and built-in types
//! - Attr: name resolution, type checking, switch typing
//! - Flow: reachability, definite assignment, switch jump rules

pub mod attr;
mod attr_switch;
pub mod flow;
pub mod lower;
pub mod symtab;
pub mod types;

use std::collections::HashSet;

use crate::ast::{CompilationUnit, DeclId};
use crate::diagnostics::DiagnosticSink;

pub use attr::Attribution;
pub use symtab::ClassTable;

/// Everything code generation needs from analysis.
#[derive(Debug)]
pub struct Analysis {
    pub table: ClassTable,
    pub attr: Attribution,
}

/// Runs the phases over `unit`. Declarations in `skip` failed review; they
/// stay in the class table but are neither lowered nor checked.
pub fn analyze(unit: &mut CompilationUnit, skip: &HashSet<DeclId>, sink: &mut DiagnosticSink) -> Analysis {
    log::debug!("wash start: {} declaration(s), {} skipped", unit.decls.len(), skip.len());
    lower::lower_unit(unit, skip);
    let table = ClassTable::build(unit);
    let mut attr = attr::attribute(unit, &table, skip, sink);
    flow::analyze(unit, &mut attr, skip, sink);
    log::debug!("wash end: {} diagnostic(s)", sink.len());
    Analysis { table, attr }
}
