//! AST-level review before lowering and attribution.
//!
//! Review is non-fatal: every rule reports into the unit's
//! [`DiagnosticSink`] and the pass moves on. The declarations that drew an
//! error are returned so later passes can leave them alone instead of
//! piling follow-on errors onto a broken declaration.

use std::collections::HashSet;

use crate::ast::*;
use crate::diagnostics::DiagnosticSink;

pub mod annotations;
mod classes;
mod record_ctors;
mod records;

/// Review every declaration of `unit`; returns those that drew an error.
pub fn review(unit: &CompilationUnit, sink: &mut DiagnosticSink) -> HashSet<DeclId> {
    log::debug!("review start: types={} imports={}", unit.decls.len(), unit.imports.len());
    let mut failed = HashSet::new();
    for decl in unit.decls.iter() {
        let mark = sink.len();
        classes::review_type(unit, decl, sink);
        if decl.is_record() {
            records::review_record(unit, decl, sink);
        }
        if sink.has_errors_since(mark) {
            log::debug!("review: {} has errors", decl.name);
            failed.insert(decl.id);
        }
    }
    log::debug!("review end: {} declaration(s) failed", failed.len());
    failed
}
