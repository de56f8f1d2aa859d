//! Per-unit diagnostic collection.
//!
//! Every pass receives the unit's [`DiagnosticSink`] by `&mut` reference and
//! reports into it; nothing is global. Messages come from the fixed catalogue
//! in [`DiagnosticKind`], whose `Display` output is the user-visible text.

use std::fmt;

use thiserror::Error;

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The message catalogue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    // ----- syntax -----
    #[error("Syntax error on token \"{0}\", delete this token")]
    DeleteToken(String),
    #[error("Syntax error on token \"{found}\", {expected} expected")]
    UnexpectedToken { found: String, expected: String },
    #[error("Syntax error, unexpected end of file, {0} expected")]
    UnexpectedEof(String),
    #[error("Syntax error, {0}")]
    InvalidSyntax(String),
    #[error("{0} is not supported")]
    Unsupported(String),

    // ----- record declarations -----
    #[error("Illegal modifier for the record {0}; only public, final and strictfp are permitted")]
    IllegalTopLevelRecordModifier(String),
    #[error("Illegal modifier for the record {0}; only public, private, protected, static, final and strictfp are permitted")]
    IllegalNestedRecordModifier(String),
    #[error("Duplicate modifier for the type {0}")]
    DuplicateModifier(String),
    #[error("Illegal modifier {0} for the record {1}; a record cannot be sealed or non-sealed")]
    SealedRecord(String, String),
    #[error("void is an invalid type for the component {0} of a record")]
    VoidComponent(String),
    #[error("A record component {0} cannot have modifiers")]
    ComponentModifiers(String),
    #[error("Extended dimensions are illegal for a record component")]
    ComponentExtendedDimensions,
    #[error("Duplicate component {0} in record")]
    DuplicateComponent(String),
    #[error("Duplicate parameter {0}")]
    DuplicateParameter(String),
    #[error("The variable argument type {0} of the record {1} must be the last parameter")]
    RecordVarargsNotLast(String, String),
    #[error("The variable argument type {0} of the method {1} must be the last parameter")]
    MethodVarargsNotLast(String, String),
    #[error("Illegal component name {0} in record {1}")]
    IllegalComponentName(String, String),
    #[error("Instance Initializer is not allowed in a record declaration")]
    RecordInstanceInitializer,
    #[error("User declared non-static fields {0} are not permitted in a record")]
    RecordInstanceField(String),
    #[error("Illegal modifier native for method {0}; native methods are not allowed in record")]
    RecordNativeMethod(String),
    #[error("The accessor method must be declared public")]
    AccessorNotPublic,
    #[error("The accessor method must not be static")]
    AccessorStatic,
    #[error("The accessor method must not be generic")]
    AccessorGeneric,
    #[error("Throws clause not allowed for explicitly declared accessor method")]
    AccessorThrows,
    #[error("Illegal return type of accessor; should be the same as the declared type {0} of the record component")]
    AccessorReturnType(String),
    #[error("Cannot reduce the visibility of a canonical constructor {0} from that of the record")]
    CanonicalVisibility(String),
    #[error("Canonical constructor {0} of a record declaration should not be generic")]
    CanonicalGeneric(String),
    #[error("Throws clause not allowed for canonical constructor {0}")]
    CanonicalThrows(String),
    #[error("The body of a canonical constructor must not contain an explicit constructor call")]
    CanonicalExplicitCall,
    #[error("The body of a compact constructor must not contain a return statement")]
    CompactReturn,
    #[error("Illegal parameter name {0} in canonical constructor, expected {1}, the corresponding component name")]
    CanonicalParameterName(String, String),
    #[error("Illegal explicit assignment of a final field {0} in compact constructor")]
    CompactFieldAssignment(String),
    #[error("The blank final field {0} may not have been initialized")]
    FieldMayNotBeInitialized(String),
    #[error("A non-canonical constructor must start with an explicit invocation to a constructor")]
    NonCanonicalWithoutThisCall,
    #[error("Recursive constructor invocation {0}")]
    RecursiveConstructorInvocation(String),
    #[error("Duplicate canonical constructor in record {0}")]
    DuplicateCanonical(String),
    #[error("@SafeVarargs annotation cannot be applied to record component without explicit accessor method {0}")]
    SafeVarargsComponent(String),
    #[error("@SafeVarargs annotation is not allowed on the non-canonical constructor {0} of a record")]
    SafeVarargsNonCanonical(String),
    #[error("Type safety: Potential heap pollution via varargs parameter {0}")]
    HeapPollution(String),
    #[error("The annotation @{0} is disallowed for this location")]
    AnnotationDisallowed(String),
    #[error("The type {0} cannot subclass the final class {1}")]
    SubclassFinal(String, String),

    // ----- switch expressions -----
    #[error("Duplicate case")]
    DuplicateCase,
    #[error("The default case is already defined")]
    DuplicateDefault,
    #[error("A switch expression should have a default case")]
    SwitchExpressionNoDefault,
    #[error("A Switch expression should cover all possible values")]
    SwitchExpressionNotExhaustive,
    #[error("The enum constant {0} needs a corresponding case label in this enum switch on {1}")]
    MissingEnumConstant(String, String),
    #[error("A switch expression should have a non-empty switch block")]
    EmptySwitchExpression,
    #[error("A switch expression does not have any result expressions")]
    NoResultExpressions,
    #[error("Different case kinds used in the switch")]
    MixedCaseKinds,
    #[error("Cannot switch on a value of type {0}. Only convertible int values, strings or enum variables are permitted")]
    IllegalSelectorType(String),
    #[error("Type mismatch: cannot convert from {0} to {1}")]
    TypeMismatch(String, String),
    #[error("Case constants must be constant expressions")]
    NonConstantCase,
    #[error("The qualified case label {0} must be replaced with the unqualified enum constant {1}")]
    QualifiedEnumLabel(String, String),
    #[error("{0} cannot be resolved or is not a field of {1}")]
    UnknownEnumConstant(String, String),
    #[error("A switch labeled block in a switch expression should not complete normally")]
    ArmCompletesNormally,
    #[error("Breaking out of switch expressions not permitted")]
    BreakOutOfSwitchExpression,
    #[error("Continue out of switch expressions not permitted")]
    ContinueOutOfSwitchExpression,
    #[error("Continue or return cannot be the last statement in a switch expression case body")]
    ContinueOrReturnLast,
    #[error("Return within switch expressions not permitted")]
    ReturnInSwitchExpression,
    #[error("yield outside of switch expression")]
    YieldOutsideSwitchExpression,
    #[error("restricted identifier yield not allowed here - method calls need to be qualified")]
    RestrictedYield,
    #[error("Explicit constructor call is not allowed within a switch expression")]
    ExplicitCallInSwitchExpression,

    // ----- general semantics -----
    #[error("{0} cannot be resolved to a type")]
    UnknownType(String),
    #[error("{0} cannot be resolved to a variable")]
    UnknownVariable(String),
    #[error("The method {0}({1}) is undefined for the type {2}")]
    UnknownMethod(String, String, String),
    #[error("The constructor {0}({1}) is undefined")]
    UnknownConstructor(String, String),
    #[error("{0} cannot be resolved or is not a field")]
    UnknownField(String),
    #[error("The operator {0} is undefined for the argument type(s) {1}")]
    BadOperand(String, String),
    #[error("Cannot make a static reference to the non-static {0}")]
    StaticReference(String),
    #[error("Unreachable code")]
    UnreachableCode,
    #[error("This method must return a result of type {0}")]
    MissingReturn(String),
    #[error("Void methods cannot return a value")]
    VoidReturnValue,
    #[error("The local variable {0} may not have been initialized")]
    LocalMayNotBeInitialized(String),
    #[error("The final field {0} cannot be assigned")]
    FinalFieldAssignment(String),
    #[error("Duplicate local variable {0}")]
    DuplicateLocal(String),
    #[error("Duplicate method {0} in type {1}")]
    DuplicateMethod(String, String),
    #[error("Duplicate field {0}.{1}")]
    DuplicateField(String, String),
    #[error("break cannot be used outside of a loop or a switch")]
    BreakOutsideLoop,
    #[error("continue cannot be used outside of a loop")]
    ContinueOutsideLoop,
    #[error("The label {0} is missing")]
    MissingLabel(String),
    #[error("Constructor call must be the first statement in a constructor")]
    MisplacedConstructorCall,
    #[error("Cannot invoke {0} on the primitive type {1}")]
    PrimitiveReceiver(String, String),
    #[error("Non-static inner classes are not supported; declare {0} static")]
    InnerClassUnsupported(String),

    // ----- lambdas -----
    #[error("The target type of this expression must be a functional interface")]
    LambdaTargetNotFunctional,
    #[error("Lambda expression's signature does not match the signature of the functional interface method {0}")]
    LambdaShape(String),
    #[error("Local variable {0} defined in an enclosing scope must be final or effectively final")]
    CapturedNotEffectivelyFinal(String),
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::MissingEnumConstant(..) | DiagnosticKind::HeapPollution(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        Self { severity: kind.severity(), kind, span }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.span.start.line, self.span.start.column, self.severity, self.kind
        )
    }
}

/// Accumulates the diagnostics of one compilation unit.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: DiagnosticKind, span: Span) {
        log::trace!("diagnostic at {}:{}: {}", span.start.line, span.start.column, kind);
        self.diagnostics.push(Diagnostic::new(kind, span));
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Whether an error was reported after the sink held `mark` entries.
    pub fn has_errors_since(&self, mark: usize) -> bool {
        self.diagnostics.iter().skip(mark).any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Diagnostics ordered by position, then by report order.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.diagnostics
            .sort_by_key(|d| (d.span.start.line, d.span.start.column));
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Location;

    fn at(line: usize, column: usize) -> Span {
        Span::new(Location::new(line, column, 0), Location::new(line, column + 1, 0))
    }

    #[test]
    fn messages_come_from_the_catalogue() {
        let kind = DiagnosticKind::IllegalComponentName("finalize".into(), "X".into());
        assert_eq!(kind.to_string(), "Illegal component name finalize in record X");
        assert_eq!(DiagnosticKind::DuplicateCase.to_string(), "Duplicate case");
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut sink = DiagnosticSink::new();
        sink.report(DiagnosticKind::HeapPollution("args".into()), at(1, 1));
        assert!(!sink.has_errors());
        sink.report(DiagnosticKind::DuplicateCase, at(2, 1));
        assert!(sink.has_errors());
        assert!(sink.has_errors_since(1));
        assert!(!sink.has_errors_since(2));
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn sorted_output_is_stable_by_position() {
        let mut sink = DiagnosticSink::new();
        sink.report(DiagnosticKind::UnreachableCode, at(3, 5));
        sink.report(DiagnosticKind::DuplicateCase, at(1, 9));
        sink.report(DiagnosticKind::DuplicateDefault, at(1, 9));
        let sorted = sink.into_sorted();
        assert_eq!(sorted[0].kind, DiagnosticKind::DuplicateCase);
        assert_eq!(sorted[1].kind, DiagnosticKind::DuplicateDefault);
        assert_eq!(sorted[2].kind, DiagnosticKind::UnreachableCode);
    }
}
