use std::fmt;
use std::ops::{Index, IndexMut};

use super::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub package: Option<String>,
    pub imports: Vec<ImportDecl>,
    pub decls: DeclArena,
    pub span: Span,
    next_expr_id: u32,
}

impl CompilationUnit {
    pub fn new(package: Option<String>, imports: Vec<ImportDecl>, decls: DeclArena, span: Span, next_expr_id: u32) -> Self {
        Self { package, imports, decls, span, next_expr_id }
    }

    /// Ids for expressions created after parsing (synthesized members).
    pub fn fresh_expr_id(&mut self) -> ExprId {
        let id = ExprId(self.next_expr_id);
        self.next_expr_id += 1;
        id
    }

    /// Binary name prefix, `pkg/sub/` or empty.
    pub fn package_prefix(&self) -> String {
        match &self.package {
            Some(p) => format!("{}/", p.replace('.', "/")),
            None => String::new(),
        }
    }

    /// Internal (binary) name of a declaration, `pkg/Outer$Inner`.
    pub fn binary_name(&self, id: DeclId) -> String {
        let mut parts = vec![self.decls[id].name.clone()];
        let mut cur = self.decls[id].enclosing;
        while let Some(outer) = cur {
            parts.push(self.decls[outer].name.clone());
            cur = self.decls[outer].enclosing;
        }
        parts.reverse();
        format!("{}{}", self.package_prefix(), parts.join("$"))
    }

    /// Outermost declaration containing `id`.
    pub fn outermost(&self, id: DeclId) -> DeclId {
        let mut cur = id;
        while let Some(outer) = self.decls[cur].enclosing {
            cur = outer;
        }
        cur
    }
}

/// Owner of every type declaration in a unit.
#[derive(Debug, Clone, Default)]
pub struct DeclArena {
    decls: Vec<TypeDecl>,
}

impl DeclArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, mut decl: TypeDecl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        decl.id = id;
        self.decls.push(decl);
        id
    }

    pub fn get(&self, id: DeclId) -> Option<&TypeDecl> {
        self.decls.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = DeclId> {
        (0..self.decls.len() as u32).map(DeclId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDecl> {
        self.decls.iter()
    }

    pub fn top_level(&self) -> impl Iterator<Item = &TypeDecl> {
        self.decls.iter().filter(|d| d.enclosing.is_none())
    }
}

impl Index<DeclId> for DeclArena {
    type Output = TypeDecl;

    fn index(&self, id: DeclId) -> &TypeDecl {
        &self.decls[id.index()]
    }
}

impl IndexMut<DeclId> for DeclArena {
    fn index_mut(&mut self, id: DeclId) -> &mut TypeDecl {
        &mut self.decls[id.index()]
    }
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub name: String,
    pub is_static: bool,
    pub is_wildcard: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Record => "record",
            TypeKind::Annotation => "@interface",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub id: DeclId,
    pub kind: TypeKind,
    pub name: String,
    pub name_span: Span,
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub type_params: Vec<TypeParam>,
    pub extends: Option<TypeRef>,
    /// `implements` for classes, enums and records; `extends` for interfaces.
    pub implements: Vec<TypeRef>,
    pub permits: Vec<TypeRef>,
    pub components: Vec<RecordComponent>,
    pub enum_constants: Vec<EnumConstant>,
    pub members: Vec<Member>,
    pub enclosing: Option<DeclId>,
    pub nested: Vec<DeclId>,
    pub span: Span,
}

impl TypeDecl {
    pub fn new(kind: TypeKind, name: String, name_span: Span, span: Span) -> Self {
        Self {
            id: DeclId(0),
            kind,
            name,
            name_span,
            modifiers: Modifiers::default(),
            annotations: Vec::new(),
            type_params: Vec::new(),
            extends: None,
            implements: Vec::new(),
            permits: Vec::new(),
            components: Vec::new(),
            enum_constants: Vec::new(),
            members: Vec::new(),
            enclosing: None,
            nested: Vec::new(),
            span,
        }
    }

    pub fn is_record(&self) -> bool {
        self.kind == TypeKind::Record
    }

    pub fn is_interface_like(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Annotation)
    }

    /// Records, enums, interfaces and annotation types are implicitly static
    /// when nested.
    pub fn is_static(&self) -> bool {
        self.enclosing.is_none() || self.kind != TypeKind::Class || self.modifiers.has(Modifier::Static)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(md) => Some(md),
            _ => None,
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = &ConstructorDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Constructor(c) => Some(c),
            _ => None,
        })
    }

    pub fn initializers(&self) -> impl Iterator<Item = &Initializer> {
        self.members.iter().filter_map(|m| match m {
            Member::Initializer(i) => Some(i),
            _ => None,
        })
    }

    pub fn has_user_method(&self, name: &str, arity: usize) -> bool {
        self.methods().any(|m| m.name == name && m.params.len() == arity)
    }
}

#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<TypeRef>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Static,
    Abstract,
    Final,
    Native,
    Synchronized,
    Transient,
    Volatile,
    Strictfp,
    Default,
    Sealed,
    NonSealed,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Static => "static",
            Modifier::Abstract => "abstract",
            Modifier::Final => "final",
            Modifier::Native => "native",
            Modifier::Synchronized => "synchronized",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Strictfp => "strictfp",
            Modifier::Default => "default",
            Modifier::Sealed => "sealed",
            Modifier::NonSealed => "non-sealed",
        };
        write!(f, "{}", s)
    }
}

/// Access level, ordered from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    Package,
    Protected,
    Public,
}

/// Modifiers in source order, each with the span of its keyword.
#[derive(Debug, Clone, Default)]
pub struct Modifiers {
    pub entries: Vec<(Modifier, Span)>,
}

impl Modifiers {
    pub fn has(&self, m: Modifier) -> bool {
        self.entries.iter().any(|(e, _)| *e == m)
    }

    pub fn span_of(&self, m: Modifier) -> Option<Span> {
        self.entries.iter().find(|(e, _)| *e == m).map(|(_, s)| *s)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, m: Modifier, span: Span) {
        self.entries.push((m, span));
    }

    pub fn visibility(&self) -> Visibility {
        if self.has(Modifier::Public) {
            Visibility::Public
        } else if self.has(Modifier::Protected) {
            Visibility::Protected
        } else if self.has(Modifier::Private) {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }

    pub fn of_visibility(visibility: Visibility, span: Span) -> Self {
        let mut m = Modifiers::default();
        match visibility {
            Visibility::Public => m.push(Modifier::Public, span),
            Visibility::Protected => m.push(Modifier::Protected, span),
            Visibility::Private => m.push(Modifier::Private, span),
            Visibility::Package => {}
        }
        m
    }
}

#[derive(Debug, Clone)]
pub struct Annotation {
    /// Name as written, possibly qualified.
    pub name: String,
    pub elements: Vec<(String, ElementValue)>,
    pub span: Span,
}

impl Annotation {
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub enum ElementValue {
    Expr(Expr),
    Array(Vec<ElementValue>, Span),
    Annotation(Box<Annotation>),
}

/// A type as written in source.
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub name: String,
    pub type_args: Vec<TypeRef>,
    pub array_dims: usize,
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

impl TypeRef {
    pub fn named(name: &str, span: Span) -> Self {
        Self { name: name.to_string(), type_args: Vec::new(), array_dims: 0, annotations: Vec::new(), span }
    }

    pub fn is_void(&self) -> bool {
        self.name == "void" && self.array_dims == 0
    }

    pub fn is_primitive(&self) -> bool {
        self.array_dims == 0
            && matches!(
                self.name.as_str(),
                "boolean" | "byte" | "short" | "char" | "int" | "long" | "float" | "double"
            )
    }

    pub fn with_extra_dims(&self, dims: usize) -> TypeRef {
        let mut t = self.clone();
        t.array_dims += dims;
        t
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.type_args.is_empty() {
            let args: Vec<String> = self.type_args.iter().map(|t| t.to_string()).collect();
            write!(f, "<{}>", args.join(","))?;
        }
        for _ in 0..self.array_dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordComponent {
    pub annotations: Vec<Annotation>,
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub varargs: bool,
    pub name: String,
    pub name_span: Span,
    /// Dimensions written after the name, `int marr[]`.
    pub extra_dims: usize,
    pub span: Span,
}

impl RecordComponent {
    /// Declared type with a vararg folded into an array dimension.
    pub fn effective_type(&self) -> TypeRef {
        self.ty.with_extra_dims(self.extra_dims + usize::from(self.varargs))
    }
}

#[derive(Debug, Clone)]
pub struct EnumConstant {
    pub annotations: Vec<Annotation>,
    pub name: String,
    pub name_span: Span,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Initializer(Initializer),
}

/// Where a member came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Source,
    /// Added by the compiler (accessors, backing fields, default constructors).
    Synthesized,
    /// Required by the language (implicit canonical constructor).
    Mandated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectMethodKind {
    ToString,
    HashCode,
    Equals,
}

impl ObjectMethodKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjectMethodKind::ToString => "toString",
            ObjectMethodKind::HashCode => "hashCode",
            ObjectMethodKind::Equals => "equals",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub origin: Origin,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDeclarator {
    pub name: String,
    pub name_span: Span,
    pub extra_dims: usize,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub type_params: Vec<TypeParam>,
    pub return_type: TypeRef,
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Parameter>,
    pub throws: Vec<TypeRef>,
    pub body: Option<Block>,
    /// Annotation type element default.
    pub default_value: Option<ElementValue>,
    pub origin: Origin,
    /// Set on record `equals`/`hashCode`/`toString` whose body is an
    /// `ObjectMethods` bootstrap call.
    pub object_method: Option<ObjectMethodKind>,
    pub span: Span,
}

impl MethodDecl {
    pub fn is_static(&self) -> bool {
        self.modifiers.has(Modifier::Static)
    }

    pub fn is_varargs(&self) -> bool {
        self.params.last().map(|p| p.varargs).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorDecl {
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub type_params: Vec<TypeParam>,
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Parameter>,
    /// Compact canonical form: written without a parameter list.
    pub compact: bool,
    pub throws: Vec<TypeRef>,
    pub body: Block,
    pub origin: Origin,
    pub span: Span,
}

impl ConstructorDecl {
    /// Parameters are reported as mandated in `MethodParameters`.
    pub fn has_mandated_params(&self) -> bool {
        self.compact || self.origin == Origin::Mandated
    }

    pub fn explicit_call(&self) -> Option<&ExplicitCtorCall> {
        match self.body.stmts.first() {
            Some(Stmt::ExplicitCtorCall(call)) => Some(call),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub annotations: Vec<Annotation>,
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub varargs: bool,
    pub name: String,
    pub name_span: Span,
    pub extra_dims: usize,
    pub span: Span,
}

impl Parameter {
    pub fn effective_type(&self) -> TypeRef {
        self.ty.with_extra_dims(self.extra_dims + usize::from(self.varargs))
    }
}

#[derive(Debug, Clone)]
pub struct Initializer {
    pub is_static: bool,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    LocalVar(LocalVarStmt),
    Expression(ExprStmt),
    Block(Block),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    Labeled(LabeledStmt),
    Return(ReturnStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Yield(YieldStmt),
    Throw(ThrowStmt),
    Try(TryStmt),
    Synchronized(SynchronizedStmt),
    Switch(SwitchStmt),
    ExplicitCtorCall(ExplicitCtorCall),
    Empty(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::LocalVar(s) => s.span,
            Stmt::Expression(s) => s.span,
            Stmt::Block(b) => b.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::DoWhile(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Labeled(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Break(s) => s.span,
            Stmt::Continue(s) => s.span,
            Stmt::Yield(s) => s.span,
            Stmt::Throw(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Synchronized(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::ExplicitCtorCall(s) => s.span,
            Stmt::Empty(span) => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalVarStmt {
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub cond: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub init: Vec<Stmt>,
    pub cond: Option<Expr>,
    pub update: Vec<Expr>,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LabeledStmt {
    pub label: String,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BreakStmt {
    pub label: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ContinueStmt {
    pub label: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct YieldStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ThrowStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub types: Vec<TypeRef>,
    pub name: String,
    pub name_span: Span,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SynchronizedStmt {
    pub lock: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub selector: Expr,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtorCallKind {
    This,
    Super,
}

#[derive(Debug, Clone)]
pub struct ExplicitCtorCall {
    pub id: ExprId,
    pub kind: CtorCallKind,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub labels: Vec<CaseLabel>,
    pub body: CaseBody,
    pub span: Span,
}

impl SwitchCase {
    pub fn is_default(&self) -> bool {
        self.labels.iter().any(|l| matches!(l, CaseLabel::Default(_)))
    }
}

#[derive(Debug, Clone)]
pub enum CaseLabel {
    Default(Span),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum CaseBody {
    Arrow(ArrowBody),
    /// Statements of a `case ...:` group; may fall through.
    Colon(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub enum ArrowBody {
    Expr(Expr),
    Block(Block),
    Throw(ThrowStmt),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind, span: Span) -> Self {
        Self { id, kind, span }
    }

    /// Strips redundant parentheses.
    pub fn unparenthesized(&self) -> &Expr {
        match &self.kind {
            ExprKind::Parenthesized(inner) => inner.unparenthesized(),
            _ => self,
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.unparenthesized().kind, ExprKind::Switch(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(u16),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr)
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Name(String),
    This,
    Super,
    FieldAccess {
        target: Box<Expr>,
        name: String,
        name_span: Span,
    },
    MethodCall {
        target: Option<Box<Expr>>,
        name: String,
        name_span: Span,
        args: Vec<Expr>,
    },
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },
    NewArray {
        elem: TypeRef,
        dims: Vec<Expr>,
        /// Trailing `[]` without a length.
        extra_dims: usize,
        init: Option<Vec<Expr>>,
    },
    /// `{a, b}` in a variable initializer.
    ArrayInit(Vec<Expr>),
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    IncDec {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        /// `Some` for compound assignment.
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    InstanceOf {
        expr: Box<Expr>,
        ty: TypeRef,
    },
    ClassLit(TypeRef),
    Switch(Box<SwitchExpr>),
    Lambda(Box<LambdaExpr>),
    Parenthesized(Box<Expr>),
}

/// `(a, b) -> body`; parameters without a type take the functional
/// interface's parameter types.
#[derive(Debug, Clone)]
pub struct LambdaExpr {
    pub params: Vec<LambdaParam>,
    pub body: LambdaBody,
}

#[derive(Debug, Clone)]
pub struct LambdaParam {
    /// `None` when implicitly typed, `var` included.
    pub ty: Option<TypeRef>,
    pub name: String,
    pub name_span: Span,
}

#[derive(Debug, Clone)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct SwitchExpr {
    pub selector: Expr,
    pub cases: Vec<SwitchCase>,
}

impl SwitchExpr {
    pub fn has_default(&self) -> bool {
        self.cases.iter().any(SwitchCase::is_default)
    }
}

impl Expr {
    /// Visits this expression and its subexpressions, parents first.
    /// Statements inside switch expression arms are not entered; arrow arms
    /// that are plain expressions are. Lambda bodies are never entered.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Literal(_)
            | ExprKind::Name(_)
            | ExprKind::This
            | ExprKind::Super
            | ExprKind::ClassLit(_)
            | ExprKind::Lambda(_) => {}
            ExprKind::FieldAccess { target, .. } => target.walk(f),
            ExprKind::MethodCall { target, args, .. } => {
                if let Some(t) = target {
                    t.walk(f);
                }
                args.iter().for_each(|a| a.walk(f));
            }
            ExprKind::New { args, .. } => args.iter().for_each(|a| a.walk(f)),
            ExprKind::NewArray { dims, init, .. } => {
                dims.iter().for_each(|d| d.walk(f));
                if let Some(init) = init {
                    init.iter().for_each(|e| e.walk(f));
                }
            }
            ExprKind::ArrayInit(items) => items.iter().for_each(|e| e.walk(f)),
            ExprKind::ArrayAccess { array, index } => {
                array.walk(f);
                index.walk(f);
            }
            ExprKind::Unary { operand, .. } => operand.walk(f),
            ExprKind::IncDec { target, .. } => target.walk(f),
            ExprKind::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            ExprKind::Assign { target, value, .. } => {
                target.walk(f);
                value.walk(f);
            }
            ExprKind::Conditional { cond, then_expr, else_expr } => {
                cond.walk(f);
                then_expr.walk(f);
                else_expr.walk(f);
            }
            ExprKind::Cast { expr, .. } | ExprKind::InstanceOf { expr, .. } => expr.walk(f),
            ExprKind::Parenthesized(inner) => inner.walk(f),
            ExprKind::Switch(sw) => {
                sw.selector.walk(f);
                for case in &sw.cases {
                    if let CaseBody::Arrow(ArrowBody::Expr(e)) = &case.body {
                        e.walk(f);
                    }
                }
            }
        }
    }
}

impl Stmt {
    /// Expressions held directly by this statement.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::LocalVar(s) => s.declarators.iter().filter_map(|d| d.init.as_ref()).collect(),
            Stmt::Expression(s) => vec![&s.expr],
            Stmt::If(s) => vec![&s.cond],
            Stmt::While(s) => vec![&s.cond],
            Stmt::DoWhile(s) => vec![&s.cond],
            Stmt::For(s) => s.cond.iter().chain(&s.update).collect(),
            Stmt::Return(s) => s.value.iter().collect(),
            Stmt::Yield(s) => vec![&s.value],
            Stmt::Throw(s) => vec![&s.expr],
            Stmt::Synchronized(s) => vec![&s.lock],
            Stmt::Switch(s) => {
                let mut out = vec![&s.selector];
                for case in &s.cases {
                    match &case.body {
                        CaseBody::Arrow(ArrowBody::Expr(e)) => out.push(e),
                        CaseBody::Arrow(ArrowBody::Throw(t)) => out.push(&t.expr),
                        _ => {}
                    }
                }
                out
            }
            Stmt::ExplicitCtorCall(c) => c.args.iter().collect(),
            Stmt::Block(_)
            | Stmt::Labeled(_)
            | Stmt::Break(_)
            | Stmt::Continue(_)
            | Stmt::Try(_)
            | Stmt::Empty(_) => Vec::new(),
        }
    }

    /// Statements nested directly in this one.
    pub fn children(&self) -> Vec<&Stmt> {
        match self {
            Stmt::Block(b) => b.stmts.iter().collect(),
            Stmt::If(s) => std::iter::once(s.then_branch.as_ref()).chain(s.else_branch.as_deref()).collect(),
            Stmt::While(s) => vec![s.body.as_ref()],
            Stmt::DoWhile(s) => vec![s.body.as_ref()],
            Stmt::For(s) => s.init.iter().chain(std::iter::once(s.body.as_ref())).collect(),
            Stmt::Labeled(s) => vec![s.body.as_ref()],
            Stmt::Try(s) => s
                .body
                .stmts
                .iter()
                .chain(s.catches.iter().flat_map(|c| &c.body.stmts))
                .chain(s.finally.iter().flat_map(|f| &f.stmts))
                .collect(),
            Stmt::Synchronized(s) => s.body.stmts.iter().collect(),
            Stmt::Switch(s) => s
                .cases
                .iter()
                .flat_map(|c| match &c.body {
                    CaseBody::Colon(stmts) => stmts.iter().collect::<Vec<_>>(),
                    CaseBody::Arrow(ArrowBody::Block(b)) => b.stmts.iter().collect(),
                    CaseBody::Arrow(_) => Vec::new(),
                })
                .collect(),
            Stmt::LocalVar(_)
            | Stmt::Expression(_)
            | Stmt::Return(_)
            | Stmt::Break(_)
            | Stmt::Continue(_)
            | Stmt::Yield(_)
            | Stmt::Throw(_)
            | Stmt::ExplicitCtorCall(_)
            | Stmt::Empty(_) => Vec::new(),
        }
    }
}
