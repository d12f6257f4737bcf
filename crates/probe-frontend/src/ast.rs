//! Syntax tree for the probe language.
//!
//! Trees are produced by the parser, shared as `Arc<UnitTree>` with task
//! listeners, and annotated in place by analysis: every name-bearing
//! expression carries a [`Resolution`] cell that is filled once the
//! expression has been attributed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::symbols::Ty;

static NEXT_DECL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a type declaration, unique within the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclId(u64);

impl DeclId {
    pub fn fresh() -> Self {
        Self(NEXT_DECL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// 1-based source position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            col: u32::try_from(col).unwrap_or(u32::MAX),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// Dotted name such as a package, an import or a qualified type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    pub segments: Vec<String>,
    pub span: Span,
}

impl Path {
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// One parsed source unit.
#[derive(Debug)]
pub struct UnitTree {
    pub source_name: String,
    pub package: Option<Path>,
    pub imports: Vec<Import>,
    pub types: Vec<ClassDecl>,
}

impl UnitTree {
    pub fn package_name(&self) -> Option<String> {
        self.package.as_ref().map(Path::to_string)
    }

    /// Top-level declaration with the given identity.
    pub fn find_type(&self, id: DeclId) -> Option<&ClassDecl> {
        self.types.iter().find(|decl| decl.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    pub path: Path,
    /// `import a.b.*;`
    pub wildcard: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Static,
    Final,
}

#[derive(Clone, Debug, Default)]
pub struct Modifiers {
    pub annotations: Vec<Annotation>,
    pub flags: Vec<Modifier>,
}

impl Modifiers {
    pub fn has(&self, modifier: Modifier) -> bool {
        self.flags.contains(&modifier)
    }

    /// Annotation with the given simple or qualified name.
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.name.last() == name || a.name.to_string() == name)
    }
}

#[derive(Clone, Debug)]
pub struct Annotation {
    pub name: Path,
    pub args: Vec<AnnotationArg>,
    pub span: Span,
}

/// Annotation argument: `name = value` or a bare single value.
#[derive(Clone, Debug)]
pub enum AnnotationArg {
    Assign { name: Ident, value: Expr },
    Value(Expr),
}

#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub id: DeclId,
    pub name: Ident,
    pub modifiers: Modifiers,
    pub extends: Option<TypeRef>,
    pub members: Vec<Member>,
    pub span: Span,
}

impl ClassDecl {
    pub fn nested(&self) -> impl Iterator<Item = &ClassDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Class(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(field) => Some(field),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(method) => Some(method),
            _ => None,
        })
    }
}

#[derive(Clone, Debug)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Class(ClassDecl),
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub name: Ident,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub modifiers: Modifiers,
    pub ret: TypeRef,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub ty: TypeRef,
    pub name: Ident,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Int,
    Long,
    Boolean,
    Named(Path),
}

/// A type as written in source, with array dimensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRef {
    pub kind: TypeKind,
    pub dims: u8,
    pub span: Span,
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Void => f.write_str("void")?,
            TypeKind::Int => f.write_str("int")?,
            TypeKind::Long => f.write_str("long")?,
            TypeKind::Boolean => f.write_str("boolean")?,
            TypeKind::Named(path) => write!(f, "{path}")?,
        }
        for _ in 0..self.dims {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Block(Block),
    Local {
        ty: TypeRef,
        name: Ident,
        init: Option<Expr>,
        /// Variable slot, assigned by analysis.
        slot: OnceLock<u16>,
    },
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Synchronized {
        lock: Expr,
        body: Block,
    },
    Expr(Expr),
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Bool(bool),
    Char(char),
    String(String),
    Null,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// What an attributed expression refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Local variable or parameter, by slot.
    Local(u16),
    /// Field `name` declared in `owner` (binary name).
    Field {
        owner: String,
        is_static: bool,
        descriptor: String,
    },
    /// A type used in expression position (static member access).
    Type(String),
    /// Method `name` declared in `owner`.
    Method {
        owner: String,
        is_static: bool,
        descriptor: String,
    },
    /// Instantiated or referenced class.
    Class(String),
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    resolution: OnceLock<Resolution>,
    ty: OnceLock<Ty>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            resolution: OnceLock::new(),
            ty: OnceLock::new(),
        }
    }

    /// Type computed by analysis.
    pub fn ty(&self) -> Option<&Ty> {
        self.ty.get()
    }

    pub fn set_ty(&self, ty: Ty) {
        let _ = self.ty.set(ty);
    }

    /// Resolution recorded by analysis, if any.
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.get()
    }

    /// Record the resolution. The first recorded value wins.
    pub fn resolve(&self, resolution: Resolution) {
        let _ = self.resolution.set(resolution);
    }

    /// The literal value, when this expression is a literal.
    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal(Literal),
    Name(String),
    This,
    Field {
        target: Box<Expr>,
        name: Ident,
    },
    Call {
        target: Option<Box<Expr>>,
        name: Ident,
        args: Vec<Expr>,
    },
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },
    NewArray {
        elem: TypeRef,
        len: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

// ── Visitor ─────────────────────────────────────────────────────────

/// Read-only tree walk. Override the hooks of interest and call the
/// matching `walk_*` function to continue into children.
pub trait Visitor {
    fn visit_class(&mut self, class: &ClassDecl) {
        walk_class(self, class);
    }

    fn visit_field(&mut self, field: &FieldDecl) {
        if let Some(init) = &field.init {
            self.visit_expr(init);
        }
    }

    fn visit_method(&mut self, method: &MethodDecl) {
        walk_block(self, &method.body);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_class<V: Visitor + ?Sized>(visitor: &mut V, class: &ClassDecl) {
    for member in &class.members {
        match member {
            Member::Field(field) => visitor.visit_field(field),
            Member::Method(method) => visitor.visit_method(method),
            Member::Class(nested) => visitor.visit_class(nested),
        }
    }
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &Block) {
    for stmt in &block.stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Block(block) => walk_block(visitor, block),
        StmtKind::Local { init, .. } => {
            if let Some(init) = init {
                visitor.visit_expr(init);
            }
        }
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            visitor.visit_expr(cond);
            visitor.visit_stmt(then);
            if let Some(otherwise) = otherwise {
                visitor.visit_stmt(otherwise);
            }
        }
        StmtKind::While { cond, body } => {
            visitor.visit_expr(cond);
            visitor.visit_stmt(body);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(cond) = cond {
                visitor.visit_expr(cond);
            }
            if let Some(update) = update {
                visitor.visit_expr(update);
            }
            visitor.visit_stmt(body);
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        StmtKind::Throw(value) | StmtKind::Expr(value) => visitor.visit_expr(value),
        StmtKind::Synchronized { lock, body } => {
            visitor.visit_expr(lock);
            walk_block(visitor, body);
        }
        StmtKind::Empty => {}
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Name(_) | ExprKind::This => {}
        ExprKind::Field { target, .. } => visitor.visit_expr(target),
        ExprKind::Call { target, args, .. } => {
            if let Some(target) = target {
                visitor.visit_expr(target);
            }
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        ExprKind::New { args, .. } => {
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        ExprKind::NewArray { len, .. } => visitor.visit_expr(len),
        ExprKind::Index { target, index } => {
            visitor.visit_expr(target);
            visitor.visit_expr(index);
        }
        ExprKind::Unary { operand, .. } => visitor.visit_expr(operand),
        ExprKind::Binary { lhs, rhs, .. } => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
        ExprKind::Assign { target, value } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
    }
}
