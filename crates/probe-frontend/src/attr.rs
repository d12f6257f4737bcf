//! Attribution: resolves names and types in class bodies, checks them, and
//! records the results on the tree. Also runs the `deprecation` and
//! `empty` lints.

use std::sync::Arc;

use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::error::FrontendResult;
use crate::options::{LanguageLevel, LintCategory};
use crate::session::Session;
use crate::symbols::{qualified_of, FieldSig, MethodSig, SymbolOrigin, Ty, ERROR, OBJECT};

struct LocalVar {
    name: String,
    ty: Ty,
    slot: u16,
}

/// What an expression denotes before it is used as a value.
enum Operand {
    Value(Ty),
    /// A class, by binary name.
    Type(String),
    /// A dotted prefix that names no variable or type (yet).
    Package(Vec<String>),
}

pub(crate) struct Attr<'s, 'a> {
    s: &'s mut Session<'a>,
    tree: Arc<UnitTree>,
    /// Enclosing classes by binary name, outermost first.
    classes: Vec<String>,
    is_static: bool,
    scopes: Vec<Vec<LocalVar>>,
    /// Next free local slot; may run past the last one a method can use.
    next_slot: u32,
    ret: Ty,
    method_label: String,
}

impl<'s, 'a> Attr<'s, 'a> {
    fn new(s: &'s mut Session<'a>, unit: usize) -> Self {
        let tree = Arc::clone(&s.sources[unit].tree);
        Self {
            s,
            tree,
            classes: Vec::new(),
            is_static: true,
            scopes: Vec::new(),
            next_slot: 0,
            ret: Ty::Void,
            method_label: String::new(),
        }
    }

    /// Attribute the top-level declaration `decl` of source `unit`.
    pub(crate) fn attribute_top(
        s: &'s mut Session<'a>,
        unit: usize,
        decl: DeclId,
    ) -> FrontendResult<()> {
        let mut attr = Self::new(s, unit);
        let tree = Arc::clone(&attr.tree);
        let Some(class) = tree.find_type(decl) else {
            return Ok(());
        };
        let binary = match tree.package_name() {
            Some(pkg) => format!("{pkg}.{}", class.name.name),
            None => class.name.name.clone(),
        };
        if tree.types.first().map(|t| t.id) == Some(decl) {
            attr.check_imports()?;
        }
        if attr.owns(&binary, class.id) {
            attr.attribute_class(class, &binary)?;
        }
        Ok(())
    }

    /// Whether the symbol `binary` was entered from declaration `id`.
    fn owns(&self, binary: &str, id: DeclId) -> bool {
        matches!(
            self.s.symbols.get(binary).map(|c| c.origin),
            Some(SymbolOrigin::Source { decl, .. }) if decl == id
        )
    }

    fn check_imports(&mut self) -> FrontendResult<()> {
        let tree = Arc::clone(&self.tree);
        for import in tree.imports.iter().filter(|i| !i.wildcard) {
            let qualified = import.path.to_string();
            if self.lookup_qualified(&qualified)?.is_none() {
                let segments = &import.path.segments;
                let package = &segments[..segments.len().saturating_sub(1)];
                self.error(
                    import.path.span,
                    format!(
                        "cannot find symbol: class {} in package {}",
                        import.path.last(),
                        package.join(".")
                    ),
                );
            }
        }
        Ok(())
    }

    // ── Diagnostics ────────────────────────────────────────────────

    fn error(&mut self, span: Span, message: impl Into<String>) {
        let source = self.tree.source_name.clone();
        self.s.error(&source, span, message);
    }

    fn lint(&mut self, category: LintCategory, span: Span, message: impl Into<String>) {
        let diagnostic = Diagnostic::warning(message)
            .at(self.tree.source_name.clone(), span.line, span.col)
            .with_lint(category);
        self.s.log.report(diagnostic);
    }

    fn check_deprecated(&mut self, binary: &str, span: Span) {
        let Some(class) = self.s.symbols.get(binary) else {
            return;
        };
        if !class.deprecated {
            return;
        }
        let outermost = |name: &str| name.split('$').next().unwrap_or(name).to_string();
        if self.classes.first().map(|c| outermost(c)) == Some(outermost(binary)) {
            return;
        }
        if self.s.options.lint_enabled(LintCategory::Deprecation) {
            let location = match &class.package {
                Some(pkg) => pkg.clone(),
                None => "unnamed package".to_string(),
            };
            let message = format!("{} in {location} has been deprecated", class.simple_name);
            self.lint(LintCategory::Deprecation, span, message);
        } else {
            self.s.deprecated_uses.insert(self.tree.source_name.clone());
        }
    }

    // ── Class completion ───────────────────────────────────────────

    /// Resolve the superclass and member signatures of a source class.
    fn complete(&mut self, binary: &str) -> FrontendResult<()> {
        let Some(class) = self.s.symbols.get_mut(binary) else {
            return Ok(());
        };
        if class.completed {
            return Ok(());
        }
        class.completed = true;
        let SymbolOrigin::Source { unit, decl } = class.origin else {
            return Ok(());
        };

        let mut chain = vec![binary.to_string()];
        while let Some(outer) = chain
            .last()
            .and_then(|name| self.s.symbols.get(name))
            .and_then(|c| c.outer.clone())
        {
            chain.push(outer);
        }
        chain.reverse();

        let mut sub = Attr::new(&mut *self.s, unit);
        sub.classes = chain;
        let tree = Arc::clone(&sub.tree);
        if let Some(class_decl) = find_decl(&tree.types, decl) {
            sub.complete_members(class_decl, binary)?;
        }
        Ok(())
    }

    fn complete_members(&mut self, decl: &ClassDecl, binary: &str) -> FrontendResult<()> {
        let qualified = qualified_of(binary);

        let mut superclass = OBJECT.to_string();
        if let Some(extends) = &decl.extends {
            match self.resolve_type_ref(extends)? {
                Ty::Class(sup) => {
                    let chain = self.load_chain(&sup)?;
                    if chain.iter().any(|c| c == binary) {
                        self.error(extends.span, format!("cyclic inheritance involving {qualified}"));
                    } else {
                        superclass = sup;
                    }
                }
                Ty::Unknown => {}
                other => self.error(extends.span, format!("unexpected type: required class, found {other}")),
            }
        }

        let mut fields: Vec<FieldSig> = Vec::new();
        for field in decl.fields() {
            let ty = self.resolve_type_ref(&field.ty)?;
            if fields.iter().any(|f| f.name == field.name.name) {
                self.error(
                    field.name.span,
                    format!("variable {} is already defined in class {qualified}", field.name.name),
                );
            }
            fields.push(FieldSig {
                name: field.name.name.clone(),
                ty,
                is_static: field.modifiers.has(Modifier::Static),
            });
        }

        let mut methods: Vec<MethodSig> = Vec::new();
        for method in decl.methods() {
            let ret = self.resolve_type_ref(&method.ret)?;
            let mut params = Vec::with_capacity(method.params.len());
            for param in &method.params {
                params.push(self.resolve_type_ref(&param.ty)?);
            }
            if methods
                .iter()
                .any(|m| m.name == method.name.name && m.params == params)
            {
                self.error(
                    method.name.span,
                    format!(
                        "method {}({}) is already defined in class {qualified}",
                        method.name.name,
                        join_types(&params)
                    ),
                );
            }
            methods.push(MethodSig {
                name: method.name.name.clone(),
                params,
                ret,
                is_static: method.modifiers.has(Modifier::Static),
            });
        }

        if let Some(class) = self.s.symbols.get_mut(binary) {
            class.superclass = Some(superclass);
            class.fields = fields;
            class.methods = methods;
        }
        Ok(())
    }

    /// Load and complete `binary` and its superclasses; returns the chain.
    fn load_chain(&mut self, binary: &str) -> FrontendResult<Vec<String>> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = Some(binary.to_string());
        while let Some(name) = current {
            if chain.contains(&name) || !self.s.find_class(&name)? {
                break;
            }
            self.complete(&name)?;
            current = self.s.symbols.get(&name).and_then(|c| c.superclass.clone());
            chain.push(name);
        }
        Ok(chain)
    }

    // ── Type resolution ────────────────────────────────────────────

    fn resolve_type_ref(&mut self, ty: &TypeRef) -> FrontendResult<Ty> {
        let mut resolved = match &ty.kind {
            TypeKind::Void => Ty::Void,
            TypeKind::Int => Ty::Int,
            TypeKind::Long => Ty::Long,
            TypeKind::Boolean => Ty::Boolean,
            TypeKind::Named(path) => match self.resolve_path(path)? {
                Some(binary) => {
                    self.check_deprecated(&binary, path.span);
                    Ty::Class(binary)
                }
                None => {
                    self.error(path.span, format!("cannot find symbol: class {path}"));
                    Ty::Unknown
                }
            },
        };
        if resolved != Ty::Unknown {
            for _ in 0..ty.dims {
                resolved = Ty::Array(Box::new(resolved));
            }
        }
        Ok(resolved)
    }

    fn resolve_path(&mut self, path: &Path) -> FrontendResult<Option<String>> {
        let segments = &path.segments;
        let Some(first) = segments.first() else {
            return Ok(None);
        };

        let (mut binary, rest) = match self.resolve_simple(first)? {
            Some(binary) => (binary, &segments[1..]),
            None => {
                let mut found = None;
                for end in 2..=segments.len() {
                    let qualified = segments[..end].join(".");
                    if self.s.find_class(&qualified)? {
                        found = Some((qualified, &segments[end..]));
                        break;
                    }
                }
                match found {
                    Some(found) => found,
                    None => return Ok(None),
                }
            }
        };
        for segment in rest {
            match self.member_type(&binary, segment)? {
                Some(nested) => binary = nested,
                None => return Ok(None),
            }
        }
        Ok(Some(binary))
    }

    /// Simple type name lookup: member types of the enclosing classes,
    /// single-type imports, the current package, built-ins, then wildcard
    /// imports.
    fn resolve_simple(&mut self, name: &str) -> FrontendResult<Option<String>> {
        for class in self.classes.clone().iter().rev() {
            if let Some(found) = self.member_type(class, name)? {
                return Ok(Some(found));
            }
        }

        let tree = Arc::clone(&self.tree);
        for import in tree.imports.iter().filter(|i| !i.wildcard) {
            if import.path.last() == name {
                if let Some(found) = self.lookup_qualified(&import.path.to_string())? {
                    return Ok(Some(found));
                }
            }
        }

        let local = match tree.package_name() {
            Some(pkg) => format!("{pkg}.{name}"),
            None => name.to_string(),
        };
        if self.s.find_class(&local)? {
            return Ok(Some(local));
        }

        if let Some(builtin) = self.s.symbols.builtin(name) {
            return Ok(Some(builtin.binary_name.clone()));
        }

        for import in tree.imports.iter().filter(|i| i.wildcard) {
            let candidate = format!("{}.{name}", import.path);
            if let Some(found) = self.lookup_qualified(&candidate)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Resolve a fully qualified name, which may name a nested class.
    fn lookup_qualified(&mut self, qualified: &str) -> FrontendResult<Option<String>> {
        if self.s.find_class(qualified)? {
            return Ok(Some(qualified.to_string()));
        }
        match qualified.rsplit_once('.') {
            Some((prefix, last)) => match self.lookup_qualified(prefix)? {
                Some(outer) => self.member_type(&outer, last),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Member class `simple` of `binary` or of one of its superclasses.
    fn member_type(&mut self, binary: &str, simple: &str) -> FrontendResult<Option<String>> {
        for class in self.load_chain(binary)? {
            let nested = self
                .s
                .symbols
                .get(&class)
                .and_then(|c| c.member_types.get(simple).cloned());
            if let Some(nested) = nested {
                if self.s.find_class(&nested)? {
                    return Ok(Some(nested));
                }
            }
        }
        Ok(None)
    }

    fn assignable(&mut self, from: &Ty, to: &Ty) -> FrontendResult<bool> {
        let ok = match (from, to) {
            _ if from == to => true,
            (Ty::Unknown, _) | (_, Ty::Unknown) => true,
            (Ty::Null, to) => to.is_reference(),
            (Ty::Int, Ty::Long) | (Ty::Char, Ty::Int) | (Ty::Char, Ty::Long) => true,
            (Ty::Class(sub), Ty::Class(sup)) => {
                let chain = self.load_chain(sub)?;
                sup == OBJECT || chain.iter().any(|c| c == sup)
            }
            (Ty::Array(_), Ty::Class(sup)) => sup == OBJECT,
            (Ty::Array(a), Ty::Array(b)) => a.is_reference() && self.assignable(a, b)?,
            _ => false,
        };
        Ok(ok)
    }

    fn require_assignable(&mut self, from: &Ty, to: &Ty, span: Span) -> FrontendResult<()> {
        if !self.assignable(from, to)? {
            self.error(span, format!("incompatible types: {from} cannot be converted to {to}"));
        }
        Ok(())
    }

    // ── Declarations ───────────────────────────────────────────────

    fn attribute_class(&mut self, decl: &ClassDecl, binary: &str) -> FrontendResult<()> {
        self.classes.push(binary.to_string());
        self.complete(binary)?;
        let (fields, methods) = match self.s.symbols.get(binary) {
            Some(class) => (class.fields.clone(), class.methods.clone()),
            None => (Vec::new(), Vec::new()),
        };

        let mut method_index = 0;
        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    let ty = fields
                        .iter()
                        .find(|f| f.name == field.name.name)
                        .map(|f| f.ty.clone())
                        .unwrap_or(Ty::Unknown);
                    self.attribute_field(field, &ty)?;
                }
                Member::Method(method) => {
                    if let Some(sig) = methods.get(method_index) {
                        self.attribute_method(method, sig)?;
                    }
                    method_index += 1;
                }
                Member::Class(nested) => {
                    let nested_binary = format!("{binary}${}", nested.name.name);
                    if self.owns(&nested_binary, nested.id) {
                        self.attribute_class(nested, &nested_binary)?;
                    }
                }
            }
        }

        self.classes.pop();
        Ok(())
    }

    fn attribute_field(&mut self, field: &FieldDecl, ty: &Ty) -> FrontendResult<()> {
        let Some(init) = &field.init else {
            return Ok(());
        };
        self.is_static = field.modifiers.has(Modifier::Static);
        self.scopes = vec![Vec::new()];
        self.next_slot = if self.is_static { 0 } else { 1 };
        let value = self.value(init)?;
        self.require_assignable(&value, ty, init.span)
    }

    fn attribute_method(&mut self, method: &MethodDecl, sig: &MethodSig) -> FrontendResult<()> {
        self.is_static = sig.is_static;
        self.scopes = vec![Vec::new()];
        self.next_slot = if self.is_static { 0 } else { 1 };
        self.ret = sig.ret.clone();
        self.method_label = format!("{}({})", method.name.name, join_types(&sig.params));

        for (param, ty) in method.params.iter().zip(&sig.params) {
            self.declare_local(&param.name, ty.clone());
        }
        self.attribute_block(&method.body)?;

        if sig.ret != Ty::Void && block_completes(&method.body) {
            self.error(method.span, "missing return statement");
        }
        Ok(())
    }

    fn declare_local(&mut self, name: &Ident, ty: Ty) -> u16 {
        let taken = self
            .scopes
            .iter()
            .flatten()
            .any(|local| local.name == name.name);
        if taken {
            let message = format!(
                "variable {} is already defined in method {}",
                name.name, self.method_label
            );
            self.error(name.span, message);
        }
        // The last slot stays free so the slot count itself fits in 16 bits.
        let slot = match u16::try_from(self.next_slot) {
            Ok(slot) if slot < u16::MAX => slot,
            _ => {
                if self.next_slot == u32::from(u16::MAX) {
                    let message =
                        format!("too many local variables in method {}", self.method_label);
                    self.error(name.span, message);
                }
                u16::MAX
            }
        };
        self.next_slot = self.next_slot.saturating_add(1);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(LocalVar {
                name: name.name.clone(),
                ty,
                slot,
            });
        }
        slot
    }

    fn lookup_local(&self, name: &str) -> Option<(u16, Ty)> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|local| local.name == name)
            .map(|local| (local.slot, local.ty.clone()))
    }

    // ── Statements ─────────────────────────────────────────────────

    fn attribute_block(&mut self, block: &Block) -> FrontendResult<()> {
        self.scopes.push(Vec::new());
        for stmt in &block.stmts {
            self.attribute_stmt(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn attribute_stmt(&mut self, stmt: &Stmt) -> FrontendResult<()> {
        match &stmt.kind {
            StmtKind::Block(block) => self.attribute_block(block)?,
            StmtKind::Local {
                ty,
                name,
                init,
                slot,
            } => {
                let local_ty = self.resolve_type_ref(ty)?;
                if let Some(init) = init {
                    let value = self.value(init)?;
                    self.require_assignable(&value, &local_ty, init.span)?;
                }
                let assigned = self.declare_local(name, local_ty);
                let _ = slot.set(assigned);
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.condition(cond)?;
                self.check_empty_body(then, "if");
                self.attribute_stmt(then)?;
                if let Some(otherwise) = otherwise {
                    self.attribute_stmt(otherwise)?;
                }
            }
            StmtKind::While { cond, body } => {
                self.condition(cond)?;
                self.check_empty_body(body, "while");
                self.attribute_stmt(body)?;
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if self.s.options.source() < LanguageLevel::V2 {
                    let level = self.s.options.source();
                    self.error(
                        stmt.span,
                        format!("for statements are not supported in -source {level}"),
                    );
                }
                self.scopes.push(Vec::new());
                if let Some(init) = init {
                    self.attribute_stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.condition(cond)?;
                }
                if let Some(update) = update {
                    self.value(update)?;
                }
                self.check_empty_body(body, "for");
                self.attribute_stmt(body)?;
                self.scopes.pop();
            }
            StmtKind::Return(value) => match (value, self.ret == Ty::Void) {
                (Some(value), true) => {
                    self.value(value)?;
                    self.error(value.span, "incompatible types: unexpected return value");
                }
                (Some(value), false) => {
                    let ty = self.value(value)?;
                    let ret = self.ret.clone();
                    self.require_assignable(&ty, &ret, value.span)?;
                }
                (None, false) => self.error(stmt.span, "missing return value"),
                (None, true) => {}
            },
            StmtKind::Throw(value) => {
                let ty = self.value(value)?;
                let error = Ty::Class(ERROR.to_string());
                if !self.assignable(&ty, &error)? {
                    self.error(
                        value.span,
                        format!("incompatible types: {ty} cannot be converted to {error}"),
                    );
                }
            }
            StmtKind::Synchronized { lock, body } => {
                let ty = self.value(lock)?;
                if !ty.is_reference() && ty != Ty::Unknown {
                    self.error(
                        lock.span,
                        format!("unexpected type: required reference, found {ty}"),
                    );
                }
                self.attribute_block(body)?;
            }
            StmtKind::Expr(expr) => {
                if !matches!(
                    expr.kind,
                    ExprKind::Assign { .. } | ExprKind::Call { .. } | ExprKind::New { .. }
                ) {
                    self.error(expr.span, "not a statement");
                }
                self.value(expr)?;
            }
            StmtKind::Empty => {}
        }
        Ok(())
    }

    fn condition(&mut self, cond: &Expr) -> FrontendResult<()> {
        let ty = self.value(cond)?;
        self.require_assignable(&ty, &Ty::Boolean, cond.span)
    }

    fn check_empty_body(&mut self, body: &Stmt, keyword: &str) {
        if matches!(body.kind, StmtKind::Empty) && self.s.options.lint_enabled(LintCategory::Empty) {
            self.lint(
                LintCategory::Empty,
                body.span,
                format!("empty statement after {keyword}"),
            );
        }
    }

    // ── Expressions ────────────────────────────────────────────────

    /// Attribute an expression used as a value.
    fn value(&mut self, expr: &Expr) -> FrontendResult<Ty> {
        let ty = match self.operand(expr)? {
            Operand::Value(ty) => ty,
            Operand::Type(binary) => {
                let simple = qualified_of(&binary);
                let simple = simple.rsplit('.').next().unwrap_or(&simple).to_string();
                self.error(expr.span, format!("cannot find symbol: variable {simple}"));
                Ty::Unknown
            }
            Operand::Package(segments) => {
                let message = match segments.as_slice() {
                    [single] => format!("cannot find symbol: variable {single}"),
                    _ => format!(
                        "package {} does not exist",
                        segments[..segments.len() - 1].join(".")
                    ),
                };
                self.error(expr.span, message);
                Ty::Unknown
            }
        };
        expr.set_ty(ty.clone());
        Ok(ty)
    }

    fn operand(&mut self, expr: &Expr) -> FrontendResult<Operand> {
        let operand = match &expr.kind {
            ExprKind::Literal(literal) => Operand::Value(match literal {
                Literal::Int(_) => Ty::Int,
                Literal::Long(_) => Ty::Long,
                Literal::Bool(_) => Ty::Boolean,
                Literal::Char(_) => Ty::Char,
                Literal::String(_) => Ty::string(),
                Literal::Null => Ty::Null,
            }),
            ExprKind::Name(name) => self.name(expr, name)?,
            ExprKind::This => {
                if self.is_static {
                    self.error(
                        expr.span,
                        "non-static variable this cannot be referenced from a static context",
                    );
                }
                let current = self.classes.last().cloned().unwrap_or_else(|| OBJECT.to_string());
                Operand::Value(Ty::Class(current))
            }
            ExprKind::Field { target, name } => self.field(expr, target, name)?,
            ExprKind::Call { target, name, args } => {
                Operand::Value(self.call(expr, target.as_deref(), name, args)?)
            }
            ExprKind::New { ty, args } => {
                for arg in args {
                    self.value(arg)?;
                }
                match self.resolve_type_ref(ty)? {
                    Ty::Class(binary) => {
                        if !args.is_empty() {
                            let simple = self
                                .s
                                .symbols
                                .get(&binary)
                                .map(|c| c.simple_name.clone())
                                .unwrap_or_default();
                            self.error(
                                expr.span,
                                format!(
                                    "constructor {simple} in class {} cannot be applied to given types",
                                    qualified_of(&binary)
                                ),
                            );
                        }
                        expr.resolve(Resolution::Class(binary.clone()));
                        Operand::Value(Ty::Class(binary))
                    }
                    _ => Operand::Value(Ty::Unknown),
                }
            }
            ExprKind::NewArray { elem, len } => {
                let len_ty = self.value(len)?;
                if !matches!(len_ty, Ty::Int | Ty::Char | Ty::Unknown) {
                    self.error(
                        len.span,
                        format!("incompatible types: {len_ty} cannot be converted to int"),
                    );
                }
                match self.resolve_type_ref(elem)? {
                    Ty::Unknown => Operand::Value(Ty::Unknown),
                    elem => Operand::Value(Ty::Array(Box::new(elem))),
                }
            }
            ExprKind::Index { target, index } => {
                let target_ty = self.value(target)?;
                let index_ty = self.value(index)?;
                if !matches!(index_ty, Ty::Int | Ty::Char | Ty::Unknown) {
                    self.error(
                        index.span,
                        format!("incompatible types: {index_ty} cannot be converted to int"),
                    );
                }
                Operand::Value(match target_ty {
                    Ty::Array(elem) => *elem,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.error(target.span, format!("array required, but {other} found"));
                        Ty::Unknown
                    }
                })
            }
            ExprKind::Unary { op, operand } => {
                let ty = self.value(operand)?;
                Operand::Value(match (op, &ty) {
                    (_, Ty::Unknown) => Ty::Unknown,
                    (UnaryOp::Not, Ty::Boolean) => Ty::Boolean,
                    (UnaryOp::Neg, Ty::Long) => Ty::Long,
                    (UnaryOp::Neg, Ty::Int | Ty::Char) => Ty::Int,
                    (op, ty) => {
                        let symbol = if *op == UnaryOp::Not { "!" } else { "-" };
                        self.error(
                            expr.span,
                            format!("bad operand type {ty} for unary operator '{symbol}'"),
                        );
                        Ty::Unknown
                    }
                })
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.value(lhs)?;
                let right = self.value(rhs)?;
                Operand::Value(self.binary(expr, *op, &left, &right)?)
            }
            ExprKind::Assign { target, value } => {
                let target_ty = self.value(target)?;
                let is_variable = match &target.kind {
                    ExprKind::Index { .. } => true,
                    _ => matches!(
                        target.resolution(),
                        Some(Resolution::Local(_) | Resolution::Field { .. })
                    ),
                };
                if !is_variable && target_ty != Ty::Unknown {
                    self.error(target.span, "unexpected type: required variable, found value");
                }
                let value_ty = self.value(value)?;
                self.require_assignable(&value_ty, &target_ty, value.span)?;
                Operand::Value(target_ty)
            }
        };
        Ok(operand)
    }

    fn name(&mut self, expr: &Expr, name: &str) -> FrontendResult<Operand> {
        if let Some((slot, ty)) = self.lookup_local(name) {
            expr.resolve(Resolution::Local(slot));
            return Ok(Operand::Value(ty));
        }

        let innermost = self.classes.len().saturating_sub(1);
        for (depth, class) in self.classes.clone().iter().enumerate().rev() {
            self.load_chain(class)?;
            if let Some((owner, field)) = self.s.symbols.find_field(class, name) {
                if !field.is_static && (self.is_static || depth != innermost) {
                    self.error(
                        expr.span,
                        format!("non-static variable {name} cannot be referenced from a static context"),
                    );
                }
                expr.resolve(Resolution::Field {
                    owner,
                    is_static: field.is_static,
                    descriptor: field.ty.descriptor(),
                });
                return Ok(Operand::Value(field.ty));
            }
        }

        if let Some(binary) = self.resolve_simple(name)? {
            self.check_deprecated(&binary, expr.span);
            expr.resolve(Resolution::Type(binary.clone()));
            return Ok(Operand::Type(binary));
        }
        Ok(Operand::Package(vec![name.to_string()]))
    }

    fn field(&mut self, expr: &Expr, target: &Expr, name: &Ident) -> FrontendResult<Operand> {
        let operand = match self.operand(target)? {
            Operand::Value(ty) => {
                target.set_ty(ty.clone());
                match ty {
                    Ty::Array(_) if name.name == "length" => Operand::Value(Ty::Int),
                    Ty::Class(owner) => {
                        self.load_chain(&owner)?;
                        match self.s.symbols.find_field(&owner, &name.name) {
                            Some((declaring, field)) => {
                                expr.resolve(Resolution::Field {
                                    owner: declaring,
                                    is_static: field.is_static,
                                    descriptor: field.ty.descriptor(),
                                });
                                Operand::Value(field.ty)
                            }
                            None => {
                                self.error(
                                    name.span,
                                    format!(
                                        "cannot find symbol: variable {} in class {}",
                                        name.name,
                                        qualified_of(&owner)
                                    ),
                                );
                                Operand::Value(Ty::Unknown)
                            }
                        }
                    }
                    Ty::Unknown => Operand::Value(Ty::Unknown),
                    other => {
                        self.error(target.span, format!("{other} cannot be dereferenced"));
                        Operand::Value(Ty::Unknown)
                    }
                }
            }
            Operand::Type(owner) => {
                self.load_chain(&owner)?;
                if let Some((declaring, field)) = self.s.symbols.find_field(&owner, &name.name) {
                    if !field.is_static {
                        self.error(
                            name.span,
                            format!(
                                "non-static variable {} cannot be referenced from a static context",
                                name.name
                            ),
                        );
                    }
                    expr.resolve(Resolution::Field {
                        owner: declaring,
                        is_static: field.is_static,
                        descriptor: field.ty.descriptor(),
                    });
                    Operand::Value(field.ty)
                } else if let Some(nested) = self.member_type(&owner, &name.name)? {
                    self.check_deprecated(&nested, name.span);
                    expr.resolve(Resolution::Type(nested.clone()));
                    Operand::Type(nested)
                } else {
                    self.error(
                        name.span,
                        format!(
                            "cannot find symbol: variable {} in class {}",
                            name.name,
                            qualified_of(&owner)
                        ),
                    );
                    Operand::Value(Ty::Unknown)
                }
            }
            Operand::Package(mut segments) => {
                segments.push(name.name.clone());
                let qualified = segments.join(".");
                if self.s.find_class(&qualified)? {
                    self.check_deprecated(&qualified, name.span);
                    expr.resolve(Resolution::Type(qualified.clone()));
                    Operand::Type(qualified)
                } else {
                    Operand::Package(segments)
                }
            }
        };
        Ok(operand)
    }

    fn call(
        &mut self,
        expr: &Expr,
        target: Option<&Expr>,
        name: &Ident,
        args: &[Expr],
    ) -> FrontendResult<Ty> {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.value(arg)?);
        }

        // (candidate owner, static-only receiver, receiver is an enclosing class)
        let (owner, static_only, outer) = match target {
            None => {
                let innermost = self.classes.len().saturating_sub(1);
                let mut found = None;
                for (depth, class) in self.classes.clone().iter().enumerate().rev() {
                    self.load_chain(class)?;
                    if !self.s.symbols.find_methods(class, &name.name).is_empty() {
                        found = Some((class.clone(), self.is_static, depth != innermost));
                        break;
                    }
                }
                match found {
                    Some(found) => found,
                    None => {
                        self.error(
                            name.span,
                            format!(
                                "cannot find symbol: method {}({})",
                                name.name,
                                join_types(&arg_types)
                            ),
                        );
                        return Ok(Ty::Unknown);
                    }
                }
            }
            Some(target) => match self.operand(target)? {
                Operand::Value(ty) => {
                    target.set_ty(ty.clone());
                    match ty {
                        Ty::Class(owner) => (owner, false, false),
                        Ty::Unknown => return Ok(Ty::Unknown),
                        other => {
                            self.error(target.span, format!("{other} cannot be dereferenced"));
                            return Ok(Ty::Unknown);
                        }
                    }
                }
                Operand::Type(owner) => (owner, true, false),
                Operand::Package(segments) => {
                    let message = match segments.as_slice() {
                        [single] => format!("cannot find symbol: variable {single}"),
                        _ => format!(
                            "package {} does not exist",
                            segments[..segments.len() - 1].join(".")
                        ),
                    };
                    self.error(target.span, message);
                    return Ok(Ty::Unknown);
                }
            },
        };

        self.load_chain(&owner)?;
        let candidates = self.s.symbols.find_methods(&owner, &name.name);
        if candidates.is_empty() {
            self.error(
                name.span,
                format!(
                    "cannot find symbol: method {}({}) in class {}",
                    name.name,
                    join_types(&arg_types),
                    qualified_of(&owner)
                ),
            );
            return Ok(Ty::Unknown);
        }

        let mut selected = None;
        for (declaring, sig) in &candidates {
            if sig.params.len() != arg_types.len() {
                continue;
            }
            let mut applicable = true;
            for (arg, param) in arg_types.iter().zip(&sig.params) {
                if !self.assignable(arg, param)? {
                    applicable = false;
                    break;
                }
            }
            if applicable {
                selected = Some((declaring.clone(), sig.clone()));
                break;
            }
        }
        let Some((declaring, sig)) = selected else {
            self.error(
                name.span,
                format!(
                    "method {} in class {} cannot be applied to given types",
                    name.name,
                    qualified_of(&owner)
                ),
            );
            return Ok(Ty::Unknown);
        };

        if !sig.is_static && (static_only || outer) {
            self.error(
                name.span,
                format!(
                    "non-static method {}({}) cannot be referenced from a static context",
                    name.name,
                    join_types(&sig.params)
                ),
            );
        }
        expr.resolve(Resolution::Method {
            owner: declaring,
            is_static: sig.is_static,
            descriptor: sig.descriptor(),
        });
        Ok(sig.ret)
    }

    fn binary(&mut self, expr: &Expr, op: BinaryOp, left: &Ty, right: &Ty) -> FrontendResult<Ty> {
        if *left == Ty::Unknown || *right == Ty::Unknown {
            return Ok(match op {
                BinaryOp::Add if left.is_string() || right.is_string() => Ty::string(),
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                    Ty::Unknown
                }
                _ => Ty::Boolean,
            });
        }

        let numeric = || {
            if *left == Ty::Long || *right == Ty::Long {
                Ty::Long
            } else {
                Ty::Int
            }
        };
        let result = match op {
            BinaryOp::Add if (left.is_string() || right.is_string())
                && *left != Ty::Void
                && *right != Ty::Void =>
            {
                Some(Ty::string())
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                (left.is_numeric() && right.is_numeric()).then(numeric)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                (left.is_numeric() && right.is_numeric()).then_some(Ty::Boolean)
            }
            BinaryOp::And | BinaryOp::Or => {
                (*left == Ty::Boolean && *right == Ty::Boolean).then_some(Ty::Boolean)
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let comparable = (left.is_numeric() && right.is_numeric())
                    || (*left == Ty::Boolean && *right == Ty::Boolean)
                    || (left.is_reference()
                        && right.is_reference()
                        && (self.assignable(left, right)? || self.assignable(right, left)?));
                if !comparable {
                    self.error(expr.span, format!("incomparable types: {left} and {right}"));
                }
                Some(Ty::Boolean)
            }
        };

        Ok(match result {
            Some(ty) => ty,
            None => {
                self.error(
                    expr.span,
                    format!(
                        "bad operand types for binary operator '{}': {left} and {right}",
                        op.symbol()
                    ),
                );
                Ty::Unknown
            }
        })
    }
}

fn find_decl(decls: &[ClassDecl], id: DeclId) -> Option<&ClassDecl> {
    decls.iter().find_map(|decl| {
        if decl.id == id {
            return Some(decl);
        }
        decl.nested().find_map(|n| find_decl(std::slice::from_ref(n), id))
    })
}

fn join_types(types: &[Ty]) -> String {
    types
        .iter()
        .map(Ty::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn is_true(expr: &Expr) -> bool {
    matches!(expr.as_literal(), Some(Literal::Bool(true)))
}

fn stmt_completes(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Throw(_) => false,
        StmtKind::Block(block) => block_completes(block),
        StmtKind::If {
            then,
            otherwise: Some(otherwise),
            ..
        } => stmt_completes(then) || stmt_completes(otherwise),
        StmtKind::While { cond, .. } => !is_true(cond),
        StmtKind::For { cond, .. } => cond.as_ref().is_some_and(|c| !is_true(c)),
        StmtKind::Synchronized { body, .. } => block_completes(body),
        _ => true,
    }
}

/// Whether control can reach the end of the block.
fn block_completes(block: &Block) -> bool {
    block.stmts.iter().all(stmt_completes)
}
