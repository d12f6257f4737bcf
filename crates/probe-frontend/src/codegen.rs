//! Code generation: lowers attributed class declarations to artifacts.
//!
//! Method bodies compile to a small stack code. Every instruction is one
//! opcode byte followed by fixed-width big-endian operands:
//!
//! | operand        | used by                                               |
//! |----------------|-------------------------------------------------------|
//! | `i32`          | `PushInt`                                             |
//! | `i64`          | `PushLong`                                            |
//! | `u16` slot     | `Load`, `Store`                                       |
//! | `u16` constant | `PushConst`, field and invoke instructions, `New`, `NewArray` |
//! | `u32` pc       | `Jump`, `JumpIfFalse`, `JumpIfTrue`                   |
//!
//! Field references are pooled as `Owner.name:descriptor`, method
//! references as `Owner.name(params)ret`.

use tracing::trace;

use crate::artifact::{
    ClassFile, ConstantPool, FieldInfo, MethodInfo, ACC_DEPRECATED, ACC_FINAL, ACC_PRIVATE,
    ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC,
};
use crate::ast::*;
use crate::error::{FrontendError, FrontendResult};
use crate::options::{DebugInfo, Options};
use crate::symbols::{FieldSig, SymbolTable, Ty, OBJECT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    PushInt = 0x01,
    PushLong = 0x02,
    PushConst = 0x03,
    PushNull = 0x04,
    Load = 0x10,
    Store = 0x11,
    GetField = 0x20,
    PutField = 0x21,
    GetStatic = 0x22,
    PutStatic = 0x23,
    Invoke = 0x30,
    InvokeStatic = 0x31,
    New = 0x40,
    NewArray = 0x41,
    ArrayLoad = 0x42,
    ArrayStore = 0x43,
    ArrayLength = 0x44,
    Neg = 0x50,
    Not = 0x51,
    Add = 0x52,
    Sub = 0x53,
    Mul = 0x54,
    Div = 0x55,
    Rem = 0x56,
    CmpEq = 0x60,
    CmpNe = 0x61,
    CmpLt = 0x62,
    CmpLe = 0x63,
    CmpGt = 0x64,
    CmpGe = 0x65,
    Concat = 0x66,
    Jump = 0x70,
    JumpIfFalse = 0x71,
    JumpIfTrue = 0x72,
    Return = 0x80,
    ReturnValue = 0x81,
    Throw = 0x82,
    MonitorEnter = 0x90,
    MonitorExit = 0x91,
    Pop = 0xa0,
    Dup = 0xa1,
    DupX1 = 0xa2,
    DupX2 = 0xa3,
}

/// Generate artifacts for `class` (binary name `binary`) and its nested
/// classes, outer classes first.
pub(crate) fn generate(
    class: &ClassDecl,
    binary: &str,
    symbols: &SymbolTable,
    options: &Options,
) -> FrontendResult<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::new();
    generate_into(class, binary, symbols, options, &mut out)?;
    Ok(out)
}

fn generate_into(
    class: &ClassDecl,
    binary: &str,
    symbols: &SymbolTable,
    options: &Options,
    out: &mut Vec<(String, Vec<u8>)>,
) -> FrontendResult<()> {
    let symbol = symbols
        .get(binary)
        .ok_or_else(|| FrontendError::MalformedArtifact(format!("no symbol for {binary}")))?;

    let mut pool = ConstantPool::new();
    let superclass = symbol
        .superclass
        .clone()
        .or_else(|| (binary != OBJECT).then(|| OBJECT.to_string()));

    let fields = class
        .fields()
        .zip(&symbol.fields)
        .map(|(decl, sig)| FieldInfo {
            flags: modifier_flags(&decl.modifiers),
            name: sig.name.clone(),
            descriptor: sig.ty.descriptor(),
        })
        .collect();

    let mut methods = Vec::new();
    let super_init = superclass.as_deref().unwrap_or(OBJECT);
    methods.push(initializer(class, &symbol.fields, binary, super_init, &mut pool, options, false)?);
    for (decl, sig) in class.methods().zip(&symbol.methods) {
        let mut gen = MethodGen::new(&mut pool, options, sig.is_static);
        gen.reserve_locals(&decl.body, sig.params.len())?;
        gen.block(&decl.body)?;
        if sig.ret == Ty::Void {
            gen.op(Op::Return);
        }
        methods.push(gen.finish(
            modifier_flags(&decl.modifiers),
            &decl.name.name,
            sig.descriptor(),
        ));
    }
    let has_static_init = class
        .fields()
        .any(|f| f.modifiers.has(Modifier::Static) && f.init.is_some());
    if has_static_init {
        methods.push(initializer(class, &symbol.fields, binary, super_init, &mut pool, options, true)?);
    }

    let nested: Vec<(&ClassDecl, String)> = class
        .nested()
        .map(|n| (n, format!("{binary}${}", n.name.name)))
        .filter(|(_, name)| symbol.member_types.values().any(|m| m == name))
        .collect();

    let mut flags = modifier_flags(&class.modifiers);
    if symbol.deprecated {
        flags |= ACC_DEPRECATED;
    }
    let file = ClassFile {
        target: options.target(),
        flags,
        binary_name: binary.to_string(),
        superclass,
        outer: symbol.outer.clone(),
        nested: nested.iter().map(|(_, name)| name.clone()).collect(),
        fields,
        methods,
        pool,
    };
    let bytes = file.encode()?;
    trace!(binary_name = binary, len = bytes.len(), "Encoded artifact");
    out.push((binary.to_string(), bytes));

    for (decl, name) in nested {
        generate_into(decl, &name, symbols, options, out)?;
    }
    Ok(())
}

/// `<init>()V`, or `<clinit>()V` when `is_static`: runs the field
/// initialisers of the matching kind in declaration order.
fn initializer(
    class: &ClassDecl,
    sigs: &[FieldSig],
    binary: &str,
    superclass: &str,
    pool: &mut ConstantPool,
    options: &Options,
    is_static: bool,
) -> FrontendResult<MethodInfo> {
    let mut gen = MethodGen::new(pool, options, is_static);
    if !is_static {
        gen.op(Op::Load);
        gen.u16(0);
        gen.pooled(Op::Invoke, &format!("{superclass}.<init>()V"))?;
    }
    for (field, sig) in class.fields().zip(sigs) {
        let Some(init) = &field.init else { continue };
        if sig.is_static != is_static {
            continue;
        }
        gen.reserve_expr_locals(init)?;
        gen.line(field.span);
        let reference = format!("{binary}.{}:{}", sig.name, sig.ty.descriptor());
        if is_static {
            gen.expr(init)?;
            gen.pooled(Op::PutStatic, &reference)?;
        } else {
            gen.op(Op::Load);
            gen.u16(0);
            gen.expr(init)?;
            gen.pooled(Op::PutField, &reference)?;
        }
    }
    gen.op(Op::Return);
    let (flags, name) = if is_static {
        (ACC_STATIC, "<clinit>")
    } else {
        (ACC_PUBLIC, "<init>")
    };
    Ok(gen.finish(flags, name, "()V".to_string()))
}

fn modifier_flags(modifiers: &Modifiers) -> u16 {
    modifiers.flags.iter().fold(0, |flags, m| {
        flags
            | match m {
                Modifier::Public => ACC_PUBLIC,
                Modifier::Private => ACC_PRIVATE,
                Modifier::Protected => ACC_PROTECTED,
                Modifier::Static => ACC_STATIC,
                Modifier::Final => ACC_FINAL,
            }
    })
}

fn slots_exhausted() -> FrontendError {
    FrontendError::MalformedArtifact("local variable slots exhausted".into())
}

/// Highest local slot assigned inside a body.
struct SlotScan {
    max: Option<u16>,
}

impl Visitor for SlotScan {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let StmtKind::Local { slot, .. } = &stmt.kind {
            if let Some(slot) = slot.get() {
                self.max = Some(self.max.map_or(*slot, |m| m.max(*slot)));
            }
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let Some(Resolution::Local(slot)) = expr.resolution() {
            self.max = Some(self.max.map_or(*slot, |m| m.max(*slot)));
        }
        walk_expr(self, expr);
    }
}

struct MethodGen<'p> {
    pool: &'p mut ConstantPool,
    code: Vec<u8>,
    lines: Vec<(u32, u32)>,
    debug_lines: bool,
    next_local: u16,
    max_locals: u16,
}

impl<'p> MethodGen<'p> {
    fn new(pool: &'p mut ConstantPool, options: &Options, is_static: bool) -> Self {
        let first = if is_static { 0 } else { 1 };
        Self {
            pool,
            code: Vec::new(),
            lines: Vec::new(),
            debug_lines: options.debug() == DebugInfo::Lines,
            next_local: first,
            max_locals: first,
        }
    }

    fn reserve_locals(&mut self, body: &Block, params: usize) -> FrontendResult<()> {
        let params = u16::try_from(params).map_err(|_| slots_exhausted())?;
        self.next_local = self.next_local.checked_add(params).ok_or_else(slots_exhausted)?;
        let mut scan = SlotScan { max: None };
        walk_block(&mut scan, body);
        self.reserve_through(scan.max)
    }

    fn reserve_expr_locals(&mut self, expr: &Expr) -> FrontendResult<()> {
        let mut scan = SlotScan { max: None };
        scan.visit_expr(expr);
        self.reserve_through(scan.max)
    }

    /// Make every slot up to `max` unavailable for temporaries.
    fn reserve_through(&mut self, max: Option<u16>) -> FrontendResult<()> {
        if let Some(max) = max {
            let end = max.checked_add(1).ok_or_else(slots_exhausted)?;
            self.next_local = self.next_local.max(end);
        }
        self.max_locals = self.max_locals.max(self.next_local);
        Ok(())
    }

    fn temp(&mut self) -> FrontendResult<u16> {
        let slot = self.next_local;
        self.next_local = self.next_local.checked_add(1).ok_or_else(slots_exhausted)?;
        self.max_locals = self.max_locals.max(self.next_local);
        Ok(slot)
    }

    fn finish(self, flags: u16, name: &str, descriptor: String) -> MethodInfo {
        MethodInfo {
            flags,
            name: name.to_string(),
            descriptor,
            max_locals: self.max_locals,
            code: self.code,
            lines: self.lines,
        }
    }

    // ── Emission ───────────────────────────────────────────────────

    fn pc(&self) -> u32 {
        u32::try_from(self.code.len()).unwrap_or(u32::MAX)
    }

    fn line(&mut self, span: Span) {
        if !self.debug_lines || span.line == 0 {
            return;
        }
        if self.lines.last().map(|(_, line)| *line) != Some(span.line) {
            let pc = self.pc();
            self.lines.push((pc, span.line));
        }
    }

    fn op(&mut self, op: Op) {
        self.code.push(op as u8);
    }

    fn u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    fn pooled(&mut self, op: Op, constant: &str) -> FrontendResult<()> {
        let idx = self.pool.intern(constant)?;
        self.op(op);
        self.u16(idx);
        Ok(())
    }

    /// Emit a jump with a placeholder target; returns the patch position.
    fn jump(&mut self, op: Op) -> usize {
        self.op(op);
        let at = self.code.len();
        self.code.extend_from_slice(&[0; 4]);
        at
    }

    fn jump_to(&mut self, op: Op, target: u32) {
        self.op(op);
        self.code.extend_from_slice(&target.to_be_bytes());
    }

    fn patch(&mut self, at: usize) {
        let target = self.pc().to_be_bytes();
        self.code[at..at + 4].copy_from_slice(&target);
    }

    fn load(&mut self, slot: u16) {
        self.op(Op::Load);
        self.u16(slot);
    }

    fn store(&mut self, slot: u16) {
        self.op(Op::Store);
        self.u16(slot);
    }

    // ── Statements ─────────────────────────────────────────────────

    fn block(&mut self, block: &Block) -> FrontendResult<()> {
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> FrontendResult<()> {
        self.line(stmt.span);
        match &stmt.kind {
            StmtKind::Block(block) => self.block(block)?,
            StmtKind::Local { init, slot, .. } => {
                if let (Some(init), Some(slot)) = (init, slot.get()) {
                    self.expr(init)?;
                    self.store(*slot);
                }
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                let to_else = self.jump(Op::JumpIfFalse);
                self.stmt(then)?;
                match otherwise {
                    Some(otherwise) => {
                        let to_end = self.jump(Op::Jump);
                        self.patch(to_else);
                        self.stmt(otherwise)?;
                        self.patch(to_end);
                    }
                    None => self.patch(to_else),
                }
            }
            StmtKind::While { cond, body } => {
                let start = self.pc();
                self.expr(cond)?;
                let exit = self.jump(Op::JumpIfFalse);
                self.stmt(body)?;
                self.jump_to(Op::Jump, start);
                self.patch(exit);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                let start = self.pc();
                let exit = match cond {
                    Some(cond) => {
                        self.expr(cond)?;
                        Some(self.jump(Op::JumpIfFalse))
                    }
                    None => None,
                };
                self.stmt(body)?;
                if let Some(update) = update {
                    self.discarded(update)?;
                }
                self.jump_to(Op::Jump, start);
                if let Some(exit) = exit {
                    self.patch(exit);
                }
            }
            StmtKind::Return(value) => match value {
                Some(value) => {
                    self.expr(value)?;
                    self.op(Op::ReturnValue);
                }
                None => self.op(Op::Return),
            },
            StmtKind::Throw(value) => {
                self.expr(value)?;
                self.op(Op::Throw);
            }
            StmtKind::Synchronized { lock, body } => {
                let slot = self.temp()?;
                self.expr(lock)?;
                self.op(Op::Dup);
                self.store(slot);
                self.op(Op::MonitorEnter);
                self.block(body)?;
                self.load(slot);
                self.op(Op::MonitorExit);
            }
            StmtKind::Expr(expr) => self.discarded(expr)?,
            StmtKind::Empty => {}
        }
        Ok(())
    }

    /// Evaluate for side effects only.
    fn discarded(&mut self, expr: &Expr) -> FrontendResult<()> {
        self.expr(expr)?;
        if expr.ty() != Some(&Ty::Void) {
            self.op(Op::Pop);
        }
        Ok(())
    }

    // ── Expressions ────────────────────────────────────────────────

    fn expr(&mut self, expr: &Expr) -> FrontendResult<()> {
        match &expr.kind {
            ExprKind::Literal(literal) => self.literal(literal)?,
            ExprKind::Name(name) => match expr.resolution() {
                Some(Resolution::Local(slot)) => self.load(*slot),
                Some(Resolution::Field {
                    owner,
                    is_static,
                    descriptor,
                }) => {
                    let reference = format!("{owner}.{name}:{descriptor}");
                    if *is_static {
                        self.pooled(Op::GetStatic, &reference)?;
                    } else {
                        self.load(0);
                        self.pooled(Op::GetField, &reference)?;
                    }
                }
                _ => {}
            },
            ExprKind::This => self.load(0),
            ExprKind::Field { target, name } => match expr.resolution() {
                Some(Resolution::Field {
                    owner,
                    is_static,
                    descriptor,
                }) => {
                    let reference = format!("{owner}.{}:{descriptor}", name.name);
                    if *is_static {
                        self.pooled(Op::GetStatic, &reference)?;
                    } else {
                        self.expr(target)?;
                        self.pooled(Op::GetField, &reference)?;
                    }
                }
                _ => {
                    if matches!(target.ty(), Some(Ty::Array(_))) {
                        self.expr(target)?;
                        self.op(Op::ArrayLength);
                    }
                }
            },
            ExprKind::Call { target, name, args } => {
                let Some(Resolution::Method {
                    owner,
                    is_static,
                    descriptor,
                }) = expr.resolution()
                else {
                    return Ok(());
                };
                let reference = format!("{owner}.{}{descriptor}", name.name);
                if *is_static {
                    for arg in args {
                        self.expr(arg)?;
                    }
                    self.pooled(Op::InvokeStatic, &reference)?;
                } else {
                    match target {
                        Some(target) => self.expr(target)?,
                        None => self.load(0),
                    }
                    for arg in args {
                        self.expr(arg)?;
                    }
                    self.pooled(Op::Invoke, &reference)?;
                }
            }
            ExprKind::New { .. } => {
                if let Some(Resolution::Class(class)) = expr.resolution() {
                    self.pooled(Op::New, class)?;
                    self.op(Op::Dup);
                    self.pooled(Op::Invoke, &format!("{class}.<init>()V"))?;
                }
            }
            ExprKind::NewArray { len, .. } => {
                self.expr(len)?;
                let elem = match expr.ty() {
                    Some(Ty::Array(elem)) => elem.descriptor(),
                    _ => Ty::object().descriptor(),
                };
                self.pooled(Op::NewArray, &elem)?;
            }
            ExprKind::Index { target, index } => {
                self.expr(target)?;
                self.expr(index)?;
                self.op(Op::ArrayLoad);
            }
            ExprKind::Unary { op, operand } => {
                self.expr(operand)?;
                self.op(match op {
                    UnaryOp::Not => Op::Not,
                    UnaryOp::Neg => Op::Neg,
                });
            }
            ExprKind::Binary { op, lhs, rhs } => self.binary(expr, *op, lhs, rhs)?,
            ExprKind::Assign { target, value } => self.assign(target, value)?,
        }
        Ok(())
    }

    fn literal(&mut self, literal: &Literal) -> FrontendResult<()> {
        match literal {
            Literal::Int(v) => self.push_int(*v),
            Literal::Bool(v) => self.push_int(i32::from(*v)),
            Literal::Char(c) => self.push_int(i32::try_from(u32::from(*c)).unwrap_or(i32::MAX)),
            Literal::Long(v) => {
                self.op(Op::PushLong);
                self.code.extend_from_slice(&v.to_be_bytes());
            }
            Literal::String(s) => self.pooled(Op::PushConst, s)?,
            Literal::Null => self.op(Op::PushNull),
        }
        Ok(())
    }

    fn push_int(&mut self, value: i32) {
        self.op(Op::PushInt);
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    fn binary(&mut self, expr: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> FrontendResult<()> {
        let is_concat = op == BinaryOp::Add && expr.ty().is_some_and(Ty::is_string);
        let code = match op {
            BinaryOp::And => return self.short_circuit(Op::JumpIfFalse, lhs, rhs),
            BinaryOp::Or => return self.short_circuit(Op::JumpIfTrue, lhs, rhs),
            BinaryOp::Add if is_concat => Op::Concat,
            BinaryOp::Add => Op::Add,
            BinaryOp::Sub => Op::Sub,
            BinaryOp::Mul => Op::Mul,
            BinaryOp::Div => Op::Div,
            BinaryOp::Rem => Op::Rem,
            BinaryOp::Eq => Op::CmpEq,
            BinaryOp::Ne => Op::CmpNe,
            BinaryOp::Lt => Op::CmpLt,
            BinaryOp::Le => Op::CmpLe,
            BinaryOp::Gt => Op::CmpGt,
            BinaryOp::Ge => Op::CmpGe,
        };
        self.expr(lhs)?;
        self.expr(rhs)?;
        self.op(code);
        Ok(())
    }

    /// `&&` and `||`: the left value decides unless `jump` falls through.
    fn short_circuit(&mut self, jump: Op, lhs: &Expr, rhs: &Expr) -> FrontendResult<()> {
        self.expr(lhs)?;
        self.op(Op::Dup);
        let done = self.jump(jump);
        self.op(Op::Pop);
        self.expr(rhs)?;
        self.patch(done);
        Ok(())
    }

    /// Assignment leaves the assigned value on the stack.
    fn assign(&mut self, target: &Expr, value: &Expr) -> FrontendResult<()> {
        match (&target.kind, target.resolution()) {
            (_, Some(Resolution::Local(slot))) => {
                self.expr(value)?;
                self.op(Op::Dup);
                self.store(*slot);
            }
            (
                ExprKind::Name(name),
                Some(Resolution::Field {
                    owner,
                    is_static,
                    descriptor,
                }),
            ) => {
                let reference = format!("{owner}.{name}:{descriptor}");
                self.field_store(None, *is_static, &reference, value)?;
            }
            (
                ExprKind::Field {
                    target: receiver,
                    name,
                },
                Some(Resolution::Field {
                    owner,
                    is_static,
                    descriptor,
                }),
            ) => {
                let reference = format!("{owner}.{}:{descriptor}", name.name);
                self.field_store(Some(receiver), *is_static, &reference, value)?;
            }
            (ExprKind::Index { target: array, index }, _) => {
                self.expr(array)?;
                self.expr(index)?;
                self.expr(value)?;
                self.op(Op::DupX2);
                self.op(Op::ArrayStore);
            }
            _ => self.expr(value)?,
        }
        Ok(())
    }

    fn field_store(
        &mut self,
        receiver: Option<&Expr>,
        is_static: bool,
        reference: &str,
        value: &Expr,
    ) -> FrontendResult<()> {
        if is_static {
            self.expr(value)?;
            self.op(Op::Dup);
            self.pooled(Op::PutStatic, reference)?;
        } else {
            match receiver {
                Some(receiver) => self.expr(receiver)?,
                None => self.load(0),
            }
            self.expr(value)?;
            self.op(Op::DupX1);
            self.pooled(Op::PutField, reference)?;
        }
        Ok(())
    }
}
