//! Parser: recursive descent parser for the probe language
//!
//! Consumes tokens from the lexer and produces a [`UnitTree`]. The first
//! syntax error abandons the unit.

use std::sync::OnceLock;

use crate::ast::*;
use crate::lexer::{Lexer, SyntaxError, SyntaxResult, Token, TokenKind};

/// Parser for probe language source
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse source text into a unit tree.
    pub fn parse(source_name: &str, input: &str) -> SyntaxResult<UnitTree> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        parser.parse_unit(source_name)
    }

    fn parse_unit(&mut self, source_name: &str) -> SyntaxResult<UnitTree> {
        let package = if self.check(TokenKind::Package) {
            self.advance();
            let path = self.parse_path()?;
            self.expect(TokenKind::Semicolon)?;
            Some(path)
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.check(TokenKind::Import) {
            imports.push(self.parse_import()?);
        }

        let mut types = Vec::new();
        while !self.check(TokenKind::Eof) {
            if self.check(TokenKind::Semicolon) {
                self.advance();
                continue;
            }
            let modifiers = self.parse_modifiers()?;
            types.push(self.parse_class(modifiers)?);
        }

        Ok(UnitTree {
            source_name: source_name.to_string(),
            package,
            imports,
            types,
        })
    }

    fn parse_import(&mut self) -> SyntaxResult<Import> {
        self.expect(TokenKind::Import)?;
        let first = self.expect(TokenKind::Identifier)?;
        let span = span_of(first);
        let mut segments = vec![first.text.clone()];
        let mut wildcard = false;
        while self.check(TokenKind::Dot) {
            self.advance();
            if self.check(TokenKind::Star) {
                self.advance();
                wildcard = true;
                break;
            }
            segments.push(self.expect_identifier()?);
        }
        self.expect(TokenKind::Semicolon)?;
        if !wildcard && segments.len() < 2 {
            return Err(self.error_at(span, "'.' expected"));
        }
        Ok(Import {
            path: Path { segments, span },
            wildcard,
        })
    }

    fn parse_path(&mut self) -> SyntaxResult<Path> {
        let first = self.expect(TokenKind::Identifier)?;
        let span = span_of(first);
        let mut segments = vec![first.text.clone()];
        while self.check(TokenKind::Dot) && self.peek_kind_at(1) == TokenKind::Identifier {
            self.advance();
            segments.push(self.expect_identifier()?);
        }
        Ok(Path { segments, span })
    }

    fn parse_modifiers(&mut self) -> SyntaxResult<Modifiers> {
        let mut modifiers = Modifiers::default();
        loop {
            let flag = match self.peek_kind() {
                TokenKind::At => {
                    modifiers.annotations.push(self.parse_annotation()?);
                    continue;
                }
                TokenKind::Public => Modifier::Public,
                TokenKind::Private => Modifier::Private,
                TokenKind::Protected => Modifier::Protected,
                TokenKind::Static => Modifier::Static,
                TokenKind::Final => Modifier::Final,
                _ => return Ok(modifiers),
            };
            let tok = self.advance();
            let span = span_of(tok);
            if modifiers.has(flag) {
                return Err(self.error_at(span, "repeated modifier"));
            }
            modifiers.flags.push(flag);
        }
    }

    fn parse_annotation(&mut self) -> SyntaxResult<Annotation> {
        let at = self.expect(TokenKind::At)?;
        let span = span_of(at);
        let name = self.parse_path()?;
        let mut args = Vec::new();
        if self.check(TokenKind::OpenParen) {
            self.advance();
            while !self.check(TokenKind::CloseParen) {
                if self.check(TokenKind::Identifier) && self.peek_kind_at(1) == TokenKind::Assign {
                    let tok = self.advance();
                    let name = Ident {
                        name: tok.text.clone(),
                        span: span_of(tok),
                    };
                    self.advance(); // '='
                    let value = self.parse_ternary_free_expr()?;
                    args.push(AnnotationArg::Assign { name, value });
                } else {
                    args.push(AnnotationArg::Value(self.parse_ternary_free_expr()?));
                }
                if !self.check(TokenKind::CloseParen) {
                    self.expect(TokenKind::Comma)?;
                }
            }
            self.expect(TokenKind::CloseParen)?;
        }
        Ok(Annotation { name, args, span })
    }

    fn parse_class(&mut self, modifiers: Modifiers) -> SyntaxResult<ClassDecl> {
        let class_tok = self.expect(TokenKind::Class)?;
        let span = span_of(class_tok);
        let name = self.parse_ident()?;
        let extends = if self.check(TokenKind::Extends) {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::OpenBrace)?;

        let mut members = Vec::new();
        while !self.check(TokenKind::CloseBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.eof_error());
            }
            if self.check(TokenKind::Semicolon) {
                self.advance();
                continue;
            }
            members.push(self.parse_member()?);
        }
        self.expect(TokenKind::CloseBrace)?;

        Ok(ClassDecl {
            id: DeclId::fresh(),
            name,
            modifiers,
            extends,
            members,
            span,
        })
    }

    fn parse_member(&mut self) -> SyntaxResult<Member> {
        let modifiers = self.parse_modifiers()?;
        if self.check(TokenKind::Class) {
            return Ok(Member::Class(self.parse_class(modifiers)?));
        }

        let ty = self.parse_type()?;
        let name = self.parse_ident()?;
        let span = ty.span;

        if self.check(TokenKind::OpenParen) {
            self.advance();
            let mut params = Vec::new();
            while !self.check(TokenKind::CloseParen) {
                let ty = self.parse_type()?;
                let name = self.parse_ident()?;
                params.push(Param { ty, name });
                if !self.check(TokenKind::CloseParen) {
                    self.expect(TokenKind::Comma)?;
                }
            }
            self.expect(TokenKind::CloseParen)?;
            let body = self.parse_block()?;
            return Ok(Member::Method(MethodDecl {
                modifiers,
                ret: ty,
                name,
                params,
                body,
                span,
            }));
        }

        if ty.kind == TypeKind::Void {
            return Err(self.error_here("'(' expected"));
        }
        let init = if self.check(TokenKind::Assign) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(Member::Field(FieldDecl {
            modifiers,
            ty,
            name,
            init,
            span,
        }))
    }

    fn parse_type(&mut self) -> SyntaxResult<TypeRef> {
        let span = span_of(self.peek());
        let kind = match self.peek_kind() {
            TokenKind::Void => TypeKind::Void,
            TokenKind::Int => TypeKind::Int,
            TokenKind::Long => TypeKind::Long,
            TokenKind::Boolean => TypeKind::Boolean,
            TokenKind::Identifier => TypeKind::Named(self.parse_path()?),
            _ => return Err(self.error_here("<identifier> expected")),
        };
        if !matches!(kind, TypeKind::Named(_)) {
            self.advance();
        }
        let dims = self.parse_dims()?;
        if kind == TypeKind::Void && dims > 0 {
            return Err(self.error_at(span, "'void' type not allowed here"));
        }
        Ok(TypeRef { kind, dims, span })
    }

    fn parse_dims(&mut self) -> SyntaxResult<u8> {
        let mut dims: u8 = 0;
        while self.check(TokenKind::OpenBracket) && self.peek_kind_at(1) == TokenKind::CloseBracket {
            self.advance();
            self.advance();
            dims = dims
                .checked_add(1)
                .ok_or_else(|| self.error_here("array type has too many dimensions"))?;
        }
        Ok(dims)
    }

    // ── Statements ──────────────────────────────────────────────────

    fn parse_block(&mut self) -> SyntaxResult<Block> {
        let open = self.expect(TokenKind::OpenBrace)?;
        let span = span_of(open);
        let mut stmts = Vec::new();
        while !self.check(TokenKind::CloseBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.eof_error());
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Block { stmts, span })
    }

    fn parse_stmt(&mut self) -> SyntaxResult<Stmt> {
        let span = span_of(self.peek());
        let kind = match self.peek_kind() {
            TokenKind::OpenBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_paren_expr()?;
                let then = Box::new(self.parse_stmt()?);
                let otherwise = if self.check(TokenKind::Else) {
                    self.advance();
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                StmtKind::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_paren_expr()?;
                let body = Box::new(self.parse_stmt()?);
                StmtKind::While { cond, body }
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Return(value)
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Throw(value)
            }
            TokenKind::Synchronized => {
                self.advance();
                let lock = self.parse_paren_expr()?;
                let body = self.parse_block()?;
                StmtKind::Synchronized { lock, body }
            }
            _ if self.looks_like_local() => {
                let local = self.parse_local()?;
                self.expect(TokenKind::Semicolon)?;
                local
            }
            TokenKind::Class => return Err(self.error_here("class declaration not allowed here")),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, span })
    }

    fn parse_for(&mut self) -> SyntaxResult<StmtKind> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::OpenParen)?;

        let init = if self.check(TokenKind::Semicolon) {
            None
        } else {
            let span = span_of(self.peek());
            let kind = if self.looks_like_local() {
                self.parse_local()?
            } else {
                StmtKind::Expr(self.parse_expr()?)
            };
            Some(Box::new(Stmt { kind, span }))
        };
        self.expect(TokenKind::Semicolon)?;

        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let update = if self.check(TokenKind::CloseParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::CloseParen)?;

        let body = Box::new(self.parse_stmt()?);
        Ok(StmtKind::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn parse_local(&mut self) -> SyntaxResult<StmtKind> {
        let ty = self.parse_type()?;
        if ty.kind == TypeKind::Void {
            return Err(self.error_at(ty.span, "'void' type not allowed here"));
        }
        let name = self.parse_ident()?;
        let init = if self.check(TokenKind::Assign) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(StmtKind::Local {
            ty,
            name,
            init,
            slot: OnceLock::new(),
        })
    }

    /// Whether the upcoming tokens form `Type name`.
    fn looks_like_local(&self) -> bool {
        let mut i = 0;
        match self.peek_kind_at(0) {
            TokenKind::Int | TokenKind::Long | TokenKind::Boolean | TokenKind::Void => return true,
            TokenKind::Identifier => i += 1,
            _ => return false,
        }
        while self.peek_kind_at(i) == TokenKind::Dot && self.peek_kind_at(i + 1) == TokenKind::Identifier {
            i += 2;
        }
        while self.peek_kind_at(i) == TokenKind::OpenBracket
            && self.peek_kind_at(i + 1) == TokenKind::CloseBracket
        {
            i += 2;
        }
        self.peek_kind_at(i) == TokenKind::Identifier
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn parse_paren_expr(&mut self) -> SyntaxResult<Expr> {
        self.expect(TokenKind::OpenParen)?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::CloseParen)?;
        Ok(expr)
    }

    fn parse_expr(&mut self) -> SyntaxResult<Expr> {
        let target = self.parse_binary(0)?;
        if self.check(TokenKind::Assign) {
            self.advance();
            let value = self.parse_expr()?;
            let span = target.span;
            return Ok(Expr::new(
                ExprKind::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                },
                span,
            ));
        }
        Ok(target)
    }

    /// Annotation values: any expression except assignment.
    fn parse_ternary_free_expr(&mut self) -> SyntaxResult<Expr> {
        self.parse_binary(0)
    }

    /// Precedence climbing over the binary operators.
    fn parse_binary(&mut self, min_prec: u8) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = binary_op(self.peek_kind()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> SyntaxResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        let tok = self.advance();
        let span = span_of(tok);
        let operand = self.parse_unary()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> SyntaxResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.parse_ident()?;
                    let span = expr.span;
                    if self.check(TokenKind::OpenParen) {
                        let args = self.parse_args()?;
                        expr = Expr::new(
                            ExprKind::Call {
                                target: Some(Box::new(expr)),
                                name,
                                args,
                            },
                            span,
                        );
                    } else {
                        expr = Expr::new(
                            ExprKind::Field {
                                target: Box::new(expr),
                                name,
                            },
                            span,
                        );
                    }
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::CloseBracket)?;
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> SyntaxResult<Expr> {
        let tok = self.peek().clone();
        let span = span_of(&tok);
        let kind = match tok.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let value = tok
                    .text
                    .parse::<i32>()
                    .map_err(|_| self.error_at(span, "integer number too large"))?;
                ExprKind::Literal(Literal::Int(value))
            }
            TokenKind::LongLiteral => {
                self.advance();
                let value = tok
                    .text
                    .parse::<i64>()
                    .map_err(|_| self.error_at(span, "long number too large"))?;
                ExprKind::Literal(Literal::Long(value))
            }
            TokenKind::StringLiteral => {
                self.advance();
                ExprKind::Literal(Literal::String(tok.text))
            }
            TokenKind::CharLiteral => {
                self.advance();
                let c = tok.text.chars().next().unwrap_or('\0');
                ExprKind::Literal(Literal::Char(c))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(tok.kind == TokenKind::True))
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Literal(Literal::Null)
            }
            TokenKind::This => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Identifier => {
                self.advance();
                if self.check(TokenKind::OpenParen) {
                    let args = self.parse_args()?;
                    ExprKind::Call {
                        target: None,
                        name: Ident {
                            name: tok.text,
                            span,
                        },
                        args,
                    }
                } else {
                    ExprKind::Name(tok.text)
                }
            }
            TokenKind::OpenParen => return self.parse_paren_expr(),
            TokenKind::New => return self.parse_new(),
            TokenKind::Eof => return Err(self.eof_error()),
            _ => return Err(self.error_here("illegal start of expression")),
        };
        Ok(Expr::new(kind, span))
    }

    fn parse_new(&mut self) -> SyntaxResult<Expr> {
        let tok = self.expect(TokenKind::New)?;
        let span = span_of(tok);
        let start = span_of(self.peek());
        let kind = match self.peek_kind() {
            TokenKind::Int => TypeKind::Int,
            TokenKind::Long => TypeKind::Long,
            TokenKind::Boolean => TypeKind::Boolean,
            TokenKind::Identifier => TypeKind::Named(self.parse_path()?),
            _ => return Err(self.error_here("<identifier> expected")),
        };
        if !matches!(kind, TypeKind::Named(_)) {
            self.advance();
        }

        if self.check(TokenKind::OpenBracket) {
            self.advance();
            let len = self.parse_expr()?;
            self.expect(TokenKind::CloseBracket)?;
            let dims = self.parse_dims()?;
            let elem = TypeRef {
                kind,
                dims,
                span: start,
            };
            return Ok(Expr::new(
                ExprKind::NewArray {
                    elem,
                    len: Box::new(len),
                },
                span,
            ));
        }

        if !matches!(kind, TypeKind::Named(_)) {
            return Err(self.error_here("'[' expected"));
        }
        let args = self.parse_args()?;
        let ty = TypeRef {
            kind,
            dims: 0,
            span: start,
        };
        Ok(Expr::new(ExprKind::New { ty, args }, span))
    }

    fn parse_args(&mut self) -> SyntaxResult<Vec<Expr>> {
        self.expect(TokenKind::OpenParen)?;
        let mut args = Vec::new();
        while !self.check(TokenKind::CloseParen) {
            args.push(self.parse_expr()?);
            if !self.check(TokenKind::CloseParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::CloseParen)?;
        Ok(args)
    }

    // ── Token helpers ───────────────────────────────────────────────

    fn parse_ident(&mut self) -> SyntaxResult<Ident> {
        let tok = self.expect(TokenKind::Identifier)?;
        Ok(Ident {
            name: tok.text.clone(),
            span: span_of(tok),
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn expect(&mut self, kind: TokenKind) -> SyntaxResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.check(TokenKind::Eof) {
            Err(self.eof_error())
        } else {
            Err(self.error_here(format!("{} expected", kind)))
        }
    }

    fn expect_identifier(&mut self) -> SyntaxResult<String> {
        let tok = self.expect(TokenKind::Identifier)?;
        Ok(tok.text.clone())
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        let tok = self.peek();
        SyntaxError::new(tok.line, tok.col, message)
    }

    fn error_at(&self, span: Span, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(span.line as usize, span.col as usize, message)
    }

    fn eof_error(&self) -> SyntaxError {
        self.error_here("reached end of file while parsing")
    }
}

fn span_of(tok: &Token) -> Span {
    Span::new(tok.line, tok.col)
}

/// Binary operator and precedence (higher binds tighter).
fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    let op = match kind {
        TokenKind::OrOr => (BinaryOp::Or, 1),
        TokenKind::AndAnd => (BinaryOp::And, 2),
        TokenKind::EqEq => (BinaryOp::Eq, 3),
        TokenKind::NotEq => (BinaryOp::Ne, 3),
        TokenKind::Lt => (BinaryOp::Lt, 4),
        TokenKind::Le => (BinaryOp::Le, 4),
        TokenKind::Gt => (BinaryOp::Gt, 4),
        TokenKind::Ge => (BinaryOp::Ge, 4),
        TokenKind::Plus => (BinaryOp::Add, 5),
        TokenKind::Minus => (BinaryOp::Sub, 5),
        TokenKind::Star => (BinaryOp::Mul, 6),
        TokenKind::Slash => (BinaryOp::Div, 6),
        TokenKind::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> UnitTree {
        Parser::parse("Test.probe", input).unwrap()
    }

    fn first_method_stmts(unit: &UnitTree) -> &[Stmt] {
        let method = unit.types[0].methods().next().unwrap();
        &method.body.stmts
    }

    #[test]
    fn test_parse_minimal_class() {
        let unit = parse("class A {}");
        assert!(unit.package.is_none());
        assert_eq!(unit.types.len(), 1);
        assert_eq!(unit.types[0].name.name, "A");
        assert_eq!(unit.source_name, "Test.probe");
    }

    #[test]
    fn test_parse_package_imports_and_members() {
        let unit = parse(
            r#"
            package probes.net;
            import probes.util.Counter;
            import probes.lib.*;

            @Probe(name = "net", trusted = false)
            public class Net extends Base {
                static int hits = 0;
                String label;
                public static void onCall(String host, int[] ports) {
                    hits = hits + 1;
                }
                static class Entry { long at; }
            }
            "#,
        );
        assert_eq!(unit.package_name().as_deref(), Some("probes.net"));
        assert_eq!(unit.imports.len(), 2);
        assert!(!unit.imports[0].wildcard);
        assert!(unit.imports[1].wildcard);
        assert_eq!(unit.imports[1].path.to_string(), "probes.lib");

        let class = &unit.types[0];
        assert!(class.modifiers.has(Modifier::Public));
        let probe = class.modifiers.annotation("Probe").unwrap();
        assert_eq!(probe.args.len(), 2);
        assert!(matches!(&probe.args[1], AnnotationArg::Assign { name, .. } if name.name == "trusted"));
        assert_eq!(class.extends.as_ref().unwrap().to_string(), "Base");
        assert_eq!(class.fields().count(), 2);
        let method = class.methods().next().unwrap();
        assert_eq!(method.params.len(), 2);
        assert_eq!(method.params[1].ty.dims, 1);
        assert_eq!(class.nested().next().unwrap().name.name, "Entry");
    }

    #[test]
    fn test_parse_statements() {
        let unit = parse(
            r#"
            class S {
                void run(int n) {
                    int i = 0;
                    a.b.C c = null;
                    while (i < n) { i = i + 1; }
                    for (int j = 0; j < n; j = j + 1) ;
                    if (n == 0) return; else { throw new Error(); }
                    synchronized (this) { n = 2; }
                    ;
                }
            }
            "#,
        );
        let stmts = first_method_stmts(&unit);
        assert!(matches!(stmts[0].kind, StmtKind::Local { .. }));
        assert!(matches!(&stmts[1].kind, StmtKind::Local { ty, .. } if ty.to_string() == "a.b.C"));
        assert!(matches!(stmts[2].kind, StmtKind::While { .. }));
        assert!(matches!(&stmts[3].kind, StmtKind::For { init: Some(_), cond: Some(_), update: Some(_), body } if matches!(body.kind, StmtKind::Empty)));
        assert!(matches!(&stmts[4].kind, StmtKind::If { otherwise: Some(_), .. }));
        assert!(matches!(stmts[5].kind, StmtKind::Synchronized { .. }));
        assert!(matches!(stmts[6].kind, StmtKind::Empty));
    }

    #[test]
    fn test_precedence() {
        let unit = parse("class P { int f() { return 1 + 2 * 3 == 7 && !false; } }");
        let StmtKind::Return(Some(expr)) = &first_method_stmts(&unit)[0].kind else {
            panic!("expected return");
        };
        let ExprKind::Binary { op, lhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::And);
        let ExprKind::Binary { op, lhs, .. } = &lhs.kind else {
            panic!("expected comparison");
        };
        assert_eq!(*op, BinaryOp::Eq);
        assert!(matches!(&lhs.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_postfix_chains() {
        let unit = parse("class P { void f() { a.b.c(1, x[2]).d = new int[3]; } }");
        let StmtKind::Expr(expr) = &first_method_stmts(&unit)[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { target, value } = &expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(&target.kind, ExprKind::Field { name, .. } if name.name == "d"));
        assert!(matches!(&value.kind, ExprKind::NewArray { .. }));
    }

    #[test]
    fn test_syntax_errors() {
        let err = Parser::parse("T.probe", "class A { int x }").unwrap_err();
        assert_eq!(err.message, "';' expected");
        assert_eq!(err.line, 1);

        let err = Parser::parse("T.probe", "class A {").unwrap_err();
        assert_eq!(err.message, "reached end of file while parsing");

        let err = Parser::parse("T.probe", "class A { void f() { + ; } }").unwrap_err();
        assert_eq!(err.message, "illegal start of expression");

        assert!(Parser::parse("T.probe", "class A { void x; }").is_err());
        assert!(Parser::parse("T.probe", "import a;").is_err());
    }

    #[test]
    fn test_each_class_gets_distinct_id() {
        let unit = parse("class A { class B {} } class C {}");
        let a = &unit.types[0];
        let b = a.nested().next().unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, unit.types[1].id);
        assert!(unit.find_type(unit.types[1].id).is_some());
        assert!(unit.find_type(b.id).is_none());
    }
}
