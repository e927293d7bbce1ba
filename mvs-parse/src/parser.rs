#![forbid(unsafe_code)]

use std::collections::HashSet;

use mvs_ast::{
    span_between, span_union, BindingDecl, Expr, ExprKind, FuncExpr, Ident, Mutability, OperKind,
    ParamDecl, Program, Sign, SignKind, Span, Spanned, StructDecl,
};
use mvs_lex::{Token, TokenKind};

use crate::error::ParseError;

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
    /// Names of the struct declarations seen so far. `NAME(args…)` parses as
    /// a struct literal when `NAME` is in this set, as a call otherwise.
    struct_names: HashSet<String>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        // `Unit` is predeclared by the checker; `Unit()` must parse as a
        // struct literal like any declared struct.
        let mut struct_names = HashSet::new();
        struct_names.insert("Unit".to_string());
        Self {
            tokens,
            idx: 0,
            struct_names,
        }
    }

    /// Parses a whole program: `(structDecl 'in')* expr`.
    ///
    /// A malformed struct declaration recovers to its closing brace so later
    /// declarations still get checked; the accumulated errors are returned
    /// together. The entry expression reports its first error.
    pub fn parse_program(&mut self) -> Result<Program, Vec<ParseError>> {
        let mut errors = Vec::new();
        let mut types = Vec::new();

        while self.peek_is(&TokenKind::KwStruct) {
            match self.parse_struct_decl() {
                Ok(decl) => {
                    self.struct_names.insert(decl.name.node.clone());
                    types.push(decl);
                }
                Err(e) => {
                    errors.push(e);
                    self.recover_to_rbrace();
                }
            }
            if let Err(e) = self.expect(TokenKind::KwIn) {
                errors.push(e);
                break;
            }
        }

        let entry = match self.parse_expr() {
            Ok(expr) => expr,
            Err(e) => {
                errors.push(e);
                return Err(errors);
            }
        };

        if let Err(e) = self.expect(TokenKind::Eof) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(Program { types, entry })
        } else {
            Err(errors)
        }
    }

    fn parse_struct_decl(&mut self) -> Result<StructDecl, ParseError> {
        let start = self.expect(TokenKind::KwStruct)?.span;
        let name = self.expect_name()?;
        self.expect(TokenKind::LBrace)?;

        let mut props = Vec::new();
        loop {
            while self.eat(&TokenKind::Semi) {}
            if self.peek_is(&TokenKind::RBrace) {
                break;
            }
            props.push(self.parse_binding_decl()?);
        }
        let end = self.expect(TokenKind::RBrace)?.span;

        Ok(StructDecl {
            span: span_union(start, end),
            name,
            props,
        })
    }

    fn parse_binding_decl(&mut self) -> Result<BindingDecl, ParseError> {
        let (mutability, start) = self.parse_mutability()?;
        let name = self.expect_name()?;
        let mut span = span_union(start, name.span);
        let sign = if self.eat(&TokenKind::Colon) {
            let s = self.parse_sign()?;
            span = span_union(span, s.span);
            Some(s)
        } else {
            None
        };
        Ok(BindingDecl {
            span,
            mutability,
            name,
            sign,
        })
    }

    fn parse_mutability(&mut self) -> Result<(Mutability, Span), ParseError> {
        if let Some(tok) = self.eat_token(&TokenKind::KwLet) {
            Ok((Mutability::Let, tok.span))
        } else if let Some(tok) = self.eat_token(&TokenKind::KwVar) {
            Ok((Mutability::Var, tok.span))
        } else {
            Err(self.unexpected("expected 'let' or 'var'"))
        }
    }

    // ----- Expressions ----------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_cmp_expr()
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_cast_expr()?;
        while let Some(oper) = self.peek_cmp_oper() {
            let oper_span = self.advance().span;
            let rhs = self.parse_cast_expr()?;
            let span = span_union(lhs.span, rhs.span);
            lhs = Expr {
                span,
                kind: ExprKind::Infix {
                    oper: Spanned::new(oper_span, oper),
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        Ok(lhs)
    }

    fn parse_cast_expr(&mut self) -> Result<Expr, ParseError> {
        let value = self.parse_add_expr()?;
        if self.eat(&TokenKind::KwAs) {
            let sign = self.parse_sign()?;
            let span = span_union(value.span, sign.span);
            return Ok(Expr {
                span,
                kind: ExprKind::Cast {
                    value: Box::new(value),
                    sign,
                },
            });
        }
        Ok(value)
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul_expr()?;
        loop {
            let oper = match self.peek_kind() {
                Some(TokenKind::Plus) => OperKind::Add,
                Some(TokenKind::Minus) => OperKind::Sub,
                _ => break,
            };
            // A trailing `+`/`-` with no operand is an operator reference
            // consumed by the caller, not an infix application.
            if !self.operand_follows(1) {
                break;
            }
            let oper_span = self.advance().span;
            let rhs = self.parse_mul_expr()?;
            let span = span_union(lhs.span, rhs.span);
            lhs = Expr {
                span,
                kind: ExprKind::Infix {
                    oper: Spanned::new(oper_span, oper),
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        Ok(lhs)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_pre_expr()?;
        loop {
            let oper = match self.peek_kind() {
                Some(TokenKind::Star) => OperKind::Mul,
                Some(TokenKind::Slash) => OperKind::Div,
                _ => break,
            };
            if !self.operand_follows(1) {
                break;
            }
            let oper_span = self.advance().span;
            let rhs = self.parse_pre_expr()?;
            let span = span_union(lhs.span, rhs.span);
            lhs = Expr {
                span,
                kind: ExprKind::Infix {
                    oper: Spanned::new(oper_span, oper),
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        Ok(lhs)
    }

    fn parse_pre_expr(&mut self) -> Result<Expr, ParseError> {
        if let Some(tok) = self.eat_token(&TokenKind::Amp) {
            let path = self.parse_post_expr()?;
            let span = span_union(tok.span, path.span);
            return Ok(Expr {
                span,
                kind: ExprKind::Inout(Box::new(path)),
            });
        }
        self.parse_post_expr()
    }

    fn parse_post_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.peek_kind() {
                Some(TokenKind::LParen) => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.peek_is(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let end = self.expect(TokenKind::RParen)?.span;
                    let span = span_union(expr.span, end);
                    expr = match expr.kind {
                        ExprKind::Name(ref n) if self.struct_names.contains(n) => {
                            let name = Spanned::new(expr.span, n.clone());
                            Expr {
                                span,
                                kind: ExprKind::Struct { name, args },
                            }
                        }
                        _ => Expr {
                            span,
                            kind: ExprKind::Call {
                                callee: Box::new(expr),
                                args,
                            },
                        },
                    };
                }
                Some(TokenKind::LBracket) => {
                    self.advance();
                    let index = self.parse_expr()?;
                    let end = self.expect(TokenKind::RBracket)?.span;
                    let span = span_union(expr.span, end);
                    expr = Expr {
                        span,
                        kind: ExprKind::Elem {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                Some(TokenKind::Dot) => {
                    self.advance();
                    let name = self.expect_name()?;
                    let span = span_union(expr.span, name.span);
                    expr = Expr {
                        span,
                        kind: ExprKind::Prop {
                            base: Box::new(expr),
                            name,
                        },
                    };
                }
                Some(TokenKind::Eq) => {
                    self.advance();
                    let rvalue = self.parse_expr()?;
                    self.expect(TokenKind::KwIn)?;
                    let body = self.parse_expr()?;
                    let span = span_union(expr.span, body.span);
                    let lvalue = match expr.kind {
                        ExprKind::Name(ref n) if n == "_" => None,
                        _ => Some(Box::new(expr)),
                    };
                    return Ok(Expr {
                        span,
                        kind: ExprKind::Assign {
                            lvalue,
                            rvalue: Box::new(rvalue),
                            body: Box::new(body),
                        },
                    });
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Int(_)) => {
                let tok = self.advance();
                let TokenKind::Int(v) = tok.kind else {
                    unreachable!()
                };
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Int(v),
                })
            }
            Some(TokenKind::Float(_)) => {
                let tok = self.advance();
                let TokenKind::Float(v) = tok.kind else {
                    unreachable!()
                };
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Float(v),
                })
            }
            Some(TokenKind::Name(_)) => {
                let tok = self.advance();
                let TokenKind::Name(n) = tok.kind else {
                    unreachable!()
                };
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Name(n),
                })
            }
            Some(TokenKind::Underscore) => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Name("_".to_string()),
                })
            }
            Some(TokenKind::LBracket) => self.parse_array_expr(),
            Some(TokenKind::KwLet) | Some(TokenKind::KwVar) => self.parse_binding_expr(),
            Some(TokenKind::KwFun) => self.parse_func_binding_expr(),
            Some(TokenKind::KwIf) => self.parse_cond_expr(),
            Some(TokenKind::LParen) => {
                if self.func_expr_follows() {
                    let literal = self.parse_func_expr()?;
                    Ok(Expr {
                        span: literal.span,
                        kind: ExprKind::Func(literal),
                    })
                } else {
                    self.advance();
                    let inner = self.parse_expr()?;
                    self.expect(TokenKind::RParen)?;
                    Ok(inner)
                }
            }
            Some(kind) => {
                if let Some(oper) = cmp_oper_of(kind).or_else(|| arith_oper_of(kind)) {
                    let tok = self.advance();
                    return Ok(Expr {
                        span: tok.span,
                        kind: ExprKind::Oper(oper),
                    });
                }
                Err(self.unexpected("expected an expression"))
            }
            None => Err(self.unexpected("expected an expression")),
        }
    }

    fn parse_array_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(TokenKind::LBracket)?.span;
        let mut elems = Vec::new();
        if !self.peek_is(&TokenKind::RBracket) {
            loop {
                elems.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(TokenKind::RBracket)?.span;
        Ok(Expr {
            span: span_union(start, end),
            kind: ExprKind::Array(elems),
        })
    }

    fn parse_binding_expr(&mut self) -> Result<Expr, ParseError> {
        let decl = self.parse_binding_decl()?;
        let init = if self.eat(&TokenKind::Eq) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::KwIn)?;
        let body = self.parse_expr()?;
        let span = span_union(decl.span, body.span);
        Ok(Expr {
            span,
            kind: ExprKind::Binding {
                decl,
                init,
                body: Box::new(body),
            },
        })
    }

    fn parse_func_binding_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(TokenKind::KwFun)?.span;
        let name = self.expect_name()?;
        let literal = self.parse_func_expr()?;
        self.expect(TokenKind::KwIn)?;
        let body = self.parse_expr()?;
        let span = span_union(start, body.span);
        Ok(Expr {
            span,
            kind: ExprKind::FuncBinding {
                name,
                literal,
                body: Box::new(body),
            },
        })
    }

    fn parse_func_expr(&mut self) -> Result<FuncExpr, ParseError> {
        let start = self.expect(TokenKind::LParen)?.span;
        let mut params = Vec::new();
        if !self.peek_is(&TokenKind::RParen) {
            loop {
                let name = self.expect_name()?;
                self.expect(TokenKind::Colon)?;
                let sign = self.parse_sign()?;
                let span = span_union(name.span, sign.span);
                params.push(ParamDecl { span, name, sign });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Arrow)?;
        let output = self.parse_sign()?;
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_expr()?;
        let end = self.expect(TokenKind::RBrace)?.span;
        Ok(FuncExpr {
            span: span_union(start, end),
            params,
            output,
            body: Box::new(body),
        })
    }

    fn parse_cond_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(TokenKind::KwIf)?.span;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Question)?;
        let succ = self.parse_expr()?;
        self.expect(TokenKind::Bang)?;
        let fail = self.parse_expr()?;
        let span = span_union(start, fail.span);
        Ok(Expr {
            span,
            kind: ExprKind::Cond {
                cond: Box::new(cond),
                succ: Box::new(succ),
                fail: Box::new(fail),
            },
        })
    }

    // ----- Signatures -----------------------------------------------------

    pub fn parse_sign(&mut self) -> Result<Sign, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::KwInout) => {
                let start = self.advance().span;
                let base = self.parse_sign()?;
                let span = span_union(start, base.span);
                Ok(Sign {
                    span,
                    kind: SignKind::Inout(Box::new(base)),
                })
            }
            Some(TokenKind::LBracket) => {
                let start = self.advance().span;
                let elem = self.parse_sign()?;
                let end = self.expect(TokenKind::RBracket)?.span;
                Ok(Sign {
                    span: span_union(start, end),
                    kind: SignKind::Array(Box::new(elem)),
                })
            }
            Some(TokenKind::LParen) => {
                let start = self.advance().span;
                let mut params = Vec::new();
                if !self.peek_is(&TokenKind::RParen) {
                    loop {
                        params.push(self.parse_sign()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Arrow)?;
                let output = self.parse_sign()?;
                let span = span_union(start, output.span);
                Ok(Sign {
                    span,
                    kind: SignKind::Func {
                        params,
                        output: Box::new(output),
                    },
                })
            }
            Some(TokenKind::Name(_)) => {
                let tok = self.advance();
                let TokenKind::Name(n) = tok.kind else {
                    unreachable!()
                };
                let kind = match n.as_str() {
                    "Int" => SignKind::Int,
                    "Float" => SignKind::Float,
                    "Any" => SignKind::Any,
                    _ => SignKind::Named(n),
                };
                Ok(Sign {
                    span: tok.span,
                    kind,
                })
            }
            _ => Err(self.unexpected("expected a type signature")),
        }
    }

    // ----- Token plumbing -------------------------------------------------

    /// Whether a `(`-starting expression is a function literal: scan to the
    /// matching `)` and check for `->`.
    fn func_expr_follows(&self) -> bool {
        debug_assert!(self.peek_is(&TokenKind::LParen));
        let mut depth = 0usize;
        let mut i = self.idx;
        while let Some(tok) = self.tokens.get(i) {
            match tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(i + 1).map(|t| &t.kind),
                            Some(TokenKind::Arrow)
                        );
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    /// Whether the token `n` positions ahead can begin an operand. Used to
    /// tell an infix operator from a trailing first-class operator
    /// reference, as in `[+, -]`.
    fn operand_follows(&self, n: usize) -> bool {
        matches!(
            self.peek_kind_n(n),
            Some(
                TokenKind::Int(_)
                    | TokenKind::Float(_)
                    | TokenKind::Name(_)
                    | TokenKind::Underscore
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::Amp
                    | TokenKind::KwIf
                    | TokenKind::KwLet
                    | TokenKind::KwVar
                    | TokenKind::KwFun
            )
        )
    }

    fn peek_cmp_oper(&self) -> Option<OperKind> {
        let oper = cmp_oper_of(self.peek_kind()?)?;
        if self.operand_follows(1) {
            Some(oper)
        } else {
            None
        }
    }

    fn recover_to_rbrace(&mut self) {
        while let Some(kind) = self.peek_kind() {
            if matches!(kind, TokenKind::Eof) {
                return;
            }
            let done = matches!(kind, TokenKind::RBrace);
            self.advance();
            if done {
                return;
            }
        }
    }

    fn expect_name(&mut self) -> Result<Ident, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Name(_)) => {
                let tok = self.advance();
                let TokenKind::Name(n) = tok.kind else {
                    unreachable!()
                };
                Ok(Spanned::new(tok.span, n))
            }
            _ => Err(self.unexpected("expected a name")),
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        if self.peek_is(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("expected {}", expected.describe())))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        self.eat_token(kind).is_some()
    }

    fn eat_token(&mut self, kind: &TokenKind) -> Option<Token> {
        if self.peek_is(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx).map(|t| &t.kind)
    }

    fn peek_kind_n(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.idx + n).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.idx].clone();
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        tok
    }

    fn unexpected(&self, message: &str) -> ParseError {
        let (found, span) = match self.tokens.get(self.idx) {
            Some(tok) => (tok.kind.describe(), tok.span),
            None => ("end of input".to_string(), span_between(0, 0)),
        };
        ParseError {
            message: format!("{message}, found {found}"),
            span,
        }
    }
}

fn cmp_oper_of(kind: &TokenKind) -> Option<OperKind> {
    match kind {
        TokenKind::EqEq => Some(OperKind::Eq),
        TokenKind::Neq => Some(OperKind::Ne),
        TokenKind::Lt => Some(OperKind::Lt),
        TokenKind::Le => Some(OperKind::Le),
        TokenKind::Ge => Some(OperKind::Ge),
        TokenKind::Gt => Some(OperKind::Gt),
        _ => None,
    }
}

fn arith_oper_of(kind: &TokenKind) -> Option<OperKind> {
    match kind {
        TokenKind::Plus => Some(OperKind::Add),
        TokenKind::Minus => Some(OperKind::Sub),
        TokenKind::Star => Some(OperKind::Mul),
        TokenKind::Slash => Some(OperKind::Div),
        _ => None,
    }
}
