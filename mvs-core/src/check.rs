#![forbid(unsafe_code)]

//! The type checker.
//!
//! Checking walks the parsed AST once, threading the expected type down
//! explicitly, and builds the typed tree. Errors accumulate: an ill-typed
//! subtree gets the absorbing `Error` type and checking continues in its
//! siblings, so one run reports every independent mistake. Code generation
//! only runs when no diagnostics were produced.

use std::collections::{HashMap, HashSet};

use mvs_ast::{self as ast, Mutability, Span};

use crate::capture;
use crate::error::{Diagnostics, SemanticError};
use crate::escape;
use crate::overlap::may_overlap;
use crate::thir::{
    Builtin, Capture, Expr, ExprKind, Func, NameRef, Param, Path, PathKind, StructDef,
    TypedProgram,
};
use crate::types::{Prop, Type};

#[derive(Clone, Copy, Debug)]
pub struct CheckOptions {
    /// Byte budget under which a non-escaping local array literal may be
    /// placed on the stack frame.
    pub max_stack_array_size: u64,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            max_stack_array_size: 1024,
        }
    }
}

/// Checks a whole program, returning the typed tree or every diagnostic.
pub fn check_program(
    program: &ast::Program,
    opts: CheckOptions,
) -> Result<TypedProgram, Diagnostics> {
    let mut checker = Checker::new(opts);
    let structs = checker.check_struct_decls(&program.types);
    let entry = checker.check_expr(&program.entry, None);

    if checker.diags.is_empty() {
        Ok(TypedProgram { structs, entry })
    } else {
        Err(Diagnostics {
            errors: checker.diags,
        })
    }
}

#[derive(Clone, Debug)]
struct BindingInfo {
    kind: BindKind,
    mutability: Mutability,
    ty: Type,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BindKind {
    Local,
    Global,
    Builtin(Builtin),
}

struct Checker {
    /// Δ: struct name → `Type::Struct`.
    structs: HashMap<String, Type>,
    /// Γ: scope stack of value bindings.
    scopes: Vec<HashMap<String, BindingInfo>>,
    diags: Vec<SemanticError>,
    opts: CheckOptions,
}

impl Checker {
    fn new(opts: CheckOptions) -> Self {
        let mut structs = HashMap::new();
        structs.insert("Unit".to_string(), Type::unit());

        let mut root = HashMap::new();
        for builtin in [Builtin::Uptime, Builtin::Sqrt] {
            let name = match builtin {
                Builtin::Uptime => "uptime",
                Builtin::Sqrt => "sqrt",
            };
            root.insert(
                name.to_string(),
                BindingInfo {
                    kind: BindKind::Builtin(builtin),
                    mutability: Mutability::Let,
                    ty: builtin.ty(),
                },
            );
        }

        Self {
            structs,
            scopes: vec![root],
            diags: Vec::new(),
            opts,
        }
    }

    fn err(&mut self, span: Span, message: impl Into<String>) {
        self.diags.push(SemanticError {
            message: message.into(),
            span,
        });
    }

    // ----- Declarations ---------------------------------------------------

    fn check_struct_decls(&mut self, decls: &[ast::StructDecl]) -> Vec<StructDef> {
        let mut out = Vec::new();
        for decl in decls {
            let name = decl.name.node.clone();
            if self.structs.contains_key(&name) {
                self.err(
                    decl.name.span,
                    format!("duplicate declaration of struct '{name}'"),
                );
                continue;
            }

            let mut props = Vec::new();
            let mut seen: HashSet<&str> = HashSet::new();
            for prop in &decl.props {
                if !seen.insert(&prop.name.node) {
                    self.err(
                        prop.name.span,
                        format!("duplicate declaration of property '{}'", prop.name.node),
                    );
                    continue;
                }
                let ty = match &prop.sign {
                    Some(sign) => self.resolve_sign(sign, false),
                    None => {
                        self.err(
                            prop.span,
                            format!("property '{}' requires a type annotation", prop.name.node),
                        );
                        Type::Error
                    }
                };
                props.push(Prop {
                    mutability: prop.mutability,
                    name: prop.name.node.clone(),
                    ty,
                });
            }

            // Registering after resolution means a struct can only mention
            // structs declared before it, which rules out recursion.
            self.structs.insert(
                name.clone(),
                Type::Struct {
                    name: name.clone(),
                    props: props.clone(),
                },
            );
            out.push(StructDef {
                span: decl.span,
                name,
                props,
            });
        }
        out
    }

    fn resolve_sign(&mut self, sign: &ast::Sign, allow_inout: bool) -> Type {
        match &sign.kind {
            ast::SignKind::Int => Type::Int,
            ast::SignKind::Float => Type::Float,
            ast::SignKind::Any => Type::Any,
            ast::SignKind::Named(n) => match self.structs.get(n) {
                Some(ty) => ty.clone(),
                None => {
                    self.err(sign.span, format!("undefined type '{n}'"));
                    Type::Error
                }
            },
            ast::SignKind::Array(elem) => {
                Type::Array(Box::new(self.resolve_sign(elem, false)))
            }
            ast::SignKind::Func { params, output } => Type::Func {
                params: params.iter().map(|p| self.resolve_sign(p, true)).collect(),
                output: Box::new(self.resolve_sign(output, false)),
            },
            ast::SignKind::Inout(base) => {
                if allow_inout {
                    Type::Inout(Box::new(self.resolve_sign(base, false)))
                } else {
                    self.err(
                        sign.span,
                        "'inout' is only allowed on parameter signatures",
                    );
                    Type::Error
                }
            }
        }
    }

    // ----- Scopes ---------------------------------------------------------

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: &str, info: BindingInfo) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), info);
    }

    fn lookup(&self, name: &str) -> Option<&BindingInfo> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    // ----- Expressions ----------------------------------------------------

    fn check_expr(&mut self, expr: &ast::Expr, expected: Option<&Type>) -> Expr {
        let span = expr.span;
        match &expr.kind {
            // Forms that yield their body's value propagate the expected
            // type inward instead of unifying at this level.
            ast::ExprKind::Binding { decl, init, body } => {
                return self.check_binding(span, decl, init.as_deref(), body, expected);
            }
            ast::ExprKind::FuncBinding {
                name,
                literal,
                body,
            } => {
                return self.check_func_binding(span, name, literal, body, expected);
            }
            ast::ExprKind::Assign {
                lvalue,
                rvalue,
                body,
            } => {
                return self.check_assign(span, lvalue.as_deref(), rvalue, body, expected);
            }
            ast::ExprKind::Cond { cond, succ, fail } => {
                return self.check_cond(span, cond, succ, fail, expected);
            }
            _ => {}
        }

        let mut typed = match &expr.kind {
            ast::ExprKind::Int(v) => Expr {
                span,
                ty: Type::Int,
                kind: ExprKind::Int(*v),
            },
            ast::ExprKind::Float(v) => Expr {
                span,
                ty: Type::Float,
                kind: ExprKind::Float(*v),
            },
            ast::ExprKind::Array(elems) => self.check_array(span, elems, expected),
            ast::ExprKind::Struct { name, args } => self.check_struct_literal(span, name, args),
            ast::ExprKind::Func(f) => {
                let params = self.resolve_params(&f.params);
                let output = self.resolve_sign(&f.output, false);
                let (func, ty) = self.check_func_literal(f, params, output);
                Expr {
                    span,
                    ty,
                    kind: ExprKind::Func(func),
                }
            }
            ast::ExprKind::Call { callee, args } => self.check_call(span, callee, args),
            ast::ExprKind::Infix { oper, lhs, rhs } => self.check_infix(span, oper, lhs, rhs),
            ast::ExprKind::Oper(kind) => self.check_oper_ref(span, *kind, expected),
            ast::ExprKind::Inout(inner) => self.check_inout(span, inner),
            ast::ExprKind::Cast { value, sign } => self.check_cast(span, value, sign),
            ast::ExprKind::Name(_) | ast::ExprKind::Prop { .. } | ast::ExprKind::Elem { .. } => {
                let path = self.check_path(expr);
                Expr {
                    span,
                    ty: path.ty.clone(),
                    kind: ExprKind::Path(path),
                }
            }
            ast::ExprKind::Binding { .. }
            | ast::ExprKind::FuncBinding { .. }
            | ast::ExprKind::Assign { .. }
            | ast::ExprKind::Cond { .. } => unreachable!("handled above"),
        };

        self.unify_expected(&mut typed, expected);
        typed
    }

    fn unify_expected(&mut self, typed: &mut Expr, expected: Option<&Type>) {
        let Some(expected) = expected else { return };
        if typed.ty.is_error() || expected.is_error() || typed.ty == *expected {
            return;
        }
        self.err(
            typed.span,
            format!("type mismatch: expected {expected}, found {}", typed.ty),
        );
        typed.ty = Type::Error;
    }

    fn check_array(&mut self, span: Span, elems: &[ast::Expr], expected: Option<&Type>) -> Expr {
        let elem_expected: Option<Type> = match expected {
            Some(Type::Array(e)) => Some((**e).clone()),
            _ => None,
        };

        if elems.is_empty() && elem_expected.is_none() {
            self.err(span, "ambiguous element type for empty array literal");
            return Expr {
                span,
                ty: Type::Error,
                kind: ExprKind::Array(Vec::new()),
            };
        }

        let mut typed = Vec::with_capacity(elems.len());
        let elem_ty = match elem_expected {
            Some(ty) => ty,
            None => {
                let first = self.check_expr(&elems[0], None);
                let ty = first.ty.clone();
                typed.push(first);
                ty
            }
        };

        if elem_ty.is_inout() {
            self.err(span, "array elements cannot have an inout type");
        }

        let rest_expected = if elem_ty.is_error() {
            None
        } else {
            Some(elem_ty.clone())
        };
        for elem in elems.iter().skip(typed.len()) {
            typed.push(self.check_expr(elem, rest_expected.as_ref()));
        }

        let ty = if elem_ty.is_error() || elem_ty.is_inout() {
            Type::Error
        } else {
            Type::Array(Box::new(elem_ty))
        };
        Expr {
            span,
            ty,
            kind: ExprKind::Array(typed),
        }
    }

    fn check_struct_literal(&mut self, span: Span, name: &ast::Ident, args: &[ast::Expr]) -> Expr {
        let Some(struct_ty) = self.structs.get(&name.node).cloned() else {
            self.err(name.span, format!("undefined type '{}'", name.node));
            let args = args.iter().map(|a| self.check_expr(a, None)).collect();
            return Expr {
                span,
                ty: Type::Error,
                kind: ExprKind::Struct {
                    name: name.node.clone(),
                    args,
                },
            };
        };

        let Type::Struct { props, .. } = &struct_ty else {
            unreachable!("struct context only holds struct types")
        };

        if args.len() != props.len() {
            self.err(
                span,
                format!(
                    "invalid argument count: '{}' has {} properties, found {} arguments",
                    name.node,
                    props.len(),
                    args.len()
                ),
            );
            let args = args.iter().map(|a| self.check_expr(a, None)).collect();
            return Expr {
                span,
                ty: Type::Error,
                kind: ExprKind::Struct {
                    name: name.node.clone(),
                    args,
                },
            };
        }

        let expectations: Vec<Type> = props.iter().map(|p| p.ty.clone()).collect();
        let args = args
            .iter()
            .zip(&expectations)
            .map(|(a, exp)| {
                let exp = if exp.is_error() { None } else { Some(exp) };
                self.check_expr(a, exp)
            })
            .collect();

        Expr {
            span,
            ty: struct_ty,
            kind: ExprKind::Struct {
                name: name.node.clone(),
                args,
            },
        }
    }

    fn resolve_params(&mut self, params: &[ast::ParamDecl]) -> Vec<Param> {
        let mut out = Vec::with_capacity(params.len());
        let mut seen: HashSet<&str> = HashSet::new();
        for p in params {
            if !seen.insert(&p.name.node) {
                self.err(
                    p.name.span,
                    format!("duplicate declaration of parameter '{}'", p.name.node),
                );
            }
            out.push(Param {
                name: p.name.node.clone(),
                ty: self.resolve_sign(&p.sign, true),
            });
        }
        out
    }

    /// Checks a function literal whose parameter and output types have
    /// already been resolved (so `fun` bindings resolve them only once).
    fn check_func_literal(
        &mut self,
        f: &ast::FuncExpr,
        params: Vec<Param>,
        output: Type,
    ) -> (Func, Type) {
        // A closure cannot mutate its captures: every outer local is seen
        // as `let` inside the literal.
        let saved = self.scopes.clone();
        for scope in &mut self.scopes {
            for info in scope.values_mut() {
                if info.kind == BindKind::Local {
                    info.mutability = Mutability::Let;
                }
            }
        }

        self.push_scope();
        for p in &params {
            let (mutability, ty) = match &p.ty {
                Type::Inout(base) => (Mutability::Var, (**base).clone()),
                other => (Mutability::Let, other.clone()),
            };
            self.define(
                &p.name,
                BindingInfo {
                    kind: BindKind::Local,
                    mutability,
                    ty,
                },
            );
        }

        let body_expected = if output.is_error() {
            None
        } else {
            Some(output.clone())
        };
        let body = self.check_expr(&f.body, body_expected.as_ref());
        self.scopes = saved;

        let bound: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
        let captures = capture::free_locals(&body, &bound);

        let ty = Type::Func {
            params: params.iter().map(|p| p.ty.clone()).collect(),
            output: Box::new(output.clone()),
        };
        let func = Func {
            span: f.span,
            params,
            output,
            body: Box::new(body),
            captures,
        };
        (func, ty)
    }

    fn check_call(&mut self, span: Span, callee: &ast::Expr, args: &[ast::Expr]) -> Expr {
        let callee = self.check_expr(callee, None);

        let (param_tys, output) = match &callee.ty {
            Type::Func { params, output } => (params.clone(), (**output).clone()),
            Type::Error => {
                let args = args.iter().map(|a| self.check_expr(a, None)).collect();
                return Expr {
                    span,
                    ty: Type::Error,
                    kind: ExprKind::Call {
                        callee: Box::new(callee),
                        args,
                    },
                };
            }
            other => {
                self.err(
                    callee.span,
                    format!("cannot call a value of type {other}"),
                );
                let args = args.iter().map(|a| self.check_expr(a, None)).collect();
                return Expr {
                    span,
                    ty: Type::Error,
                    kind: ExprKind::Call {
                        callee: Box::new(callee),
                        args,
                    },
                };
            }
        };

        if args.len() != param_tys.len() {
            self.err(
                span,
                format!(
                    "invalid argument count: expected {}, found {}",
                    param_tys.len(),
                    args.len()
                ),
            );
            let args = args.iter().map(|a| self.check_expr(a, None)).collect();
            return Expr {
                span,
                ty: Type::Error,
                kind: ExprKind::Call {
                    callee: Box::new(callee),
                    args,
                },
            };
        }

        let typed_args: Vec<Expr> = args
            .iter()
            .zip(&param_tys)
            .map(|(a, exp)| {
                let exp = if exp.is_error() { None } else { Some(exp) };
                self.check_expr(a, exp)
            })
            .collect();

        // Exclusive access: no two inout arguments may overlap.
        let inout_paths: Vec<(usize, &Path)> = typed_args
            .iter()
            .enumerate()
            .filter(|(i, _)| param_tys[*i].is_inout())
            .filter_map(|(i, a)| match &a.kind {
                ExprKind::Inout(path) => Some((i, path)),
                _ => None,
            })
            .collect();
        for (i, (_, p)) in inout_paths.iter().enumerate() {
            for (_, q) in inout_paths.iter().skip(i + 1) {
                if may_overlap(p, q) {
                    self.err(
                        q.span,
                        "exclusive access violation: overlapping inout arguments",
                    );
                }
            }
        }

        Expr {
            span,
            ty: output,
            kind: ExprKind::Call {
                callee: Box::new(callee),
                args: typed_args,
            },
        }
    }

    fn check_infix(
        &mut self,
        span: Span,
        oper: &ast::Spanned<ast::OperKind>,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
    ) -> Expr {
        let lhs = self.check_expr(lhs, None);
        let rhs_expected = if lhs.ty.is_error() {
            None
        } else {
            Some(lhs.ty.clone())
        };
        let rhs = self.check_expr(rhs, rhs_expected.as_ref());

        let operand = lhs.ty.clone();
        let ty = if operand.is_error() || rhs.ty.is_error() {
            Type::Error
        } else if oper.node.is_equality() {
            if operand.is_inout() {
                self.err(
                    oper.span,
                    format!(
                        "undefined operator '{}' for operands of type {operand}",
                        oper.node.symbol()
                    ),
                );
                Type::Error
            } else {
                Type::Int
            }
        } else if oper.node.is_comparison() {
            if operand.is_numeric() {
                Type::Int
            } else {
                self.err(
                    oper.span,
                    format!(
                        "undefined operator '{}' for operands of type {operand}",
                        oper.node.symbol()
                    ),
                );
                Type::Error
            }
        } else {
            debug_assert!(oper.node.is_arithmetic());
            if operand.is_numeric() {
                operand.clone()
            } else {
                self.err(
                    oper.span,
                    format!(
                        "undefined operator '{}' for operands of type {operand}",
                        oper.node.symbol()
                    ),
                );
                Type::Error
            }
        };

        Expr {
            span,
            ty,
            kind: ExprKind::Infix {
                oper: oper.node,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    fn check_oper_ref(&mut self, span: Span, kind: ast::OperKind, expected: Option<&Type>) -> Expr {
        let resolved = match expected {
            Some(Type::Func { params, output }) if params.len() == 2 && params[0] == params[1] => {
                let operand = params[0].clone();
                let ok = if kind.is_equality() {
                    !operand.is_inout() && !operand.is_error() && **output == Type::Int
                } else if kind.is_comparison() {
                    operand.is_numeric() && **output == Type::Int
                } else {
                    operand.is_numeric() && **output == operand
                };
                ok.then_some(operand)
            }
            _ => None,
        };

        match resolved {
            Some(operand) => Expr {
                span,
                ty: expected.expect("resolved implies expected").clone(),
                kind: ExprKind::Oper { oper: kind, operand },
            },
            None => {
                self.err(
                    span,
                    format!("ambiguous reference to operator '{}'", kind.symbol()),
                );
                Expr {
                    span,
                    ty: Type::Error,
                    kind: ExprKind::Oper {
                        oper: kind,
                        operand: Type::Error,
                    },
                }
            }
        }
    }

    fn check_inout(&mut self, span: Span, inner: &ast::Expr) -> Expr {
        if !inner.is_path() {
            self.err(span, "expected a path after '&'");
            let typed = self.check_expr(inner, None);
            return Expr {
                span,
                ty: Type::Error,
                kind: typed.kind,
            };
        }

        let path = self.check_path(inner);
        let ty = if path.ty.is_error() {
            Type::Error
        } else if path.mutability != Mutability::Var {
            self.err(span, "cannot pass an immutable path as inout");
            Type::Error
        } else {
            Type::Inout(Box::new(path.ty.clone()))
        };
        Expr {
            span,
            ty,
            kind: ExprKind::Inout(path),
        }
    }

    fn check_cast(&mut self, span: Span, value: &ast::Expr, sign: &ast::Sign) -> Expr {
        let target = self.resolve_sign(sign, false);
        let value = self.check_expr(value, None);

        let ty = if value.ty.is_error() || target.is_error() {
            Type::Error
        } else if value.ty == target || value.ty == Type::Any || target == Type::Any {
            target
        } else {
            self.err(
                span,
                format!("invalid conversion from {} to {target}", value.ty),
            );
            Type::Error
        };
        Expr {
            span,
            ty,
            kind: ExprKind::Cast {
                value: Box::new(value),
            },
        }
    }

    // ----- Paths ----------------------------------------------------------

    fn check_path(&mut self, expr: &ast::Expr) -> Path {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Name(n) => {
                if n == "_" {
                    self.err(
                        span,
                        "'_' is only allowed as the left side of an assignment",
                    );
                    return Path {
                        span,
                        ty: Type::Error,
                        mutability: Mutability::Let,
                        kind: PathKind::Name {
                            name: n.clone(),
                            nref: NameRef::Local,
                        },
                    };
                }
                match self.lookup(n) {
                    Some(info) => {
                        let nref = match info.kind {
                            BindKind::Local => NameRef::Local,
                            BindKind::Global => NameRef::GlobalFunc,
                            BindKind::Builtin(b) => NameRef::Builtin(b),
                        };
                        Path {
                            span,
                            ty: info.ty.clone(),
                            mutability: info.mutability,
                            kind: PathKind::Name {
                                name: n.clone(),
                                nref,
                            },
                        }
                    }
                    None => {
                        self.err(span, format!("undefined binding '{n}'"));
                        Path {
                            span,
                            ty: Type::Error,
                            mutability: Mutability::Let,
                            kind: PathKind::Name {
                                name: n.clone(),
                                nref: NameRef::Local,
                            },
                        }
                    }
                }
            }
            ast::ExprKind::Prop { base, name } => {
                let base = self.check_path_base(base);
                let (ty, mutability, index) = match &base.ty {
                    Type::Error => (Type::Error, Mutability::Let, 0),
                    Type::Struct { props, .. } => match base.ty.prop_index(&name.node) {
                        Some(index) => {
                            let prop = &props[index];
                            (
                                prop.ty.clone(),
                                base.mutability.min(prop.mutability),
                                index,
                            )
                        }
                        None => {
                            self.err(
                                name.span,
                                format!("type {} has no member '{}'", base.ty, name.node),
                            );
                            (Type::Error, Mutability::Let, 0)
                        }
                    },
                    other => {
                        self.err(
                            name.span,
                            format!("type {other} has no member '{}'", name.node),
                        );
                        (Type::Error, Mutability::Let, 0)
                    }
                };
                Path {
                    span,
                    ty,
                    mutability,
                    kind: PathKind::Prop {
                        base: Box::new(base),
                        name: name.node.clone(),
                        index,
                    },
                }
            }
            ast::ExprKind::Elem { base, index } => {
                let base = self.check_path_base(base);
                let index = self.check_expr(index, Some(&Type::Int));
                let (ty, mutability) = match &base.ty {
                    Type::Error => (Type::Error, Mutability::Let),
                    Type::Array(elem) => ((**elem).clone(), base.mutability),
                    other => {
                        self.err(span, format!("cannot index a value of type {other}"));
                        (Type::Error, Mutability::Let)
                    }
                };
                Path {
                    span,
                    ty,
                    mutability,
                    kind: PathKind::Elem {
                        base: Box::new(base),
                        index: Box::new(index),
                    },
                }
            }
            _ => unreachable!("check_path is only called on path-shaped expressions"),
        }
    }

    /// The base of a selector: another path, or an rvalue the lowered code
    /// must treat as an owned origin.
    fn check_path_base(&mut self, base: &ast::Expr) -> Path {
        if base.is_path() {
            self.check_path(base)
        } else {
            let typed = self.check_expr(base, None);
            Path {
                span: typed.span,
                ty: typed.ty.clone(),
                mutability: Mutability::Let,
                kind: PathKind::RValue(Box::new(typed)),
            }
        }
    }

    // ----- Propagating forms ----------------------------------------------

    fn check_binding(
        &mut self,
        span: Span,
        decl: &ast::BindingDecl,
        init: Option<&ast::Expr>,
        body: &ast::Expr,
        expected: Option<&Type>,
    ) -> Expr {
        let sign_ty = decl.sign.as_ref().map(|s| self.resolve_sign(s, false));

        if sign_ty.is_none() && init.is_none() {
            self.err(
                decl.span,
                format!(
                    "binding '{}' needs a type annotation or an initializer",
                    decl.name.node
                ),
            );
        }

        let init_expected = sign_ty.clone().filter(|t| !t.is_error());
        let typed_init = init.map(|e| self.check_expr(e, init_expected.as_ref()));

        let mut binding_ty = match (&sign_ty, &typed_init) {
            (Some(ty), _) => ty.clone(),
            (None, Some(init)) => init.ty.clone(),
            (None, None) => Type::Error,
        };
        if binding_ty.is_inout() {
            self.err(decl.span, "cannot bind a value of inout type");
            binding_ty = Type::Error;
        }

        self.push_scope();
        self.define(
            &decl.name.node,
            BindingInfo {
                kind: BindKind::Local,
                mutability: decl.mutability,
                ty: binding_ty.clone(),
            },
        );
        let typed_body = self.check_expr(body, expected);
        self.pop_scope();

        let on_stack = self.stack_eligible(&binding_ty, typed_init.as_ref(), &typed_body, decl);

        Expr {
            span,
            ty: typed_body.ty.clone(),
            kind: ExprKind::Binding {
                mutability: decl.mutability,
                name: decl.name.node.clone(),
                binding_ty,
                init: typed_init.map(Box::new),
                body: Box::new(typed_body),
                on_stack,
            },
        }
    }

    fn stack_eligible(
        &self,
        binding_ty: &Type,
        init: Option<&Expr>,
        body: &Expr,
        decl: &ast::BindingDecl,
    ) -> bool {
        let Type::Array(elem) = binding_ty else {
            return false;
        };
        let Some(init) = init else { return false };
        let ExprKind::Array(elems) = &init.kind else {
            return false;
        };
        if !elem.is_trivial() || elem.is_error() {
            return false;
        }
        let Some(stride) = elem.trivial_size() else {
            return false;
        };
        if stride * elems.len() as u64 > self.opts.max_stack_array_size {
            return false;
        }
        !escape::array_binding_escapes(&decl.name.node, body)
    }

    fn check_func_binding(
        &mut self,
        span: Span,
        name: &ast::Ident,
        literal: &ast::FuncExpr,
        body: &ast::Expr,
        expected: Option<&Type>,
    ) -> Expr {
        // The function's type comes from its signature alone, so the name
        // can be bound before the body is checked; that is what makes the
        // recursive reference well-typed.
        let params = self.resolve_params(&literal.params);
        let output = self.resolve_sign(&literal.output, false);
        let fty = Type::Func {
            params: params.iter().map(|p| p.ty.clone()).collect(),
            output: Box::new(output.clone()),
        };

        self.push_scope();
        self.define(
            &name.node,
            BindingInfo {
                kind: BindKind::Global,
                mutability: Mutability::Let,
                ty: fty,
            },
        );

        let (func, _) = self.check_func_literal(literal, params, output);
        let captures: Vec<Capture> = func.captures.clone();
        for c in &captures {
            self.err(
                literal.span,
                format!(
                    "function '{}' cannot capture local binding '{}'",
                    name.node, c.name
                ),
            );
        }

        let typed_body = self.check_expr(body, expected);
        self.pop_scope();

        Expr {
            span,
            ty: typed_body.ty.clone(),
            kind: ExprKind::FuncBinding {
                name: name.node.clone(),
                literal: func,
                body: Box::new(typed_body),
            },
        }
    }

    fn check_assign(
        &mut self,
        span: Span,
        lvalue: Option<&ast::Expr>,
        rvalue: &ast::Expr,
        body: &ast::Expr,
        expected: Option<&Type>,
    ) -> Expr {
        let (typed_lvalue, typed_rvalue) = match lvalue {
            None => (None, self.check_expr(rvalue, None)),
            Some(lv_expr) if !lv_expr.is_path() => {
                self.err(lv_expr.span, "invalid assignment target");
                (None, self.check_expr(rvalue, None))
            }
            Some(lv_expr) => {
                let lv = self.check_path(lv_expr);
                if !lv.ty.is_error() && lv.mutability != Mutability::Var {
                    self.err(lv.span, "cannot assign to an immutable location");
                }
                let exp = if lv.ty.is_error() {
                    None
                } else {
                    Some(lv.ty.clone())
                };
                let rv = self.check_expr(rvalue, exp.as_ref());
                (Some(lv), rv)
            }
        };

        let typed_body = self.check_expr(body, expected);
        Expr {
            span,
            ty: typed_body.ty.clone(),
            kind: ExprKind::Assign {
                lvalue: typed_lvalue,
                rvalue: Box::new(typed_rvalue),
                body: Box::new(typed_body),
            },
        }
    }

    fn check_cond(
        &mut self,
        span: Span,
        cond: &ast::Expr,
        succ: &ast::Expr,
        fail: &ast::Expr,
        expected: Option<&Type>,
    ) -> Expr {
        let cond = self.check_expr(cond, Some(&Type::Int));

        let (succ, fail) = match expected {
            Some(t) => (
                self.check_expr(succ, Some(t)),
                self.check_expr(fail, Some(t)),
            ),
            None => {
                // Without context, the first branch's type becomes the
                // expectation for the second.
                let succ = self.check_expr(succ, None);
                let exp = if succ.ty.is_error() {
                    None
                } else {
                    Some(succ.ty.clone())
                };
                let fail = self.check_expr(fail, exp.as_ref());
                (succ, fail)
            }
        };

        let ty = if succ.ty.is_error() || fail.ty.is_error() {
            Type::Error
        } else {
            succ.ty.clone()
        };
        Expr {
            span,
            ty,
            kind: ExprKind::Cond {
                cond: Box::new(cond),
                succ: Box::new(succ),
                fail: Box::new(fail),
            },
        }
    }
}
