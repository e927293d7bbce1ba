#![forbid(unsafe_code)]

//! Capture analysis for function literals.
//!
//! A literal captures every local binding it references that is not bound
//! by one of its own parameters or by a binding inside its body. The result
//! is name-sorted so environment layouts are reproducible across runs.

use std::collections::BTreeMap;

use crate::thir::{Capture, Expr, ExprKind, NameRef, Path, PathKind};
use crate::types::Type;

/// Free local names of `body`, excluding `bound` (the literal's parameters).
pub fn free_locals(body: &Expr, bound: &[String]) -> Vec<Capture> {
    let mut scope: Vec<String> = bound.to_vec();
    let mut out: BTreeMap<String, Type> = BTreeMap::new();
    walk(body, &mut scope, &mut out);
    out.into_iter()
        .map(|(name, ty)| Capture { name, ty })
        .collect()
}

fn walk(expr: &Expr, scope: &mut Vec<String>, out: &mut BTreeMap<String, Type>) {
    match &expr.kind {
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Oper { .. } => {}
        ExprKind::Array(elems) => {
            for e in elems {
                walk(e, scope, out);
            }
        }
        ExprKind::Struct { args, .. } => {
            for a in args {
                walk(a, scope, out);
            }
        }
        ExprKind::Func(f) => {
            // The nested literal's own captures are already resolved; any of
            // them not bound here is also free at this level.
            for c in &f.captures {
                if !scope.iter().any(|n| n == &c.name) {
                    out.insert(c.name.clone(), c.ty.clone());
                }
            }
        }
        ExprKind::Call { callee, args } => {
            walk(callee, scope, out);
            for a in args {
                walk(a, scope, out);
            }
        }
        ExprKind::Infix { lhs, rhs, .. } => {
            walk(lhs, scope, out);
            walk(rhs, scope, out);
        }
        ExprKind::Inout(path) => walk_path(path, scope, out),
        ExprKind::Binding {
            name, init, body, ..
        } => {
            if let Some(init) = init {
                walk(init, scope, out);
            }
            scope.push(name.clone());
            walk(body, scope, out);
            scope.pop();
        }
        ExprKind::FuncBinding {
            name,
            literal,
            body,
        } => {
            // Well-typed named functions capture nothing; the list is only
            // non-empty while checking a program that already errored.
            for c in &literal.captures {
                if !scope.iter().any(|n| n == &c.name) {
                    out.insert(c.name.clone(), c.ty.clone());
                }
            }
            scope.push(name.clone());
            walk(body, scope, out);
            scope.pop();
        }
        ExprKind::Assign {
            lvalue,
            rvalue,
            body,
        } => {
            if let Some(lv) = lvalue {
                walk_path(lv, scope, out);
            }
            walk(rvalue, scope, out);
            walk(body, scope, out);
        }
        ExprKind::Cond { cond, succ, fail } => {
            walk(cond, scope, out);
            walk(succ, scope, out);
            walk(fail, scope, out);
        }
        ExprKind::Cast { value } => walk(value, scope, out),
        ExprKind::Path(path) => walk_path(path, scope, out),
    }
}

fn walk_path(path: &Path, scope: &mut Vec<String>, out: &mut BTreeMap<String, Type>) {
    match &path.kind {
        PathKind::Name { name, nref } => {
            if *nref == NameRef::Local && !scope.iter().any(|n| n == name) {
                out.insert(name.clone(), path.ty.clone());
            }
        }
        PathKind::Prop { base, .. } => walk_path(base, scope, out),
        PathKind::Elem { base, index } => {
            walk_path(base, scope, out);
            walk(index, scope, out);
        }
        PathKind::RValue(expr) => walk(expr, scope, out),
    }
}
