#![forbid(unsafe_code)]

//! Escape analysis for locally-bound array literals.
//!
//! A binding whose initializer is a small array literal of trivial element
//! type can live on the stack frame and skip reference counting, provided
//! the array value itself never leaves the binding. Element reads and
//! writes through the binding are harmless: trivial elements are copied
//! bitwise, so no extracted value can retain the storage. Everything else
//! is treated as an escape:
//!
//! - the bare binding used anywhere (copied into another binding, passed to
//!   a call, returned in tail position, taken `inout`, compared, …);
//! - any use inside a function literal, which may outlive the frame.

use crate::thir::{Expr, ExprKind, Path, PathKind};

/// Whether the array bound to `name` may escape `body`.
pub fn array_binding_escapes(name: &str, body: &Expr) -> bool {
    walk(body, name)
}

fn walk(expr: &Expr, name: &str) -> bool {
    match &expr.kind {
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Oper { .. } => false,
        ExprKind::Array(elems) => elems.iter().any(|e| walk(e, name)),
        ExprKind::Struct { args, .. } => args.iter().any(|a| walk(a, name)),
        ExprKind::Func(f) => f.captures.iter().any(|c| c.name == name),
        ExprKind::Call { callee, args } => {
            walk(callee, name) || args.iter().any(|a| walk(a, name))
        }
        ExprKind::Infix { lhs, rhs, .. } => walk(lhs, name) || walk(rhs, name),
        ExprKind::Inout(path) => walk_path(path, name, 0),
        ExprKind::Binding {
            name: bound,
            init,
            body,
            ..
        } => {
            let init_escapes = init.as_deref().is_some_and(|e| walk(e, name));
            // A binding of the same name shadows ours in its body.
            init_escapes || (bound != name && walk(body, name))
        }
        ExprKind::FuncBinding {
            name: bound, body, ..
        } => bound != name && walk(body, name),
        ExprKind::Assign {
            lvalue,
            rvalue,
            body,
        } => {
            lvalue.as_ref().is_some_and(|lv| walk_path(lv, name, 0))
                || walk(rvalue, name)
                || walk(body, name)
        }
        ExprKind::Cond { cond, succ, fail } => {
            walk(cond, name) || walk(succ, name) || walk(fail, name)
        }
        ExprKind::Cast { value } => walk(value, name),
        ExprKind::Path(path) => walk_path(path, name, 0),
    }
}

fn walk_path(path: &Path, name: &str, depth: usize) -> bool {
    match &path.kind {
        // The bare binding escapes; a subscripted use does not.
        PathKind::Name { name: n, .. } => n == name && depth == 0,
        PathKind::Prop { base, .. } => walk_path(base, name, depth + 1),
        PathKind::Elem { base, index } => {
            walk_path(base, name, depth + 1) || walk(index, name)
        }
        PathKind::RValue(expr) => walk(expr, name),
    }
}
