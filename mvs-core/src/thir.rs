#![forbid(unsafe_code)]

//! Typed tree produced by the checker and consumed by the code generator.
//!
//! The parsed AST is left untouched; checking builds this parallel tree in
//! which every node carries its semantic type, every path-shaped node
//! carries its computed mutability, and function literals carry their
//! capture lists. After checking succeeds this tree contains no `Error`
//! type anywhere.

use mvs_ast::{Mutability, OperKind, Span};

use crate::types::{Prop, Type};

#[derive(Clone, Debug)]
pub struct TypedProgram {
    pub structs: Vec<StructDef>,
    pub entry: Expr,
}

#[derive(Clone, Debug)]
pub struct StructDef {
    pub span: Span,
    pub name: String,
    pub props: Vec<Prop>,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub span: Span,
    pub ty: Type,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Array(Vec<Expr>),
    Struct { name: String, args: Vec<Expr> },
    Func(Func),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// Operand type is the type of `lhs`.
    Infix {
        oper: OperKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// First-class operator reference; `operand` is the resolved `T` in
    /// `(T, T) -> U`.
    Oper { oper: OperKind, operand: Type },
    Inout(Path),
    Binding {
        mutability: Mutability,
        name: String,
        /// The bound value's type (from the signature or the initializer).
        binding_ty: Type,
        init: Option<Box<Expr>>,
        body: Box<Expr>,
        /// The binding's array payload may live on the stack frame and skip
        /// reference counting (escape analysis said it never leaves scope).
        on_stack: bool,
    },
    /// Named functions never capture locals, so every one of these is
    /// emitted as a global and dispatched directly.
    FuncBinding {
        name: String,
        literal: Func,
        body: Box<Expr>,
    },
    /// A `None` lvalue is the wildcard `_`.
    Assign {
        lvalue: Option<Path>,
        rvalue: Box<Expr>,
        body: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        succ: Box<Expr>,
        fail: Box<Expr>,
    },
    /// Target type is the node's `ty`.
    Cast { value: Box<Expr> },
    /// A path used as an rvalue.
    Path(Path),
}

#[derive(Clone, Debug)]
pub struct Func {
    pub span: Span,
    pub params: Vec<Param>,
    pub output: Type,
    pub body: Box<Expr>,
    /// Captured local bindings, name-sorted for deterministic lowering.
    pub captures: Vec<Capture>,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    /// Declared type; `Inout(_)` for inout parameters.
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct Path {
    pub span: Span,
    pub ty: Type,
    pub mutability: Mutability,
    pub kind: PathKind,
}

#[derive(Clone, Debug)]
pub enum PathKind {
    Name { name: String, nref: NameRef },
    Prop {
        base: Box<Path>,
        name: String,
        index: usize,
    },
    Elem { base: Box<Path>, index: Box<Expr> },
    /// A path rooted in a temporary rather than a binding; the code
    /// generator must drop the origin after consuming the location.
    RValue(Box<Expr>),
}

/// How a name resolves at lowering time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameRef {
    /// A stack slot of the enclosing function (or a capture slot).
    Local,
    /// A function emitted at global scope; calls dispatch directly.
    GlobalFunc,
    Builtin(Builtin),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Uptime,
    Sqrt,
}

impl Builtin {
    pub fn ty(self) -> Type {
        match self {
            Builtin::Uptime => Type::Func {
                params: Vec::new(),
                output: Box::new(Type::Float),
            },
            Builtin::Sqrt => Type::Func {
                params: vec![Type::Float],
                output: Box::new(Type::Float),
            },
        }
    }

}
