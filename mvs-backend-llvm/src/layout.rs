#![forbid(unsafe_code)]

//! Layout of semantic types on the abstract machine.
//!
//! Structs are packed records of their fields in declaration order, so a
//! type's size is exactly the sum of its parts and doubles as the stride
//! stored in its metatype. The three runtime aggregates have fixed shapes:
//! an array is one payload pointer, a closure is five pointers, and an
//! existential is three inline words plus a witness pointer.

use mvs_core::Type;

pub const CLOSURE_SIZE: u64 = 40;
pub const EXISTENTIAL_SIZE: u64 = 32;
/// Values no larger than the three inline words are stored inline in an
/// existential container.
pub const EXISTENTIAL_INLINE_SIZE: u64 = 24;

/// The LLVM type a semantic type lowers to.
pub fn ll_type(ty: &Type) -> String {
    match ty {
        Type::Int => "i64".to_string(),
        Type::Float => "double".to_string(),
        Type::Inout(_) => "ptr".to_string(),
        Type::Struct { name, .. } => format!("%struct.{name}"),
        Type::Array(_) => "%mvs.AnyArray".to_string(),
        Type::Func { .. } => "%mvs.AnyClosure".to_string(),
        Type::Any => "%mvs.Existential".to_string(),
        Type::Error => unreachable!("code generation never sees error types"),
    }
}

/// Byte size (and stride) of a type's values.
pub fn size_of(ty: &Type) -> u64 {
    match ty {
        Type::Int | Type::Float | Type::Inout(_) => 8,
        Type::Array(_) => 8,
        Type::Func { .. } => CLOSURE_SIZE,
        Type::Any => EXISTENTIAL_SIZE,
        Type::Struct { props, .. } => props.iter().map(|p| size_of(&p.ty)).sum(),
        Type::Error => unreachable!("code generation never sees error types"),
    }
}

/// Stable symbol fragment naming a type. Every closure type shares one
/// fragment: closures carry their own lifecycle functions, so the
/// type-level operations are uniform across closure types.
pub fn mangle(ty: &Type) -> String {
    match ty {
        Type::Int => "i64".to_string(),
        Type::Float => "f64".to_string(),
        Type::Any => "any".to_string(),
        Type::Struct { name, .. } => format!("s.{name}"),
        Type::Array(elem) => format!("a.{}", mangle(elem)),
        Type::Func { .. } => "fn".to_string(),
        Type::Inout(_) => "ptr".to_string(),
        Type::Error => unreachable!("code generation never sees error types"),
    }
}

/// The parameter type a semantic type uses at call boundaries.
pub fn ll_param_type(ty: &Type) -> String {
    match ty {
        Type::Int => "i64".to_string(),
        Type::Float => "double".to_string(),
        // Inout and every address-only value travel by address.
        _ => "ptr".to_string(),
    }
}

/// The LLVM return type of a lifted function.
pub fn lifted_ret_type(output: &Type) -> &'static str {
    match output {
        Type::Int => "i64",
        Type::Float => "double",
        _ => "void",
    }
}
