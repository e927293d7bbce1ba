#![forbid(unsafe_code)]

//! Semantic types.
//!
//! Types are compared structurally. Struct types are nominal in the surface
//! language, but since the struct context maps each name to exactly one
//! definition and definitions cannot be mutually recursive, carrying the
//! ordered properties inline keeps comparison a plain `==`.

use std::fmt;

use mvs_ast::Mutability;

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Int,
    Float,
    /// The existential escape hatch. Values are boxed behind a witness
    /// metatype at runtime.
    Any,
    Struct { name: String, props: Vec<Prop> },
    Array(Box<Type>),
    Func { params: Vec<Type>, output: Box<Type> },
    /// Only legal as a parameter type or as the type of an `&path` argument.
    Inout(Box<Type>),
    /// Sentinel for ill-typed subtrees; absorbing in every type operator.
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prop {
    pub mutability: Mutability,
    pub name: String,
    pub ty: Type,
}

impl Type {
    pub fn unit() -> Self {
        Type::Struct {
            name: "Unit".to_string(),
            props: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn is_inout(&self) -> bool {
        matches!(self, Type::Inout(_))
    }

    /// A trivial type contains no array, closure, or existential anywhere;
    /// its values can be duplicated bitwise.
    pub fn is_trivial(&self) -> bool {
        match self {
            Type::Int | Type::Float | Type::Error => true,
            Type::Inout(_) => true,
            Type::Any | Type::Array(_) | Type::Func { .. } => false,
            Type::Struct { props, .. } => props.iter().all(|p| p.ty.is_trivial()),
        }
    }

    /// Address-only values are manipulated by address at the abstract-machine
    /// level; everything except scalars and inout references.
    pub fn is_address_only(&self) -> bool {
        !matches!(
            self,
            Type::Int | Type::Float | Type::Inout(_) | Type::Error
        )
    }

    /// Byte size of a trivial type's values. `None` for non-trivial types,
    /// whose sizes are a backend concern.
    pub fn trivial_size(&self) -> Option<u64> {
        match self {
            Type::Int | Type::Float => Some(8),
            Type::Struct { props, .. } => {
                let mut total = 0u64;
                for p in props {
                    total += p.ty.trivial_size()?;
                }
                Some(total)
            }
            _ => None,
        }
    }

    pub fn prop_index(&self, name: &str) -> Option<usize> {
        match self {
            Type::Struct { props, .. } => props.iter().position(|p| p.name == name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Any => write!(f, "Any"),
            Type::Struct { name, .. } => write!(f, "{name}"),
            Type::Array(elem) => write!(f, "[{elem}]"),
            Type::Func { params, output } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {output}")
            }
            Type::Inout(base) => write!(f, "inout {base}"),
            Type::Error => write!(f, "<error>"),
        }
    }
}
