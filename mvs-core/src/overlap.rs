#![forbid(unsafe_code)]

//! Static overlap analysis for paths.
//!
//! Two paths may overlap when one denotes memory contained in the other.
//! The analysis compares selector chains outward from the shared root and
//! is conservative about dynamic subscripts: an index that is not an
//! integer literal is assumed to collide with anything.

use crate::thir::{Expr, ExprKind, Path, PathKind};

/// Whether `a` and `b` may denote overlapping memory.
pub fn may_overlap(a: &Path, b: &Path) -> bool {
    let mut sa = Vec::new();
    let mut sb = Vec::new();
    let (Some(ra), Some(rb)) = (collect(a, &mut sa), collect(b, &mut sb)) else {
        // Paths rooted in temporaries own fresh storage; they cannot alias
        // anything reachable from the typing context.
        return false;
    };
    if ra != rb {
        return false;
    }

    // Walk selectors from the root. Exhausting either chain means one path
    // is a prefix of the other, which always overlaps.
    for (x, y) in sa.iter().zip(sb.iter()) {
        match (x, y) {
            (Selector::Prop(p), Selector::Prop(q)) => {
                if p != q {
                    return false;
                }
            }
            (Selector::Elem(i), Selector::Elem(j)) => {
                if let (Some(i), Some(j)) = (i, j) {
                    if i != j {
                        return false;
                    }
                }
            }
            // A property and a subscript at the same depth cannot both be
            // well-typed against one base; keep the conservative answer.
            _ => {}
        }
    }
    true
}

enum Selector<'a> {
    Prop(&'a str),
    /// `Some` carries a literal index; `None` is a dynamic subscript.
    Elem(Option<i64>),
}

/// Flattens `path` into root-outward selectors; returns the root name, or
/// `None` for paths rooted in an rvalue.
fn collect<'a>(path: &'a Path, out: &mut Vec<Selector<'a>>) -> Option<&'a str> {
    match &path.kind {
        PathKind::Name { name, .. } => Some(name),
        PathKind::Prop { base, name, .. } => {
            let root = collect(base, out)?;
            out.push(Selector::Prop(name));
            Some(root)
        }
        PathKind::Elem { base, index } => {
            let root = collect(base, out)?;
            out.push(Selector::Elem(literal_index(index)));
            Some(root)
        }
        PathKind::RValue(_) => None,
    }
}

fn literal_index(index: &Expr) -> Option<i64> {
    match index.kind {
        ExprKind::Int(v) => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use mvs_ast::{span, Mutability};
    use proptest::prelude::*;

    use super::*;
    use crate::thir::{NameRef, PathKind};
    use crate::types::Type;

    /// A selector applied to a generated path: a property name or a
    /// subscript (dynamic when `None`).
    #[derive(Clone, Debug)]
    enum Sel {
        Prop(u8),
        Elem(Option<i64>),
    }

    fn dummy_expr(kind: ExprKind, ty: Type) -> Expr {
        Expr {
            span: span(0, 0),
            ty,
            kind,
        }
    }

    fn build(root: &str, sels: &[Sel]) -> Path {
        let mut path = Path {
            span: span(0, 0),
            ty: Type::Int,
            mutability: Mutability::Var,
            kind: PathKind::Name {
                name: root.to_string(),
                nref: NameRef::Local,
            },
        };
        for sel in sels {
            let kind = match sel {
                Sel::Prop(i) => PathKind::Prop {
                    base: Box::new(path),
                    name: format!("f{i}"),
                    index: *i as usize,
                },
                Sel::Elem(Some(i)) => PathKind::Elem {
                    base: Box::new(path),
                    index: Box::new(dummy_expr(ExprKind::Int(*i), Type::Int)),
                },
                Sel::Elem(None) => PathKind::Elem {
                    base: Box::new(path),
                    index: Box::new(dummy_expr(
                        ExprKind::Path(Path {
                            span: span(0, 0),
                            ty: Type::Int,
                            mutability: Mutability::Let,
                            kind: PathKind::Name {
                                name: "i".to_string(),
                                nref: NameRef::Local,
                            },
                        }),
                        Type::Int,
                    )),
                },
            };
            path = Path {
                span: span(0, 0),
                ty: Type::Int,
                mutability: Mutability::Var,
                kind,
            };
        }
        path
    }

    fn arb_sel() -> impl Strategy<Value = Sel> {
        prop_oneof![
            (0u8..3).prop_map(Sel::Prop),
            (0i64..3).prop_map(|i| Sel::Elem(Some(i))),
            Just(Sel::Elem(None)),
        ]
    }

    fn arb_sels() -> impl Strategy<Value = Vec<Sel>> {
        prop::collection::vec(arb_sel(), 0..5)
    }

    proptest! {
        #[test]
        fn overlap_is_reflexive(sels in arb_sels()) {
            let p = build("a", &sels);
            prop_assert!(may_overlap(&p, &p));
        }

        #[test]
        fn overlap_is_symmetric(xs in arb_sels(), ys in arb_sels()) {
            let p = build("a", &xs);
            let q = build("a", &ys);
            prop_assert_eq!(may_overlap(&p, &q), may_overlap(&q, &p));
        }

        #[test]
        fn a_prefix_always_overlaps(xs in arb_sels(), ext in arb_sels()) {
            let p = build("a", &xs);
            let mut longer = xs.clone();
            longer.extend(ext);
            let q = build("a", &longer);
            prop_assert!(may_overlap(&p, &q));
        }

        #[test]
        fn distinct_roots_never_overlap(xs in arb_sels(), ys in arb_sels()) {
            let p = build("a", &xs);
            let q = build("b", &ys);
            prop_assert!(!may_overlap(&p, &q));
        }

        #[test]
        fn dynamic_subscripts_are_conservative(xs in arb_sels(), i in 0i64..3) {
            let mut left = xs.clone();
            left.push(Sel::Elem(None));
            let mut right = xs;
            right.push(Sel::Elem(Some(i)));
            let p = build("a", &left);
            let q = build("a", &right);
            prop_assert!(may_overlap(&p, &q));
        }
    }

    #[test]
    fn sibling_fields_do_not_overlap() {
        let p = build("a", &[Sel::Prop(0)]);
        let q = build("a", &[Sel::Prop(1)]);
        assert!(!may_overlap(&p, &q));
    }

    #[test]
    fn distinct_literal_indices_do_not_overlap() {
        let p = build("a", &[Sel::Elem(Some(0))]);
        let q = build("a", &[Sel::Elem(Some(1))]);
        assert!(!may_overlap(&p, &q));
    }

    #[test]
    fn rvalue_rooted_paths_never_overlap() {
        let p = build("a", &[]);
        let q = Path {
            span: span(0, 0),
            ty: Type::Int,
            mutability: Mutability::Let,
            kind: PathKind::RValue(Box::new(dummy_expr(ExprKind::Int(0), Type::Int))),
        };
        assert!(!may_overlap(&p, &q));
    }
}
