use mvs_core::{check_program, CheckOptions, Diagnostics, Type};
use mvs_core::thir::TypedProgram;

fn check(src: &str) -> Result<TypedProgram, Diagnostics> {
    let program = mvs_parse::parse_source(src).expect("test programs parse");
    check_program(&program, CheckOptions::default())
}

fn check_ok(src: &str) -> TypedProgram {
    check(src).unwrap_or_else(|e| panic!("expected a well-typed program, got: {e:?}"))
}

fn first_error(src: &str) -> String {
    let diags = check(src).expect_err("expected a type error");
    diags.errors[0].message.clone()
}

#[test]
fn literals_and_arithmetic() {
    assert_eq!(check_ok("1 + 2 * 3").entry.ty, Type::Int);
    assert_eq!(check_ok("1.5 + 2.5").entry.ty, Type::Float);
}

#[test]
fn mixed_operands_are_rejected() {
    let msg = first_error("1 + 2.0");
    assert!(msg.contains("type mismatch"), "unexpected message: {msg}");
}

#[test]
fn comparisons_yield_int() {
    assert_eq!(check_ok("1.5 < 2.5").entry.ty, Type::Int);
    assert_eq!(check_ok("1 == 2").entry.ty, Type::Int);
}

#[test]
fn arithmetic_on_structs_is_undefined() {
    let src = "struct U {} in U() + U()";
    let msg = first_error(src);
    assert!(msg.contains("undefined operator"), "unexpected message: {msg}");
}

#[test]
fn undefined_binding() {
    let msg = first_error("x");
    assert!(msg.contains("undefined binding 'x'"), "unexpected message: {msg}");
}

#[test]
fn binding_types_flow_into_the_body() {
    assert_eq!(check_ok("let x = 1 in x + 1").entry.ty, Type::Int);
    assert_eq!(check_ok("let x: Float = 1.0 in x").entry.ty, Type::Float);
}

#[test]
fn binding_needs_signature_or_initializer() {
    let msg = first_error("var x in 1");
    assert!(
        msg.contains("needs a type annotation or an initializer"),
        "unexpected message: {msg}"
    );
}

#[test]
fn binding_signature_mismatch() {
    let msg = first_error("let x: Int = 1.0 in x");
    assert!(msg.contains("type mismatch"), "unexpected message: {msg}");
}

#[test]
fn empty_array_literal_needs_context() {
    let msg = first_error("[]");
    assert!(msg.contains("ambiguous element type"), "unexpected message: {msg}");
    assert_eq!(
        check_ok("let a: [Int] = [] in a").entry.ty,
        Type::Array(Box::new(Type::Int))
    );
}

#[test]
fn array_elements_share_one_type() {
    let msg = first_error("[1, 2.0]");
    assert!(msg.contains("type mismatch"), "unexpected message: {msg}");
}

#[test]
fn subscripts_require_arrays_and_int_indices() {
    assert_eq!(check_ok("let a = [1, 2] in a[0]").entry.ty, Type::Int);

    let msg = first_error("let x = 1 in x[0]");
    assert!(msg.contains("cannot index"), "unexpected message: {msg}");

    let msg = first_error("let a = [1] in a[1.0]");
    assert!(msg.contains("type mismatch"), "unexpected message: {msg}");
}

#[test]
fn struct_literals_check_their_fields() {
    let ty = check_ok("struct P { var f: Int; var s: Int } in P(4, 2)").entry.ty;
    assert!(matches!(ty, Type::Struct { ref name, .. } if name == "P"));

    let msg = first_error("struct P { var f: Int } in P(1, 2)");
    assert!(msg.contains("invalid argument count"), "unexpected message: {msg}");

    let msg = first_error("struct P { var f: Int } in P(1.0)");
    assert!(msg.contains("type mismatch"), "unexpected message: {msg}");
}

#[test]
fn member_access_requires_the_member() {
    let msg = first_error("struct P { var f: Int } in P(1).g");
    assert!(msg.contains("no member 'g'"), "unexpected message: {msg}");
}

#[test]
fn duplicate_declarations_are_reported() {
    let msg = first_error("struct P {} in struct P {} in 1");
    assert!(msg.contains("duplicate declaration"), "unexpected message: {msg}");

    let msg = first_error("struct P { var f: Int; var f: Int } in 1");
    assert!(msg.contains("duplicate declaration"), "unexpected message: {msg}");

    let msg = first_error("((x: Int, x: Int) -> Int { x })(1, 2)");
    assert!(msg.contains("duplicate declaration"), "unexpected message: {msg}");
}

#[test]
fn unit_is_predeclared() {
    let ty = check_ok("let u: Unit = Unit() in u").entry.ty;
    assert_eq!(ty, Type::unit());

    let msg = first_error("struct Unit {} in 1");
    assert!(msg.contains("duplicate declaration"), "unexpected message: {msg}");
}

#[test]
fn struct_context_is_ordered() {
    // A struct may only mention structs declared before it, which is what
    // rules out recursive types.
    let msg = first_error("struct A { let b: B } in struct B {} in 1");
    assert!(msg.contains("undefined type 'B'"), "unexpected message: {msg}");

    let msg = first_error("struct A { let a: A } in 1");
    assert!(msg.contains("undefined type 'A'"), "unexpected message: {msg}");
}

#[test]
fn calls_check_arity_and_argument_types() {
    let src = "fun f(x: Int) -> Int { x } in f(1, 2)";
    assert!(first_error(src).contains("invalid argument count"));

    let src = "fun f(x: Int) -> Int { x } in f(1.0)";
    assert!(first_error(src).contains("type mismatch"));

    let src = "let x = 1 in x(2)";
    assert!(first_error(src).contains("cannot call a value of type Int"));
}

#[test]
fn recursion_through_the_bound_name() {
    let src = "fun fact(n: Int) -> Int { if n > 1 ? n * fact(n - 1) ! 1 } in fact(6)";
    assert_eq!(check_ok(src).entry.ty, Type::Int);
}

#[test]
fn conditional_branches_share_a_type() {
    assert_eq!(check_ok("if 1 ? 2 ! 3").entry.ty, Type::Int);

    let msg = first_error("if 1 ? 2 ! 3.0");
    assert!(msg.contains("type mismatch"), "unexpected message: {msg}");

    let msg = first_error("if 1.0 ? 2 ! 3");
    assert!(msg.contains("type mismatch"), "unexpected message: {msg}");
}

#[test]
fn wildcard_reads_are_rejected() {
    let msg = first_error("_ + 1");
    assert!(msg.contains("'_'"), "unexpected message: {msg}");
}

#[test]
fn wildcard_assignment_discards_any_value() {
    assert_eq!(check_ok("_ = [1, 2] in 3").entry.ty, Type::Int);
}

#[test]
fn casts_require_any_on_one_side() {
    assert_eq!(check_ok("1 as Any").entry.ty, Type::Any);
    assert_eq!(check_ok("let a = 1 as Any in a as Int").entry.ty, Type::Int);
    assert_eq!(check_ok("1 as Int").entry.ty, Type::Int);

    let msg = first_error("1 as Float");
    assert!(msg.contains("invalid conversion"), "unexpected message: {msg}");
}

#[test]
fn operator_references_need_function_context() {
    let src = "let ops: [(Int, Int) -> Int] = [+, -] in ops[0](10, 1)";
    assert_eq!(check_ok(src).entry.ty, Type::Int);

    let msg = first_error("let f = + in 1");
    assert!(msg.contains("ambiguous reference"), "unexpected message: {msg}");

    // No arithmetic overload exists on structs.
    let src = "struct U {} in let f: (U, U) -> U = + in 1";
    let msg = first_error(src);
    assert!(msg.contains("ambiguous reference"), "unexpected message: {msg}");
}

#[test]
fn equality_operator_reference_works_on_any_type() {
    let src = "struct U {} in let f: (U, U) -> Int = == in f(U(), U())";
    assert_eq!(check_ok(src).entry.ty, Type::Int);
}

#[test]
fn builtins_are_available() {
    assert_eq!(check_ok("sqrt(2.0)").entry.ty, Type::Float);
    assert_eq!(check_ok("uptime()").entry.ty, Type::Float);
}

#[test]
fn errors_accumulate_without_cascading() {
    // Both independent mistakes surface; the outer contexts stay quiet.
    let program = mvs_parse::parse_source("[x + 1, y]").expect("parses");
    let diags = check_program(&program, CheckOptions::default())
        .expect_err("expected type errors");
    assert_eq!(diags.errors.len(), 2);
    assert!(diags.errors.iter().all(|e| e.message.contains("undefined binding")));
}

#[test]
fn inout_signs_are_parameter_only() {
    let msg = first_error("let x: inout Int = 1 in x");
    assert!(
        msg.contains("'inout' is only allowed on parameter signatures"),
        "unexpected message: {msg}"
    );
}
