//! End-to-end execution of the reference programs: compile, link against
//! the native runtime, run, and compare the real stdout.

use std::fs;
use std::path::PathBuf;

use indoc::indoc;

mod common;
use common::execution_util::{compile_and_run, ensure_required_tooling_available, RunOutcome};

fn run(case: &str, src: &str) -> Option<RunOutcome> {
    ensure_required_tooling_available().expect("execution tooling was required but is missing");
    let out_dir = PathBuf::from("build").join("execution").join(case);
    match compile_and_run(case, src, &out_dir) {
        Ok(Some(out)) => Some(out),
        Ok(None) => {
            eprintln!("skipping {case}: no clang or runtime archive available");
            None
        }
        Err(e) => panic!("{case}: {e:?}"),
    }
}

fn assert_prints(case: &str, src: &str, expected: &str) {
    let Some(out) = run(case, src) else { return };
    assert!(out.ok, "{case} exited with failure:\n{}", out.stderr);
    assert_eq!(out.stdout, expected, "{case} stderr:\n{}", out.stderr);
}

#[test]
fn factorial_prints_720() {
    assert_prints(
        "factorial",
        "fun fact(n: Int) -> Int { if n > 1 ? n * fact(n - 1) ! 1 } in fact(6)",
        "720\n",
    );
}

#[test]
fn copies_do_not_share_mutations() {
    let src = indoc! {"
        struct P { var f: Int; var s: Int } in
        var p = P(4, 2) in
        var q = p in
        q.s = 8 in
        p.s
    "};
    assert_prints("cow", src, "4\n");
}

#[test]
fn inout_swap_prints_the_swapped_field() {
    let src = indoc! {"
        struct P { var f: Int; var s: Int } in
        fun sw(x: inout Int, y: inout Int) -> Unit {
          let t = x in x = y in y = t in Unit()
        } in
        var p = P(4, 2) in
        _ = sw(&p.f, &p.s) in
        p.f
    "};
    assert_prints("swap", src, "2\n");
}

#[test]
fn nested_array_doubling_prints_16() {
    let src = indoc! {"
        struct S2 { var p0: [[Float]] } in
        struct S1 { var p0: S2 } in
        struct S0 { var p0: [S1] } in
        var c = S0([S1(S2([[1.0, 2.0]]))]) in
        c.p0[0].p0.p0[0][1] = c.p0[0].p0.p0[0][1] * 2.0 in
        c.p0[0].p0.p0[0][1] = c.p0[0].p0.p0[0][1] * 2.0 in
        c.p0[0].p0.p0[0][1] = c.p0[0].p0.p0[0][1] * 2.0 in
        c.p0[0].p0.p0[0][1]
    "};
    assert_prints("doubling", src, "16.000000\n");
}

#[test]
fn operators_as_values_apply() {
    assert_prints(
        "operators",
        "let ops: [(Int, Int) -> Int] = [+, -] in ops[0](10, 1)",
        "11\n",
    );
}

#[test]
fn closure_copies_compare_equal() {
    assert_prints(
        "closure-equality",
        "let f = () -> Int { 1 } in let g = f in f == g",
        "1\n",
    );
}

#[test]
fn array_mutation_through_copies_leaves_the_original_intact() {
    let src = indoc! {"
        var a = [1, 2, 3] in
        var b = a in
        b[1] = 9 in
        a[1]
    "};
    assert_prints("array-cow", src, "2\n");
}

#[test]
fn binding_round_trip_matches_direct_evaluation() {
    // `let x = e in x` and `e` must print the same thing, whatever the
    // type of `e`.
    for (case, expr) in [
        ("roundtrip-int", "2 + 3"),
        ("roundtrip-float", "sqrt(2.0)"),
        ("roundtrip-cmp", "1 < 2"),
    ] {
        let direct = run(&format!("{case}-direct"), expr);
        let bound = run(&format!("{case}-bound"), &format!("let x = {expr} in x"));
        let (Some(direct), Some(bound)) = (direct, bound) else {
            return;
        };
        assert!(direct.ok, "{case} direct run failed:\n{}", direct.stderr);
        assert!(bound.ok, "{case} bound run failed:\n{}", bound.stderr);
        assert_eq!(direct.stdout, bound.stdout, "{case} outputs diverge");
    }
}

#[test]
fn demo_programs_print_their_documented_values() {
    let demos = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../demos");
    for (file, expected) in [
        ("factorial.mvs", "720\n"),
        ("swap.mvs", "2\n"),
        ("doubling.mvs", "16.000000\n"),
        ("operators.mvs", "11\n"),
        ("closures.mvs", "1\n"),
    ] {
        let path = demos.join(file);
        let src = fs::read_to_string(&path).expect("demo sources are readable");
        let case = format!("demo-{}", file.trim_end_matches(".mvs"));
        assert_prints(&case, &src, expected);
    }
}
