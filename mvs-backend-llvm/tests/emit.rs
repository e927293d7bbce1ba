//! Shape assertions over the emitted LLVM IR.

use mvs_backend_llvm::{emit_program, CodegenOptions};
use mvs_core::{check_program, CheckOptions};

fn emit(src: &str) -> String {
    emit_with(src, &CodegenOptions::default())
}

fn emit_with(src: &str, opts: &CodegenOptions) -> String {
    let program = mvs_parse::parse_source(src).expect("test programs parse");
    let typed = check_program(&program, CheckOptions::default())
        .unwrap_or_else(|e| panic!("expected a well-typed program, got: {e:?}"));
    emit_program(&typed, opts).expect("codegen succeeds").llvm_ir
}

#[test]
fn named_functions_dispatch_directly() {
    let ir = emit("fun fact(n: Int) -> Int { if n > 1 ? n * fact(n - 1) ! 1 } in fact(6)");
    assert!(ir.contains("define private i64 @mvs.fn.fact.0(i64 %p0, ptr %env)"));
    // The recursive call and the entry call are both direct.
    assert!(ir.contains("call i64 @mvs.fn.fact.0(i64"));
    assert!(ir.contains("call void @mvs_print_i64(i64"));
    assert!(ir.contains("define i32 @main()"));
}

#[test]
fn structs_lower_to_packed_records() {
    let ir = emit("struct P { var f: Int; var s: Int } in var p = P(4, 2) in p.s");
    assert!(ir.contains("%struct.P = type <{ i64, i64 }>"));
    assert!(ir.contains("alloca %struct.P"));
}

#[test]
fn array_literals_call_the_runtime() {
    // Force the array to the heap by copying it whole.
    let ir = emit("var a = [1, 2, 3] in let b = a in b[0]");
    assert!(ir.contains("call void @mvs_array_init(ptr"));
    assert!(ir.contains("i64 3, i64 8)"));
    assert!(ir.contains(
        "@mvs.meta.i64 = private constant %mvs.MetaType \
         <{ i64 8, ptr null, ptr null, ptr null, ptr @mvs.equal.i64 }>"
    ));
}

#[test]
fn writes_uniquify_before_mutation() {
    let ir = emit("var a = [1, 2] in let b = a in a[0] = 5 in a[0]");
    assert!(ir.contains("call void @mvs_array_uniq(ptr"));
}

#[test]
fn nested_array_metatypes_chain() {
    let ir = emit("var a = [[1], [2]] in a[0][0]");
    // The outer element type is itself an array, with lifecycle functions
    // wired through its metatype.
    assert!(ir.contains("@mvs.meta.a.i64 = private constant %mvs.MetaType"));
    assert!(ir.contains("ptr @mvs.drop.a.i64, ptr @mvs.copy.a.i64, ptr @mvs.equal.a.i64"));
    assert!(ir.contains("call void @mvs_array_drop(ptr %a, ptr @mvs.meta.i64)"));
}

#[test]
fn non_escaping_small_arrays_live_on_the_stack() {
    let ir = emit("var a = [1, 2] in a[0] = 4 in a[0] + a[1]");
    assert!(ir.contains("alloca <{ i64, i64, i64, [2 x i64] }>"));
    assert!(!ir.contains("call void @mvs_array_init"));
    assert!(!ir.contains("call void @mvs_array_uniq"));
    assert!(!ir.contains("call void @mvs_array_drop"));
}

#[test]
fn operators_as_values_become_memoized_thunks() {
    let ir = emit("let ops: [(Int, Int) -> Int] = [+, -] in ops[0](10, 1)");
    assert!(ir.contains("define private i64 @mvs.oper.add.i64(i64 %a, i64 %b, ptr %env)"));
    assert!(ir.contains("define private i64 @mvs.oper.sub.i64(i64 %a, i64 %b, ptr %env)"));
    // The call site dispatches through the closure's code pointer.
    assert!(ir.contains("call i64 %t"));
}

#[test]
fn closures_bundle_their_environment_lifecycle() {
    let ir = emit("let n = 3 in let f = (x: Int) -> Int { x + n } in f(1)");
    assert!(ir.contains("%mvs.env.0 = type <{ i64 }>"));
    assert!(ir.contains("define private void @mvs.closure.0.drop(ptr %c)"));
    assert!(ir.contains("define private void @mvs.closure.0.copy(ptr %dst, ptr %src)"));
    assert!(ir.contains("define private i64 @mvs.closure.0.equal(ptr %a, ptr %b)"));
    assert!(ir.contains("call ptr @mvs_malloc(i64 8)"));
}

#[test]
fn capture_free_closures_have_null_lifecycle() {
    let ir = emit("let f = () -> Int { 1 } in let g = f in f == g");
    // Closure equality goes through the shared closure-type helper.
    assert!(ir.contains("define private i64 @mvs.equal.fn(ptr %a, ptr %b)"));
    assert!(ir.contains("call i64 @mvs.equal.fn(ptr"));
    assert!(!ir.contains("@mvs.closure.0.copy"));
}

#[test]
fn inout_arguments_pass_addresses() {
    let src = "struct P { var f: Int; var s: Int } in struct U {} in \
               fun sw(x: inout Int, y: inout Int) -> U { \
                 let t = x in x = y in y = t in U() \
               } in \
               var p = P(4, 2) in _ = sw(&p.f, &p.s) in p.f";
    let ir = emit(src);
    assert!(ir.contains("define private void @mvs.fn.sw.0(ptr %ret, ptr %p0, ptr %p1, ptr %env)"));
    assert!(ir.contains("call void @mvs.fn.sw.0(ptr"));
}

#[test]
fn casts_box_through_the_existential_container() {
    let ir = emit("let a = 1 as Any in a as Int");
    assert!(ir.contains("alloca %mvs.Existential"));
    assert!(ir.contains("getelementptr %mvs.Existential"));
    assert!(ir.contains("call void @mvs_exist_drop(ptr"));
}

#[test]
fn builtins_call_runtime_symbols_directly() {
    let ir = emit("sqrt(2.0)");
    assert!(ir.contains("call double @mvs_sqrt(double"));

    // Referenced as a value, the builtin is wrapped in a lifted thunk.
    let ir = emit("let f = sqrt in f(2.0)");
    assert!(ir.contains("define private double @mvs.thunk.sqrt(double %x, ptr %env)"));
}

#[test]
fn benchmark_wraps_the_entry_in_a_timing_loop() {
    let opts = CodegenOptions {
        benchmark: Some(100),
        print_result: true,
        source_name: "<test>".to_string(),
    };
    let ir = emit_with("1 + 2", &opts);
    assert!(ir.contains("call double @mvs_uptime_nanoseconds()"));
    assert!(ir.contains("icmp slt i64"));
    assert!(ir.contains("call ptr @llvm.stacksave.p0()"));
    assert!(ir.contains("call void @mvs_print_i64(i64"));
    assert!(ir.contains("call void @mvs_print_f64(double"));
}

#[test]
fn no_print_suppresses_the_default_print() {
    let opts = CodegenOptions {
        benchmark: None,
        print_result: false,
        source_name: "<test>".to_string(),
    };
    let ir = emit_with("1 + 2", &opts);
    assert!(!ir.contains("call void @mvs_print_i64"));
}

#[test]
fn float_results_print_as_doubles() {
    let ir = emit("1.5 + 2.5");
    assert!(ir.contains("call void @mvs_print_f64(double"));
    // Float immediates render as exact bit patterns.
    assert!(ir.contains("0x3FF8000000000000"));
}

#[test]
fn let_bindings_alias_let_paths() {
    // `q` aliases `p`'s storage: the literal temporary and `p`'s slot are
    // the only struct allocations, and nothing deep-copies the struct.
    let ir = emit("struct B { var a: [Int] } in let p = B([1]) in let q = p in q.a[0]");
    let allocs = ir.matches("alloca %struct.B").count();
    assert_eq!(allocs, 2, "aliasing should not allocate a third struct");
    assert!(!ir.contains("call void @mvs.copy.s.B(ptr"));
}

#[test]
fn assignment_to_self_is_elided() {
    let ir = emit("var x = 1 in x = x in x");
    assert!(!ir.contains("store i64 %t"), "self-assignment should emit no store beyond init");
}
