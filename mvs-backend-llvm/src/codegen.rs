#![forbid(unsafe_code)]

//! Lowering of the typed tree onto the abstract machine, rendered as
//! textual LLVM IR.
//!
//! The value contract: evaluating an expression yields either a
//! register-resident scalar or the address of freshly initialized storage
//! the consumer owns. Lvalues are addresses into storage somebody else
//! owns, plus an optional origin temporary that must be dropped once the
//! location has been consumed. Keeping owned and borrowed addresses in
//! separate types is what makes a forgotten drop a compile error here
//! rather than a leak in generated programs.

use std::collections::{BTreeMap, BTreeSet};

use mvs_core::thir::{
    Builtin, Capture, Expr, ExprKind, Func, NameRef, Path, PathKind, TypedProgram,
};
use mvs_core::Type;

use crate::layout::{
    ll_param_type, ll_type, lifted_ret_type, size_of, EXISTENTIAL_INLINE_SIZE,
};
use crate::CodegenOptions;

/// The result of evaluating an expression.
enum RValue {
    /// An immediate or register: `Int`, `Float`, or an inout address.
    Scalar(String),
    /// The address of owned, initialized storage the consumer must drop or
    /// move.
    Owned(String),
}

impl RValue {
    fn scalar(&self) -> &str {
        match self {
            RValue::Scalar(v) => v,
            RValue::Owned(_) => unreachable!("expected a scalar value"),
        }
    }

    fn addr(&self) -> &str {
        match self {
            RValue::Owned(a) => a,
            RValue::Scalar(_) => unreachable!("expected an address value"),
        }
    }
}

/// The address of a path, plus the owned temporary backing it when the
/// path is rooted in an rvalue.
struct LValue {
    addr: String,
    origin: Option<(String, Type)>,
}

#[derive(Clone)]
struct Slot {
    addr: String,
    ty: Type,
    kind: SlotKind,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    /// Storage this scope owns and drops on exit.
    Owned,
    /// Storage owned elsewhere: parameters, captures, aliased bindings.
    Borrowed,
    /// A stack-allocated array payload: statically unique, never
    /// reference-counted, never dropped.
    StackArray,
}

struct GlobalFn {
    name: String,
    symbol: String,
}

struct FnCtx {
    buf: String,
    next_tmp: u32,
    next_label: u32,
    scopes: Vec<Vec<(String, Slot)>>,
}

impl FnCtx {
    fn new() -> Self {
        Self {
            buf: String::new(),
            next_tmp: 0,
            next_label: 0,
            scopes: vec![Vec::new()],
        }
    }

    fn fresh(&mut self) -> String {
        let t = format!("%t{}", self.next_tmp);
        self.next_tmp += 1;
        t
    }

    fn fresh_label(&mut self, hint: &str) -> String {
        let l = format!("{hint}{}", self.next_label);
        self.next_label += 1;
        l
    }

    fn line(&mut self, s: impl AsRef<str>) {
        self.buf.push_str("  ");
        self.buf.push_str(s.as_ref());
        self.buf.push('\n');
    }

    fn label(&mut self, l: &str) {
        self.buf.push_str(l);
        self.buf.push_str(":\n");
    }

    fn define(&mut self, name: &str, slot: Slot) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .push((name.to_string(), slot));
    }

    fn resolve(&self, name: &str) -> &Slot {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| {
                scope
                    .iter()
                    .rev()
                    .find_map(|(n, s)| (n == name).then_some(s))
            })
            .expect("the checker resolved every local name")
    }
}

pub struct Emitter<'a> {
    pub(crate) opts: &'a CodegenOptions,
    pub(crate) type_defs: BTreeMap<String, String>,
    pub(crate) globals: String,
    pub(crate) fns: String,
    pub(crate) meta_emitted: BTreeSet<String>,
    pub(crate) lifecycle_emitted: BTreeSet<String>,
    pub(crate) oper_thunks: BTreeMap<String, String>,
    pub(crate) builtin_thunks: BTreeSet<&'static str>,
    globals_stack: Vec<GlobalFn>,
    next_closure: u32,
    next_fn: u32,
}

impl<'a> Emitter<'a> {
    pub fn new(opts: &'a CodegenOptions) -> Self {
        Self {
            opts,
            type_defs: BTreeMap::new(),
            globals: String::new(),
            fns: String::new(),
            meta_emitted: BTreeSet::new(),
            lifecycle_emitted: BTreeSet::new(),
            oper_thunks: BTreeMap::new(),
            builtin_thunks: BTreeSet::new(),
            globals_stack: Vec::new(),
            next_closure: 0,
            next_fn: 0,
        }
    }

    pub fn emit_program(mut self, program: &TypedProgram) -> String {
        self.type_defs.insert(
            "%struct.Unit".to_string(),
            "%struct.Unit = type {}".to_string(),
        );
        for s in &program.structs {
            let name = format!("%struct.{}", s.name);
            let def = if s.props.is_empty() {
                format!("{name} = type {{}}")
            } else {
                let fields: Vec<String> = s.props.iter().map(|p| ll_type(&p.ty)).collect();
                format!("{name} = type <{{ {} }}>", fields.join(", "))
            };
            self.type_defs.insert(name, def);
        }

        self.emit_main(&program.entry);
        self.assemble()
    }

    fn assemble(self) -> String {
        let mut out = String::new();
        out.push_str("; ModuleID = 'mvs'\n");
        out.push_str(&format!("source_filename = \"{}\"\n\n", self.opts.source_name));

        out.push_str("%mvs.MetaType = type <{ i64, ptr, ptr, ptr, ptr }>\n");
        out.push_str("%mvs.AnyArray = type { ptr }\n");
        out.push_str("%mvs.AnyClosure = type { ptr, ptr, ptr, ptr, ptr }\n");
        out.push_str("%mvs.Existential = type <{ [3 x i64], ptr }>\n");
        for def in self.type_defs.values() {
            out.push_str(def);
            out.push('\n');
        }
        out.push('\n');

        out.push_str(RUNTIME_DECLS);
        out.push('\n');

        if !self.globals.is_empty() {
            out.push_str(&self.globals);
            out.push('\n');
        }
        out.push_str(&self.fns);
        out
    }

    // ----- Entry point ----------------------------------------------------

    fn emit_main(&mut self, entry: &Expr) {
        let mut ctx = FnCtx::new();

        match self.opts.benchmark {
            None => {
                let rv = self.emit_expr(&mut ctx, entry);
                self.finish_entry_value(&mut ctx, rv, &entry.ty);
            }
            Some(n) => self.emit_benchmark_loop(&mut ctx, entry, n),
        }

        ctx.line("ret i32 0");
        let body = std::mem::take(&mut ctx.buf);
        self.fns
            .push_str(&format!("define i32 @main() {{\nentry:\n{body}}}\n\n"));
    }

    fn finish_entry_value(&mut self, ctx: &mut FnCtx, rv: RValue, ty: &Type) {
        if self.opts.print_result {
            match ty {
                Type::Int => {
                    ctx.line(format!("call void @mvs_print_i64(i64 {})", rv.scalar()));
                    return;
                }
                Type::Float => {
                    ctx.line(format!("call void @mvs_print_f64(double {})", rv.scalar()));
                    return;
                }
                _ => {}
            }
        }
        self.drop_rvalue(ctx, rv, ty);
    }

    /// `--benchmark N`: run the entry expression N times, then print the
    /// final value and the elapsed nanoseconds.
    fn emit_benchmark_loop(&mut self, ctx: &mut FnCtx, entry: &Expr, n: u64) {
        let scalar_result = matches!(entry.ty, Type::Int | Type::Float);
        let res = if scalar_result {
            let res = ctx.fresh();
            ctx.line(format!("{res} = alloca {}", ll_type(&entry.ty)));
            Some(res)
        } else {
            None
        };

        let start = ctx.fresh();
        ctx.line(format!("{start} = call double @mvs_uptime_nanoseconds()"));
        let iv = ctx.fresh();
        ctx.line(format!("{iv} = alloca i64"));
        ctx.line(format!("store i64 0, ptr {iv}"));

        let head = ctx.fresh_label("bench.head");
        let body = ctx.fresh_label("bench.body");
        let done = ctx.fresh_label("bench.done");
        ctx.line(format!("br label %{head}"));

        ctx.label(&head);
        let i = ctx.fresh();
        ctx.line(format!("{i} = load i64, ptr {iv}"));
        let c = ctx.fresh();
        ctx.line(format!("{c} = icmp slt i64 {i}, {n}"));
        ctx.line(format!("br i1 {c}, label %{body}, label %{done}"));

        ctx.label(&body);
        let sp = ctx.fresh();
        ctx.line(format!("{sp} = call ptr @llvm.stacksave.p0()"));
        let rv = self.emit_expr(ctx, entry);
        match (&res, rv) {
            (Some(res), rv) => {
                ctx.line(format!(
                    "store {} {}, ptr {res}",
                    ll_type(&entry.ty),
                    rv.scalar()
                ));
            }
            (None, rv) => self.drop_rvalue(ctx, rv, &entry.ty),
        }
        ctx.line(format!("call void @llvm.stackrestore.p0(ptr {sp})"));
        let i2 = ctx.fresh();
        ctx.line(format!("{i2} = add i64 {i}, 1"));
        ctx.line(format!("store i64 {i2}, ptr {iv}"));
        ctx.line(format!("br label %{head}"));

        ctx.label(&done);
        let end = ctx.fresh();
        ctx.line(format!("{end} = call double @mvs_uptime_nanoseconds()"));
        let elapsed = ctx.fresh();
        ctx.line(format!("{elapsed} = fsub double {end}, {start}"));

        if self.opts.print_result {
            if let Some(res) = &res {
                let v = ctx.fresh();
                ctx.line(format!("{v} = load {}, ptr {res}", ll_type(&entry.ty)));
                match entry.ty {
                    Type::Int => ctx.line(format!("call void @mvs_print_i64(i64 {v})")),
                    _ => ctx.line(format!("call void @mvs_print_f64(double {v})")),
                }
            }
        }
        ctx.line(format!("call void @mvs_print_f64(double {elapsed})"));
    }

    // ----- Expressions ----------------------------------------------------

    fn emit_expr(&mut self, ctx: &mut FnCtx, e: &Expr) -> RValue {
        match &e.kind {
            ExprKind::Int(v) => RValue::Scalar(v.to_string()),
            ExprKind::Float(v) => RValue::Scalar(float_lit(*v)),
            ExprKind::Array(elems) => self.emit_array_literal(ctx, e, elems),
            ExprKind::Struct { args, .. } => self.emit_struct_literal(ctx, args, &e.ty),
            ExprKind::Func(f) => self.emit_closure_literal(ctx, f),
            ExprKind::Oper { oper, operand } => {
                let code = self.oper_thunk(*oper, operand);
                self.materialize_closure(ctx, &code)
            }
            ExprKind::Call { callee, args } => self.emit_call(ctx, callee, args, &e.ty),
            ExprKind::Infix { oper, lhs, rhs } => self.emit_infix(ctx, *oper, lhs, rhs),
            ExprKind::Inout(path) => {
                let lv = self.emit_path_addr(ctx, path, true);
                debug_assert!(lv.origin.is_none(), "inout paths are rooted in bindings");
                RValue::Scalar(lv.addr)
            }
            ExprKind::Binding {
                mutability,
                name,
                binding_ty,
                init,
                body,
                on_stack,
            } => self.emit_binding(
                ctx,
                *mutability,
                name,
                binding_ty,
                init.as_deref(),
                body,
                *on_stack,
            ),
            ExprKind::FuncBinding {
                name,
                literal,
                body,
            } => {
                let k = self.next_fn;
                self.next_fn += 1;
                let symbol = format!("@mvs.fn.{name}.{k}");
                self.globals_stack.push(GlobalFn {
                    name: name.clone(),
                    symbol: symbol.clone(),
                });
                self.emit_function(&symbol, literal, None);
                let rv = self.emit_expr(ctx, body);
                self.globals_stack.pop();
                rv
            }
            ExprKind::Assign {
                lvalue,
                rvalue,
                body,
            } => self.emit_assign(ctx, lvalue.as_ref(), rvalue, body),
            ExprKind::Cond { cond, succ, fail } => self.emit_cond(ctx, e, cond, succ, fail),
            ExprKind::Cast { value } => self.emit_cast(ctx, value, &e.ty),
            ExprKind::Path(path) => self.emit_path_rvalue(ctx, path),
        }
    }

    fn emit_array_literal(&mut self, ctx: &mut FnCtx, e: &Expr, elems: &[Expr]) -> RValue {
        let Type::Array(elem_ty) = &e.ty else {
            unreachable!("array literal has array type")
        };
        let meta = self.meta_symbol(elem_ty);
        let stride = size_of(elem_ty);
        let n = elems.len();

        let arr = ctx.fresh();
        ctx.line(format!("{arr} = alloca %mvs.AnyArray"));
        ctx.line(format!(
            "call void @mvs_array_init(ptr {arr}, ptr {meta}, i64 {n}, i64 {stride})"
        ));

        if n > 0 {
            let pay = ctx.fresh();
            ctx.line(format!("{pay} = load ptr, ptr {arr}"));
            let et = ll_type(elem_ty);
            for (i, elem) in elems.iter().enumerate() {
                let slot = ctx.fresh();
                ctx.line(format!("{slot} = getelementptr {et}, ptr {pay}, i64 {i}"));
                self.emit_init_into(ctx, &slot, elem);
            }
        }
        RValue::Owned(arr)
    }

    fn emit_struct_literal(&mut self, ctx: &mut FnCtx, args: &[Expr], ty: &Type) -> RValue {
        let ll = ll_type(ty);
        let s = ctx.fresh();
        ctx.line(format!("{s} = alloca {ll}"));
        for (i, arg) in args.iter().enumerate() {
            let f = ctx.fresh();
            ctx.line(format!("{f} = getelementptr {ll}, ptr {s}, i32 0, i32 {i}"));
            self.emit_init_into(ctx, &f, arg);
        }
        RValue::Owned(s)
    }

    /// Initializes `dest` with the value of `e`: a direct copy when `e` is
    /// a path of address-only non-function type, a move of the owned
    /// temporary otherwise.
    fn emit_init_into(&mut self, ctx: &mut FnCtx, dest: &str, e: &Expr) {
        if !e.ty.is_address_only() {
            let rv = self.emit_expr(ctx, e);
            ctx.line(format!(
                "store {} {}, ptr {dest}",
                ll_type(&e.ty),
                rv.scalar()
            ));
            return;
        }

        if let ExprKind::Path(p) = &e.kind {
            if !matches!(e.ty, Type::Func { .. }) && !path_needs_materializing(p) {
                let lv = self.emit_path_addr(ctx, p, false);
                self.emit_copy(ctx, dest, &lv.addr, &e.ty);
                self.drop_origin(ctx, lv);
                return;
            }
        }

        let rv = self.emit_expr(ctx, e);
        self.emit_move(ctx, dest, rv.addr(), &e.ty);
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_binding(
        &mut self,
        ctx: &mut FnCtx,
        mutability: mvs_ast::Mutability,
        name: &str,
        binding_ty: &Type,
        init: Option<&Expr>,
        body: &Expr,
        on_stack: bool,
    ) -> RValue {
        let binding_ty = binding_ty.clone();

        // `let x = e in x` evaluates to `e` directly.
        if let (Some(init), ExprKind::Path(p)) = (init, &body.kind) {
            if matches!(&p.kind, PathKind::Name { name: n, .. } if n == name) {
                return self.emit_expr(ctx, init);
            }
        }

        // A `let` binding initialized from a `let` path aliases the path's
        // storage instead of copying it.
        if binding_ty.is_address_only() && !on_stack {
            if let Some(Expr {
                kind: ExprKind::Path(p),
                ..
            }) = init
            {
                if mutability == mvs_ast::Mutability::Let
                    && p.mutability == mvs_ast::Mutability::Let
                    && !path_needs_materializing(p)
                    && path_is_name_rooted(p)
                {
                    let lv = self.emit_path_addr(ctx, p, false);
                    debug_assert!(lv.origin.is_none());
                    ctx.scopes.push(Vec::new());
                    ctx.define(
                        name,
                        Slot {
                            addr: lv.addr,
                            ty: binding_ty,
                            kind: SlotKind::Borrowed,
                        },
                    );
                    let rv = self.emit_expr(ctx, body);
                    self.pop_scope(ctx);
                    return rv;
                }
            }
        }

        if on_stack {
            let slot = self.emit_stack_array(ctx, init.expect("stack arrays have literals"));
            ctx.scopes.push(Vec::new());
            ctx.define(
                name,
                Slot {
                    addr: slot,
                    ty: binding_ty,
                    kind: SlotKind::StackArray,
                },
            );
            let rv = self.emit_expr(ctx, body);
            self.pop_scope(ctx);
            return rv;
        }

        let ll = ll_type(&binding_ty);
        let slot = ctx.fresh();
        ctx.line(format!("{slot} = alloca {ll}"));
        match init {
            Some(init) => self.emit_init_into(ctx, &slot, init),
            None => ctx.line(format!("store {ll} zeroinitializer, ptr {slot}")),
        }

        ctx.scopes.push(Vec::new());
        ctx.define(
            name,
            Slot {
                addr: slot,
                ty: binding_ty,
                kind: SlotKind::Owned,
            },
        );
        let rv = self.emit_expr(ctx, body);
        self.pop_scope(ctx);
        rv
    }

    /// A stack-backed array: header and payload in one alloca, reference
    /// count never consulted again (the binding is statically unique).
    fn emit_stack_array(&mut self, ctx: &mut FnCtx, init: &Expr) -> String {
        let Type::Array(elem_ty) = &init.ty else {
            unreachable!("stack arrays have array type")
        };
        let ExprKind::Array(elems) = &init.kind else {
            unreachable!("stack arrays come from literals")
        };
        let n = elems.len();
        let stride = size_of(elem_ty);
        let et = ll_type(elem_ty);
        let blk_ty = format!("<{{ i64, i64, i64, [{n} x {et}] }}>");

        let blk = ctx.fresh();
        ctx.line(format!("{blk} = alloca {blk_ty}"));
        for (i, v) in [(0, 1i64), (1, n as i64), (2, (n as u64 * stride) as i64)] {
            let h = ctx.fresh();
            ctx.line(format!(
                "{h} = getelementptr {blk_ty}, ptr {blk}, i32 0, i32 {i}"
            ));
            ctx.line(format!("store i64 {v}, ptr {h}"));
        }

        let pay = ctx.fresh();
        ctx.line(format!(
            "{pay} = getelementptr {blk_ty}, ptr {blk}, i32 0, i32 3"
        ));
        for (i, elem) in elems.iter().enumerate() {
            let slot = ctx.fresh();
            ctx.line(format!("{slot} = getelementptr {et}, ptr {pay}, i64 {i}"));
            self.emit_init_into(ctx, &slot, elem);
        }

        let arr = ctx.fresh();
        ctx.line(format!("{arr} = alloca %mvs.AnyArray"));
        ctx.line(format!("store ptr {pay}, ptr {arr}"));
        arr
    }

    fn emit_assign(
        &mut self,
        ctx: &mut FnCtx,
        lvalue: Option<&Path>,
        rvalue: &Expr,
        body: &Expr,
    ) -> RValue {
        match lvalue {
            None => {
                // Wildcard: evaluate and discard.
                let rv = self.emit_expr(ctx, rvalue);
                self.drop_rvalue(ctx, rv, &rvalue.ty);
            }
            Some(lv_path) => {
                // Assigning a location to itself is a no-op.
                if let ExprKind::Path(rv_path) = &rvalue.kind {
                    if paths_identical(lv_path, rv_path) {
                        return self.emit_expr(ctx, body);
                    }
                }

                let lv = self.emit_path_addr(ctx, lv_path, true);
                debug_assert!(lv.origin.is_none(), "assignment targets are bindings");

                if lv_path.ty.is_address_only() {
                    // Evaluate the rvalue into its own storage first: it may
                    // read through the location we are about to overwrite.
                    let rv = self.emit_expr(ctx, rvalue);
                    self.emit_drop(ctx, &lv.addr, &lv_path.ty);
                    self.emit_move(ctx, &lv.addr, rv.addr(), &lv_path.ty);
                } else {
                    let rv = self.emit_expr(ctx, rvalue);
                    ctx.line(format!(
                        "store {} {}, ptr {}",
                        ll_type(&lv_path.ty),
                        rv.scalar(),
                        lv.addr
                    ));
                }
            }
        }
        self.emit_expr(ctx, body)
    }

    fn emit_cond(
        &mut self,
        ctx: &mut FnCtx,
        e: &Expr,
        cond: &Expr,
        succ: &Expr,
        fail: &Expr,
    ) -> RValue {
        let c = self.emit_expr(ctx, cond);
        let cb = ctx.fresh();
        ctx.line(format!("{cb} = icmp ne i64 {}, 0", c.scalar()));

        let ll = ll_type(&e.ty);
        let res = ctx.fresh();
        ctx.line(format!("{res} = alloca {ll}"));

        let lt = ctx.fresh_label("cond.then");
        let lf = ctx.fresh_label("cond.else");
        let lm = ctx.fresh_label("cond.merge");
        ctx.line(format!("br i1 {cb}, label %{lt}, label %{lf}"));

        ctx.label(&lt);
        let tv = self.emit_expr(ctx, succ);
        self.store_branch_result(ctx, &res, tv, &e.ty);
        ctx.line(format!("br label %{lm}"));

        ctx.label(&lf);
        let fv = self.emit_expr(ctx, fail);
        self.store_branch_result(ctx, &res, fv, &e.ty);
        ctx.line(format!("br label %{lm}"));

        ctx.label(&lm);
        if e.ty.is_address_only() {
            RValue::Owned(res)
        } else {
            let v = ctx.fresh();
            ctx.line(format!("{v} = load {ll}, ptr {res}"));
            RValue::Scalar(v)
        }
    }

    fn store_branch_result(&mut self, ctx: &mut FnCtx, res: &str, rv: RValue, ty: &Type) {
        if ty.is_address_only() {
            self.emit_move(ctx, res, rv.addr(), ty);
        } else {
            ctx.line(format!("store {} {}, ptr {res}", ll_type(ty), rv.scalar()));
        }
    }

    fn emit_infix(
        &mut self,
        ctx: &mut FnCtx,
        oper: mvs_ast::OperKind,
        lhs: &Expr,
        rhs: &Expr,
    ) -> RValue {
        let operand_ty = &lhs.ty;

        if operand_ty.is_address_only() {
            // Only equality reaches aggregates.
            let (la, lclean) = self.operand_addr(ctx, lhs);
            let (ra, rclean) = self.operand_addr(ctx, rhs);
            let eq = self.equal_fn(operand_ty);
            let r = ctx.fresh();
            ctx.line(format!("{r} = call i64 {eq}(ptr {la}, ptr {ra})"));
            let out = if oper == mvs_ast::OperKind::Ne {
                let x = ctx.fresh();
                ctx.line(format!("{x} = xor i64 {r}, 1"));
                x
            } else {
                r
            };
            self.run_cleanup(ctx, lclean);
            self.run_cleanup(ctx, rclean);
            return RValue::Scalar(out);
        }

        let lv = self.emit_expr(ctx, lhs);
        let rv = self.emit_expr(ctx, rhs);
        let is_float = matches!(operand_ty, Type::Float);
        let ll = if is_float { "double" } else { "i64" };

        if oper.is_arithmetic() {
            let inst = crate::metatype::scalar_arith_inst(oper, is_float);
            let r = ctx.fresh();
            ctx.line(format!("{r} = {inst} {ll} {}, {}", lv.scalar(), rv.scalar()));
            RValue::Scalar(r)
        } else {
            let inst = crate::metatype::scalar_cmp_inst(oper, is_float);
            let c = ctx.fresh();
            ctx.line(format!("{c} = {inst} {ll} {}, {}", lv.scalar(), rv.scalar()));
            let r = ctx.fresh();
            ctx.line(format!("{r} = zext i1 {c} to i64"));
            RValue::Scalar(r)
        }
    }

    fn emit_cast(&mut self, ctx: &mut FnCtx, value: &Expr, target: &Type) -> RValue {
        if value.ty == *target {
            return self.emit_expr(ctx, value);
        }

        if *target == Type::Any {
            // Wrap: move the value into the container, inline when small.
            let dest = ctx.fresh();
            ctx.line(format!("{dest} = alloca %mvs.Existential"));
            let witness = self.meta_symbol(&value.ty);
            let size = size_of(&value.ty);

            let stor = ctx.fresh();
            ctx.line(format!(
                "{stor} = getelementptr %mvs.Existential, ptr {dest}, i32 0, i32 0"
            ));
            let data = if size <= EXISTENTIAL_INLINE_SIZE {
                stor.clone()
            } else {
                let boxp = ctx.fresh();
                ctx.line(format!("{boxp} = call ptr @mvs_malloc(i64 {size})"));
                ctx.line(format!("store ptr {boxp}, ptr {stor}"));
                boxp
            };

            let rv = self.emit_expr(ctx, value);
            match rv {
                RValue::Scalar(v) => {
                    ctx.line(format!("store {} {v}, ptr {data}", ll_type(&value.ty)));
                }
                RValue::Owned(src) => self.emit_move(ctx, &data, &src, &value.ty),
            }

            let wp = ctx.fresh();
            ctx.line(format!(
                "{wp} = getelementptr %mvs.Existential, ptr {dest}, i32 0, i32 1"
            ));
            ctx.line(format!("store ptr {witness}, ptr {wp}"));
            return RValue::Owned(dest);
        }

        // Unwrap from Any. The witness is trusted: the checker only admits
        // Any-involving conversions, and a mismatched witness is undefined
        // behavior, as in the runtime's container protocol.
        debug_assert_eq!(value.ty, Type::Any);
        let (src, cleanup) = self.operand_addr(ctx, value);
        let size = size_of(target);

        let stor = ctx.fresh();
        ctx.line(format!(
            "{stor} = getelementptr %mvs.Existential, ptr {src}, i32 0, i32 0"
        ));
        let data = if size <= EXISTENTIAL_INLINE_SIZE {
            stor.clone()
        } else {
            let p = ctx.fresh();
            ctx.line(format!("{p} = load ptr, ptr {stor}"));
            p
        };

        let out = if target.is_address_only() {
            let dest = ctx.fresh();
            ctx.line(format!("{dest} = alloca {}", ll_type(target)));
            self.emit_copy(ctx, &dest, &data, target);
            RValue::Owned(dest)
        } else {
            let v = ctx.fresh();
            ctx.line(format!("{v} = load {}, ptr {data}", ll_type(target)));
            RValue::Scalar(v)
        };
        self.run_cleanup(ctx, cleanup);
        out
    }

    fn emit_path_rvalue(&mut self, ctx: &mut FnCtx, path: &Path) -> RValue {
        if let PathKind::Name { name, nref } = &path.kind {
            match nref {
                NameRef::GlobalFunc => {
                    let symbol = self.resolve_global(name);
                    return self.materialize_closure(ctx, &symbol);
                }
                NameRef::Builtin(b) => {
                    let code = self.builtin_thunk(*b);
                    return self.materialize_closure(ctx, &code);
                }
                NameRef::Local => {}
            }
        }

        let lv = self.emit_path_addr(ctx, path, false);
        if path.ty.is_address_only() {
            let tmp = ctx.fresh();
            ctx.line(format!("{tmp} = alloca {}", ll_type(&path.ty)));
            self.emit_copy(ctx, &tmp, &lv.addr, &path.ty);
            self.drop_origin(ctx, lv);
            RValue::Owned(tmp)
        } else {
            let v = ctx.fresh();
            ctx.line(format!("{v} = load {}, ptr {}", ll_type(&path.ty), lv.addr));
            self.drop_origin(ctx, lv);
            RValue::Scalar(v)
        }
    }

    /// Address of a path. With `write` set, every array storage block along
    /// the way is uniquified root-first (the copy-on-write discipline);
    /// stack-backed arrays are statically unique and skip the call.
    fn emit_path_addr(&mut self, ctx: &mut FnCtx, path: &Path, write: bool) -> LValue {
        match &path.kind {
            PathKind::Name { name, nref } => match nref {
                NameRef::Local => {
                    let slot = ctx.resolve(name).clone();
                    LValue {
                        addr: slot.addr,
                        origin: None,
                    }
                }
                NameRef::GlobalFunc => {
                    let symbol = self.resolve_global(name);
                    let rv = self.materialize_closure(ctx, &symbol);
                    let addr = rv.addr().to_string();
                    LValue {
                        addr: addr.clone(),
                        origin: Some((addr, path.ty.clone())),
                    }
                }
                NameRef::Builtin(b) => {
                    let code = self.builtin_thunk(*b);
                    let rv = self.materialize_closure(ctx, &code);
                    let addr = rv.addr().to_string();
                    LValue {
                        addr: addr.clone(),
                        origin: Some((addr, path.ty.clone())),
                    }
                }
            },
            PathKind::Prop { base, index, .. } => {
                let b = self.emit_path_addr(ctx, base, write);
                let f = ctx.fresh();
                ctx.line(format!(
                    "{f} = getelementptr {}, ptr {}, i32 0, i32 {index}",
                    ll_type(&base.ty),
                    b.addr
                ));
                LValue {
                    addr: f,
                    origin: b.origin,
                }
            }
            PathKind::Elem { base, index } => {
                let b = self.emit_path_addr(ctx, base, write);
                let Type::Array(elem_ty) = &base.ty else {
                    unreachable!("subscript bases are arrays")
                };
                if write && !is_stack_array_root(ctx, base) {
                    let meta = self.meta_symbol(elem_ty);
                    ctx.line(format!(
                        "call void @mvs_array_uniq(ptr {}, ptr {meta})",
                        b.addr
                    ));
                }
                let pay = ctx.fresh();
                ctx.line(format!("{pay} = load ptr, ptr {}", b.addr));
                let idx = self.emit_expr(ctx, index);
                let slot = ctx.fresh();
                ctx.line(format!(
                    "{slot} = getelementptr {}, ptr {pay}, i64 {}",
                    ll_type(elem_ty),
                    idx.scalar()
                ));
                LValue {
                    addr: slot,
                    origin: b.origin,
                }
            }
            PathKind::RValue(e) => {
                let rv = self.emit_expr(ctx, e);
                let addr = rv.addr().to_string();
                LValue {
                    addr: addr.clone(),
                    origin: Some((addr, e.ty.clone())),
                }
            }
        }
    }

    // ----- Calls ----------------------------------------------------------

    fn emit_call(
        &mut self,
        ctx: &mut FnCtx,
        callee: &Expr,
        args: &[Expr],
        out_ty: &Type,
    ) -> RValue {
        let Type::Func { params, .. } = &callee.ty else {
            unreachable!("call callees have function type")
        };
        let params = params.clone();

        // Builtins keep their native C signatures.
        if let ExprKind::Path(p) = &callee.kind {
            if let PathKind::Name {
                nref: NameRef::Builtin(b),
                ..
            } = &p.kind
            {
                return self.emit_builtin_call(ctx, *b, args);
            }
        }

        enum Dispatch {
            Direct(String),
            Indirect { code: String, env: String },
        }

        let mut cleanups: Vec<Cleanup> = Vec::new();
        let dispatch = match &callee.kind {
            ExprKind::Path(Path {
                kind:
                    PathKind::Name {
                        nref: NameRef::GlobalFunc,
                        name,
                    },
                ..
            }) => Dispatch::Direct(self.resolve_global(name)),
            _ => {
                let (clo, cleanup) = self.operand_addr(ctx, callee);
                cleanups.push(cleanup);
                let cp = ctx.fresh();
                ctx.line(format!(
                    "{cp} = getelementptr %mvs.AnyClosure, ptr {clo}, i32 0, i32 0"
                ));
                let code = ctx.fresh();
                ctx.line(format!("{code} = load ptr, ptr {cp}"));
                let ep = ctx.fresh();
                ctx.line(format!(
                    "{ep} = getelementptr %mvs.AnyClosure, ptr {clo}, i32 0, i32 1"
                ));
                let env = ctx.fresh();
                ctx.line(format!("{env} = load ptr, ptr {ep}"));
                Dispatch::Indirect { code, env }
            }
        };

        // Arguments, left to right.
        let mut arg_list: Vec<String> = Vec::new();
        for (arg, pty) in args.iter().zip(&params) {
            match pty {
                Type::Inout(_) => {
                    let rv = self.emit_expr(ctx, arg);
                    arg_list.push(format!("ptr {}", rv.scalar()));
                }
                Type::Int => {
                    let rv = self.emit_expr(ctx, arg);
                    arg_list.push(format!("i64 {}", rv.scalar()));
                }
                Type::Float => {
                    let rv = self.emit_expr(ctx, arg);
                    arg_list.push(format!("double {}", rv.scalar()));
                }
                _ => {
                    // Address-only by value: pass a borrowed address when
                    // the argument is a non-function path, else an owned
                    // temporary dropped after the call.
                    if let ExprKind::Path(p) = &arg.kind {
                        let borrowable = p.mutability == mvs_ast::Mutability::Let
                            && !matches!(arg.ty, Type::Func { .. })
                            && !path_needs_materializing(p);
                        if borrowable {
                            let lv = self.emit_path_addr(ctx, p, false);
                            arg_list.push(format!("ptr {}", lv.addr));
                            cleanups.push(Cleanup::Origin(lv.origin));
                            continue;
                        }
                    }
                    let rv = self.emit_expr(ctx, arg);
                    let addr = rv.addr().to_string();
                    arg_list.push(format!("ptr {addr}"));
                    cleanups.push(Cleanup::Owned(addr, arg.ty.clone()));
                }
            }
        }

        // Address-only results return through a leading out-pointer; the
        // environment pointer always rides last (null for direct calls).
        let dest = if out_ty.is_address_only() {
            let dest = ctx.fresh();
            ctx.line(format!("{dest} = alloca {}", ll_type(out_ty)));
            arg_list.insert(0, format!("ptr {dest}"));
            Some(dest)
        } else {
            None
        };

        let (code, env) = match &dispatch {
            Dispatch::Direct(symbol) => (symbol.clone(), "null".to_string()),
            Dispatch::Indirect { code, env } => (code.clone(), env.clone()),
        };
        arg_list.push(format!("ptr {env}"));

        let ret = lifted_ret_type(out_ty);
        let args_s = arg_list.join(", ");
        let result = if ret == "void" {
            ctx.line(format!("call void {code}({args_s})"));
            RValue::Owned(dest.expect("void returns use an out-pointer"))
        } else {
            let r = ctx.fresh();
            ctx.line(format!("{r} = call {ret} {code}({args_s})"));
            RValue::Scalar(r)
        };

        for cleanup in cleanups {
            self.run_cleanup(ctx, cleanup);
        }
        result
    }

    fn emit_builtin_call(&mut self, ctx: &mut FnCtx, b: Builtin, args: &[Expr]) -> RValue {
        match b {
            Builtin::Uptime => {
                let r = ctx.fresh();
                ctx.line(format!("{r} = call double @mvs_uptime_nanoseconds()"));
                RValue::Scalar(r)
            }
            Builtin::Sqrt => {
                let x = self.emit_expr(ctx, &args[0]);
                let r = ctx.fresh();
                ctx.line(format!("{r} = call double @mvs_sqrt(double {})", x.scalar()));
                RValue::Scalar(r)
            }
        }
    }

    // ----- Functions and closures -----------------------------------------

    /// Emits a lifted function. Every lifted function takes an optional
    /// leading out-pointer, its declared parameters, and a trailing
    /// environment pointer.
    fn emit_function(&mut self, symbol: &str, func: &Func, env_id: Option<u32>) {
        let out_addr_only = func.output.is_address_only();
        let ret = lifted_ret_type(&func.output);

        let mut sig: Vec<String> = Vec::new();
        if out_addr_only {
            sig.push("ptr %ret".to_string());
        }
        for (i, p) in func.params.iter().enumerate() {
            sig.push(format!("{} %p{i}", ll_param_type(&p.ty)));
        }
        sig.push("ptr %env".to_string());

        let mut ctx = FnCtx::new();
        for (i, p) in func.params.iter().enumerate() {
            let incoming = format!("%p{i}");
            let slot = match &p.ty {
                Type::Inout(inner) => Slot {
                    addr: incoming,
                    ty: (**inner).clone(),
                    kind: SlotKind::Borrowed,
                },
                Type::Int | Type::Float => {
                    let a = ctx.fresh();
                    ctx.line(format!("{a} = alloca {}", ll_type(&p.ty)));
                    ctx.line(format!("store {} {incoming}, ptr {a}", ll_type(&p.ty)));
                    Slot {
                        addr: a,
                        ty: p.ty.clone(),
                        kind: SlotKind::Owned,
                    }
                }
                _ => Slot {
                    addr: incoming,
                    ty: p.ty.clone(),
                    kind: SlotKind::Borrowed,
                },
            };
            ctx.define(&p.name, slot);
        }

        if let Some(id) = env_id {
            let env_ty = format!("%mvs.env.{id}");
            for (i, c) in func.captures.iter().enumerate() {
                let a = ctx.fresh();
                ctx.line(format!(
                    "{a} = getelementptr {env_ty}, ptr %env, i32 0, i32 {i}"
                ));
                ctx.define(
                    &c.name,
                    Slot {
                        addr: a,
                        ty: c.ty.clone(),
                        kind: SlotKind::Borrowed,
                    },
                );
            }
        }

        let rv = self.emit_expr(&mut ctx, &func.body);
        if out_addr_only {
            self.emit_move(&mut ctx, "%ret", rv.addr(), &func.output);
            ctx.line("ret void");
        } else {
            ctx.line(format!("ret {ret} {}", rv.scalar()));
        }

        let body = ctx.buf;
        self.fns.push_str(&format!(
            "define private {ret} {symbol}({}) {{\nentry:\n{body}}}\n\n",
            sig.join(", ")
        ));
    }

    fn emit_closure_literal(&mut self, ctx: &mut FnCtx, func: &Func) -> RValue {
        let id = self.next_closure;
        self.next_closure += 1;
        let symbol = format!("@mvs.closure.{id}");
        let has_env = !func.captures.is_empty();

        if has_env {
            let fields: Vec<String> = func.captures.iter().map(|c| ll_type(&c.ty)).collect();
            let name = format!("%mvs.env.{id}");
            self.type_defs.insert(
                name.clone(),
                format!("{name} = type <{{ {} }}>", fields.join(", ")),
            );
        }

        self.emit_function(&symbol, func, has_env.then_some(id));

        let (copy_sym, drop_sym, equal_sym) = if has_env {
            self.emit_env_lifecycle(id, &func.captures)
        } else {
            ("null".to_string(), "null".to_string(), "null".to_string())
        };

        // Build the environment record: a heap block holding a copy of each
        // capture, in sorted order.
        let env = if has_env {
            let env_ty = format!("%mvs.env.{id}");
            let size: u64 = func.captures.iter().map(|c| size_of(&c.ty)).sum();
            let env = ctx.fresh();
            ctx.line(format!("{env} = call ptr @mvs_malloc(i64 {size})"));
            for (i, c) in func.captures.iter().enumerate() {
                let dst = ctx.fresh();
                ctx.line(format!(
                    "{dst} = getelementptr {env_ty}, ptr {env}, i32 0, i32 {i}"
                ));
                let src = ctx.resolve(&c.name).clone();
                self.emit_copy(ctx, &dst, &src.addr, &c.ty);
            }
            env
        } else {
            "null".to_string()
        };

        let clo = ctx.fresh();
        ctx.line(format!("{clo} = alloca %mvs.AnyClosure"));
        for (i, v) in [
            (0, format!("{symbol}")),
            (1, env),
            (2, copy_sym),
            (3, drop_sym),
            (4, equal_sym),
        ] {
            let f = ctx.fresh();
            ctx.line(format!(
                "{f} = getelementptr %mvs.AnyClosure, ptr {clo}, i32 0, i32 {i}"
            ));
            ctx.line(format!("store ptr {v}, ptr {f}"));
        }
        RValue::Owned(clo)
    }

    /// The per-literal environment lifecycle: each closure instance knows
    /// how to copy, drop, and compare its own environment layout.
    fn emit_env_lifecycle(&mut self, id: u32, captures: &[Capture]) -> (String, String, String) {
        let env_ty = format!("%mvs.env.{id}");
        let size: u64 = captures.iter().map(|c| size_of(&c.ty)).sum();
        let copy_sym = format!("@mvs.closure.{id}.copy");
        let drop_sym = format!("@mvs.closure.{id}.drop");
        let equal_sym = format!("@mvs.closure.{id}.equal");

        // drop
        let mut body = String::new();
        body.push_str(
            "  %envp = getelementptr %mvs.AnyClosure, ptr %c, i32 0, i32 1\n\
             \x20 %env = load ptr, ptr %envp\n",
        );
        for (i, c) in captures.iter().enumerate() {
            if c.ty.is_trivial() {
                continue;
            }
            let f = self.drop_fn(&c.ty).expect("non-trivial capture has a drop");
            body.push_str(&format!(
                "  %f{i} = getelementptr {env_ty}, ptr %env, i32 0, i32 {i}\n\
                 \x20 call void {f}(ptr %f{i})\n"
            ));
        }
        body.push_str("  call void @mvs_free(ptr %env)\n");
        self.fns.push_str(&format!(
            "define private void {drop_sym}(ptr %c) {{\nentry:\n{body}  ret void\n}}\n\n"
        ));

        // copy
        let mut body = String::new();
        body.push_str(&format!(
            "  call void @llvm.memcpy.p0.p0.i64(ptr %dst, ptr %src, i64 {}, i1 false)\n\
             \x20 %sep = getelementptr %mvs.AnyClosure, ptr %src, i32 0, i32 1\n\
             \x20 %senv = load ptr, ptr %sep\n\
             \x20 %nenv = call ptr @mvs_malloc(i64 {size})\n",
            crate::layout::CLOSURE_SIZE
        ));
        for (i, c) in captures.iter().enumerate() {
            body.push_str(&format!(
                "  %d{i} = getelementptr {env_ty}, ptr %nenv, i32 0, i32 {i}\n\
                 \x20 %s{i} = getelementptr {env_ty}, ptr %senv, i32 0, i32 {i}\n"
            ));
            if c.ty.is_trivial() {
                let n = size_of(&c.ty);
                body.push_str(&format!(
                    "  call void @llvm.memcpy.p0.p0.i64(ptr %d{i}, ptr %s{i}, i64 {n}, i1 false)\n"
                ));
            } else {
                let f = self.copy_fn(&c.ty).expect("non-trivial capture has a copy");
                body.push_str(&format!("  call void {f}(ptr %d{i}, ptr %s{i})\n"));
            }
        }
        body.push_str(
            "  %dep = getelementptr %mvs.AnyClosure, ptr %dst, i32 0, i32 1\n\
             \x20 store ptr %nenv, ptr %dep\n",
        );
        self.fns.push_str(&format!(
            "define private void {copy_sym}(ptr %dst, ptr %src) {{\nentry:\n{body}  ret void\n}}\n\n"
        ));

        // equal: element-wise over the environments (the caller already
        // compared code pointers).
        let mut body = String::new();
        body.push_str(
            "  %aep = getelementptr %mvs.AnyClosure, ptr %a, i32 0, i32 1\n\
             \x20 %aenv = load ptr, ptr %aep\n\
             \x20 %bep = getelementptr %mvs.AnyClosure, ptr %b, i32 0, i32 1\n\
             \x20 %benv = load ptr, ptr %bep\n",
        );
        let mut acc = "1".to_string();
        for (i, c) in captures.iter().enumerate() {
            body.push_str(&format!(
                "  %fa{i} = getelementptr {env_ty}, ptr %aenv, i32 0, i32 {i}\n\
                 \x20 %fb{i} = getelementptr {env_ty}, ptr %benv, i32 0, i32 {i}\n"
            ));
            let eq = self.equal_fn(&c.ty);
            body.push_str(&format!("  %e{i} = call i64 {eq}(ptr %fa{i}, ptr %fb{i})\n"));
            let next = format!("%q{i}");
            body.push_str(&format!("  {next} = and i64 {acc}, %e{i}\n"));
            acc = next;
        }
        self.fns.push_str(&format!(
            "define private i64 {equal_sym}(ptr %a, ptr %b) {{\nentry:\n{body}  ret i64 {acc}\n}}\n\n"
        ));

        (copy_sym, drop_sym, equal_sym)
    }

    /// A closure record wrapping a capture-less code pointer.
    fn materialize_closure(&mut self, ctx: &mut FnCtx, code: &str) -> RValue {
        let clo = ctx.fresh();
        ctx.line(format!("{clo} = alloca %mvs.AnyClosure"));
        for i in 0..5 {
            let f = ctx.fresh();
            ctx.line(format!(
                "{f} = getelementptr %mvs.AnyClosure, ptr {clo}, i32 0, i32 {i}"
            ));
            let v = if i == 0 { code } else { "null" };
            ctx.line(format!("store ptr {v}, ptr {f}"));
        }
        RValue::Owned(clo)
    }

    fn resolve_global(&self, name: &str) -> String {
        self.globals_stack
            .iter()
            .rev()
            .find(|g| g.name == name)
            .map(|g| g.symbol.clone())
            .expect("the checker resolved every global name")
    }

    // ----- Value plumbing -------------------------------------------------

    /// Address of an operand for a by-address consumer: the path's own
    /// address when borrowable, else owned temporary storage.
    fn operand_addr(&mut self, ctx: &mut FnCtx, e: &Expr) -> (String, Cleanup) {
        if let ExprKind::Path(p) = &e.kind {
            if !path_needs_materializing(p) {
                let lv = self.emit_path_addr(ctx, p, false);
                return (lv.addr, Cleanup::Origin(lv.origin));
            }
        }
        let rv = self.emit_expr(ctx, e);
        let addr = rv.addr().to_string();
        (addr.clone(), Cleanup::Owned(addr, e.ty.clone()))
    }

    fn run_cleanup(&mut self, ctx: &mut FnCtx, cleanup: Cleanup) {
        match cleanup {
            Cleanup::Origin(Some((addr, ty))) => self.emit_drop(ctx, &addr, &ty),
            Cleanup::Origin(None) => {}
            Cleanup::Owned(addr, ty) => self.emit_drop(ctx, &addr, &ty),
        }
    }

    fn drop_origin(&mut self, ctx: &mut FnCtx, lv: LValue) {
        if let Some((addr, ty)) = lv.origin {
            self.emit_drop(ctx, &addr, &ty);
        }
    }

    fn drop_rvalue(&mut self, ctx: &mut FnCtx, rv: RValue, ty: &Type) {
        if let RValue::Owned(addr) = rv {
            self.emit_drop(ctx, &addr, ty);
        }
    }

    fn emit_drop(&mut self, ctx: &mut FnCtx, addr: &str, ty: &Type) {
        if ty.is_trivial() {
            return;
        }
        let f = self.drop_fn(ty).expect("non-trivial type has a drop");
        ctx.line(format!("call void {f}(ptr {addr})"));
    }

    /// Copies the value at `src` into `dst`; both sides stay owned by
    /// their holders.
    fn emit_copy(&mut self, ctx: &mut FnCtx, dst: &str, src: &str, ty: &Type) {
        if ty.is_trivial() {
            let n = size_of(ty);
            if n > 0 {
                self.memcpy(ctx, dst, src, n);
            }
            return;
        }
        let f = self.copy_fn(ty).expect("non-trivial type has a copy");
        ctx.line(format!("call void {f}(ptr {dst}, ptr {src})"));
    }

    /// Moves an owned value from `src` into `dst`: a bitwise transfer of
    /// ownership, so `src` must not be dropped afterwards.
    fn emit_move(&mut self, ctx: &mut FnCtx, dst: &str, src: &str, ty: &Type) {
        let n = size_of(ty);
        if n > 0 {
            self.memcpy(ctx, dst, src, n);
        }
    }

    fn memcpy(&mut self, ctx: &mut FnCtx, dst: &str, src: &str, n: u64) {
        ctx.line(format!(
            "call void @llvm.memcpy.p0.p0.i64(ptr {dst}, ptr {src}, i64 {n}, i1 false)"
        ));
    }

    fn pop_scope(&mut self, ctx: &mut FnCtx) {
        let scope = ctx.scopes.pop().expect("scope stack is never empty");
        for (_, slot) in scope.iter().rev() {
            if slot.kind == SlotKind::Owned {
                self.emit_drop(ctx, &slot.addr, &slot.ty);
            }
        }
    }
}

enum Cleanup {
    Origin(Option<(String, Type)>),
    Owned(String, Type),
}

/// Whether an rvalue use of this path must go through closure
/// materialization (global functions and builtins have no storage).
fn path_needs_materializing(p: &Path) -> bool {
    matches!(
        &p.kind,
        PathKind::Name {
            nref: NameRef::GlobalFunc | NameRef::Builtin(_),
            ..
        }
    )
}

fn path_is_name_rooted(p: &Path) -> bool {
    match &p.kind {
        PathKind::Name {
            nref: NameRef::Local,
            ..
        } => true,
        PathKind::Name { .. } => false,
        PathKind::Prop { base, .. } | PathKind::Elem { base, .. } => path_is_name_rooted(base),
        PathKind::RValue(_) => false,
    }
}

fn is_stack_array_root(ctx: &FnCtx, base: &Path) -> bool {
    match &base.kind {
        PathKind::Name {
            name,
            nref: NameRef::Local,
        } => ctx.resolve(name).kind == SlotKind::StackArray,
        _ => false,
    }
}

fn paths_identical(a: &Path, b: &Path) -> bool {
    match (&a.kind, &b.kind) {
        (PathKind::Name { name: x, .. }, PathKind::Name { name: y, .. }) => x == y,
        (
            PathKind::Prop {
                base: ba,
                index: ia,
                ..
            },
            PathKind::Prop {
                base: bb,
                index: ib,
                ..
            },
        ) => ia == ib && paths_identical(ba, bb),
        (
            PathKind::Elem {
                base: ba,
                index: xa,
            },
            PathKind::Elem {
                base: bb,
                index: xb,
            },
        ) => {
            matches!(
                (&xa.kind, &xb.kind),
                (ExprKind::Int(i), ExprKind::Int(j)) if i == j
            ) && paths_identical(ba, bb)
        }
        _ => false,
    }
}

fn float_lit(v: f64) -> String {
    format!("0x{:016X}", v.to_bits())
}

const RUNTIME_DECLS: &str = "\
declare ptr @mvs_malloc(i64)
declare void @mvs_free(ptr)
declare void @mvs_array_init(ptr, ptr, i64, i64)
declare void @mvs_array_drop(ptr, ptr)
declare void @mvs_array_copy(ptr, ptr)
declare void @mvs_array_uniq(ptr, ptr)
declare i64 @mvs_array_equal(ptr, ptr, ptr)
declare void @mvs_exist_drop(ptr)
declare void @mvs_exist_copy(ptr, ptr)
declare i64 @mvs_exist_equal(ptr, ptr)
declare void @mvs_print_i64(i64)
declare void @mvs_print_f64(double)
declare double @mvs_uptime_nanoseconds()
declare double @mvs_sqrt(double)
declare void @llvm.memcpy.p0.p0.i64(ptr, ptr, i64, i1)
declare ptr @llvm.stacksave.p0()
declare void @llvm.stackrestore.p0(ptr)
";
