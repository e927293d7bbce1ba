#![forbid(unsafe_code)]

//! Metatype constants and per-type lifecycle functions.
//!
//! Each distinct type gets at most one metatype constant and one set of
//! `drop`/`copy`/`equal` functions, cached by mangled name. `init` is never
//! emitted: a zero-filled value is valid for every type (null array
//! payload, null closure, zero scalars), so the runtime's "null means
//! zero-fill" convention covers initialization.

use mvs_core::{thir, Type};

use crate::codegen::Emitter;
use crate::layout::{ll_type, mangle, size_of, CLOSURE_SIZE};

impl Emitter<'_> {
    /// Returns the symbol of the metatype constant for `ty`, emitting the
    /// constant and the lifecycle functions it references on first use.
    pub(crate) fn meta_symbol(&mut self, ty: &Type) -> String {
        let m = mangle(ty);
        let symbol = format!("@mvs.meta.{m}");
        if self.meta_emitted.contains(&m) {
            return symbol;
        }
        self.meta_emitted.insert(m.clone());

        self.ensure_lifecycle(ty);
        let size = size_of(ty);
        let drop = self
            .drop_fn(ty)
            .unwrap_or_else(|| "null".to_string());
        let copy = self
            .copy_fn(ty)
            .unwrap_or_else(|| "null".to_string());
        let equal = self.equal_fn(ty);

        self.globals.push_str(&format!(
            "{symbol} = private constant %mvs.MetaType <{{ i64 {size}, ptr null, ptr {drop}, ptr {copy}, ptr {equal} }}>\n"
        ));
        symbol
    }

    /// Symbol of the drop function, or `None` for trivial types.
    pub(crate) fn drop_fn(&mut self, ty: &Type) -> Option<String> {
        if ty.is_trivial() {
            return None;
        }
        self.ensure_lifecycle(ty);
        Some(format!("@mvs.drop.{}", mangle(ty)))
    }

    /// Symbol of the copy function, or `None` for trivial types.
    pub(crate) fn copy_fn(&mut self, ty: &Type) -> Option<String> {
        if ty.is_trivial() {
            return None;
        }
        self.ensure_lifecycle(ty);
        Some(format!("@mvs.copy.{}", mangle(ty)))
    }

    /// Symbol of the equality function; every type has one.
    pub(crate) fn equal_fn(&mut self, ty: &Type) -> String {
        self.ensure_lifecycle(ty);
        format!("@mvs.equal.{}", mangle(ty))
    }

    fn ensure_lifecycle(&mut self, ty: &Type) {
        let m = mangle(ty);
        if self.lifecycle_emitted.contains(&m) {
            return;
        }
        self.lifecycle_emitted.insert(m.clone());

        match ty {
            Type::Int => self.emit_scalar_equal(&m, "i64", "icmp eq i64"),
            Type::Float => self.emit_scalar_equal(&m, "double", "fcmp oeq double"),
            Type::Array(elem) => self.emit_array_lifecycle(&m, elem),
            Type::Struct { props, .. } => {
                let props = props.clone();
                self.emit_struct_lifecycle(&m, ty, &props);
            }
            Type::Func { .. } => self.emit_closure_lifecycle(&m),
            Type::Any => self.emit_existential_lifecycle(&m),
            Type::Inout(_) | Type::Error => {
                unreachable!("no lifecycle for inout or error types")
            }
        }
    }

    fn emit_scalar_equal(&mut self, m: &str, ll: &str, cmp: &str) {
        self.fns.push_str(&format!(
            "define private i64 @mvs.equal.{m}(ptr %a, ptr %b) {{\n\
             entry:\n\
             \x20 %x = load {ll}, ptr %a\n\
             \x20 %y = load {ll}, ptr %b\n\
             \x20 %c = {cmp} %x, %y\n\
             \x20 %r = zext i1 %c to i64\n\
             \x20 ret i64 %r\n\
             }}\n\n"
        ));
    }

    fn emit_array_lifecycle(&mut self, m: &str, elem: &Type) {
        let meta = self.meta_symbol(elem);
        self.fns.push_str(&format!(
            "define private void @mvs.drop.{m}(ptr %a) {{\n\
             entry:\n\
             \x20 call void @mvs_array_drop(ptr %a, ptr {meta})\n\
             \x20 ret void\n\
             }}\n\n\
             define private void @mvs.copy.{m}(ptr %dst, ptr %src) {{\n\
             entry:\n\
             \x20 call void @mvs_array_copy(ptr %dst, ptr %src)\n\
             \x20 ret void\n\
             }}\n\n\
             define private i64 @mvs.equal.{m}(ptr %a, ptr %b) {{\n\
             entry:\n\
             \x20 %r = call i64 @mvs_array_equal(ptr %a, ptr %b, ptr {meta})\n\
             \x20 ret i64 %r\n\
             }}\n\n"
        ));
    }

    fn emit_struct_lifecycle(&mut self, m: &str, ty: &Type, props: &[mvs_core::Prop]) {
        let ll = ll_type(ty);
        let trivial = ty.is_trivial();

        if !trivial {
            // drop: field-wise over the non-trivial fields.
            let mut body = String::new();
            for (i, p) in props.iter().enumerate() {
                if p.ty.is_trivial() {
                    continue;
                }
                let f = self.drop_fn(&p.ty).expect("non-trivial field has a drop");
                body.push_str(&format!(
                    "  %f{i} = getelementptr {ll}, ptr %v, i32 0, i32 {i}\n\
                     \x20 call void {f}(ptr %f{i})\n"
                ));
            }
            self.fns.push_str(&format!(
                "define private void @mvs.drop.{m}(ptr %v) {{\nentry:\n{body}  ret void\n}}\n\n"
            ));

            // copy: trivial fields bitwise, the rest through their copy.
            let mut body = String::new();
            for (i, p) in props.iter().enumerate() {
                body.push_str(&format!(
                    "  %d{i} = getelementptr {ll}, ptr %dst, i32 0, i32 {i}\n\
                     \x20 %s{i} = getelementptr {ll}, ptr %src, i32 0, i32 {i}\n"
                ));
                if p.ty.is_trivial() {
                    let n = size_of(&p.ty);
                    body.push_str(&format!(
                        "  call void @llvm.memcpy.p0.p0.i64(ptr %d{i}, ptr %s{i}, i64 {n}, i1 false)\n"
                    ));
                } else {
                    let f = self.copy_fn(&p.ty).expect("non-trivial field has a copy");
                    body.push_str(&format!("  call void {f}(ptr %d{i}, ptr %s{i})\n"));
                }
            }
            self.fns.push_str(&format!(
                "define private void @mvs.copy.{m}(ptr %dst, ptr %src) {{\nentry:\n{body}  ret void\n}}\n\n"
            ));
        }

        // equal: conjunction over the fields; an empty struct is always
        // equal to itself.
        let mut body = String::new();
        let mut acc = "1".to_string();
        for (i, p) in props.iter().enumerate() {
            body.push_str(&format!(
                "  %a{i} = getelementptr {ll}, ptr %a, i32 0, i32 {i}\n\
                 \x20 %b{i} = getelementptr {ll}, ptr %b, i32 0, i32 {i}\n"
            ));
            let eq = self.equal_fn(&p.ty);
            body.push_str(&format!(
                "  %e{i} = call i64 {eq}(ptr %a{i}, ptr %b{i})\n"
            ));
            let next = format!("%q{i}");
            body.push_str(&format!("  {next} = and i64 {acc}, %e{i}\n"));
            acc = next;
        }
        self.fns.push_str(&format!(
            "define private i64 @mvs.equal.{m}(ptr %a, ptr %b) {{\nentry:\n{body}  ret i64 {acc}\n}}\n\n"
        ));
    }

    /// Closure values carry their own lifecycle in the record itself; the
    /// type-level functions just dispatch through those fields (bitwise
    /// when null, which is the capture-less case).
    fn emit_closure_lifecycle(&mut self, m: &str) {
        self.fns.push_str(&format!(
            "define private void @mvs.drop.{m}(ptr %c) {{\n\
             entry:\n\
             \x20 %fp = getelementptr %mvs.AnyClosure, ptr %c, i32 0, i32 3\n\
             \x20 %f = load ptr, ptr %fp\n\
             \x20 %isnull = icmp eq ptr %f, null\n\
             \x20 br i1 %isnull, label %done, label %call\n\
             call:\n\
             \x20 call void %f(ptr %c)\n\
             \x20 br label %done\n\
             done:\n\
             \x20 ret void\n\
             }}\n\n\
             define private void @mvs.copy.{m}(ptr %dst, ptr %src) {{\n\
             entry:\n\
             \x20 %fp = getelementptr %mvs.AnyClosure, ptr %src, i32 0, i32 2\n\
             \x20 %f = load ptr, ptr %fp\n\
             \x20 %isnull = icmp eq ptr %f, null\n\
             \x20 br i1 %isnull, label %bitwise, label %call\n\
             call:\n\
             \x20 call void %f(ptr %dst, ptr %src)\n\
             \x20 br label %done\n\
             bitwise:\n\
             \x20 call void @llvm.memcpy.p0.p0.i64(ptr %dst, ptr %src, i64 {CLOSURE_SIZE}, i1 false)\n\
             \x20 br label %done\n\
             done:\n\
             \x20 ret void\n\
             }}\n\n\
             define private i64 @mvs.equal.{m}(ptr %a, ptr %b) {{\n\
             entry:\n\
             \x20 %ap = getelementptr %mvs.AnyClosure, ptr %a, i32 0, i32 0\n\
             \x20 %ac = load ptr, ptr %ap\n\
             \x20 %bp = getelementptr %mvs.AnyClosure, ptr %b, i32 0, i32 0\n\
             \x20 %bc = load ptr, ptr %bp\n\
             \x20 %same = icmp eq ptr %ac, %bc\n\
             \x20 br i1 %same, label %envs, label %noteq\n\
             envs:\n\
             \x20 %ep = getelementptr %mvs.AnyClosure, ptr %a, i32 0, i32 4\n\
             \x20 %ef = load ptr, ptr %ep\n\
             \x20 %enull = icmp eq ptr %ef, null\n\
             \x20 br i1 %enull, label %eq, label %callenv\n\
             callenv:\n\
             \x20 %r = call i64 %ef(ptr %a, ptr %b)\n\
             \x20 ret i64 %r\n\
             eq:\n\
             \x20 ret i64 1\n\
             noteq:\n\
             \x20 ret i64 0\n\
             }}\n\n"
        ));
    }

    fn emit_existential_lifecycle(&mut self, m: &str) {
        self.fns.push_str(&format!(
            "define private void @mvs.drop.{m}(ptr %v) {{\n\
             entry:\n\
             \x20 call void @mvs_exist_drop(ptr %v)\n\
             \x20 ret void\n\
             }}\n\n\
             define private void @mvs.copy.{m}(ptr %dst, ptr %src) {{\n\
             entry:\n\
             \x20 call void @mvs_exist_copy(ptr %dst, ptr %src)\n\
             \x20 ret void\n\
             }}\n\n\
             define private i64 @mvs.equal.{m}(ptr %a, ptr %b) {{\n\
             entry:\n\
             \x20 %r = call i64 @mvs_exist_equal(ptr %a, ptr %b)\n\
             \x20 ret i64 %r\n\
             }}\n\n"
        ));
    }

    /// First-class operators lower to memoized capture-less thunks, one per
    /// (operator, operand type).
    pub(crate) fn oper_thunk(&mut self, oper: mvs_ast::OperKind, operand: &Type) -> String {
        use mvs_ast::OperKind;

        let key = format!("{}.{}", oper_name(oper), mangle(operand));
        if let Some(symbol) = self.oper_thunks.get(&key) {
            return symbol.clone();
        }
        let symbol = format!("@mvs.oper.{key}");
        self.oper_thunks.insert(key, symbol.clone());

        if operand.is_address_only() {
            // Equality overloads are the only ones defined on aggregates.
            let eq = self.equal_fn(operand);
            let body = match oper {
                OperKind::Eq => format!(
                    "  %r = call i64 {eq}(ptr %a, ptr %b)\n  ret i64 %r\n"
                ),
                OperKind::Ne => format!(
                    "  %e = call i64 {eq}(ptr %a, ptr %b)\n\
                     \x20 %r = xor i64 %e, 1\n\
                     \x20 ret i64 %r\n"
                ),
                _ => unreachable!("only equality operators apply to aggregates"),
            };
            self.fns.push_str(&format!(
                "define private i64 {symbol}(ptr %a, ptr %b, ptr %env) {{\nentry:\n{body}}}\n\n"
            ));
            return symbol;
        }

        let (ll, is_float) = match operand {
            Type::Int => ("i64", false),
            Type::Float => ("double", true),
            _ => unreachable!("scalar operator thunks are numeric"),
        };

        let body = if oper.is_arithmetic() {
            let inst = scalar_arith_inst(oper, is_float);
            format!("  %r = {inst} {ll} %a, %b\n  ret {ll} %r\n")
        } else {
            let inst = scalar_cmp_inst(oper, is_float);
            format!(
                "  %c = {inst} {ll} %a, %b\n\
                 \x20 %r = zext i1 %c to i64\n\
                 \x20 ret i64 %r\n"
            )
        };
        let ret = if oper.is_arithmetic() { ll } else { "i64" };
        self.fns.push_str(&format!(
            "define private {ret} {symbol}({ll} %a, {ll} %b, ptr %env) {{\nentry:\n{body}}}\n\n"
        ));
        symbol
    }

    /// Built-in functions referenced as values get a thunk with the lifted
    /// calling convention (trailing environment pointer).
    pub(crate) fn builtin_thunk(&mut self, b: thir::Builtin) -> String {
        let (name, def) = match b {
            thir::Builtin::Uptime => (
                "uptime",
                "define private double @mvs.thunk.uptime(ptr %env) {\n\
                 entry:\n\
                 \x20 %r = call double @mvs_uptime_nanoseconds()\n\
                 \x20 ret double %r\n\
                 }\n\n",
            ),
            thir::Builtin::Sqrt => (
                "sqrt",
                "define private double @mvs.thunk.sqrt(double %x, ptr %env) {\n\
                 entry:\n\
                 \x20 %r = call double @mvs_sqrt(double %x)\n\
                 \x20 ret double %r\n\
                 }\n\n",
            ),
        };
        if self.builtin_thunks.insert(name) {
            self.fns.push_str(def);
        }
        format!("@mvs.thunk.{name}")
    }
}

pub(crate) fn oper_name(oper: mvs_ast::OperKind) -> &'static str {
    use mvs_ast::OperKind;
    match oper {
        OperKind::Eq => "eq",
        OperKind::Ne => "ne",
        OperKind::Lt => "lt",
        OperKind::Le => "le",
        OperKind::Ge => "ge",
        OperKind::Gt => "gt",
        OperKind::Add => "add",
        OperKind::Sub => "sub",
        OperKind::Mul => "mul",
        OperKind::Div => "div",
    }
}

pub(crate) fn scalar_arith_inst(oper: mvs_ast::OperKind, is_float: bool) -> &'static str {
    use mvs_ast::OperKind;
    match (oper, is_float) {
        (OperKind::Add, false) => "add",
        (OperKind::Sub, false) => "sub",
        (OperKind::Mul, false) => "mul",
        (OperKind::Div, false) => "sdiv",
        (OperKind::Add, true) => "fadd",
        (OperKind::Sub, true) => "fsub",
        (OperKind::Mul, true) => "fmul",
        (OperKind::Div, true) => "fdiv",
        _ => unreachable!("not an arithmetic operator"),
    }
}

pub(crate) fn scalar_cmp_inst(oper: mvs_ast::OperKind, is_float: bool) -> &'static str {
    use mvs_ast::OperKind;
    match (oper, is_float) {
        (OperKind::Eq, false) => "icmp eq",
        (OperKind::Ne, false) => "icmp ne",
        (OperKind::Lt, false) => "icmp slt",
        (OperKind::Le, false) => "icmp sle",
        (OperKind::Ge, false) => "icmp sge",
        (OperKind::Gt, false) => "icmp sgt",
        (OperKind::Eq, true) => "fcmp oeq",
        (OperKind::Ne, true) => "fcmp one",
        (OperKind::Lt, true) => "fcmp olt",
        (OperKind::Le, true) => "fcmp ole",
        (OperKind::Ge, true) => "fcmp oge",
        (OperKind::Gt, true) => "fcmp ogt",
        _ => unreachable!("not a comparison operator"),
    }
}
