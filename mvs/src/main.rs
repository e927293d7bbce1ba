#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, NamedSource, Report};

use mvs_backend_llvm::CodegenOptions;
use mvs_core::CheckOptions;

mod object;

#[derive(Parser, Debug)]
#[command(name = "mvs", version, about = "Compiler for the mvs-calculus language")]
struct Cli {
    /// Input .mvs source file
    input: PathBuf,

    /// Output path (defaults to `<input>.o`, or `<input>.ll` with --emit-llvm)
    #[arg(short = 'o')]
    output: Option<PathBuf>,

    /// Enable optimization during object emission
    #[arg(short = 'O', default_value_t = false)]
    optimize: bool,

    /// Wrap the entry expression in an N-iteration timing loop that prints
    /// the final value and the elapsed nanoseconds
    #[arg(long, value_name = "N")]
    benchmark: Option<u64>,

    /// Dump the LLVM IR instead of emitting an object file
    #[arg(long, default_value_t = false)]
    emit_llvm: bool,

    /// Suppress the default print of the entry expression's value
    #[arg(long, default_value_t = false)]
    no_print: bool,

    /// Byte budget under which non-escaping local arrays may live on the
    /// stack frame
    #[arg(long, value_name = "N", default_value_t = 1024)]
    max_stack_array_size: u64,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let src = fs::read_to_string(&cli.input).into_diagnostic()?;
    let source_name = cli.input.display().to_string();
    let llvm_ir = compile(&src, &source_name, &cli)?;

    if cli.emit_llvm {
        let out = cli
            .output
            .clone()
            .unwrap_or_else(|| cli.input.with_extension("ll"));
        fs::write(&out, llvm_ir).into_diagnostic()?;
        return Ok(());
    }

    let out_obj = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("o"));
    let module_ll = out_obj.with_extension("ll");
    fs::write(&module_ll, llvm_ir).into_diagnostic()?;
    object::emit_object(&module_ll, &out_obj, cli.optimize).map_err(Report::new)?;
    Ok(())
}

/// Runs the front half of the pipeline: lex, parse, check, lower to IR
/// text. Code generation never runs once a diagnostic has been produced.
fn compile(src: &str, source_name: &str, cli: &Cli) -> miette::Result<String> {
    let named = || NamedSource::new(source_name, src.to_string());

    let program = mvs_parse::parse_source(src)
        .map_err(|e| Report::new(e).with_source_code(named()))?;

    let check_opts = CheckOptions {
        max_stack_array_size: cli.max_stack_array_size,
    };
    let typed = mvs_core::check_program(&program, check_opts)
        .map_err(|e| Report::new(e).with_source_code(named()))?;

    let cg_opts = CodegenOptions {
        benchmark: cli.benchmark,
        print_result: !cli.no_print,
        source_name: source_name.to_string(),
    };
    let artifacts = mvs_backend_llvm::emit_program(&typed, &cg_opts).map_err(Report::new)?;
    Ok(artifacts.llvm_ir)
}
