#![forbid(unsafe_code)]

//! LLVM IR backend for mvs-calculus.
//!
//! The code generator lowers the typed tree onto the runtime's abstract
//! machine and renders the result as textual LLVM IR; the driver hands the
//! text to an external `clang` for object emission.

mod codegen;
pub mod layout;
mod metatype;

use miette::Diagnostic;
use mvs_core::thir::TypedProgram;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("code generation error: {message}")]
#[diagnostic(code(mvs::backend_llvm))]
pub struct BackendError {
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct CodegenOptions {
    /// Wrap the entry expression in an N-iteration timing loop that prints
    /// the final value and the elapsed nanoseconds.
    pub benchmark: Option<u64>,
    /// Print the entry expression's value (scalars only).
    pub print_result: bool,
    /// Source file name recorded in the module header.
    pub source_name: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            benchmark: None,
            print_result: true,
            source_name: "<input>".to_string(),
        }
    }
}

pub struct LlvmArtifacts {
    pub llvm_ir: String,
}

/// Lowers a checked program to LLVM IR text.
pub fn emit_program(
    program: &TypedProgram,
    opts: &CodegenOptions,
) -> Result<LlvmArtifacts, BackendError> {
    let emitter = codegen::Emitter::new(opts);
    let llvm_ir = emitter.emit_program(program);
    Ok(LlvmArtifacts { llvm_ir })
}
