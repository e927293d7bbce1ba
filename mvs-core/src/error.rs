#![forbid(unsafe_code)]

use miette::Diagnostic;
use mvs_ast::Span;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("type error: {message}")]
#[diagnostic(code(mvs::check))]
pub struct SemanticError {
    pub message: String,
    #[label]
    pub span: Span,
}

/// All diagnostics produced while checking one program. The checker keeps
/// going after the first error (poisoning the offending subtree with the
/// `Error` type), so several independent mistakes surface in one run.
#[derive(Debug, Error, Diagnostic)]
#[error("{} type error(s)", errors.len())]
#[diagnostic(code(mvs::check))]
pub struct Diagnostics {
    #[related]
    pub errors: Vec<SemanticError>,
}
