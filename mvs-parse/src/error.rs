#![forbid(unsafe_code)]

use miette::Diagnostic;
use mvs_ast::Span;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("parse error: {message}")]
#[diagnostic(code(mvs::parse))]
pub struct ParseError {
    pub message: String,
    #[label]
    pub span: Span,
}

/// All parse diagnostics produced for one source file. Struct declarations
/// recover to their closing brace, so a single run can report several.
#[derive(Debug, Error, Diagnostic)]
#[error("{} parse error(s)", errors.len())]
#[diagnostic(code(mvs::parse))]
pub struct ParseErrors {
    #[related]
    pub errors: Vec<ParseError>,
}
