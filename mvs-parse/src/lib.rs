#![forbid(unsafe_code)]

mod error;
mod parser;

pub use error::{ParseError, ParseErrors};
pub use parser::Parser;

use mvs_ast::Program;

/// Lexes and parses a full source file.
pub fn parse_source(src: &str) -> Result<Program, ParseErrors> {
    let tokens = mvs_lex::lex_source(src).map_err(|e| ParseErrors {
        errors: vec![ParseError {
            message: e.message,
            span: e.span,
        }],
    })?;

    Parser::new(&tokens)
        .parse_program()
        .map_err(|errors| ParseErrors { errors })
}
