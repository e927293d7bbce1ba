#![forbid(unsafe_code)]

mod lexer;
mod token;

pub use lexer::{LexError, Lexer};
pub use token::{Token, TokenKind};

/// Lexes a full source file into a token stream terminated by `Eof`.
pub fn lex_source(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).lex()
}
