#![forbid(unsafe_code)]

use logos::Logos;
use miette::Diagnostic;
use mvs_ast::{span_between, Span};
use thiserror::Error;

use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Diagnostic)]
#[error("lex error: {message}")]
#[diagnostic(code(mvs::lex))]
pub struct LexError {
    pub message: String,
    #[label]
    pub span: Span,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    #[token("struct")]
    KwStruct,
    #[token("let")]
    KwLet,
    #[token("var")]
    KwVar,
    #[token("fun")]
    KwFun,
    #[token("if")]
    KwIf,
    #[token("in")]
    KwIn,
    #[token("while")]
    KwWhile,
    #[token("inout")]
    KwInout,
    #[token("as")]
    KwAs,

    #[token("->")]
    Arrow,

    #[token("==")]
    EqEq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("=")]
    Eq,
    #[token("&")]
    Amp,
    #[token("?")]
    Question,
    #[token("!")]
    Bang,
    #[token("_")]
    Underscore,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // A float literal requires digits on both sides of the point.
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(Option<f64>),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(Option<i64>),

    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),
}

pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn lex(&self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut lex = RawToken::lexer(self.src);

        while let Some(raw) = lex.next() {
            let range = lex.span();
            let span = span_between(range.start, range.end);

            let kind = match raw {
                Ok(RawToken::KwStruct) => TokenKind::KwStruct,
                Ok(RawToken::KwLet) => TokenKind::KwLet,
                Ok(RawToken::KwVar) => TokenKind::KwVar,
                Ok(RawToken::KwFun) => TokenKind::KwFun,
                Ok(RawToken::KwIf) => TokenKind::KwIf,
                Ok(RawToken::KwIn) => TokenKind::KwIn,
                Ok(RawToken::KwWhile) => TokenKind::KwWhile,
                Ok(RawToken::KwInout) => TokenKind::KwInout,
                Ok(RawToken::KwAs) => TokenKind::KwAs,

                Ok(RawToken::Arrow) => TokenKind::Arrow,
                Ok(RawToken::EqEq) => TokenKind::EqEq,
                Ok(RawToken::Neq) => TokenKind::Neq,
                Ok(RawToken::Le) => TokenKind::Le,
                Ok(RawToken::Ge) => TokenKind::Ge,
                Ok(RawToken::Lt) => TokenKind::Lt,
                Ok(RawToken::Gt) => TokenKind::Gt,
                Ok(RawToken::Plus) => TokenKind::Plus,
                Ok(RawToken::Minus) => TokenKind::Minus,
                Ok(RawToken::Star) => TokenKind::Star,
                Ok(RawToken::Slash) => TokenKind::Slash,
                Ok(RawToken::Eq) => TokenKind::Eq,
                Ok(RawToken::Amp) => TokenKind::Amp,
                Ok(RawToken::Question) => TokenKind::Question,
                Ok(RawToken::Bang) => TokenKind::Bang,
                Ok(RawToken::Underscore) => TokenKind::Underscore,
                Ok(RawToken::Dot) => TokenKind::Dot,
                Ok(RawToken::Comma) => TokenKind::Comma,
                Ok(RawToken::Colon) => TokenKind::Colon,
                Ok(RawToken::Semi) => TokenKind::Semi,
                Ok(RawToken::LParen) => TokenKind::LParen,
                Ok(RawToken::RParen) => TokenKind::RParen,
                Ok(RawToken::LBrace) => TokenKind::LBrace,
                Ok(RawToken::RBrace) => TokenKind::RBrace,
                Ok(RawToken::LBracket) => TokenKind::LBracket,
                Ok(RawToken::RBracket) => TokenKind::RBracket,

                Ok(RawToken::Name(s)) => TokenKind::Name(s),
                Ok(RawToken::Int(Some(v))) => TokenKind::Int(v),
                Ok(RawToken::Int(None)) => {
                    return Err(LexError {
                        message: "invalid integer literal".to_string(),
                        span,
                    });
                }
                Ok(RawToken::Float(Some(v))) => TokenKind::Float(v),
                Ok(RawToken::Float(None)) => {
                    return Err(LexError {
                        message: "invalid float literal".to_string(),
                        span,
                    });
                }

                Err(_) => {
                    return Err(LexError {
                        message: "unexpected character".to_string(),
                        span,
                    });
                }
            };

            tokens.push(Token { kind, span });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            span: span_between(self.src.len(), self.src.len()),
        });

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .lex()
            .expect("lexing should succeed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_and_names() {
        assert_eq!(
            kinds("struct let varx inout"),
            vec![
                TokenKind::KwStruct,
                TokenKind::KwLet,
                TokenKind::Name("varx".to_string()),
                TokenKind::KwInout,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn floats_need_digits_on_both_sides() {
        assert_eq!(
            kinds("1.5 42"),
            vec![TokenKind::Float(1.5), TokenKind::Int(42), TokenKind::Eof]
        );
        // `1.` lexes as an integer followed by a dot.
        assert_eq!(
            kinds("1."),
            vec![TokenKind::Int(1), TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn maximal_munch_on_operators() {
        assert_eq!(
            kinds("-> - == = <= < != !"),
            vec![
                TokenKind::Arrow,
                TokenKind::Minus,
                TokenKind::EqEq,
                TokenKind::Eq,
                TokenKind::Le,
                TokenKind::Lt,
                TokenKind::Neq,
                TokenKind::Bang,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("1 // two three\n2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn underscore_is_its_own_token() {
        assert_eq!(
            kinds("_ = x"),
            vec![
                TokenKind::Underscore,
                TokenKind::Eq,
                TokenKind::Name("x".to_string()),
                TokenKind::Eof,
            ]
        );
    }
}
