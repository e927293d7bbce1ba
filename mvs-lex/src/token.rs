#![forbid(unsafe_code)]

use mvs_ast::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwStruct,
    KwLet,
    KwVar,
    KwFun,
    KwIf,
    KwIn,
    KwWhile,
    KwInout,
    KwAs,

    // Operators / punctuation
    Arrow,
    EqEq,
    Neq,
    Le,
    Ge,
    Lt,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Amp,
    Question,
    Bang,
    Underscore,
    Dot,
    Comma,
    Colon,
    Semi,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,

    // Literals / identifiers
    Name(String),
    Int(i64),
    Float(f64),
}

impl TokenKind {
    /// Short human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::KwStruct => "'struct'".to_string(),
            TokenKind::KwLet => "'let'".to_string(),
            TokenKind::KwVar => "'var'".to_string(),
            TokenKind::KwFun => "'fun'".to_string(),
            TokenKind::KwIf => "'if'".to_string(),
            TokenKind::KwIn => "'in'".to_string(),
            TokenKind::KwWhile => "'while'".to_string(),
            TokenKind::KwInout => "'inout'".to_string(),
            TokenKind::KwAs => "'as'".to_string(),
            TokenKind::Arrow => "'->'".to_string(),
            TokenKind::EqEq => "'=='".to_string(),
            TokenKind::Neq => "'!='".to_string(),
            TokenKind::Le => "'<='".to_string(),
            TokenKind::Ge => "'>='".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Amp => "'&'".to_string(),
            TokenKind::Question => "'?'".to_string(),
            TokenKind::Bang => "'!'".to_string(),
            TokenKind::Underscore => "'_'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Semi => "';'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Name(n) => format!("name '{n}'"),
            TokenKind::Int(v) => format!("integer literal '{v}'"),
            TokenKind::Float(v) => format!("float literal '{v}'"),
        }
    }
}
