use crate::language::span::Span;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Type,

    Func,
    While,
    If,
    For,
    Else,
    Return,
    Break,
    Continue,
    Par,
    Seq,
    CChannel,
    SChannel,
    True,
    False,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    BangEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    AmpersandAmpersand,
    PipePipe,
    Bang,

    Colon,
    Comma,
    Arrow, // ->
    Dot,
    Semi,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "func" => TokenKind::Func,
            "while" => TokenKind::While,
            "if" => TokenKind::If,
            "for" => TokenKind::For,
            "else" => TokenKind::Else,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "par" => TokenKind::Par,
            "seq" => TokenKind::Seq,
            "s_channel" => TokenKind::SChannel,
            "c_channel" => TokenKind::CChannel,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "number" | "bool" | "string" | "void" => TokenKind::Type,
            _ => return None,
        };
        Some(kind)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Type => "type",
            TokenKind::Func => "'func'",
            TokenKind::While => "'while'",
            TokenKind::If => "'if'",
            TokenKind::For => "'for'",
            TokenKind::Else => "'else'",
            TokenKind::Return => "'return'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::Par => "'par'",
            TokenKind::Seq => "'seq'",
            TokenKind::CChannel => "'c_channel'",
            TokenKind::SChannel => "'s_channel'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Eq => "'='",
            TokenKind::EqEq => "'=='",
            TokenKind::BangEq => "'!='",
            TokenKind::Gt => "'>'",
            TokenKind::Lt => "'<'",
            TokenKind::GtEq => "'>='",
            TokenKind::LtEq => "'<='",
            TokenKind::AmpersandAmpersand => "'&&'",
            TokenKind::PipePipe => "'||'",
            TokenKind::Bang => "'!'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Arrow => "'->'",
            TokenKind::Dot => "'.'",
            TokenKind::Semi => "';'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
