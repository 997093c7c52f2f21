use crate::language::{
    errors::LexError,
    span::Span,
    token::{Token, TokenKind},
};

/// Anything the parser can pull tokens from, one at a time.
///
/// Implementations must keep yielding `Eof` once the input is exhausted.
pub trait TokenSource {
    fn next_token(&mut self) -> Result<Token, LexError>;
}

pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            line: 1,
        }
    }

    /// Rewind to the beginning of the source.
    pub fn reset(&mut self) {
        *self = Lexer::new(self.src);
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
            }
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn token(&self, kind: TokenKind, start: usize, line: usize) -> Token {
        Token {
            kind,
            lexeme: self.src[start..self.offset].to_string(),
            line,
            span: Span::new(start, self.offset),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        while let Some(ch) = self.current {
            match ch {
                '#' => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment()?,
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn eat_line_comment(&mut self) {
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.offset;
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '*' && self.peek() == Some('/') {
                self.bump();
                self.bump();
                return Ok(());
            }
            self.bump();
        }
        Err(LexError::new(
            "Unterminated block comment",
            self.line,
            Span::new(start, self.offset),
        ))
    }

    fn lex_identifier(&mut self) -> Token {
        let start = self.offset;
        let line = self.line;
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&self.src[start..self.offset]).unwrap_or(TokenKind::Identifier);
        self.token(kind, start, line)
    }

    fn lex_number(&mut self) -> Token {
        let start = self.offset;
        let line = self.line;
        while let Some(ch) = self.current {
            if ch.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }
        self.token(TokenKind::Number, start, line)
    }

    fn lex_string(&mut self) -> Result<Token, LexError> {
        let start = self.offset;
        let line = self.line;
        self.bump();
        while let Some(ch) = self.current {
            if ch == '"' {
                let contents = self.src[start + 1..self.offset].to_string();
                self.bump();
                return Ok(Token {
                    kind: TokenKind::String,
                    lexeme: contents,
                    line,
                    span: Span::new(start, self.offset),
                });
            }
            self.bump();
        }
        Err(LexError::new(
            "Unterminated string literal",
            line,
            Span::new(start, self.offset),
        ))
    }

    fn lex_symbol(&mut self, ch: char) -> Result<Token, LexError> {
        let start = self.offset;
        let line = self.line;
        self.bump();
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '-' => self.either('>', TokenKind::Arrow, TokenKind::Minus),
            '=' => self.either('=', TokenKind::EqEq, TokenKind::Eq),
            '!' => self.either('=', TokenKind::BangEq, TokenKind::Bang),
            '>' => self.either('=', TokenKind::GtEq, TokenKind::Gt),
            '<' => self.either('=', TokenKind::LtEq, TokenKind::Lt),
            '&' if self.current == Some('&') => {
                self.bump();
                TokenKind::AmpersandAmpersand
            }
            '|' if self.current == Some('|') => {
                self.bump();
                TokenKind::PipePipe
            }
            other => {
                return Err(LexError::new(
                    format!("Unexpected character '{}'", other),
                    line,
                    Span::new(start, self.offset),
                ));
            }
        };
        Ok(self.token(kind, start, line))
    }

    fn either(&mut self, next: char, matched: TokenKind, single: TokenKind) -> TokenKind {
        if self.current == Some(next) {
            self.bump();
            matched
        } else {
            single
        }
    }
}

impl TokenSource for Lexer<'_> {
    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        match self.current {
            None => Ok(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line: self.line,
                span: Span::new(self.offset, self.offset),
            }),
            Some(ch) if ch.is_alphabetic() => Ok(self.lex_identifier()),
            Some(ch) if ch.is_ascii_digit() => Ok(self.lex_number()),
            Some('"') => self.lex_string(),
            Some(ch) => self.lex_symbol(ch),
        }
    }
}
