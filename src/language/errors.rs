use crate::language::span::Span;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub span: Span,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: usize, span: Span) -> Self {
        Self {
            message: message.into(),
            line,
            span,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax {
        message: String,
        line: usize,
        span: Span,
    },
    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, line: usize, span: Span) -> Self {
        ParseError::Syntax {
            message: message.into(),
            line,
            span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::Syntax { message, .. } => message,
            ParseError::Lex(err) => &err.message,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ParseError::Syntax { span, .. } => *span,
            ParseError::Lex(err) => err.span,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("line {line}: {message}")]
pub struct SemanticError {
    pub message: String,
    pub line: usize,
}

impl SemanticError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}
