use crate::{
    language::{
        errors::{LexError, ParseError, SemanticError},
        span::{line_span, Span},
    },
    runtime::error::RuntimeError,
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

/// A compile-time error pinned to a region of its source file.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SourceDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SourceDiagnostic {
    fn new(path: &Path, source: &str, span: Span, message: String, label: &str) -> Self {
        Self {
            src: NamedSource::new(path.display().to_string(), source.to_string()),
            span: (span.start, span.len()).into(),
            help: None,
            message,
            label: label.to_string(),
        }
    }

    pub fn from_lex_error(path: &Path, source: &str, err: &LexError) -> Self {
        Self::new(path, source, err.span, err.to_string(), "invalid token")
    }

    pub fn from_parse_error(path: &Path, source: &str, err: &ParseError) -> Self {
        match err {
            ParseError::Lex(lex) => Self::from_lex_error(path, source, lex),
            ParseError::Syntax { .. } => {
                Self::new(path, source, err.span(), err.to_string(), "unexpected token")
            }
        }
    }

    pub fn from_semantic_error(path: &Path, source: &str, err: &SemanticError) -> Self {
        let mut diagnostic = Self::new(
            path,
            source,
            line_span(source, err.line),
            err.to_string(),
            "rejected here",
        );
        if err.message.contains("already declared") {
            diagnostic.help = Some("names may be shadowed in a nested block".to_string());
        }
        diagnostic
    }
}

/// Prints any pipeline error to stderr.
pub fn report_error(path: &Path, source: &str, error: &crate::Error) {
    let diagnostic = match error {
        crate::Error::Lex(err) => SourceDiagnostic::from_lex_error(path, source, err),
        crate::Error::Parse(err) => SourceDiagnostic::from_parse_error(path, source, err),
        crate::Error::Semantic(err) => SourceDiagnostic::from_semantic_error(path, source, err),
        crate::Error::Runtime(err) => {
            report_runtime_error(err);
            return;
        }
    };
    eprintln!("{:?}", Report::new(diagnostic));
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("runtime error: {}", error);
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_source;

    #[test]
    fn semantic_errors_label_the_whole_line() {
        let source = "x: number = 1\nx: number = 2\n";
        let err = SemanticError::new(2, "variable 'x' already declared");
        let diagnostic = SourceDiagnostic::from_semantic_error(Path::new("dup.mp"), source, &err);
        assert_eq!(diagnostic.span, SourceSpan::from((14, 13)));
        assert!(diagnostic.help.is_some());
        assert_eq!(diagnostic.to_string(), "line 2: variable 'x' already declared");
    }

    #[test]
    fn parse_errors_point_at_the_token() {
        let source = "x: number = 1 +";
        let err = parse_source(source).unwrap_err();
        let diagnostic = SourceDiagnostic::from_parse_error(Path::new("bad.mp"), source, &err);
        assert_eq!(diagnostic.span, SourceSpan::from((15, 0)));
        assert!(diagnostic.to_string().contains("Expected expression"));
    }
}
