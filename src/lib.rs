pub mod diagnostics;
pub mod formatter;
pub mod language;
pub mod runtime;

use language::{
    ast::Program,
    errors::{LexError, ParseError, SemanticError},
    parser, typecheck,
};
use runtime::{Interpreter, RuntimeError};
use thiserror::Error;

/// Any failure of the parse, check and run pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub fn parse_source(source: &str) -> Result<Program, Error> {
    Ok(parser::parse_source(source)?)
}

/// Parses and statically checks a program.
pub fn check_source(source: &str) -> Result<Program, Error> {
    let program = parse_source(source)?;
    typecheck::analyze(&program)?;
    Ok(program)
}

pub fn run_source(source: &str, interpreter: &mut Interpreter) -> Result<(), Error> {
    let program = check_source(source)?;
    interpreter.run(&program)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_stops_at_the_first_failing_phase() {
        assert!(matches!(parse_source("x: number = \"open"), Err(Error::Parse(ParseError::Lex(_)))));
        assert!(matches!(parse_source("x number"), Err(Error::Parse(_))));
        assert!(matches!(
            check_source("y: number = 1\ny: number = 2"),
            Err(Error::Semantic(_))
        ));
        let mut interpreter = Interpreter::with_io(Box::new(std::io::sink()), Box::new(std::io::empty()));
        assert!(matches!(
            run_source("arr: [number] = [1, 2, 3]\nprint(arr[5])", &mut interpreter),
            Err(Error::Runtime(RuntimeError::IndexOutOfBounds { .. }))
        ));
    }

    #[test]
    fn errors_render_with_line_prefix() {
        let err = check_source("print(missing)").unwrap_err();
        assert_eq!(err.to_string(), "line 1: variable 'missing' not declared");
    }
}
