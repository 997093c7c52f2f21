use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("line {line}: variable '{name}' not declared")]
    UndeclaredVariable { name: String, line: usize },
    #[error("line {line}: function '{name}' not declared")]
    UndefinedFunction { name: String, line: usize },
    #[error("line {line}: channel '{name}' is not open")]
    UndefinedChannel { name: String, line: usize },
    #[error("line {line}: type mismatch: {message}")]
    TypeMismatch { message: String, line: usize },
    #[error("line {line}: index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: f64, len: usize, line: usize },
    #[error("line {line}: cannot convert '{text}' to a number")]
    InvalidNumber { text: String, line: usize },
    #[error("line {line}: invalid split pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        line: usize,
        #[source]
        source: regex::Error,
    },
    #[error("line {line}: {context}: {source}")]
    Io {
        context: String,
        line: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("runtime panic: {message}")]
    Panic { message: String },
}

impl RuntimeError {
    pub fn type_mismatch(line: usize, message: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            message: message.into(),
            line,
        }
    }

    pub fn io(line: usize, context: impl Into<String>, source: std::io::Error) -> Self {
        RuntimeError::Io {
            context: context.into(),
            line,
            source,
        }
    }
}
