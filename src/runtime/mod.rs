pub mod builtins;
pub mod channels;
pub mod environment;
pub mod error;
pub mod interpreter;
mod parallel;
pub mod value;

pub use error::{RuntimeError, RuntimeResult};
pub use interpreter::Interpreter;
