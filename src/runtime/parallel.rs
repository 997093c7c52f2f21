//! `par` blocks: one worker thread per direct child statement.

use crate::language::ast::Statement;
use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    interpreter::Interpreter,
};
use std::any::Any;
use std::thread;

/// Runs every unit against its own fork of `parent` and waits for all of
/// them. When several units fail, the first one in source order wins.
pub(super) fn run_units(parent: &Interpreter, units: &[Statement]) -> RuntimeResult<()> {
    let mut workers = Vec::with_capacity(units.len());
    for _ in units {
        workers.push(parent.fork()?);
    }

    let results: Vec<RuntimeResult<()>> = thread::scope(|scope| {
        let handles: Vec<_> = workers
            .into_iter()
            .zip(units)
            .map(|(mut worker, unit)| {
                scope.spawn(move || worker.exec_statement(unit).map(|_| ()))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|payload| {
                    Err(RuntimeError::Panic {
                        message: panic_message(payload),
                    })
                })
            })
            .collect()
    });

    results.into_iter().collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "par unit panicked".to_string()
    }
}
