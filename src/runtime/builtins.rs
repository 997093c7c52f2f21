use crate::language::builtins::Builtin;
use crate::runtime::{
    channels::strip_line_ending,
    error::{RuntimeError, RuntimeResult},
    interpreter::Interpreter,
    value::Value,
};
use regex::Regex;
use std::io::BufRead;
use std::thread;
use std::time::Duration;

impl Interpreter {
    pub(super) fn call_builtin(
        &mut self,
        builtin: Builtin,
        mut args: Vec<Value>,
        line: usize,
    ) -> RuntimeResult<Value> {
        let name = builtin.name();
        match builtin {
            Builtin::Print => {
                if args.is_empty() {
                    return Err(arity_error(name, "at least 1", 0, line));
                }
                let text = args
                    .iter()
                    .map(|value| value.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                self.emit_line(&text)
                    .map_err(|err| RuntimeError::io(line, "cannot write program output", err))?;
                Ok(Value::Void)
            }
            Builtin::Input => {
                expect_arity(name, &args, 0, line)?;
                self.read_input_line(line).map(Value::Str)
            }
            Builtin::Sleep => {
                expect_arity(name, &args, 1, line)?;
                let millis = expect_number(name, args.remove(0), line)?;
                if millis.is_finite() && millis > 0.0 {
                    thread::sleep(Duration::from_millis(millis as u64));
                }
                Ok(Value::Void)
            }
            Builtin::Split => {
                expect_arity(name, &args, 2, line)?;
                let text = expect_string(name, args.remove(0), line)?;
                let pattern = expect_string(name, args.remove(0), line)?;
                let delimiter = Regex::new(&pattern).map_err(|source| {
                    RuntimeError::InvalidPattern {
                        pattern,
                        line,
                        source,
                    }
                })?;
                let pieces = split_text(&text, &delimiter)
                    .into_iter()
                    .map(Value::Str)
                    .collect();
                Ok(Value::array(pieces))
            }
            Builtin::IsNum => {
                expect_arity(name, &args, 1, line)?;
                let text = expect_string(name, args.remove(0), line)?;
                Ok(Value::Bool(parse_number(&text).is_some()))
            }
            Builtin::IsAlpha => {
                expect_arity(name, &args, 1, line)?;
                let text = expect_string(name, args.remove(0), line)?;
                Ok(Value::Bool(text.chars().all(char::is_alphabetic)))
            }
            Builtin::ToNumber => {
                expect_arity(name, &args, 1, line)?;
                let text = expect_string(name, args.remove(0), line)?;
                parse_number(&text)
                    .map(Value::Number)
                    .ok_or(RuntimeError::InvalidNumber { text, line })
            }
            Builtin::ToString => {
                expect_arity(name, &args, 1, line)?;
                Ok(Value::Str(args.remove(0).to_string()))
            }
            Builtin::ToBool => {
                expect_arity(name, &args, 1, line)?;
                match args.remove(0) {
                    Value::Bool(value) => Ok(Value::Bool(value)),
                    Value::Number(value) => Ok(Value::Bool(value != 0.0)),
                    Value::Str(text) if text == "true" => Ok(Value::Bool(true)),
                    Value::Str(text) if text == "false" => Ok(Value::Bool(false)),
                    other => Err(RuntimeError::type_mismatch(
                        line,
                        format!("cannot convert '{other}' to BOOL"),
                    )),
                }
            }
            Builtin::Len => {
                expect_arity(name, &args, 1, line)?;
                match args.remove(0) {
                    Value::Str(text) => Ok(Value::Number(text.chars().count() as f64)),
                    Value::Array(array) => Ok(Value::Number(array.len() as f64)),
                    other => Err(RuntimeError::type_mismatch(
                        line,
                        format!("'len' expects STRING or an array, found {}", other.type_name()),
                    )),
                }
            }
            Builtin::Send => {
                expect_arity(name, &args, 2, line)?;
                let channel_name = expect_string(name, args.remove(0), line)?;
                let message = expect_string(name, args.remove(0), line)?;
                let channel = self.channels.get_mut(&channel_name).ok_or_else(|| {
                    RuntimeError::UndefinedChannel {
                        name: channel_name.clone(),
                        line,
                    }
                })?;
                let reply = channel.send(&message).map_err(|err| {
                    RuntimeError::io(line, format!("send on channel '{channel_name}' failed"), err)
                })?;
                Ok(Value::Str(reply))
            }
            Builtin::Close => {
                expect_arity(name, &args, 1, line)?;
                let channel_name = expect_string(name, args.remove(0), line)?;
                if let Some(channel) = self.channels.remove(&channel_name) {
                    channel.close();
                }
                Ok(Value::Void)
            }
        }
    }

    fn read_input_line(&self, line: usize) -> RuntimeResult<String> {
        let mut input = self
            .input
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut buffer = String::new();
        let read = input
            .read_line(&mut buffer)
            .map_err(|err| RuntimeError::io(line, "cannot read input", err))?;
        if read == 0 {
            return Err(RuntimeError::io(
                line,
                "cannot read input",
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "end of input"),
            ));
        }
        Ok(strip_line_ending(buffer))
    }
}

/// Splits around every match of `delimiter`. Trailing empty pieces are
/// dropped, and a zero-width match at the start yields no leading piece.
/// Text with no match comes back whole.
pub fn split_text(text: &str, delimiter: &Regex) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for found in delimiter.find_iter(text) {
        if found.end() == 0 {
            continue;
        }
        pieces.push(text[last..found.start()].to_string());
        last = found.end();
    }
    if pieces.is_empty() {
        return vec![text.to_string()];
    }
    pieces.push(text[last..].to_string());
    while pieces.last().is_some_and(|piece| piece.is_empty()) {
        pieces.pop();
    }
    pieces
}

/// Parses decimal text after trimming. Besides plain decimals and exponents,
/// only the spellings `NaN` and `Infinity` (optionally signed) are accepted.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let magnitude = match body {
        "NaN" => f64::NAN,
        "Infinity" => f64::INFINITY,
        _ if body.is_empty() => return None,
        _ if body
            .chars()
            .any(|ch| ch.is_alphabetic() && ch != 'e' && ch != 'E') =>
        {
            return None
        }
        _ => return trimmed.parse::<f64>().ok(),
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn expect_arity(name: &str, args: &[Value], expected: usize, line: usize) -> RuntimeResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(arity_error(name, &expected.to_string(), args.len(), line))
    }
}

fn arity_error(name: &str, expected: &str, received: usize, line: usize) -> RuntimeError {
    RuntimeError::type_mismatch(
        line,
        format!("'{name}' expects {expected} arguments, received {received}"),
    )
}

fn expect_string(name: &str, value: Value, line: usize) -> RuntimeResult<String> {
    match value {
        Value::Str(text) => Ok(text),
        other => Err(RuntimeError::type_mismatch(
            line,
            format!("'{name}' expects STRING, found {}", other.type_name()),
        )),
    }
}

fn expect_number(name: &str, value: Value, line: usize) -> RuntimeResult<f64> {
    match value {
        Value::Number(value) => Ok(value),
        other => Err(RuntimeError::type_mismatch(
            line,
            format!("'{name}' expects NUMBER, found {}", other.type_name()),
        )),
    }
}
