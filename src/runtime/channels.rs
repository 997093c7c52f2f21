use crate::language::ast::{ClientChannel, Expr, ServerChannel};
use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    interpreter::{Interpreter, SharedOutput},
    value::{format_number, Value},
};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;

/// A line-oriented connection opened by `c_channel`.
pub struct Channel {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Channel {
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: stream,
        })
    }

    pub fn try_clone(&self) -> io::Result<Self> {
        Self::from_stream(self.writer.try_clone()?)
    }

    /// Writes one request line and blocks for one reply line.
    pub fn send(&mut self, message: &str) -> io::Result<String> {
        writeln!(self.writer, "{message}")?;
        self.writer.flush()?;
        let mut reply = String::new();
        if self.reader.read_line(&mut reply)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ));
        }
        Ok(strip_line_ending(reply))
    }

    pub fn close(self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}

#[derive(Default)]
pub struct ChannelTable {
    channels: HashMap<String, Channel>,
}

impl ChannelTable {
    pub fn insert(&mut self, name: &str, channel: Channel) {
        if let Some(previous) = self.channels.insert(name.to_string(), channel) {
            previous.close();
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(name)
    }

    pub fn try_clone(&self) -> RuntimeResult<Self> {
        let mut channels = HashMap::with_capacity(self.channels.len());
        for (name, channel) in &self.channels {
            let copy = channel
                .try_clone()
                .map_err(|err| RuntimeError::io(0, format!("cannot share channel '{name}'"), err))?;
            channels.insert(name.clone(), copy);
        }
        Ok(Self { channels })
    }
}

pub(super) fn strip_line_ending(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

impl Interpreter {
    pub(super) fn open_client_channel(&mut self, chan: &ClientChannel) -> RuntimeResult<()> {
        let line = chan.line.0;
        let host = self.eval_host(&chan.host, line)?;
        let port = self.eval_port(&chan.port, line)?;
        let channel = Channel::connect(&host, port).map_err(|err| {
            RuntimeError::io(line, format!("cannot connect to {host}:{port}"), err)
        })?;
        self.channels.insert(&chan.name, channel);
        self.env.declare(&chan.name, Value::Str(chan.name.clone()));
        Ok(())
    }

    /// Binds the listener and leaves a detached thread accepting connections
    /// for the rest of the process. Connections are logged, not served.
    pub(super) fn start_server_channel(&mut self, chan: &ServerChannel) -> RuntimeResult<()> {
        let line = chan.line.0;
        self.eval_expression(&chan.description)?;
        let host = self.eval_host(&chan.host, line)?;
        let port = self.eval_port(&chan.port, line)?;
        let listener = TcpListener::bind((host.as_str(), port))
            .map_err(|err| RuntimeError::io(line, format!("cannot listen on {host}:{port}"), err))?;
        let bound = listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(port);
        self.emit_line(&format!(
            "server '{}' listening on {host}:{bound}",
            chan.name
        ))
        .map_err(|err| RuntimeError::io(line, "cannot write program output", err))?;

        let output = self.output.clone();
        thread::spawn(move || accept_loop(listener, output));
        Ok(())
    }

    fn eval_host(&mut self, expr: &Expr, line: usize) -> RuntimeResult<String> {
        match self.eval_expression(expr)? {
            Value::Str(host) => Ok(host),
            other => Err(RuntimeError::type_mismatch(
                line,
                format!("channel host must be STRING, found {}", other.type_name()),
            )),
        }
    }

    fn eval_port(&mut self, expr: &Expr, line: usize) -> RuntimeResult<u16> {
        match self.eval_expression(expr)? {
            Value::Number(port) if port.fract() == 0.0 && (0.0..=65535.0).contains(&port) => {
                Ok(port as u16)
            }
            Value::Number(port) => Err(RuntimeError::type_mismatch(
                line,
                format!("invalid port {}", format_number(port)),
            )),
            other => Err(RuntimeError::type_mismatch(
                line,
                format!("channel port must be NUMBER, found {}", other.type_name()),
            )),
        }
    }
}

fn accept_loop(listener: TcpListener, output: SharedOutput) {
    for stream in listener.incoming() {
        let message = match stream {
            Ok(stream) => match stream.peer_addr() {
                Ok(peer) => format!("connection accepted from {peer}"),
                Err(_) => "connection accepted".to_string(),
            },
            Err(err) if is_transient(err.kind()) => {
                eprintln!("warning: accept failed: {err}");
                continue;
            }
            Err(err) => {
                eprintln!("warning: accept failed, listener stopped: {err}");
                return;
            }
        };
        let mut out = output.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if writeln!(out, "{message}").and_then(|_| out.flush()).is_err() {
            return;
        }
    }
}

/// Accept errors caused by a single client. Anything else stops the listener.
fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_per_client_accept_errors_are_retried() {
        assert!(is_transient(io::ErrorKind::ConnectionAborted));
        assert!(is_transient(io::ErrorKind::Interrupted));
        assert!(!is_transient(io::ErrorKind::Other));
        assert!(!is_transient(io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn strips_crlf_and_lf() {
        assert_eq!(strip_line_ending("reply\r\n".to_string()), "reply");
        assert_eq!(strip_line_ending("reply\n".to_string()), "reply");
        assert_eq!(strip_line_ending("reply".to_string()), "reply");
    }
}
