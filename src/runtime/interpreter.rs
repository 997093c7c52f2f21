use crate::language::{ast::*, builtins::Builtin};
use crate::runtime::{
    channels::ChannelTable,
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    parallel,
    value::Value,
};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

/// Program output shared by every `par` unit. Each line is written while
/// holding the lock.
pub type SharedOutput = Arc<Mutex<Box<dyn Write + Send>>>;
pub type SharedInput = Arc<Mutex<Box<dyn BufRead + Send>>>;

pub struct Interpreter {
    pub(super) env: Environment,
    pub(super) functions: HashMap<String, Function>,
    pub(super) channels: ChannelTable,
    pub(super) output: SharedOutput,
    pub(super) input: SharedInput,
}

/// A registered user function and the scope depth it was defined at. A call
/// only sees the scopes up to that depth plus its own frame.
#[derive(Clone)]
pub(super) struct Function {
    def: Arc<FunctionDef>,
    depth: usize,
}

pub(super) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter wired to the process stdout and stdin.
    pub fn new() -> Self {
        Self::with_io(
            Box::new(io::stdout()),
            Box::new(BufReader::new(io::stdin())),
        )
    }

    pub fn with_io(output: Box<dyn Write + Send>, input: Box<dyn BufRead + Send>) -> Self {
        Self {
            env: Environment::new(),
            functions: HashMap::new(),
            channels: ChannelTable::default(),
            output: Arc::new(Mutex::new(output)),
            input: Arc::new(Mutex::new(input)),
        }
    }

    pub fn run(&mut self, program: &Program) -> RuntimeResult<()> {
        for statement in &program.statements {
            self.exec_statement(statement)?;
        }
        Ok(())
    }

    /// Copy of the interpreter state for one `par` unit. Scopes, functions
    /// and channels are duplicated; output and input stay shared.
    pub(super) fn fork(&self) -> RuntimeResult<Interpreter> {
        Ok(Interpreter {
            env: self.env.clone(),
            functions: self.functions.clone(),
            channels: self.channels.try_clone()?,
            output: Arc::clone(&self.output),
            input: Arc::clone(&self.input),
        })
    }

    pub(super) fn emit_line(&self, line: &str) -> io::Result<()> {
        let mut out = self
            .output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{line}")?;
        out.flush()
    }

    pub(super) fn exec_statement(&mut self, statement: &Statement) -> RuntimeResult<Flow> {
        match statement {
            Statement::Declaration(decl) => {
                let value = self.eval_expression(&decl.value)?;
                self.env.declare(&decl.name, value);
                Ok(Flow::Normal)
            }
            Statement::Assign(stmt) => {
                self.exec_assign(stmt)?;
                Ok(Flow::Normal)
            }
            Statement::Function(def) => {
                let function = Function {
                    def: Arc::new(def.clone()),
                    depth: self.env.depth(),
                };
                self.functions.insert(def.name.clone(), function);
                Ok(Flow::Normal)
            }
            Statement::Return(stmt) => {
                let value = self.eval_expression(&stmt.value)?;
                Ok(Flow::Return(value))
            }
            Statement::If(stmt) => {
                if self.eval_condition(&stmt.condition)? {
                    self.exec_block(&stmt.then_branch)
                } else if let Some(else_branch) = &stmt.else_branch {
                    self.exec_block(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::While(stmt) => {
                while self.eval_condition(&stmt.condition)? {
                    match self.exec_block(&stmt.body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::For(stmt) => {
                self.env.push_scope();
                let result = self.exec_for(stmt);
                self.env.pop_scope();
                result
            }
            Statement::Break(_) => Ok(Flow::Break),
            Statement::Continue(_) => Ok(Flow::Continue),
            Statement::Seq(block) | Statement::Block(block) => self.exec_block(block),
            Statement::Par(block) => {
                parallel::run_units(self, &block.statements)?;
                Ok(Flow::Normal)
            }
            Statement::Expr(stmt) => {
                self.eval_expression(&stmt.expr)?;
                Ok(Flow::Normal)
            }
            Statement::ServerChannel(chan) => {
                self.start_server_channel(chan)?;
                Ok(Flow::Normal)
            }
            Statement::ClientChannel(chan) => {
                self.open_client_channel(chan)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_statements(&mut self, statements: &[Statement]) -> RuntimeResult<Flow> {
        for statement in statements {
            match self.exec_statement(statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, block: &Block) -> RuntimeResult<Flow> {
        self.env.push_scope();
        let result = self.exec_statements(&block.statements);
        self.env.pop_scope();
        result
    }

    fn exec_for(&mut self, stmt: &ForStmt) -> RuntimeResult<Flow> {
        self.exec_statement(&stmt.init)?;
        while self.eval_condition(&stmt.condition)? {
            match self.exec_block(&stmt.body)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
            self.exec_assign(&stmt.update)?;
        }
        Ok(Flow::Normal)
    }

    fn exec_assign(&mut self, stmt: &AssignStmt) -> RuntimeResult<()> {
        let line = stmt.line.0;
        match &stmt.target {
            AssignTarget::Variable(ident) => {
                let value = self.eval_expression(&stmt.value)?;
                if !self.env.assign(&ident.name, value) {
                    return Err(RuntimeError::UndeclaredVariable {
                        name: ident.name.clone(),
                        line,
                    });
                }
            }
            AssignTarget::Index { base, index } => {
                let Value::Array(array) = self.eval_expression(base)? else {
                    return Err(RuntimeError::type_mismatch(
                        line,
                        "indexed assignment needs an array",
                    ));
                };
                let raw = self.eval_number(index)?;
                let value = self.eval_expression(&stmt.value)?;
                let slot = element_index(raw, array.len(), line)?;
                if !array.set(slot, value) {
                    return Err(RuntimeError::IndexOutOfBounds {
                        index: raw,
                        len: array.len(),
                        line,
                    });
                }
            }
        }
        Ok(())
    }

    fn eval_condition(&mut self, condition: &Expr) -> RuntimeResult<bool> {
        match self.eval_expression(condition)? {
            Value::Bool(value) => Ok(value),
            other => Err(RuntimeError::type_mismatch(
                condition.line().0,
                format!("condition must be BOOL, found {}", other.type_name()),
            )),
        }
    }

    fn eval_number(&mut self, expr: &Expr) -> RuntimeResult<f64> {
        match self.eval_expression(expr)? {
            Value::Number(value) => Ok(value),
            other => Err(RuntimeError::type_mismatch(
                expr.line().0,
                format!("expected NUMBER, found {}", other.type_name()),
            )),
        }
    }

    pub(super) fn eval_expression(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Literal(Literal::Number(value, _)) => Ok(Value::Number(*value)),
            Expr::Literal(Literal::String(value, _)) => Ok(Value::Str(value.clone())),
            Expr::Literal(Literal::Bool(value, _)) => Ok(Value::Bool(*value)),
            Expr::Identifier(ident) => {
                self.env
                    .get(&ident.name)
                    .ok_or_else(|| RuntimeError::UndeclaredVariable {
                        name: ident.name.clone(),
                        line: ident.line.0,
                    })
            }
            Expr::Binary {
                op,
                left,
                right,
                line,
            } => match op {
                BinaryOp::And | BinaryOp::Or => self.eval_logical(*op, left, right, line.0),
                _ => {
                    let left = self.eval_expression(left)?;
                    let right = self.eval_expression(right)?;
                    eval_binary(*op, left, right, line.0)
                }
            },
            Expr::Unary { op, expr, line } => {
                let operand = self.eval_expression(expr)?;
                match (op, operand) {
                    (UnaryOp::Neg, Value::Number(value)) => Ok(Value::Number(-value)),
                    (UnaryOp::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
                    (op, other) => Err(RuntimeError::type_mismatch(
                        line.0,
                        format!(
                            "operator '{}' cannot be applied to {}",
                            op.symbol(),
                            other.type_name()
                        ),
                    )),
                }
            }
            Expr::Call { callee, args, line } => self.eval_call(callee, args, line.0),
            Expr::Index { base, index, line } => {
                let base = self.eval_expression(base)?;
                let raw = self.eval_number(index)?;
                eval_index(base, raw, line.0)
            }
            Expr::ArrayLiteral(values, _) => {
                let items = self.eval_arguments(values)?;
                Ok(Value::array(items))
            }
        }
    }

    /// `&&` and `||` skip the right operand once the left one decides.
    fn eval_logical(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        line: usize,
    ) -> RuntimeResult<Value> {
        let left = expect_bool(self.eval_expression(left)?, op, line)?;
        match (op, left) {
            (BinaryOp::And, false) => Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => Ok(Value::Bool(true)),
            _ => {
                let right = expect_bool(self.eval_expression(right)?, op, line)?;
                Ok(Value::Bool(right))
            }
        }
    }

    fn eval_arguments(&mut self, args: &[Expr]) -> RuntimeResult<Vec<Value>> {
        args.iter().map(|expr| self.eval_expression(expr)).collect()
    }

    fn eval_call(&mut self, callee: &str, args: &[Expr], line: usize) -> RuntimeResult<Value> {
        if let Some(builtin) = Builtin::from_name(callee) {
            let values = self.eval_arguments(args)?;
            return self.call_builtin(builtin, values, line);
        }
        let Function { def, depth } = self
            .functions
            .get(callee)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedFunction {
                name: callee.to_string(),
                line,
            })?;
        let values = self.eval_arguments(args)?;
        if values.len() < def.required_params() || values.len() > def.params.len() {
            return Err(RuntimeError::type_mismatch(
                line,
                format!(
                    "function '{}' cannot take {} arguments",
                    def.name,
                    values.len()
                ),
            ));
        }

        let frame = self.env.enter_call(depth);
        let result = self.invoke(&def, values, line);
        self.env.leave_call(frame);
        result
    }

    fn invoke(&mut self, def: &FunctionDef, values: Vec<Value>, line: usize) -> RuntimeResult<Value> {
        let supplied = values.len();
        for (param, value) in def.params.iter().zip(values) {
            self.env.declare(&param.name, value);
        }
        for param in &def.params[supplied..] {
            let Some(default) = &param.default else {
                return Err(RuntimeError::type_mismatch(
                    line,
                    format!("missing argument '{}' for '{}'", param.name, def.name),
                ));
            };
            let value = self.eval_expression(default)?;
            self.env.declare(&param.name, value);
        }
        match self.exec_statements(&def.body.statements)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Void),
        }
    }
}

fn expect_bool(value: Value, op: BinaryOp, line: usize) -> RuntimeResult<bool> {
    match value {
        Value::Bool(value) => Ok(value),
        other => Err(RuntimeError::type_mismatch(
            line,
            format!(
                "operator '{}' expects BOOL, found {}",
                op.symbol(),
                other.type_name()
            ),
        )),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value, line: usize) -> RuntimeResult<Value> {
    match (op, left, right) {
        (BinaryOp::Eq, left, right) => Ok(Value::Bool(left.equals(&right))),
        (BinaryOp::NotEq, left, right) => Ok(Value::Bool(!left.equals(&right))),
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            let mut items = a.snapshot();
            items.extend(b.snapshot());
            Ok(Value::array(items))
        }
        (op, Value::Number(a), Value::Number(b)) => Ok(match op {
            BinaryOp::Add => Value::Number(a + b),
            BinaryOp::Sub => Value::Number(a - b),
            BinaryOp::Mul => Value::Number(a * b),
            BinaryOp::Div => Value::Number(a / b),
            BinaryOp::Rem => Value::Number(a % b),
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::LtEq => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::GtEq => Value::Bool(a >= b),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Eq | BinaryOp::NotEq => {
                return Err(RuntimeError::type_mismatch(
                    line,
                    format!("operator '{}' cannot be applied to NUMBER", op.symbol()),
                ));
            }
        }),
        (op, left, right) => Err(RuntimeError::type_mismatch(
            line,
            format!(
                "operator '{}' cannot be applied to {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ),
        )),
    }
}

fn eval_index(base: Value, raw: f64, line: usize) -> RuntimeResult<Value> {
    match base {
        Value::Array(array) => {
            let slot = element_index(raw, array.len(), line)?;
            array.get(slot).ok_or(RuntimeError::IndexOutOfBounds {
                index: raw,
                len: array.len(),
                line,
            })
        }
        Value::Str(text) => {
            let len = text.chars().count();
            let slot = element_index(raw, len, line)?;
            text.chars()
                .nth(slot)
                .map(|ch| Value::Str(ch.to_string()))
                .ok_or(RuntimeError::IndexOutOfBounds {
                    index: raw,
                    len,
                    line,
                })
        }
        other => Err(RuntimeError::type_mismatch(
            line,
            format!("cannot index a value of type {}", other.type_name()),
        )),
    }
}

/// Truncates toward zero and checks the result against `len`.
fn element_index(raw: f64, len: usize, line: usize) -> RuntimeResult<usize> {
    let truncated = raw.trunc();
    if !truncated.is_finite() || truncated < 0.0 || truncated >= len as f64 {
        return Err(RuntimeError::IndexOutOfBounds {
            index: raw,
            len,
            line,
        });
    }
    Ok(truncated as usize)
}

#[cfg(test)]
mod tests;
