use super::{FunctionSignature, ReturnContext, Scopes};
use crate::language::{
    ast::*,
    builtins::Builtin,
    errors::SemanticError,
    types::{Type, TypeExpr},
};
use std::collections::HashMap;

type CheckResult<T> = Result<T, SemanticError>;

/// Checks scoping and typing rules over a whole program, stopping at the
/// first violation.
pub fn analyze(program: &Program) -> Result<(), SemanticError> {
    let mut checker = Checker::new();
    for statement in &program.statements {
        checker.check_statement(statement)?;
    }
    Ok(())
}

struct Checker {
    scopes: Scopes,
    functions: HashMap<String, FunctionSignature>,
    current_function: Option<ReturnContext>,
    loop_depth: usize,
}

impl Checker {
    fn new() -> Self {
        Self {
            scopes: Scopes::new(),
            functions: HashMap::new(),
            current_function: None,
            loop_depth: 0,
        }
    }

    fn check_statement(&mut self, statement: &Statement) -> CheckResult<()> {
        match statement {
            Statement::Declaration(decl) => self.check_declaration(decl),
            Statement::Assign(stmt) => self.check_assign(stmt),
            Statement::Function(def) => self.check_function(def),
            Statement::Return(stmt) => self.check_return(stmt),
            Statement::If(stmt) => {
                self.expect_condition(&stmt.condition)?;
                self.check_block(&stmt.then_branch)?;
                if let Some(else_branch) = &stmt.else_branch {
                    self.check_block(else_branch)?;
                }
                Ok(())
            }
            Statement::While(stmt) => {
                self.expect_condition(&stmt.condition)?;
                self.loop_depth += 1;
                let result = self.check_block(&stmt.body);
                self.loop_depth -= 1;
                result
            }
            Statement::For(stmt) => self.scoped(|checker| checker.check_for(stmt)),
            Statement::Break(line) => self.check_loop_only("break", *line),
            Statement::Continue(line) => self.check_loop_only("continue", *line),
            Statement::Seq(block) | Statement::Block(block) => self.check_block(block),
            Statement::Par(block) => self.check_par(block),
            Statement::Expr(stmt) => self.check_expr(&stmt.expr).map(|_| ()),
            Statement::ServerChannel(chan) => self.check_server_channel(chan),
            Statement::ClientChannel(chan) => self.check_client_channel(chan),
        }
    }

    fn check_block(&mut self, block: &Block) -> CheckResult<()> {
        self.scoped(|checker| checker.check_statements(&block.statements))
    }

    /// Runs `check` in a nested scope. Functions defined inside it stay
    /// local to it, matching the frames a call sees at runtime.
    fn scoped(&mut self, check: impl FnOnce(&mut Self) -> CheckResult<()>) -> CheckResult<()> {
        let functions = self.functions.clone();
        self.scopes.push_scope();
        let result = check(self);
        self.scopes.pop_scope();
        self.functions = functions;
        result
    }

    fn check_statements(&mut self, statements: &[Statement]) -> CheckResult<()> {
        for statement in statements {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    fn check_declaration(&mut self, decl: &Declaration) -> CheckResult<()> {
        let declared = resolve_type(&decl.ty, decl.line)?;
        let value = self.check_expr(&decl.value)?;
        expect_assignable(declared, value, decl.line)?;
        if !self.scopes.declare(&decl.name, declared) {
            return Err(SemanticError::new(
                decl.line.0,
                format!("variable '{}' already declared", decl.name),
            ));
        }
        Ok(())
    }

    fn check_assign(&mut self, stmt: &AssignStmt) -> CheckResult<()> {
        let target = match &stmt.target {
            AssignTarget::Variable(ident) => self.lookup_variable(ident)?,
            AssignTarget::Index { base, index } => {
                let base_ty = self.check_expr(base)?;
                self.expect_index(index)?;
                base_ty.element().ok_or_else(|| {
                    SemanticError::new(
                        stmt.line.0,
                        format!("cannot assign through an index of {base_ty}"),
                    )
                })?
            }
        };
        let value = self.check_expr(&stmt.value)?;
        expect_assignable(target, value, stmt.line)
    }

    fn check_function(&mut self, def: &FunctionDef) -> CheckResult<()> {
        if self.functions.contains_key(&def.name) {
            return Err(SemanticError::new(
                def.line.0,
                format!("function '{}' already declared", def.name),
            ));
        }
        let returns = resolve_type(&def.return_type, def.line)?;
        let mut params = Vec::with_capacity(def.params.len());
        let mut seen_default = false;
        for param in &def.params {
            if param.default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(SemanticError::new(
                    param.line.0,
                    format!(
                        "parameter '{}' without a default follows a defaulted parameter",
                        param.name
                    ),
                ));
            }
            params.push(resolve_type(&param.ty, param.line)?);
        }
        self.functions.insert(
            def.name.clone(),
            FunctionSignature {
                params: params.clone(),
                required: def.required_params(),
                returns,
            },
        );

        let outer_function = self.current_function.replace(ReturnContext {
            name: def.name.clone(),
            returns,
        });
        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        let result = self.scoped(|checker| checker.check_function_body(def, &params));
        self.loop_depth = outer_loops;
        self.current_function = outer_function;
        result
    }

    fn check_function_body(&mut self, def: &FunctionDef, params: &[Type]) -> CheckResult<()> {
        for (param, ty) in def.params.iter().zip(params) {
            if let Some(default) = &param.default {
                let value = self.check_expr(default)?;
                expect_assignable(*ty, value, param.line)?;
            }
            if !self.scopes.declare(&param.name, *ty) {
                return Err(SemanticError::new(
                    param.line.0,
                    format!("variable '{}' already declared", param.name),
                ));
            }
        }
        self.check_statements(&def.body.statements)
    }

    fn check_return(&mut self, stmt: &ReturnStmt) -> CheckResult<()> {
        let Some(context) = self.current_function.clone() else {
            return Err(SemanticError::new(
                stmt.line.0,
                "'return' outside of a function",
            ));
        };
        let value = self.check_expr(&stmt.value)?;
        if value != context.returns {
            return Err(SemanticError::new(
                stmt.line.0,
                format!(
                    "function '{}' returns {}, found {}",
                    context.name, context.returns, value
                ),
            ));
        }
        Ok(())
    }

    fn check_for(&mut self, stmt: &ForStmt) -> CheckResult<()> {
        self.check_statement(&stmt.init)?;
        self.expect_condition(&stmt.condition)?;
        self.check_assign(&stmt.update)?;
        self.loop_depth += 1;
        let result = self.check_statements(&stmt.body.statements);
        self.loop_depth -= 1;
        result
    }

    fn check_loop_only(&self, keyword: &str, line: Line) -> CheckResult<()> {
        if self.loop_depth == 0 {
            return Err(SemanticError::new(
                line.0,
                format!("'{keyword}' outside of a loop"),
            ));
        }
        Ok(())
    }

    /// Each unit runs against its own copy of the interpreter state, so each
    /// is checked in a fresh scope and may not transfer control out of the
    /// block.
    fn check_par(&mut self, block: &Block) -> CheckResult<()> {
        for child in &block.statements {
            let keyword = match child {
                Statement::Break(_) => Some("break"),
                Statement::Continue(_) => Some("continue"),
                Statement::Return(_) => Some("return"),
                _ => None,
            };
            if let Some(keyword) = keyword {
                return Err(SemanticError::new(
                    child.line().0,
                    format!("'{keyword}' is not allowed directly inside 'par'"),
                ));
            }

            let outer_function = self.current_function.take();
            let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
            let result = self.scoped(|checker| checker.check_statement(child));
            self.loop_depth = outer_loops;
            self.current_function = outer_function;
            result?;
        }
        Ok(())
    }

    fn check_server_channel(&mut self, chan: &ServerChannel) -> CheckResult<()> {
        let Some(handler) = self.functions.get(&chan.handler) else {
            return Err(SemanticError::new(
                chan.line.0,
                format!("handler function '{}' not declared", chan.handler),
            ));
        };
        if handler.returns != Type::String {
            return Err(SemanticError::new(
                chan.line.0,
                format!(
                    "handler function '{}' must return STRING, found {}",
                    chan.handler, handler.returns
                ),
            ));
        }
        let description = self.check_expr(&chan.description)?;
        expect_type("server description", Type::String, description, chan.line)?;
        self.check_endpoint(&chan.host, &chan.port, chan.line)
    }

    fn check_client_channel(&mut self, chan: &ClientChannel) -> CheckResult<()> {
        self.check_endpoint(&chan.host, &chan.port, chan.line)?;
        if !self.scopes.declare(&chan.name, Type::String) {
            return Err(SemanticError::new(
                chan.line.0,
                format!("channel '{}' already declared", chan.name),
            ));
        }
        Ok(())
    }

    fn check_endpoint(&mut self, host: &Expr, port: &Expr, line: Line) -> CheckResult<()> {
        let host = self.check_expr(host)?;
        expect_type("channel host", Type::String, host, line)?;
        let port = self.check_expr(port)?;
        expect_type("channel port", Type::Number, port, line)
    }

    fn expect_condition(&mut self, condition: &Expr) -> CheckResult<()> {
        let ty = self.check_expr(condition)?;
        expect_type("condition", Type::Bool, ty, condition.line())
    }

    fn expect_index(&mut self, index: &Expr) -> CheckResult<()> {
        let ty = self.check_expr(index)?;
        expect_type("index", Type::Number, ty, index.line())
    }

    fn lookup_variable(&self, ident: &Identifier) -> CheckResult<Type> {
        self.scopes.lookup(&ident.name).ok_or_else(|| {
            SemanticError::new(
                ident.line.0,
                format!("variable '{}' not declared", ident.name),
            )
        })
    }

    fn check_expr(&mut self, expr: &Expr) -> CheckResult<Type> {
        match expr {
            Expr::Literal(Literal::Number(..)) => Ok(Type::Number),
            Expr::Literal(Literal::String(..)) => Ok(Type::String),
            Expr::Literal(Literal::Bool(..)) => Ok(Type::Bool),
            Expr::Identifier(ident) => self.lookup_variable(ident),
            Expr::Binary {
                op,
                left,
                right,
                line,
            } => {
                let left = self.check_expr(left)?;
                let right = self.check_expr(right)?;
                binary_result(*op, left, right).ok_or_else(|| {
                    SemanticError::new(
                        line.0,
                        format!(
                            "operator '{}' cannot be applied to {left} and {right}",
                            op.symbol()
                        ),
                    )
                })
            }
            Expr::Unary { op, expr, line } => {
                let operand = self.check_expr(expr)?;
                let expected = match op {
                    UnaryOp::Neg => Type::Number,
                    UnaryOp::Not => Type::Bool,
                };
                if operand != expected {
                    return Err(SemanticError::new(
                        line.0,
                        format!(
                            "operator '{}' cannot be applied to {operand}",
                            op.symbol()
                        ),
                    ));
                }
                Ok(operand)
            }
            Expr::Call { callee, args, line } => self.check_call(callee, args, *line),
            Expr::Index { base, index, line } => {
                let base = self.check_expr(base)?;
                self.expect_index(index)?;
                match base {
                    Type::String => Ok(Type::String),
                    other => other.element().ok_or_else(|| {
                        SemanticError::new(line.0, format!("cannot index a value of type {other}"))
                    }),
                }
            }
            Expr::ArrayLiteral(values, line) => self.check_array_literal(values, *line),
        }
    }

    fn check_array_literal(&mut self, values: &[Expr], line: Line) -> CheckResult<Type> {
        let mut element: Option<Type> = None;
        for value in values {
            let ty = self.check_expr(value)?;
            match element {
                None => element = Some(ty),
                Some(expected) if expected != ty => {
                    return Err(SemanticError::new(
                        line.0,
                        format!("array elements must share one type, found {expected} and {ty}"),
                    ));
                }
                Some(_) => {}
            }
        }
        let element = element.unwrap_or(Type::Number);
        element.array_of().ok_or_else(|| {
            SemanticError::new(
                line.0,
                format!("arrays of {element} are not supported"),
            )
        })
    }

    fn check_call(&mut self, callee: &str, args: &[Expr], line: Line) -> CheckResult<Type> {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.check_expr(arg)?);
        }

        if let Some(builtin) = Builtin::from_name(callee) {
            return check_builtin(builtin, &arg_types, line);
        }

        let Some(signature) = self.functions.get(callee) else {
            return Err(SemanticError::new(
                line.0,
                format!("function '{callee}' not declared"),
            ));
        };
        if !signature.accepts_arity(arg_types.len()) {
            let expected = if signature.required == signature.params.len() {
                signature.required.to_string()
            } else {
                format!("{} to {}", signature.required, signature.params.len())
            };
            return Err(SemanticError::new(
                line.0,
                format!(
                    "function '{callee}' expects {expected} arguments, found {}",
                    arg_types.len()
                ),
            ));
        }
        for (param, arg) in signature.params.iter().zip(&arg_types) {
            expect_assignable(*param, *arg, line)?;
        }
        Ok(signature.returns)
    }
}

fn resolve_type(expr: &TypeExpr, line: Line) -> CheckResult<Type> {
    Type::from_type_expr(expr)
        .ok_or_else(|| SemanticError::new(line.0, format!("unknown type '{expr}'")))
}

fn expect_assignable(expected: Type, found: Type, line: Line) -> CheckResult<()> {
    if expected.accepts(found) {
        Ok(())
    } else {
        Err(SemanticError::new(
            line.0,
            format!("type mismatch: expected {expected}, found {found}"),
        ))
    }
}

fn expect_type(what: &str, expected: Type, found: Type, line: Line) -> CheckResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(SemanticError::new(
            line.0,
            format!("{what} must be {expected}, found {found}"),
        ))
    }
}

fn binary_result(op: BinaryOp, left: Type, right: Type) -> Option<Type> {
    match op {
        BinaryOp::And | BinaryOp::Or => {
            (left == Type::Bool && right == Type::Bool).then_some(Type::Bool)
        }
        BinaryOp::Eq | BinaryOp::NotEq => (left == right).then_some(Type::Bool),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            (left == Type::Number && right == Type::Number).then_some(Type::Bool)
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            (left == Type::Number && right == Type::Number).then_some(Type::Number)
        }
        BinaryOp::Add => {
            let addable = matches!(left, Type::Number | Type::String) || left.is_array();
            (left == right && addable).then_some(left)
        }
    }
}

fn check_builtin(builtin: Builtin, args: &[Type], line: Line) -> CheckResult<Type> {
    let name = builtin.name();
    let arity = |expected: usize| -> CheckResult<()> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(SemanticError::new(
                line.0,
                format!(
                    "function '{name}' expects {expected} arguments, found {}",
                    args.len()
                ),
            ))
        }
    };
    let strings = |expected: usize| -> CheckResult<()> {
        arity(expected)?;
        for ty in args {
            expect_type(&format!("argument of '{name}'"), Type::String, *ty, line)?;
        }
        Ok(())
    };
    let printable = || -> CheckResult<()> {
        arity(1)?;
        if args[0].is_printable() {
            Ok(())
        } else {
            Err(SemanticError::new(
                line.0,
                format!("function '{name}' cannot take a value of type {}", args[0]),
            ))
        }
    };

    match builtin {
        Builtin::Print => {
            if args.is_empty() {
                return Err(SemanticError::new(
                    line.0,
                    "function 'print' expects at least one argument",
                ));
            }
            if let Some(ty) = args.iter().find(|ty| !ty.is_printable()) {
                return Err(SemanticError::new(
                    line.0,
                    format!("cannot print a value of type {ty}"),
                ));
            }
            Ok(Type::Void)
        }
        Builtin::Input => arity(0).map(|_| Type::String),
        Builtin::Sleep => {
            arity(1)?;
            expect_type("argument of 'sleep'", Type::Number, args[0], line)?;
            Ok(Type::Void)
        }
        Builtin::Split => strings(2).map(|_| Type::ArrayString),
        Builtin::IsNum | Builtin::IsAlpha => strings(1).map(|_| Type::Bool),
        Builtin::ToNumber => strings(1).map(|_| Type::Number),
        Builtin::ToString => printable().map(|_| Type::String),
        Builtin::ToBool => printable().map(|_| Type::Bool),
        Builtin::Len => {
            arity(1)?;
            if args[0] == Type::String || args[0].is_array() {
                Ok(Type::Number)
            } else {
                Err(SemanticError::new(
                    line.0,
                    format!("function 'len' expects STRING or an array, found {}", args[0]),
                ))
            }
        }
        Builtin::Send => strings(2).map(|_| Type::String),
        Builtin::Close => strings(1).map(|_| Type::Void),
    }
}
