use crate::language::{
    ast::*,
    errors::ParseError,
    lexer::{Lexer, TokenSource},
    token::{Token, TokenKind},
    types::TypeExpr,
};

pub fn parse_source(source: &str) -> Result<Program, ParseError> {
    parse_program(Lexer::new(source))
}

pub fn parse_program<S: TokenSource>(tokens: S) -> Result<Program, ParseError> {
    Parser::new(tokens)?.parse()
}

struct Parser<S> {
    tokens: S,
    lookahead: Token,
}

impl<S: TokenSource> Parser<S> {
    fn new(mut tokens: S) -> Result<Self, ParseError> {
        let lookahead = tokens.next_token()?;
        Ok(Self { tokens, lookahead })
    }

    fn parse(mut self) -> Result<Program, ParseError> {
        let statements = self.parse_statements()?;
        self.expect(TokenKind::Eof)?;
        Ok(Program { statements })
    }

    fn parse_statements(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.lookahead.kind {
            TokenKind::Func => self.parse_function().map(Statement::Function),
            TokenKind::If => self.parse_if().map(Statement::If),
            TokenKind::While => self.parse_while().map(Statement::While),
            TokenKind::For => self.parse_for().map(Statement::For),
            TokenKind::Seq => {
                self.advance()?;
                self.parse_block().map(Statement::Seq)
            }
            TokenKind::Par => {
                self.advance()?;
                self.parse_block().map(Statement::Par)
            }
            TokenKind::SChannel => self.parse_server_channel().map(Statement::ServerChannel),
            TokenKind::CChannel => self.parse_client_channel().map(Statement::ClientChannel),
            TokenKind::LBrace => self.parse_block().map(Statement::Block),
            _ => self.parse_simple(),
        }
    }

    fn parse_simple(&mut self) -> Result<Statement, ParseError> {
        if self.check(TokenKind::Return) {
            let line = self.advance()?.line;
            let value = self.parse_expression()?;
            return Ok(Statement::Return(ReturnStmt {
                value,
                line: Line(line),
            }));
        }
        if self.check(TokenKind::Break) {
            let line = self.advance()?.line;
            return Ok(Statement::Break(Line(line)));
        }
        if self.check(TokenKind::Continue) {
            let line = self.advance()?.line;
            return Ok(Statement::Continue(Line(line)));
        }

        let ident = self.expect_identifier()?;
        let line = ident.line;
        let mut target = AssignTarget::Variable(ident.clone());
        while self.matches(TokenKind::LBracket)? {
            let index = self.parse_expression()?;
            self.expect(TokenKind::RBracket)?;
            let base = match target {
                AssignTarget::Variable(ident) => Expr::Identifier(ident),
                AssignTarget::Index { base, index } => Expr::Index {
                    base,
                    index,
                    line,
                },
            };
            target = AssignTarget::Index {
                base: Box::new(base),
                index: Box::new(index),
            };
        }

        let indexed = matches!(target, AssignTarget::Index { .. });
        if indexed && !self.check(TokenKind::Eq) {
            return Err(self.error_here(&format!(
                "Expected '=' after indexed target, found: {}",
                self.found()
            )));
        }

        if self.matches(TokenKind::Colon)? {
            let ty = self.parse_type()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_expression()?;
            return Ok(Statement::Declaration(Declaration {
                name: ident.name,
                ty,
                value,
                line,
            }));
        }
        if self.matches(TokenKind::Eq)? {
            let value = self.parse_expression()?;
            return Ok(Statement::Assign(AssignStmt {
                target,
                value,
                line,
            }));
        }
        if self.check(TokenKind::LParen) {
            let args = self.parse_call_arguments()?;
            return Ok(Statement::Expr(ExprStmt {
                expr: Expr::Call {
                    callee: ident.name,
                    args,
                    line,
                },
                line,
            }));
        }
        Err(self.error_here(&format!(
            "Expected ':', '=', '[', or '(' after identifier, found: {}",
            self.found()
        )))
    }

    fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        if self.matches(TokenKind::LBracket)? {
            let inner = self.parse_type()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(TypeExpr::array(inner));
        }
        if self.check(TokenKind::Type) {
            let token = self.advance()?;
            return Ok(TypeExpr::named(token.lexeme));
        }
        Err(self.error_here(&format!("Expected type, found: {}", self.found())))
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.matches(TokenKind::RParen)? {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.matches(TokenKind::Comma)? {
                continue;
            }
            break;
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_function(&mut self) -> Result<FunctionDef, ParseError> {
        let line = self.expect(TokenKind::Func)?.line;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if self.matches(TokenKind::Comma)? {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Arrow)?;
        let return_type = self.parse_type()?;
        let body = self.parse_block()?;
        Ok(FunctionDef {
            name: name.name,
            params,
            return_type,
            body,
            line: Line(line),
        })
    }

    fn parse_param(&mut self) -> Result<FunctionParam, ParseError> {
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let default = if self.matches(TokenKind::Eq)? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(FunctionParam {
            name: name.name,
            ty,
            default,
            line: name.line,
        })
    }

    fn parse_if(&mut self) -> Result<IfStmt, ParseError> {
        let line = self.expect(TokenKind::If)?.line;
        let condition = self.parse_condition()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches(TokenKind::Else)? {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(IfStmt {
            condition,
            then_branch,
            else_branch,
            line: Line(line),
        })
    }

    fn parse_while(&mut self) -> Result<WhileStmt, ParseError> {
        let line = self.expect(TokenKind::While)?.line;
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        Ok(WhileStmt {
            condition,
            body,
            line: Line(line),
        })
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        Ok(condition)
    }

    fn parse_for(&mut self) -> Result<ForStmt, ParseError> {
        let line = self.expect(TokenKind::For)?.line;
        self.expect(TokenKind::LParen)?;
        let init = self.parse_simple()?;
        self.expect(TokenKind::Semi)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Semi)?;
        let update_line = self.lookahead.line;
        let update = match self.parse_simple()? {
            Statement::Assign(stmt) => stmt,
            _ => {
                return Err(ParseError::syntax(
                    "for-loop update must be an assignment",
                    update_line,
                    self.lookahead.span,
                ));
            }
        };
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(ForStmt {
            init: Box::new(init),
            condition,
            update,
            body,
            line: Line(line),
        })
    }

    fn parse_server_channel(&mut self) -> Result<ServerChannel, ParseError> {
        let line = self.expect(TokenKind::SChannel)?.line;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace)?;
        let handler = self.expect_identifier()?;
        self.expect(TokenKind::Comma)?;
        let description = self.parse_primary()?;
        self.expect(TokenKind::Comma)?;
        let host = self.parse_primary()?;
        self.expect(TokenKind::Comma)?;
        let port = self.parse_primary()?;
        self.expect(TokenKind::RBrace)?;
        Ok(ServerChannel {
            name: name.name,
            handler: handler.name,
            description,
            host,
            port,
            line: Line(line),
        })
    }

    fn parse_client_channel(&mut self) -> Result<ClientChannel, ParseError> {
        let line = self.expect(TokenKind::CChannel)?.line;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace)?;
        let host = self.parse_primary()?;
        self.expect(TokenKind::Comma)?;
        let port = self.parse_primary()?;
        self.expect(TokenKind::RBrace)?;
        Ok(ClientChannel {
            name: name.name,
            host,
            port,
            line: Line(line),
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let line = self.expect(TokenKind::LBrace)?.line;
        let statements = self.parse_statements()?;
        self.expect(TokenKind::RBrace)?;
        Ok(Block {
            statements,
            line: Line(line),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_binary_op() {
                Some(op) if op.precedence() >= min_prec => op,
                _ => break,
            };
            let line = self.advance()?.line;
            let right = self.parse_binary(op.precedence() + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line: Line(line),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.lookahead.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        let line = self.advance()?.line;
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            line: Line(line),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.lookahead.kind {
            TokenKind::Number => self.parse_number_literal(),
            TokenKind::String => {
                let token = self.advance()?;
                Ok(Expr::Literal(Literal::String(token.lexeme, Line(token.line))))
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance()?;
                let value = token.kind == TokenKind::True;
                Ok(Expr::Literal(Literal::Bool(value, Line(token.line))))
            }
            TokenKind::Identifier => self.parse_identifier_expression(),
            TokenKind::LBracket => {
                let line = self.advance()?.line;
                let mut values = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        values.push(self.parse_expression()?);
                        if self.matches(TokenKind::Comma)? {
                            continue;
                        }
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::ArrayLiteral(values, Line(line)))
            }
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.error_here(&format!("Expected expression, found: {}", self.found()))),
        }
    }

    fn parse_number_literal(&mut self) -> Result<Expr, ParseError> {
        let whole = self.expect(TokenKind::Number)?;
        let mut text = whole.lexeme;
        if self.matches(TokenKind::Dot)? {
            if !self.check(TokenKind::Number) {
                return Err(
                    self.error_here(&format!("Expected digits after '.', found: {}", self.found()))
                );
            }
            let fraction = self.advance()?;
            text.push('.');
            text.push_str(&fraction.lexeme);
        }
        match text.parse::<f64>() {
            Ok(value) => Ok(Expr::Literal(Literal::Number(value, Line(whole.line)))),
            Err(_) => Err(ParseError::syntax(
                format!("Invalid number literal '{text}'"),
                whole.line,
                whole.span,
            )),
        }
    }

    fn parse_identifier_expression(&mut self) -> Result<Expr, ParseError> {
        let ident = self.expect_identifier()?;
        let line = ident.line;
        if self.check(TokenKind::LParen) {
            let args = self.parse_call_arguments()?;
            return Ok(Expr::Call {
                callee: ident.name,
                args,
                line,
            });
        }
        if self.matches(TokenKind::LBracket)? {
            let index = self.parse_expression()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Expr::Index {
                base: Box::new(Expr::Identifier(ident)),
                index: Box::new(index),
                line,
            });
        }
        Ok(Expr::Identifier(ident))
    }

    fn current_binary_op(&self) -> Option<BinaryOp> {
        match self.lookahead.kind {
            TokenKind::PipePipe => Some(BinaryOp::Or),
            TokenKind::AmpersandAmpersand => Some(BinaryOp::And),
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::BangEq => Some(BinaryOp::NotEq),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        }
    }

    fn expect_identifier(&mut self) -> Result<Identifier, ParseError> {
        let token = self.expect(TokenKind::Identifier)?;
        Ok(Identifier {
            name: token.lexeme,
            line: Line(token.line),
        })
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            self.advance()
        } else {
            Err(self.error_here(&format!(
                "Expected {}, found: {}",
                kind.describe(),
                self.found()
            )))
        }
    }

    fn matches(&mut self, kind: TokenKind) -> Result<bool, ParseError> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.lookahead.kind == kind
    }

    /// Consumes the lookahead and pulls the next token from the source.
    fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.tokens.next_token()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn found(&self) -> String {
        match self.lookahead.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::String => format!("\"{}\"", self.lookahead.lexeme),
            _ => format!("'{}'", self.lookahead.lexeme),
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError::syntax(message, self.lookahead.line, self.lookahead.span)
    }
}
