use crate::language::types::TypeExpr;
use std::fmt;

/// Source line a node was parsed from.
///
/// Lines only feed diagnostics, so two nodes that differ in nothing but their
/// lines compare equal.
#[derive(Clone, Copy, Debug, Default)]
pub struct Line(pub usize);

impl PartialEq for Line {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for Line {}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Declaration(Declaration),
    Assign(AssignStmt),
    Function(FunctionDef),
    Return(ReturnStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Break(Line),
    Continue(Line),
    Seq(Block),
    Par(Block),
    Block(Block),
    Expr(ExprStmt),
    ServerChannel(ServerChannel),
    ClientChannel(ClientChannel),
}

impl Statement {
    pub fn line(&self) -> Line {
        match self {
            Statement::Declaration(stmt) => stmt.line,
            Statement::Assign(stmt) => stmt.line,
            Statement::Function(def) => def.line,
            Statement::Return(stmt) => stmt.line,
            Statement::If(stmt) => stmt.line,
            Statement::While(stmt) => stmt.line,
            Statement::For(stmt) => stmt.line,
            Statement::Break(line) | Statement::Continue(line) => *line,
            Statement::Seq(block) | Statement::Par(block) | Statement::Block(block) => block.line,
            Statement::Expr(stmt) => stmt.line,
            Statement::ServerChannel(chan) => chan.line,
            Statement::ClientChannel(chan) => chan.line,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub ty: TypeExpr,
    pub value: Expr,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssignStmt {
    pub target: AssignTarget,
    pub value: Expr,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AssignTarget {
    Variable(Identifier),
    /// `base[index] = ...`, where `base` is itself a variable or an index chain.
    Index { base: Box<Expr>, index: Box<Expr> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<FunctionParam>,
    pub return_type: TypeExpr,
    pub body: Block,
    pub line: Line,
}

impl FunctionDef {
    pub fn required_params(&self) -> usize {
        self.params
            .iter()
            .take_while(|param| param.default.is_none())
            .count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionParam {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub value: Expr,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Block,
    pub else_branch: Option<Block>,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub init: Box<Statement>,
    pub condition: Expr,
    pub update: AssignStmt,
    pub body: Block,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerChannel {
    pub name: String,
    pub handler: String,
    pub description: Expr,
    pub host: Expr,
    pub port: Expr,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClientChannel {
    pub name: String,
    pub host: Expr,
    pub port: Expr,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Identifier(Identifier),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: Line,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        line: Line,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
        line: Line,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        line: Line,
    },
    ArrayLiteral(Vec<Expr>, Line),
}

impl Expr {
    pub fn line(&self) -> Line {
        match self {
            Expr::Literal(lit) => lit.line(),
            Expr::Identifier(ident) => ident.line,
            Expr::Binary { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Call { line, .. }
            | Expr::Index { line, .. } => *line,
            Expr::ArrayLiteral(_, line) => *line,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub line: Line,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64, Line),
    String(String, Line),
    Bool(bool, Line),
}

impl Literal {
    pub fn line(&self) -> Line {
        match self {
            Literal::Number(_, line) | Literal::String(_, line) | Literal::Bool(_, line) => *line,
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq => 3,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}
