use crate::language::{ast::*, types::TypeExpr};

const INDENT: usize = 4;

pub fn format_program(program: &Program) -> String {
    let mut out = String::new();
    for (idx, statement) in program.statements.iter().enumerate() {
        if idx > 0 && needs_blank_line(&program.statements[idx - 1], statement) {
            out.push('\n');
        }
        format_statement(&mut out, statement, 0);
    }
    out
}

fn needs_blank_line(previous: &Statement, next: &Statement) -> bool {
    matches!(previous, Statement::Function(_)) || matches!(next, Statement::Function(_))
}

fn format_statement(out: &mut String, statement: &Statement, indent: usize) {
    let prefix = " ".repeat(indent);
    out.push_str(&prefix);
    match statement {
        Statement::Declaration(decl) => {
            out.push_str(&format!(
                "{}: {} = {}\n",
                decl.name,
                format_type(&decl.ty),
                format_expr(&decl.value)
            ));
        }
        Statement::Assign(stmt) => {
            out.push_str(&format_assign(stmt));
            out.push('\n');
        }
        Statement::Function(def) => format_function(out, def, indent),
        Statement::Return(stmt) => {
            out.push_str(&format!("return {}\n", format_expr(&stmt.value)));
        }
        Statement::If(stmt) => {
            out.push_str(&format!("if ({}) ", format_expr(&stmt.condition)));
            format_block(out, &stmt.then_branch, indent);
            if let Some(else_branch) = &stmt.else_branch {
                out.push_str(" else ");
                format_block(out, else_branch, indent);
            }
            out.push('\n');
        }
        Statement::While(stmt) => {
            out.push_str(&format!("while ({}) ", format_expr(&stmt.condition)));
            format_block(out, &stmt.body, indent);
            out.push('\n');
        }
        Statement::For(stmt) => {
            out.push_str(&format!(
                "for ({}; {}; {}) ",
                format_simple(&stmt.init),
                format_expr(&stmt.condition),
                format_assign(&stmt.update)
            ));
            format_block(out, &stmt.body, indent);
            out.push('\n');
        }
        Statement::Break(_) => out.push_str("break\n"),
        Statement::Continue(_) => out.push_str("continue\n"),
        Statement::Seq(block) => {
            out.push_str("seq ");
            format_block(out, block, indent);
            out.push('\n');
        }
        Statement::Par(block) => {
            out.push_str("par ");
            format_block(out, block, indent);
            out.push('\n');
        }
        Statement::Block(block) => {
            format_block(out, block, indent);
            out.push('\n');
        }
        Statement::Expr(stmt) => {
            out.push_str(&format_expr(&stmt.expr));
            out.push('\n');
        }
        Statement::ServerChannel(chan) => {
            out.push_str(&format!(
                "s_channel {} {{ {}, {}, {}, {} }}\n",
                chan.name,
                chan.handler,
                format_channel_arg(&chan.description),
                format_channel_arg(&chan.host),
                format_channel_arg(&chan.port)
            ));
        }
        Statement::ClientChannel(chan) => {
            out.push_str(&format!(
                "c_channel {} {{ {}, {} }}\n",
                chan.name,
                format_channel_arg(&chan.host),
                format_channel_arg(&chan.port)
            ));
        }
    }
}

/// Writes `{ ... }` without a trailing newline; the caller decides what follows.
fn format_block(out: &mut String, block: &Block, indent: usize) {
    if block.statements.is_empty() {
        out.push_str("{ }");
        return;
    }
    out.push_str("{\n");
    for statement in &block.statements {
        format_statement(out, statement, indent + INDENT);
    }
    out.push_str(&" ".repeat(indent));
    out.push('}');
}

fn format_function(out: &mut String, def: &FunctionDef, indent: usize) {
    let params = def
        .params
        .iter()
        .map(|param| match &param.default {
            Some(default) => format!(
                "{}: {} = {}",
                param.name,
                format_type(&param.ty),
                format_expr(default)
            ),
            None => format!("{}: {}", param.name, format_type(&param.ty)),
        })
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!(
        "func {}({}) -> {} ",
        def.name,
        params,
        format_type(&def.return_type)
    ));
    format_block(out, &def.body, indent);
    out.push('\n');
}

/// A statement rendered on a single line, as used in `for` headers.
fn format_simple(statement: &Statement) -> String {
    let mut out = String::new();
    format_statement(&mut out, statement, 0);
    out.trim_end().to_string()
}

fn format_assign(stmt: &AssignStmt) -> String {
    let target = match &stmt.target {
        AssignTarget::Variable(ident) => ident.name.clone(),
        AssignTarget::Index { base, index } => {
            format!("{}[{}]", format_expr(base), format_expr(index))
        }
    };
    format!("{} = {}", target, format_expr(&stmt.value))
}

/// Channel arguments are parsed as primaries, so anything else needs parentheses.
fn format_channel_arg(expr: &Expr) -> String {
    match expr {
        Expr::Binary { .. } | Expr::Unary { .. } => format!("({})", format_expr(expr)),
        _ => format_expr(expr),
    }
}

pub fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(Literal::Number(value, _)) => format_number_literal(*value),
        Expr::Literal(Literal::String(value, _)) => format!("\"{value}\""),
        Expr::Literal(Literal::Bool(value, _)) => value.to_string(),
        Expr::Identifier(ident) => ident.name.clone(),
        Expr::Binary {
            op, left, right, ..
        } => {
            let left = format_operand(left, op.precedence(), false);
            let right = format_operand(right, op.precedence(), true);
            format!("{} {} {}", left, op.symbol(), right)
        }
        Expr::Unary { op, expr, .. } => {
            let operand = match expr.as_ref() {
                Expr::Binary { .. } => format!("({})", format_expr(expr)),
                _ => format_expr(expr),
            };
            format!("{}{}", op.symbol(), operand)
        }
        Expr::Call { callee, args, .. } => {
            let args = args.iter().map(format_expr).collect::<Vec<_>>().join(", ");
            format!("{callee}({args})")
        }
        Expr::Index { base, index, .. } => {
            format!("{}[{}]", format_expr(base), format_expr(index))
        }
        Expr::ArrayLiteral(values, _) => {
            let values = values.iter().map(format_expr).collect::<Vec<_>>().join(", ");
            format!("[{values}]")
        }
    }
}

/// Operators are left-associative, so a right operand of equal precedence
/// keeps its parentheses.
fn format_operand(expr: &Expr, parent: u8, right: bool) -> String {
    match expr {
        Expr::Binary { op, .. }
            if op.precedence() < parent || (right && op.precedence() == parent) =>
        {
            format!("({})", format_expr(expr))
        }
        _ => format_expr(expr),
    }
}

fn format_number_literal(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn format_type(ty: &TypeExpr) -> String {
    ty.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_source;

    fn assert_round_trip(source: &str) -> String {
        let program = parse_source(source).expect("parse original");
        let formatted = format_program(&program);
        let reparsed = parse_source(&formatted)
            .unwrap_or_else(|err| panic!("formatted source did not parse: {err}\n{formatted}"));
        assert_eq!(program, reparsed, "round trip changed the program:\n{formatted}");
        formatted
    }

    #[test]
    fn round_trips_every_statement_kind() {
        assert_round_trip(
            r#"
# comments are dropped
x: number = 2
grid: [[number]] = [[1, 2], []]
names: [string] = ["a", "b"]
names[0] = "c"
func greet(name: string, times: number = 1) -> string {
    if (times > 1) { return name + "!" } else { return name }
}
while (x < 10) { x = x + 1 if (x == 5) { continue } if (x == 8) { break } }
for (i: number = 0; i < 3; i = i + 1) { print(i) }
seq { print("a") print("b") }
par { print("c") sleep(10) }
{ inner: bool = !true }
func handler(msg: string) -> string { return msg }
s_channel srv { handler, "echo service", "localhost", (8000 + 1) }
c_channel cli { "localhost", 8001 }
print(send(cli, "ping"))
"#,
        );
    }

    #[test]
    fn keeps_needed_parentheses_only() {
        let formatted = assert_round_trip("x: number = (1 + 2) * 3 - (4 - 5) - -(6 + 7)");
        assert_eq!(formatted, "x: number = (1 + 2) * 3 - (4 - 5) - -(6 + 7)\n");
        let formatted = assert_round_trip("y: bool = ((a < b) || (c && d)) && !!e");
        assert_eq!(formatted, "y: bool = (a < b || c && d) && !!e\n");
    }

    #[test]
    fn prints_fractions_and_integers() {
        let formatted = assert_round_trip("a: number = 3.25\nb: number = 10.0\nc: number = 0.05");
        assert_eq!(formatted, "a: number = 3.25\nb: number = 10\nc: number = 0.05\n");
    }

    #[test]
    fn indents_nested_blocks() {
        let formatted = format_program(
            &parse_source("func f(n: number) -> void { while (n > 0) { n = n - 1 } }")
                .expect("parse"),
        );
        assert_eq!(
            formatted,
            "func f(n: number) -> void {\n    while (n > 0) {\n        n = n - 1\n    }\n}\n"
        );
    }

    #[test]
    fn empty_blocks_stay_on_one_line() {
        let formatted = assert_round_trip("while (false) { }");
        assert_eq!(formatted, "while (false) { }\n");
    }
}
