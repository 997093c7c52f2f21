use super::analyze;
use crate::language::{errors::SemanticError, parser::parse_source};

fn check(source: &str) -> Result<(), SemanticError> {
    let program = parse_source(source).expect("parse");
    analyze(&program)
}

fn check_err(source: &str) -> SemanticError {
    check(source).expect_err("expected semantic error")
}

#[test]
fn accepts_arithmetic_program() {
    check("x: number = 2\ny: number = 3\nprint(x + y)").expect("valid program");
}

#[test]
fn rejects_redeclaration_in_same_scope() {
    let err = check_err("y: number = 1\ny: number = 2");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("already declared"));
}

#[test]
fn allows_shadowing_in_nested_scope() {
    check("y: number = 1\nif (true) {\n  y: string = \"inner\"\n  print(y)\n}\nprint(y)")
        .expect("shadowing is allowed");
}

#[test]
fn block_locals_vanish_after_block() {
    let err = check_err("{\n  inner: number = 1\n}\nprint(inner)");
    assert_eq!(err.line, 4);
    assert!(err.message.contains("'inner' not declared"));
}

#[test]
fn empty_array_fits_any_array_type() {
    check("a: [string] = []\nb: [bool] = []\nc: [number] = []").expect("empty arrays");
}

#[test]
fn rejects_unknown_nested_array_type() {
    let err = check_err("grid: [[number]] = []");
    assert!(err.message.contains("unknown type '[[number]]'"));
}

#[test]
fn rejects_heterogeneous_array_literal() {
    let err = check_err("a: [number] = [1, \"two\"]");
    assert!(err.message.contains("share one type"));
}

#[test]
fn operator_typing() {
    check("a: [number] = [1, 2] + [3]\ns: string = \"a\" + \"b\"\nr: number = 7 % 2.5")
        .expect("addable operands");
    assert!(check_err("x: number = 1 + \"a\"").message.contains("'+'"));
    assert!(check_err("x: bool = 1 && true").message.contains("'&&'"));
    assert!(check_err("x: bool = \"a\" < \"b\"").message.contains("'<'"));
    assert!(check_err("x: bool = 1 == true").message.contains("'=='"));
    assert!(check_err("x: number = -true").message.contains("'-'"));
    assert!(check_err("x: bool = !1").message.contains("'!'"));
}

#[test]
fn conditions_must_be_bool() {
    let err = check_err("while (1) { }");
    assert!(err.message.contains("condition must be BOOL"));
}

#[test]
fn index_rules() {
    check("s: string = \"abc\"\nc: string = s[0]\na: [bool] = [true]\nb: bool = a[0]\na[0] = false")
        .expect("indexing");
    assert!(check_err("n: number = 5\nx: number = n[0]").message.contains("cannot index"));
    assert!(check_err("a: [number] = [1]\nx: number = a[\"0\"]").message.contains("index must be NUMBER"));
    assert!(check_err("s: string = \"abc\"\ns[0] = \"x\"").message.contains("cannot assign"));
}

#[test]
fn functions_allow_recursion_and_check_returns() {
    check(
        "func fact(n: number) -> number {\n  if (n <= 1) { return 1 }\n  return n * fact(n - 1)\n}\nprint(fact(5))",
    )
    .expect("recursive function");
    let err = check_err("func f() -> number {\n  return \"x\"\n}");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("returns NUMBER, found STRING"));
}

#[test]
fn function_may_only_call_earlier_functions() {
    let err = check_err("func a() -> number { return b() }\nfunc b() -> number { return 1 }");
    assert!(err.message.contains("function 'b' not declared"));
}

#[test]
fn rejects_duplicate_function() {
    let err = check_err("func f() -> void { }\nfunc f() -> void { }");
    assert!(err.message.contains("function 'f' already declared"));
}

#[test]
fn default_parameters_relax_arity() {
    let program = "func greet(name: string, times: number = 2) -> number { return times }\n";
    check(&format!("{program}print(greet(\"a\"))\nprint(greet(\"a\", 3))")).expect("defaults");
    let err = check_err(&format!("{program}print(greet())"));
    assert!(err.message.contains("expects 1 to 2 arguments, found 0"));
    let err = check_err("func f(a: number = \"x\") -> void { }");
    assert!(err.message.contains("type mismatch"));
    let err = check_err("func f(a: number = 1, b: number) -> void { }");
    assert!(err.message.contains("without a default"));
}

#[test]
fn return_outside_function_is_rejected() {
    assert!(check_err("return 1").message.contains("outside of a function"));
}

#[test]
fn break_and_continue_need_a_loop() {
    assert!(check_err("break").message.contains("outside of a loop"));
    check("while (true) { if (true) { break } continue }").expect("inside loop");
    let err = check_err("while (true) {\n  func f() -> void { break }\n}");
    assert!(err.message.contains("'break' outside of a loop"));
}

#[test]
fn for_loop_shares_one_scope() {
    check("for (i: number = 0; i < 3; i = i + 1) { print(i) }").expect("for loop");
    let err = check_err("for (i: number = 0; i < 3; i = i + 1) { }\nprint(i)");
    assert!(err.message.contains("'i' not declared"));
}

#[test]
fn par_children_are_isolated() {
    check("x: number = 1\npar {\n  print(x)\n  print(x + 1)\n}").expect("reads before fork");
    let err = check_err("par {\n  y: number = 1\n  print(y)\n}");
    assert_eq!(err.line, 3);
    assert!(err.message.contains("'y' not declared"));
}

#[test]
fn par_rejects_direct_control_transfer() {
    let err = check_err("while (true) {\n  par {\n    break\n  }\n}");
    assert!(err.message.contains("'break' is not allowed directly inside 'par'"));
    let err = check_err("func f() -> number {\n  par {\n    return 1\n  }\n  return 2\n}");
    assert!(err.message.contains("'return'"));
}

#[test]
fn builtin_signatures() {
    check(
        "parts: [string] = split(\"a,b\", \",\")\nn: number = len(parts) + len(\"abc\")\nok: bool = isnum(\"1\") && isalpha(\"a\")\nv: number = to_number(\"4\")\nt: string = to_string(v)\nb: bool = to_bool(1)\nsleep(1)",
    )
    .expect("builtins");
    assert!(check_err("print()").message.contains("at least one argument"));
    assert!(check_err("x: number = to_number(1)").message.contains("must be STRING"));
    assert!(check_err("x: number = len(1)").message.contains("'len'"));
    assert!(check_err("x: string = input(1)").message.contains("expects 0 arguments"));
    assert!(check_err("func f() -> void { }\nprint(f())").message.contains("VOID"));
}

#[test]
fn client_channel_declares_string_variable() {
    check("c_channel client { \"localhost\", 9000 }\nreply: string = send(client, \"hi\")\nclose(client)")
        .expect("client channel");
    let err = check_err("c_channel c { \"localhost\", 9000 }\nc_channel c { \"localhost\", 9001 }");
    assert!(err.message.contains("channel 'c' already declared"));
    let err = check_err("c_channel c { 1, 9000 }");
    assert!(err.message.contains("host must be STRING"));
}

#[test]
fn server_channel_handler_must_return_string() {
    check("func handle(msg: string) -> string { return msg }\ns_channel srv { handle, \"echo\", \"localhost\", 9000 }")
        .expect("server channel");
    let err = check_err("func handle() -> number { return 1 }\ns_channel srv { handle, \"echo\", \"localhost\", 9000 }");
    assert!(err.message.contains("must return STRING"));
    let err = check_err("s_channel srv { missing, \"echo\", \"localhost\", 9000 }");
    assert!(err.message.contains("'missing' not declared"));
}

#[test]
fn out_of_bounds_index_is_not_a_static_error() {
    check("arr: [number] = [1,2,3]\nprint(arr[5])").expect("runtime concern");
}

#[test]
fn functions_defined_in_a_block_stay_local_to_it() {
    check("if (true) {\n  func inner() -> number { return 1 }\n  print(inner())\n}")
        .expect("call inside defining block");
    let err = check_err("if (true) {\n  func inner() -> number { return 1 }\n}\nprint(inner())");
    assert_eq!(err.line, 4);
    assert!(err.message.contains("function 'inner' not declared"));
}

#[test]
fn function_bodies_resolve_names_where_they_are_defined() {
    let err = check_err("func f() -> number { return local }\nfunc h() -> number {\n  local: number = 1\n  return f()\n}");
    assert_eq!(err.line, 1);
    assert!(err.message.contains("'local' not declared"));
}
