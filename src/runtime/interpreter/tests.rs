use super::*;
use crate::language::{parser::parse_source, typecheck::analyze};
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("utf8 output")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn interpreter(input: &str) -> (Interpreter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let interp = Interpreter::with_io(
        Box::new(buffer.clone()),
        Box::new(Cursor::new(input.as_bytes().to_vec())),
    );
    (interp, buffer)
}

fn execute(source: &str, input: &str, checked: bool) -> (RuntimeResult<()>, String) {
    let program = parse_source(source).expect("parse");
    if checked {
        analyze(&program).expect("analyze");
    }
    let (mut interp, buffer) = interpreter(input);
    let result = interp.run(&program);
    (result, buffer.contents())
}

fn run_ok(source: &str) -> String {
    let (result, output) = execute(source, "", true);
    result.expect("run");
    output
}

fn run_err(source: &str) -> RuntimeError {
    execute(source, "", true).0.expect_err("expected runtime error")
}

#[test]
fn adds_declared_numbers() {
    assert_eq!(run_ok("x: number = 2\ny: number = 3\nprint(x + y)"), "5\n");
}

#[test]
fn concatenates_arrays() {
    assert_eq!(
        run_ok("a: [number] = [1, 2]\nb: [number] = [3]\nprint(a + b)"),
        "[1, 2, 3]\n"
    );
}

#[test]
fn calls_user_function() {
    assert_eq!(
        run_ok("func f(n: number) -> number { return n * 2 }\nprint(f(21))"),
        "42\n"
    );
}

#[test]
fn recursion_unwinds_scopes() {
    let source = "func fact(n: number) -> number {\n  if (n <= 1) { return 1 }\n  return n * fact(n - 1)\n}\nprint(fact(5))\nprint(fact(1))";
    assert_eq!(run_ok(source), "120\n1\n");
}

#[test]
fn omitted_parameters_use_defaults() {
    let source = "func label(text: string, times: number = 2, sep: string = \"-\") -> string {\n  out: string = text\n  for (i: number = 1; i < times; i = i + 1) { out = out + sep + text }\n  return out\n}\nprint(label(\"a\"))\nprint(label(\"b\", 3))\nprint(label(\"c\", 2, \"+\"))";
    assert_eq!(run_ok(source), "a-a\nb-b-b\nc+c\n");
}

#[test]
fn print_joins_arguments_with_spaces() {
    assert_eq!(
        run_ok("print(\"total:\", 3, true, [\"x\", \"y\"])"),
        "total: 3 true [x, y]\n"
    );
}

#[test]
fn formats_numbers() {
    let source = "print(2.50)\nprint(0.1 + 0.2)\nprint(1 / 0)\nprint(0 - 1 / 0)\nprint(0 / 0)\nprint(-0)";
    assert_eq!(
        run_ok(source),
        "2.5\n0.30000000000000004\nInfinity\n-Infinity\nNaN\n0\n"
    );
}

#[test]
fn modulo_is_floating_point_remainder() {
    assert_eq!(run_ok("print(7.5 % 2)\nprint(-7 % 3)"), "1.5\n-1\n");
}

#[test]
fn block_scopes_shadow_and_vanish() {
    let source = "x: number = 1\n{\n  x: number = 2\n  print(x)\n}\nif (true) {\n  x = 3\n}\nprint(x)";
    assert_eq!(run_ok(source), "2\n3\n");
}

#[test]
fn continue_in_for_still_runs_update() {
    let source = "for (i: number = 0; i < 5; i = i + 1) {\n  if (i % 2 == 0) { continue }\n  print(i)\n}";
    assert_eq!(run_ok(source), "1\n3\n");
}

#[test]
fn break_leaves_innermost_loop() {
    let source = "n: number = 0\nwhile (true) {\n  n = n + 1\n  if (n == 3) { break }\n}\nprint(n)";
    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn return_inside_loop_leaves_function() {
    let source = "func first_even(xs: [number]) -> number {\n  for (i: number = 0; i < len(xs); i = i + 1) {\n    if (xs[i] % 2 == 0) { return xs[i] }\n  }\n  return -1\n}\nprint(first_even([3, 5, 8, 10]))";
    assert_eq!(run_ok(source), "8\n");
}

#[test]
fn logical_operators_short_circuit() {
    let source = "a: [number] = []\nprint(len(a) > 0 && a[0] == 1)\nprint(len(a) == 0 || a[0] == 1)";
    assert_eq!(run_ok(source), "false\ntrue\n");
}

#[test]
fn indexing_strings_and_arrays() {
    let source = "s: string = \"héllo\"\nprint(s[1])\nprint(len(s))\na: [number] = [10, 20, 30]\nprint(a[1.9])\na[2] = 99\nprint(a)";
    assert_eq!(run_ok(source), "é\n5\n20\n[10, 20, 99]\n");
}

#[test]
fn out_of_bounds_read_is_a_runtime_error() {
    let err = run_err("arr: [number] = [1,2,3]\nprint(arr[5])");
    assert!(matches!(
        err,
        RuntimeError::IndexOutOfBounds { len: 3, line: 2, .. }
    ));
    assert_eq!(err.to_string(), "line 2: index 5 out of bounds for length 3");
}

#[test]
fn out_of_bounds_write_is_a_runtime_error() {
    let err = run_err("arr: [number] = [1]\narr[-1] = 4");
    assert!(matches!(err, RuntimeError::IndexOutOfBounds { .. }));
}

#[test]
fn arrays_are_shared_handles() {
    let source = "a: [number] = [1, 2]\nb: [number] = a\nb[0] = 7\nprint(a)\nc: [number] = a + []\nc[1] = 0\nprint(a)";
    assert_eq!(run_ok(source), "[7, 2]\n[7, 2]\n");
}

#[test]
fn par_runs_every_unit() {
    let output = run_ok("par {\n  print(\"left\")\n  print(\"right\")\n}\nprint(\"after\")");
    let mut lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.pop(), Some("after"));
    lines.sort_unstable();
    assert_eq!(lines, vec!["left", "right"]);
}

#[test]
fn par_units_work_on_copies() {
    let source = "x: number = 1\npar {\n  x = 2\n  print(x)\n}\nprint(x)";
    assert_eq!(run_ok(source), "1\n1\n");
}

#[test]
fn par_units_share_array_storage() {
    let source = "a: [number] = [1, 2]\npar {\n  a[0] = 9\n  sleep(1)\n}\nprint(a)";
    assert_eq!(run_ok(source), "[9, 2]\n");
}

#[test]
fn par_units_see_functions_defined_before_fork() {
    let source = "func twice(n: number) -> number { return n * 2 }\nbase: number = 5\npar {\n  print(twice(base))\n  seq {\n    sleep(1)\n    print(twice(base) + 1)\n  }\n}";
    let output = run_ok(source);
    let mut lines: Vec<&str> = output.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["10", "11"]);
}

#[test]
fn first_failing_unit_in_source_order_wins() {
    let source = "a: [number] = [1]\npar {\n  n: number = to_number(\"abc\")\n  m: number = a[3]\n}\nprint(\"unreachable\")";
    let (result, output) = execute(source, "", true);
    assert!(matches!(
        result,
        Err(RuntimeError::InvalidNumber { line: 3, .. })
    ));
    assert_eq!(output, "");
}

#[test]
fn seq_opens_a_nested_scope() {
    let source = "x: number = 1\nseq {\n  x: string = \"a\"\n  print(x)\n}\nprint(x + 1)";
    assert_eq!(run_ok(source), "a\n2\n");
    let (result, _) = execute("seq {\n  y: number = 4\n}\nprint(y)", "", false);
    assert!(matches!(
        result,
        Err(RuntimeError::UndeclaredVariable { ref name, line: 4 }) if name == "y"
    ));
}

#[test]
fn callee_reads_globals_not_caller_locals() {
    let source = "g: number = 1\nfunc f() -> number { return g + 1 }\nfunc h() -> number {\n  g: string = \"s\"\n  return f()\n}\nprint(h())";
    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn callee_assignments_reach_globals_through_shadowing_callers() {
    let source = "count: number = 0\nfunc bump() -> void { count = count + 1 }\nfunc run() -> void {\n  count: string = \"local\"\n  bump()\n  print(count)\n}\nrun()\nprint(count)";
    assert_eq!(run_ok(source), "local\n1\n");
}

#[test]
fn nested_functions_see_their_defining_block() {
    let source = "if (true) {\n  base: number = 10\n  func add(n: number) -> number { return base + n }\n  func twice(n: number) -> number {\n    base: string = \"hidden\"\n    return add(n) + add(n)\n  }\n  print(twice(1))\n}";
    assert_eq!(run_ok(source), "22\n");
}

#[test]
fn recursion_keeps_frames_apart() {
    let source = "func depth(n: number) -> number {\n  local: number = n\n  if (n == 0) { return 0 }\n  inner: number = depth(n - 1)\n  return local + inner\n}\nprint(depth(4))";
    assert_eq!(run_ok(source), "10\n");
}

#[test]
fn redefinition_overwrites_at_runtime() {
    let source = "func f() -> number { return 1 }\nfunc f() -> number { return 2 }\nprint(f())";
    let (result, output) = execute(source, "", false);
    result.expect("run");
    assert_eq!(output, "2\n");
}

#[test]
fn undeclared_names_fail_at_runtime() {
    let (result, _) = execute("y = 3", "", false);
    assert!(matches!(
        result,
        Err(RuntimeError::UndeclaredVariable { ref name, line: 1 }) if name == "y"
    ));
    let (result, _) = execute("missing()", "", false);
    assert!(matches!(result, Err(RuntimeError::UndefinedFunction { .. })));
}

#[test]
fn conversion_builtins() {
    let source = "print(to_number(\" 12.5 \") + 1)\nprint(to_string(3) + \"!\")\nprint(to_bool(\"true\"), to_bool(0), to_bool(false))\nprint(isnum(\"4\"), isnum(\"x4\"), isalpha(\"abc\"), isalpha(\"ab1\"))\nprint(isnum(\"nan\"), isnum(\"inf\"), isnum(\"Infinity\"))";
    assert_eq!(
        run_ok(source),
        "13.5\n3!\ntrue false false\ntrue false true false\nfalse false true\n"
    );
    let err = run_err("n: number = to_number(\"ten\")");
    assert_eq!(err.to_string(), "line 1: cannot convert 'ten' to a number");
    assert!(matches!(
        run_err("b: bool = to_bool(\"yes\")"),
        RuntimeError::TypeMismatch { .. }
    ));
}

#[test]
fn split_builtin() {
    let source = "parts: [string] = split(\"a,b,,c,,\", \",\")\nprint(parts)\nprint(len(parts))\nprint(split(\"a1b22c\", \"[0-9]+\"))";
    assert_eq!(run_ok(source), "[a, b, , c]\n4\n[a, b, c]\n");
}

#[test]
fn invalid_split_pattern_is_a_runtime_error() {
    let err = run_err("print(\"ok\")\nparts: [string] = split(\"a(b\", \"(\")");
    assert!(matches!(err, RuntimeError::InvalidPattern { line: 2, ref pattern, .. } if pattern == "("));
}

#[test]
fn input_reads_lines_until_eof() {
    let source = "name: string = input()\nprint(\"hello \" + name)\nlast: string = input()";
    let (result, output) = execute(source, "ada\r\n", true);
    assert_eq!(output, "hello ada\n");
    assert!(matches!(result, Err(RuntimeError::Io { line: 3, .. })));
}

#[test]
fn channel_errors() {
    let (result, _) = execute("close(\"nowhere\")\nprint(\"ok\")", "", true);
    result.expect("closing an unknown channel is ignored");
    let err = run_err("r: string = send(\"nowhere\", \"ping\")");
    assert!(matches!(err, RuntimeError::UndefinedChannel { .. }));
}

fn spawn_upper_echo() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let port = listener.local_addr().expect("addr").port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { return };
            thread::spawn(move || {
                let mut writer = stream.try_clone().expect("clone");
                let reader = BufReader::new(stream);
                for line in reader.lines() {
                    let Ok(line) = line else { return };
                    if writeln!(writer, "{}", line.to_uppercase()).is_err() {
                        return;
                    }
                }
            });
        }
    });
    port
}

#[test]
fn client_channel_sends_and_receives_lines() {
    let port = spawn_upper_echo();
    let source = format!(
        "c_channel client {{ \"127.0.0.1\", {port} }}\nprint(send(client, \"ping\"))\npar {{\n  print(send(client, \"from unit\"))\n  sleep(1)\n}}\nclose(client)\nprint(\"closed\")"
    );
    assert_eq!(run_ok(&source), "PING\nFROM UNIT\nclosed\n");
}

#[test]
fn send_after_close_fails() {
    let port = spawn_upper_echo();
    let source = format!(
        "c_channel client {{ \"127.0.0.1\", {port} }}\nclose(client)\nr: string = send(client, \"late\")"
    );
    assert!(matches!(
        run_err(&source),
        RuntimeError::UndefinedChannel { line: 3, .. }
    ));
}

#[test]
fn server_channel_logs_connections() {
    let source = "func handle(msg: string) -> string { return msg }\ns_channel srv { handle, \"echo\", \"127.0.0.1\", 0 }";
    let program = parse_source(source).expect("parse");
    analyze(&program).expect("analyze");
    let (mut interp, buffer) = interpreter("");
    interp.run(&program).expect("run");

    let banner = buffer.contents();
    let prefix = "server 'srv' listening on 127.0.0.1:";
    assert!(banner.starts_with(prefix), "unexpected banner {banner:?}");
    let port: u16 = banner[prefix.len()..].trim().parse().expect("port");

    let _client = std::net::TcpStream::connect(("127.0.0.1", port)).expect("connect");
    let deadline = Instant::now() + Duration::from_secs(5);
    while !buffer.contents().contains("connection accepted from 127.0.0.1:") {
        assert!(Instant::now() < deadline, "accept was never logged");
        thread::sleep(Duration::from_millis(10));
    }
}
