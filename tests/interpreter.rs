use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use loxwalk as lox;

use lox::ast::Stmt;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

/// A `Write` sink the test can read back after the interpreter is done with
/// its half.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run the full pipeline; returns the interpreter outcome together with
/// whatever was printed before any failure.
fn exec(source: &str) -> (Result<(), String>, String) {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes()).collect();

    let statements: Vec<Stmt> = match Parser::new(tokens).parse() {
        Ok(statements) => statements,

        Err(errors) => return (Err(errors[0].to_string()), String::new()),
    };

    let sink: SharedBuf = SharedBuf::default();
    let mut interpreter: Interpreter = Interpreter::with_output(Box::new(sink.clone()));

    if let Err(e) = Resolver::new(&mut interpreter).resolve(&statements) {
        return (Err(e.to_string()), String::new());
    }

    let result: Result<(), String> = interpreter
        .interpret(&statements)
        .map_err(|e| e.to_string());

    let output: String =
        String::from_utf8(sink.0.borrow().clone()).expect("interpreter output is UTF-8");

    (result, output)
}

fn run_ok(source: &str) -> String {
    let (result, output) = exec(source);

    result.unwrap_or_else(|e| panic!("program failed: {}\noutput so far: {}", e, output));

    output
}

fn run_err(source: &str) -> String {
    let (result, _) = exec(source);

    result.expect_err("program should fail")
}

// ─────────────────────────────────────────────────────────────────────────────
// Printing & operators
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_print_formatting() {
    let cases: &[(&str, &str)] = &[
        ("var a; print a;", "<nil>\n"),
        ("print true; print false;", "true\nfalse\n"),
        ("print 1; print 2.5; print -0.5;", "1\n2.5\n-0.5\n"),
        // Strings keep their original quotes.
        ("print \"hello\";", "\"hello\"\n"),
        ("fun f() {} print f;", "<fn f>\n"),
        ("class C {} print C; print C();", "<class C>\n<instance C>\n"),
        ("print clock;", "<native fn clock>\n"),
    ];

    for (source, want) in cases {
        assert_eq!(&run_ok(source), want, "source: {}", source);
    }
}

#[test]
fn test_arithmetic_and_comparison() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
    assert_eq!(run_ok("print (1 + 2) / 2;"), "1.5\n");
    assert_eq!(run_ok("print -(1 + 2);"), "-3\n");
    assert_eq!(run_ok("print 1 < 2; print 2 <= 2; print 3 > 4; print 4 >= 5;"), "true\ntrue\nfalse\nfalse\n");
}

#[test]
fn test_equality() {
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(run_ok("print nil == false;"), "false\n");
    assert_eq!(run_ok("print 1 == 1; print 1 == 2;"), "true\nfalse\n");
    assert_eq!(run_ok("print \"a\" == \"a\"; print \"a\" == \"b\";"), "true\nfalse\n");
    assert_eq!(run_ok("print 1 != \"1\";"), "true\n");
    // Instances compare by identity.
    assert_eq!(
        run_ok("class C {} var a = C(); var b = C(); print a == a; print a == b;"),
        "true\nfalse\n"
    );
}

#[test]
fn test_truthiness() {
    // Only nil and false are falsy; 0 and "" are truthy.
    assert_eq!(run_ok("if (0) print 1; else print 2;"), "1\n");
    assert_eq!(run_ok("if (\"\") print 1; else print 2;"), "1\n");
    assert_eq!(run_ok("if (nil) print 1; else print 2;"), "2\n");
    assert_eq!(run_ok("if (false) print 1; else print 2;"), "2\n");
    assert_eq!(run_ok("print !0; print !nil; print !true;"), "false\ntrue\nfalse\n");
}

#[test]
fn test_logical_operators_return_operand() {
    assert_eq!(run_ok("print \"a\" or 2;"), "\"a\"\n");
    assert_eq!(run_ok("print nil or \"b\";"), "\"b\"\n");
    assert_eq!(run_ok("print nil and 2;"), "<nil>\n");
    assert_eq!(run_ok("print 1 and 2;"), "2\n");
    assert_eq!(run_ok("print false or nil;"), "<nil>\n");
}

#[test]
fn test_logical_operators_short_circuit() {
    // The right-hand side must not run when the left decides.
    assert_eq!(
        run_ok("fun boom() { print \"boom\"; return true; } print true or boom();"),
        "true\n"
    );
    assert_eq!(
        run_ok("fun boom() { print \"boom\"; return true; } print false and boom();"),
        "false\n"
    );
}

#[test]
fn test_assignment_is_an_expression() {
    assert_eq!(run_ok("var a = 1; print a = 123;"), "123\n");
    assert_eq!(run_ok("var a; var b; a = b = 2; print a; print b;"), "2\n2\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scoping, control flow, functions
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_block_scoping_and_shadowing() {
    assert_eq!(
        run_ok("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn test_global_redefinition_is_legal() {
    assert_eq!(run_ok("var a = 1; var a = 2; print a;"), "2\n");
}

#[test]
fn test_while_and_for_loops() {
    assert_eq!(
        run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );
    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn test_closures_keep_state() {
    assert_eq!(
        run_ok(
            "fun makeCounter() { var i = 0; fun c() { i = i + 1; return i; } return c; } \
             var c = makeCounter(); print c(); print c(); print c();"
        ),
        "1\n2\n3\n"
    );
}

#[test]
fn test_closures_capture_declaring_scope() {
    // The resolver binds early: the later shadowing `a` must not be seen.
    assert_eq!(
        run_ok(
            "var a = \"global\"; \
             { \
               fun showA() { print a; } \
               showA(); \
               var a = \"block\"; \
               showA(); \
             }"
        ),
        "\"global\"\n\"global\"\n"
    );
}

#[test]
fn test_fibonacci_recursion() {
    assert_eq!(
        run_ok("fun f(n) { if (n <= 1) return n; return f(n - 1) + f(n - 2); } print f(10);"),
        "55\n"
    );
}

#[test]
fn test_early_return_from_loop() {
    assert_eq!(
        run_ok(
            "fun cd(n) { while (true) { print n; if (n == 0) return; n = n - 1; } } cd(3);"
        ),
        "3\n2\n1\n0\n"
    );
}

#[test]
fn test_function_returns_nil_without_return() {
    assert_eq!(run_ok("fun f() {} print f();"), "<nil>\n");
    assert_eq!(run_ok("fun f() { return; } print f();"), "<nil>\n");
}

#[test]
fn test_environment_restored_after_return_unwind() {
    // The block environments pushed inside `f` must be popped on unwind:
    // afterwards `a` still refers to the global.
    assert_eq!(
        run_ok(
            "var a = 1; \
             fun f() { var a = 2; { var a = 3; return; } } \
             f(); print a;"
        ),
        "1\n"
    );
}

#[test]
fn test_clock_is_a_number() {
    assert_eq!(run_ok("print clock() >= 0;"), "true\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes, instances, inheritance
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_fields_and_methods() {
    assert_eq!(
        run_ok("class C { m() { print \"m\"; } } var c = C(); c.m();"),
        "\"m\"\n"
    );
    assert_eq!(
        run_ok("class C {} var c = C(); c.x = 41; c.x = c.x + 1; print c.x;"),
        "42\n"
    );
}

#[test]
fn test_fields_shadow_methods() {
    assert_eq!(
        run_ok("class C { m() { return 1; } } var c = C(); c.m = 2; print c.m;"),
        "2\n"
    );
}

#[test]
fn test_method_binding_preserves_receiver() {
    assert_eq!(
        run_ok("class F { m() { print \"m\"; } } var f = F(); var g = f.m; g();"),
        "\"m\"\n"
    );
    assert_eq!(
        run_ok(
            "class F { init() { this.x = 7; } m() { print this.x; } } \
             var g = F().m; g();"
        ),
        "7\n"
    );
}

#[test]
fn test_this_in_methods() {
    assert_eq!(
        run_ok(
            "class C { set(v) { this.v = v; } get() { return this.v; } } \
             var c = C(); c.set(5); print c.get();"
        ),
        "5\n"
    );
}

#[test]
fn test_constructor_returns_instance() {
    assert_eq!(run_ok("class C { init(x) { this.x = x; } } print C(7).x;"), "7\n");
    // Early bare return still yields `this`.
    assert_eq!(
        run_ok("class C { init() { this.x = 1; return; } } print C().x;"),
        "1\n"
    );
    // Calling init again through an instance also returns `this`.
    assert_eq!(
        run_ok("class C { init() { this.x = 1; } } var c = C(); print c.init() == c;"),
        "true\n"
    );
}

#[test]
fn test_inherited_methods() {
    assert_eq!(
        run_ok("class A { say() { print \"a\"; } } class B < A {} B().say();"),
        "\"a\"\n"
    );
    // Inherited init constructs through the chain.
    assert_eq!(
        run_ok(
            "class A { init(x) { this.x = x; } } class B < A {} print B(9).x;"
        ),
        "9\n"
    );
}

#[test]
fn test_super_dispatch() {
    assert_eq!(
        run_ok(
            "class A { say() { print \"a\"; } } \
             class B < A { say() { super.say(); print \"b\"; } } \
             B().say();"
        ),
        "\"a\"\n\"b\"\n"
    );
}

#[test]
fn test_super_skips_own_override() {
    // super in a grandparent chain: B.say is picked even when C overrides.
    assert_eq!(
        run_ok(
            "class A { say() { print \"a\"; } } \
             class B < A { say() { print \"b\"; } } \
             class C < B { say() { super.say(); } } \
             C().say();"
        ),
        "\"b\"\n"
    );
}

#[test]
fn test_methods_can_reference_their_class() {
    // The class name is visible inside its own methods (forward declaration).
    assert_eq!(
        run_ok("class C { make() { return C(); } } print C().make();"),
        "<instance C>\n"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_arithmetic_type_mismatch() {
    assert!(run_err("var a = 1 + \"x\";").contains("Operands must be numbers."));
    assert!(run_err("print \"a\" + \"b\";").contains("Operands must be numbers."));
    assert!(run_err("print -\"x\";").contains("Operand must be a number."));
    assert!(run_err("print 1 < \"x\";").contains("Operands must be numbers."));
}

#[test]
fn test_undefined_variable() {
    assert!(run_err("print nope;").contains("Undefined variable 'nope'."));
    // Assignment never creates a new global.
    assert!(run_err("nope = 1;").contains("Undefined variable 'nope'."));
}

#[test]
fn test_not_callable() {
    assert!(run_err("\"str\"();").contains("Can only call functions and classes."));
    assert!(run_err("var x = 1; x();").contains("Can only call functions and classes."));
}

#[test]
fn test_arity_mismatch() {
    assert!(run_err("fun f(a) {} f();").contains("Expected 1 arguments but got 0."));
    assert!(run_err("fun f() {} f(1);").contains("Expected 0 arguments but got 1."));
    assert!(run_err("clock(1);").contains("Expected 0 arguments but got 1."));
    assert!(
        run_err("class C { init(x) {} } C();").contains("Expected 1 arguments but got 0.")
    );
}

#[test]
fn test_property_access_on_non_instance() {
    assert!(run_err("var x = 1; print x.y;").contains("Only instances have properties."));
    assert!(run_err("var x = 1; x.y = 2;").contains("Only instances have fields."));
}

#[test]
fn test_undefined_property() {
    assert!(run_err("class C {} print C().missing;").contains("Undefined property 'missing'."));
    assert!(run_err(
        "class A {} class B < A { m() { return super.missing(); } } B().m();"
    )
    .contains("Undefined property 'missing'."));
}

#[test]
fn test_superclass_must_be_a_class() {
    assert!(run_err("var NotAClass = 1; class C < NotAClass {}")
        .contains("Superclass must be a class."));
}

#[test]
fn test_error_stops_execution() {
    let (result, output) = exec("print 1; var a = 1 + \"x\"; print 2;");

    assert!(result.expect_err("should fail").contains("Operands must be numbers."));
    // Output up to the failure point is kept; nothing after it runs.
    assert_eq!(output, "1\n");
}

#[test]
fn test_runtime_errors_carry_line_numbers() {
    assert!(run_err("print 1;\nprint -\"x\";").contains("[line 2]"));
}
