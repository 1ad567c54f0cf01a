use loxwalk as lox;

use lox::ast::Stmt;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

fn resolve(source: &str) -> Result<(), String> {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes()).collect();

    let statements: Vec<Stmt> = Parser::new(tokens)
        .parse()
        .map_err(|errors| errors[0].to_string())?;

    let mut interpreter: Interpreter = Interpreter::new();

    Resolver::new(&mut interpreter)
        .resolve(&statements)
        .map_err(|e| e.to_string())
}

fn resolve_err(source: &str) -> String {
    resolve(source).expect_err("resolution should fail")
}

#[test]
fn test_return_at_top_level() {
    assert!(resolve_err("return 1;").contains("Can't return from top-level code."));
    assert!(resolve_err("return;").contains("Can't return from top-level code."));
}

#[test]
fn test_return_inside_function_is_fine() {
    assert!(resolve("fun f() { return 1; }").is_ok());
    assert!(resolve("class C { m() { return 1; } }").is_ok());
}

#[test]
fn test_return_value_from_initializer() {
    assert!(resolve_err("class C { init() { return 1; } }")
        .contains("Can't return a value from an initializer."));

    // A bare return in an initializer is allowed.
    assert!(resolve("class C { init() { return; } }").is_ok());
}

#[test]
fn test_duplicate_local_declaration() {
    assert!(resolve_err("{ var a = 1; var a = 2; }")
        .contains("Already a variable with this name in this scope."));

    assert!(resolve_err("fun f(a, a) {}")
        .contains("Already a variable with this name in this scope."));

    // Distinct scopes may shadow, and globals may be redefined.
    assert!(resolve("var a = 1; var a = 2; { var a = 3; { var a = 4; } }").is_ok());
}

#[test]
fn test_read_local_in_its_own_initializer() {
    assert!(resolve_err("var a = 1; { var a = a; }")
        .contains("Can't read local variable in its own initializer."));
}

#[test]
fn test_this_outside_class() {
    assert!(resolve_err("print this;").contains("Can't use 'this' outside of a class."));
    assert!(resolve_err("fun f() { return this; }")
        .contains("Can't use 'this' outside of a class."));
}

#[test]
fn test_super_outside_class() {
    assert!(resolve_err("print super.m;").contains("Can't use 'super' outside of a class."));
}

#[test]
fn test_super_without_superclass() {
    assert!(resolve_err("class C { m() { return super.m; } }")
        .contains("Can't use 'super' in a class with no superclass."));
}

#[test]
fn test_self_inheritance() {
    assert!(resolve_err("class C < C {}").contains("A class can't inherit from itself."));
}

#[test]
fn test_functions_may_recurse() {
    assert!(resolve("fun f(n) { if (n > 0) f(n - 1); }").is_ok());

    // Local functions can refer to themselves too.
    assert!(resolve("{ fun f(n) { if (n > 0) f(n - 1); } f(3); }").is_ok());
}

#[test]
fn test_nested_class_contexts() {
    // A function nested in a method is still a function: `this` resolves in
    // the method, while a plain top-level function after the class does not
    // regain class context.
    assert!(resolve("class C { m() { return this; } } fun f() { return 1; }").is_ok());

    assert!(resolve_err("class C { m() { fun inner() { return 1; } return inner; } } return 1;")
        .contains("Can't return from top-level code."));
}
