use loxwalk as lox;

use lox::ast::Stmt;
use lox::ast_printer::Ast;
use lox::error::LoxError;
use lox::parser::Parser;
use lox::scanner::Scanner;
use lox::token::Token;

fn parse(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes()).collect();

    Parser::new(tokens).parse()
}

fn parse_one(source: &str) -> String {
    let statements: Vec<Stmt> = parse(source).expect("source should parse");

    assert_eq!(statements.len(), 1, "expected a single statement");

    Ast.print_stmt(&statements[0])
}

#[test]
fn test_parser_precedence() {
    assert_eq!(parse_one("1 + 2 * 3;"), "(+ 1.0 (* 2.0 3.0))");
    assert_eq!(parse_one("(1 + 2) * 3;"), "(* (group (+ 1.0 2.0)) 3.0)");
    assert_eq!(parse_one("!true == false;"), "(== (! true) false)");
    assert_eq!(parse_one("1 < 2 or 3 < 4 and 5 < 6;"), "(or (< 1.0 2.0) (and (< 3.0 4.0) (< 5.0 6.0)))");
}

#[test]
fn test_parser_assignment_chains_right() {
    assert_eq!(parse_one("a = b = 1;"), "(= a (= b 1.0))");
}

#[test]
fn test_parser_property_access_and_calls() {
    assert_eq!(parse_one("f(1)(2);"), "(call (call f 1.0) 2.0)");
    assert_eq!(parse_one("a.b.c;"), "(. (. a b) c)");
    assert_eq!(parse_one("a.b = 1;"), "(= (. a b) 1.0)");
}

#[test]
fn test_parser_for_desugars_to_while() {
    assert_eq!(
        parse_one("for (var i = 0; i < 3; i = i + 1) print i;"),
        "(block (var i 0.0) (while (< i 3.0) (block (print i) (= i (+ i 1.0)))))"
    );

    // Omitted condition reads as `true`.
    assert_eq!(parse_one("for (;;) print 1;"), "(while true (print 1.0))");
}

#[test]
fn test_parser_class_declaration() {
    assert_eq!(
        parse_one("class B < A { m() { return super.m; } }"),
        "(class B < A (fun m () (return (super m))))"
    );

    assert_eq!(parse_one("class C {}"), "(class C)");
}

#[test]
fn test_parser_function_declaration() {
    assert_eq!(
        parse_one("fun add(a, b) { return a + b; }"),
        "(fun add (a b) (return (+ a b)))"
    );
}

#[test]
fn test_parser_comments_are_skipped() {
    let statements: Vec<Stmt> = parse("print 1; // trailing\nprint 2;").expect("should parse");

    assert_eq!(statements.len(), 2);
}

#[test]
fn test_parser_missing_semicolon() {
    let errors: Vec<LoxError> = parse("print 1").expect_err("should fail");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Expect ';'"));
}

#[test]
fn test_parser_invalid_assignment_target() {
    let errors: Vec<LoxError> = parse("1 = 2;").expect_err("should fail");

    assert!(errors[0].to_string().contains("Invalid assignment target."));
}

#[test]
fn test_parser_resynchronizes_and_reports_multiple_errors() {
    let errors: Vec<LoxError> = parse("var; print 1 +; var x = 3;").expect_err("should fail");

    assert_eq!(errors.len(), 2, "got: {:?}", errors);
    assert!(errors[0].to_string().contains("Expect variable name."));
    assert!(errors[1].to_string().contains("Expect expression."));
}

#[test]
fn test_parser_reports_unterminated_string() {
    let errors: Vec<LoxError> = parse("print \"abc").expect_err("should fail");

    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("Unterminated string.")));
}

#[test]
fn test_parser_reports_unexpected_character() {
    let errors: Vec<LoxError> = parse("print 1 $ 2;").expect_err("should fail");

    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("Unexpected character.")));
}

#[test]
fn test_parser_too_many_arguments() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source: String = format!("f({});", args.join(", "));

    let errors: Vec<LoxError> = parse(&source).expect_err("should fail");

    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("Can't have more than 255 arguments.")));
}

#[test]
fn test_parser_too_many_parameters() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source: String = format!("fun f({}) {{}}", params.join(", "));

    let errors: Vec<LoxError> = parse(&source).expect_err("should fail");

    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("Can't have more than 255 parameters.")));
}
