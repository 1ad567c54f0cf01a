//! Static resolution pass for the Lox interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of `HashMap<String, bool>`
//!    tracking declared (false) and fully defined (true) names in each nested
//!    block, function or class scope. The global scope is implicit and never
//!    appears on the stack.
//! 2. **Enforce static rules**: reports errors such as redeclaration in the
//!    same scope, reading a variable in its own initializer, invalid `return`
//!    outside functions, and illegal use of `this`/`super` outside classes.
//! 3. **Record binding distances**: for every `Variable`, `Assign`, `This`
//!    and `Super` expression, notes in the interpreter how many environment
//!    frames separate the reference from its binding. Unrecorded nodes are
//!    looked up as globals at runtime.
//!
//! Resolution halts on the first static error, returning a
//! `LoxError::Resolve`.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::token::Token;

/// What kind of function body we are currently inside. Used to validate
/// `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top-level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(statements) => {
                // 1. Push a new anonymous scope for `{ … }`
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s)?;
                }

                // 2. Pop the block scope
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // 1. Declare the variable name (marked but not yet defined)
                self.declare(name)?;

                // 2. Resolve the initializer expression, if any
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }

                // 3. Define the variable so it's available in this scope
                self.define(name);
            }

            Stmt::Function(decl) => {
                // 1. Declare & define the function name up front so the body
                //    can recurse into it.
                self.declare(&decl.name)?;
                self.define(&decl.name);

                // 2. Resolve parameters and body under a function context.
                self.resolve_function(FunctionType::Function, decl)?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)?;
            }

            Stmt::Return { keyword, value } => {
                // 1. Ensure we're inside a function or method at all.
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Can't return from top-level code.",
                    ));
                }

                // 2. In an initializer, only a bare `return;` is allowed.
                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(LoxError::resolve(
                            keyword.line,
                            "Can't return a value from an initializer.",
                        ));
                    }

                    self.resolve_expr(expr)?;
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                // 1. Declare & define the class name so methods (including
                //    init) can refer to it.
                self.declare(name)?;
                self.define(name);

                // 2. Save and enter the class context.
                let enclosing_class: ClassType = self.current_class;
                self.current_class = ClassType::Class;

                // 3. If there is a superclass, resolve it and bind `super`.
                if let Some(super_expr) = superclass {
                    if let Expr::Variable {
                        name: super_name, ..
                    } = super_expr
                    {
                        if super_name.lexeme == name.lexeme {
                            return Err(LoxError::resolve(
                                super_name.line,
                                "A class can't inherit from itself.",
                            ));
                        }
                    }

                    self.current_class = ClassType::Subclass;

                    self.resolve_expr(super_expr)?;

                    // The `super` scope sits *outside* the `this` scope; the
                    // evaluator relies on that one-hop offset.
                    self.begin_scope();
                    self.define_literal("super");
                }

                // 4. Open the implicit `this` scope for methods.
                self.begin_scope();
                self.define_literal("this");

                // 5. Resolve each method in its own function context.
                for method in methods {
                    let kind: FunctionType = if method.name.lexeme == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };

                    self.resolve_function(kind, method)?;
                }

                // 6. Close the `this` scope, then the `super` scope if open.
                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                // 7. Restore the outer class context.
                self.current_class = enclosing_class;
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {
                // Literals have no sub-expressions.
            }

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Variable { name, .. } => {
                // 1. Prevent reading a variable in its own initializer.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        return Err(LoxError::resolve(
                            name.line,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }

                // 2. Bind this occurrence at its lexical depth.
                self.resolve_local(expr, name);
            }

            Expr::Assign { name, value, .. } => {
                // Resolve the right-hand side first, then bind the target.
                self.resolve_expr(value)?;
                self.resolve_local(expr, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;

                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Get { object, .. } => {
                self.resolve_expr(object)?;
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)?;
            }

            Expr::This { keyword, .. } => {
                // `this` is only valid inside class methods.
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Can't use 'this' outside of a class.",
                    ));
                }

                self.resolve_local(expr, keyword);
            }

            Expr::Super { keyword, .. } => {
                // 1. Disallow outside any class.
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Can't use 'super' outside of a class.",
                    ));
                }

                // 2. Disallow in a class with no superclass.
                if self.current_class != ClassType::Subclass {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Can't use 'super' in a class with no superclass.",
                    ));
                }

                // 3. Valid. Bind 'super' like a local variable.
                self.resolve_local(expr, keyword);
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `kind` distinguishes plain functions, methods and initializers.
    fn resolve_function(&mut self, kind: FunctionType, decl: &FunctionDecl) -> Result<()> {
        // 1. Save the enclosing function context so we can restore it later.
        let enclosing: FunctionType = self.current_function;
        self.current_function = kind;

        // 2. Begin a new lexical scope for the parameters & body.
        self.begin_scope();

        // 3. Declare and immediately define each parameter in this scope.
        for param in &decl.params {
            self.declare(param)?;
            self.define(param);
        }

        // 4. Resolve each statement in the function body.
        for stmt in &decl.body {
            self.resolve_stmt(stmt)?;
        }

        // 5. Pop the scope and restore the previous function context.
        self.end_scope();
        self.current_function = enclosing;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) -> Result<()> {
        // In a local scope, duplicate declarations are an error; the global
        // scope is not on the stack and allows redefinition.
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                return Err(LoxError::resolve(
                    name.line,
                    "Already a variable with this name in this scope.",
                ));
            }

            scope.insert(name.lexeme.clone(), false);
        }

        Ok(())
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // `this` / `super` are injected directly as defined: they have no
    // declaration token of their own.
    fn define_literal(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as either a local at some depth, or a global
    /// when no enclosing scope declares the name.
    fn resolve_local(&mut self, expr: &Expr, name: &Token) {
        let id: ExprId = match expr {
            Expr::Variable { id, .. }
            | Expr::Assign { id, .. }
            | Expr::This { id, .. }
            | Expr::Super { id, .. } => *id,

            // Only the four variable-shaped expressions carry identities.
            _ => return,
        };

        // 1. Search each scope from innermost outward.
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                self.interpreter.note_local(id, depth);

                return;
            }
        }

        // 2. Not found in any scope → it's a global.
        debug!("Resolved '{}' as global", name.lexeme);
    }
}
