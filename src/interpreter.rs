//! Tree-walking evaluator.
//!
//! Executes the resolved AST against a chain of lexical environments. The
//! resolver has already annotated every variable-shaped expression with a hop
//! distance (`locals`); anything unannotated is looked up in the fixed global
//! frame. Output goes through an injected `Write` sink so embedders and tests
//! can capture it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::callable::{clock_native, LoxClass, LoxFunction, LoxInstance};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Non-local exits of the evaluator.
///
/// `Return` is control flow, not an error: it is raised by a `return`
/// statement and caught exactly at the enclosing call frame
/// (`LoxFunction::call`). Errors terminate the whole `interpret` invocation.
#[derive(Debug)]
pub enum Unwind {
    Return(Value),
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(e: LoxError) -> Self {
        Unwind::Error(e)
    }
}

type Exec<T> = std::result::Result<T, Unwind>;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Build an interpreter writing `print` output to the given sink.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        let globals: Rc<RefCell<Environment>> = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            },
        );

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    /// Record a hop distance for an expression node. Called by the resolver;
    /// nodes without an entry are globals.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(Unwind::Error(e)) => return Err(e),

                // The resolver rejects top-level `return`, so an unwind can
                // only leak here if interpret() was fed unresolved code.
                Err(Unwind::Return(_)) => {
                    return Err(LoxError::runtime(0, "Can't return from top-level code."));
                }
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Exec<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.out, "{}", value).map_err(LoxError::Io)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,

                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let env: Environment =
                    Environment::with_enclosing(Rc::clone(&self.environment));

                self.execute_block(statements, Rc::new(RefCell::new(env)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function(decl) => {
                let function: LoxFunction =
                    LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,

                    None => Value::Nil,
                };

                Err(Unwind::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Execute `statements` with `env` as the current environment, restoring
    /// the previous one on every exit path: normal completion, runtime error,
    /// and `Return` unwinding alike.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Exec<()> {
        let previous: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

        self.environment = env;

        let mut result: Exec<()> = Ok(());

        for stmt in statements {
            result = self.execute(stmt);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Exec<()> {
        // 1. Evaluate the superclass expression first; it must name a class.
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => {
                let line: usize = match expr {
                    Expr::Variable { name, .. } => name.line,

                    _ => name.line,
                };

                match self.evaluate(expr)? {
                    Value::Class(class) => Some(class),

                    _ => {
                        return Err(
                            LoxError::runtime(line, "Superclass must be a class.").into()
                        );
                    }
                }
            }

            None => None,
        };

        // 2. Forward-declare the class name so methods can refer to it.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // 3. With a superclass, extend the environment with a `super`
        //    binding; the methods capture this extended frame as closure.
        let enclosing: Option<Rc<RefCell<Environment>>> = match &superclass_value {
            Some(class) => {
                let previous: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

                let mut env: Environment =
                    Environment::with_enclosing(Rc::clone(&self.environment));

                env.define("super", Value::Class(Rc::clone(class)));

                self.environment = Rc::new(RefCell::new(env));

                Some(previous)
            }

            None => None,
        };

        // 4. Turn each declaration into a method closing over the current
        //    environment. `init` is the initializer.
        let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for decl in methods {
            let is_initializer: bool = decl.name.lexeme == "init";

            let function: LoxFunction =
                LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), is_initializer);

            method_map.insert(decl.name.lexeme.clone(), Rc::new(function));
        }

        // 5. Build the class value.
        let class: LoxClass = LoxClass::new(name.lexeme.clone(), method_map, superclass_value);

        // 6. Drop back to the frame holding the forward declaration.
        if let Some(previous) = enclosing {
            self.environment = previous;
        }

        // 7. Replace the forward declaration with the finished class.
        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(Rc::new(class)), name.line)?;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Literal(token) => Ok(self.evaluate_literal(token)?),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { op, right } => self.evaluate_unary(op, right),

            Expr::Binary { left, op, right } => self.evaluate_binary(left, op, right),

            Expr::Logical { left, op, right } => self.evaluate_logical(left, op, right),

            Expr::Variable { id, name } => Ok(self.look_up_variable(*id, name)?),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(distance) => Environment::assign_at(
                        &self.environment,
                        *distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,

                    None => self.globals.borrow_mut().assign(
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                }

                // Assignment is an expression; its value is the assigned one.
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());

                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                Ok(self.call_value(callee_val, args, paren)?)
            }

            Expr::Get { object, name } => {
                let object: Value = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),

                    _ => Err(LoxError::runtime(
                        name.line,
                        "Only instances have properties.",
                    )
                    .into()),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object: Value = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value: Value = self.evaluate(value)?;

                        instance.borrow_mut().set(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    _ => {
                        Err(LoxError::runtime(name.line, "Only instances have fields.").into())
                    }
                }
            }

            Expr::This { id, keyword } => Ok(self.look_up_variable(*id, keyword)?),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_literal(&self, token: &Token) -> Result<Value> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),

            TokenType::STRING(s) => Ok(Value::String(s.clone())),

            TokenType::TRUE => Ok(Value::Bool(true)),

            TokenType::FALSE => Ok(Value::Bool(false)),

            TokenType::NIL => Ok(Value::Nil),

            _ => Err(LoxError::runtime(token.line, "Invalid literal.")),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, right: &Expr) -> Exec<Value> {
        let value: Value = self.evaluate(right)?;

        match op.token_type {
            TokenType::DASH => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(op.line, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime(op.line, "Invalid unary operator.").into()),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Exec<Value> {
        // Strict left-to-right evaluation.
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        match op.token_type {
            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                _ => Err(LoxError::runtime(op.line, "Operands must be numbers.").into()),
            },

            TokenType::DASH => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(LoxError::runtime(op.line, "Operands must be numbers.").into()),
            },

            TokenType::STAR => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(LoxError::runtime(op.line, "Operands must be numbers.").into()),
            },

            TokenType::SLASH => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),

                _ => Err(LoxError::runtime(op.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(LoxError::runtime(op.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(LoxError::runtime(op.line, "Operands must be numbers.").into()),
            },

            TokenType::LESS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(LoxError::runtime(op.line, "Operands must be numbers.").into()),
            },

            TokenType::LESS_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(LoxError::runtime(op.line, "Operands must be numbers.").into()),
            },

            _ => Err(LoxError::runtime(op.line, "Invalid binary operator.").into()),
        }
    }

    /// `and` / `or` return the determining operand unchanged, never a
    /// normalized boolean.
    fn evaluate_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> Exec<Value> {
        let left_val: Value = self.evaluate(left)?;

        match op.token_type {
            TokenType::OR => {
                if is_truthy(&left_val) {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            TokenType::AND => {
                if !is_truthy(&left_val) {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            _ => Err(LoxError::runtime(op.line, "Invalid logical operator.").into()),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Exec<Value> {
        // The resolver bound `super` at distance d and, one scope further
        // in, `this` at d - 1.
        let distance: usize = match self.locals.get(&id) {
            Some(distance) => *distance,

            None => {
                return Err(
                    LoxError::runtime(keyword.line, "Undefined variable 'super'.").into()
                );
            }
        };

        let superclass: Value =
            Environment::get_at(&self.environment, distance, "super", keyword.line)?;

        let instance: Value =
            Environment::get_at(&self.environment, distance - 1, "this", keyword.line)?;

        match (superclass, instance) {
            (Value::Class(superclass), Value::Instance(instance)) => {
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(&instance)))),

                    None => Err(LoxError::runtime(
                        method.line,
                        format!("Undefined property '{}'.", method.lexeme),
                    )
                    .into()),
                }
            }

            _ => Err(LoxError::runtime(keyword.line, "Superclass must be a class.").into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(distance) => {
                debug!("Reading '{}' at distance {}", name.lexeme, distance);

                Environment::get_at(&self.environment, *distance, &name.lexeme, name.line)
            }

            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> Result<Value> {
        match callee {
            Value::NativeFunction { arity, func, .. } => {
                check_arity(arity, args.len(), paren.line)?;

                func(&args).map_err(|msg| LoxError::runtime(paren.line, msg))
            }

            Value::Function(function) => {
                check_arity(function.arity(), args.len(), paren.line)?;

                function.call(self, args)
            }

            Value::Class(class) => {
                check_arity(class.arity(), args.len(), paren.line)?;

                LoxClass::construct(&class, self, args)
            }

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn check_arity(expected: usize, got: usize, line: usize) -> Result<()> {
    if expected != got {
        return Err(LoxError::runtime(
            line,
            format!("Expected {} arguments but got {}.", expected, got),
        ));
    }

    Ok(())
}

/// `nil` and `false` are falsy; every other value, including `0` and `""`,
/// is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}
