use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::token::TokenType;

/// Parenthesized prefix rendering of the AST, used by the `parse`
/// subcommand.
pub struct Ast;

impl Ast {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(token) => match &token.token_type {
                TokenType::NUMBER(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }

                TokenType::STRING(s) => s.to_string(),

                TokenType::TRUE => "true".to_string(),

                TokenType::FALSE => "false".to_string(),

                TokenType::NIL => "nil".to_string(),

                _ => token.lexeme.clone(),
            },

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Unary { op, right } => format!("({} {})", op.lexeme, self.print(right)),

            Expr::Binary { left, op, right } | Expr::Logical { left, op, right } => {
                format!("({} {} {})", op.lexeme, self.print(left), self.print(right))
            }

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut out: String = format!("(call {}", self.print(callee));

                for arg in arguments {
                    out.push(' ');
                    out.push_str(&self.print(arg));
                }

                out.push(')');

                out
            }

            Expr::Get { object, name } => format!("(. {} {})", self.print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                self.print(object),
                name.lexeme,
                self.print(value)
            ),

            Expr::This { .. } => "this".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    pub fn print_stmt(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => self.print(expr),

            Stmt::Print(expr) => format!("(print {})", self.print(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("(var {} {})", name.lexeme, self.print(init)),

                None => format!("(var {})", name.lexeme),
            },

            Stmt::Block(statements) => {
                let mut out: String = "(block".to_string();

                for s in statements {
                    out.push(' ');
                    out.push_str(&self.print_stmt(s));
                }

                out.push(')');

                out
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(eb) => format!(
                    "(if {} {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch),
                    self.print_stmt(eb)
                ),

                None => format!(
                    "(if {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch)
                ),
            },

            Stmt::While { condition, body } => {
                format!("(while {} {})", self.print(condition), self.print_stmt(body))
            }

            Stmt::Function(decl) => self.print_function(decl),

            Stmt::Return { value, .. } => match value {
                Some(expr) => format!("(return {})", self.print(expr)),

                None => "(return)".to_string(),
            },

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let mut out: String = format!("(class {}", name.lexeme);

                if let Some(super_expr) = superclass {
                    out.push_str(" < ");
                    out.push_str(&self.print(super_expr));
                }

                for method in methods {
                    out.push(' ');
                    out.push_str(&self.print_function(method));
                }

                out.push(')');

                out
            }
        }
    }

    fn print_function(&self, decl: &FunctionDecl) -> String {
        let mut out: String = format!("(fun {} (", decl.name.lexeme);

        for (i, param) in decl.params.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&param.lexeme);
        }

        out.push(')');

        for stmt in &decl.body {
            out.push(' ');
            out.push_str(&self.print_stmt(stmt));
        }

        out.push(')');

        out
    }
}
