use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// A frame of variable bindings plus an optional parent pointer.
///
/// Lookups never search the chain implicitly: the resolver tells the
/// evaluator exactly how many hops to walk (`get_at` / `assign_at`), and
/// globals are addressed directly through the root frame (`get` / `assign`).
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Unconditionally bind `name` in this frame. Redefinition is legal here;
    /// the resolver rejects duplicates in non-global scopes before execution.
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("Defining '{}' = {:?}", name, value);

        self.values.insert(name.to_string(), value);
    }

    /// Read `name` from this frame only.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        match self.values.get(name) {
            Some(value) => Ok(value.clone()),

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }

    /// Assign to an existing binding in this frame only. Assignment never
    /// creates a new binding.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);

            Ok(())
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Read `name` from the frame exactly `distance` parent hops away.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value> {
        Self::ancestor(env, distance, name, line)?.borrow().get(name, line)
    }

    /// Assign to `name` in the frame exactly `distance` parent hops away.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        Self::ancestor(env, distance, name, line)?
            .borrow_mut()
            .assign(name, value, line)
    }

    // Walks exactly `distance` hops; an intermediate frame that happens to
    // contain `name` is never consulted.
    fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Rc<RefCell<Environment>>> {
        let mut frame: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..distance {
            let parent: Option<Rc<RefCell<Environment>>> = frame.borrow().enclosing.clone();

            match parent {
                Some(enclosing) => frame = enclosing,

                None => {
                    return Err(LoxError::runtime(
                        line,
                        format!("Undefined variable '{}'.", name),
                    ));
                }
            }
        }

        Ok(frame)
    }
}
