use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// One lexical scope at runtime.  Parents are shared (`Rc`) because closures
/// and still‑running callers may both hold on to the same ancestor.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
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

    /// Bind `name` in this scope, overwriting any previous binding here.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Value bound in this very scope, ignoring parents.
    pub fn get_here(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Dynamic lookup through the enclosing chain.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Walk `distance` parents up from `env`.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut current: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..distance {
            let next = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Read a binding at a resolver‑computed distance, skipping the chain walk.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &Token) -> Result<Value> {
        Self::ancestor(env, distance)
            .and_then(|scope| scope.borrow().get_here(&name.lexeme))
            .ok_or_else(|| undefined(name))
    }

    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<()> {
        let scope = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let mut scope = scope.borrow_mut();

        match scope.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn lookup_walks_enclosing_chain() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&globals));

        assert_eq!(inner.get(&ident("a")).ok(), Some(Value::Number(1.0)));
        assert!(inner.get(&ident("b")).is_err());
    }

    #[test]
    fn assign_updates_the_declaring_scope() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));
        let mut inner = Environment::with_enclosing(Rc::clone(&globals));

        inner.assign(&ident("a"), Value::Bool(true)).unwrap();
        assert_eq!(globals.borrow().get_here("a"), Some(Value::Bool(true)));
        assert_eq!(inner.get_here("a"), None);
    }

    #[test]
    fn assign_to_undeclared_name_fails() {
        let mut env = Environment::new();
        let err = env.assign(&ident("nope"), Value::Nil).unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'nope'.\n[line 1]");
    }

    #[test]
    fn distance_lookup_skips_shadowing_scopes() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("x", Value::Number(1.0));
        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(&outer))));
        inner.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(Environment::get_at(&inner, 1, &ident("x")).ok(), Some(Value::Number(1.0)));
        assert_eq!(Environment::get_at(&inner, 0, &ident("x")).ok(), Some(Value::Number(2.0)));

        Environment::assign_at(&inner, 1, &ident("x"), Value::Nil).unwrap();
        assert_eq!(outer.borrow().get_here("x"), Some(Value::Nil));
        assert!(Environment::get_at(&inner, 5, &ident("x")).is_err());
    }
}
