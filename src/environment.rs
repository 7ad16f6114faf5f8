use std::{cell::RefCell, rc::Rc};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::value::Value;

/// One scope frame. Frames are shared through `Rc` so that closures keep
/// their defining frame alive after the block or call that created it ends.
#[derive(Debug, Default)]
pub struct Environment {
    values: FxHashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("Undefined variable '{0}'.")]
    Undefined(String),
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: &Rc<RefCell<Environment>>) -> Self {
        Self {
            values: FxHashMap::default(),
            enclosing: Some(Rc::clone(enclosing)),
        }
    }

    pub fn into_shared(self) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(self))
    }

    /// Binds `name` in this frame only, shadowing any outer binding.
    pub fn define(&mut self, name: &str, val: Value) {
        self.values.insert(name.to_string(), val);
    }

    pub fn assign(&mut self, name: &str, val: Value) -> Result<(), EnvironmentError> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = val;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, val),
            None => Err(EnvironmentError::Undefined(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Result<Value, EnvironmentError> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(EnvironmentError::Undefined(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_walks_outward() {
        let globals = Environment::new().into_shared();
        globals.borrow_mut().define("x", Value::Number(1.0));

        let inner = Environment::with_enclosing(&globals);
        assert_eq!(inner.get("x"), Ok(Value::Number(1.0)));
    }

    #[test]
    fn define_shadows_only_current_frame() {
        let globals = Environment::new().into_shared();
        globals.borrow_mut().define("x", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(&globals);
        inner.define("x", Value::Number(2.0));

        assert_eq!(inner.get("x"), Ok(Value::Number(2.0)));
        assert_eq!(globals.borrow().get("x"), Ok(Value::Number(1.0)));
    }

    #[test]
    fn redefinition_in_same_frame_overwrites() {
        let mut env = Environment::new();
        env.define("x", Value::Number(1.0));
        env.define("x", Value::Bool(true));
        assert_eq!(env.get("x"), Ok(Value::Bool(true)));
    }

    #[test]
    fn assign_updates_nearest_binding() {
        let globals = Environment::new().into_shared();
        globals.borrow_mut().define("x", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(&globals);
        inner.assign("x", Value::Number(5.0)).unwrap();

        assert_eq!(globals.borrow().get("x"), Ok(Value::Number(5.0)));
    }

    #[test]
    fn assign_never_creates_a_binding() {
        let globals = Environment::new().into_shared();
        let mut inner = Environment::with_enclosing(&globals);

        assert_eq!(
            inner.assign("nope", Value::Null),
            Err(EnvironmentError::Undefined("nope".to_string()))
        );
        assert!(globals.borrow().get("nope").is_err());
    }

    #[test]
    fn undefined_message() {
        let env = Environment::new();
        let err = env.get("ghost").unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'ghost'.");
    }
}
