use std::{cell::RefCell, fmt::Display, rc::Rc};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    ast::FunctionDecl,
    environment::Environment,
    error::ErrorKind,
    interpreter::{Flow, Interpreter, RuntimeError},
    token::Token,
    value::Value,
};

pub const INITIALIZER: &str = "init";

pub trait CallableTrait {
    fn arity(&self) -> usize;
    /// `paren` is the closing parenthesis of the call, where native failures are reported.
    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError>;
}

#[derive(Clone)]
pub enum Callable {
    Function(Rc<Function>),
    Struct(Rc<Struct>),
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Struct(a), Callable::Struct(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl CallableTrait for Callable {
    fn arity(&self) -> usize {
        match self {
            Callable::Function(function) => function.arity(),
            Callable::Struct(class) => class.arity(),
            Callable::Native(native_function) => native_function.arity,
        }
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        match self {
            Callable::Function(function) => function.call(interpreter, args),
            Callable::Struct(class) => Struct::instantiate(class, interpreter, args),
            Callable::Native(native_function) => (native_function.call_impl)(&args)
                .map_err(|message| RuntimeError::new(ErrorKind::TypeError, paren, &message)),
        }
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Function(function) => write!(f, "<func {}>", function.decl.name.lexeme),
            Callable::Struct(class) => write!(f, "<struct {}>", class.name),
            Callable::Native(native_function) => {
                write!(f, "<native func {}>", native_function.name)
            }
        }
    }
}

/// A user function paired with the frame it was declared in.
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl Function {
    pub fn new(decl: &Rc<FunctionDecl>, closure: &Rc<RefCell<Environment>>) -> Self {
        Self {
            decl: Rc::clone(decl),
            closure: Rc::clone(closure),
            is_initializer: false,
        }
    }

    /// Returns a copy of this method whose frame defines `this` as `instance`.
    pub fn bind(&self, instance: &Rc<RefCell<Instance>>) -> Function {
        let mut environment = Environment::with_enclosing(&self.closure);
        environment.define("this", Value::Instance(Rc::clone(instance)));

        Function {
            decl: Rc::clone(&self.decl),
            closure: environment.into_shared(),
            is_initializer: self.is_initializer,
        }
    }

    fn arity(&self) -> usize {
        self.decl.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let environment = Environment::with_enclosing(&self.closure).into_shared();

        for (param, arg) in self.decl.params.iter().zip(args) {
            environment.borrow_mut().define(&param.lexeme, arg);
        }

        let flow = interpreter.execute_block(&self.decl.body, environment)?;

        // an initializer always yields the instance
        if self.is_initializer {
            return Ok(self.closure.borrow().get("this").unwrap_or(Value::Null));
        }

        match flow {
            Flow::Returning(value) => Ok(value),
            Flow::Completed => Ok(Value::Null),
        }
    }
}

pub struct Struct {
    pub name: String,
    methods: FxHashMap<String, Rc<Function>>,
}

impl Struct {
    pub fn new(name: &str, methods: impl IntoIterator<Item = Function>) -> Self {
        let methods = methods
            .into_iter()
            .map(|mut method| {
                method.is_initializer = method.decl.name.lexeme == INITIALIZER;
                (method.decl.name.lexeme.clone(), Rc::new(method))
            })
            .collect();

        Self {
            name: name.to_string(),
            methods,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<Function>> {
        self.methods.get(name)
    }

    fn arity(&self) -> usize {
        self.find_method(INITIALIZER).map_or(0, |init| init.arity())
    }

    fn instantiate(
        class: &Rc<Struct>,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(RefCell::new(Instance::new(class)));
        debug!(class = %class.name, "new instance");

        if let Some(init) = class.find_method(INITIALIZER) {
            init.bind(&instance).call(interpreter, args)?;
        }

        Ok(Value::Instance(instance))
    }
}

pub struct Instance {
    pub class: Rc<Struct>,
    fields: FxHashMap<String, Value>,
}

impl Instance {
    pub fn new(class: &Rc<Struct>) -> Self {
        Self {
            class: Rc::clone(class),
            fields: FxHashMap::default(),
        }
    }

    /// Fields shadow methods. Methods come back bound to `instance`.
    pub fn get(instance: &Rc<RefCell<Instance>>, name: &str) -> Option<Value> {
        let this = instance.borrow();
        if let Some(value) = this.fields.get(name) {
            return Some(value.clone());
        }

        this.class.find_method(name).map(|method| {
            Value::Callable(Callable::Function(Rc::new(method.bind(instance))))
        })
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

pub type NativeImpl = fn(&[Value]) -> Result<Value, String>;

pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    call_impl: NativeImpl,
}

impl NativeFunction {
    pub fn new(name: &str, arity: usize, call_impl: NativeImpl) -> Self {
        Self {
            name: name.to_string(),
            arity,
            call_impl,
        }
    }
}
