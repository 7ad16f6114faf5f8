use std::{cell::RefCell, io, io::Write, mem, rc::Rc};

use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::{
    ast::{Expr, Stmt},
    callable::{Callable, CallableTrait, Function, Instance, NativeFunction, Struct},
    environment::Environment,
    error::{ErrorKind, OkraError},
    printer,
    token::{Token, TokenType},
    value::Value,
};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("{message}")]
    Eval {
        kind: ErrorKind,
        line: usize,
        col: usize,
        message: String,
    },
    #[error("failed to write program output: {0}")]
    Output(#[from] io::Error),
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, token: &Token, message: &str) -> RuntimeError {
        RuntimeError::Eval {
            kind,
            line: token.line,
            col: token.col,
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RuntimeError::Eval { kind, .. } => Some(*kind),
            RuntimeError::Output(_) => None,
        }
    }

    /// The diagnostic form of this error, if it is a language-level failure.
    pub fn diagnostic(&self) -> Option<OkraError> {
        match self {
            RuntimeError::Eval {
                kind,
                line,
                col,
                message,
            } => Some(OkraError::new(*kind, *line, *col, message.as_str())),
            RuntimeError::Output(_) => None,
        }
    }
}

/// How a statement finished. `Returning` unwinds to the nearest call boundary.
#[derive(Debug, PartialEq)]
pub enum Flow {
    Completed,
    Returning(Value),
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new(out: Box<dyn Write>) -> Self {
        let globals = Environment::new().into_shared();
        Self {
            environment: Rc::clone(&globals),
            globals,
            out,
        }
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.borrow_mut().define(name, value);
    }

    pub fn load_stdlib(&mut self, natives: impl IntoIterator<Item = NativeFunction>) {
        for native in natives {
            debug!(name = %native.name, arity = native.arity, "loading builtin");
            let name = native.name.clone();
            self.define_global(&name, Value::Callable(Callable::Native(Rc::new(native))));
        }
    }

    /// Runs `statements` against the global frame, stopping at the first runtime error.
    /// Globals persist across calls.
    #[instrument(level = "debug", skip_all, fields(statements = statements.len()))]
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.execute(stmt)?;
        }
        self.out.flush()?;

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        trace!(stmt = %printer::summarize(stmt), "execute");

        match stmt {
            Stmt::Expression { expression } => {
                self.evaluate(expression)?;
            }
            Stmt::Print { expression } => {
                let value = self.evaluate(expression)?;
                writeln!(self.out, "{value}")?;
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer)?,
                    None => Value::Null,
                };
                self.environment.borrow_mut().define(&name.lexeme, value);
            }
            Stmt::Block { statements } => {
                let environment = Environment::with_enclosing(&self.environment).into_shared();
                return self.execute_block(statements, environment);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                }
                if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Returning(value) = self.execute(body)? {
                        return Ok(Flow::Returning(value));
                    }
                }
            }
            Stmt::Function(decl) => {
                debug!(name = %decl.name.lexeme, params = decl.params.len(), "defining function");
                let function = Function::new(decl, &self.environment);
                self.environment.borrow_mut().define(
                    &decl.name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
            }
            Stmt::Struct { name, methods } => {
                debug!(name = %name.lexeme, methods = methods.len(), "defining struct");
                let methods = methods
                    .iter()
                    .map(|decl| Function::new(decl, &self.environment));
                let class = Struct::new(&name.lexeme, methods);
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Callable(Callable::Struct(Rc::new(class))));
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Null,
                };
                return Ok(Flow::Returning(value));
            }
        }

        Ok(Flow::Completed)
    }

    /// Executes `statements` in `environment`, restoring the current frame afterwards
    /// even when a statement fails.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Flow, RuntimeError> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = self.execute_all(statements);
        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            if let Flow::Returning(value) = self.execute(stmt)? {
                return Ok(Flow::Returning(value));
            }
        }

        Ok(Flow::Completed)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal { value } => Ok(Value::from(value.clone())),
            Expr::Grouping { expression } => self.evaluate(expression),
            Expr::Unary { op, right } => {
                let right = self.evaluate(right)?;
                unary(&right, op)
            }
            Expr::Binary { left, op, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(left, right, op)
            }
            Expr::Logical { left, op, right } => {
                let left = self.evaluate(left)?;
                let short_circuits = match op.t_type {
                    TokenType::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuits {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expr::Variable { name } => self.look_up(name, &name.lexeme),
            Expr::This { keyword } => self.look_up(keyword, "this"),
            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment
                    .borrow_mut()
                    .assign(&name.lexeme, value.clone())
                    .map_err(|e| RuntimeError::new(ErrorKind::NameError, name, &e.to_string()))?;
                Ok(value)
            }
            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, &name.lexeme).ok_or_else(|| {
                    RuntimeError::new(
                        ErrorKind::NameError,
                        name,
                        &format!("Undefined property '{}'.", name.lexeme),
                    )
                }),
                _ => Err(RuntimeError::new(
                    ErrorKind::TypeError,
                    name,
                    "Only instances have properties.",
                )),
            },
            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::new(
                        ErrorKind::TypeError,
                        name,
                        "Only instances have fields.",
                    ));
                };
                let value = self.evaluate(value)?;
                instance.borrow_mut().set(&name.lexeme, value.clone());
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                args,
            } => {
                let Value::Callable(callable) = self.evaluate(callee)? else {
                    return Err(RuntimeError::new(
                        ErrorKind::TypeError,
                        paren,
                        "Can only call functions and structs.",
                    ));
                };

                let mut arguments = Vec::with_capacity(args.len());
                for arg in args {
                    arguments.push(self.evaluate(arg)?);
                }

                if arguments.len() != callable.arity() {
                    return Err(RuntimeError::new(
                        ErrorKind::ArityError,
                        paren,
                        &format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            arguments.len()
                        ),
                    ));
                }

                debug!(callee = %callable, line = paren.line, "call");
                callable.call(self, arguments, paren)
            }
        }
    }

    fn look_up(&self, token: &Token, name: &str) -> Result<Value, RuntimeError> {
        self.environment
            .borrow()
            .get(name)
            .map_err(|e| RuntimeError::new(ErrorKind::NameError, token, &e.to_string()))
    }
}

fn unary(right: &Value, op: &Token) -> Result<Value, RuntimeError> {
    match (op.t_type, right) {
        (TokenType::Minus, Value::Number(num)) => Ok(Value::Number(-num)),
        (TokenType::Minus, _) => Err(RuntimeError::new(
            ErrorKind::TypeError,
            op,
            "Operand of '-' must be a number.",
        )),
        (TokenType::Bang, _) => Ok(Value::Bool(!right.is_truthy())),
        _ => unreachable!("parser only builds unary '-' and '!'"),
    }
}

// division by zero follows IEEE-754 and yields inf or NaN
fn binary(left: Value, right: Value, op: &Token) -> Result<Value, RuntimeError> {
    use TokenType::{
        BangEqual, EqualEqual, Greater, GreaterEqual, Less, LessEqual, Minus, Plus, Slash, Star,
    };
    use Value::{Bool, Number, String};

    match (op.t_type, &left, &right) {
        (Greater, Number(left), Number(right)) => Ok(Bool(left > right)),
        (GreaterEqual, Number(left), Number(right)) => Ok(Bool(left >= right)),
        (Less, Number(left), Number(right)) => Ok(Bool(left < right)),
        (LessEqual, Number(left), Number(right)) => Ok(Bool(left <= right)),
        (BangEqual, _, _) => Ok(Bool(left != right)),
        (EqualEqual, _, _) => Ok(Bool(left == right)),
        (Minus, Number(left), Number(right)) => Ok(Number(left - right)),
        (Plus, Number(left), Number(right)) => Ok(Number(left + right)),
        (Plus, String(left), String(right)) => Ok(String(format!("{left}{right}"))),
        (Slash, Number(left), Number(right)) => Ok(Number(left / right)),
        (Star, Number(left), Number(right)) => Ok(Number(left * right)),
        (Greater | GreaterEqual | Less | LessEqual | Minus | Slash | Star, _, _) => {
            Err(RuntimeError::new(
                ErrorKind::TypeError,
                op,
                &format!("Operands of '{}' must be numbers.", op.lexeme),
            ))
        }
        (Plus, _, _) => Err(RuntimeError::new(
            ErrorKind::TypeError,
            op,
            "Operands of '+' must be two numbers or two strings.",
        )),
        _ => unreachable!("parser only builds arithmetic, comparison and equality binaries"),
    }
}
