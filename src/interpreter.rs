use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info, warn};
use thiserror::Error;

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use crate::value::{LoxClass, LoxFunction, NativeFunction, Value};

/// Why statement execution stopped early.
///
/// A `return` travels the same channel as errors so `?` unwinds both through
/// nested blocks and loops, but only function calls ever catch it.
#[derive(Error, Debug)]
pub enum Unwind {
    #[error(transparent)]
    Error(#[from] LoxError),

    #[error("Return signal with value: {0}")]
    Return(Value),
}

/// Result of executing a statement.
pub type Exec = std::result::Result<(), Unwind>;

/// Nested calls allowed before a runtime "Stack overflow." error.  Each Lox
/// call costs several host frames, so the host thread needs a stack sized
/// for this many (the `rox` binary runs programs on a dedicated thread).
pub const MAX_CALL_DEPTH: usize = 1000;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Binding distances from the resolver; absent ids are globals.
    locals: HashMap<ExprId, usize>,
    /// Lox calls currently in progress.
    depth: usize,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn clock(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e: SystemTimeError| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}

impl Interpreter {
    /// An interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// An interpreter whose `print` statements write to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::Native(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock,
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            depth: 0,
            out,
        }
    }

    /// Record that the node `id` refers to a binding `depth` scopes out.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Current value of a global, if defined.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get_here(name)
    }

    /// Interprets a list of statements (a "program").  The first runtime error
    /// aborts the run; globals defined before it survive for the next call.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        // A previous run may have died inside a block or a call.
        self.environment = Rc::clone(&self.globals);
        self.depth = 0;

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}
                Err(Unwind::Error(e)) => {
                    debug!("Runtime error: {}", e);
                    return Err(e);
                }
                Err(Unwind::Return(value)) => {
                    warn!("Return escaped to top level with value {}", value);
                    break;
                }
            }
        }

        self.out.flush()?;

        info!("Interpretation completed");

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Exec {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value).map_err(LoxError::from)?;
                debug!("Printed value: {}", value);
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let scope = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, scope)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)?;
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);
                let function =
                    LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                return Err(Unwind::Return(value));
            }

            Stmt::Class { name, methods } => {
                let table: HashMap<String, LoxFunction> = methods
                    .iter()
                    .map(|decl| {
                        let is_init = decl.name.lexeme == "init";
                        let method = LoxFunction::new(
                            Rc::clone(decl),
                            Rc::clone(&self.environment),
                            is_init,
                        );
                        (decl.name.lexeme.clone(), method)
                    })
                    .collect();

                debug!("Defining class '{}' with {} methods", name.lexeme, table.len());

                let class = LoxClass::new(name.lexeme.clone(), table);
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Class(Rc::new(class)));
            }
        }

        Ok(())
    }

    /// Run `statements` inside `environment`, restoring the previous scope
    /// however the block exits.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: Environment) -> Exec {
        let previous = std::mem::replace(
            &mut self.environment,
            Rc::new(RefCell::new(environment)),
        );

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                let decided = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if decided {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(callee, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.set(name, value.clone());

                Ok(value)
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, right: &Expr) -> Result<Value> {
        let right_val = self.evaluate(right)?;

        match op.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(
                    op,
                    format!("Operand of '{}' must be a number.", op.lexeme),
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),

            _ => Err(LoxError::runtime(op, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        debug!(
            "Binary '{}' on {:?} and {:?}",
            op.lexeme, left_val, right_val
        );

        match op.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => {
                    Ok(Value::from(format!("{}{}", a, b)))
                }
                _ => Err(LoxError::runtime(
                    op,
                    "Operands of '+' must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a * b))
            }

            // IEEE semantics: x/0 is ±inf, 0/0 is NaN.
            TokenType::SLASH => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            _ => Err(LoxError::runtime(op, "Invalid binary operator.")),
        }
    }

    fn call_value(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            debug!("Call depth limit {} reached", MAX_CALL_DEPTH);
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        self.depth += 1;
        let result = self.dispatch_call(callee, paren, args);
        self.depth -= 1;

        result
    }

    fn dispatch_call(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Native(native) => {
                check_arity(paren, native.arity, args.len())?;
                native
                    .call(&args)
                    .map_err(|message| LoxError::runtime(paren, message))
            }

            Value::Function(function) => {
                check_arity(paren, function.arity(), args.len())?;
                function.call(self, args)
            }

            Value::Class(class) => {
                check_arity(paren, class.arity(), args.len())?;
                class.call(self, args)
            }

            _ => Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }
}

fn check_arity(paren: &Token, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(LoxError::runtime(
            paren,
            format!("Expected {} arguments but got {}.", expected, got),
        ));
    }

    Ok(())
}

fn number_operands(op: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        (Value::Number(_), other) => Err(LoxError::runtime(
            op,
            format!(
                "Right operand of '{}' must be a number, got {}.",
                op.lexeme,
                other.type_name()
            ),
        )),
        (other, _) => Err(LoxError::runtime(
            op,
            format!(
                "Left operand of '{}' must be a number, got {}.",
                op.lexeme,
                other.type_name()
            ),
        )),
    }
}
