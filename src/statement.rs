//! AST statements and their execution.
//!
//! Every node is a variant of [`Statement`] and exposes the single
//! [`execute`](Statement::execute) operation. Non-local function return
//! travels through [`ExecResult::Return`], a typed channel distinct from
//! runtime errors; `MethodBody` is the only node that converts it back into
//! an ordinary value.

use std::rc::Rc;

use crate::runtime::{
    self, Class, ClassInstance, Closure, Context, INIT_METHOD, Object, ObjectHolder, RuntimeError,
    is_true,
};

/// Control-flow outcome of executing one statement.
#[derive(Debug)]
pub enum ExecResult {
    Value(ObjectHolder),
    Return(ObjectHolder),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mult,
    Div,
}

impl ArithmeticOp {
    fn dunder(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "__add__",
            ArithmeticOp::Sub => "__sub__",
            ArithmeticOp::Mult => "__mul__",
            ArithmeticOp::Div => "__div__",
        }
    }

    fn error(self) -> RuntimeError {
        match self {
            ArithmeticOp::Add => RuntimeError::BadAddition,
            ArithmeticOp::Sub => RuntimeError::BadSubtraction,
            ArithmeticOp::Mult => RuntimeError::BadMultiplication,
            ArithmeticOp::Div => RuntimeError::BadDivision,
        }
    }

    fn apply(self, lhs: i32, rhs: i32) -> Result<i32, RuntimeError> {
        let result = match self {
            ArithmeticOp::Add => lhs.checked_add(rhs),
            ArithmeticOp::Sub => lhs.checked_sub(rhs),
            ArithmeticOp::Mult => lhs.checked_mul(rhs),
            ArithmeticOp::Div => {
                if rhs == 0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                lhs.checked_div(rhs)
            }
        };
        result.ok_or(RuntimeError::IntegerOverflow)
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    /// Literal value: number, string, bool, or `None`.
    Const(ObjectHolder),
    /// Dotted variable access: `name` or `name.field.field`.
    Variable { dotted_ids: Vec<String> },
    Assignment {
        var: String,
        value: Box<Statement>,
    },
    FieldAssignment {
        object: Vec<String>,
        field: String,
        value: Box<Statement>,
    },
    Print { args: Vec<Statement> },
    Stringify { argument: Box<Statement> },
    MethodCall {
        object: Box<Statement>,
        method: String,
        args: Vec<Statement>,
    },
    NewInstance {
        class: Rc<Class>,
        args: Vec<Statement>,
    },
    Return { value: Box<Statement> },
    /// Function body wrapper: the unique catch point of the return signal.
    MethodBody { body: Box<Statement> },
    Compound { statements: Vec<Statement> },
    IfElse {
        condition: Box<Statement>,
        then_body: Option<Box<Statement>>,
        else_body: Option<Box<Statement>>,
    },
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    And {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Or {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Not { value: Box<Statement> },
    Comparison {
        cmp: runtime::Comparator,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    ClassDefinition { class: ObjectHolder },
}

/// Yields the value a sub-statement evaluates to; a surfacing return signal
/// propagates out of the enclosing `execute` unchanged.
macro_rules! eval {
    ($stmt:expr, $closure:expr, $context:expr) => {
        match $stmt.execute($closure, $context)? {
            ExecResult::Value(value) => value,
            signal @ ExecResult::Return(_) => return Ok(signal),
        }
    };
}

impl Statement {
    pub fn number(value: i32) -> Self {
        Statement::Const(ObjectHolder::own(Object::Number(value)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Statement::Const(ObjectHolder::own(Object::String(value.into())))
    }

    pub fn boolean(value: bool) -> Self {
        Statement::Const(ObjectHolder::own(Object::Bool(value)))
    }

    pub fn none() -> Self {
        Statement::Const(ObjectHolder::none())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Statement::Variable {
            dotted_ids: vec![name.into()],
        }
    }

    /// Convenience for printing a single variable by name.
    pub fn print_variable(name: impl Into<String>) -> Self {
        Statement::Print {
            args: vec![Statement::variable(name)],
        }
    }

    pub fn execute(
        &self,
        closure: &mut Closure,
        context: &mut Context<'_>,
    ) -> Result<ExecResult, RuntimeError> {
        match self {
            Statement::Const(value) => Ok(ExecResult::Value(value.clone())),
            Statement::Variable { dotted_ids } => {
                Ok(ExecResult::Value(resolve_dotted(dotted_ids, closure)?))
            }
            Statement::Assignment { var, value } => {
                let value = eval!(value, closure, context);
                closure.insert(var.clone(), value.clone());
                Ok(ExecResult::Value(value))
            }
            Statement::FieldAssignment {
                object,
                field,
                value,
            } => {
                let target = resolve_dotted(object, closure)?;
                let value = eval!(value, closure, context);
                target.set_field(field, value.clone())?;
                Ok(ExecResult::Value(value))
            }
            Statement::Print { args } => {
                let mut first = true;
                for arg in args {
                    let value = eval!(arg, closure, context);
                    let rendered = value.render(context)?;
                    if !first {
                        write!(context.output(), " ")?;
                    }
                    write!(context.output(), "{rendered}")?;
                    first = false;
                }
                writeln!(context.output())?;
                Ok(ExecResult::Value(ObjectHolder::none()))
            }
            Statement::Stringify { argument } => {
                let value = eval!(argument, closure, context);
                let rendered = value.render(context)?;
                Ok(ExecResult::Value(ObjectHolder::own(Object::String(
                    rendered,
                ))))
            }
            Statement::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = eval!(object, closure, context);
                let mut actual_args = Vec::with_capacity(args.len());
                for arg in args {
                    actual_args.push(eval!(arg, closure, context));
                }
                if !receiver.has_method(method, actual_args.len()) {
                    return Err(RuntimeError::BadMethodCall {
                        method: method.clone(),
                    });
                }
                let result = receiver.call_method(method, actual_args, context)?;
                Ok(ExecResult::Value(result))
            }
            Statement::NewInstance { class, args } => {
                let instance =
                    ObjectHolder::own(Object::Instance(ClassInstance::new(class.clone())));
                if instance.has_method(INIT_METHOD, args.len()) {
                    let mut actual_args = Vec::with_capacity(args.len());
                    for arg in args {
                        actual_args.push(eval!(arg, closure, context));
                    }
                    instance.call_method(INIT_METHOD, actual_args, context)?;
                }
                Ok(ExecResult::Value(instance))
            }
            Statement::Return { value } => {
                let value = eval!(value, closure, context);
                Ok(ExecResult::Return(value))
            }
            Statement::MethodBody { body } => match body.execute(closure, context)? {
                ExecResult::Return(value) | ExecResult::Value(value) => {
                    Ok(ExecResult::Value(value))
                }
            },
            Statement::Compound { statements } => {
                for statement in statements {
                    match statement.execute(closure, context)? {
                        signal @ ExecResult::Return(_) => return Ok(signal),
                        ExecResult::Value(value) => {
                            // A non-empty result of a direct if/else or
                            // method-call child ends the block early.
                            let propagates = matches!(
                                statement,
                                Statement::IfElse { .. } | Statement::MethodCall { .. }
                            );
                            if propagates && value.is_some() {
                                return Ok(ExecResult::Value(value));
                            }
                        }
                    }
                }
                Ok(ExecResult::Value(ObjectHolder::none()))
            }
            Statement::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                let condition = eval!(condition, closure, context);
                let branch = if is_true(&condition) {
                    then_body
                } else {
                    else_body
                };
                match branch {
                    Some(body) => body.execute(closure, context),
                    None => Ok(ExecResult::Value(ObjectHolder::none())),
                }
            }
            Statement::Arithmetic { op, lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
                    let value = op.apply(left, right)?;
                    return Ok(ExecResult::Value(ObjectHolder::own(Object::Number(value))));
                }
                if *op == ArithmeticOp::Add
                    && let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string())
                {
                    return Ok(ExecResult::Value(ObjectHolder::own(Object::String(
                        left + &right,
                    ))));
                }
                if lhs.has_method(op.dunder(), 1) {
                    let result = lhs.call_method(op.dunder(), vec![rhs], context)?;
                    return Ok(ExecResult::Value(result));
                }
                Err(op.error())
            }
            Statement::And { lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                Ok(ExecResult::Value(ObjectHolder::own(Object::Bool(
                    is_true(&lhs) && is_true(&rhs),
                ))))
            }
            Statement::Or { lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                Ok(ExecResult::Value(ObjectHolder::own(Object::Bool(
                    is_true(&lhs) || is_true(&rhs),
                ))))
            }
            Statement::Not { value } => {
                let value = eval!(value, closure, context);
                Ok(ExecResult::Value(ObjectHolder::own(Object::Bool(
                    !is_true(&value),
                ))))
            }
            Statement::Comparison { cmp, lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                let result = cmp(&lhs, &rhs, context)?;
                Ok(ExecResult::Value(ObjectHolder::own(Object::Bool(result))))
            }
            Statement::ClassDefinition { class } => {
                let name = class
                    .as_class()
                    .ok_or(RuntimeError::NotAClass)?
                    .name()
                    .to_string();
                closure.insert(name, class.clone());
                Ok(ExecResult::Value(ObjectHolder::none()))
            }
        }
    }

    /// Host entry point: executes the statement and unwraps the value. A
    /// return signal surfacing here has leaked past every method boundary.
    pub fn evaluate(
        &self,
        closure: &mut Closure,
        context: &mut Context<'_>,
    ) -> Result<ObjectHolder, RuntimeError> {
        match self.execute(closure, context)? {
            ExecResult::Value(value) => Ok(value),
            ExecResult::Return(_) => Err(RuntimeError::UncaughtReturn),
        }
    }
}

fn resolve_dotted(dotted_ids: &[String], closure: &Closure) -> Result<ObjectHolder, RuntimeError> {
    let Some((first, rest)) = dotted_ids.split_first() else {
        return Err(RuntimeError::UnknownVariable {
            name: String::new(),
        });
    };
    let mut value = closure
        .get(first)
        .cloned()
        .ok_or_else(|| RuntimeError::UnknownVariable {
            name: first.clone(),
        })?;
    for name in rest {
        value = value.get_field(name)?;
    }
    Ok(value)
}
