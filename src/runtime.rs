//! Runtime object model shared by the evaluator: reference-counted values,
//! classes with parent-chain method resolution, and the execution context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::statement::{ExecResult, Statement};

pub const INIT_METHOD: &str = "__init__";
pub const STR_METHOD: &str = "__str__";
pub const EQ_METHOD: &str = "__eq__";
pub const LT_METHOD: &str = "__lt__";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("unknown variable {name}")]
    UnknownVariable { name: String },
    #[error("unknown field {name}")]
    UnknownField { name: String },
    #[error("value is not a class instance")]
    NotAnInstance,
    #[error("class definition requires a class object")]
    NotAClass,
    #[error("Bad Method call: {method}")]
    BadMethodCall { method: String },
    #[error("method {method} expects {expected} arguments, got {found}")]
    MethodArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },
    #[error("Zero Division!")]
    ZeroDivision,
    #[error("Integer overflow!")]
    IntegerOverflow,
    #[error("Bad Addition!")]
    BadAddition,
    #[error("Bad Subtraction!")]
    BadSubtraction,
    #[error("Bad Multiplication!")]
    BadMultiplication,
    #[error("Bad Division!")]
    BadDivision,
    #[error("Cannot compare objects for equality")]
    IncomparableForEquality,
    #[error("Cannot compare objects for less")]
    IncomparableForLess,
    #[error("return signal escaped the method body")]
    UncaughtReturn,
    #[error("failed to write program output")]
    Output(#[from] fmt::Error),
}

/// Mutable name-to-value mapping a statement executes against. Each method
/// call runs in a fresh closure; frames are not chained.
pub type Closure = HashMap<String, ObjectHolder>;

/// Ambient side-channel threaded through execution, chiefly the output sink.
pub struct Context<'a> {
    output: &'a mut dyn fmt::Write,
}

impl<'a> Context<'a> {
    pub fn new(output: &'a mut dyn fmt::Write) -> Self {
        Self { output }
    }

    pub fn output(&mut self) -> &mut dyn fmt::Write {
        &mut *self.output
    }
}

/// A method attached to a class. `formal_params` excludes `self`, which is
/// bound implicitly on every call.
#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Statement,
}

#[derive(Debug)]
pub struct Class {
    name: String,
    methods: Vec<Method>,
    parent: Option<Rc<Class>>,
}

impl Class {
    pub fn new(name: String, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Self {
        Self {
            name,
            methods,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a method by name, walking the parent chain.
    pub fn method(&self, name: &str) -> Option<&Method> {
        if let Some(method) = self.methods.iter().find(|method| method.name == name) {
            return Some(method);
        }
        self.parent.as_ref().and_then(|parent| parent.method(name))
    }

    pub fn has_method(&self, name: &str, arity: usize) -> bool {
        self.method(name)
            .is_some_and(|method| method.formal_params.len() == arity)
    }
}

/// A user-defined object: a class reference plus mutable per-instance fields.
#[derive(Debug)]
pub struct ClassInstance {
    class: Rc<Class>,
    fields: Closure,
}

impl ClassInstance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: Closure::new(),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn fields(&self) -> &Closure {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Closure {
        &mut self.fields
    }
}

#[derive(Debug)]
pub enum Object {
    Number(i32),
    String(String),
    Bool(bool),
    Class(Rc<Class>),
    Instance(ClassInstance),
}

/// Shared handle to a runtime object. An empty holder denotes `None`.
/// Cloning a holder shares the underlying object: a mutation through one
/// handle is visible through all of them.
#[derive(Debug, Clone, Default)]
pub struct ObjectHolder {
    data: Option<Rc<RefCell<Object>>>,
}

impl ObjectHolder {
    pub fn none() -> Self {
        Self { data: None }
    }

    pub fn own(object: Object) -> Self {
        Self {
            data: Some(Rc::new(RefCell::new(object))),
        }
    }

    pub fn is_some(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_none(&self) -> bool {
        self.data.is_none()
    }

    pub fn as_number(&self) -> Option<i32> {
        match &*self.data.as_ref()?.borrow() {
            Object::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match &*self.data.as_ref()?.borrow() {
            Object::String(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &*self.data.as_ref()?.borrow() {
            Object::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<Rc<Class>> {
        match &*self.data.as_ref()?.borrow() {
            Object::Class(class) => Some(class.clone()),
            _ => None,
        }
    }

    pub fn is_instance(&self) -> bool {
        self.instance_class().is_some()
    }

    fn instance_class(&self) -> Option<Rc<Class>> {
        match &*self.data.as_ref()?.borrow() {
            Object::Instance(instance) => Some(instance.class().clone()),
            _ => None,
        }
    }

    pub fn get_field(&self, name: &str) -> Result<ObjectHolder, RuntimeError> {
        let Some(cell) = self.data.as_ref() else {
            return Err(RuntimeError::NotAnInstance);
        };
        match &*cell.borrow() {
            Object::Instance(instance) => instance.fields().get(name).cloned().ok_or_else(|| {
                RuntimeError::UnknownField {
                    name: name.to_string(),
                }
            }),
            _ => Err(RuntimeError::NotAnInstance),
        }
    }

    pub fn set_field(&self, name: &str, value: ObjectHolder) -> Result<(), RuntimeError> {
        let Some(cell) = self.data.as_ref() else {
            return Err(RuntimeError::NotAnInstance);
        };
        match &mut *cell.borrow_mut() {
            Object::Instance(instance) => {
                instance.fields_mut().insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(RuntimeError::NotAnInstance),
        }
    }

    /// True when the receiver is a class instance whose class (or an
    /// ancestor) declares `method` with exactly `arity` formal parameters.
    pub fn has_method(&self, method: &str, arity: usize) -> bool {
        self.instance_class()
            .is_some_and(|class| class.has_method(method, arity))
    }

    /// Invokes `method` on this instance. The body runs in a fresh closure
    /// holding `self` plus the bound parameters.
    pub fn call_method(
        &self,
        method: &str,
        args: Vec<ObjectHolder>,
        context: &mut Context<'_>,
    ) -> Result<ObjectHolder, RuntimeError> {
        let class = self
            .instance_class()
            .ok_or_else(|| RuntimeError::BadMethodCall {
                method: method.to_string(),
            })?;
        let Some(resolved) = class.method(method) else {
            return Err(RuntimeError::BadMethodCall {
                method: method.to_string(),
            });
        };
        if resolved.formal_params.len() != args.len() {
            return Err(RuntimeError::MethodArityMismatch {
                method: method.to_string(),
                expected: resolved.formal_params.len(),
                found: args.len(),
            });
        }

        let mut closure = Closure::new();
        closure.insert("self".to_string(), self.clone());
        for (param, value) in resolved.formal_params.iter().zip(args) {
            closure.insert(param.clone(), value);
        }
        match resolved.body.execute(&mut closure, context)? {
            ExecResult::Value(value) => Ok(value),
            ExecResult::Return(_) => Err(RuntimeError::UncaughtReturn),
        }
    }

    /// Display form used by `print` and string conversion. An empty holder
    /// renders as `None`; instances dispatch a zero-arity `__str__` when
    /// their class declares one.
    pub fn render(&self, context: &mut Context<'_>) -> Result<String, RuntimeError> {
        let Some(cell) = self.data.as_ref() else {
            return Ok("None".to_string());
        };
        let rendered = match &*cell.borrow() {
            Object::Number(value) => Some(value.to_string()),
            Object::String(value) => Some(value.clone()),
            Object::Bool(value) => Some(if *value { "True" } else { "False" }.to_string()),
            Object::Class(class) => Some(format!("Class {}", class.name())),
            Object::Instance(instance) => {
                if instance.class().has_method(STR_METHOD, 0) {
                    None
                } else {
                    Some(format!("<{} object>", instance.class().name()))
                }
            }
        };
        match rendered {
            Some(text) => Ok(text),
            None => self
                .call_method(STR_METHOD, Vec::new(), context)?
                .render(context),
        }
    }
}

/// Truthiness contract: false for an empty holder, `Bool(false)`,
/// `Number(0)` and the empty string; true for everything else.
pub fn is_true(value: &ObjectHolder) -> bool {
    let Some(cell) = value.data.as_ref() else {
        return false;
    };
    match &*cell.borrow() {
        Object::Number(value) => *value != 0,
        Object::String(value) => !value.is_empty(),
        Object::Bool(value) => *value,
        Object::Class(_) | Object::Instance(_) => true,
    }
}

/// Comparator shape consumed by the `Comparison` statement.
pub type Comparator =
    fn(&ObjectHolder, &ObjectHolder, &mut Context<'_>) -> Result<bool, RuntimeError>;

pub fn equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut Context<'_>,
) -> Result<bool, RuntimeError> {
    if lhs.is_none() && rhs.is_none() {
        return Ok(true);
    }
    if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(left == right);
    }
    if let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string()) {
        return Ok(left == right);
    }
    if let (Some(left), Some(right)) = (lhs.as_bool(), rhs.as_bool()) {
        return Ok(left == right);
    }
    if lhs.has_method(EQ_METHOD, 1) {
        let result = lhs.call_method(EQ_METHOD, vec![rhs.clone()], context)?;
        return Ok(is_true(&result));
    }
    Err(RuntimeError::IncomparableForEquality)
}

pub fn less(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut Context<'_>,
) -> Result<bool, RuntimeError> {
    if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(left < right);
    }
    if let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string()) {
        return Ok(left < right);
    }
    if let (Some(left), Some(right)) = (lhs.as_bool(), rhs.as_bool()) {
        return Ok(left < right);
    }
    if lhs.has_method(LT_METHOD, 1) {
        let result = lhs.call_method(LT_METHOD, vec![rhs.clone()], context)?;
        return Ok(is_true(&result));
    }
    Err(RuntimeError::IncomparableForLess)
}

pub fn not_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut Context<'_>,
) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, context)?)
}

pub fn greater(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut Context<'_>,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)? && !equal(lhs, rhs, context)?)
}

pub fn less_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut Context<'_>,
) -> Result<bool, RuntimeError> {
    Ok(!greater(lhs, rhs, context)?)
}

pub fn greater_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut Context<'_>,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)?)
}
