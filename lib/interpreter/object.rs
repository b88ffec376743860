use core::fmt;
use std::{
    cell::RefCell,
    collections::HashMap,
    hash::{Hash, Hasher},
    rc::Rc,
};

use anyhow::Result;

use super::environment::Environment;
use crate::ast::Statement;

pub type BuiltinFunction = fn(Vec<Object>) -> Result<Object>;

#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Array(Vec<Object>),
    Hash(HashMap<Object, Object>),
    Function {
        parameters: Vec<String>,
        body: Rc<Statement>,
        env: Rc<RefCell<Environment>>,
    },
    BuiltInFunction {
        name: &'static str,
        function: BuiltinFunction,
    },
    Error(String),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => "INTEGER",
            Object::Float(_) => "FLOAT",
            Object::String(_) => "STRING",
            Object::Boolean(_) => "BOOLEAN",
            Object::Null => "NULL",
            Object::Array(_) => "ARRAY",
            Object::Hash(_) => "HASH",
            Object::Function { .. } => "FUNCTION",
            Object::BuiltInFunction { .. } => "BUILTIN",
            Object::Error(_) => "ERROR",
        }
    }

    pub fn hashable(&self) -> bool {
        matches!(
            self,
            Object::Integer(_) | Object::Boolean(_) | Object::String(_)
        )
    }

    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Boolean(false))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => a == b,
            (
                Object::Function {
                    parameters: a_params,
                    body: a_body,
                    ..
                },
                Object::Function {
                    parameters: b_params,
                    body: b_body,
                    ..
                },
            ) => a_params == b_params && a_body == b_body,
            (Object::BuiltInFunction { name: a, .. }, Object::BuiltInFunction { name: b, .. }) => {
                a == b
            }
            (Object::Error(a), Object::Error(b)) => a == b,
            _ => false,
        }
    }
}

// Only hashable variants ever reach a HashMap as keys.
impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Object::Integer(value) => value.hash(state),
            Object::String(value) => value.hash(state),
            Object::Boolean(value) => value.hash(state),
            _ => {}
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{}", value),
            Object::Float(value) => write!(f, "{:?}", value),
            Object::String(value) => write!(f, "{}", value),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::Null => write!(f, "null"),
            Object::Array(values) => {
                let values: Vec<String> = values.iter().map(|v| format!("{}", v)).collect();
                write!(f, "[{}]", values.join(", "))
            }
            Object::Function {
                parameters, body, ..
            } => write!(f, "fn({}) {}", parameters.join(", "), body),
            Object::BuiltInFunction { name, .. } => write!(f, "builtin function {}", name),
            Object::Hash(hash) => {
                let pairs = hash
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "{{{}}}", pairs)
            }
            Object::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}
