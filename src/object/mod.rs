//! Runtime object model, shared by the tree-walking interpreter and the
//! bytecode VM.

pub mod builtins;

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::Stmt;
use crate::interpreter::Environment;

pub use builtins::{BuiltinDef, BuiltinFn, BUILTINS};

/// The map type backing hash objects: insertion-ordered with a fast hasher.
pub type HashMap = IndexMap<HashKey, HashPair, ahash::RandomState>;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Object {
    /// Integer value
    Integer(i64),
    /// Boolean value
    Boolean(bool),
    /// String value
    String(Rc<String>),
    /// Null value
    Null,
    /// A soft, first-class error value. Data, not a thrown fault.
    Error(String),
    /// Wrapper carrying an early return up through nested blocks.
    /// Only the tree-walking interpreter produces these.
    ReturnValue(Box<Object>),
    /// Array value
    Array(Rc<Vec<Object>>),
    /// Hash value, keyed by hashable primitives
    Hash(Rc<HashMap>),
    /// Tree-walker function: parameters + body + captured environment
    Function(Rc<Function>),
    /// Bytecode function produced by the compiler
    CompiledFunction(Rc<CompiledFunction>),
    /// A compiled function paired with its captured free values
    Closure(Rc<Closure>),
    /// Built-in native function
    Builtin(&'static BuiltinDef),
}

/// A key/value pair stored in a hash object. Keeping the original key
/// object around lets display and iteration recover it without a
/// reverse mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// A function value for the tree-walking interpreter.
#[derive(Debug)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Vec<Stmt>,
    pub env: Rc<RefCell<Environment>>,
}

/// A compiled function: its instruction stream plus the frame layout the
/// VM needs to call it.
#[derive(Debug, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A closure: a compiled function plus its captured free values.
#[derive(Debug)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

/// A hashable key derived from a primitive object: the discriminant plus
/// the wrapped value. Only integers, booleans and strings qualify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    String(Rc<String>),
}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            HashKey::Integer(n) => n.hash(state),
            HashKey::Boolean(b) => b.hash(state),
            HashKey::String(s) => s.hash(state),
        }
    }
}

impl HashKey {
    pub fn to_object(&self) -> Object {
        match self {
            HashKey::Integer(n) => Object::Integer(*n),
            HashKey::Boolean(b) => Object::Boolean(*b),
            HashKey::String(s) => Object::String(s.clone()),
        }
    }
}

impl Object {
    /// The uppercase type name used in runtime error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => "INTEGER",
            Object::Boolean(_) => "BOOLEAN",
            Object::String(_) => "STRING",
            Object::Null => "NULL",
            Object::Error(_) => "ERROR",
            Object::ReturnValue(_) => "RETURN_VALUE",
            Object::Array(_) => "ARRAY",
            Object::Hash(_) => "HASH",
            Object::Function(_) => "FUNCTION",
            Object::CompiledFunction(_) => "COMPILED_FUNCTION",
            Object::Closure(_) => "CLOSURE",
            Object::Builtin(_) => "BUILTIN",
        }
    }

    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Boolean(b) => *b,
            Object::Null => false,
            _ => true,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    /// Derive a hash key, if this value is hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Integer(n) => Some(HashKey::Integer(*n)),
            Object::Boolean(b) => Some(HashKey::Boolean(*b)),
            Object::String(s) => Some(HashKey::String(s.clone())),
            _ => None,
        }
    }

    pub fn string(value: impl Into<String>) -> Object {
        Object::String(Rc::new(value.into()))
    }

    pub fn error(message: impl Into<String>) -> Object {
        Object::Error(message.into())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::Error(a), Object::Error(b)) => a == b,
            (Object::ReturnValue(a), Object::ReturnValue(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => Rc::ptr_eq(a, b) || a == b,
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => {
                Rc::ptr_eq(a, b) || a == b
            }
            (Object::Closure(a), Object::Closure(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(n) => write!(f, "{}", n),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::String(s) => write!(f, "{}", s),
            Object::Null => write!(f, "null"),
            Object::Error(message) => write!(f, "ERROR: {}", message),
            Object::ReturnValue(value) => write!(f, "{}", value),
            Object::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Object::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, (_, pair)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Object::Function(func) => write!(f, "<fn({})>", func.parameters.join(", ")),
            Object::CompiledFunction(_) => write!(f, "<compiled fn>"),
            Object::Closure(_) => write!(f, "<fn>"),
            Object::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hash_key_equality() {
        let a = Object::string("hello").hash_key().unwrap();
        let b = Object::string("hello").hash_key().unwrap();
        assert_eq!(a, b);

        let c = Object::Integer(1).hash_key().unwrap();
        let d = Object::Boolean(true).hash_key().unwrap();
        assert_ne!(c, d);
    }

    #[test]
    fn test_unhashable_types() {
        assert!(Object::Null.hash_key().is_none());
        assert!(Object::Array(Rc::new(vec![])).hash_key().is_none());
    }

    #[test]
    fn test_truthiness() {
        assert!(Object::Integer(0).is_truthy());
        assert!(Object::string("").is_truthy());
        assert!(!Object::Boolean(false).is_truthy());
        assert!(!Object::Null.is_truthy());
    }

    #[test]
    fn test_display() {
        let arr = Object::Array(Rc::new(vec![Object::Integer(1), Object::Integer(2)]));
        assert_eq!(arr.to_string(), "[1, 2]");
        assert_eq!(Object::Null.to_string(), "null");
        assert_eq!(Object::error("boom").to_string(), "ERROR: boom");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Object::Integer(1).type_name(), "INTEGER");
        assert_eq!(Object::string("x").type_name(), "STRING");
        assert_eq!(Object::Null.type_name(), "NULL");
    }
}
