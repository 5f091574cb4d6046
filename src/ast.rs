//! This module defines the core Abstract Syntax Tree (AST) types and helper
//! functions for representing values in the interpreter. The main enum,
//! [`Value`], covers all runtime data types: nil, booleans, numbers, strings,
//! symbols, keywords, the three collection types, atoms (mutable cells), and
//! the two function representations. Parsed source is itself a [`Value`]
//! tree, so code and data share one representation.
//!
//! Equality is structural for data and by reference for functions and atoms;
//! lists and vectors compare equal to each other element-wise. Metadata never
//! participates in equality or hashing, and hashing is kept consistent with
//! equality so any value can serve as a hash-map key.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::Error;
use crate::env::Env;

/// Canonical signature of a native primitive: the calling environment plus
/// the already-evaluated arguments.
pub type BuiltinFn = dyn Fn(&Env, &[Value]) -> Result<Value, Error>;

/// Core value type of the interpreter.
///
/// Collections and functions carry a metadata slot (any value, nil by
/// default) behind an `Rc` so that sharing a collection is cheap and
/// `with-meta` can replace the slot without touching other holders.
#[derive(Clone)]
pub enum Value {
    /// Distinct from false and from the empty list
    Nil,
    Bool(bool),
    /// Sole numeric type: 64-bit IEEE-754 float
    Number(f64),
    String(String),
    /// Identifier, looked up in the environment during evaluation
    Symbol(String),
    /// Self-evaluating tag, stored without the leading `:`
    Keyword(String),
    /// Ordered sequence; a non-empty list is a callable form during eval
    List(Rc<Vec<Value>>, Rc<Value>),
    /// Ordered sequence literal; never callable
    Vector(Rc<Vec<Value>>, Rc<Value>),
    /// Unordered mapping; any hashable value is allowed as a key
    Map(Rc<HashMap<Value, Value>>, Rc<Value>),
    /// Single mutable slot shared by every holder of the cell
    Atom(Rc<RefCell<Value>>),
    /// Native function installed by the core namespace
    Builtin {
        id: String,
        func: Rc<BuiltinFn>,
        meta: Rc<Value>,
    },
    /// User-defined function (or macro) with a captured environment
    Closure(Rc<Closure>),
}

/// A user function: the defining environment, the parameter pattern as raw
/// symbols from the source, the unevaluated body, and the macro flag that
/// routes it through the expansion pass instead of normal application.
#[derive(Clone)]
pub struct Closure {
    pub params: Vec<Value>,
    pub body: Value,
    pub env: Env,
    pub is_macro: bool,
    pub meta: Value,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items), Rc::new(Value::Nil))
    }

    pub fn vector(items: Vec<Value>) -> Value {
        Value::Vector(Rc::new(items), Rc::new(Value::Nil))
    }

    pub fn map(entries: HashMap<Value, Value>) -> Value {
        Value::Map(Rc::new(entries), Rc::new(Value::Nil))
    }

    pub fn symbol(name: impl Into<String>) -> Value {
        Value::Symbol(name.into())
    }

    /// Only `nil` and `false` are false; every other value is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Borrow the elements of a list or vector, the two sequential types
    /// most operations treat interchangeably.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(items, _) | Value::Vector(items, _) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Keyword(k) => write!(f, "Keyword(:{k})"),
            Value::List(items, _) => write!(f, "List({items:?})"),
            Value::Vector(items, _) => write!(f, "Vector({items:?})"),
            Value::Map(entries, _) => {
                let mut pairs: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{k:?} {v:?}")).collect();
                pairs.sort();
                write!(f, "Map({{{}}})", pairs.join(", "))
            }
            Value::Atom(cell) => write!(f, "Atom({:?})", cell.borrow()),
            Value::Builtin { id, .. } => write!(f, "Builtin({id})"),
            Value::Closure(c) => {
                let kind = if c.is_macro { "Macro" } else { "Closure" };
                write!(f, "{kind}(params={:?})", c.params)
            }
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(|x| x.into()).collect())
    }
}

/// Helper function for creating symbols - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::printer::pr_str(self, true))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            // Lists and vectors are equal across variants when their
            // elements are pairwise equal; metadata is ignored.
            (
                Value::List(a, _) | Value::Vector(a, _),
                Value::List(b, _) | Value::Vector(b, _),
            ) => a == b,
            (Value::Map(a, _), Value::Map(b, _)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| b.get(key) == Some(value))
            }
            // Atoms and functions compare by reference identity
            (Value::Atom(a), Value::Atom(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin { func: a, .. }, Value::Builtin { func: b, .. }) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false, // Different variants are never equal
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => state.write_u8(0),
            Value::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Value::Number(n) => {
                state.write_u8(2);
                // 0.0 and -0.0 are IEEE-equal and must hash alike
                let normalized = if *n == 0.0 { 0.0 } else { *n };
                state.write_u64(normalized.to_bits());
            }
            Value::String(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Value::Symbol(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            Value::Keyword(k) => {
                state.write_u8(5);
                k.hash(state);
            }
            // Shared tag: a list and a vector with equal elements are equal
            Value::List(items, _) | Value::Vector(items, _) => {
                state.write_u8(6);
                for item in items.iter() {
                    item.hash(state);
                }
            }
            Value::Map(entries, _) => {
                state.write_u8(7);
                // Entry order is unspecified, so combine per-entry hashes
                // with an order-independent sum.
                let mut combined: u64 = 0;
                for (key, value) in entries.iter() {
                    let mut entry_hasher = DefaultHasher::new();
                    key.hash(&mut entry_hasher);
                    value.hash(&mut entry_hasher);
                    combined = combined.wrapping_add(entry_hasher.finish());
                }
                state.write_u64(combined);
                state.write_usize(entries.len());
            }
            Value::Atom(cell) => {
                state.write_u8(8);
                state.write_usize(Rc::as_ptr(cell) as usize);
            }
            Value::Builtin { func, .. } => {
                state.write_u8(9);
                state.write_usize(Rc::as_ptr(func) as *const () as usize);
            }
            Value::Closure(closure) => {
                state.write_u8(10);
                state.write_usize(Rc::as_ptr(closure) as usize);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_value_construction_helpers() {
        let test_cases = vec![
            (val(42i64), Value::Number(42.0)),
            (val(-2.5), Value::Number(-2.5)),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::String("hello".to_owned())),
            (val(String::from("owned")), Value::String("owned".to_owned())),
            (sym("foo-bar?"), Value::Symbol("foo-bar?".to_owned())),
            (sym(String::from("test")), Value::Symbol("test".to_owned())),
            (
                val([1i64, 2, 3]),
                Value::list(vec![val(1i64), val(2i64), val(3i64)]),
            ),
            (
                val(vec![sym("op"), val(42i64), val("arg")]),
                Value::list(vec![
                    Value::Symbol("op".to_owned()),
                    Value::Number(42.0),
                    Value::String("arg".to_owned()),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "construction case {} failed", i + 1);
        }
    }

    #[test]
    fn test_equality_distinguishes_text_variants() {
        // A symbol named "x" is not the string "x" or the keyword :x
        assert_ne!(sym("x"), val("x"));
        assert_ne!(sym("x"), Value::Keyword("x".to_owned()));
        assert_ne!(val("x"), Value::Keyword("x".to_owned()));
    }

    #[test]
    fn test_equality_crosses_list_and_vector() {
        let items = vec![val(1i64), val(2i64), val(3i64)];
        let list = Value::list(items.clone());
        let vector = Value::vector(items);
        assert_eq!(list, vector);
        assert_eq!(hash_of(&list), hash_of(&vector));
        assert_ne!(list, Value::vector(vec![val(1i64), val(2i64)]));
    }

    #[test]
    fn test_equality_ignores_metadata() {
        let plain = Value::list(vec![val(1i64)]);
        let Value::List(items, _) = &plain else {
            unreachable!()
        };
        let tagged = Value::List(Rc::clone(items), Rc::new(val("note")));
        assert_eq!(plain, tagged);
        assert_eq!(hash_of(&plain), hash_of(&tagged));
    }

    #[test]
    fn test_map_equality_is_key_set_based() {
        let mut a = HashMap::new();
        a.insert(Value::Keyword("a".into()), val(1i64));
        a.insert(Value::Keyword("b".into()), val(2i64));
        let mut b = HashMap::new();
        b.insert(Value::Keyword("b".into()), val(2i64));
        b.insert(Value::Keyword("a".into()), val(1i64));
        assert_eq!(Value::map(a.clone()), Value::map(b));
        assert_eq!(
            hash_of(&Value::map(a.clone())),
            hash_of(&Value::map(a.clone()))
        );

        let mut c = a.clone();
        c.insert(Value::Keyword("c".into()), val(3i64));
        assert_ne!(Value::map(a), Value::map(c));
    }

    #[test]
    fn test_atoms_compare_by_identity() {
        let cell = Rc::new(RefCell::new(val(0i64)));
        let a = Value::Atom(Rc::clone(&cell));
        let b = Value::Atom(cell);
        let other = Value::Atom(Rc::new(RefCell::new(val(0i64))));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, other);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!val(false).is_truthy());
        assert!(val(true).is_truthy());
        assert!(val(0i64).is_truthy());
        assert!(val("").is_truthy());
        assert!(Value::list(vec![]).is_truthy());
    }

    #[test]
    fn test_number_hash_normalizes_signed_zero() {
        assert_eq!(val(0.0), val(-0.0));
        assert_eq!(hash_of(&val(0.0)), hash_of(&val(-0.0)));
    }
}
