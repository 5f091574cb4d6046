//! Built-in primitives and the root namespace.
//!
//! This module provides the registry of native functions installed in the
//! root environment before any user code runs, plus the handful of
//! bootstrap definitions written in the language itself (`not`,
//! `load-file`, `cond`, `gensym`, `or`).
//!
//! ## Functions vs special forms
//!
//! - **Primitives** here receive already-evaluated arguments through the
//!   canonical signature `fn(&Env, &[Value]) -> Result<Value, Error>`.
//! - **Special forms** control the evaluation of their arguments and live
//!   in the evaluator, not in this registry.
//!
//! Primitives validate argument shape with [`Arity`] and report descriptive
//! errors; they never panic the host. The single permitted panic is a
//! bootstrap failure, since the bootstrap sources are static strings that
//! must parse and evaluate for the interpreter to exist at all.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::{Closure, Value};
use crate::env::Env;
use crate::evaluator;
use crate::printer::pr_seq;
use crate::reader;
use crate::readline::LineReader;
use crate::{Arity, Error};

type NativeFn = fn(&Env, &[Value]) -> Result<Value, Error>;

/// Every primitive that needs no captured state, in installation order.
const NAMESPACE: &[(&str, NativeFn)] = &[
    ("+", builtin_add),
    ("-", builtin_sub),
    ("*", builtin_mul),
    ("/", builtin_div),
    ("=", builtin_equal),
    ("<", builtin_lt),
    ("<=", builtin_le),
    (">", builtin_gt),
    (">=", builtin_ge),
    ("prn", builtin_prn),
    ("println", builtin_println),
    ("pr-str", builtin_pr_str),
    ("str", builtin_str),
    ("list", builtin_list),
    ("list?", builtin_is_list),
    ("empty?", builtin_is_empty),
    ("count", builtin_count),
    ("read-string", builtin_read_string),
    ("slurp", builtin_slurp),
    ("atom", builtin_atom),
    ("atom?", builtin_is_atom),
    ("deref", builtin_deref),
    ("reset!", builtin_reset),
    ("swap!", builtin_swap),
    ("cons", builtin_cons),
    ("concat", builtin_concat),
    ("nth", builtin_nth),
    ("first", builtin_first),
    ("rest", builtin_rest),
    ("conj", builtin_conj),
    ("seq", builtin_seq),
    ("sequential?", builtin_is_sequential),
    ("throw", builtin_throw),
    ("apply", builtin_apply),
    ("map", builtin_map),
    ("nil?", builtin_is_nil),
    ("true?", builtin_is_true),
    ("false?", builtin_is_false),
    ("symbol?", builtin_is_symbol),
    ("symbol", builtin_symbol),
    ("keyword?", builtin_is_keyword),
    ("keyword", builtin_keyword),
    ("string?", builtin_is_string),
    ("number?", builtin_is_number),
    ("fn?", builtin_is_fn),
    ("macro?", builtin_is_macro),
    ("vector?", builtin_is_vector),
    ("vector", builtin_vector),
    ("map?", builtin_is_map),
    ("hash-map", builtin_hash_map),
    ("assoc", builtin_assoc),
    ("dissoc", builtin_dissoc),
    ("get", builtin_get),
    ("contains?", builtin_contains),
    ("keys", builtin_keys),
    ("vals", builtin_vals),
    ("meta", builtin_meta),
    ("with-meta", builtin_with_meta),
    ("time-ms", builtin_time_ms),
];

/// Definitions evaluated once at startup to bootstrap the language on top
/// of the primitives. Order matters: `or` expands through `gensym`, which
/// counts through `*gensym-counter*`.
const BOOTSTRAP: &[&str] = &[
    "(def! not (fn* (a) (if a false true)))",
    r#"(def! load-file (fn* (f) (eval (read-string (str "(do " (slurp f) ")")))))"#,
    r#"(defmacro! cond (fn* (& xs) (if (> (count xs) 0) (list 'if (first xs) (if (> (count xs) 1) (nth xs 1) (throw "odd number of forms to cond")) (cons 'cond (rest (rest xs)))))))"#,
    "(def! *gensym-counter* (atom 0))",
    r#"(def! gensym (fn* [] (symbol (str "G__" (swap! *gensym-counter* (fn* [x] (+ 1 x)))))))"#,
    "(defmacro! or (fn* (& xs) (if (empty? xs) nil (if (= 1 (count xs)) (first xs) (let* (condvar (gensym)) `(let* (~condvar ~(first xs)) (if ~condvar ~condvar (or ~@(rest xs)))))))))",
];

/// Build the root environment: all primitives, the root-bound `eval`, the
/// lazily-opened `readline`, and the bootstrap definitions.
pub fn default_namespace() -> Env {
    let env = Env::root();
    for (name, func) in NAMESPACE {
        env.register_builtin(name, *func);
    }

    // eval runs against the root environment, not the caller's frame; this
    // is what makes load-file define names at the top level.
    let root = env.clone();
    env.register_builtin("eval", move |_caller, args: &[Value]| match args.first() {
        Some(form) => evaluator::eval(&root, form),
        None => Ok(Value::Nil),
    });

    // The line editor is opened on first use so that batch runs and tests
    // never touch the terminal.
    let editor: Rc<RefCell<Option<LineReader>>> = Rc::new(RefCell::new(None));
    env.register_builtin("readline", move |_caller, args: &[Value]| {
        let prompt = match args.first() {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        let mut slot = editor.borrow_mut();
        if slot.is_none() {
            *slot = Some(LineReader::new()?);
        }
        match slot.as_mut() {
            Some(reader) => Ok(reader.read(&prompt)?.map(Value::String).unwrap_or(Value::Nil)),
            None => Ok(Value::Nil),
        }
    });

    env.set("*host-language*", Value::String("wot".to_owned()));

    for source in BOOTSTRAP {
        let form = reader::read_str(source).expect("core bootstrap form must parse");
        evaluator::eval(&env, &form).expect("core bootstrap form must evaluate");
    }

    env
}

//
// Builtin Function Implementations
//

fn number_pair(args: &[Value]) -> Result<(f64, f64), Error> {
    Arity::Exactly(2).validate(args.len())?;
    match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(Error::TypeError("expected two number arguments".to_owned())),
    }
}

// Macro to generate the two-argument numeric operations
macro_rules! numeric_op {
    ($name:ident, $op:tt) => {
        fn $name(_env: &Env, args: &[Value]) -> Result<Value, Error> {
            let (a, b) = number_pair(args)?;
            Ok(Value::Number(a $op b))
        }
    };
}

macro_rules! numeric_cmp {
    ($name:ident, $op:tt) => {
        fn $name(_env: &Env, args: &[Value]) -> Result<Value, Error> {
            let (a, b) = number_pair(args)?;
            Ok(Value::Bool(a $op b))
        }
    };
}

numeric_op!(builtin_add, +);
numeric_op!(builtin_sub, -);
numeric_op!(builtin_mul, *);
numeric_op!(builtin_div, /);
numeric_cmp!(builtin_lt, <);
numeric_cmp!(builtin_le, <=);
numeric_cmp!(builtin_gt, >);
numeric_cmp!(builtin_ge, >=);

/// Deep structural equality; functions and atoms compare by identity.
fn builtin_equal(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    Ok(Value::Bool(args[0] == args[1]))
}

fn builtin_prn(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    println!("{}", pr_seq(args, true, "", "", " "));
    Ok(Value::Nil)
}

fn builtin_println(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    println!("{}", pr_seq(args, false, "", "", " "));
    Ok(Value::Nil)
}

fn builtin_pr_str(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::String(pr_seq(args, true, "", "", " ")))
}

fn builtin_str(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::String(pr_seq(args, false, "", "", "")))
}

fn builtin_list(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::list(args.to_vec()))
}

fn builtin_is_list(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    Ok(Value::Bool(matches!(args[0], Value::List(..))))
}

fn builtin_is_empty(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    match &args[0] {
        Value::List(items, _) | Value::Vector(items, _) => Ok(Value::Bool(items.is_empty())),
        Value::Map(entries, _) => Ok(Value::Bool(entries.is_empty())),
        Value::Nil => Ok(Value::Bool(true)),
        _ => Err(Error::TypeError(
            "empty? expects a collection or nil".to_owned(),
        )),
    }
}

fn builtin_count(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    let count = match &args[0] {
        Value::List(items, _) | Value::Vector(items, _) => items.len(),
        Value::Map(entries, _) => entries.len(),
        Value::String(s) => s.chars().count(),
        Value::Nil => 0,
        _ => {
            return Err(Error::TypeError(
                "count expects a collection, string or nil".to_owned(),
            ));
        }
    };
    Ok(Value::Number(count as f64))
}

fn builtin_read_string(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    let Value::String(source) = &args[0] else {
        return Err(Error::TypeError(
            "read-string expects a string of source text".to_owned(),
        ));
    };
    reader::read_str(source)
}

fn builtin_slurp(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    let Value::String(path) = &args[0] else {
        return Err(Error::TypeError("slurp expects a string path".to_owned()));
    };
    std::fs::read_to_string(path)
        .map(Value::String)
        .map_err(|err| Error::IoError(format!("unable to read file {path}: {err}")))
}

fn builtin_atom(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    Ok(Value::Atom(Rc::new(RefCell::new(args[0].clone()))))
}

fn builtin_is_atom(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    Ok(Value::Bool(matches!(args[0], Value::Atom(_))))
}

fn builtin_deref(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    let Value::Atom(cell) = &args[0] else {
        return Err(Error::TypeError("deref expects an atom".to_owned()));
    };
    Ok(cell.borrow().clone())
}

fn builtin_reset(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let Value::Atom(cell) = &args[0] else {
        return Err(Error::TypeError("reset! expects an atom".to_owned()));
    };
    *cell.borrow_mut() = args[1].clone();
    Ok(args[1].clone())
}

/// `(swap! atom f extra...)` stores `(f current extra...)`. The update
/// function runs against the current value before the store, and a failing
/// update leaves the atom untouched.
fn builtin_swap(env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::AtLeast(2).validate(args.len())?;
    let Value::Atom(cell) = &args[0] else {
        return Err(Error::TypeError("swap! expects an atom".to_owned()));
    };
    let mut call_args = vec![cell.borrow().clone()];
    call_args.extend_from_slice(&args[2..]);
    let value = evaluator::call(env, &args[1], call_args)?;
    *cell.borrow_mut() = value.clone();
    Ok(value)
}

fn builtin_cons(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let Some(tail) = args[1].as_seq() else {
        return Err(Error::TypeError(
            "cons expects a sequence as its second argument".to_owned(),
        ));
    };
    let mut items = Vec::with_capacity(tail.len() + 1);
    items.push(args[0].clone());
    items.extend_from_slice(tail);
    Ok(Value::list(items))
}

fn builtin_concat(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    let mut items = Vec::new();
    for arg in args {
        let Some(seq) = arg.as_seq() else {
            return Err(Error::TypeError("concat expects sequences".to_owned()));
        };
        items.extend_from_slice(seq);
    }
    Ok(Value::list(items))
}

fn builtin_nth(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let Some(items) = args[0].as_seq() else {
        return Err(Error::TypeError("nth expects a sequence".to_owned()));
    };
    let Value::Number(n) = &args[1] else {
        return Err(Error::TypeError("nth expects a number index".to_owned()));
    };
    if *n >= 0.0
        && let Some(item) = items.get(*n as usize)
    {
        return Ok(item.clone());
    }
    Err(Error::EvalError("index out of bounds".to_owned()))
}

fn builtin_first(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    match args[0].as_seq() {
        Some([first, ..]) => Ok(first.clone()),
        _ => Ok(Value::Nil),
    }
}

fn builtin_rest(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    match args[0].as_seq() {
        Some([_, rest @ ..]) => Ok(Value::list(rest.to_vec())),
        _ => Ok(Value::list(Vec::new())),
    }
}

/// Prepend to a list (newest first), append to a vector.
fn builtin_conj(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::AtLeast(2).validate(args.len())?;
    match &args[0] {
        Value::List(items, _) => {
            let mut out: Vec<Value> = args[1..].iter().rev().cloned().collect();
            out.extend_from_slice(items);
            Ok(Value::list(out))
        }
        Value::Vector(items, _) => {
            let mut out = items.to_vec();
            out.extend_from_slice(&args[1..]);
            Ok(Value::vector(out))
        }
        _ => Ok(Value::Nil),
    }
}

fn builtin_seq(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    match &args[0] {
        Value::List(items, _) | Value::Vector(items, _) => {
            if items.is_empty() {
                Ok(Value::Nil)
            } else {
                Ok(Value::list(items.to_vec()))
            }
        }
        Value::String(s) => {
            if s.is_empty() {
                Ok(Value::Nil)
            } else {
                Ok(Value::list(
                    s.chars().map(|c| Value::String(c.to_string())).collect(),
                ))
            }
        }
        _ => Ok(Value::Nil),
    }
}

fn builtin_is_sequential(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    Ok(Value::Bool(args[0].as_seq().is_some()))
}

fn builtin_throw(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::AtLeast(1).validate(args.len())?;
    Err(Error::Thrown(args[0].clone()))
}

/// `(apply f a b (list c d))` calls `f` with the trailing sequences spliced
/// into the argument list.
fn builtin_apply(env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::AtLeast(2).validate(args.len())?;
    let mut call_args = Vec::new();
    for value in &args[1..] {
        match value.as_seq() {
            Some(items) => call_args.extend_from_slice(items),
            None => call_args.push(value.clone()),
        }
    }
    evaluator::call(env, &args[0], call_args)
}

fn builtin_map(env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let Some(items) = args[1].as_seq() else {
        return Err(Error::TypeError("map expects a sequence".to_owned()));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(evaluator::call(env, &args[0], vec![item.clone()])?);
    }
    Ok(Value::list(out))
}

// Macro to generate the single-argument type predicates
macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(_env: &Env, args: &[Value]) -> Result<Value, Error> {
            Arity::Exactly(1).validate(args.len())?;
            Ok(Value::Bool(matches!(&args[0], $pattern)))
        }
    };
}

type_predicate!(builtin_is_nil, Value::Nil);
type_predicate!(builtin_is_true, Value::Bool(true));
type_predicate!(builtin_is_false, Value::Bool(false));
type_predicate!(builtin_is_symbol, Value::Symbol(_));
type_predicate!(builtin_is_keyword, Value::Keyword(_));
type_predicate!(builtin_is_string, Value::String(_));
type_predicate!(builtin_is_number, Value::Number(_));
type_predicate!(builtin_is_vector, Value::Vector(..));
type_predicate!(builtin_is_map, Value::Map(..));

fn builtin_is_fn(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    let is_fn = match &args[0] {
        Value::Builtin { .. } => true,
        Value::Closure(closure) => !closure.is_macro,
        _ => false,
    };
    Ok(Value::Bool(is_fn))
}

fn builtin_is_macro(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    let is_macro = matches!(&args[0], Value::Closure(closure) if closure.is_macro);
    Ok(Value::Bool(is_macro))
}

fn builtin_symbol(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    match &args[0] {
        Value::String(name) => Ok(Value::Symbol(name.clone())),
        _ => Err(Error::TypeError("symbol expects a string".to_owned())),
    }
}

fn builtin_keyword(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    match &args[0] {
        Value::String(name) => Ok(Value::Keyword(name.clone())),
        _ => Err(Error::TypeError("keyword expects a string".to_owned())),
    }
}

fn builtin_vector(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::vector(args.to_vec()))
}

fn builtin_hash_map(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    map_from_pairs(args, "hash-map")
}

fn map_from_pairs(pairs: &[Value], op: &str) -> Result<Value, Error> {
    if pairs.len() % 2 == 1 {
        return Err(Error::EvalError(format!(
            "odd number of key-value arguments to {op}"
        )));
    }
    let mut entries = HashMap::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks(2) {
        entries.insert(pair[0].clone(), pair[1].clone());
    }
    Ok(Value::map(entries))
}

fn as_map<'a>(value: &'a Value, op: &str) -> Result<&'a HashMap<Value, Value>, Error> {
    match value {
        Value::Map(entries, _) => Ok(entries),
        _ => Err(Error::TypeError(format!("{op} expects a hash-map"))),
    }
}

fn builtin_assoc(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::AtLeast(3).validate(args.len())?;
    let entries = as_map(&args[0], "assoc")?;
    let pairs = &args[1..];
    if pairs.len() % 2 == 1 {
        return Err(Error::EvalError(
            "odd number of key-value arguments to assoc".to_owned(),
        ));
    }
    let mut updated = entries.clone();
    for pair in pairs.chunks(2) {
        updated.insert(pair[0].clone(), pair[1].clone());
    }
    Ok(Value::map(updated))
}

fn builtin_dissoc(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::AtLeast(2).validate(args.len())?;
    let entries = as_map(&args[0], "dissoc")?;
    let mut updated = entries.clone();
    for key in &args[1..] {
        updated.remove(key);
    }
    Ok(Value::map(updated))
}

/// Missing keys and non-map subjects both yield nil.
fn builtin_get(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    match &args[0] {
        Value::Map(entries, _) => Ok(entries.get(&args[1]).cloned().unwrap_or(Value::Nil)),
        _ => Ok(Value::Nil),
    }
}

fn builtin_contains(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let entries = as_map(&args[0], "contains?")?;
    Ok(Value::Bool(entries.contains_key(&args[1])))
}

fn builtin_keys(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    let entries = as_map(&args[0], "keys")?;
    Ok(Value::list(entries.keys().cloned().collect()))
}

fn builtin_vals(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    let entries = as_map(&args[0], "vals")?;
    Ok(Value::list(entries.values().cloned().collect()))
}

fn builtin_meta(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(1).validate(args.len())?;
    match &args[0] {
        Value::List(_, meta) | Value::Vector(_, meta) | Value::Map(_, meta) => {
            Ok((**meta).clone())
        }
        Value::Builtin { meta, .. } => Ok((**meta).clone()),
        Value::Closure(closure) => Ok(closure.meta.clone()),
        _ => Ok(Value::Nil),
    }
}

/// Returns a new value sharing contents with the original; the original is
/// never mutated, and a closure keeps its macro flag.
fn builtin_with_meta(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let meta = args[1].clone();
    match &args[0] {
        Value::List(items, _) => Ok(Value::List(Rc::clone(items), Rc::new(meta))),
        Value::Vector(items, _) => Ok(Value::Vector(Rc::clone(items), Rc::new(meta))),
        Value::Map(entries, _) => Ok(Value::Map(Rc::clone(entries), Rc::new(meta))),
        Value::Builtin { id, func, .. } => Ok(Value::Builtin {
            id: id.clone(),
            func: Rc::clone(func),
            meta: Rc::new(meta),
        }),
        Value::Closure(closure) => Ok(Value::Closure(Rc::new(Closure {
            meta,
            ..(**closure).clone()
        }))),
        _ => Err(Error::TypeError(
            "cannot attach metadata to this value".to_owned(),
        )),
    }
}

fn builtin_time_ms(_env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(0).validate(args.len())?;
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as f64)
        .unwrap_or(0.0);
    Ok(Value::Number(millis))
}
