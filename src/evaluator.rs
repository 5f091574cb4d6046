//! The tree-walking evaluator.
//!
//! [`eval`] is a loop, not a recursion: special forms in tail position
//! (`let*`, `do`, `if`, `quasiquote` and user-function application) rebind
//! the loop's `(ast, env)` pair and continue, so tail calls run in constant
//! host-stack depth. Only non-tail positions (arguments, `if` conditions,
//! macro application, `try*` bodies) re-enter `eval`. Macro expansion runs
//! at the top of every iteration, before anything else looks at the form.

use std::rc::Rc;

use crate::ast::{Closure, Value};
use crate::env::Env;
use crate::printer;
use crate::{Arity, Error};

/// Evaluate `ast` in `env`.
pub fn eval(env: &Env, ast: &Value) -> Result<Value, Error> {
    let mut env = env.clone();
    let mut ast = ast.clone();
    loop {
        ast = macroexpand(&env, ast)?;

        let items = match &ast {
            Value::List(items, _) => Rc::clone(items),
            other => return eval_ast(&env, other),
        };
        if items.is_empty() {
            return Ok(ast);
        }

        let head = match &items[0] {
            Value::Symbol(name) => name.as_str(),
            _ => "",
        };
        match head {
            "def!" => return eval_def(&env, &items[1..]),
            "defmacro!" => return eval_defmacro(&env, &items[1..]),
            "let*" => {
                let (body, child) = eval_let(&env, &items[1..])?;
                ast = body;
                env = child;
            }
            "do" => match items[1..].split_last() {
                None => return Ok(Value::Nil),
                Some((last, init)) => {
                    for form in init {
                        eval(&env, form)?;
                    }
                    ast = last.clone();
                }
            },
            "if" => {
                Arity::AtLeast(2).validate(items.len() - 1)?;
                let condition = eval(&env, &items[1])?;
                if condition.is_truthy() {
                    ast = items[2].clone();
                } else if let Some(alternative) = items.get(3) {
                    ast = alternative.clone();
                } else {
                    return Ok(Value::Nil);
                }
            }
            "fn*" => return make_closure(&env, &items[1..]),
            "quote" => return Ok(items.get(1).cloned().unwrap_or(Value::Nil)),
            "quasiquote" => {
                Arity::Exactly(1).validate(items.len() - 1)?;
                ast = quasiquote(&items[1]);
            }
            "macroexpand" => {
                Arity::Exactly(1).validate(items.len() - 1)?;
                return macroexpand(&env, items[1].clone());
            }
            "try*" => return eval_try(&env, &items[1..]),
            _ => {
                let evaluated = eval_forms(&env, &items)?;
                let Some((func, args)) = evaluated.split_first() else {
                    return Ok(ast);
                };
                match func {
                    Value::Builtin { func, .. } => return func(&env, args),
                    Value::Closure(closure) => {
                        // Tail call: step into the body instead of recursing
                        env = closure.env.child(&closure.params, args.to_vec())?;
                        ast = closure.body.clone();
                    }
                    other => {
                        return Err(Error::TypeError(format!(
                            "cannot apply non-function: {}",
                            printer::pr_str(other, true)
                        )));
                    }
                }
            }
        }
    }
}

/// Evaluate anything that is not a call form: symbols resolve through the
/// environment, vectors and hash-map values evaluate element-wise (map keys
/// are taken as-is), everything else is itself.
fn eval_ast(env: &Env, ast: &Value) -> Result<Value, Error> {
    match ast {
        Value::Symbol(name) => env.get(name),
        Value::Vector(items, _) => Ok(Value::vector(eval_forms(env, items)?)),
        Value::Map(entries, _) => {
            let mut evaluated = std::collections::HashMap::with_capacity(entries.len());
            for (key, value) in entries.iter() {
                evaluated.insert(key.clone(), eval(env, value)?);
            }
            Ok(Value::map(evaluated))
        }
        other => Ok(other.clone()),
    }
}

/// Evaluate a slice of forms left to right, failing fast.
fn eval_forms(env: &Env, forms: &[Value]) -> Result<Vec<Value>, Error> {
    forms.iter().map(|form| eval(env, form)).collect()
}

/// Apply a callable to already-evaluated arguments. Shared by the
/// evaluator, `apply`, `map` and `swap!`.
pub fn call(env: &Env, func: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match func {
        Value::Builtin { func, .. } => func(env, &args),
        Value::Closure(closure) => apply_closure(closure, args),
        other => Err(Error::TypeError(format!(
            "cannot apply non-function: {}",
            printer::pr_str(other, true)
        ))),
    }
}

/// Evaluate a closure body in a frame binding its parameters to `args`.
pub(crate) fn apply_closure(closure: &Closure, args: Vec<Value>) -> Result<Value, Error> {
    let env = closure.env.child(&closure.params, args)?;
    eval(&env, &closure.body)
}

/// Repeatedly expand `ast` while it is a call to a macro: the head symbol
/// resolves to a closure with the macro flag set, which is applied to the
/// unevaluated tail of the form.
pub fn macroexpand(env: &Env, mut ast: Value) -> Result<Value, Error> {
    while let Some((closure, args)) = as_macro_call(env, &ast) {
        ast = apply_closure(&closure, args)?;
    }
    Ok(ast)
}

fn as_macro_call(env: &Env, ast: &Value) -> Option<(Rc<Closure>, Vec<Value>)> {
    let Value::List(items, _) = ast else {
        return None;
    };
    let Value::Symbol(name) = items.first()? else {
        return None;
    };
    let Value::Closure(closure) = env.get(name).ok()? else {
        return None;
    };
    if !closure.is_macro {
        return None;
    }
    Some((closure, items[1..].to_vec()))
}

fn eval_def(env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let Value::Symbol(name) = &args[0] else {
        return Err(Error::TypeError("def! requires a symbol name".to_owned()));
    };
    let value = eval(env, &args[1])?;
    env.set(name.clone(), value.clone());
    Ok(value)
}

/// `defmacro!` defines a *copy* of the function with the macro flag set, so
/// other holders of the original closure are unaffected.
fn eval_defmacro(env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let Value::Symbol(name) = &args[0] else {
        return Err(Error::TypeError(
            "defmacro! requires a symbol name".to_owned(),
        ));
    };
    let Value::Closure(closure) = eval(env, &args[1])? else {
        return Err(Error::TypeError(
            "defmacro! requires a function value".to_owned(),
        ));
    };
    let mac = Value::Closure(Rc::new(Closure {
        is_macro: true,
        ..(*closure).clone()
    }));
    env.set(name.clone(), mac.clone());
    Ok(mac)
}

/// Bind the `let*` pairs in order inside a fresh frame; each expression
/// already sees the bindings before it. Returns the body for the caller to
/// tail-continue on, together with the new frame.
fn eval_let(env: &Env, args: &[Value]) -> Result<(Value, Env), Error> {
    Arity::Exactly(2).validate(args.len())?;
    let Some(pairs) = args[0].as_seq() else {
        return Err(Error::TypeError(
            "let* bindings must be a list or vector".to_owned(),
        ));
    };
    if pairs.len() % 2 == 1 {
        return Err(Error::EvalError(
            "odd number of forms in let* bindings".to_owned(),
        ));
    }
    let child = env.nested();
    for pair in pairs.chunks(2) {
        let Value::Symbol(name) = &pair[0] else {
            return Err(Error::TypeError(
                "let* binding names must be symbols".to_owned(),
            ));
        };
        let value = eval(&child, &pair[1])?;
        child.set(name.clone(), value);
    }
    Ok((args[1].clone(), child))
}

fn make_closure(env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::Exactly(2).validate(args.len())?;
    let Some(params) = args[0].as_seq() else {
        return Err(Error::TypeError(
            "fn* parameters must be a list or vector".to_owned(),
        ));
    };
    if !params.iter().all(|p| matches!(p, Value::Symbol(_))) {
        return Err(Error::TypeError(
            "fn* parameters must be symbols".to_owned(),
        ));
    }
    Ok(Value::Closure(Rc::new(Closure {
        params: params.to_vec(),
        body: args[1].clone(),
        env: env.clone(),
        is_macro: false,
        meta: Value::Nil,
    })))
}

/// `(try* expr (catch* sym handler))`. The catch clause is optional; with
/// no clause the error propagates. A thrown value reaches the handler
/// unchanged, a native error arrives as its message string.
fn eval_try(env: &Env, args: &[Value]) -> Result<Value, Error> {
    Arity::AtLeast(1).validate(args.len())?;
    let catch = match args.get(1) {
        Some(clause) => Some(parse_catch(clause)?),
        None => None,
    };
    match eval(env, &args[0]) {
        Ok(value) => Ok(value),
        Err(err) => {
            let Some((name, handler)) = catch else {
                return Err(err);
            };
            let payload = match err {
                Error::Thrown(value) => value,
                other => Value::String(other.to_string()),
            };
            let child = env.nested();
            child.set(name, payload);
            eval(&child, &handler)
        }
    }
}

fn parse_catch(clause: &Value) -> Result<(String, Value), Error> {
    if let Some([Value::Symbol(keyword), Value::Symbol(name), handler]) = clause.as_seq()
        && keyword == "catch*"
    {
        return Ok((name.clone(), handler.clone()));
    }
    Err(Error::EvalError(
        "invalid catch* clause: expected (catch* sym handler)".to_owned(),
    ))
}

/// Rewrite a quasiquoted form into plain `cons`/`concat` calls, which the
/// main loop then evaluates.
fn quasiquote(ast: &Value) -> Value {
    let Some(items) = ast.as_seq().filter(|items| !items.is_empty()) else {
        return Value::list(vec![Value::symbol("quote"), ast.clone()]);
    };
    if matches!(&items[0], Value::Symbol(name) if name == "unquote") {
        return items.get(1).cloned().unwrap_or(Value::Nil);
    }
    if let Some(inner) = items[0].as_seq().filter(|inner| !inner.is_empty())
        && matches!(&inner[0], Value::Symbol(name) if name == "splice-unquote")
    {
        return Value::list(vec![
            Value::symbol("concat"),
            inner.get(1).cloned().unwrap_or(Value::Nil),
            quasiquote(&Value::list(items[1..].to_vec())),
        ]);
    }
    Value::list(vec![
        Value::symbol("cons"),
        quasiquote(&items[0]),
        quasiquote(&Value::list(items[1..].to_vec())),
    ])
}
