//! Lexical environment frames.
//!
//! A frame maps symbol names to values and points at an optional outer
//! frame. Frames are shared: a closure keeps its defining frame alive, the
//! evaluator holds the frame it is currently executing in, and `def!`
//! mutates the current frame in place. [`Env`] is therefore a cheap-clone
//! handle (`Rc`) over interior-mutable bindings rather than an owned value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Value;
use crate::{Arity, Error};

/// Handle to a single environment frame.
#[derive(Clone)]
pub struct Env(Rc<Frame>);

struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    outer: Option<Env>,
}

impl Env {
    /// The top-level frame with no parent.
    pub fn root() -> Env {
        Env(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            outer: None,
        }))
    }

    /// An empty frame whose parent is this one. Used by `let*` and
    /// `try*`/`catch*`, which bind incrementally rather than positionally.
    pub fn nested(&self) -> Env {
        Env(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            outer: Some(self.clone()),
        }))
    }

    /// A child frame with `params` bound to `args` for function application.
    ///
    /// Parameters bind positionally. The literal symbol `&` introduces a
    /// rest parameter: the symbol after it collects all remaining arguments
    /// into a (possibly empty) list. Missing positional arguments are an
    /// arity error; surplus arguments are ignored.
    pub fn child(&self, params: &[Value], args: Vec<Value>) -> Result<Env, Error> {
        let env = self.nested();
        for (i, param) in params.iter().enumerate() {
            let Value::Symbol(name) = param else {
                return Err(Error::TypeError(
                    "function parameters must be symbols".to_owned(),
                ));
            };
            if name == "&" {
                match params.get(i + 1) {
                    Some(Value::Symbol(rest_name)) => {
                        let rest = args.get(i..).unwrap_or(&[]).to_vec();
                        env.set(rest_name.clone(), Value::list(rest));
                        return Ok(env);
                    }
                    _ => {
                        return Err(Error::TypeError(
                            "expected a symbol after & in parameter list".to_owned(),
                        ));
                    }
                }
            }
            match args.get(i) {
                Some(arg) => env.set(name.clone(), arg.clone()),
                None => {
                    return Err(Error::ArityError {
                        expected: Arity::AtLeast(params.len()),
                        got: args.len(),
                    });
                }
            }
        }
        Ok(env)
    }

    /// The nearest frame (this one or an ancestor) binding `name`.
    pub fn find(&self, name: &str) -> Option<Env> {
        if self.0.bindings.borrow().contains_key(name) {
            Some(self.clone())
        } else {
            self.0.outer.as_ref().and_then(|outer| outer.find(name))
        }
    }

    /// Look `name` up through the frame chain.
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        match self.find(name) {
            Some(env) => {
                let bindings = env.0.bindings.borrow();
                bindings
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnboundSymbol(name.to_owned()))
            }
            None => Err(Error::UnboundSymbol(name.to_owned())),
        }
    }

    /// Define `name` in this frame, shadowing any outer binding.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Register a native function under `name` in this frame.
    pub fn register_builtin(
        &self,
        name: &str,
        func: impl Fn(&Env, &[Value]) -> Result<Value, Error> + 'static,
    ) {
        self.set(
            name,
            Value::Builtin {
                id: name.to_owned(),
                func: Rc::new(func),
                meta: Rc::new(Value::Nil),
            },
        );
    }
}
