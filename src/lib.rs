//! wot - a small Lisp interpreter in the MAL family
//!
//! This crate implements a homoiconic, dynamically typed, lexically scoped
//! language with first-class functions, macros, atoms (mutable cells),
//! quasiquotation, proper tail calls and exceptions.
//!
//! Data flows in one direction at the top level: text is tokenized and
//! parsed into a [`ast::Value`] tree, the tree is evaluated, and the result
//! is printed back to text. Evaluation may re-enter the reader through the
//! `read-string` primitive.
//!
//! ```text
//! (def! fib (fn* (n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))
//! (fib 10) ; => 55
//! ```
//!
//! ## Modules
//!
//! - `reader`: tokenizing and parsing source text into values
//! - `printer`: rendering values back to text, readable or display mode
//! - `ast`: the tagged value tree shared by reader and evaluator
//! - `env`: lexical environment frames
//! - `evaluator`: the tail-call-optimized tree-walking interpreter
//! - `core`: the primitive namespace installed in the root environment
//! - `readline`: line editing with persistent history

use std::fmt;

/// Maximum nesting depth accepted by the reader. Guards against stack
/// overflow from pathologically nested input; evaluation of tail calls is
/// unaffected because the evaluator loops instead of recursing.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (stray brackets, malformed tokens)
    InvalidSyntax,
    /// Input ended before the form was complete (unclosed bracket or
    /// string). Kept distinguishable so a front end may prompt for
    /// continuation lines.
    Incomplete,
    /// Form nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
}

/// A structured error describing a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
        }
    }

    /// End-of-input underflow: the parser wanted more tokens.
    pub fn underflow() -> Self {
        Self::new(ParseErrorKind::Incomplete, "unexpected end of input")
    }

    pub fn is_incomplete(&self) -> bool {
        self.kind == ParseErrorKind::Incomplete
    }
}

/// Expected argument count for a primitive or special form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn validate(self, got: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exactly(n) => got == n,
            Arity::AtLeast(n) => got >= n,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::ArityError {
                expected: self,
                got,
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    EvalError(String),
    TypeError(String),
    UnboundSymbol(String),
    ArityError { expected: Arity, got: usize },
    IoError(String),
    /// A user exception raised by `throw`; carries an arbitrary value that
    /// `try*`/`catch*` hands to the handler unchanged.
    Thrown(ast::Value),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => write!(f, "{}", e.message),
            Error::EvalError(msg) => write!(f, "{msg}"),
            Error::TypeError(msg) => write!(f, "{msg}"),
            Error::UnboundSymbol(name) => write!(f, "'{name}' not found"),
            Error::ArityError { expected, got } => {
                write!(f, "wrong number of arguments: expected {expected}, got {got}")
            }
            Error::IoError(msg) => write!(f, "{msg}"),
            Error::Thrown(value) => write!(f, "{}", printer::pr_str(value, true)),
        }
    }
}

pub mod ast;
pub mod core;
pub mod env;
pub mod evaluator;
pub mod printer;
pub mod reader;
pub mod readline;
