//! The submission scripting language.
//!
//! A small indentation-structured language with functions, loops, lists,
//! tuples, dicts and strings. Submissions are parsed into an [`ast::Module`],
//! then run by an [`Interpreter`] under [`Limits`] on call depth and wall time.
//!
//! `print` output is captured by the interpreter and never reaches the host's
//! standard output.

pub mod ast;
mod builtins;
mod error;
mod interpreter;
mod lexer;
mod methods;
mod ops;
mod parser;
mod value;

pub use builtins::Builtin;
pub use error::{ErrorKind, ParseError, ScriptError};
pub use interpreter::{Env, Interpreter, Limits, DEADLINE_CHECK_INTERVAL};
pub use methods::CURSOR_METHODS;
pub use parser::parse;
pub use value::{BoundMethod, CursorRef, Dict, Function, ListRef, ModuleValue, Range, Value};
