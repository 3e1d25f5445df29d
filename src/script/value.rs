//! Runtime values.
//!
//! Mutable containers are shared through `Rc<RefCell<..>>`, so a list passed
//! into a call is the same list the caller holds afterwards. Values are
//! therefore confined to the thread that created them.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::rc::Rc;
use std::sync::Arc;

use super::ast::FunctionDef;
use super::builtins::Builtin;
use super::error::{ErrorKind, ScriptError};
use super::interpreter::Env;
use crate::cursor::{Cursor, CursorElement};

/// Shared mutable list
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared cursor over values
pub type CursorRef = Rc<RefCell<Cursor<Value>>>;

/// A script value
#[derive(Clone, Debug)]
pub enum Value {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// Double-precision float
    Float(f64),
    /// Immutable string
    Str(Rc<str>),
    /// Mutable list
    List(ListRef),
    /// Immutable tuple
    Tuple(Rc<[Value]>),
    /// Mutable insertion-ordered mapping
    Dict(Rc<RefCell<Dict>>),
    /// Lazy integer range
    Range(Range),
    /// Linked-list cursor
    Cursor(CursorRef),
    /// User-defined function
    Function(Rc<Function>),
    /// Built-in function
    Builtin(Builtin),
    /// Method bound to a receiver
    Method(Rc<BoundMethod>),
    /// Imported module
    Module(Rc<ModuleValue>),
    /// Exception class, e.g. `ValueError`
    ExceptionType(ErrorKind),
    /// Exception instance, e.g. `ValueError("bad")`
    Exception(Rc<ScriptError>),
}

/// Function value: a definition plus the scope it closes over
pub struct Function {
    /// Parsed definition
    pub def: Arc<FunctionDef>,
    /// Default values, one slot per parameter
    pub defaults: Vec<Option<Value>>,
    /// Defining scope
    pub env: Rc<Env>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.def.name).finish()
    }
}

/// `receiver.name` waiting to be called
#[derive(Debug)]
pub struct BoundMethod {
    /// Object the method was looked up on
    pub receiver: Value,
    /// Method name
    pub name: &'static str,
}

/// Built-in module
#[derive(Debug)]
pub struct ModuleValue {
    /// Module name
    pub name: &'static str,
    /// Exported attributes
    pub attrs: Vec<(&'static str, Value)>,
}

impl ModuleValue {
    /// Look up an exported attribute
    #[must_use]
    pub fn get(&self, attr: &str) -> Option<Value> {
        self.attrs
            .iter()
            .find(|(name, _)| *name == attr)
            .map(|(_, value)| value.clone())
    }
}

/// `range(start, stop, step)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    /// First value
    pub start: i64,
    /// Exclusive bound
    pub stop: i64,
    /// Non-zero stride
    pub step: i64,
}

impl Range {
    /// Number of values produced
    #[must_use]
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            i128::from(self.stop) - i128::from(self.start)
        } else {
            i128::from(self.start) - i128::from(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = i128::from(self.step).abs();
        usize::try_from((span + step - 1) / step).unwrap_or(usize::MAX)
    }

    /// Whether the range produces nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`, if in bounds
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let offset = i128::try_from(index).ok()? * i128::from(self.step);
        i64::try_from(i128::from(self.start) + offset).ok()
    }

    /// Whether `value` is one of the produced values
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        let in_span = if self.step > 0 {
            self.start <= value && value < self.stop
        } else {
            self.stop < value && value <= self.start
        };
        in_span && (i128::from(value) - i128::from(self.start)) % i128::from(self.step) == 0
    }
}

/// Insertion-ordered mapping with script equality on keys
#[derive(Clone, Debug, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    /// Empty mapping
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Value stored under `key`
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove and return the value under `key`
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Whether `key` is present
    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Keys in insertion order
    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Values in insertion order
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Entries in insertion order
    #[must_use]
    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn same_entries(&self, other: &Self, depth: usize) -> Option<bool> {
        if self.len() != other.len() {
            return Some(false);
        }
        for (key, value) in &self.entries {
            let Some(theirs) = other.get(key) else {
                return Some(false);
            };
            if !value.eq_at(theirs, depth)? {
                return Some(false);
            }
        }
        Some(true)
    }
}

/// Numeric view used by arithmetic and comparisons
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

/// Result of ordering two values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Order {
    Ordered(Ordering),
    /// Comparable types, but no order (NaN)
    Unordered,
    /// Types that cannot be ordered against each other
    Incomparable,
    /// Nesting went past [`MAX_COMPARE_DEPTH`]
    TooDeep,
}

/// Deepest container nesting that equality and ordering will follow
pub(crate) const MAX_COMPARE_DEPTH: usize = 1000;

pub(crate) fn comparison_too_deep() -> ScriptError {
    ScriptError::new(
        ErrorKind::RecursionError,
        "maximum recursion depth exceeded in comparison",
    )
}

impl Value {
    /// Shared string value
    #[must_use]
    pub fn str(text: &str) -> Self {
        Self::Str(Rc::from(text))
    }

    /// New list owning `items`
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// New tuple
    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(Rc::from(items))
    }

    /// New cursor positioned at the first element
    #[must_use]
    pub fn cursor(items: Vec<Self>) -> Self {
        Self::Cursor(Rc::new(RefCell::new(Cursor::new(items))))
    }

    /// Convert decoded JSON: arrays become lists and objects dicts
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            serde_json::Value::String(s) => Self::str(s),
            serde_json::Value::Array(items) => Self::list(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => {
                let mut dict = Dict::new();
                for (key, value) in map {
                    dict.insert(Self::str(key), Self::from_json(value));
                }
                Self::Dict(Rc::new(RefCell::new(dict)))
            }
        }
    }

    /// Convert a test argument; in linked-list mode a top-level array
    /// becomes a cursor, nested arrays stay lists
    #[must_use]
    pub fn from_argument(value: &serde_json::Value, linked_list_mode: bool) -> Self {
        match value {
            serde_json::Value::Array(items) if linked_list_mode => {
                Self::cursor(items.iter().map(Self::from_json).collect())
            }
            other => Self::from_json(other),
        }
    }

    /// Type name used in messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Range(_) => "range",
            Self::Cursor(_) => "ListPtr",
            Self::Function(_) => "function",
            Self::Builtin(_) => "builtin_function_or_method",
            Self::Method(_) => "method",
            Self::Module(_) => "module",
            Self::ExceptionType(_) => "type",
            Self::Exception(err) => err.kind.name(),
        }
    }

    /// Truth value
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            Self::Range(range) => !range.is_empty(),
            _ => true,
        }
    }

    pub(crate) const fn number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(*b as i64)),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Integer view; bools count as 0 and 1
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(*b as i64),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether the value can be a dict key
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::List(_) | Self::Dict(_) | Self::Cursor(_) => false,
            Self::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => true,
        }
    }

    /// Identity comparison (`is`)
    #[must_use]
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Cursor(a), Self::Cursor(b)) => Rc::ptr_eq(a, b),
            (Self::ExceptionType(a), Self::ExceptionType(b)) => a == b,
            _ => self == other && !matches!(self, Self::Range(_)),
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=` and sorting
    pub(crate) fn order(&self, other: &Self) -> Order {
        self.order_at(other, 0)
    }

    fn order_at(&self, other: &Self, depth: usize) -> Order {
        if depth > MAX_COMPARE_DEPTH {
            return Order::TooDeep;
        }
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Order::Ordered(a.cmp(b)),
            (Self::List(a), Self::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Order::Ordered(Ordering::Equal);
                }
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                order_sequences(&a, &b, depth + 1)
            }
            (Self::Tuple(a), Self::Tuple(b)) => order_sequences(a, b, depth + 1),
            _ => match (self.number(), other.number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => Order::Ordered(a.cmp(&b)),
                (Some(a), Some(b)) => a
                    .to_f64()
                    .partial_cmp(&b.to_f64())
                    .map_or(Order::Unordered, Order::Ordered),
                _ => Order::Incomparable,
            },
        }
    }

    /// Equality for `==`, raising `RecursionError` on runaway nesting
    ///
    /// # Errors
    /// Fails when the containers nest deeper than the comparison limit, which
    /// includes two distinct self-referential lists
    pub fn try_eq(&self, other: &Self) -> Result<bool, ScriptError> {
        self.eq_at(other, 0).ok_or_else(comparison_too_deep)
    }

    /// Structural equality; `None` once nesting passes the limit
    fn eq_at(&self, other: &Self, depth: usize) -> Option<bool> {
        if depth > MAX_COMPARE_DEPTH {
            return None;
        }
        let equal = match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                Rc::ptr_eq(a, b) || sequences_equal(&a.borrow(), &b.borrow(), depth + 1)?
            }
            (Self::Tuple(a), Self::Tuple(b)) => sequences_equal(a, b, depth + 1)?,
            (Self::Dict(a), Self::Dict(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().same_entries(&b.borrow(), depth + 1)?
            }
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Cursor(a), Self::Cursor(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Method(a), Self::Method(b)) => Rc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Rc::ptr_eq(a, b),
            (Self::ExceptionType(a), Self::ExceptionType(b)) => a == b,
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            _ => match (self.number(), other.number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
                (Some(a), Some(b)) => a.to_f64() == b.to_f64(),
                _ => false,
            },
        };
        Some(equal)
    }

    /// Printable form (`str()`)
    #[must_use]
    pub fn to_display(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::Exception(err) => err.message.clone(),
            other => other.repr(),
        }
    }

    /// Source-like form (`repr()`)
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    fn write_repr(&self, out: &mut String, seen: &mut Vec<usize>) {
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => out.push_str(&float_repr(*f)),
            Self::Str(s) => out.push_str(&str_repr(s)),
            Self::List(items) => {
                let id = Rc::as_ptr(items) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(id);
                let items = items.borrow().clone();
                write_items(out, seen, "[", &items, "]");
                seen.pop();
            }
            Self::Tuple(items) => {
                if items.len() == 1 {
                    out.push('(');
                    items[0].write_repr(out, seen);
                    out.push_str(",)");
                } else {
                    write_items(out, seen, "(", items, ")");
                }
            }
            Self::Dict(dict) => {
                let id = Rc::as_ptr(dict) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(id);
                let entries = dict.borrow().entries().to_vec();
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, seen);
                    out.push_str(": ");
                    value.write_repr(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Self::Range(range) => {
                if range.step == 1 {
                    let _ = write!(out, "range({}, {})", range.start, range.stop);
                } else {
                    let _ = write!(out, "range({}, {}, {})", range.start, range.stop, range.step);
                }
            }
            Self::Cursor(cursor) => {
                // A cursor reads like the list it walks.
                let id = Rc::as_ptr(cursor) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(id);
                let items = cursor.borrow().items().to_vec();
                write_items(out, seen, "[", &items, "]");
                seen.pop();
            }
            Self::Function(function) => {
                let _ = write!(out, "<function {}>", function.def.name);
            }
            Self::Builtin(builtin) => {
                let _ = write!(out, "<built-in function {}>", builtin.name());
            }
            Self::Method(method) => {
                let _ = write!(
                    out,
                    "<bound method {}.{}>",
                    method.receiver.type_name(),
                    method.name
                );
            }
            Self::Module(module) => {
                let _ = write!(out, "<module '{}'>", module.name);
            }
            Self::ExceptionType(kind) => {
                let _ = write!(out, "<class '{kind}'>");
            }
            Self::Exception(err) => {
                let _ = write!(out, "{}({})", err.kind, str_repr(&err.message));
            }
        }
    }
}

fn write_items(out: &mut String, seen: &mut Vec<usize>, open: &str, items: &[Value], close: &str) {
    out.push_str(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out, seen);
    }
    out.push_str(close);
}

fn order_sequences(a: &[Value], b: &[Value], depth: usize) -> Order {
    for (x, y) in a.iter().zip(b) {
        match x.eq_at(y, depth) {
            Some(true) => {}
            Some(false) => return x.order_at(y, depth),
            None => return Order::TooDeep,
        }
    }
    Order::Ordered(a.len().cmp(&b.len()))
}

fn sequences_equal(a: &[Value], b: &[Value], depth: usize) -> Option<bool> {
    if a.len() != b.len() {
        return Some(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.eq_at(y, depth)? {
            return Some(false);
        }
    }
    Some(true)
}

impl PartialEq for Value {
    /// Runaway nesting compares unequal; scripts go through [`Value::try_eq`]
    fn eq(&self, other: &Self) -> bool {
        self.eq_at(other, 0).unwrap_or(false)
    }
}

impl CursorElement for Value {
    /// Bools count as the integers 0 and 1
    fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

/// Shortest round-tripping float text, with the exponent rules of `repr`
pub(crate) fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{value:e}");
        let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }
    let text = format!("{value}");
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

/// Quoted string with escapes, preferring single quotes
pub(crate) fn str_repr(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::str("1"));
        assert_ne!(Value::list(vec![Value::Int(1)]), Value::tuple(vec![Value::Int(1)]));
    }

    #[test]
    fn test_container_equality() {
        let a = Value::from_json(&json!({"a": [1, 2], "b": null}));
        let b = Value::from_json(&json!({"b": null, "a": [1, 2.0]}));
        assert_eq!(a, b);
        assert_ne!(a, Value::from_json(&json!({"a": [1, 2]})));
    }

    #[test]
    fn test_repr_matches_script_conventions() {
        let value = Value::from_json(&json!([1, 2.5, "it's", true, null, [1e20]]));
        assert_eq!(value.repr(), "[1, 2.5, \"it's\", True, None, [1e+20]]");
        assert_eq!(Value::Float(3.0).repr(), "3.0");
        assert_eq!(Value::Float(1.5e-5).repr(), "1.5e-05");
        assert_eq!(Value::str("a\nb").repr(), "'a\\nb'");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).repr(), "(1,)");
    }

    #[test]
    fn test_self_referential_list_repr() {
        let list = Rc::new(RefCell::new(vec![Value::Int(1)]));
        list.borrow_mut().push(Value::List(Rc::clone(&list)));
        assert_eq!(Value::List(list).repr(), "[1, [...]]");
    }

    #[test]
    fn test_linked_list_arguments() {
        let arg = Value::from_argument(&json!([1, [2, 3]]), true);
        let Value::Cursor(cursor) = &arg else {
            panic!("expected a cursor");
        };
        assert!(matches!(cursor.borrow().items()[1], Value::List(_)));
        assert_eq!(arg.repr(), "[1, [2, 3]]");
        assert!(matches!(Value::from_argument(&json!([1]), false), Value::List(_)));
        assert!(matches!(Value::from_argument(&json!(5), true), Value::Int(5)));
    }

    #[test]
    fn test_cursor_integer_view() {
        assert_eq!(Value::Bool(true).as_integer(), Some(1));
        assert_eq!(Value::Int(4).as_integer(), Some(4));
        assert_eq!(Value::Float(4.0).as_integer(), None);
    }

    fn self_referential() -> Value {
        let list = Rc::new(RefCell::new(vec![]));
        list.borrow_mut().push(Value::List(Rc::clone(&list)));
        Value::List(list)
    }

    #[test]
    fn test_cyclic_lists_hit_comparison_limit() {
        let (a, b) = (self_referential(), self_referential());
        let err = a.try_eq(&b).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionError);
        assert_ne!(a, b);
        assert_eq!(a.order(&b), Order::TooDeep);
        assert!(a.try_eq(&a).unwrap());
    }

    #[test]
    fn test_deep_but_finite_nesting_compares() {
        let mut a = Value::Int(0);
        let mut b = Value::Int(0);
        for _ in 0..100 {
            a = Value::list(vec![a]);
            b = Value::list(vec![b]);
        }
        assert!(a.try_eq(&b).unwrap());
        assert_eq!(a.order(&b), Order::Ordered(Ordering::Equal));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(Value::Int(1).order(&Value::Float(1.5)), Order::Ordered(Ordering::Less));
        assert_eq!(Value::Float(f64::NAN).order(&Value::Int(1)), Order::Unordered);
        assert_eq!(Value::Int(1).order(&Value::str("a")), Order::Incomparable);
        let a = Value::from_json(&json!([1, 2]));
        let b = Value::from_json(&json!([1, 2, 0]));
        assert_eq!(a.order(&b), Order::Ordered(Ordering::Less));
    }

    #[test]
    fn test_range_helpers() {
        let range = Range { start: 10, stop: 0, step: -3 };
        assert_eq!(range.len(), 4);
        assert_eq!(range.get(3), Some(1));
        assert!(range.contains(4));
        assert!(!range.contains(0));
    }
}
