//! Methods on lists, strings, dicts and cursors.

use std::rc::Rc;

use super::builtins::{arity, no_keywords, sort_values};
use super::error::{ErrorKind, ScriptError};
use super::interpreter::{Eval, Interpreter};
use super::ops::{self, MAX_COLLECTION_LEN};
use super::value::Value;

const LIST_METHODS: &[&str] = &[
    "append", "pop", "insert", "extend", "index", "count", "reverse", "sort", "remove", "copy",
    "clear",
];

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "join", "replace", "startswith",
    "endswith", "find", "count", "isdigit", "isalpha", "index",
];

const DICT_METHODS: &[&str] = &["get", "keys", "values", "items", "pop", "copy", "clear"];

/// Script-visible cursor methods
pub const CURSOR_METHODS: &[&str] = &[
    "go_next", "go_prev", "has_next", "has_prev", "get_value", "set_value",
];

/// Static name of `attr` if `receiver` has such a method
pub(crate) fn lookup(receiver: &Value, attr: &str) -> Option<&'static str> {
    let table = match receiver {
        Value::List(_) => LIST_METHODS,
        Value::Str(_) => STR_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Cursor(_) => CURSOR_METHODS,
        _ => return None,
    };
    table.iter().copied().find(|name| *name == attr)
}

/// Invoke a method previously resolved by [`lookup`]
pub(crate) fn call(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &'static str,
    args: Vec<Value>,
    kwargs: &[(String, Value)],
    line: usize,
) -> Eval<Value> {
    if !(receiver_is_list(receiver) && name == "sort") {
        no_keywords(name, kwargs)?;
    }
    match receiver {
        Value::List(_) => list_method(interp, receiver, name, args, kwargs),
        Value::Str(text) => str_method(interp, text, name, &args),
        Value::Dict(_) => dict_method(receiver, name, &args),
        Value::Cursor(_) => cursor_method(receiver, name, &args, line),
        other => Err(ScriptError::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", other.type_name()),
        )),
    }
}

const fn receiver_is_list(receiver: &Value) -> bool {
    matches!(receiver, Value::List(_))
}

fn not_in_list(name: &str) -> ScriptError {
    ScriptError::value_error(format!("list.{name}(x): x not in list"))
}

fn list_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
    kwargs: &[(String, Value)],
) -> Eval<Value> {
    let Value::List(list) = receiver else {
        return Err(ScriptError::type_error("expected a list"));
    };
    match name {
        "append" => {
            arity(name, &args, 1, 1)?;
            if list.borrow().len() >= MAX_COLLECTION_LEN {
                return Err(ops::too_large());
            }
            list.borrow_mut().extend(args);
            Ok(Value::None)
        }
        "pop" => {
            arity(name, &args, 0, 1)?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(ScriptError::index_error("pop from empty list"));
            }
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let index = match args.first() {
                Some(value) => value.as_int().ok_or_else(|| {
                    ScriptError::type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        value.type_name()
                    ))
                })?,
                None => len - 1,
            };
            let resolved = if index < 0 { index + len } else { index };
            let resolved = usize::try_from(resolved)
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| ScriptError::index_error("pop index out of range"))?;
            Ok(items.remove(resolved))
        }
        "insert" => {
            arity(name, &args, 2, 2)?;
            let mut args = args.into_iter();
            let (Some(position), Some(item)) = (args.next(), args.next()) else {
                return Ok(Value::None);
            };
            let position = position.as_int().ok_or_else(|| {
                ScriptError::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    position.type_name()
                ))
            })?;
            let mut items = list.borrow_mut();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let resolved = if position < 0 {
                (position + len).max(0)
            } else {
                position.min(len)
            };
            items.insert(usize::try_from(resolved).unwrap_or(0), item);
            Ok(Value::None)
        }
        "extend" => {
            arity(name, &args, 1, 1)?;
            let extra = interp.collect(&args[0])?;
            if list.borrow().len() + extra.len() > MAX_COLLECTION_LEN {
                return Err(ops::too_large());
            }
            list.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "index" => {
            arity(name, &args, 1, 1)?;
            let position = list.borrow().iter().position(|v| *v == args[0]);
            position
                .map(|i| Value::Int(i64::try_from(i).unwrap_or(i64::MAX)))
                .ok_or_else(|| {
                    ScriptError::value_error(format!("{} is not in list", args[0].repr()))
                })
        }
        "count" => {
            arity(name, &args, 1, 1)?;
            let count = list.borrow().iter().filter(|v| **v == args[0]).count();
            Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
        }
        "reverse" => {
            arity(name, &args, 0, 0)?;
            list.borrow_mut().reverse();
            Ok(Value::None)
        }
        "sort" => {
            arity(name, &args, 0, 0)?;
            let mut key = None;
            let mut reverse = false;
            for (keyword, value) in kwargs {
                match keyword.as_str() {
                    "key" => key = Some(value.clone()),
                    "reverse" => reverse = value.truthy(),
                    other => {
                        return Err(ScriptError::type_error(format!(
                            "sort() got an unexpected keyword argument '{other}'"
                        )))
                    }
                }
            }
            let items = list.borrow().clone();
            let sorted = sort_values(interp, items, key, reverse)?;
            *list.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "remove" => {
            arity(name, &args, 1, 1)?;
            let position = list.borrow().iter().position(|v| *v == args[0]);
            let index = position.ok_or_else(|| not_in_list(name))?;
            list.borrow_mut().remove(index);
            Ok(Value::None)
        }
        "copy" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::list(list.borrow().clone()))
        }
        "clear" => {
            arity(name, &args, 0, 0)?;
            list.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Err(ScriptError::new(
            ErrorKind::AttributeError,
            format!("'list' object has no attribute '{name}'"),
        )),
    }
}

fn str_arg<'a>(name: &str, value: &'a Value) -> Eval<&'a str> {
    match value {
        Value::Str(text) => Ok(&**text),
        other => Err(ScriptError::type_error(format!(
            "{name}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

/// Character offset of a byte offset
fn char_offset(text: &str, byte: usize) -> i64 {
    i64::try_from(text[..byte].chars().count()).unwrap_or(i64::MAX)
}

fn str_method(interp: &mut Interpreter, text: &Rc<str>, name: &str, args: &[Value]) -> Eval<Value> {
    let strip_chars = |args: &[Value]| -> Eval<Option<Vec<char>>> {
        arity(name, args, 0, 1)?;
        match args.first() {
            None | Some(Value::None) => Ok(None),
            Some(value) => Ok(Some(str_arg(name, value)?.chars().collect())),
        }
    };
    match name {
        "upper" => {
            arity(name, args, 0, 0)?;
            Ok(Value::str(&text.to_uppercase()))
        }
        "lower" => {
            arity(name, args, 0, 0)?;
            Ok(Value::str(&text.to_lowercase()))
        }
        "strip" | "lstrip" | "rstrip" => {
            let chars = strip_chars(args)?;
            let matches = |c: char| chars.as_ref().map_or(c.is_whitespace(), |set| set.contains(&c));
            let stripped = match name {
                "strip" => text.trim_matches(matches),
                "lstrip" => text.trim_start_matches(matches),
                _ => text.trim_end_matches(matches),
            };
            Ok(Value::str(stripped))
        }
        "split" => {
            arity(name, args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => text.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = str_arg(name, sep)?;
                    if sep.is_empty() {
                        return Err(ScriptError::value_error("empty separator"));
                    }
                    text.split(sep).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            arity(name, args, 1, 1)?;
            let items = interp.collect(&args[0])?;
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part.to_string()),
                    other => {
                        return Err(ScriptError::type_error(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )))
                    }
                }
            }
            let joined = parts.join(&**text);
            if joined.len() > MAX_COLLECTION_LEN {
                return Err(ops::too_large());
            }
            Ok(Value::str(&joined))
        }
        "replace" => {
            arity(name, args, 2, 2)?;
            let old = str_arg(name, &args[0])?;
            let new = str_arg(name, &args[1])?;
            let replaced = text.replace(old, new);
            if replaced.len() > MAX_COLLECTION_LEN {
                return Err(ops::too_large());
            }
            Ok(Value::str(&replaced))
        }
        "startswith" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Bool(text.starts_with(str_arg(name, &args[0])?)))
        }
        "endswith" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Bool(text.ends_with(str_arg(name, &args[0])?)))
        }
        "find" => {
            arity(name, args, 1, 1)?;
            let needle = str_arg(name, &args[0])?;
            Ok(Value::Int(text.find(needle).map_or(-1, |b| char_offset(text, b))))
        }
        "index" => {
            arity(name, args, 1, 1)?;
            let needle = str_arg(name, &args[0])?;
            text.find(needle)
                .map(|b| Value::Int(char_offset(text, b)))
                .ok_or_else(|| ScriptError::value_error("substring not found"))
        }
        "count" => {
            arity(name, args, 1, 1)?;
            let needle = str_arg(name, &args[0])?;
            let count = if needle.is_empty() {
                text.chars().count() + 1
            } else {
                text.matches(needle).count()
            };
            Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
        }
        "isdigit" => {
            arity(name, args, 0, 0)?;
            Ok(Value::Bool(!text.is_empty() && text.chars().all(|c| c.is_ascii_digit())))
        }
        "isalpha" => {
            arity(name, args, 0, 0)?;
            Ok(Value::Bool(!text.is_empty() && text.chars().all(char::is_alphabetic)))
        }
        _ => Err(ScriptError::new(
            ErrorKind::AttributeError,
            format!("'str' object has no attribute '{name}'"),
        )),
    }
}

fn dict_method(receiver: &Value, name: &str, args: &[Value]) -> Eval<Value> {
    let Value::Dict(dict) = receiver else {
        return Err(ScriptError::type_error("expected a dict"));
    };
    match name {
        "get" => {
            arity(name, args, 1, 2)?;
            if !args[0].is_hashable() {
                return Err(ops::unhashable(&args[0]));
            }
            let found = dict.borrow().get(&args[0]).cloned();
            Ok(found.or_else(|| args.get(1).cloned()).unwrap_or(Value::None))
        }
        "keys" => {
            arity(name, args, 0, 0)?;
            Ok(Value::list(dict.borrow().keys()))
        }
        "values" => {
            arity(name, args, 0, 0)?;
            Ok(Value::list(dict.borrow().values()))
        }
        "items" => {
            arity(name, args, 0, 0)?;
            let items = dict
                .borrow()
                .entries()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect();
            Ok(Value::list(items))
        }
        "pop" => {
            arity(name, args, 1, 2)?;
            let removed = dict.borrow_mut().remove(&args[0]);
            removed
                .or_else(|| args.get(1).cloned())
                .ok_or_else(|| ScriptError::new(ErrorKind::KeyError, args[0].repr()))
        }
        "copy" => {
            arity(name, args, 0, 0)?;
            let copy = dict.borrow().clone();
            Ok(Value::Dict(Rc::new(std::cell::RefCell::new(copy))))
        }
        "clear" => {
            arity(name, args, 0, 0)?;
            *dict.borrow_mut() = super::value::Dict::new();
            Ok(Value::None)
        }
        _ => Err(ScriptError::new(
            ErrorKind::AttributeError,
            format!("'dict' object has no attribute '{name}'"),
        )),
    }
}

/// Cursor operations; failures carry the line of the calling expression
fn cursor_method(receiver: &Value, name: &str, args: &[Value], line: usize) -> Eval<Value> {
    let Value::Cursor(cursor) = receiver else {
        return Err(ScriptError::type_error("expected a linked list"));
    };
    match name {
        "go_next" => {
            arity(name, args, 0, 0)?;
            cursor.borrow_mut().advance(line)?;
            Ok(Value::None)
        }
        "go_prev" => {
            arity(name, args, 0, 0)?;
            cursor.borrow_mut().retreat(line)?;
            Ok(Value::None)
        }
        "has_next" => {
            arity(name, args, 0, 0)?;
            Ok(Value::Bool(cursor.borrow().has_next()))
        }
        "has_prev" => {
            arity(name, args, 0, 0)?;
            Ok(Value::Bool(cursor.borrow().has_previous()))
        }
        "get_value" => {
            arity(name, args, 0, 0)?;
            let value = cursor.borrow().read(line)?.clone();
            Ok(value)
        }
        "set_value" => {
            arity(name, args, 1, 1)?;
            cursor.borrow_mut().write(args[0].clone(), line)?;
            Ok(Value::None)
        }
        _ => Err(ScriptError::new(
            ErrorKind::AttributeError,
            format!("'ListPtr' object has no attribute '{name}'"),
        )),
    }
}
