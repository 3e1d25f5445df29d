//! Built-in functions and the `math` module.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use super::ast::{BinOp, CmpOp};
use super::error::{ErrorKind, ScriptError};
use super::interpreter::{Eval, Interpreter};
use super::ops;
use super::value::{comparison_too_deep, Dict, ModuleValue, Number, Order, Range, Value};

/// Built-in functions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Range,
    Abs,
    Min,
    Max,
    Sum,
    Sorted,
    Reversed,
    List,
    Tuple,
    Dict,
    Str,
    Int,
    Float,
    Bool,
    Repr,
    Enumerate,
    Zip,
    All,
    Any,
    Round,
    Chr,
    Ord,
    /// `math.sqrt`
    Sqrt,
    /// `math.floor`
    Floor,
    /// `math.ceil`
    Ceil,
}

/// Functions visible without an import
const GLOBAL: [Builtin; 24] = [
    Builtin::Print,
    Builtin::Len,
    Builtin::Range,
    Builtin::Abs,
    Builtin::Min,
    Builtin::Max,
    Builtin::Sum,
    Builtin::Sorted,
    Builtin::Reversed,
    Builtin::List,
    Builtin::Tuple,
    Builtin::Dict,
    Builtin::Str,
    Builtin::Int,
    Builtin::Float,
    Builtin::Bool,
    Builtin::Repr,
    Builtin::Enumerate,
    Builtin::Zip,
    Builtin::All,
    Builtin::Any,
    Builtin::Round,
    Builtin::Chr,
    Builtin::Ord,
];

impl Builtin {
    /// Name the function is called by
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Len => "len",
            Self::Range => "range",
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Sorted => "sorted",
            Self::Reversed => "reversed",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Dict => "dict",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Repr => "repr",
            Self::Enumerate => "enumerate",
            Self::Zip => "zip",
            Self::All => "all",
            Self::Any => "any",
            Self::Round => "round",
            Self::Chr => "chr",
            Self::Ord => "ord",
            Self::Sqrt => "sqrt",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
        }
    }
}

/// Resolve a name that is not bound in any scope
pub(crate) fn lookup(name: &str) -> Option<Value> {
    if let Some(builtin) = GLOBAL.into_iter().find(|b| b.name() == name) {
        return Some(Value::Builtin(builtin));
    }
    if name == "ModuleNotFoundError" {
        return Some(Value::ExceptionType(ErrorKind::ImportError));
    }
    ErrorKind::from_name(name).map(Value::ExceptionType)
}

/// The importable `math` module
pub(crate) fn math_module() -> ModuleValue {
    ModuleValue {
        name: "math",
        attrs: vec![
            ("sqrt", Value::Builtin(Builtin::Sqrt)),
            ("floor", Value::Builtin(Builtin::Floor)),
            ("ceil", Value::Builtin(Builtin::Ceil)),
            ("pi", Value::Float(std::f64::consts::PI)),
            ("e", Value::Float(std::f64::consts::E)),
            ("inf", Value::Float(f64::INFINITY)),
        ],
    }
}

pub(crate) fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Eval<()> {
    let given = args.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let (bound, expected) = if min == max {
        ("exactly", min)
    } else if given < min {
        ("at least", min)
    } else {
        ("at most", max)
    };
    Err(ScriptError::type_error(format!(
        "{name}() takes {bound} {expected} argument{} ({given} given)",
        if expected == 1 { "" } else { "s" }
    )))
}

pub(crate) fn no_keywords(name: &str, kwargs: &[(String, Value)]) -> Eval<()> {
    match kwargs.first() {
        None => Ok(()),
        Some((key, _)) => Err(ScriptError::type_error(format!(
            "{name}() got an unexpected keyword argument '{key}'"
        ))),
    }
}

/// Remove the given keywords, rejecting anything else
fn keywords<const N: usize>(
    name: &str,
    kwargs: Vec<(String, Value)>,
    accepted: [&str; N],
) -> Eval<[Option<Value>; N]> {
    let mut found: [Option<Value>; N] = std::array::from_fn(|_| None);
    for (key, value) in kwargs {
        let Some(slot) = accepted.iter().position(|a| *a == key) else {
            return Err(ScriptError::type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        };
        found[slot] = Some(value);
    }
    Ok(found)
}

fn integer_arg(value: &Value) -> Eval<i64> {
    value.as_int().ok_or_else(|| {
        ScriptError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

pub(crate) fn float_to_int(value: f64) -> Eval<i64> {
    if value.is_nan() {
        return Err(ScriptError::value_error("cannot convert float NaN to integer"));
    }
    if value.is_infinite() {
        return Err(ScriptError::new(
            ErrorKind::OverflowError,
            "cannot convert float infinity to integer",
        ));
    }
    let truncated = value.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(ScriptError::new(
            ErrorKind::OverflowError,
            "integer result too large",
        ));
    }
    Ok(truncated as i64)
}

/// Stable sort with an optional key function
pub(crate) fn sort_values(
    interp: &mut Interpreter,
    items: Vec<Value>,
    key: Option<Value>,
    reverse: bool,
) -> Eval<Vec<Value>> {
    let keys = match key {
        Some(key) if !matches!(key, Value::None) => items
            .iter()
            .map(|item| interp.call_value(&key, vec![item.clone()], Vec::new(), 0))
            .collect::<Eval<Vec<_>>>()?,
        _ => items.clone(),
    };
    let mut failure = None;
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        let ordering = match keys[a].order(&keys[b]) {
            Order::Ordered(ordering) => ordering,
            Order::Unordered => Ordering::Equal,
            Order::TooDeep => {
                failure.get_or_insert_with(comparison_too_deep);
                Ordering::Equal
            }
            Order::Incomparable => {
                failure.get_or_insert_with(|| {
                    ScriptError::type_error(format!(
                        "'<' not supported between instances of '{}' and '{}'",
                        keys[a].type_name(),
                        keys[b].type_name()
                    ))
                });
                Ordering::Equal
            }
        };
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    Ok(order.into_iter().map(|i| items[i].clone()).collect())
}

/// Invoke a built-in
pub(crate) fn call(
    interp: &mut Interpreter,
    builtin: Builtin,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Eval<Value> {
    let name = builtin.name();
    match builtin {
        Builtin::Print => {
            let [sep, end] = keywords(name, kwargs, ["sep", "end"])?;
            let text_or = |value: Option<Value>, default: &str| match value {
                None | Some(Value::None) => Ok(default.to_string()),
                Some(Value::Str(s)) => Ok(s.to_string()),
                Some(other) => Err(ScriptError::type_error(format!(
                    "sep and end must be None or a string, not {}",
                    other.type_name()
                ))),
            };
            let sep = text_or(sep, " ")?;
            let end = text_or(end, "\n")?;
            let text = args
                .iter()
                .map(Value::to_display)
                .collect::<Vec<_>>()
                .join(&sep);
            interp.write_output(&text);
            interp.write_output(&end);
            Ok(Value::None)
        }
        Builtin::Len => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.borrow().len(),
                Value::Tuple(items) => items.len(),
                Value::Dict(dict) => dict.borrow().len(),
                Value::Range(range) => range.len(),
                other => {
                    return Err(ScriptError::type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
        }
        Builtin::Range => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 3)?;
            let ints = args.iter().map(integer_arg).collect::<Eval<Vec<_>>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step, ..] => (*start, *stop, *step),
                [] => (0, 0, 1),
            };
            if step == 0 {
                return Err(ScriptError::value_error("range() arg 3 must not be zero"));
            }
            Ok(Value::Range(Range { start, stop, step }))
        }
        Builtin::Abs => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            match args[0].number() {
                Some(Number::Int(i)) => i.checked_abs().map(Value::Int).ok_or_else(|| {
                    ScriptError::new(ErrorKind::OverflowError, "integer result too large")
                }),
                Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
                None => Err(ScriptError::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    args[0].type_name()
                ))),
            }
        }
        Builtin::Min => extreme(interp, name, args, kwargs, CmpOp::Lt),
        Builtin::Max => extreme(interp, name, args, kwargs, CmpOp::Gt),
        Builtin::Sum => {
            let [start] = keywords(name, kwargs, ["start"])?;
            arity(name, &args, 1, 2)?;
            let mut total = args.get(1).cloned().or(start).unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(ScriptError::type_error(
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            for item in interp.collect(&args[0])? {
                total = ops::binary(BinOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::Sorted => {
            let [key, reverse] = keywords(name, kwargs, ["key", "reverse"])?;
            arity(name, &args, 1, 1)?;
            let items = interp.collect(&args[0])?;
            let reverse = reverse.is_some_and(|r| r.truthy());
            Ok(Value::list(sort_values(interp, items, key, reverse)?))
        }
        Builtin::Reversed => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            if matches!(args[0], Value::Dict(_)) {
                return Err(ScriptError::type_error("'dict' object is not reversible"));
            }
            let mut items = interp.collect(&args[0])?;
            items.reverse();
            Ok(Value::list(items))
        }
        Builtin::List => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 0, 1)?;
            match args.first() {
                Some(source) => Ok(Value::list(interp.collect(source)?)),
                None => Ok(Value::list(Vec::new())),
            }
        }
        Builtin::Tuple => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 0, 1)?;
            match args.first() {
                Some(source) => Ok(Value::tuple(interp.collect(source)?)),
                None => Ok(Value::tuple(Vec::new())),
            }
        }
        Builtin::Dict => {
            arity(name, &args, 0, 1)?;
            let mut dict = Dict::new();
            match args.first() {
                Some(Value::Dict(source)) => {
                    for (key, value) in source.borrow().entries() {
                        dict.insert(key.clone(), value.clone());
                    }
                }
                Some(source) => {
                    for (i, pair) in interp.collect(source)?.into_iter().enumerate() {
                        let items = interp.collect(&pair)?;
                        let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
                            ScriptError::value_error(format!(
                                "dictionary update sequence element #{i} has length {}; 2 is required",
                                items.len()
                            ))
                        })?;
                        if !key.is_hashable() {
                            return Err(ops::unhashable(&key));
                        }
                        dict.insert(key, value);
                    }
                }
                None => {}
            }
            for (key, value) in kwargs {
                dict.insert(Value::str(&key), value);
            }
            Ok(Value::Dict(Rc::new(RefCell::new(dict))))
        }
        Builtin::Str => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 0, 1)?;
            Ok(Value::str(
                &args.first().map(Value::to_display).unwrap_or_default(),
            ))
        }
        Builtin::Int => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 0, 2)?;
            to_int(&args)
        }
        Builtin::Float => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 0, 1)?;
            let Some(value) = args.first() else {
                return Ok(Value::Float(0.0));
            };
            match value {
                Value::Str(text) => text
                    .trim()
                    .replace('_', "")
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| {
                        ScriptError::value_error(format!(
                            "could not convert string to float: {}",
                            value.repr()
                        ))
                    }),
                other => other.number().map(|n| Value::Float(n.to_f64())).ok_or_else(|| {
                    ScriptError::type_error(format!(
                        "float() argument must be a string or a real number, not '{}'",
                        other.type_name()
                    ))
                }),
            }
        }
        Builtin::Bool => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        }
        Builtin::Repr => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            Ok(Value::str(&args[0].repr()))
        }
        Builtin::Enumerate => {
            let [start_kw] = keywords(name, kwargs, ["start"])?;
            arity(name, &args, 1, 2)?;
            let start = match args.get(1).or(start_kw.as_ref()) {
                Some(value) => integer_arg(value)?,
                None => 0,
            };
            let items = interp.collect(&args[0])?;
            let mut out = Vec::with_capacity(items.len());
            for (offset, item) in (0_i64..).zip(items) {
                let index = start.checked_add(offset).ok_or_else(|| {
                    ScriptError::new(ErrorKind::OverflowError, "integer result too large")
                })?;
                out.push(Value::tuple(vec![Value::Int(index), item]));
            }
            Ok(Value::list(out))
        }
        Builtin::Zip => {
            no_keywords(name, &kwargs)?;
            let columns = args
                .iter()
                .map(|arg| interp.collect(arg))
                .collect::<Eval<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::list(
                (0..rows)
                    .map(|row| Value::tuple(columns.iter().map(|c| c[row].clone()).collect()))
                    .collect(),
            ))
        }
        Builtin::All | Builtin::Any => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            let items = interp.collect(&args[0])?;
            Ok(Value::Bool(if builtin == Builtin::All {
                items.iter().all(Value::truthy)
            } else {
                items.iter().any(Value::truthy)
            }))
        }
        Builtin::Round => {
            let [ndigits_kw] = keywords(name, kwargs, ["ndigits"])?;
            arity(name, &args, 1, 2)?;
            let ndigits = match args.get(1).or(ndigits_kw.as_ref()) {
                None | Some(Value::None) => None,
                Some(value) => Some(integer_arg(value)?),
            };
            round(&args[0], ndigits)
        }
        Builtin::Chr => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            let code = integer_arg(&args[0])?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
                .ok_or_else(|| ScriptError::value_error("chr() arg not in range(0x110000)"))
        }
        Builtin::Ord => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            let Value::Str(text) = &args[0] else {
                return Err(ScriptError::type_error(format!(
                    "ord() expected string of length 1, but {} found",
                    args[0].type_name()
                )));
            };
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
                _ => Err(ScriptError::type_error(format!(
                    "ord() expected a character, but string of length {} found",
                    text.chars().count()
                ))),
            }
        }
        Builtin::Sqrt => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            let x = real(&args[0])?;
            if x < 0.0 {
                return Err(ScriptError::value_error("math domain error"));
            }
            Ok(Value::Float(x.sqrt()))
        }
        Builtin::Floor | Builtin::Ceil => {
            no_keywords(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            if let Some(i) = args[0].as_int() {
                return Ok(Value::Int(i));
            }
            let x = real(&args[0])?;
            let rounded = if builtin == Builtin::Floor {
                x.floor()
            } else {
                x.ceil()
            };
            float_to_int(rounded).map(Value::Int)
        }
    }
}

fn real(value: &Value) -> Eval<f64> {
    value.number().map(Number::to_f64).ok_or_else(|| {
        ScriptError::type_error(format!(
            "must be real number, not {}",
            value.type_name()
        ))
    })
}

fn extreme(
    interp: &mut Interpreter,
    name: &str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    better: CmpOp,
) -> Eval<Value> {
    let [key, default] = keywords(name, kwargs, ["key", "default"])?;
    arity(name, &args, 1, usize::MAX)?;
    let candidates = if args.len() == 1 {
        interp.collect(&args[0])?
    } else {
        args
    };

    let mut best: Option<(Value, Value)> = None;
    for item in candidates {
        let rank = match &key {
            Some(key) if !matches!(key, Value::None) => {
                interp.call_value(key, vec![item.clone()], Vec::new(), 0)?
            }
            _ => item.clone(),
        };
        let replace = match &best {
            None => true,
            Some((best_rank, _)) => ops::compare(better, &rank, best_rank)?,
        };
        if replace {
            best = Some((rank, item));
        }
    }
    match best {
        Some((_, item)) => Ok(item),
        None => default.ok_or_else(|| {
            ScriptError::value_error(format!("{name}() arg is an empty sequence"))
        }),
    }
}

fn to_int(args: &[Value]) -> Eval<Value> {
    let Some(value) = args.first() else {
        return Ok(Value::Int(0));
    };
    if let Some(base) = args.get(1) {
        let base = integer_arg(base)?;
        let Value::Str(text) = value else {
            return Err(ScriptError::type_error(
                "int() can't convert non-string with explicit base",
            ));
        };
        let radix = u32::try_from(base)
            .ok()
            .filter(|b| (2..=36).contains(b))
            .ok_or_else(|| ScriptError::value_error("int() base must be >= 2 and <= 36, or 0"))?;
        return i64::from_str_radix(&text.trim().replace('_', ""), radix)
            .map(Value::Int)
            .map_err(|_| {
                ScriptError::value_error(format!(
                    "invalid literal for int() with base {base}: {}",
                    value.repr()
                ))
            });
    }
    match value {
        Value::Str(text) => text
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                ScriptError::value_error(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            }),
        Value::Float(f) => float_to_int(*f).map(Value::Int),
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            ScriptError::type_error(format!(
                "int() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn round(value: &Value, ndigits: Option<i64>) -> Eval<Value> {
    match (value.number(), ndigits) {
        (Some(Number::Int(i)), _) => Ok(Value::Int(i)),
        (Some(Number::Float(f)), None) => float_to_int(f.round_ties_even()).map(Value::Int),
        (Some(Number::Float(f)), Some(digits)) => {
            let digits = i32::try_from(digits.clamp(-308, 308)).unwrap_or(0);
            let scale = 10_f64.powi(digits);
            let scaled = f * scale;
            if !scaled.is_finite() {
                return Ok(Value::Float(f));
            }
            Ok(Value::Float(scaled.round_ties_even() / scale))
        }
        (None, _) => Err(ScriptError::type_error(format!(
            "type {} doesn't define __round__ method",
            value.type_name()
        ))),
    }
}
