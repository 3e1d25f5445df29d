//! Arithmetic, comparison and membership operators.

use std::cmp::Ordering;
use std::rc::Rc;

use super::ast::{BinOp, CmpOp};
use super::error::{ErrorKind, ScriptError};
use super::value::{comparison_too_deep, Number, Order, Value};

/// Largest string or list an operation may build
pub(crate) const MAX_COLLECTION_LEN: usize = 10_000_000;

type Eval<T> = Result<T, ScriptError>;

fn overflow() -> ScriptError {
    ScriptError::new(ErrorKind::OverflowError, "integer result too large")
}

fn zero_division(message: &str) -> ScriptError {
    ScriptError::new(ErrorKind::ZeroDivisionError, message)
}

pub(crate) fn too_large() -> ScriptError {
    ScriptError::new(ErrorKind::MemoryError, "result is too large")
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> ScriptError {
    ScriptError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

/// Apply a binary operator, producing a new value
pub(crate) fn binary(op: BinOp, left: &Value, right: &Value) -> Eval<Value> {
    if let (Some(a), Some(b)) = (left.number(), right.number()) {
        return arithmetic(op, a, b);
    }
    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            if a.len() + b.len() > MAX_COLLECTION_LEN {
                return Err(too_large());
            }
            Ok(Value::Str(Rc::from(format!("{a}{b}"))))
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            if items.len() > MAX_COLLECTION_LEN {
                return Err(too_large());
            }
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(s), count) | (BinOp::Mul, count, Value::Str(s)) => {
            let Some(times) = count.as_int() else {
                return Err(unsupported(op, left, right));
            };
            let times = repeat_count(times, s.len())?;
            Ok(Value::Str(Rc::from(s.repeat(times))))
        }
        (BinOp::Mul, Value::List(items), count) | (BinOp::Mul, count, Value::List(items)) => {
            let Some(times) = count.as_int() else {
                return Err(unsupported(op, left, right));
            };
            let items = items.borrow().clone();
            let times = repeat_count(times, items.len())?;
            Ok(Value::list(repeated(&items, times)))
        }
        (BinOp::Mul, Value::Tuple(items), count) | (BinOp::Mul, count, Value::Tuple(items)) => {
            let Some(times) = count.as_int() else {
                return Err(unsupported(op, left, right));
            };
            let times = repeat_count(times, items.len())?;
            Ok(Value::tuple(repeated(items, times)))
        }
        (BinOp::Mod, Value::Str(_), _) => Err(ScriptError::type_error(
            "string formatting with '%' is not supported",
        )),
        _ => Err(unsupported(op, left, right)),
    }
}

/// `items` concatenated `times` times
pub(crate) fn repeated(items: &[Value], times: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    out
}

/// Validated repeat count for sequence repetition
pub(crate) fn repeat_count(times: i64, unit: usize) -> Eval<usize> {
    let times = usize::try_from(times).unwrap_or(0);
    if unit.saturating_mul(times) > MAX_COLLECTION_LEN {
        return Err(too_large());
    }
    Ok(times)
}

fn arithmetic(op: BinOp, a: Number, b: Number) -> Eval<Value> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => integer_arithmetic(op, x, y),
        _ => float_arithmetic(op, a.to_f64(), b.to_f64()),
    }
}

fn integer_arithmetic(op: BinOp, x: i64, y: i64) -> Eval<Value> {
    let value = match op {
        BinOp::Add => x.checked_add(y).ok_or_else(overflow)?,
        BinOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
        BinOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
        BinOp::Div => {
            if y == 0 {
                return Err(zero_division("division by zero"));
            }
            return Ok(Value::Float(x as f64 / y as f64));
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let quotient = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                quotient - 1
            } else {
                quotient
            }
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let remainder = x.checked_rem(y).unwrap_or(0);
            if remainder != 0 && ((remainder < 0) != (y < 0)) {
                remainder + y
            } else {
                remainder
            }
        }
        BinOp::Pow => {
            if y < 0 {
                return float_arithmetic(op, x as f64, y as f64);
            }
            let exponent = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exponent).ok_or_else(overflow)?
        }
    };
    Ok(Value::Int(value))
}

fn float_arithmetic(op: BinOp, x: f64, y: f64) -> Eval<Value> {
    let value = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let remainder = x % y;
            if remainder != 0.0 && ((remainder < 0.0) != (y < 0.0)) {
                remainder + y
            } else {
                remainder
            }
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power"));
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(ScriptError::value_error("math domain error"));
            }
            let value = x.powf(y);
            if value.is_infinite() && x.is_finite() && y.is_finite() {
                return Err(ScriptError::new(
                    ErrorKind::OverflowError,
                    "numerical result out of range",
                ));
            }
            value
        }
    };
    Ok(Value::Float(value))
}

/// `-value`
pub(crate) fn negate(value: &Value) -> Eval<Value> {
    match value.number() {
        Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(ScriptError::type_error(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

/// `+value`
pub(crate) fn positive(value: &Value) -> Eval<Value> {
    match value.number() {
        Some(Number::Int(i)) => Ok(Value::Int(i)),
        Some(Number::Float(f)) => Ok(Value::Float(f)),
        None => Err(ScriptError::type_error(format!(
            "bad operand type for unary +: '{}'",
            value.type_name()
        ))),
    }
}

/// Evaluate one comparison link
pub(crate) fn compare(op: CmpOp, left: &Value, right: &Value) -> Eval<bool> {
    let wanted: fn(Ordering) -> bool = match op {
        CmpOp::Eq => return left.try_eq(right),
        CmpOp::NotEq => return left.try_eq(right).map(|equal| !equal),
        CmpOp::Is => return Ok(left.identical(right)),
        CmpOp::IsNot => return Ok(!left.identical(right)),
        CmpOp::In => return contains(right, left),
        CmpOp::NotIn => return contains(right, left).map(|found| !found),
        CmpOp::Lt => Ordering::is_lt,
        CmpOp::LtE => Ordering::is_le,
        CmpOp::Gt => Ordering::is_gt,
        CmpOp::GtE => Ordering::is_ge,
    };
    match left.order(right) {
        Order::Ordered(ordering) => Ok(wanted(ordering)),
        Order::Unordered => Ok(false),
        Order::TooDeep => Err(comparison_too_deep()),
        Order::Incomparable => Err(ScriptError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// `item in container`
pub(crate) fn contains(container: &Value, item: &Value) -> Eval<bool> {
    match container {
        Value::List(items) => any_equal(&items.borrow(), item),
        Value::Tuple(items) => any_equal(items, item),
        Value::Str(text) => match item {
            Value::Str(needle) => Ok(text.contains(&**needle)),
            other => Err(ScriptError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(dict) => {
            if !item.is_hashable() {
                return Err(unhashable(item));
            }
            Ok(dict.borrow().contains_key(item))
        }
        Value::Range(range) => Ok(match item {
            Value::Float(f) if f.fract() == 0.0 => range.contains(*f as i64),
            other => other.as_int().is_some_and(|i| range.contains(i)),
        }),
        other => Err(ScriptError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn any_equal(items: &[Value], item: &Value) -> Eval<bool> {
    for candidate in items {
        if candidate.try_eq(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn unhashable(value: &Value) -> ScriptError {
    ScriptError::type_error(format!("unhashable type: '{}'", value.type_name()))
}
