//! Operator semantics: arithmetic, comparison and subscription.

use crate::ast::{BinOp, CmpOp};
use crate::value::Value;
use crate::RuntimeError;

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
    }
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol(op),
        left.type_name(),
        right.type_name()
    ))
}

/// Upper bound on the length of a repeated string (bytes) or list (items).
pub const MAX_REPEAT_LEN: usize = 1 << 28;

/// Effective repeat count for a sequence of `len` elements, or `MemoryError`
/// when the result would exceed [`MAX_REPEAT_LEN`]. Non-positive counts and
/// empty sequences give zero.
fn repeat_len(len: usize, count: i64) -> Result<usize, RuntimeError> {
    let count = usize::try_from(count).unwrap_or(0);
    len.checked_mul(count)
        .filter(|total| *total <= MAX_REPEAT_LEN)
        .map(|total| if total == 0 { 0 } else { count })
        .ok_or_else(|| {
            RuntimeError::Memory(format!(
                "repeated sequence would exceed {MAX_REPEAT_LEN} elements"
            ))
        })
}

fn repeat<T: Clone>(items: &[T], count: i64) -> Result<Vec<T>, RuntimeError> {
    let count = repeat_len(items.len(), count)?;
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    Ok(out)
}

pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if let (Some(a), Some(b)) = (as_int(left), as_int(right)) {
        return int_binary(op, a, b).map(Value::Int);
    }
    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if as_int(n).is_some() => {
            let count = repeat_len(s.len(), as_int(n).unwrap_or(0))?;
            Ok(Value::str(s.repeat(count)))
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items))
            if as_int(n).is_some() =>
        {
            Ok(Value::list(repeat(&items.borrow(), as_int(n).unwrap_or(0))?))
        }
        _ => Err(unsupported(op, left, right)),
    }
}

fn int_binary(op: BinOp, a: i64, b: i64) -> Result<i64, RuntimeError> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(RuntimeError::ZeroDivision);
            }
            a.checked_div(b).map(|q| {
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::ZeroDivision);
            }
            a.checked_rem(b).map(|r| {
                if r != 0 && ((r < 0) != (b < 0)) {
                    r + b
                } else {
                    r
                }
            })
        }
    };
    result.ok_or(RuntimeError::Overflow)
}

pub fn negate(value: &Value) -> Result<Value, RuntimeError> {
    match as_int(value) {
        Some(n) => n.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow),
        None => Err(RuntimeError::Type(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

pub fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    use std::cmp::Ordering;

    let ordering = |symbol: &str| -> Result<Ordering, RuntimeError> {
        if let (Some(a), Some(b)) = (as_int(left), as_int(right)) {
            return Ok(a.cmp(&b));
        }
        match (left, right) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => Err(RuntimeError::Type(format!(
                "'{symbol}' not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))),
        }
    };

    Ok(match op {
        CmpOp::Eq => left == right,
        CmpOp::NotEq => left != right,
        CmpOp::Lt => ordering("<")? == Ordering::Less,
        CmpOp::LtEq => ordering("<=")? != Ordering::Greater,
        CmpOp::Gt => ordering(">")? == Ordering::Greater,
        CmpOp::GtEq => ordering(">=")? != Ordering::Less,
        CmpOp::In => contains(right, left)?,
        CmpOp::NotIn => !contains(right, left)?,
    })
}

fn contains(container: &Value, item: &Value) -> Result<bool, RuntimeError> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(&**needle)),
        (Value::Str(_), other) => Err(RuntimeError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::List(items), _) => Ok(items.borrow().iter().any(|v| v == item)),
        (other, _) => Err(RuntimeError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

pub fn subscript(container: &Value, index: &Value) -> Result<Value, RuntimeError> {
    let position = |kind: &str| {
        as_int(index).ok_or_else(|| {
            RuntimeError::Type(format!(
                "{kind} indices must be integers, not {}",
                index.type_name()
            ))
        })
    };
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let i = position("list")?;
            normalize_index(i, items.len())
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| RuntimeError::Index("list index out of range".to_owned()))
        }
        Value::Str(s) => {
            let i = position("string")?;
            let count = s.chars().count();
            normalize_index(i, count)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::str(c.to_string()))
                .ok_or_else(|| RuntimeError::Index("string index out of range".to_owned()))
        }
        other => Err(RuntimeError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}
