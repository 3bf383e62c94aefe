use crate::interp::Host;
use crate::value::{Builtin, Method, Value};
use crate::RuntimeError;

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), RuntimeError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {min}")
    } else if args.len() < min {
        format!("at least {min}")
    } else {
        format!("at most {max}")
    };
    let plural = if min == max && min == 1 || max == 1 && args.len() > max {
        "argument"
    } else {
        "arguments"
    };
    Err(RuntimeError::Type(format!(
        "{name}() takes {expected} {plural} ({} given)",
        args.len()
    )))
}

/// Invoke a callable value.
pub fn call(host: &mut dyn Host, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match callee {
        Value::Builtin(builtin) => call_builtin(host, *builtin, args),
        Value::Method(receiver, method) => call_method(receiver, *method, args),
        other => Err(RuntimeError::Type(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

fn call_builtin(
    host: &mut dyn Host,
    builtin: Builtin,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    match builtin {
        Builtin::Print => {
            let mut line = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            line.push('\n');
            host.write_output(&line)?;
            Ok(Value::None)
        }
        Builtin::Len => {
            arity("len", &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.borrow().len(),
                other => {
                    return Err(RuntimeError::Type(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            i64::try_from(len)
                .map(Value::Int)
                .map_err(|_| RuntimeError::Overflow)
        }
        Builtin::Str => {
            arity("str", &args, 0, 1)?;
            Ok(Value::str(
                args.first().map(ToString::to_string).unwrap_or_default(),
            ))
        }
        Builtin::Repr => {
            arity("repr", &args, 1, 1)?;
            Ok(Value::str(args[0].repr()))
        }
        Builtin::Int => {
            arity("int", &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Int(0)),
                Some(Value::Int(n)) => Ok(Value::Int(*n)),
                Some(Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
                Some(Value::Str(s)) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    RuntimeError::Value(format!(
                        "invalid literal for int() with base 10: {}",
                        Value::Str(s.clone()).repr()
                    ))
                }),
                Some(other) => Err(RuntimeError::Type(format!(
                    "int() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))),
            }
        }
        Builtin::SysExit => {
            arity("exit", &args, 0, 1)?;
            match args.first() {
                None | Some(Value::None) => Err(RuntimeError::Exit(0)),
                // Process statuses are a single byte.
                Some(Value::Int(n)) => Err(RuntimeError::Exit(n.rem_euclid(256) as i32)),
                Some(Value::Bool(b)) => Err(RuntimeError::Exit(i32::from(*b))),
                Some(message) => {
                    host.write_error(&format!("{message}\n"))?;
                    Err(RuntimeError::Exit(1))
                }
            }
        }
    }
}

fn expect_str(method: Method, value: &Value) -> Result<String, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(RuntimeError::Type(format!(
            "{}() argument must be str, not {}",
            method.name(),
            other.type_name()
        ))),
    }
}

fn call_method(receiver: &Value, method: Method, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let name = method.name();
    match (receiver, method) {
        (Value::List(items), Method::Append) => {
            arity(name, &args, 1, 1)?;
            let mut args = args;
            items.borrow_mut().extend(args.pop());
            Ok(Value::None)
        }
        (Value::Str(sep), Method::Join) => {
            arity(name, &args, 1, 1)?;
            let Value::List(items) = &args[0] else {
                return Err(RuntimeError::Type(format!(
                    "can only join a list, not '{}'",
                    args[0].type_name()
                )));
            };
            let mut parts = Vec::new();
            for (i, item) in items.borrow().iter().enumerate() {
                match item {
                    Value::Str(s) => parts.push(s.to_string()),
                    other => {
                        return Err(RuntimeError::Type(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Value::str(parts.join(&**sep)))
        }
        (Value::Str(s), Method::Upper) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        (Value::Str(s), Method::Lower) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        (Value::Str(s), Method::Strip) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::str(s.trim()))
        }
        (Value::Str(s), Method::Split) => {
            arity(name, &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = expect_str(method, sep)?;
                    if sep.is_empty() {
                        return Err(RuntimeError::Value("empty separator".to_owned()));
                    }
                    s.split(sep.as_str()).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        (Value::Str(s), Method::StartsWith) => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(&expect_str(method, &args[0])?)))
        }
        (Value::Str(s), Method::EndsWith) => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(&expect_str(method, &args[0])?)))
        }
        (other, method) => Err(RuntimeError::Attribute(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            method.name()
        ))),
    }
}
