//! Tree-walking evaluator.
//!
//! Evaluation is pure: the only inputs are the expression and the argument list, and
//! nothing outside the returned value is produced. Integer arithmetic is performed on
//! `i64` with overflow checks; as soon as one operand is a float the operation is done in
//! `f64`.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use std::cmp::Ordering;

use crate::{
    expr::parser::{BinaryOp, Builtin, CompareOp, Expr, LogicalOp, UnaryOp},
    value::Value,
    Error, Result,
};

fn fault(message: impl Into<String>) -> Error {
    Error::Evaluation(message.into())
}

/// Evaluates `expr` with `args` bound as the call arguments.
pub(crate) fn evaluate(expr: &Expr, args: &[Value]) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Arg(index) => args.get(*index).cloned().ok_or_else(|| {
            fault(format!(
                "argument arg{index} is out of range (argc = {})",
                args.len()
            ))
        }),
        Expr::Args => Ok(Value::List(args.to_vec())),
        Expr::ArgCount => Ok(Value::Long(args.len() as i64)),
        Expr::Unary(op, operand) => unary(*op, &evaluate(operand, args)?),
        Expr::Binary(op, lhs, rhs) => {
            binary(*op, &evaluate(lhs, args)?, &evaluate(rhs, args)?)
        }
        Expr::Compare(op, lhs, rhs) => {
            compare(*op, &evaluate(lhs, args)?, &evaluate(rhs, args)?).map(Value::Bool)
        }
        Expr::Logical(op, lhs, rhs) => {
            let lhs = truth(&evaluate(lhs, args)?)?;
            let short_circuit = match op {
                LogicalOp::And => !lhs,
                LogicalOp::Or => lhs,
            };
            if short_circuit {
                return Ok(Value::Bool(lhs));
            }
            truth(&evaluate(rhs, args)?).map(Value::Bool)
        }
        Expr::Index(base, index) => index_value(&evaluate(base, args)?, &evaluate(index, args)?),
        Expr::Field(base, name) => field_value(&evaluate(base, args)?, name),
        Expr::Call(builtin, call_args) => {
            let values = call_args
                .iter()
                .map(|arg| evaluate(arg, args))
                .collect::<Result<Vec<_>>>()?;
            call(*builtin, &values)
        }
    }
}

fn truth(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| fault(format!("expected boolean, found {}", value.type_name())))
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match op {
        UnaryOp::Not => truth(value).map(|b| Value::Bool(!b)),
        UnaryOp::Neg => {
            if let Some(v) = value.as_i64() {
                v.checked_neg()
                    .map(Value::Long)
                    .ok_or_else(|| fault("integer overflow in negation"))
            } else if let Some(v) = value.as_f64() {
                Ok(Value::Double(-v))
            } else {
                Err(fault(format!("cannot negate {}", value.type_name())))
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    if op == BinaryOp::Add && (matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_))) {
        return Ok(Value::from(format!("{lhs}{rhs}")));
    }

    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(fault("division by zero"));
                }
                a.checked_div(b)
            }
            BinaryOp::Rem => {
                if b == 0 {
                    return Err(fault("division by zero"));
                }
                a.checked_rem(b)
            }
        };
        return result
            .map(Value::Long)
            .ok_or_else(|| fault(format!("integer overflow in {a} {op} {b}")));
    }

    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        return Ok(Value::Double(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
        }));
    }

    Err(fault(format!(
        "operator '{op}' is not defined for {} and {}",
        lhs.type_name(),
        rhs.type_name()
    )))
}

/// Equality with numeric values compared by magnitude across widths.
pub(crate) fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        return a == b;
    }
    if lhs.is_numeric() && rhs.is_numeric() {
        return lhs.as_f64() == rhs.as_f64();
    }
    match (lhs, rhs) {
        (Value::Char(c), Value::Str(s)) | (Value::Str(s), Value::Char(c)) => {
            let mut chars = s.chars();
            chars.next() == Some(*c) && chars.next().is_none()
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => lhs == rhs,
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool> {
    let ordering = match op {
        CompareOp::Eq => return Ok(values_equal(lhs, rhs)),
        CompareOp::Ne => return Ok(!values_equal(lhs, rhs)),
        _ => order(lhs, rhs)?,
    };
    Ok(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

fn order(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        return Ok(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        return a
            .partial_cmp(&b)
            .ok_or_else(|| fault("comparison with NaN"));
    }
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Ok(a.cmp(b)),
        _ => Err(fault(format!(
            "cannot order {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn index_value(base: &Value, index: &Value) -> Result<Value> {
    match base {
        Value::List(items) => {
            let idx = index
                .as_i64()
                .ok_or_else(|| fault(format!("list index must be an integer, found {}", index.type_name())))?;
            usize::try_from(idx)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| fault(format!("index {idx} is out of bounds (len = {})", items.len())))
        }
        Value::Str(text) => {
            let idx = index
                .as_i64()
                .ok_or_else(|| fault("string index must be an integer"))?;
            usize::try_from(idx)
                .ok()
                .and_then(|i| text.chars().nth(i))
                .map(Value::Char)
                .ok_or_else(|| fault(format!("index {idx} is out of bounds")))
        }
        Value::Map(_) | Value::Object { .. } => match index {
            Value::Str(key) => field_value(base, key),
            other => Err(fault(format!("map key must be a string, found {}", other.type_name()))),
        },
        other => Err(fault(format!("cannot index into {}", other.type_name()))),
    }
}

fn field_value(base: &Value, name: &str) -> Result<Value> {
    match base {
        Value::Map(entries) => Ok(entries.get(name).cloned().unwrap_or(Value::Null)),
        Value::Object { type_name, fields } => fields
            .get(name)
            .cloned()
            .ok_or_else(|| fault(format!("{type_name} has no field '{name}'"))),
        Value::Null => Err(fault(format!("field '{name}' accessed on null"))),
        other => Err(fault(format!("{} has no fields", other.type_name()))),
    }
}

fn text_arg<'a>(builtin: Builtin, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        fault(format!(
            "{builtin}() expects a String, found {}",
            value.type_name()
        ))
    })
}

fn call(builtin: Builtin, args: &[Value]) -> Result<Value> {
    let [first, rest @ ..] = args else {
        return Err(fault(format!("{builtin}() called without arguments")));
    };

    match builtin {
        Builtin::Len => match first {
            Value::Str(s) => Ok(Value::Long(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Long(items.len() as i64)),
            Value::Map(entries) | Value::Object { fields: entries, .. } => {
                Ok(Value::Long(entries.len() as i64))
            }
            other => Err(fault(format!("len() is not defined for {}", other.type_name()))),
        },
        Builtin::Lower => Ok(Value::from(text_arg(builtin, first)?.to_lowercase())),
        Builtin::Upper => Ok(Value::from(text_arg(builtin, first)?.to_uppercase())),
        Builtin::Str => Ok(Value::from(first.to_string())),
        Builtin::Int => to_int(first).map(Value::Long),
        Builtin::Contains | Builtin::StartsWith | Builtin::EndsWith => {
            let [needle] = rest else {
                return Err(fault(format!("{builtin}() takes two arguments")));
            };
            match builtin {
                Builtin::StartsWith => Ok(Value::Bool(
                    text_arg(builtin, first)?.starts_with(text_arg(builtin, needle)?),
                )),
                Builtin::EndsWith => Ok(Value::Bool(
                    text_arg(builtin, first)?.ends_with(text_arg(builtin, needle)?),
                )),
                _ => contains(first, needle).map(Value::Bool),
            }
        }
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool> {
    match haystack {
        Value::Str(s) => match needle {
            Value::Str(n) => Ok(s.contains(&**n)),
            Value::Char(c) => Ok(s.contains(*c)),
            other => Err(fault(format!(
                "contains() cannot search a String for {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
        Value::Map(entries) | Value::Object { fields: entries, .. } => {
            Ok(entries.contains_key(text_arg(Builtin::Contains, needle)?))
        }
        other => Err(fault(format!(
            "contains() is not defined for {}",
            other.type_name()
        ))),
    }
}

fn to_int(value: &Value) -> Result<i64> {
    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    if let Some(v) = value.as_f64() {
        if v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            return Ok(v.trunc() as i64);
        }
        return Err(fault(format!("{v} is not representable as an integer")));
    }
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| fault(format!("'{s}' is not an integer"))),
        Value::Char(c) => c
            .to_digit(10)
            .map(i64::from)
            .ok_or_else(|| fault(format!("'{c}' is not a digit"))),
        other => Err(fault(format!("int() is not defined for {}", other.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use super::*;
    use crate::expr::parser::parse;

    fn eval(source: &str, args: &[Value]) -> Result<Value> {
        evaluate(&parse(source).unwrap(), args)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("arg0 * 10", &[Value::Int(4)]).unwrap(), Value::Long(40));
        assert_eq!(eval("7 / 2", &[]).unwrap(), Value::Long(3));
        assert_eq!(eval("7 % 4", &[]).unwrap(), Value::Long(3));
        assert_eq!(eval("1 + 0.5", &[]).unwrap(), Value::Double(1.5));
        assert_eq!(eval("-arg0", &[Value::Byte(3)]).unwrap(), Value::Long(-3));
        assert!(eval("1 / 0", &[]).is_err());
        assert!(eval("9223372036854775807 + 1", &[]).is_err());
        assert!(eval("true + 1", &[]).is_err());
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            eval("'id-' + arg0", &[Value::Int(7)]).unwrap(),
            Value::str("id-7")
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("arg0 == 1", &[Value::Int(1)]).unwrap(), Value::Bool(true));
        assert_eq!(eval("arg0 == 1.0", &[Value::Long(1)]).unwrap(), Value::Bool(true));
        assert_eq!(
            eval("arg0 == \"missing\"", &[Value::str("missing")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval("'a' < 'b'", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("arg0 != null", &[Value::Null]).unwrap(), Value::Bool(false));
        assert!(eval("'a' < 1", &[]).is_err());
    }

    #[test]
    fn test_logical_short_circuit() {
        // The right-hand side would fault on the missing argument
        assert_eq!(eval("false && arg5 > 1", &[]).unwrap(), Value::Bool(false));
        assert_eq!(eval("true || arg5 > 1", &[]).unwrap(), Value::Bool(true));
        assert!(eval("true && arg5 > 1", &[]).is_err());
        assert!(eval("1 && true", &[]).is_err());
    }

    #[test]
    fn test_arguments() {
        let args = [Value::str("x"), Value::List(vec![Value::Int(9)])];
        assert_eq!(eval("argc", &args).unwrap(), Value::Long(2));
        assert_eq!(eval("args[1][0]", &args).unwrap(), Value::Int(9));
        assert!(eval("arg2", &args).is_err());
        assert!(eval("arg1[3]", &args).is_err());
    }

    #[test]
    fn test_fields() {
        let user = Value::Object {
            type_name: Arc::from("User"),
            fields: [("name".to_string(), Value::str("ann"))].into_iter().collect(),
        };
        let map = Value::Map(BTreeMap::new());
        assert_eq!(eval("arg0.name", &[user.clone()]).unwrap(), Value::str("ann"));
        assert_eq!(eval("arg0['name']", &[user.clone()]).unwrap(), Value::str("ann"));
        assert!(eval("arg0.age", &[user]).is_err());
        assert_eq!(eval("arg0.age", &[map]).unwrap(), Value::Null);
        assert!(eval("arg0.age", &[Value::Null]).is_err());
    }

    #[test]
    fn test_builtins() {
        let name = [Value::str("Alice")];
        assert_eq!(eval("len(arg0)", &name).unwrap(), Value::Long(5));
        assert_eq!(eval("lower(arg0)", &name).unwrap(), Value::str("alice"));
        assert_eq!(eval("upper(arg0)", &name).unwrap(), Value::str("ALICE"));
        assert_eq!(eval("starts_with(arg0, 'Al')", &name).unwrap(), Value::Bool(true));
        assert_eq!(eval("ends_with(arg0, 'x')", &name).unwrap(), Value::Bool(false));
        assert_eq!(eval("contains(arg0, 'lic')", &name).unwrap(), Value::Bool(true));
        assert_eq!(eval("contains(args, 'Alice')", &name).unwrap(), Value::Bool(true));
        assert_eq!(eval("str(42)", &[]).unwrap(), Value::str("42"));
        assert_eq!(eval("int(' 12 ')", &[]).unwrap(), Value::Long(12));
        assert_eq!(eval("int(2.9)", &[]).unwrap(), Value::Long(2));
        assert!(eval("int('x')", &[]).is_err());
        assert!(eval("lower(1)", &[]).is_err());
    }
}
