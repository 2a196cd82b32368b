//! Coercion of configuration literals into values of a declared type.
//!
//! Every substitute value passes through [`coerce_value`] before it is returned from an
//! intercepted call, so a caller never observes a value of the wrong type. Integer
//! conversions are range checked and never truncate; narrowing to `float` rejects values
//! outside its range but may round.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    target::{PrimitiveKind, TypeSig},
    value::Value,
    Error, Result,
};

/// A substitute value as written in a configuration document.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// A structured JSON literal (`{"return": 42}`).
    Json(serde_json::Value),
    /// Raw text whose meaning depends on the declared return type (`"returnValue": "42"`).
    Text(String),
}

impl Literal {
    /// Converts the literal into a value without a target type.
    ///
    /// Text that looks like a JSON array or object is parsed as JSON; any other text
    /// stays a string.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Json(json) => Value::from_json(json),
            Literal::Text(text) => match parse_embedded_json(text) {
                Some(json) => Value::from_json(&json),
                None => Value::str(text),
            },
        }
    }
}

fn parse_embedded_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        serde_json::from_str(trimmed).ok()
    } else {
        None
    }
}

fn mismatch(expected: &TypeSig, found: &str) -> Error {
    Error::TypeMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Coerces a configuration literal to the declared type.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] if the literal cannot represent a value of `ty`.
pub fn coerce_literal(literal: &Literal, ty: &TypeSig) -> Result<Value> {
    match literal {
        Literal::Json(json) => coerce_value(&Value::from_json(json), ty),
        Literal::Text(text) => {
            if let Some(json) = parse_embedded_json(text) {
                if !matches!(ty, TypeSig::Primitive(PrimitiveKind::String)) {
                    return coerce_value(&Value::from_json(&json), ty);
                }
            }
            match ty {
                TypeSig::Primitive(kind) => coerce_text(text, *kind, ty),
                TypeSig::Boxed(_) if text.trim() == "null" => Ok(Value::Null),
                TypeSig::Boxed(kind) => coerce_text(text, *kind, ty),
                _ => coerce_value(&Value::str(text), ty),
            }
        }
    }
}

fn coerce_text(text: &str, kind: PrimitiveKind, ty: &TypeSig) -> Result<Value> {
    let trimmed = text.trim();
    let fail = || mismatch(ty, "String");

    match kind {
        PrimitiveKind::String | PrimitiveKind::Object => Ok(Value::str(text)),
        PrimitiveKind::Void => {
            if trimmed.is_empty() || trimmed == "null" {
                Ok(Value::Void)
            } else {
                Err(fail())
            }
        }
        PrimitiveKind::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(fail())
            }
        }
        PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Int | PrimitiveKind::Long => {
            let digits = trimmed
                .strip_suffix(['L', 'l'])
                .unwrap_or(trimmed)
                .replace('_', "");
            let parsed = digits.parse::<i64>().map_err(|_| fail())?;
            coerce_value(&Value::Long(parsed), ty)
        }
        PrimitiveKind::Float | PrimitiveKind::Double => {
            let digits = trimmed
                .strip_suffix(['f', 'F', 'd', 'D'])
                .unwrap_or(trimmed);
            let parsed = digits.parse::<f64>().map_err(|_| fail())?;
            coerce_value(&Value::Double(parsed), ty)
        }
        PrimitiveKind::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(fail()),
            }
        }
    }
}

/// Coerces a value to the declared type.
///
/// # Rules
///
/// - `null` is accepted by every type except the unboxed primitives
///   (see [`TypeSig::is_nullable`]); `void` turns it into `void`.
/// - Boxed types accept what their primitive accepts.
/// - `void` accepts only `void` and `null`.
/// - Integer types accept any integer or integral float that fits their range.
/// - Floating point types accept any numeric value; `float` rejects finite values
///   beyond its range.
/// - `char` accepts a character or a one-character string.
/// - `String` accepts strings and characters.
/// - `Object` accepts anything except `void`.
/// - Lists and arrays coerce element-wise; maps coerce their values.
/// - Named types accept objects, maps (which become objects of that type) and strings.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] if the value cannot be represented as `ty`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn coerce_value(value: &Value, ty: &TypeSig) -> Result<Value> {
    if matches!(value, Value::Null) && ty.is_nullable() {
        return Ok(Value::Null);
    }
    match ty {
        TypeSig::Primitive(kind) | TypeSig::Boxed(kind) => coerce_primitive(value, *kind, ty),
        TypeSig::List(_, element) | TypeSig::Array(element) => match value {
            Value::List(items) => items
                .iter()
                .map(|item| coerce_value(item, element))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(mismatch(ty, other.type_name())),
        },
        TypeSig::Map(_, _, element) => match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), coerce_value(v, element)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Map),
            other => Err(mismatch(ty, other.type_name())),
        },
        TypeSig::Named(name) => match value {
            Value::Str(_) | Value::Object { .. } => Ok(value.clone()),
            Value::Map(entries) => Ok(Value::Object {
                type_name: Arc::from(name.as_str()),
                fields: entries.clone(),
            }),
            other => Err(mismatch(ty, other.type_name())),
        },
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_primitive(value: &Value, kind: PrimitiveKind, ty: &TypeSig) -> Result<Value> {
    let fail = || mismatch(ty, value.type_name());

    match kind {
        PrimitiveKind::Void => match value {
            Value::Void | Value::Null => Ok(Value::Void),
            _ => Err(fail()),
        },
        PrimitiveKind::Boolean => value.as_bool().map(Value::Bool).ok_or_else(fail),
        PrimitiveKind::Byte => integral(value)
            .and_then(|v| i8::try_from(v).ok())
            .map(Value::Byte)
            .ok_or_else(fail),
        PrimitiveKind::Short => integral(value)
            .and_then(|v| i16::try_from(v).ok())
            .map(Value::Short)
            .ok_or_else(fail),
        PrimitiveKind::Int => integral(value)
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::Int)
            .ok_or_else(fail),
        PrimitiveKind::Long => integral(value).map(Value::Long).ok_or_else(fail),
        PrimitiveKind::Float => value
            .as_f64()
            .filter(|v| !v.is_finite() || v.abs() <= f64::from(f32::MAX))
            .map(|v| Value::Float(v as f32))
            .ok_or_else(fail),
        PrimitiveKind::Double => value.as_f64().map(Value::Double).ok_or_else(fail),
        PrimitiveKind::Char => match value {
            Value::Char(c) => Ok(Value::Char(*c)),
            Value::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(fail()),
                }
            }
            _ => Err(fail()),
        },
        PrimitiveKind::String => match value {
            Value::Str(_) => Ok(value.clone()),
            Value::Char(c) => Ok(Value::str(c.to_string())),
            _ => Err(fail()),
        },
        PrimitiveKind::Object => match value {
            Value::Void => Err(fail()),
            other => Ok(other.clone()),
        },
    }
}

/// Returns an integer view of the value, accepting floats without a fractional part.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(value: &Value) -> Option<i64> {
    if let Some(v) = value.as_i64() {
        return Some(v);
    }
    let v = value.as_f64()?;
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}
