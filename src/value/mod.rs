//! Runtime values.
//!
//! [`Value`] is the representation of every argument passed into an intercepted call and
//! every value returned from one, whether produced by the original body or by a
//! substitution rule. It is deliberately close to what a managed host exposes: boxed
//! primitives, strings, collections and plain objects with named fields.
//!
//! Conversions from configuration literals into values of a declared return type live in
//! [`coerce`].

mod coerce;

use std::{collections::BTreeMap, fmt, sync::Arc};

pub use coerce::{coerce_literal, coerce_value, Literal};

/// A runtime value crossing an intercepted call boundary.
///
/// # Type Mapping
///
/// | Host type | Value Variant |
/// |-----------|---------------|
/// | `void` | [`Value::Void`] |
/// | `null` | [`Value::Null`] |
/// | `boolean` | [`Value::Bool`] |
/// | `byte`, `short`, `int`, `long` | [`Value::Byte`], [`Value::Short`], [`Value::Int`], [`Value::Long`] |
/// | `float`, `double` | [`Value::Float`], [`Value::Double`] |
/// | `char` | [`Value::Char`] |
/// | `Integer`, `Long`, other boxed types | As the primitive, or [`Value::Null`] |
/// | `String` | [`Value::Str`] |
/// | `List<T>`, `T[]` | [`Value::List`] |
/// | `Map<String,V>` | [`Value::Map`] |
/// | Any other object | [`Value::Object`] |
///
/// Equality is structural. Floating point values compare by bit pattern so that a value
/// always equals an identical copy of itself, `NaN` included.
#[derive(Clone, Debug)]
pub enum Value {
    /// Result of a `void` method.
    Void,
    /// The null reference.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 8-bit signed integer.
    Byte(i8),
    /// 16-bit signed integer.
    Short(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 32-bit floating point.
    Float(f32),
    /// 64-bit floating point.
    Double(f64),
    /// Single character.
    Char(char),
    /// Immutable text, shared between clones.
    Str(Arc<str>),
    /// Ordered collection or array.
    List(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
    /// Instance of a named type with its field values.
    Object {
        /// Name of the instance's type.
        type_name: Arc<str>,
        /// Field values by name.
        fields: BTreeMap<String, Value>,
    },
}

impl Value {
    /// Creates a string value.
    pub fn str(text: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(text.as_ref()))
    }

    /// Returns the name of this value's type, as used in type mismatch reports.
    ///
    /// Objects report their own type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Value::Void => "void",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Object { type_name, .. } => type_name.as_ref(),
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for [`Value::Void`].
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Returns `true` for any integer or floating point value.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || matches!(self, Value::Float(_) | Value::Double(_))
    }

    /// Returns `true` for the fixed-width integer variants.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_)
        )
    }

    /// Returns the boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns an integer value widened to `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns any numeric value widened to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Returns the text of a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Returns the elements of a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns a named field of a map or object value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(name),
            Value::Object { fields, .. } => fields.get(name),
            _ => None,
        }
    }

    /// Converts a JSON document into a value.
    ///
    /// Integers become [`Value::Int`] when they fit in 32 bits and [`Value::Long`]
    /// otherwise; all other numbers become [`Value::Double`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    match i32::try_from(v) {
                        Ok(small) => Value::Int(small),
                        Err(_) => Value::Long(v),
                    }
                } else if let Some(v) = n.as_u64() {
                    Value::Double(v as f64)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this value into JSON.
    ///
    /// `void` and non-finite floating point values map to `null`; objects map to their
    /// fields.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Void | Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                Json::from(self.as_i64().unwrap_or_default())
            }
            Value::Float(v) => {
                serde_json::Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number)
            }
            Value::Double(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::Char(c) => Json::String(c.to_string()),
            Value::Str(s) => Json::String(s.to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) | Value::Object { fields: entries, .. } => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (
                Value::Object {
                    type_name: t1,
                    fields: f1,
                },
                Value::Object {
                    type_name: t2,
                    fields: f2,
                },
            ) => t1 == t2 && f1 == f2,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => write_entries(f, entries),
            Value::Object { type_name, fields } => {
                f.write_str(type_name)?;
                write_entries(f, fields)
            }
        }
    }
}

fn write_entries(f: &mut fmt::Formatter<'_>, entries: &BTreeMap<String, Value>) -> fmt::Result {
    f.write_str("{")?;
    for (idx, (key, value)) in entries.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}={value}")?;
    }
    f.write_str("}")
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Value::Byte(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Short(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Char(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::str(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        Value::from_json(value)
    }
}
