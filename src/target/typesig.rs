//! Textual type signatures.
//!
//! [`TypeSig`] is the parsed form of the type names that appear in configuration
//! documents: parameter types inside a target descriptor and declared return types.
//! Signatures are purely structural. Named (non-primitive) types are never looked up
//! when parsed; whether such a type exists is only discovered when a value has to be
//! produced for it.
//!
//! # Grammar
//!
//! | Form | Example | Parsed as |
//! |------|---------|-----------|
//! | Primitive or alias | `int`, `i32`, `java.lang.String` | [`TypeSig::Primitive`] |
//! | Boxed wrapper | `Integer`, `java.lang.Long` | [`TypeSig::Boxed`] |
//! | List-like collection | `List<User>`, `java.util.ArrayList<T>` | [`TypeSig::List`] |
//! | Map-like collection | `Map<String,Long>` | [`TypeSig::Map`] |
//! | Array | `byte[]`, `String[][]` | [`TypeSig::Array`] |
//! | Anything else | `com.acme.User`, `Optional<User>` | [`TypeSig::Named`] |
//!
//! Signatures are part of a target's identity, so only spellings of the same type are
//! folded together: `java.lang.Integer` and `Integer` are one type, `int` and `Integer`
//! are two, and `List` and `Set` stay distinct. Conversions between related types
//! happen when a value is coerced, never here.

use std::fmt;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::Result;

/// Maximum nesting of generic arguments and array dimensions in one signature.
const MAX_NESTING: usize = 32;

/// Primitive and built-in type kinds.
///
/// The display form is the canonical spelling used in descriptors; [`PrimitiveKind::from_name`]
/// additionally accepts the common aliases produced by other tooling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum PrimitiveKind {
    /// No value.
    #[strum(serialize = "void")]
    Void,
    /// `true` or `false`.
    #[strum(serialize = "boolean")]
    Boolean,
    /// 8-bit signed integer.
    #[strum(serialize = "byte")]
    Byte,
    /// 16-bit signed integer.
    #[strum(serialize = "short")]
    Short,
    /// 32-bit signed integer.
    #[strum(serialize = "int")]
    Int,
    /// 64-bit signed integer.
    #[strum(serialize = "long")]
    Long,
    /// 32-bit floating point.
    #[strum(serialize = "float")]
    Float,
    /// 64-bit floating point.
    #[strum(serialize = "double")]
    Double,
    /// A single character.
    #[strum(serialize = "char")]
    Char,
    /// Text.
    #[strum(serialize = "String")]
    String,
    /// Any reference value.
    #[strum(serialize = "Object")]
    Object,
}

impl PrimitiveKind {
    /// Resolves a primitive type name or one of its aliases.
    ///
    /// Returns `None` for names that are not primitive, which the parser then treats as
    /// collections or named types.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "void" => Self::Void,
            "boolean" | "bool" => Self::Boolean,
            "byte" | "i8" | "sbyte" => Self::Byte,
            "short" | "i16" => Self::Short,
            "int" | "i32" => Self::Int,
            "long" | "i64" => Self::Long,
            "float" | "f32" => Self::Float,
            "double" | "f64" => Self::Double,
            "char" => Self::Char,
            "String" | "string" | "str" | "java.lang.String" => Self::String,
            "Object" | "object" | "java.lang.Object" => Self::Object,
            _ => return None,
        })
    }

    /// Resolves the name of a boxed wrapper type, e.g. `Integer` or `java.lang.Long`.
    #[must_use]
    pub fn from_boxed_name(name: &str) -> Option<Self> {
        Some(match name.strip_prefix("java.lang.").unwrap_or(name) {
            "Void" => Self::Void,
            "Boolean" => Self::Boolean,
            "Byte" => Self::Byte,
            "Short" => Self::Short,
            "Integer" => Self::Int,
            "Long" => Self::Long,
            "Float" => Self::Float,
            "Double" => Self::Double,
            "Character" => Self::Char,
            _ => return None,
        })
    }

    /// Returns the simple name of the boxed wrapper type for this kind.
    ///
    /// `String` and `Object` are reference types already and return their own name.
    #[must_use]
    pub fn boxed_name(self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::Short => "Short",
            Self::Int => "Integer",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Char => "Character",
            Self::String => "String",
            Self::Object => "Object",
        }
    }

    /// Returns `true` for the fixed-width integer kinds.
    #[must_use]
    pub fn is_integral(self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int | Self::Long)
    }

    /// Returns `true` for `float` and `double`.
    #[must_use]
    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

/// Ordered collection types with one element type argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum ListKind {
    /// `java.util.List`
    List,
    /// `java.util.ArrayList`
    ArrayList,
    /// `java.util.LinkedList`
    LinkedList,
    /// `java.util.Set`
    Set,
    /// `java.util.HashSet`
    HashSet,
    /// `java.util.LinkedHashSet`
    LinkedHashSet,
    /// `java.util.TreeSet`
    TreeSet,
    /// `java.util.Collection`
    Collection,
    /// `java.lang.Iterable`
    Iterable,
    /// `std::vec::Vec`
    Vec,
}

/// Keyed collection types with key and value type arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum MapKind {
    /// `java.util.Map`
    Map,
    /// `java.util.HashMap`
    HashMap,
    /// `java.util.LinkedHashMap`
    LinkedHashMap,
    /// `java.util.TreeMap`
    TreeMap,
    /// `std::collections::BTreeMap`
    BTreeMap,
}

#[derive(Clone, Copy)]
enum CollectionKind {
    List(ListKind),
    Map(MapKind),
}

/// Namespaces whose collection types are recognized; anything else is a named type.
const COLLECTION_NAMESPACES: [&str; 4] =
    ["java.util.", "java.lang.", "std::collections::", "std::vec::"];

fn collection_kind(name: &str) -> Option<CollectionKind> {
    let simple = COLLECTION_NAMESPACES
        .iter()
        .find_map(|ns| name.strip_prefix(ns))
        .unwrap_or(name);
    if let Ok(kind) = simple.parse::<ListKind>() {
        return Some(CollectionKind::List(kind));
    }
    simple.parse::<MapKind>().ok().map(CollectionKind::Map)
}

/// A parsed type signature.
///
/// Equality is structural, which makes [`TypeSig`] usable as part of a hash key
/// (see [`crate::TargetId`]).
///
/// # Examples
///
/// ```rust
/// use mockscope::target::{ListKind, PrimitiveKind, TypeSig};
///
/// let sig = TypeSig::parse("java.util.List<java.lang.Integer>")?;
/// assert_eq!(
///     sig,
///     TypeSig::List(ListKind::List, Box::new(TypeSig::Boxed(PrimitiveKind::Int)))
/// );
/// assert_eq!(sig.to_string(), "List<Integer>");
/// assert_ne!(sig, TypeSig::parse("Set<Integer>")?);
/// # Ok::<(), mockscope::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// A primitive or built-in kind.
    Primitive(PrimitiveKind),
    /// The boxed wrapper of a primitive kind, which also admits `null`.
    Boxed(PrimitiveKind),
    /// An ordered collection with the given element type.
    List(ListKind, Box<TypeSig>),
    /// A keyed collection with the given key and value types.
    Map(MapKind, Box<TypeSig>, Box<TypeSig>),
    /// An array with the given element type.
    Array(Box<TypeSig>),
    /// A user-defined type, resolved lazily.
    Named(String),
}

impl TypeSig {
    /// `void`
    pub const VOID: TypeSig = TypeSig::Primitive(PrimitiveKind::Void);
    /// `int`
    pub const INT: TypeSig = TypeSig::Primitive(PrimitiveKind::Int);
    /// `long`
    pub const LONG: TypeSig = TypeSig::Primitive(PrimitiveKind::Long);
    /// `boolean`
    pub const BOOLEAN: TypeSig = TypeSig::Primitive(PrimitiveKind::Boolean);
    /// `double`
    pub const DOUBLE: TypeSig = TypeSig::Primitive(PrimitiveKind::Double);
    /// `String`
    pub const STRING: TypeSig = TypeSig::Primitive(PrimitiveKind::String);
    /// `Object`
    pub const OBJECT: TypeSig = TypeSig::Primitive(PrimitiveKind::Object);

    /// Parses a textual type signature.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigParse`] for empty names, unbalanced generic
    /// brackets, invalid characters, or collections with the wrong number of
    /// type arguments.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_nested(text.trim(), 0)
    }

    fn parse_nested(text: &str, depth: usize) -> Result<Self> {
        if depth > MAX_NESTING {
            return Err(config_error!("type signature '{}' nests too deeply", text));
        }
        if text.is_empty() {
            return Err(config_error!("empty type signature"));
        }

        if let Some(element) = text.strip_suffix("[]") {
            let element = Self::parse_nested(element.trim_end(), depth + 1)?;
            return Ok(TypeSig::Array(Box::new(element)));
        }

        if let Some(open) = text.find('<') {
            let Some(inner) = text[open + 1..].strip_suffix('>') else {
                return Err(config_error!(
                    "unbalanced generic arguments in type '{}'",
                    text
                ));
            };
            let base = text[..open].trim();
            validate_type_name(base)?;

            let mut args = split_top_level(inner)?
                .into_iter()
                .map(|arg| Self::parse_nested(arg, depth + 1))
                .collect::<Result<Vec<_>>>()?;

            return match (collection_kind(base), args.len()) {
                (Some(CollectionKind::List(kind)), 1) => {
                    Ok(TypeSig::List(kind, Box::new(args.remove(0))))
                }
                (Some(CollectionKind::Map(kind)), 2) => {
                    let value = args.remove(1);
                    let key = args.remove(0);
                    Ok(TypeSig::Map(kind, Box::new(key), Box::new(value)))
                }
                (Some(_), count) => Err(config_error!(
                    "collection type '{}' does not take {} type argument(s)",
                    base,
                    count
                )),
                (None, 0) => Err(config_error!("empty generic argument list in '{}'", text)),
                (None, _) => {
                    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
                    Ok(TypeSig::Named(format!("{base}<{}>", rendered.join(","))))
                }
            };
        }

        if let Some(kind) = PrimitiveKind::from_name(text) {
            return Ok(TypeSig::Primitive(kind));
        }
        if let Some(kind) = PrimitiveKind::from_boxed_name(text) {
            return Ok(TypeSig::Boxed(kind));
        }

        validate_type_name(text)?;
        Ok(match collection_kind(text) {
            Some(CollectionKind::List(kind)) => TypeSig::List(kind, Box::new(TypeSig::OBJECT)),
            Some(CollectionKind::Map(kind)) => {
                TypeSig::Map(kind, Box::new(TypeSig::OBJECT), Box::new(TypeSig::OBJECT))
            }
            None => TypeSig::Named(text.to_string()),
        })
    }

    /// Returns `true` if this is `void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSig::Primitive(PrimitiveKind::Void))
    }

    /// Returns the primitive kind, if this is a primitive signature.
    #[must_use]
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            TypeSig::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` if `null` is an acceptable value of this type.
    ///
    /// Only the unboxed primitives (`void`, `boolean`, the numeric kinds and `char`)
    /// reject it.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        match self {
            TypeSig::Primitive(kind) => {
                matches!(kind, PrimitiveKind::String | PrimitiveKind::Object)
            }
            TypeSig::Boxed(_)
            | TypeSig::List(..)
            | TypeSig::Map(..)
            | TypeSig::Array(_)
            | TypeSig::Named(_) => true,
        }
    }

    /// Returns `true` if this signature names a user-defined type.
    ///
    /// Literals for named types are not type-checked when a configuration is parsed.
    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self, TypeSig::Named(_))
    }
}

impl From<PrimitiveKind> for TypeSig {
    fn from(kind: PrimitiveKind) -> Self {
        TypeSig::Primitive(kind)
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Primitive(kind) => write!(f, "{kind}"),
            TypeSig::Boxed(kind) => f.write_str(kind.boxed_name()),
            TypeSig::List(kind, element) => write!(f, "{kind}<{element}>"),
            TypeSig::Map(kind, key, value) => write!(f, "{kind}<{key},{value}>"),
            TypeSig::Array(element) => write!(f, "{element}[]"),
            TypeSig::Named(name) => f.write_str(name),
        }
    }
}

/// Validates a dotted type name such as `com.acme.UserService`.
pub(crate) fn validate_type_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(config_error!("empty type name"));
    }
    for segment in name.split('.') {
        let mut chars = segment.chars();
        match chars.next() {
            None => return Err(config_error!("type name '{}' has an empty segment", name)),
            Some(first) if first.is_ascii_digit() => {
                return Err(config_error!(
                    "type name '{}' has a segment starting with a digit",
                    name
                ))
            }
            Some(_) => {}
        }
        if let Some(bad) = segment
            .chars()
            .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '$' | ':')))
        {
            return Err(config_error!(
                "type name '{}' contains invalid character '{}'",
                name,
                bad
            ));
        }
    }
    Ok(())
}

/// Splits a comma separated list at nesting depth zero.
///
/// `"int, Map<String,Long>"` yields `["int", "Map<String,Long>"]`. An empty (or
/// whitespace-only) input yields an empty list.
pub(crate) fn split_top_level(text: &str) -> Result<Vec<&str>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    config_error!("unbalanced '>' in type list '{}'", text)
                })?;
            }
            ',' if depth == 0 => {
                parts.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(config_error!("unbalanced '<' in type list '{}'", text));
    }
    parts.push(text[start..].trim());

    if parts.iter().any(|p| p.is_empty()) {
        return Err(config_error!("empty entry in type list '{}'", text));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_primitive_aliases() {
        assert_eq!(TypeSig::parse("int").unwrap(), TypeSig::INT);
        assert_eq!(TypeSig::parse(" i64 ").unwrap(), TypeSig::LONG);
        assert_eq!(TypeSig::parse("bool").unwrap(), TypeSig::BOOLEAN);
        assert_eq!(TypeSig::parse("java.lang.String").unwrap(), TypeSig::STRING);
    }

    #[test]
    fn test_boxed_types_stay_distinct() {
        let boxed = TypeSig::parse("java.lang.Integer").unwrap();
        assert_eq!(boxed, TypeSig::Boxed(PrimitiveKind::Int));
        assert_eq!(boxed, TypeSig::parse("Integer").unwrap());
        assert_ne!(boxed, TypeSig::INT);
        assert_eq!(boxed.to_string(), "Integer");
        assert_eq!(
            TypeSig::parse("Character").unwrap(),
            TypeSig::Boxed(PrimitiveKind::Char)
        );

        assert!(boxed.is_nullable());
        assert!(!TypeSig::INT.is_nullable());
        assert!(TypeSig::STRING.is_nullable());
    }

    #[test]
    fn test_boxed_names_parse_back() {
        for kind in PrimitiveKind::iter() {
            let sig = TypeSig::parse(kind.boxed_name()).unwrap();
            match kind {
                PrimitiveKind::String | PrimitiveKind::Object => {
                    assert_eq!(sig, TypeSig::Primitive(kind));
                }
                _ => assert_eq!(sig, TypeSig::Boxed(kind)),
            }
        }
    }

    #[test]
    fn test_canonical_names_parse_back() {
        for kind in PrimitiveKind::iter() {
            let sig = TypeSig::parse(&kind.to_string()).unwrap();
            assert_eq!(sig, TypeSig::Primitive(kind));
        }
    }

    #[test]
    fn test_collections() {
        let sig = TypeSig::parse("java.util.Map<String, List<com.acme.User>>").unwrap();
        assert_eq!(
            sig,
            TypeSig::Map(
                MapKind::Map,
                Box::new(TypeSig::STRING),
                Box::new(TypeSig::List(
                    ListKind::List,
                    Box::new(TypeSig::Named("com.acme.User".to_string()))
                ))
            )
        );
        assert_eq!(sig.to_string(), "Map<String,List<com.acme.User>>");

        assert_eq!(
            TypeSig::parse("java.util.List").unwrap(),
            TypeSig::List(ListKind::List, Box::new(TypeSig::OBJECT))
        );
    }

    #[test]
    fn test_collection_spellings_stay_distinct() {
        let list = TypeSig::parse("java.util.List").unwrap();
        assert_ne!(list, TypeSig::parse("java.util.Set").unwrap());
        assert_ne!(list, TypeSig::parse("ArrayList").unwrap());
        assert_ne!(
            TypeSig::parse("HashMap<String,int>").unwrap(),
            TypeSig::parse("TreeMap<String,int>").unwrap()
        );
        assert_eq!(
            TypeSig::parse("java.util.HashSet<long>").unwrap().to_string(),
            "HashSet<long>"
        );

        // Only well-known namespaces name collections
        assert_eq!(
            TypeSig::parse("com.acme.List").unwrap(),
            TypeSig::Named("com.acme.List".to_string())
        );
    }

    #[test]
    fn test_arrays() {
        let sig = TypeSig::parse("byte[][]").unwrap();
        assert_eq!(
            sig,
            TypeSig::Array(Box::new(TypeSig::Array(Box::new(TypeSig::Primitive(
                PrimitiveKind::Byte
            )))))
        );
        assert_eq!(sig.to_string(), "byte[][]");
    }

    #[test]
    fn test_named_generic_is_kept_opaque() {
        let sig = TypeSig::parse("Optional<java.lang.Integer>").unwrap();
        assert_eq!(sig, TypeSig::Named("Optional<Integer>".to_string()));
        assert!(sig.is_named());
    }

    #[test]
    fn test_malformed_signatures() {
        assert!(TypeSig::parse("").is_err());
        assert!(TypeSig::parse("List<int").is_err());
        assert!(TypeSig::parse("List<>").is_err());
        assert!(TypeSig::parse("Map<int>").is_err());
        assert!(TypeSig::parse("com..User").is_err());
        assert!(TypeSig::parse("9Lives").is_err());
        assert!(TypeSig::parse("User Name").is_err());
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(split_top_level("").unwrap(), Vec::<&str>::new());
        assert_eq!(
            split_top_level("int, Map<String,Long>").unwrap(),
            vec!["int", "Map<String,Long>"]
        );
        assert!(split_top_level("int,,int").is_err());
        assert!(split_top_level("Map<a,b>>").is_err());
    }
}
