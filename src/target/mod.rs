//! Target identifiers.
//!
//! A [`TargetId`] names exactly one interceptable overload: the owning type, the member
//! name, the ordered parameter signatures, and whether the target is static or a
//! constructor. It is a purely structural key: two identifiers are equal if and only if
//! all of their fields are equal, which lets every lookup in the engine be a hash lookup
//! instead of runtime type introspection.
//!
//! # Descriptor Syntax
//!
//! ```text
//! [static ]Owner.member(T1,T2,...)
//! Owner.<init>(T1,...)              constructor
//! ```
//!
//! # Examples
//!
//! ```rust
//! use mockscope::TargetId;
//!
//! let add = TargetId::parse("Calculator.add(int,int)")?;
//! assert_eq!(add.owner(), "Calculator");
//! assert_eq!(add.member(), "add");
//! assert_eq!(add.arity(), 2);
//! assert_eq!(add, TargetId::method("Calculator", "add", &["int", "i32"])?);
//! assert_ne!(add, TargetId::parse("Calculator.add(Integer,int)")?);
//! # Ok::<(), mockscope::Error>(())
//! ```

mod typesig;

use std::{fmt, str::FromStr, sync::Arc};

use bitflags::bitflags;

pub use typesig::{ListKind, MapKind, PrimitiveKind, TypeSig};
pub(crate) use typesig::{split_top_level, validate_type_name};

use crate::Result;

/// Member name used for constructor targets.
pub const CONSTRUCTOR_NAME: &str = "<init>";

bitflags! {
    /// Call-shape flags that form part of a target's identity.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TargetFlags: u8 {
        /// The target is invoked without a receiver.
        const STATIC = 0x01;
        /// The target is a constructor.
        const CONSTRUCTOR = 0x02;
    }
}

/// Structural identifier of one interceptable overload.
///
/// Cloning is cheap: all string and signature data is shared.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TargetId {
    owner: Arc<str>,
    member: Arc<str>,
    params: Arc<[TypeSig]>,
    flags: TargetFlags,
}

impl TargetId {
    /// Creates a target identifier from its parts.
    ///
    /// A member named [`CONSTRUCTOR_NAME`] implies [`TargetFlags::CONSTRUCTOR`].
    ///
    /// # Arguments
    ///
    /// * `owner` - Owning type name, e.g. `com.acme.Calculator`
    /// * `member` - Member name, e.g. `add`
    /// * `params` - Parameter signatures in declaration order
    /// * `flags` - Static / constructor flags
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigParse`] if the owner or member name is empty or
    /// malformed, or if the flags contradict the member name.
    pub fn new(
        owner: &str,
        member: &str,
        params: Vec<TypeSig>,
        mut flags: TargetFlags,
    ) -> Result<Self> {
        let owner = owner.trim();
        let member = member.trim();

        if owner.is_empty() {
            return Err(config_error!("target '{}' has an empty owning type name", member));
        }
        validate_type_name(owner)?;

        if member.is_empty() {
            return Err(config_error!("target on '{}' has an empty member name", owner));
        }
        if member == CONSTRUCTOR_NAME {
            flags |= TargetFlags::CONSTRUCTOR;
        } else if flags.contains(TargetFlags::CONSTRUCTOR) {
            return Err(config_error!(
                "constructor target on '{}' must be named {}",
                owner,
                CONSTRUCTOR_NAME
            ));
        } else if let Some(bad) = member
            .chars()
            .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '$')))
        {
            return Err(config_error!(
                "member name '{}' contains invalid character '{}'",
                member,
                bad
            ));
        }
        if flags.contains(TargetFlags::STATIC | TargetFlags::CONSTRUCTOR) {
            return Err(config_error!(
                "target '{}.{}' cannot be both static and a constructor",
                owner,
                member
            ));
        }

        Ok(TargetId {
            owner: Arc::from(owner),
            member: Arc::from(member),
            params: Arc::from(params),
            flags,
        })
    }

    /// Creates an instance method target, parsing each parameter signature.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigParse`] if any name or signature is malformed.
    pub fn method(owner: &str, member: &str, params: &[&str]) -> Result<Self> {
        Self::new(owner, member, parse_params(params)?, TargetFlags::empty())
    }

    /// Creates a static method target, parsing each parameter signature.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigParse`] if any name or signature is malformed.
    pub fn static_method(owner: &str, member: &str, params: &[&str]) -> Result<Self> {
        Self::new(owner, member, parse_params(params)?, TargetFlags::STATIC)
    }

    /// Creates a constructor target, parsing each parameter signature.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigParse`] if any name or signature is malformed.
    pub fn constructor(owner: &str, params: &[&str]) -> Result<Self> {
        Self::new(
            owner,
            CONSTRUCTOR_NAME,
            parse_params(params)?,
            TargetFlags::CONSTRUCTOR,
        )
    }

    /// Parses a descriptor of the form `[static ]Owner.member(T1,T2)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigParse`] if the descriptor has no parameter list,
    /// unbalanced parentheses, no owner, or a malformed parameter signature.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let text = descriptor.trim();
        let (flags, text) = match text.strip_prefix("static ") {
            Some(rest) => (TargetFlags::STATIC, rest.trim_start()),
            None => (TargetFlags::empty(), text),
        };

        let Some(open) = text.find('(') else {
            return Err(config_error!(
                "target '{}' is missing its parameter list",
                descriptor
            ));
        };
        let Some(params) = text[open + 1..].trim_end().strip_suffix(')') else {
            return Err(config_error!(
                "target '{}' has an unbalanced parameter list",
                descriptor
            ));
        };

        let path = text[..open].trim_end();
        let Some(dot) = path.rfind('.') else {
            return Err(config_error!(
                "target '{}' must have the form Owner.member(...)",
                descriptor
            ));
        };

        let params = split_top_level(params)?
            .into_iter()
            .map(TypeSig::parse)
            .collect::<Result<Vec<_>>>()?;

        Self::new(&path[..dot], &path[dot + 1..], params, flags)
    }

    /// Returns the owning type name.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the member name ([`CONSTRUCTOR_NAME`] for constructors).
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Returns the parameter signatures in declaration order.
    #[must_use]
    pub fn params(&self) -> &[TypeSig] {
        &self.params
    }

    /// Returns the number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Returns the call-shape flags.
    #[must_use]
    pub fn flags(&self) -> TargetFlags {
        self.flags
    }

    /// Returns `true` for static targets.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(TargetFlags::STATIC)
    }

    /// Returns `true` for constructor targets.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.flags.contains(TargetFlags::CONSTRUCTOR)
    }
}

fn parse_params(params: &[&str]) -> Result<Vec<TypeSig>> {
    params.iter().map(|p| TypeSig::parse(p)).collect()
}

impl FromStr for TargetId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            f.write_str("static ")?;
        }
        write!(f, "{}.{}(", self.owner, self.member)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetId({self})")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let target = TargetId::parse("com.acme.Service.fetch(java.lang.String)").unwrap();
        assert_eq!(target.owner(), "com.acme.Service");
        assert_eq!(target.member(), "fetch");
        assert_eq!(target.params(), &[TypeSig::STRING]);
        assert!(!target.is_static());
        assert!(!target.is_constructor());
    }

    #[test]
    fn test_parse_static_and_constructor() {
        let stat = TargetId::parse("static Math.max(long, long)").unwrap();
        assert!(stat.is_static());
        assert_eq!(stat.to_string(), "static Math.max(long,long)");

        let ctor = TargetId::parse("Account.<init>(String)").unwrap();
        assert!(ctor.is_constructor());
        assert_eq!(ctor, TargetId::constructor("Account", &["String"]).unwrap());
    }

    #[test]
    fn test_display_round_trips() {
        for descriptor in [
            "Calculator.add(int,int)",
            "static Util.now()",
            "Repo.findAll(Map<String,List<long>>)",
            "Buffer.<init>(byte[])",
        ] {
            let target = TargetId::parse(descriptor).unwrap();
            assert_eq!(target.to_string(), descriptor);
            assert_eq!(TargetId::parse(&target.to_string()).unwrap(), target);
        }
    }

    #[test]
    fn test_structural_equality() {
        let a = TargetId::parse("Calculator.add(int,int)").unwrap();
        let b = TargetId::method("Calculator", "add", &["int", "i32"]).unwrap();
        let overload = TargetId::parse("Calculator.add(long,long)").unwrap();
        let stat = TargetId::static_method("Calculator", "add", &["int", "int"]).unwrap();
        let boxed = TargetId::parse("Calculator.add(java.lang.Integer,Integer)").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, overload);
        assert_ne!(a, stat);
        assert_ne!(a, boxed);
        assert_eq!(boxed.to_string(), "Calculator.add(Integer,Integer)");

        let set: HashSet<_> = [a.clone(), b, overload, stat, boxed].into_iter().collect();
        assert_eq!(set.len(), 4);
        assert!(set.contains(&a));
    }

    #[test]
    fn test_collection_overloads_are_distinct() {
        let list = TargetId::parse("Svc.g(java.util.List)").unwrap();
        let set = TargetId::parse("Svc.g(java.util.Set)").unwrap();
        assert_ne!(list, set);
        assert_eq!(list, TargetId::parse("Svc.g(List<Object>)").unwrap());
    }

    #[test]
    fn test_invalid_descriptors() {
        assert!(TargetId::parse("Calculator.add").is_err());
        assert!(TargetId::parse("add(int)").is_err());
        assert!(TargetId::parse(".add(int)").is_err());
        assert!(TargetId::parse("Calculator.(int)").is_err());
        assert!(TargetId::parse("Calculator.add(int").is_err());
        assert!(TargetId::parse("Calculator.add(int,)").is_err());
        assert!(TargetId::parse("static Account.<init>()").is_err());
        assert!(TargetId::new("A", "b-c", vec![], TargetFlags::empty()).is_err());
        assert!(TargetId::new("A", "run", vec![], TargetFlags::CONSTRUCTOR).is_err());
    }
}
