//! Host method definitions and the capability to run an original body.

use std::{fmt, sync::Arc};

use bitflags::bitflags;

use crate::{
    engine::exception::{ThrownException, UNSUPPORTED_OPERATION},
    target::{TargetId, TypeSig},
    value::Value,
};

/// What a host method call produces: a value, or an exception at the call site.
pub type CallResult = std::result::Result<Value, ThrownException>;

/// A host method body.
pub type OriginalFn = Arc<dyn Fn(&[Value]) -> CallResult + Send + Sync>;

bitflags! {
    /// Properties of a registered host method.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct MethodAttributes: u8 {
        /// The method has no body (an interface or abstract method)
        const ABSTRACT = 0x01;
        /// A redirection installed on this method cannot be removed again
        const PINNED = 0x02;
    }
}

/// The preserved behavior of an intercepted method.
///
/// Invoking it runs the host body exactly as an unintercepted call would. For abstract
/// methods there is no body, and invoking yields the `UnsupportedOperationException` a
/// caller of an unimplemented interface method would see.
#[derive(Clone)]
pub struct OriginalInvoker {
    target: TargetId,
    body: Option<OriginalFn>,
}

impl OriginalInvoker {
    /// Creates an invoker for `target` running `body`.
    #[must_use]
    pub fn new(target: TargetId, body: Option<OriginalFn>) -> Self {
        OriginalInvoker { target, body }
    }

    /// Runs the original body with `args`.
    ///
    /// # Errors
    ///
    /// Returns whatever exception the body throws, or an unsupported-operation exception
    /// when there is no body.
    pub fn invoke(&self, args: &[Value]) -> CallResult {
        match &self.body {
            Some(body) => body(args),
            None => Err(ThrownException::new(
                UNSUPPORTED_OPERATION,
                format!("No mock configured for {}", self.target),
            )),
        }
    }

    /// Returns the method this invoker belongs to.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Returns `true` if there is no original body.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.body.is_none()
    }
}

impl fmt::Debug for OriginalInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginalInvoker")
            .field("target", &self.target)
            .field("abstract", &self.is_abstract())
            .finish()
    }
}

/// A host method as handed to the [`crate::MethodTable`].
///
/// # Examples
///
/// ```rust
/// use mockscope::{MethodDef, TargetId, TypeSig, Value};
///
/// let add = MethodDef::new(
///     TargetId::method("Calculator", "add", &["int", "int"])?,
///     TypeSig::INT,
///     |args: &[Value]| {
///         let sum = args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0);
///         Ok(Value::Int(sum as i32))
///     },
/// );
/// assert!(!add.is_abstract());
/// # Ok::<(), mockscope::Error>(())
/// ```
pub struct MethodDef {
    target: TargetId,
    return_type: TypeSig,
    attributes: MethodAttributes,
    body: Option<OriginalFn>,
}

impl MethodDef {
    /// Creates a method with a body.
    pub fn new<F>(target: TargetId, return_type: TypeSig, body: F) -> Self
    where
        F: Fn(&[Value]) -> CallResult + Send + Sync + 'static,
    {
        MethodDef {
            target,
            return_type,
            attributes: MethodAttributes::empty(),
            body: Some(Arc::new(body)),
        }
    }

    /// Creates a method without a body.
    #[must_use]
    pub fn abstract_method(target: TargetId, return_type: TypeSig) -> Self {
        MethodDef {
            target,
            return_type,
            attributes: MethodAttributes::ABSTRACT,
            body: None,
        }
    }

    /// Marks the method as pinned.
    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.attributes |= MethodAttributes::PINNED;
        self
    }

    /// Adds `attributes`. [`MethodAttributes::ABSTRACT`] is derived from the body and
    /// cannot be set or cleared here.
    #[must_use]
    pub fn with_attributes(mut self, attributes: MethodAttributes) -> Self {
        let is_abstract = self.body.is_none();
        self.attributes |= attributes;
        self.attributes.set(MethodAttributes::ABSTRACT, is_abstract);
        self
    }

    /// Returns the method's identity.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Returns the declared return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeSig {
        &self.return_type
    }

    /// Returns the method's attributes.
    #[must_use]
    pub fn attributes(&self) -> MethodAttributes {
        self.attributes
    }

    /// Returns `true` if the method has no body.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.attributes.contains(MethodAttributes::ABSTRACT)
    }

    /// Returns `true` if redirections on this method cannot be removed.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.attributes.contains(MethodAttributes::PINNED)
    }

    pub(crate) fn into_parts(self) -> (TargetId, TypeSig, MethodAttributes, OriginalInvoker) {
        let invoker = OriginalInvoker::new(self.target.clone(), self.body);
        (self.target, self.return_type, self.attributes, invoker)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("target", &self.target)
            .field("return_type", &self.return_type)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
