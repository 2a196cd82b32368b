//! Exceptions raised at intercepted call sites.
//!
//! A [`ThrownException`] is an ordinary value travelling in the `Err` arm of a
//! [`crate::CallResult`]: it is what the host sees when a method throws, whether the
//! original body threw it or a rule substituted it. It is not a [`crate::Error`]; engine
//! errors never reach a caller.
//!
//! The [`ExceptionCatalog`] decides which exception type names can be raised. It comes
//! with the common standard exceptions and accepts additional host types at runtime.

use std::{fmt, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{Error, Result};

/// Exception types every catalog knows about.
pub const BUILTIN_EXCEPTIONS: &[&str] = &[
    "java.lang.Exception",
    "java.lang.RuntimeException",
    "java.lang.IllegalArgumentException",
    "java.lang.IllegalStateException",
    "java.lang.UnsupportedOperationException",
    "java.lang.NullPointerException",
    "java.lang.ArithmeticException",
    "java.lang.IndexOutOfBoundsException",
    "java.lang.SecurityException",
    "java.util.NoSuchElementException",
    "java.util.concurrent.TimeoutException",
    "java.io.IOException",
];

/// Exception raised when a body-less method is called without a substitute.
pub const UNSUPPORTED_OPERATION: &str = "java.lang.UnsupportedOperationException";

/// An exception as observed at a call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThrownException {
    type_name: Arc<str>,
    message: String,
    mocked: bool,
}

impl ThrownException {
    /// Creates an exception raised by host code.
    pub fn new(type_name: impl AsRef<str>, message: impl Into<String>) -> Self {
        ThrownException {
            type_name: Arc::from(type_name.as_ref()),
            message: message.into(),
            mocked: false,
        }
    }

    pub(crate) fn substitute(type_name: Arc<str>, message: String) -> Self {
        ThrownException {
            type_name,
            message,
            mocked: true,
        }
    }

    /// Returns the fully qualified type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the type name without its namespace.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        simple_name(&self.type_name)
    }

    /// Returns the exception message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if the exception was produced by a rule rather than by host code.
    #[must_use]
    pub fn is_mocked(&self) -> bool {
        self.mocked
    }

    /// Returns `true` if the exception's type is `name`, given fully qualified or simple.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        *self.type_name == *name || (!name.contains('.') && self.simple_name() == name)
    }
}

impl fmt::Display for ThrownException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.type_name)
        } else {
            write!(f, "{}: {}", self.type_name, self.message)
        }
    }
}

impl std::error::Error for ThrownException {}

fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Registry of exception types that substitutes may raise.
///
/// Names resolve exactly first and then by simple name, so a rule may say
/// `IllegalStateException` for `java.lang.IllegalStateException`. When two registered
/// types share a simple name, the first registration wins the short form.
pub struct ExceptionCatalog {
    by_name: DashMap<Arc<str>, Arc<str>>,
}

impl ExceptionCatalog {
    /// Creates a catalog holding [`BUILTIN_EXCEPTIONS`].
    #[must_use]
    pub fn new() -> Self {
        let catalog = Self::empty();
        for name in BUILTIN_EXCEPTIONS {
            catalog.register(name);
        }
        catalog
    }

    /// Creates a catalog without any types.
    #[must_use]
    pub fn empty() -> Self {
        ExceptionCatalog {
            by_name: DashMap::new(),
        }
    }

    /// Makes a host exception type available to substitutes.
    pub fn register(&self, type_name: &str) {
        let full: Arc<str> = Arc::from(type_name.trim());
        self.by_name.insert(Arc::clone(&full), Arc::clone(&full));

        let short = simple_name(&full);
        if short.len() != full.len() {
            if let Entry::Vacant(slot) = self.by_name.entry(Arc::from(short)) {
                slot.insert(full);
            }
        }
    }

    /// Returns `true` if `type_name` resolves.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.by_name.contains_key(type_name)
    }

    /// Resolves a type name to its registered, fully qualified form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExceptionConstruction`] if the type is not registered.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<str>> {
        self.by_name
            .get(type_name.trim())
            .map(|full| Arc::clone(full.value()))
            .ok_or_else(|| Error::ExceptionConstruction(type_name.to_string()))
    }

    /// Builds a substitute exception of the named type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExceptionConstruction`] if the type is not registered.
    pub fn instantiate(&self, type_name: &str, message: &str) -> Result<ThrownException> {
        let full = self.resolve(type_name)?;
        Ok(ThrownException::substitute(full, message.to_string()))
    }

    /// Returns the number of registered names, short forms included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for ExceptionCatalog {
    fn default() -> Self {
        Self::new()
    }
}
