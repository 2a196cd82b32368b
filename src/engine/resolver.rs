//! Turning a matched rule into a call outcome.
//!
//! The resolver never fails a call. Every error it encounters (a literal that does not
//! fit the return type, an exception type that cannot be raised, a computed expression
//! that faults) degrades to [`Outcome::RunOriginal`].

use std::sync::Arc;

use log::warn;

use crate::{
    config::{MockRule, RuleAction},
    engine::exception::{ExceptionCatalog, ThrownException},
    target::TypeSig,
    value::{coerce_literal, coerce_value, Value},
    Result,
};

/// The decision for one intercepted call.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Return this value; the original body does not run.
    SubstituteReturn(Value),
    /// Raise this exception at the call site; the original body does not run.
    SubstituteThrow(ThrownException),
    /// Run the original body and return its result unmodified.
    RunOriginal,
}

/// Produces outcomes for matched rules.
pub struct ValueResolver {
    catalog: Arc<ExceptionCatalog>,
}

impl ValueResolver {
    /// Creates a resolver raising exceptions from `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<ExceptionCatalog>) -> Self {
        ValueResolver { catalog }
    }

    /// Returns the exception catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ExceptionCatalog> {
        &self.catalog
    }

    /// Resolves `rule` for a call with `args` to a method returning `return_type`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::TypeMismatch`] if the substitute does not fit `return_type`
    /// - [`crate::Error::ExceptionConstruction`] if the exception type is unknown
    /// - [`crate::Error::Evaluation`] if a computed expression faults
    pub fn try_resolve(
        &self,
        rule: &MockRule,
        args: &[Value],
        return_type: &TypeSig,
    ) -> Result<Outcome> {
        match rule.action() {
            RuleAction::ReturnLiteral(literal) => {
                coerce_literal(literal, return_type).map(Outcome::SubstituteReturn)
            }
            RuleAction::ThrowException { type_name, message } => self
                .catalog
                .instantiate(type_name, message)
                .map(Outcome::SubstituteThrow),
            RuleAction::DelegateToOriginal => Ok(Outcome::RunOriginal),
            RuleAction::Computed(expression) => {
                let value = expression.evaluate(args)?;
                coerce_value(&value, return_type).map(Outcome::SubstituteReturn)
            }
        }
    }

    /// Resolves `rule`, falling back to [`Outcome::RunOriginal`] on any error.
    #[must_use]
    pub fn resolve(&self, rule: &MockRule, args: &[Value], return_type: &TypeSig) -> Outcome {
        self.try_resolve(rule, args, return_type)
            .unwrap_or_else(|err| {
                warn!(
                    "rule #{} on {} could not be applied, running original: {}",
                    rule.index(),
                    rule.target(),
                    err
                );
                Outcome::RunOriginal
            })
    }
}

impl Default for ValueResolver {
    fn default() -> Self {
        Self::new(Arc::new(ExceptionCatalog::new()))
    }
}
