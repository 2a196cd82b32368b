//! Per-call decision engine.
//!
//! - [`matcher`] - Selects the applicable rule for a call
//! - [`resolver`] - Turns the selected rule into an [`Outcome`]
//! - [`exception`] - Exceptions raised at call sites and the catalog of raisable types

pub mod exception;
pub mod matcher;
pub mod resolver;

pub use exception::{ExceptionCatalog, ThrownException};
pub use resolver::{Outcome, ValueResolver};
