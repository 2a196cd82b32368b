// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # mockscope
//!
//! Runtime method interception for test processes. A host registers the methods that
//! may be mocked in a [`MethodTable`]; an attached [`Agent`] reads a declarative mock
//! configuration and redirects the targeted methods so that each call either returns a
//! substitute value, raises a substitute exception, or runs the original body
//! unchanged. Configurations can be reloaded while the host keeps calling.
//!
//! ## Features
//!
//! - **Declarative rules** - JSON configuration with conditions, priorities, literal,
//!   computed, throwing and delegating actions
//! - **Lock-free call path** - Rule sets are published atomically; readers never block
//! - **Fail-safe** - Any rule that cannot be honored falls back to the original body
//! - **Hot reload** - Install/remove plans computed as a symmetric difference of targets
//! - **Call journal** - Optional queryable record of how every call was handled
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use mockscope::prelude::*;
//!
//! let table = Arc::new(MethodTable::new());
//! let fetch = table.register(MethodDef::new(
//!     TargetId::method("Service", "fetch", &["String"])?,
//!     TypeSig::STRING,
//!     |args: &[Value]| Ok(Value::str(format!("fetched:{}", args[0]))),
//! ))?;
//!
//! let agent = Agent::new(Arc::clone(&table), AgentConfig::testing());
//! agent.initialize(&ConfigSource::bytes(r#"{ "rules": [
//!     { "target": "Service.fetch(String)", "condition": "arg0 == \"missing\"",
//!       "action": { "throw": { "type": "NoSuchElementException", "message": "not found" } } },
//!     { "target": "Service.fetch(String)", "action": { "return": "default" } }
//! ] }"#))?;
//!
//! assert_eq!(fetch.call(&[Value::str("x")]), Ok(Value::str("default")));
//! let thrown = fetch.call(&[Value::str("missing")]).unwrap_err();
//! assert_eq!(thrown.message(), "not found");
//! assert_eq!(agent.journal().substitution_count(fetch.target()), 2);
//! # Ok::<(), mockscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Configuration schema, validated rule sets and the rule store
//! - [`engine`] - Matching rules and resolving them into call outcomes
//! - [`runtime`] - Method table, slots, interception, journal
//! - [`planner`] - Installing and removing redirections
//! - [`agent`] - Lifecycle controller and attach entry point
//! - [`expr`] - The condition and computed-value expression language
//!
//! ## Error Handling
//!
//! Administrative operations return [`Result<T, Error>`](Result). Calls through
//! intercepted methods never surface an [`Error`]: their `Err` arm carries a
//! [`ThrownException`], exactly as the original method would have thrown it.
//!
//! ```rust
//! use mockscope::{Error, RuleSet};
//!
//! match RuleSet::parse(br#"{ "rules": [ { "action": "delegate" } ] }"#, 1) {
//!     Ok(_) => unreachable!(),
//!     Err(Error::ConfigParse { message, .. }) => println!("bad config: {}", message),
//!     Err(e) => println!("other error: {}", e),
//! }
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use mockscope::prelude::*;
///
/// let target = TargetId::parse("Calculator.add(int,int)")?;
/// assert_eq!(target.arity(), 2);
/// # Ok::<(), mockscope::Error>(())
/// ```
pub mod prelude;

/// Identity of interceptable methods and their type signatures.
pub mod target;

/// Runtime values passed to and returned from host methods.
pub mod value;

/// Expression language for rule conditions and computed substitutes.
pub mod expr;

/// Mock configuration documents, rule sets and the rule store.
pub mod config;

/// Per-call rule matching and outcome resolution.
pub mod engine;

/// Method table, call routing and interception.
pub mod runtime;

/// Install/remove planning for redirections.
pub mod planner;

/// Agent lifecycle and attach entry point.
pub mod agent;

/// `mockscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `mockscope` Error type
pub use error::Error;

pub use agent::{attach, Agent, AgentConfig, AgentState, ConfigSource, ReloadHandle};
pub use config::{MockRule, RuleAction, RuleSet, RuleStore};
pub use engine::{ExceptionCatalog, Outcome, ThrownException, ValueResolver};
pub use planner::{PlanReport, TransformPlan, TransformPlanner};
pub use runtime::{
    CallEvent, CallJournal, CallResult, Disposition, FallbackReason, InterceptionRecord,
    MethodDef, MethodHandle, MethodTable, OriginalInvoker, SlotState,
};
pub use target::{PrimitiveKind, TargetId, TypeSig};
pub use value::{Literal, Value};
