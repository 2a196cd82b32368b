//! Mock configuration: document schema, validated rules and the rule store.
//!
//! # Document Format
//!
//! ```json
//! {
//!   "rules": [
//!     { "target": "Service.fetch(String)", "condition": "arg0 == \"missing\"",
//!       "action": { "throw": { "type": "NotFoundException", "message": "not found" } } },
//!     { "target": "Service.fetch(String)", "action": { "return": "default" } }
//!   ],
//!   "mockMethods": [
//!     { "className": "com.acme.Repo", "methodName": "count", "signature": "()",
//!       "returnValue": "3" }
//!   ]
//! }
//! ```
//!
//! - [`schema`] - Serde model of the document
//! - [`RuleSet`] - Validated, immutable rules of one generation
//! - [`RuleStore`] - Atomically published current rule set

pub mod schema;

mod rules;
mod store;

pub use rules::{MockRule, RuleAction, RuleSet};
pub use store::RuleStore;
