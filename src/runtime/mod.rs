//! Host-side interception runtime.
//!
//! The runtime is the seam between host code and the rule engine. Host methods are
//! registered in a [`MethodTable`]; each registration yields a slot that can be
//! redirected through the [`Interceptor`] without losing its original behavior.
//!
//! # Key Components
//!
//! - [`MethodTable`] / [`MethodSlot`] / [`MethodHandle`] - Registered methods and their call routing
//! - [`MethodDef`] / [`OriginalInvoker`] - Host method bodies
//! - [`Interceptor`] - Per-call decision and dispatch
//! - [`InterceptionRecord`] - An active redirection
//! - [`DecisionCache`] - Coerced constant substitutes per generation
//! - [`CallJournal`] - Queryable log of intercepted calls

mod cache;
mod interceptor;
mod journal;
mod method;
mod record;
mod table;

pub use cache::DecisionCache;
pub use interceptor::{Decision, Interceptor};
pub use journal::{CallEvent, CallJournal, Disposition, FallbackReason};
pub use method::{CallResult, MethodAttributes, MethodDef, OriginalFn, OriginalInvoker};
pub use record::InterceptionRecord;
pub use table::{MethodHandle, MethodSlot, MethodTable, RegistrationListener, SlotState};
