//! # mockscope Prelude
//!
//! The types needed to register host methods, attach an agent and inspect what it did.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all mockscope operations
pub use crate::Error;

/// The result type used throughout mockscope
pub use crate::Result;

// ================================================================================================
// Host Side
// ================================================================================================

/// Method identity and signatures
pub use crate::target::{TargetId, TypeSig};

/// Values crossing the call boundary
pub use crate::value::Value;

/// Registering and calling host methods
pub use crate::runtime::{CallResult, MethodDef, MethodHandle, MethodTable};

/// Exceptions observed at call sites
pub use crate::engine::ThrownException;

// ================================================================================================
// Agent
// ================================================================================================

/// Lifecycle and configuration
pub use crate::agent::{attach, Agent, AgentConfig, ConfigSource, ReloadHandle};

/// Inspecting intercepted calls
pub use crate::runtime::{CallEvent, CallJournal, Disposition};

/// Rules
pub use crate::config::{MockRule, RuleAction, RuleSet};
