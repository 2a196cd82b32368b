//! Attaching the engine to a host.
//!
//! - [`Agent`] - Lifecycle controller owning the engine state of one method table
//! - [`attach`] - Attach entry point taking the host's argument string
//! - [`ConfigSource`] - Where the mock configuration is read from
//! - [`AgentConfig`] - Optional agent behavior
//! - [`ReloadHandle`] - Administrative reload trigger usable from any thread

mod config;
mod controller;
mod source;

pub use config::{AgentConfig, ENV_CACHE, ENV_JOURNAL, ENV_LOG_SUBSTITUTIONS};
pub use controller::{attach, Agent, AgentState, ReloadHandle};
pub use source::{
    parse_agent_args, ConfigSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, ENV_CONFIG,
};
