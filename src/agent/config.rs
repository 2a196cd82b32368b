//! Agent configuration.
//!
//! [`AgentConfig`] controls the optional behavior of an attached agent. Rules are not
//! part of it; they come from the mock configuration document.
//!
//! # Configuration Presets
//!
//! - [`AgentConfig::default()`] - Decision cache and panic catching on, journal off
//! - [`AgentConfig::testing()`] - Default plus the call journal
//! - [`AgentConfig::quiet()`] - Default with per-call substitution logging off
//!
//! # Example
//!
//! ```rust
//! use mockscope::AgentConfig;
//!
//! let config = AgentConfig::testing().with_decision_cache(false);
//! assert!(config.journal);
//!
//! let config = AgentConfig {
//!     log_substitutions: true,
//!     ..AgentConfig::quiet()
//! };
//! assert!(config.log_substitutions);
//! ```

use std::env;

use log::warn;

/// Environment variable enabling the call journal.
pub const ENV_JOURNAL: &str = "MOCKSCOPE_JOURNAL";
/// Environment variable toggling the decision cache.
pub const ENV_CACHE: &str = "MOCKSCOPE_CACHE";
/// Environment variable toggling per-call substitution logging.
pub const ENV_LOG_SUBSTITUTIONS: &str = "MOCKSCOPE_LOG_SUBSTITUTIONS";

/// Behavior switches of an attached agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// Whether intercepted calls are recorded in the call journal.
    pub journal: bool,

    /// Whether coerced values of unconditional literal rules are cached per generation.
    pub decision_cache: bool,

    /// Whether every substitution is logged at `info` level.
    pub log_substitutions: bool,

    /// Whether panics during matching or resolution are caught and degrade to running
    /// the original body.
    pub catch_panics: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            journal: false,
            decision_cache: true,
            log_substitutions: true,
            catch_panics: true,
        }
    }
}

impl AgentConfig {
    /// Configuration for test processes that query the journal.
    #[must_use]
    pub fn testing() -> Self {
        AgentConfig {
            journal: true,
            ..Self::default()
        }
    }

    /// Configuration without per-call logging.
    #[must_use]
    pub fn quiet() -> Self {
        AgentConfig {
            log_substitutions: false,
            ..Self::default()
        }
    }

    /// Default configuration overlaid with the `MOCKSCOPE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overlays the `MOCKSCOPE_*` environment variables that are set.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Some(value) = env_flag(ENV_JOURNAL) {
            self.journal = value;
        }
        if let Some(value) = env_flag(ENV_CACHE) {
            self.decision_cache = value;
        }
        if let Some(value) = env_flag(ENV_LOG_SUBSTITUTIONS) {
            self.log_substitutions = value;
        }
        self
    }

    /// Sets whether calls are journaled.
    #[must_use]
    pub fn with_journal(mut self, enabled: bool) -> Self {
        self.journal = enabled;
        self
    }

    /// Sets whether constant substitutes are cached.
    #[must_use]
    pub fn with_decision_cache(mut self, enabled: bool) -> Self {
        self.decision_cache = enabled;
        self
    }

    /// Sets whether substitutions are logged.
    #[must_use]
    pub fn with_log_substitutions(mut self, enabled: bool) -> Self {
        self.log_substitutions = enabled;
        self
    }

    /// Sets whether engine panics are caught.
    #[must_use]
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Applies one `key=value` option from an attach argument string.
    ///
    /// Returns `false` if the key is not an agent option.
    pub fn apply_option(&mut self, key: &str, value: &str) -> bool {
        let field = match key.trim() {
            "journal" => &mut self.journal,
            "cache" => &mut self.decision_cache,
            "log" | "log_substitutions" => &mut self.log_substitutions,
            "catch_panics" => &mut self.catch_panics,
            _ => return false,
        };
        match parse_flag(value) {
            Some(flag) => *field = flag,
            None => warn!("ignoring agent option {}={}: not a boolean", key, value),
        }
        true
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    let flag = parse_flag(&value);
    if flag.is_none() {
        warn!("ignoring {}={}: not a boolean", name, value);
    }
    flag
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let default = AgentConfig::default();
        assert!(!default.journal);
        assert!(default.decision_cache);
        assert!(default.catch_panics);

        assert!(AgentConfig::testing().journal);
        assert!(!AgentConfig::quiet().log_substitutions);
    }

    #[test]
    fn test_apply_option() {
        let mut config = AgentConfig::default();
        assert!(config.apply_option("journal", "true"));
        assert!(config.apply_option("cache", "off"));
        assert!(config.apply_option("log", "bogus"));
        assert!(!config.apply_option("config", "/tmp/mocks.json"));

        assert!(config.journal);
        assert!(!config.decision_cache);
        assert!(config.log_substitutions);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
