//! Where a mock configuration comes from.

use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

use log::warn;

use crate::{agent::config::AgentConfig, Result};

/// Environment variable naming the mock configuration file.
pub const ENV_CONFIG: &str = "MOCKSCOPE_CONFIG";

/// Directory below the system temp directory where launchers drop configurations.
pub const DEFAULT_CONFIG_DIR: &str = "mock-runner";

/// File name of the launcher-written configuration.
pub const DEFAULT_CONFIG_FILE: &str = "mock-config.json";

/// A mock configuration document to load.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// JSON document on disk
    Path(PathBuf),
    /// JSON document in memory
    Bytes(Vec<u8>),
    /// No configuration: nothing is intercepted
    #[default]
    Empty,
}

impl ConfigSource {
    /// Creates a source reading `path`.
    pub fn path(path: impl AsRef<Path>) -> Self {
        ConfigSource::Path(path.as_ref().to_path_buf())
    }

    /// Creates a source from an in-memory document.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        ConfigSource::Bytes(data.into())
    }

    /// Returns the location a launcher writes its configuration to.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env::temp_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE)
    }

    /// Returns the source named by `MOCKSCOPE_CONFIG`.
    ///
    /// Without the variable, a launcher-written file at [`ConfigSource::default_path`] is
    /// used if present, otherwise [`ConfigSource::Empty`].
    #[must_use]
    pub fn from_env() -> Self {
        match env::var_os(ENV_CONFIG) {
            Some(path) if !path.is_empty() => ConfigSource::Path(PathBuf::from(path)),
            _ => {
                let fallback = Self::default_path();
                if fallback.is_file() {
                    ConfigSource::Path(fallback)
                } else {
                    ConfigSource::Empty
                }
            }
        }
    }

    /// Extracts the configuration source from an attach argument string.
    ///
    /// The string is either a bare path or comma separated `key=value` pairs in which
    /// `config=<path>` names the file. An empty string yields [`ConfigSource::Empty`].
    ///
    /// ```rust
    /// use mockscope::agent::ConfigSource;
    ///
    /// assert_eq!(
    ///     ConfigSource::from_agent_args("/tmp/mocks.json"),
    ///     ConfigSource::path("/tmp/mocks.json")
    /// );
    /// assert_eq!(
    ///     ConfigSource::from_agent_args("journal=true,config=/tmp/mocks.json"),
    ///     ConfigSource::path("/tmp/mocks.json")
    /// );
    /// assert_eq!(ConfigSource::from_agent_args(""), ConfigSource::Empty);
    /// ```
    #[must_use]
    pub fn from_agent_args(args: &str) -> Self {
        parse_agent_args(args, AgentConfig::default()).0
    }

    /// Reads the document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if a path cannot be read.
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            ConfigSource::Path(path) => Ok(fs::read(path)?),
            ConfigSource::Bytes(data) => Ok(data.clone()),
            ConfigSource::Empty => Ok(Vec::new()),
        }
    }

    /// Returns `true` for [`ConfigSource::Empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, ConfigSource::Empty)
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Path(path) => write!(f, "{}", path.display()),
            ConfigSource::Bytes(data) => write!(f, "<{} bytes>", data.len()),
            ConfigSource::Empty => f.write_str("<none>"),
        }
    }
}

/// Splits an attach argument string into the configuration source and agent options.
///
/// Keys other than `config` are applied to `config` with [`AgentConfig::apply_option`];
/// a segment without `=` is taken as the path.
#[must_use]
pub fn parse_agent_args(args: &str, mut config: AgentConfig) -> (ConfigSource, AgentConfig) {
    let args = args.trim();
    if args.is_empty() {
        return (ConfigSource::Empty, config);
    }
    if !args.contains('=') {
        return (ConfigSource::path(args), config);
    }

    let mut source = ConfigSource::Empty;
    for pair in args.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        match pair.split_once('=') {
            Some(("config", path)) if !path.trim().is_empty() => {
                source = ConfigSource::path(path.trim());
            }
            Some((key, value)) => {
                if !config.apply_option(key, value) {
                    warn!("ignoring unknown agent option '{}'", key);
                }
            }
            None => source = ConfigSource::path(pair),
        }
    }
    (source, config)
}
