use thiserror::Error;

use crate::target::TargetId;

macro_rules! config_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::ConfigParse {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::ConfigParse {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors produced by the engine never leave an intercepted call: the interception layer
/// contains every per-call error and falls back to the original body. They surface
/// only from administrative operations (loading, reloading, registering methods) and from the
/// lower-level building blocks when used directly.
///
/// Exceptions raised by the host program (or configured as substitutes) are not errors of this
/// crate; they travel as [`crate::ThrownException`] inside a call result.
///
/// # Error Categories
///
/// ## Configuration Errors
/// - [`Error::ConfigParse`] - Malformed configuration document or rule
/// - [`Error::Json`] - The document is not valid JSON
/// - [`Error::FileError`] - The configuration source could not be read
/// - [`Error::Expression`] - A condition or computed expression failed to compile
///
/// ## Per-target and Per-call Errors
/// - [`Error::TargetResolution`] - A configured target is not present in the method table
/// - [`Error::TypeMismatch`] - A substitute value is not representable as the return type
/// - [`Error::ExceptionConstruction`] - A configured exception type is unavailable
/// - [`Error::Evaluation`] - A condition or computed expression faulted at call time
///
/// ## Lifecycle Errors
/// - [`Error::AlreadyInitialized`] - `initialize` was called a second time
/// - [`Error::NotInitialized`] - An operation requires an initialized agent
/// - [`Error::DuplicateTarget`] - A method was registered twice
/// - [`Error::RecursionLimit`] - An expression nests deeper than allowed
///
/// # Examples
///
/// ```rust
/// use mockscope::{Error, RuleSet};
///
/// match RuleSet::parse(br#"{ "rules": [ { "target": ".add()", "action": "delegate" } ] }"#, 1) {
///     Ok(_) => unreachable!(),
///     Err(Error::ConfigParse { message, .. }) => println!("bad config: {message}"),
///     Err(e) => println!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration document could not be turned into a rule set.
    ///
    /// This covers unresolvable targets, malformed type signatures, and action payloads
    /// that do not type-check against the declared return type. The error includes the
    /// source location where the problem was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed configuration - {file}:{line}: {message}")]
    ConfigParse {
        /// The message to be printed for the ConfigParse error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The configuration document is not valid JSON or does not follow the schema.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors raised while reading a configuration source.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A condition or computed expression could not be compiled.
    #[error("Invalid expression at offset {position}: {message}")]
    Expression {
        /// Description of the syntax problem
        message: String,
        /// Byte offset into the expression source
        position: usize,
    },

    /// A configured target is not present in the running program.
    ///
    /// Raised per target by the transform planner. The target stays uninstalled and
    /// all other targets proceed normally.
    #[error("Target could not be resolved - {0}")]
    TargetResolution(TargetId),

    /// A substitute value cannot be represented as the declared return type.
    #[error("Value of type {found} is not representable as {expected}")]
    TypeMismatch {
        /// The declared return type
        expected: String,
        /// The kind of value that was produced
        found: String,
    },

    /// The named exception type is not available to the engine.
    #[error("Exception type '{0}' is not available")]
    ExceptionConstruction(String),

    /// A condition or computed expression faulted while being evaluated.
    ///
    /// Inside the matcher this is treated as "condition false" and never surfaced.
    #[error("Evaluation fault - {0}")]
    Evaluation(String),

    /// Expression nesting exceeded the allowed depth.
    ///
    /// The associated value shows the limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// The same target was registered twice in one method table.
    #[error("Target is already registered - {0}")]
    DuplicateTarget(TargetId),

    /// The agent has already been initialized.
    #[error("The agent has already been initialized")]
    AlreadyInitialized,

    /// The agent is not initialized (or has been shut down).
    #[error("The agent is not initialized")]
    NotInitialized,
}
