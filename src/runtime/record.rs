//! Bookkeeping for an active redirection.

use crate::{runtime::method::OriginalInvoker, target::TargetId};

/// An installed redirection on one target.
///
/// A record exists exactly while its slot routes calls through the interceptor. It keeps
/// the original invoker so pass-through calls run the preserved body.
#[derive(Clone, Debug)]
pub struct InterceptionRecord {
    target: TargetId,
    installed_at: u64,
    original: OriginalInvoker,
}

impl InterceptionRecord {
    pub(crate) fn new(target: TargetId, installed_at: u64, original: OriginalInvoker) -> Self {
        InterceptionRecord {
            target,
            installed_at,
            original,
        }
    }

    /// Returns the intercepted target.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Returns the rule generation that caused the installation.
    #[must_use]
    pub fn installed_at(&self) -> u64 {
        self.installed_at
    }

    /// Returns the preserved original behavior.
    #[must_use]
    pub fn original(&self) -> &OriginalInvoker {
        &self.original
    }
}
