//! Record of intercepted calls, queried by the test process.
//!
//! Events are appended lock-free from any thread. The journal is off unless the agent is
//! configured with [`crate::AgentConfig::journal`]; a disabled journal drops events.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;
use strum::Display;

use crate::target::TargetId;

/// Why an intercepted call fell back to its original body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum FallbackReason {
    /// The substitute did not fit the declared return type
    TypeMismatch,
    /// The exception type could not be raised
    ExceptionUnavailable,
    /// A computed substitute faulted
    EvaluationFault,
    /// Matching or resolution panicked
    EnginePanic,
}

/// How an intercepted call was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// A rule returned a substitute value
    Substituted,
    /// A rule raised a substitute exception
    Thrown,
    /// A rule explicitly delegated to the original
    Delegated,
    /// No rule applied; the original ran
    Passthrough,
    /// A rule applied but could not be honored; the original ran
    Fallback(FallbackReason),
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Substituted => f.write_str("Substituted"),
            Disposition::Thrown => f.write_str("Thrown"),
            Disposition::Delegated => f.write_str("Delegated"),
            Disposition::Passthrough => f.write_str("Passthrough"),
            Disposition::Fallback(reason) => write!(f, "Fallback({reason})"),
        }
    }
}

impl Disposition {
    /// Returns `true` if the original body did not run.
    #[must_use]
    pub fn is_substitute(&self) -> bool {
        matches!(self, Disposition::Substituted | Disposition::Thrown)
    }
}

/// One intercepted call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallEvent {
    /// Called method
    pub target: TargetId,
    /// Rule generation the call resolved against
    pub generation: u64,
    /// Declaration index of the rule that applied, if any
    pub rule: Option<usize>,
    /// What happened
    pub disposition: Disposition,
}

/// Append-only journal of [`CallEvent`]s.
pub struct CallJournal {
    events: ArcSwap<boxcar::Vec<CallEvent>>,
    enabled: AtomicBool,
}

impl CallJournal {
    /// Creates a journal; a disabled journal records nothing.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        CallJournal {
            events: ArcSwap::from_pointee(boxcar::Vec::new()),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Returns `true` if events are recorded.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turns recording on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Appends an event.
    pub fn record(&self, event: CallEvent) {
        if self.is_enabled() {
            self.events.load().push(event);
        }
    }

    /// Returns a copy of all events in append order.
    #[must_use]
    pub fn events(&self) -> Vec<CallEvent> {
        let events = self.events.load_full();
        events.iter().map(|(_, event)| event.clone()).collect()
    }

    /// Returns the events of `target` in append order.
    #[must_use]
    pub fn events_for(&self, target: &TargetId) -> Vec<CallEvent> {
        let events = self.events.load_full();
        events
            .iter()
            .filter(|(_, event)| event.target == *target)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Returns the number of recorded calls to `target`.
    #[must_use]
    pub fn calls_to(&self, target: &TargetId) -> usize {
        self.count(|event| event.target == *target)
    }

    /// Returns the number of calls to `target` answered by a substitute.
    #[must_use]
    pub fn substitution_count(&self, target: &TargetId) -> usize {
        self.count(|event| event.target == *target && event.disposition.is_substitute())
    }

    /// Returns `true` if any call to `target` was answered by a substitute.
    #[must_use]
    pub fn was_substituted(&self, target: &TargetId) -> bool {
        self.substitution_count(target) > 0
    }

    /// Returns the number of events satisfying `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CallEvent) -> bool,
    {
        let events = self.events.load_full();
        events.iter().filter(|(_, event)| predicate(event)).count()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.load().count()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards all events.
    pub fn reset(&self) {
        self.events.store(Arc::new(boxcar::Vec::new()));
    }
}

impl Default for CallJournal {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(target: &TargetId, disposition: Disposition) -> CallEvent {
        CallEvent {
            target: target.clone(),
            generation: 1,
            rule: None,
            disposition,
        }
    }

    #[test]
    fn test_queries() {
        let add = TargetId::method("Calc", "add", &["int", "int"]).unwrap();
        let sub = TargetId::method("Calc", "sub", &["int", "int"]).unwrap();
        let journal = CallJournal::new(true);

        journal.record(event(&add, Disposition::Substituted));
        journal.record(event(&add, Disposition::Passthrough));
        journal.record(event(
            &sub,
            Disposition::Fallback(FallbackReason::TypeMismatch),
        ));

        assert_eq!(journal.len(), 3);
        assert_eq!(journal.calls_to(&add), 2);
        assert_eq!(journal.substitution_count(&add), 1);
        assert!(journal.was_substituted(&add));
        assert!(!journal.was_substituted(&sub));
        assert_eq!(journal.events_for(&sub).len(), 1);

        journal.reset();
        assert!(journal.is_empty());
    }

    #[test]
    fn test_disabled_drops_events() {
        let add = TargetId::method("Calc", "add", &["int", "int"]).unwrap();
        let journal = CallJournal::default();
        journal.record(event(&add, Disposition::Substituted));
        assert!(journal.is_empty());
    }

    #[test]
    fn test_disposition_display() {
        assert_eq!(Disposition::Passthrough.to_string(), "Passthrough");
        assert_eq!(
            Disposition::Fallback(FallbackReason::EnginePanic).to_string(),
            "Fallback(EnginePanic)"
        );
    }

    #[test]
    fn test_concurrent_append() {
        let add = TargetId::method("Calc", "add", &["int", "int"]).unwrap();
        let journal = Arc::new(CallJournal::new(true));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let journal = Arc::clone(&journal);
                let add = add.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        journal.record(event(&add, Disposition::Substituted));
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }
        assert_eq!(journal.calls_to(&add), 1000);
    }
}
