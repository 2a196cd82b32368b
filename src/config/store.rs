//! The published rule set.
//!
//! [`RuleStore`] holds exactly one current [`RuleSet`] behind an [`ArcSwap`]. Readers pin
//! a snapshot with a single atomic load and never block; writers build a complete new set
//! off to the side and publish it with one pointer swap, so no reader ever observes a
//! partially updated mapping. Writers are serialized among themselves.

use std::sync::{Arc, Mutex};

use arc_swap::{ArcSwap, Guard};

use crate::{
    config::rules::{MockRule, RuleSet},
    target::TargetId,
    Result,
};

/// Holder of the currently published rule set.
pub struct RuleStore {
    current: ArcSwap<RuleSet>,
    writer: Mutex<()>,
}

impl RuleStore {
    /// Creates a store holding an empty rule set at generation 0.
    #[must_use]
    pub fn new() -> Self {
        RuleStore {
            current: ArcSwap::from_pointee(RuleSet::empty(0)),
            writer: Mutex::new(()),
        }
    }

    /// Pins the current rule set for the duration of one call.
    ///
    /// This is the hot-path accessor: it performs no allocation and no reference count
    /// update in the common case.
    #[must_use]
    pub fn pin(&self) -> Guard<Arc<RuleSet>> {
        self.current.load()
    }

    /// Returns an owned handle to the current rule set.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Returns the generation of the current rule set.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Returns the rules for `target` in match order; empty for untracked targets.
    #[must_use]
    pub fn lookup(&self, target: &TargetId) -> Arc<[Arc<MockRule>]> {
        self.current
            .load()
            .lookup_shared(target)
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Parses a document into a rule set without publishing it.
    ///
    /// The result is tagged with the generation it would receive if published now.
    ///
    /// # Errors
    ///
    /// Returns the parse error of [`RuleSet::parse`].
    pub fn load(&self, data: &[u8]) -> Result<RuleSet> {
        RuleSet::parse(data, self.generation() + 1)
    }

    /// Parses a document and publishes it as the next generation.
    ///
    /// On failure the current rule set stays published and the generation is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the parse error of [`RuleSet::parse`].
    pub fn reload(&self, data: &[u8]) -> Result<Arc<RuleSet>> {
        let _writer = lock!(self.writer);
        let next = RuleSet::parse(data, self.current.load().generation() + 1)?;
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        Ok(next)
    }

    /// Publishes an already built rule set as the next generation.
    pub fn publish(&self, set: RuleSet) -> Arc<RuleSet> {
        let _writer = lock!(self.writer);
        let generation = self.current.load().generation() + 1;
        let next = Arc::new(set.with_generation(generation));
        self.current.store(Arc::clone(&next));
        next
    }

    /// Publishes an empty rule set as the next generation.
    pub fn clear(&self) -> Arc<RuleSet> {
        self.publish(RuleSet::empty(0))
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}
