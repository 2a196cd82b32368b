//! Cache of coerced constant substitutes.
//!
//! Unconditional literal rules produce the same value on every call. The cache keeps the
//! coerced value per target, tagged with the generation and rule it came from; an entry
//! whose tag does not match the caller's pinned rule is ignored and later replaced.

use dashmap::DashMap;

use crate::{target::TargetId, value::Value};

#[derive(Clone, Debug)]
struct CachedValue {
    generation: u64,
    rule: usize,
    value: Value,
}

/// Per-target cache of constant substitute values.
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: DashMap<TargetId, CachedValue>,
}

impl DecisionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `rule` of `target` in `generation`.
    #[must_use]
    pub fn get(&self, target: &TargetId, generation: u64, rule: usize) -> Option<Value> {
        let entry = self.entries.get(target)?;
        (entry.generation == generation && entry.rule == rule).then(|| entry.value.clone())
    }

    /// Stores a value unless a newer generation already holds the slot.
    pub fn insert(&self, target: &TargetId, generation: u64, rule: usize, value: Value) {
        let fresh = CachedValue {
            generation,
            rule,
            value,
        };
        self.entries
            .entry(target.clone())
            .and_modify(|cached| {
                if cached.generation <= generation {
                    *cached = fresh.clone();
                }
            })
            .or_insert_with(|| fresh.clone());
    }

    /// Drops the entry for `target`.
    pub fn invalidate(&self, target: &TargetId) {
        self.entries.remove(target);
    }

    /// Drops every entry older than `generation`.
    pub fn retain_generation(&self, generation: u64) {
        self.entries.retain(|_, cached| cached.generation >= generation);
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns the number of cached targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetId {
        TargetId::method("Calc", "add", &["int", "int"]).unwrap()
    }

    #[test]
    fn test_generation_tag() {
        let cache = DecisionCache::new();
        cache.insert(&target(), 1, 0, Value::Int(42));
        assert_eq!(cache.get(&target(), 1, 0), Some(Value::Int(42)));
        assert_eq!(cache.get(&target(), 2, 0), None);
        assert_eq!(cache.get(&target(), 1, 1), None);

        cache.insert(&target(), 2, 0, Value::Int(7));
        assert_eq!(cache.get(&target(), 2, 0), Some(Value::Int(7)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_older_generation_does_not_overwrite() {
        let cache = DecisionCache::new();
        cache.insert(&target(), 3, 0, Value::Int(3));
        cache.insert(&target(), 2, 0, Value::Int(2));
        assert_eq!(cache.get(&target(), 3, 0), Some(Value::Int(3)));
    }

    #[test]
    fn test_retain_generation() {
        let cache = DecisionCache::new();
        cache.insert(&target(), 1, 0, Value::Int(1));
        cache.retain_generation(2);
        assert!(cache.is_empty());
    }
}
