//! Rule selection for one call.
//!
//! Matching walks a target's rules in their fixed order (priority, then declaration)
//! and selects the first enabled rule whose condition is absent or holds for the call
//! arguments. Conditions are pure expressions; a condition that faults while being
//! evaluated is treated exactly like one that evaluated to `false`.

use std::sync::Arc;

use log::trace;

use crate::{
    config::{MockRule, RuleSet},
    target::TargetId,
    value::Value,
};

/// Returns `true` if `rule` applies to a call with `args`.
///
/// Disabled rules never apply. Condition faults are logged at `trace` level and count as
/// "does not apply".
#[must_use]
pub fn rule_applies(rule: &MockRule, args: &[Value]) -> bool {
    if !rule.is_enabled() {
        return false;
    }
    let Some(condition) = rule.condition() else {
        return true;
    };
    match condition.test(args) {
        Ok(holds) => holds,
        Err(err) => {
            trace!(
                "condition '{}' of rule #{} on {} faulted, treating as false: {}",
                condition,
                rule.index(),
                rule.target(),
                err
            );
            false
        }
    }
}

/// Returns the first rule of `rules` that applies to `args`.
#[must_use]
pub fn first_match<'a>(rules: &'a [Arc<MockRule>], args: &[Value]) -> Option<&'a Arc<MockRule>> {
    rules.iter().find(|rule| rule_applies(rule, args))
}

/// Selects the rule for a call to `target` from a pinned rule set.
///
/// A call sees a single configuration because the caller pins one [`RuleSet`] for the
/// whole decision. `generation` is the generation the caller expects that set to carry;
/// a set of any other generation yields no match, and the call runs the original.
#[must_use]
pub fn find_match<'a>(
    rules: &'a RuleSet,
    target: &TargetId,
    args: &[Value],
    generation: u64,
) -> Option<&'a Arc<MockRule>> {
    if rules.generation() != generation {
        trace!(
            "rule set generation {} does not match expected {} for {}",
            rules.generation(),
            generation,
            target
        );
        return None;
    }
    first_match(rules.lookup(target), args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(json: &str) -> RuleSet {
        RuleSet::parse(json.as_bytes(), 1).unwrap()
    }

    fn fetch() -> TargetId {
        TargetId::parse("Service.fetch(String)").unwrap()
    }

    #[test]
    fn test_first_declared_wins_on_tie() {
        let set = rules(
            r#"{ "rules": [
                { "target": "Service.fetch(String)", "label": "a", "action": { "return": "a" } },
                { "target": "Service.fetch(String)", "label": "b", "action": { "return": "b" } }
            ] }"#,
        );
        let rule = find_match(&set, &fetch(), &[Value::str("x")], 1).unwrap();
        assert_eq!(rule.label(), Some("a"));
    }

    #[test]
    fn test_other_generation_never_matches() {
        let set = rules(
            r#"{ "rules": [ { "target": "Service.fetch(String)", "action": { "return": "a" } } ] }"#,
        );
        assert!(find_match(&set, &fetch(), &[Value::str("x")], 1).is_some());
        assert!(find_match(&set, &fetch(), &[Value::str("x")], 2).is_none());
    }

    #[test]
    fn test_conditions_and_disabled_rules() {
        let set = rules(
            r#"{ "rules": [
                { "target": "Service.fetch(String)", "label": "off", "enabled": false,
                  "action": "delegate" },
                { "target": "Service.fetch(String)", "label": "missing",
                  "condition": "arg0 == \"missing\"",
                  "action": { "throw": { "type": "IllegalStateException" } } },
                { "target": "Service.fetch(String)", "label": "default",
                  "action": { "return": "default" } }
            ] }"#,
        );

        let hit = find_match(&set, &fetch(), &[Value::str("missing")], 1).unwrap();
        assert_eq!(hit.label(), Some("missing"));
        let miss = find_match(&set, &fetch(), &[Value::str("x")], 1).unwrap();
        assert_eq!(miss.label(), Some("default"));
    }

    #[test]
    fn test_faulting_condition_is_false() {
        let set = rules(
            r#"{ "rules": [
                { "target": "Service.fetch(String)", "label": "faulty",
                  "condition": "arg3 > 1", "action": "delegate" },
                { "target": "Service.fetch(String)", "label": "fallback",
                  "action": { "return": "ok" } }
            ] }"#,
        );
        let rule = find_match(&set, &fetch(), &[Value::str("x")], 1).unwrap();
        assert_eq!(rule.label(), Some("fallback"));
    }

    #[test]
    fn test_untracked_target() {
        let set = rules(r#"{ "rules": [] }"#);
        assert!(find_match(&set, &fetch(), &[], 1).is_none());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let set = rules(
            r#"{ "rules": [
                { "target": "Service.fetch(String)", "condition": "len(arg0) > 2",
                  "label": "long", "action": { "return": "long" } },
                { "target": "Service.fetch(String)", "label": "short",
                  "action": { "return": "short" } }
            ] }"#,
        );
        for _ in 0..100 {
            let args = [Value::str("abcd")];
            assert_eq!(find_match(&set, &fetch(), &args, 1).unwrap().label(), Some("long"));
        }
    }
}
