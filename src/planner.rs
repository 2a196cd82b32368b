//! Installing and removing redirections.
//!
//! The planner keeps the set of targets that currently carry a redirection and brings it
//! in line with a rule set: targets the rules name are installed, targets they no longer
//! name are removed. Every mutation of the installed set happens under one mutex, so
//! installs and removals are serialized against each other but never against calls,
//! which only ever read slot pointers.
//!
//! # Examples
//!
//! ```rust
//! use std::collections::HashSet;
//! use mockscope::{planner::TransformPlan, RuleSet, TargetId};
//!
//! let rules = RuleSet::parse(
//!     br#"{ "rules": [ { "target": "Calc.add(int,int)", "action": { "return": 1 } } ] }"#,
//!     1,
//! )?;
//! let installed: HashSet<TargetId> = [TargetId::parse("Calc.sub(int,int)")?].into();
//!
//! let plan = TransformPlan::compute(&installed, &rules);
//! assert_eq!(plan.install()[0].to_string(), "Calc.add(int,int)");
//! assert_eq!(plan.remove()[0].to_string(), "Calc.sub(int,int)");
//! # Ok::<(), mockscope::Error>(())
//! ```

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use log::{debug, warn};

use crate::{
    config::RuleSet,
    runtime::{Interceptor, MethodSlot, MethodTable, SlotState},
    target::TargetId,
    Error,
};

/// Targets to install and remove to move from one rule set to another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformPlan {
    install: Vec<TargetId>,
    remove: Vec<TargetId>,
    generation: u64,
}

impl TransformPlan {
    /// Computes the symmetric difference between `installed` and the targets of `rules`.
    ///
    /// Both lists are ordered by target descriptor so a plan is reproducible.
    #[must_use]
    pub fn compute(installed: &HashSet<TargetId>, rules: &RuleSet) -> Self {
        let mut install: Vec<TargetId> = rules
            .targets()
            .filter(|target| !installed.contains(*target))
            .cloned()
            .collect();
        let mut remove: Vec<TargetId> = installed
            .iter()
            .filter(|target| !rules.contains(target))
            .cloned()
            .collect();
        install.sort_by_cached_key(ToString::to_string);
        remove.sort_by_cached_key(ToString::to_string);

        TransformPlan {
            install,
            remove,
            generation: rules.generation(),
        }
    }

    /// Returns the targets to install.
    #[must_use]
    pub fn install(&self) -> &[TargetId] {
        &self.install
    }

    /// Returns the targets to remove.
    #[must_use]
    pub fn remove(&self) -> &[TargetId] {
        &self.remove
    }

    /// Returns the generation of the rule set the plan was computed for.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.remove.is_empty()
    }
}

/// Result of applying a [`TransformPlan`].
#[derive(Debug, Default)]
pub struct PlanReport {
    /// Generation the plan was computed for
    pub generation: u64,
    /// Targets that now carry a redirection
    pub installed: Vec<TargetId>,
    /// Targets whose redirection was removed
    pub removed: Vec<TargetId>,
    /// Pinned targets that switched to bypassing instead of being removed
    pub bypassed: Vec<TargetId>,
    /// Per-target failures; the rest of the plan was still applied
    pub warnings: Vec<Error>,
}

impl PlanReport {
    /// Returns `true` if every target of the plan was handled.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

struct PlannerState {
    installed: HashSet<TargetId>,
    accepting: bool,
}

/// Single writer for the installed redirections of one agent.
pub struct TransformPlanner {
    table: Arc<MethodTable>,
    interceptor: Arc<Interceptor>,
    state: Mutex<PlannerState>,
}

impl TransformPlanner {
    /// Creates a planner redirecting slots of `table` through `interceptor`.
    #[must_use]
    pub fn new(table: Arc<MethodTable>, interceptor: Arc<Interceptor>) -> Self {
        TransformPlanner {
            table,
            interceptor,
            state: Mutex::new(PlannerState {
                installed: HashSet::new(),
                accepting: false,
            }),
        }
    }

    /// Plans the transition from the installed targets to `rules`.
    #[must_use]
    pub fn plan(&self, rules: &RuleSet) -> TransformPlan {
        TransformPlan::compute(&lock!(self.state).installed, rules)
    }

    /// Applies a previously computed plan.
    ///
    /// Installing an already installed target re-arms it; removing an absent one is a
    /// no-op, so a stale plan is harmless.
    pub fn apply(&self, plan: &TransformPlan) -> PlanReport {
        let mut state = lock!(self.state);
        self.apply_locked(&mut state, plan)
    }

    /// Plans and applies the transition to `rules` in one step.
    ///
    /// Also enables installation of methods registered from now on.
    pub fn sync(&self, rules: &RuleSet) -> PlanReport {
        let mut state = lock!(self.state);
        state.accepting = true;
        let plan = TransformPlan::compute(&state.installed, rules);
        self.apply_locked(&mut state, &plan)
    }

    /// Installs a newly registered slot if the current rule set targets it.
    ///
    /// Returns `true` if a redirection was installed.
    pub fn install_late(&self, slot: &Arc<MethodSlot>) -> bool {
        let mut state = lock!(self.state);
        if !state.accepting || state.installed.contains(slot.target()) {
            return false;
        }
        let rules = self.interceptor.store().snapshot();
        if !rules.contains(slot.target()) {
            return false;
        }
        slot.install(rules.generation(), Arc::clone(&self.interceptor));
        state.installed.insert(slot.target().clone());
        debug!(
            "installed redirection on late registered {} [gen {}]",
            slot.target(),
            rules.generation()
        );
        true
    }

    /// Removes every redirection and stops accepting late registrations.
    pub fn remove_all(&self) -> PlanReport {
        let mut state = lock!(self.state);
        state.accepting = false;
        let mut remove: Vec<TargetId> = state.installed.iter().cloned().collect();
        remove.sort_by_cached_key(ToString::to_string);
        let plan = TransformPlan {
            install: Vec::new(),
            remove,
            generation: self.interceptor.store().generation(),
        };
        self.apply_locked(&mut state, &plan)
    }

    /// Returns the targets that currently carry an active redirection.
    #[must_use]
    pub fn installed(&self) -> Vec<TargetId> {
        let mut targets: Vec<TargetId> = lock!(self.state).installed.iter().cloned().collect();
        targets.sort_by_cached_key(ToString::to_string);
        targets
    }

    fn apply_locked(&self, state: &mut PlannerState, plan: &TransformPlan) -> PlanReport {
        let mut report = PlanReport {
            generation: plan.generation(),
            ..PlanReport::default()
        };

        for target in plan.install() {
            match self.table.slot(target) {
                Some(slot) => {
                    slot.install(plan.generation(), Arc::clone(&self.interceptor));
                    state.installed.insert(target.clone());
                    debug!("installed redirection on {} [gen {}]", target, plan.generation());
                    report.installed.push(target.clone());
                }
                None => {
                    let err = Error::TargetResolution(target.clone());
                    warn!("{}", err);
                    report.warnings.push(err);
                }
            }
        }

        for target in plan.remove() {
            state.installed.remove(target);
            let Some(slot) = self.table.slot(target) else {
                continue;
            };
            match slot.remove() {
                SlotState::Bypassing => {
                    debug!("{} is pinned, bypassing instead of removing", target);
                    report.bypassed.push(target.clone());
                }
                _ => {
                    debug!("removed redirection from {}", target);
                    report.removed.push(target.clone());
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::AgentConfig,
        config::RuleStore,
        engine::ExceptionCatalog,
        runtime::{CallJournal, MethodDef},
        target::TypeSig,
        test::{calculator_table, rules_json, CALCULATOR_ADD, CALCULATOR_DIVIDE},
        value::Value,
    };

    fn planner(table: Arc<MethodTable>) -> (TransformPlanner, Arc<RuleStore>) {
        let store = Arc::new(RuleStore::new());
        let interceptor = Arc::new(Interceptor::new(
            Arc::clone(&store),
            Arc::new(ExceptionCatalog::new()),
            Arc::new(CallJournal::new(false)),
            AgentConfig::default(),
        ));
        (TransformPlanner::new(table, interceptor), store)
    }

    fn target(descriptor: &str) -> TargetId {
        TargetId::parse(descriptor).unwrap()
    }

    #[test]
    fn test_compute_symmetric_difference() {
        let rules = RuleSet::parse(
            &rules_json(&[
                r#"{ "target": "Calculator.add(int,int)", "action": { "return": 1 } }"#,
                r#"{ "target": "Calculator.add(int,int)", "action": { "return": 2 } }"#,
                r#"{ "target": "Service.fetch(String)", "action": "delegate" }"#,
            ]),
            3,
        )
        .unwrap();
        let installed: HashSet<TargetId> =
            [target(CALCULATOR_ADD), target(CALCULATOR_DIVIDE)].into();

        let plan = TransformPlan::compute(&installed, &rules);
        assert_eq!(plan.install(), &[target("Service.fetch(String)")]);
        assert_eq!(plan.remove(), &[target(CALCULATOR_DIVIDE)]);
        assert_eq!(plan.generation(), 3);

        let installed: HashSet<TargetId> = rules.targets().cloned().collect();
        assert!(TransformPlan::compute(&installed, &rules).is_empty());
    }

    #[test]
    fn test_unresolved_target_is_a_warning() {
        let table = calculator_table();
        let (planner, store) = planner(Arc::clone(&table));
        let rules = store
            .reload(&rules_json(&[
                r#"{ "target": "Missing.method()", "action": "delegate" }"#,
                r#"{ "target": "Calculator.add(int,int)", "action": { "return": 42 } }"#,
            ]))
            .unwrap();

        let report = planner.sync(&rules);
        assert_eq!(report.installed, vec![target(CALCULATOR_ADD)]);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(report.warnings[0], Error::TargetResolution(_)));
        assert!(!report.is_clean());

        let add = table.handle(&target(CALCULATOR_ADD)).unwrap();
        assert_eq!(add.call(&[Value::Int(1), Value::Int(2)]), Ok(Value::Int(42)));
    }

    #[test]
    fn test_sync_removes_untargeted() {
        let table = calculator_table();
        let (planner, store) = planner(Arc::clone(&table));
        let first = store
            .reload(&rules_json(&[
                r#"{ "target": "Calculator.add(int,int)", "action": { "return": 42 } }"#,
            ]))
            .unwrap();
        planner.sync(&first);
        assert_eq!(planner.installed(), vec![target(CALCULATOR_ADD)]);

        let second = store
            .reload(&rules_json(&[
                r#"{ "target": "Calculator.divide(int,int)", "action": { "return": 0 } }"#,
            ]))
            .unwrap();
        let report = planner.sync(&second);
        assert_eq!(report.installed, vec![target(CALCULATOR_DIVIDE)]);
        assert_eq!(report.removed, vec![target(CALCULATOR_ADD)]);

        let add = table.handle(&target(CALCULATOR_ADD)).unwrap();
        assert_eq!(add.state(), SlotState::Uninstalled);
        assert_eq!(add.call(&[Value::Int(1), Value::Int(2)]), Ok(Value::Int(3)));
    }

    #[test]
    fn test_late_install_and_remove_all() {
        let table = Arc::new(MethodTable::new());
        let (planner, store) = planner(Arc::clone(&table));
        let rules = store
            .reload(&rules_json(&[
                r#"{ "target": "Lazy.value()", "action": { "return": "mocked" } }"#,
            ]))
            .unwrap();

        let handle = table
            .register(MethodDef::new(
                target("Lazy.value()"),
                TypeSig::STRING,
                |_: &[Value]| Ok(Value::str("real")),
            ))
            .unwrap();
        // Not accepting before the first sync
        assert!(!planner.install_late(handle.slot()));

        let report = planner.sync(&rules);
        assert_eq!(report.installed, vec![target("Lazy.value()")]);
        assert!(!planner.install_late(handle.slot()));

        let report = planner.remove_all();
        assert_eq!(report.removed, vec![target("Lazy.value()")]);
        assert!(planner.installed().is_empty());
        assert_eq!(handle.call(&[]), Ok(Value::str("real")));
        assert!(!planner.install_late(handle.slot()));
    }

    #[test]
    fn test_pinned_target_bypasses() {
        let table = Arc::new(MethodTable::new());
        let pinned = table
            .register(
                MethodDef::new(target("Clock.now()"), TypeSig::LONG, |_: &[Value]| {
                    Ok(Value::Long(1_000))
                })
                .pinned(),
            )
            .unwrap();
        let (planner, store) = planner(Arc::clone(&table));

        let rules = store
            .reload(&rules_json(&[
                r#"{ "target": "Clock.now()", "action": { "return": 5 } }"#,
            ]))
            .unwrap();
        planner.sync(&rules);
        assert_eq!(pinned.call(&[]), Ok(Value::Long(5)));

        let report = planner.sync(&store.clear());
        assert_eq!(report.bypassed, vec![target("Clock.now()")]);
        assert_eq!(pinned.state(), SlotState::Bypassing);
        assert_eq!(pinned.call(&[]), Ok(Value::Long(1_000)));

        let report = planner.sync(&store.reload(&rules_json(&[
            r#"{ "target": "Clock.now()", "action": { "return": 6 } }"#,
        ]))
        .unwrap());
        assert_eq!(report.installed, vec![target("Clock.now()")]);
        assert_eq!(pinned.state(), SlotState::Installed);
        assert_eq!(pinned.call(&[]), Ok(Value::Long(6)));
    }
}
