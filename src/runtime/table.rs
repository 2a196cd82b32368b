//! The host method table.
//!
//! Every host method the agent may intercept is registered once in a [`MethodTable`] and
//! called through the [`MethodHandle`] returned by registration. A handle points at a
//! [`MethodSlot`]: while no redirection is installed the slot runs the original body
//! directly; once installed, calls are routed through the [`Interceptor`].
//!
//! # Slot States
//!
//! ```text
//! Uninstalled --install--> Installed --remove--> Uninstalled
//!                          Installed --remove (pinned)--> Bypassing --install--> Installed
//! ```
//!
//! A redirection is published with one atomic pointer store, so a call observes the slot
//! either fully installed or fully uninstalled.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock, Weak,
    },
};

use arc_swap::ArcSwapOption;
use dashmap::{mapref::entry::Entry, DashMap};
use log::trace;
use strum::Display;

use crate::{
    runtime::{
        interceptor::Interceptor,
        method::{CallResult, MethodAttributes, MethodDef, OriginalInvoker},
        record::InterceptionRecord,
    },
    target::{TargetId, TypeSig},
    value::Value,
    Error, Result,
};

/// Interception state of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum SlotState {
    /// Calls run the original body directly
    Uninstalled,
    /// Calls are routed through the interceptor
    Installed,
    /// The redirection stays in place but every call runs the original
    Bypassing,
}

/// Receives methods registered after the agent attached.
pub trait RegistrationListener: Send + Sync {
    /// Called once per newly registered method, outside of any table lock.
    fn on_register(&self, slot: &Arc<MethodSlot>);
}

struct Redirection {
    record: InterceptionRecord,
    interceptor: Arc<Interceptor>,
}

/// The table entry through which calls to one method are routed.
pub struct MethodSlot {
    target: TargetId,
    return_type: TypeSig,
    attributes: MethodAttributes,
    original: OriginalInvoker,
    redirect: ArcSwapOption<Redirection>,
    bypassing: AtomicBool,
}

impl MethodSlot {
    fn new(def: MethodDef) -> Self {
        let (target, return_type, attributes, original) = def.into_parts();
        MethodSlot {
            target,
            return_type,
            attributes,
            original,
            redirect: ArcSwapOption::empty(),
            bypassing: AtomicBool::new(false),
        }
    }

    /// Returns the method's identity.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Returns the declared return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeSig {
        &self.return_type
    }

    /// Returns the method's attributes.
    #[must_use]
    pub fn attributes(&self) -> MethodAttributes {
        self.attributes
    }

    /// Returns `true` if an installed redirection can never be removed.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.attributes.contains(MethodAttributes::PINNED)
    }

    /// Returns the preserved original behavior.
    #[must_use]
    pub fn original(&self) -> &OriginalInvoker {
        &self.original
    }

    /// Returns the current interception state.
    #[must_use]
    pub fn state(&self) -> SlotState {
        if self.redirect.load().is_none() {
            SlotState::Uninstalled
        } else if self.bypassing.load(Ordering::Acquire) {
            SlotState::Bypassing
        } else {
            SlotState::Installed
        }
    }

    /// Returns the active redirection's record.
    #[must_use]
    pub fn record(&self) -> Option<InterceptionRecord> {
        self.redirect
            .load()
            .as_ref()
            .map(|redirection| redirection.record.clone())
    }

    /// Calls the method.
    ///
    /// # Errors
    ///
    /// Returns the exception thrown by the original body or substituted by a rule.
    pub fn call(&self, args: &[Value]) -> CallResult {
        // Owned load; reentrant calls on the same thread must not pile up guards
        let Some(redirection) = self.redirect.load_full() else {
            return self.original.invoke(args);
        };
        if self.bypassing.load(Ordering::Acquire) {
            return redirection.record.original().invoke(args);
        }
        redirection
            .interceptor
            .dispatch(&redirection.record, &self.return_type, args)
    }

    /// Installs (or re-arms) the redirection through `interceptor`.
    pub(crate) fn install(&self, generation: u64, interceptor: Arc<Interceptor>) {
        let record = InterceptionRecord::new(self.target.clone(), generation, self.original.clone());
        self.redirect.store(Some(Arc::new(Redirection {
            record,
            interceptor,
        })));
        self.bypassing.store(false, Ordering::Release);
        trace!("{} -> {}", self.target, SlotState::Installed);
    }

    /// Removes the redirection; a pinned slot switches to bypassing instead.
    pub(crate) fn remove(&self) -> SlotState {
        let state = if self.is_pinned() && self.redirect.load().is_some() {
            self.bypassing.store(true, Ordering::Release);
            SlotState::Bypassing
        } else {
            self.redirect.store(None);
            self.bypassing.store(false, Ordering::Release);
            SlotState::Uninstalled
        };
        trace!("{} -> {}", self.target, state);
        state
    }
}

impl fmt::Debug for MethodSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSlot")
            .field("target", &self.target)
            .field("return_type", &self.return_type)
            .field("attributes", &self.attributes)
            .field("state", &self.state())
            .finish()
    }
}

/// Caller-side handle to a registered method.
#[derive(Clone, Debug)]
pub struct MethodHandle {
    slot: Arc<MethodSlot>,
}

impl MethodHandle {
    /// Calls the method, honoring any installed redirection.
    ///
    /// # Errors
    ///
    /// Returns the exception thrown by the original body or substituted by a rule.
    pub fn call(&self, args: &[Value]) -> CallResult {
        self.slot.call(args)
    }

    /// Returns the method's identity.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        self.slot.target()
    }

    /// Returns the current interception state.
    #[must_use]
    pub fn state(&self) -> SlotState {
        self.slot.state()
    }

    /// Returns the underlying slot.
    #[must_use]
    pub fn slot(&self) -> &Arc<MethodSlot> {
        &self.slot
    }
}

/// Registry of host methods, keyed by [`TargetId`].
///
/// # Examples
///
/// ```rust
/// use mockscope::{MethodDef, MethodTable, TargetId, TypeSig, Value};
///
/// let table = MethodTable::new();
/// let handle = table.register(MethodDef::new(
///     TargetId::method("Greeter", "greet", &["String"])?,
///     TypeSig::STRING,
///     |args: &[Value]| Ok(Value::str(format!("hello {}", args[0]))),
/// ))?;
/// assert_eq!(handle.call(&[Value::str("bob")]), Ok(Value::str("hello bob")));
/// # Ok::<(), mockscope::Error>(())
/// ```
#[derive(Default)]
pub struct MethodTable {
    slots: DashMap<TargetId, Arc<MethodSlot>>,
    listener: RwLock<Option<Weak<dyn RegistrationListener>>>,
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        MethodTable {
            slots: DashMap::new(),
            listener: RwLock::new(None),
        }
    }

    /// Registers a host method.
    ///
    /// If an agent is attached, it is notified after the slot becomes visible and may
    /// install a redirection before the handle is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTarget`] if the target is already registered.
    pub fn register(&self, def: MethodDef) -> Result<MethodHandle> {
        let target = def.target().clone();
        let slot = match self.slots.entry(target) {
            Entry::Occupied(entry) => return Err(Error::DuplicateTarget(entry.key().clone())),
            Entry::Vacant(entry) => Arc::clone(entry.insert(Arc::new(MethodSlot::new(def))).value()),
        };

        let listener = read_lock!(self.listener).as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.on_register(&slot);
        }
        Ok(MethodHandle { slot })
    }

    /// Returns the slot registered for `target`.
    #[must_use]
    pub fn slot(&self, target: &TargetId) -> Option<Arc<MethodSlot>> {
        self.slots.get(target).map(|slot| Arc::clone(slot.value()))
    }

    /// Returns a call handle for `target`.
    #[must_use]
    pub fn handle(&self, target: &TargetId) -> Option<MethodHandle> {
        self.slot(target).map(|slot| MethodHandle { slot })
    }

    /// Returns `true` if `target` is registered.
    #[must_use]
    pub fn contains(&self, target: &TargetId) -> bool {
        self.slots.contains_key(target)
    }

    /// Returns all registered targets.
    #[must_use]
    pub fn targets(&self) -> Vec<TargetId> {
        self.slots.iter().map(|slot| slot.key().clone()).collect()
    }

    /// Returns the number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn set_listener(&self, listener: Weak<dyn RegistrationListener>) {
        *write_lock!(self.listener) = Some(listener);
    }

    /// Detaches `listener`; a different listener registered since stays in place.
    pub(crate) fn clear_listener(&self, listener: &Weak<dyn RegistrationListener>) {
        let mut current = write_lock!(self.listener);
        if current
            .as_ref()
            .is_some_and(|registered| Weak::ptr_eq(registered, listener))
        {
            *current = None;
        }
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.slots.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::AgentConfig,
        config::RuleStore,
        engine::ExceptionCatalog,
        runtime::journal::CallJournal,
        test::{calculator_table, CALCULATOR_ADD},
    };

    fn interceptor(json: &str) -> Arc<Interceptor> {
        let store = Arc::new(RuleStore::new());
        store.reload(json.as_bytes()).unwrap();
        Arc::new(Interceptor::new(
            store,
            Arc::new(ExceptionCatalog::new()),
            Arc::new(CallJournal::new(true)),
            AgentConfig::testing(),
        ))
    }

    const RETURN_42: &str =
        r#"{ "rules": [ { "target": "Calculator.add(int,int)", "action": { "return": 42 } } ] }"#;

    #[test]
    fn test_duplicate_registration() {
        let table = calculator_table();
        let target = TargetId::parse(CALCULATOR_ADD).unwrap();
        let err = table
            .register(MethodDef::abstract_method(target, TypeSig::INT))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTarget(_)));
    }

    #[test]
    fn test_install_and_remove() {
        let table = calculator_table();
        let add = table.handle(&TargetId::parse(CALCULATOR_ADD).unwrap()).unwrap();
        let args = [Value::Int(2), Value::Int(3)];

        assert_eq!(add.state(), SlotState::Uninstalled);
        assert_eq!(add.call(&args), Ok(Value::Int(5)));

        add.slot().install(1, interceptor(RETURN_42));
        assert_eq!(add.state(), SlotState::Installed);
        assert_eq!(add.slot().record().unwrap().installed_at(), 1);
        assert_eq!(add.call(&args), Ok(Value::Int(42)));

        assert_eq!(add.slot().remove(), SlotState::Uninstalled);
        assert!(add.slot().record().is_none());
        assert_eq!(add.call(&args), Ok(Value::Int(5)));
    }

    #[test]
    fn test_pinned_slot_bypasses() {
        let table = MethodTable::new();
        let target = TargetId::parse(CALCULATOR_ADD).unwrap();
        let add = table
            .register(
                MethodDef::new(target, TypeSig::INT, |args: &[Value]| {
                    let a = args[0].as_i64().unwrap_or(0);
                    let b = args[1].as_i64().unwrap_or(0);
                    Ok(Value::Int((a + b) as i32))
                })
                .pinned(),
            )
            .unwrap();
        let args = [Value::Int(2), Value::Int(3)];

        // Removing a never-installed pinned slot is a no-op
        assert_eq!(add.slot().remove(), SlotState::Uninstalled);

        add.slot().install(1, interceptor(RETURN_42));
        assert_eq!(add.slot().remove(), SlotState::Bypassing);
        assert_eq!(add.state(), SlotState::Bypassing);
        assert_eq!(add.call(&args), Ok(Value::Int(5)));

        add.slot().install(2, interceptor(RETURN_42));
        assert_eq!(add.state(), SlotState::Installed);
        assert_eq!(add.call(&args), Ok(Value::Int(42)));
    }

    struct Recorder(std::sync::Mutex<Vec<TargetId>>);

    impl RegistrationListener for Recorder {
        fn on_register(&self, slot: &Arc<MethodSlot>) {
            lock!(self.0).push(slot.target().clone());
        }
    }

    #[test]
    fn test_listener_sees_late_registration() {
        let table = MethodTable::new();
        let recorder = Arc::new(Recorder(std::sync::Mutex::new(Vec::new())));
        let weak: Weak<dyn RegistrationListener> = Arc::<Recorder>::downgrade(&recorder);
        table.set_listener(weak.clone());

        let target = TargetId::method("Lazy", "load", &[]).unwrap();
        table
            .register(MethodDef::abstract_method(target.clone(), TypeSig::VOID))
            .unwrap();
        assert_eq!(*lock!(recorder.0), vec![target]);

        let other = Arc::new(Recorder(std::sync::Mutex::new(Vec::new())));
        let other_weak: Weak<dyn RegistrationListener> = Arc::<Recorder>::downgrade(&other);
        table.clear_listener(&other_weak);
        assert!(read_lock!(table.listener).is_some());
        table.clear_listener(&weak);
        assert!(read_lock!(table.listener).is_none());
        table.set_listener(weak);

        // A dropped listener is skipped
        drop(recorder);
        table
            .register(MethodDef::abstract_method(
                TargetId::method("Lazy", "other", &[]).unwrap(),
                TypeSig::VOID,
            ))
            .unwrap();
        assert_eq!(table.len(), 2);
    }
}
