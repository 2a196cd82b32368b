//! Agent lifecycle.
//!
//! An [`Agent`] owns the engine state attached to one [`MethodTable`]: the rule store,
//! the exception catalog, the interceptor and the planner. Its lifecycle is
//!
//! ```text
//! Attached --initialize--> Active --reload--> Active --shutdown--> ShutDown
//! ```
//!
//! Shutdown runs when the last owner drops the agent, so ordinary exit paths restore
//! every slot without an explicit call.

use std::sync::{Arc, Mutex, Weak};

use log::{info, warn};
use strum::Display;

use crate::{
    agent::{
        config::AgentConfig,
        source::{parse_agent_args, ConfigSource},
    },
    config::{RuleSet, RuleStore},
    engine::ExceptionCatalog,
    planner::{PlanReport, TransformPlanner},
    runtime::{CallJournal, Interceptor, MethodSlot, MethodTable, RegistrationListener},
    target::TargetId,
    Error, Result,
};

/// Lifecycle state of an [`Agent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum AgentState {
    /// Created, no configuration loaded yet
    Attached,
    /// Rules are loaded and redirections installed
    Active,
    /// All redirections removed; the agent is inert
    ShutDown,
}

struct AgentInner {
    table: Arc<MethodTable>,
    store: Arc<RuleStore>,
    catalog: Arc<ExceptionCatalog>,
    journal: Arc<CallJournal>,
    interceptor: Arc<Interceptor>,
    planner: TransformPlanner,
    config: AgentConfig,
    lifecycle: Mutex<AgentState>,
    listener: Weak<dyn RegistrationListener>,
}

impl AgentInner {
    fn initialize(&self, source: &ConfigSource) -> Result<PlanReport> {
        let mut state = lock!(self.lifecycle);
        if *state != AgentState::Attached {
            return Err(Error::AlreadyInitialized);
        }
        let data = source.read()?;
        let rules = self.store.reload(&data)?;
        let report = self.planner.sync(&rules);
        *state = AgentState::Active;

        log_activation("mock agent initialized", source, &rules, &report);
        Ok(report)
    }

    fn reload(&self, source: &ConfigSource) -> Result<PlanReport> {
        let state = lock!(self.lifecycle);
        if *state != AgentState::Active {
            return Err(Error::NotInitialized);
        }
        let data = source.read()?;
        let rules = self.store.reload(&data)?;
        let report = self.planner.sync(&rules);
        self.retain_cache(&rules);

        log_activation("mock configuration reloaded", source, &rules, &report);
        Ok(report)
    }

    fn shutdown(&self) -> PlanReport {
        let mut state = lock!(self.lifecycle);
        if *state == AgentState::ShutDown {
            return PlanReport::default();
        }
        self.table.clear_listener(&self.listener);
        let report = self.planner.remove_all();
        let cleared = self.store.clear();
        self.retain_cache(&cleared);
        *state = AgentState::ShutDown;

        info!(
            "mock agent shut down, {} redirections removed, {} pinned slots bypassing",
            report.removed.len(),
            report.bypassed.len()
        );
        report
    }

    fn retain_cache(&self, rules: &RuleSet) {
        self.interceptor.cache().retain_generation(rules.generation());
    }
}

impl RegistrationListener for AgentInner {
    fn on_register(&self, slot: &Arc<MethodSlot>) {
        self.planner.install_late(slot);
    }
}

impl Drop for AgentInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn log_activation(what: &str, source: &ConfigSource, rules: &RuleSet, report: &PlanReport) {
    info!(
        "{} from {}: {} rules on {} targets, {} installed, {} removed [gen {}, {}]",
        what,
        source,
        rules.rule_count(),
        rules.target_count(),
        report.installed.len(),
        report.removed.len() + report.bypassed.len(),
        rules.generation(),
        &rules.fingerprint_hex()[..12]
    );
    if !report.is_clean() {
        warn!(
            "{} configured targets are not registered with the method table",
            report.warnings.len()
        );
    }
}

/// The mock engine attached to a [`MethodTable`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use mockscope::{
///     agent::{Agent, AgentConfig, ConfigSource},
///     MethodDef, MethodTable, TargetId, TypeSig, Value,
/// };
///
/// let table = Arc::new(MethodTable::new());
/// let add = table.register(MethodDef::new(
///     TargetId::method("Calculator", "add", &["int", "int"])?,
///     TypeSig::INT,
///     |args: &[Value]| {
///         let sum = args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0);
///         Ok(Value::Int(sum as i32))
///     },
/// ))?;
///
/// let agent = Agent::new(Arc::clone(&table), AgentConfig::testing());
/// agent.initialize(&ConfigSource::bytes(
///     r#"{ "rules": [ { "target": "Calculator.add(int,int)", "action": { "return": 42 } } ] }"#,
/// ))?;
/// assert_eq!(add.call(&[Value::Int(2), Value::Int(3)]), Ok(Value::Int(42)));
///
/// agent.shutdown();
/// assert_eq!(add.call(&[Value::Int(2), Value::Int(3)]), Ok(Value::Int(5)));
/// # Ok::<(), mockscope::Error>(())
/// ```
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    /// Creates an agent for `table` with the built-in exception catalog.
    #[must_use]
    pub fn new(table: Arc<MethodTable>, config: AgentConfig) -> Self {
        Self::with_catalog(table, config, Arc::new(ExceptionCatalog::new()))
    }

    /// Creates an agent raising substitute exceptions from `catalog`.
    #[must_use]
    pub fn with_catalog(
        table: Arc<MethodTable>,
        config: AgentConfig,
        catalog: Arc<ExceptionCatalog>,
    ) -> Self {
        let store = Arc::new(RuleStore::new());
        let journal = Arc::new(CallJournal::new(config.journal));
        let interceptor = Arc::new(Interceptor::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&journal),
            config.clone(),
        ));
        let planner = TransformPlanner::new(Arc::clone(&table), Arc::clone(&interceptor));

        let inner = Arc::new_cyclic(|weak: &Weak<AgentInner>| {
            let listener: Weak<dyn RegistrationListener> = weak.clone();
            AgentInner {
                table,
                store,
                catalog,
                journal,
                interceptor,
                planner,
                config,
                lifecycle: Mutex::new(AgentState::Attached),
                listener,
            }
        });
        inner.table.set_listener(inner.listener.clone());
        Agent { inner }
    }

    /// Loads the initial configuration and installs its targets.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInitialized`] if called more than once
    /// - [`Error::FileError`] if the source cannot be read
    /// - [`Error::ConfigParse`] or [`Error::Json`] if the document is invalid
    ///
    /// On error the agent stays uninitialized and may be initialized again.
    pub fn initialize(&self, source: &ConfigSource) -> Result<PlanReport> {
        self.inner.initialize(source)
    }

    /// Replaces the active configuration.
    ///
    /// Safe to call while intercepted methods run on other threads. Each call resolves
    /// entirely against the old or entirely against the new rules. On error the old
    /// rules stay active.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] before [`Agent::initialize`] or after shutdown
    /// - [`Error::FileError`], [`Error::ConfigParse`] or [`Error::Json`] for a bad source
    pub fn reload(&self, source: &ConfigSource) -> Result<PlanReport> {
        self.inner.reload(source)
    }

    /// Removes every redirection and releases the rules.
    ///
    /// Idempotent; also runs when the agent is dropped.
    pub fn shutdown(&self) -> PlanReport {
        self.inner.shutdown()
    }

    /// Returns a trigger for reloads from other threads.
    #[must_use]
    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Makes a host exception type available to throw rules.
    pub fn register_exception(&self, type_name: &str) {
        self.inner.catalog.register(type_name);
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AgentState {
        *lock!(self.inner.lifecycle)
    }

    /// Returns the generation of the active rule set.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.store.generation()
    }

    /// Returns the active rule set.
    #[must_use]
    pub fn rules(&self) -> Arc<RuleSet> {
        self.inner.store.snapshot()
    }

    /// Returns the call journal.
    #[must_use]
    pub fn journal(&self) -> &Arc<CallJournal> {
        &self.inner.journal
    }

    /// Returns the exception catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ExceptionCatalog> {
        &self.inner.catalog
    }

    /// Returns the method table the agent is attached to.
    #[must_use]
    pub fn table(&self) -> &Arc<MethodTable> {
        &self.inner.table
    }

    /// Returns the agent's configuration.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    /// Returns the targets that currently carry an active redirection.
    #[must_use]
    pub fn installed_targets(&self) -> Vec<TargetId> {
        self.inner.planner.installed()
    }
}

/// Cloneable trigger for reloading an agent's configuration.
///
/// The handle does not keep the agent alive; once the agent is gone, reloads fail with
/// [`Error::NotInitialized`].
#[derive(Clone, Debug)]
pub struct ReloadHandle {
    inner: Weak<AgentInner>,
}

impl ReloadHandle {
    /// Reloads the agent's configuration from `source`.
    ///
    /// # Errors
    ///
    /// See [`Agent::reload`].
    pub fn reload(&self, source: &ConfigSource) -> Result<PlanReport> {
        let inner = self.inner.upgrade().ok_or(Error::NotInitialized)?;
        inner.reload(source)
    }

    /// Returns `true` while the agent exists.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

/// Attaches an agent to `table`.
///
/// `args` is the attach argument string (see [`ConfigSource::from_agent_args`]); without
/// it the configuration path comes from `MOCKSCOPE_CONFIG`. Agent options come from the
/// `MOCKSCOPE_*` environment variables, overridden by options in `args`.
///
/// Attaching never fails: if the configuration is missing or invalid the agent is
/// active with no targets installed, and a later reload can supply rules.
pub fn attach(table: Arc<MethodTable>, args: Option<&str>) -> Agent {
    let base = AgentConfig::from_env();
    let (source, config) = match args {
        Some(args) => parse_agent_args(args, base),
        None => (ConfigSource::from_env(), base),
    };

    info!("attaching mock agent to {} methods, configuration {}", table.len(), source);
    let agent = Agent::new(table, config);
    if let Err(err) = agent.initialize(&source) {
        warn!(
            "mock configuration {} not loaded, no targets installed: {}",
            source, err
        );
        if let Err(err) = agent.initialize(&ConfigSource::Empty) {
            warn!("mock agent could not be activated: {}", err);
        }
    }
    agent
}
