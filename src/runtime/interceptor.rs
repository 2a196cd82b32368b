//! Call-time redirection logic.
//!
//! Every call routed through an installed slot lands in [`Interceptor::dispatch`]. The
//! interceptor pins the current rule set once, lets the matcher pick a rule and the
//! resolver turn it into an outcome, records the call, and then either answers with the
//! substitute or runs the preserved original. The pinned snapshot is released before the
//! original body runs, so reentrant calls and concurrent reloads never wait on it.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::{info, trace, warn};

use crate::{
    agent::AgentConfig,
    config::RuleStore,
    engine::{matcher, ExceptionCatalog, Outcome, ValueResolver},
    runtime::{
        cache::DecisionCache,
        journal::{CallEvent, CallJournal, Disposition, FallbackReason},
        method::CallResult,
        record::InterceptionRecord,
    },
    target::{TargetId, TypeSig},
    value::Value,
    Error,
};

/// The engine's verdict for one call.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// What the call site observes
    pub outcome: Outcome,
    /// How the call is journaled
    pub disposition: Disposition,
    /// Generation of the pinned rule set
    pub generation: u64,
    /// Declaration index of the applied rule
    pub rule: Option<usize>,
}

impl Decision {
    fn new(outcome: Outcome, disposition: Disposition, generation: u64, rule: Option<usize>) -> Self {
        Decision {
            outcome,
            disposition,
            generation,
            rule,
        }
    }
}

/// Routes intercepted calls through the rule engine.
pub struct Interceptor {
    store: Arc<RuleStore>,
    resolver: ValueResolver,
    cache: DecisionCache,
    journal: Arc<CallJournal>,
    config: AgentConfig,
}

impl Interceptor {
    /// Creates an interceptor reading rules from `store`.
    #[must_use]
    pub fn new(
        store: Arc<RuleStore>,
        catalog: Arc<ExceptionCatalog>,
        journal: Arc<CallJournal>,
        config: AgentConfig,
    ) -> Self {
        Interceptor {
            store,
            resolver: ValueResolver::new(catalog),
            cache: DecisionCache::new(),
            journal,
            config,
        }
    }

    /// Returns the rule store.
    #[must_use]
    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Returns the call journal.
    #[must_use]
    pub fn journal(&self) -> &Arc<CallJournal> {
        &self.journal
    }

    /// Returns the constant-value cache.
    #[must_use]
    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Returns the configuration the interceptor runs with.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Decides a call to `target` with `args` against the current rule set.
    ///
    /// Never fails: rule errors are logged and turn into a fallback decision.
    #[must_use]
    pub fn decide(&self, target: &TargetId, return_type: &TypeSig, args: &[Value]) -> Decision {
        let rules = self.store.pin();
        let generation = rules.generation();

        let Some(rule) = matcher::find_match(&rules, target, args, generation) else {
            return Decision::new(
                Outcome::RunOriginal,
                Disposition::Passthrough,
                generation,
                None,
            );
        };
        let index = rule.index();

        let cacheable = self.config.decision_cache && rule.is_constant();
        if cacheable {
            if let Some(value) = self.cache.get(target, generation, index) {
                return Decision::new(
                    Outcome::SubstituteReturn(value),
                    Disposition::Substituted,
                    generation,
                    Some(index),
                );
            }
        }

        match self.resolver.try_resolve(rule, args, return_type) {
            Ok(Outcome::SubstituteReturn(value)) => {
                if cacheable {
                    self.cache.insert(target, generation, index, value.clone());
                }
                Decision::new(
                    Outcome::SubstituteReturn(value),
                    Disposition::Substituted,
                    generation,
                    Some(index),
                )
            }
            Ok(thrown @ Outcome::SubstituteThrow(_)) => {
                Decision::new(thrown, Disposition::Thrown, generation, Some(index))
            }
            Ok(Outcome::RunOriginal) => Decision::new(
                Outcome::RunOriginal,
                Disposition::Delegated,
                generation,
                Some(index),
            ),
            Err(err) => {
                warn!(
                    "rule #{} on {} could not be applied, running original: {}",
                    index, target, err
                );
                Decision::new(
                    Outcome::RunOriginal,
                    Disposition::Fallback(fallback_reason(&err)),
                    generation,
                    Some(index),
                )
            }
        }
    }

    /// Handles one call through an installed redirection.
    pub(crate) fn dispatch(
        &self,
        record: &InterceptionRecord,
        return_type: &TypeSig,
        args: &[Value],
    ) -> CallResult {
        let target = record.target();
        let decision = if self.config.catch_panics {
            panic::catch_unwind(AssertUnwindSafe(|| self.decide(target, return_type, args)))
                .unwrap_or_else(|_| {
                    warn!("engine panicked while handling {}, running original", target);
                    Decision::new(
                        Outcome::RunOriginal,
                        Disposition::Fallback(FallbackReason::EnginePanic),
                        self.store.generation(),
                        None,
                    )
                })
        } else {
            self.decide(target, return_type, args)
        };

        trace!(
            "{} [gen {}] -> {}",
            target,
            decision.generation,
            decision.disposition
        );
        self.journal.record(CallEvent {
            target: target.clone(),
            generation: decision.generation,
            rule: decision.rule,
            disposition: decision.disposition,
        });

        match decision.outcome {
            Outcome::SubstituteReturn(value) => {
                if self.config.log_substitutions {
                    info!("mocked {} -> {}", target, value);
                }
                Ok(value)
            }
            Outcome::SubstituteThrow(thrown) => {
                if self.config.log_substitutions {
                    info!("mocked {} -> throw {}", target, thrown);
                }
                Err(thrown)
            }
            Outcome::RunOriginal => record.original().invoke(args),
        }
    }
}

fn fallback_reason(err: &Error) -> FallbackReason {
    match err {
        Error::TypeMismatch { .. } => FallbackReason::TypeMismatch,
        Error::ExceptionConstruction(_) => FallbackReason::ExceptionUnavailable,
        _ => FallbackReason::EvaluationFault,
    }
}
