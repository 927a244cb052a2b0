//! Session-scoped evaluation cache.
//!
//! An [`EvaluationCache`] memoizes fact values and precondition results for
//! one session. Facts are assumed stable for the session's lifetime, so each
//! provider runs at most once per key, even when many worker threads ask for
//! the same precondition at the same time: the first caller computes and
//! publishes, the others block on the same cell and read the published value.
//!
//! Failures are cached too. A probe that failed is not retried within the
//! session unless the fact is explicitly invalidated.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use preconditions::cache::EvaluationCache;
//! use preconditions::facts::{builtin::Constant, FactValue};
//! use preconditions::registry::{PreconditionDefinition, PreconditionRegistry};
//!
//! let mut registry = PreconditionRegistry::new();
//! registry.register_fact("docker_probe", Arc::new(Constant(FactValue::Bool(true)))).unwrap();
//! registry.register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe")).unwrap();
//! registry.freeze().unwrap();
//!
//! let cache = EvaluationCache::new(Arc::new(registry)).unwrap();
//! assert!(cache.evaluate("HAS_DOCKER").unwrap());
//! assert_eq!(cache.probes_run(), 1);
//! ```

mod session;

pub use session::SessionId;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::error::{EvaluationFailure, PreconditionError, ProbeError, Result};
use crate::facts::{FactValue, ProbeFailurePolicy};
use crate::registry::{PreconditionDefinition, PreconditionRegistry, PredicateInputs};

type FactCell = Arc<OnceLock<std::result::Result<FactValue, ProbeError>>>;
type PreconditionCell = Arc<OnceLock<std::result::Result<bool, EvaluationFailure>>>;

/// Per-session memo of facts and precondition results.
pub struct EvaluationCache {
    registry: Arc<PreconditionRegistry>,
    session: SessionId,
    facts: Mutex<HashMap<String, FactCell>>,
    preconditions: Mutex<HashMap<String, PreconditionCell>>,
    probes_run: AtomicUsize,
}

impl EvaluationCache {
    /// Start a new session against a frozen registry.
    pub fn new(registry: Arc<PreconditionRegistry>) -> Result<Self> {
        if !registry.is_frozen() {
            return Err(PreconditionError::RegistryNotFrozen);
        }
        let session = SessionId::new();
        tracing::debug!(session = %session, "Starting evaluation session");
        Ok(Self {
            registry,
            session,
            facts: Mutex::new(HashMap::new()),
            preconditions: Mutex::new(HashMap::new()),
            probes_run: AtomicUsize::new(0),
        })
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn registry(&self) -> &Arc<PreconditionRegistry> {
        &self.registry
    }

    /// Evaluate a precondition, computing and caching on a miss.
    ///
    /// Fails with `UnknownPrecondition` for unregistered names and with
    /// `PreconditionEvaluation` when a probe or predicate fails; a failure is
    /// never turned into `false` here.
    pub fn evaluate(&self, name: &str) -> Result<bool> {
        let definition = self.registry.lookup(name)?;
        self.evaluate_definition(definition)
            .map_err(|cause| PreconditionError::PreconditionEvaluation {
                name: name.to_string(),
                cause,
            })
    }

    /// The value of a registered fact, probing on a miss.
    ///
    /// Returns `None` for unknown keys. The fact's failure policy is
    /// already applied.
    pub fn fact(&self, key: &str) -> Option<std::result::Result<FactValue, ProbeError>> {
        self.registry.fact(key)?;
        Some(self.resolve_fact(key))
    }

    /// Facts probed so far in this session, in registration order.
    pub fn probed_facts(&self) -> Vec<(String, std::result::Result<FactValue, ProbeError>)> {
        let cells = lock(&self.facts);
        self.registry
            .list_facts()
            .iter()
            .filter_map(|key| {
                let value = cells.get(key)?.get()?.clone();
                Some((key.clone(), value))
            })
            .collect()
    }

    /// Drop a cached fact and every precondition that depends on it.
    ///
    /// Returns the preconditions whose cached results were discarded.
    pub fn invalidate(&self, key: &str) -> Vec<String> {
        lock(&self.facts).remove(key);

        let mut dropped = Vec::new();
        let mut cells = lock(&self.preconditions);
        for name in self.registry.affected_by_fact(key) {
            if cells.remove(name).is_some() {
                dropped.push(name.clone());
            }
        }
        tracing::debug!(fact = key, dropped = ?dropped, "Invalidated fact");
        dropped
    }

    /// Drop everything cached in this session.
    pub fn invalidate_all(&self) {
        lock(&self.facts).clear();
        lock(&self.preconditions).clear();
    }

    /// Number of provider invocations in this session.
    pub fn probes_run(&self) -> usize {
        self.probes_run.load(Ordering::SeqCst)
    }

    fn evaluate_definition(
        &self,
        definition: &PreconditionDefinition,
    ) -> std::result::Result<bool, EvaluationFailure> {
        let cell = cell_for(&self.preconditions, definition.name());
        cell.get_or_init(|| self.compute_precondition(definition))
            .clone()
    }

    fn compute_precondition(
        &self,
        definition: &PreconditionDefinition,
    ) -> std::result::Result<bool, EvaluationFailure> {
        tracing::debug!(name = definition.name(), "Evaluating precondition");

        let mut facts = HashMap::new();
        for key in definition.facts() {
            let value = self
                .resolve_fact(key)
                .map_err(|source| EvaluationFailure::Probe {
                    fact: key.clone(),
                    source,
                })?;
            facts.insert(key.clone(), value);
        }

        let mut required = HashMap::new();
        for name in definition.requires() {
            let result = self
                .registry
                .lookup(name)
                .map_err(|e| e.to_string())
                .and_then(|def| self.evaluate_definition(def).map_err(|e| e.to_string()))
                .map_err(|message| EvaluationFailure::Dependency {
                    name: name.clone(),
                    message,
                })?;
            required.insert(name.clone(), result);
        }

        let inputs = PredicateInputs::new(&facts, &required);
        let result = definition
            .predicate()
            .apply(&inputs, definition.requires())
            .map_err(|message| EvaluationFailure::Predicate { message });

        tracing::debug!(name = definition.name(), result = ?result, "Evaluated precondition");
        result
    }

    fn resolve_fact(&self, key: &str) -> std::result::Result<FactValue, ProbeError> {
        let Some(registration) = self.registry.fact(key) else {
            return Err(ProbeError::Unavailable {
                message: format!("fact '{}' is not registered", key),
            });
        };

        let cell = cell_for(&self.facts, key);
        cell.get_or_init(|| {
            self.probes_run.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(fact = key, provider = %registration.provider.describe(), "Probing fact");

            match (registration.provider.compute(), registration.on_failure) {
                (Ok(value), _) => Ok(value),
                (Err(e), ProbeFailurePolicy::AssumeFalse) => {
                    tracing::warn!(fact = key, error = %e, "Probe failed; assuming false");
                    Ok(FactValue::Bool(false))
                }
                (Err(e), ProbeFailurePolicy::Propagate) => {
                    tracing::debug!(fact = key, error = %e, "Probe failed");
                    Err(e)
                }
            }
        })
        .clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fetch or create the cell for `key`; the map lock is released before the
/// caller computes into the cell.
fn cell_for<T>(cells: &Mutex<HashMap<String, Arc<OnceLock<T>>>>, key: &str) -> Arc<OnceLock<T>> {
    let mut cells = lock(cells);
    match cells.get(key) {
        Some(cell) => Arc::clone(cell),
        None => {
            let cell = Arc::new(OnceLock::new());
            cells.insert(key.to_string(), Arc::clone(&cell));
            cell
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{from_fn, FactProvider, Version};
    use crate::registry::PreconditionDefinition;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// Provider that counts invocations.
    struct Counting {
        calls: Arc<AtomicUsize>,
        value: FactValue,
        delay: Duration,
    }

    impl FactProvider for Counting {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn compute(&self) -> std::result::Result<FactValue, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            Ok(self.value.clone())
        }
    }

    fn counting(value: FactValue, delay: Duration) -> (Arc<dyn FactProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(Counting {
            calls: Arc::clone(&calls),
            value,
            delay,
        });
        (provider, calls)
    }

    fn failing() -> Arc<dyn FactProvider> {
        from_fn("failing", || {
            Err(ProbeError::CommandFailed {
                command: "docker info".to_string(),
                code: Some(1),
            })
        })
    }

    fn frozen(registry: PreconditionRegistry) -> Arc<PreconditionRegistry> {
        let mut registry = registry;
        registry.freeze().unwrap();
        Arc::new(registry)
    }

    #[test]
    fn new_requires_frozen_registry() {
        let registry = Arc::new(PreconditionRegistry::new());
        assert!(matches!(
            EvaluationCache::new(registry),
            Err(PreconditionError::RegistryNotFrozen)
        ));
    }

    #[test]
    fn evaluate_memoizes_provider_calls() {
        let (provider, calls) = counting(FactValue::Bool(true), Duration::ZERO);
        let mut registry = PreconditionRegistry::new();
        registry.register_fact("docker_probe", provider).unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
            .unwrap();
        registry
            .register(PreconditionDefinition::not("NO_DOCKER", "HAS_DOCKER"))
            .unwrap();
        let cache = EvaluationCache::new(frozen(registry)).unwrap();

        assert!(cache.evaluate("HAS_DOCKER").unwrap());
        assert!(cache.evaluate("HAS_DOCKER").unwrap());
        assert!(!cache.evaluate("NO_DOCKER").unwrap());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.probes_run(), 1);
    }

    #[test]
    fn concurrent_evaluation_probes_once() {
        let (provider, calls) = counting(FactValue::Bool(true), Duration::from_millis(50));
        let mut registry = PreconditionRegistry::new();
        registry.register_fact("slow_probe", provider).unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("SLOW", "slow_probe"))
            .unwrap();
        let cache = Arc::new(EvaluationCache::new(frozen(registry)).unwrap());

        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.evaluate("SLOW").unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn probe_failure_surfaces_as_evaluation_error() {
        let mut registry = PreconditionRegistry::new();
        registry.register_fact("docker_probe", failing()).unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
            .unwrap();
        let cache = EvaluationCache::new(frozen(registry)).unwrap();

        let err = cache.evaluate("HAS_DOCKER").unwrap_err();
        match err {
            PreconditionError::PreconditionEvaluation { name, cause } => {
                assert_eq!(name, "HAS_DOCKER");
                assert!(matches!(
                    cause,
                    EvaluationFailure::Probe { ref fact, .. } if fact == "docker_probe"
                ));
            }
            other => panic!("Expected PreconditionEvaluation, got {:?}", other),
        }
    }

    #[test]
    fn probe_failure_is_cached_for_the_session() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = from_fn("flaky", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProbeError::Unavailable {
                message: "nope".to_string(),
            })
        });
        let mut registry = PreconditionRegistry::new();
        registry.register_fact("flaky", provider).unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("FLAKY", "flaky"))
            .unwrap();
        let cache = EvaluationCache::new(frozen(registry)).unwrap();

        assert!(cache.evaluate("FLAKY").is_err());
        assert!(cache.evaluate("FLAKY").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn assume_false_policy_turns_failure_into_false() {
        let mut registry = PreconditionRegistry::new();
        registry
            .register_fact_with_policy("docker_probe", failing(), ProbeFailurePolicy::AssumeFalse)
            .unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
            .unwrap();
        let cache = EvaluationCache::new(frozen(registry)).unwrap();

        assert!(!cache.evaluate("HAS_DOCKER").unwrap());
        assert_eq!(cache.fact("docker_probe"), Some(Ok(FactValue::Bool(false))));
    }

    #[test]
    fn dependency_failure_is_wrapped() {
        let mut registry = PreconditionRegistry::new();
        registry.register_fact("docker_probe", failing()).unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
            .unwrap();
        registry
            .register(PreconditionDefinition::not("NO_DOCKER", "HAS_DOCKER"))
            .unwrap();
        let cache = EvaluationCache::new(frozen(registry)).unwrap();

        let err = cache.evaluate("NO_DOCKER").unwrap_err();
        assert!(matches!(
            err,
            PreconditionError::PreconditionEvaluation {
                cause: EvaluationFailure::Dependency { ref name, .. },
                ..
            } if name == "HAS_DOCKER"
        ));
    }

    #[test]
    fn unknown_precondition_fails() {
        let cache = EvaluationCache::new(frozen(PreconditionRegistry::new())).unwrap();
        assert!(matches!(
            cache.evaluate("HAS_GPU"),
            Err(PreconditionError::UnknownPrecondition { .. })
        ));
    }

    #[test]
    fn invalidate_reprobes_fact_and_dependents_only() {
        let (docker, docker_calls) = counting(FactValue::Bool(true), Duration::ZERO);
        let (jdk, jdk_calls) = counting(
            FactValue::Version(Version::new(17, 0, 2)),
            Duration::ZERO,
        );
        let mut registry = PreconditionRegistry::new();
        registry.register_fact("docker_probe", docker).unwrap();
        registry.register_fact("jdk.version", jdk).unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
            .unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("HAS_JDK", "jdk.version"))
            .unwrap();
        registry
            .register(PreconditionDefinition::all_of("FULL_STACK", ["HAS_DOCKER", "HAS_JDK"]))
            .unwrap();
        let cache = EvaluationCache::new(frozen(registry)).unwrap();

        assert!(cache.evaluate("FULL_STACK").unwrap());

        let dropped = cache.invalidate("docker_probe");
        assert_eq!(dropped, vec!["HAS_DOCKER", "FULL_STACK"]);

        assert!(cache.evaluate("FULL_STACK").unwrap());
        assert_eq!(docker_calls.load(Ordering::SeqCst), 2);
        assert_eq!(jdk_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_all_clears_session() {
        let (provider, calls) = counting(FactValue::Bool(true), Duration::ZERO);
        let mut registry = PreconditionRegistry::new();
        registry.register_fact("f", provider).unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("F", "f"))
            .unwrap();
        let cache = EvaluationCache::new(frozen(registry)).unwrap();

        cache.evaluate("F").unwrap();
        cache.invalidate_all();
        assert!(cache.probed_facts().is_empty());
        cache.evaluate("F").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn probed_facts_lists_only_computed_facts() {
        let mut registry = PreconditionRegistry::new();
        registry
            .register_fact("a", from_fn("a", || Ok(FactValue::Bool(true))))
            .unwrap();
        registry
            .register_fact("b", from_fn("b", || Ok(FactValue::Number(2))))
            .unwrap();
        let cache = EvaluationCache::new(frozen(registry)).unwrap();

        assert_eq!(cache.fact("b"), Some(Ok(FactValue::Number(2))));
        assert_eq!(cache.fact("missing"), None);
        assert_eq!(
            cache.probed_facts(),
            vec![("b".to_string(), Ok(FactValue::Number(2)))]
        );
    }

    #[test]
    fn separate_sessions_do_not_share_results() {
        let (provider, calls) = counting(FactValue::Bool(true), Duration::ZERO);
        let mut registry = PreconditionRegistry::new();
        registry.register_fact("f", provider).unwrap();
        registry
            .register(PreconditionDefinition::fact_is_true("F", "f"))
            .unwrap();
        let registry = frozen(registry);

        let first = EvaluationCache::new(Arc::clone(&registry)).unwrap();
        let second = EvaluationCache::new(registry).unwrap();
        first.evaluate("F").unwrap();
        second.evaluate("F").unwrap();

        assert_ne!(first.session(), second.session());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
