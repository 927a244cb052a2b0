//! Integration tests for the registry, cache and query public API.

use preconditions::error::EvaluationFailure;
use preconditions::facts::builtin::Constant;
use preconditions::facts::{from_fn, FactValue, ProbeError, ProbeFailurePolicy};
use preconditions::query::{ErrorPolicy, Observed, Preconditions, RunDecision};
use preconditions::registry::{contributor, PreconditionDefinition, PreconditionRegistry};
use preconditions::PreconditionError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn constant(value: bool) -> Arc<Constant> {
    Arc::new(Constant(FactValue::Bool(value)))
}

fn counting(value: bool, calls: &Arc<AtomicUsize>) -> Arc<dyn preconditions::facts::FactProvider> {
    let calls = Arc::clone(calls);
    from_fn("counting probe", move || {
        calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(FactValue::Bool(value))
    })
}

#[test]
fn list_all_preserves_registration_order() {
    let mut registry = PreconditionRegistry::new();
    registry.register_fact("f", constant(true)).unwrap();
    for name in ["ZULU", "ALPHA", "MIKE"] {
        registry
            .register(PreconditionDefinition::fact_is_true(name, "f"))
            .unwrap();
    }
    registry.freeze().unwrap();

    assert_eq!(registry.list_all(), ["ZULU", "ALPHA", "MIKE"]);
}

#[test]
fn duplicate_registration_leaves_registry_unchanged() {
    let mut registry = PreconditionRegistry::new();
    registry.register_fact("yes", constant(true)).unwrap();
    registry.register_fact("no", constant(false)).unwrap();
    registry
        .register(PreconditionDefinition::fact_is_true("A", "yes").with_description("first"))
        .unwrap();

    let err = registry
        .register(PreconditionDefinition::fact_is_true("A", "no").with_description("second"))
        .unwrap_err();
    assert!(matches!(err, PreconditionError::DuplicateName { ref name } if name == "A"));

    registry.freeze().unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.lookup("A").unwrap().description(), Some("first"));

    let preconditions = Preconditions::new(Arc::new(registry)).unwrap();
    assert!(preconditions.is_satisfied("A").unwrap());
}

#[test]
fn register_after_freeze_fails() {
    let mut registry = PreconditionRegistry::new();
    registry.register_fact("f", constant(true)).unwrap();
    registry.freeze().unwrap();

    let err = registry
        .register(PreconditionDefinition::fact_is_true("LATE", "f"))
        .unwrap_err();
    assert!(matches!(err, PreconditionError::RegistryFrozen { .. }));
    assert!(!registry.contains("LATE"));

    let err = registry.register_fact("late", constant(true)).unwrap_err();
    assert!(matches!(err, PreconditionError::RegistryFrozen { .. }));
}

#[test]
fn repeated_queries_probe_once_per_session() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = PreconditionRegistry::new();
    registry.register_fact("probe", counting(true, &calls)).unwrap();
    registry
        .register(PreconditionDefinition::fact_is_true("P", "probe"))
        .unwrap();
    registry
        .register(PreconditionDefinition::not("NOT_P", "P"))
        .unwrap();
    registry.freeze().unwrap();
    let preconditions = Preconditions::new(Arc::new(registry)).unwrap();

    for _ in 0..5 {
        assert!(preconditions.is_satisfied("P").unwrap());
        assert!(!preconditions.is_satisfied("NOT_P").unwrap());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    preconditions.new_session().unwrap();
    assert!(preconditions.is_satisfied("P").unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_queries_share_one_probe() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = PreconditionRegistry::new();
    registry.register_fact("slow", counting(true, &calls)).unwrap();
    registry
        .register(PreconditionDefinition::fact_is_true("SLOW", "slow"))
        .unwrap();
    registry.freeze().unwrap();
    let preconditions = Preconditions::new(Arc::new(registry)).unwrap();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| preconditions.is_satisfied("SLOW").unwrap()))
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn probe_failure_surfaces_as_evaluation_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = PreconditionRegistry::new();
    registry
        .register_fact(
            "broken",
            from_fn("broken probe", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProbeError::Unavailable {
                    message: "socket closed".to_string(),
                })
            }),
        )
        .unwrap();
    registry
        .register(PreconditionDefinition::fact_is_true("BROKEN", "broken"))
        .unwrap();
    registry.freeze().unwrap();
    let preconditions = Preconditions::new(Arc::new(registry)).unwrap();

    for _ in 0..2 {
        let err = preconditions.is_satisfied("BROKEN").unwrap_err();
        match err {
            PreconditionError::PreconditionEvaluation { name, cause } => {
                assert_eq!(name, "BROKEN");
                assert!(matches!(cause, EvaluationFailure::Probe { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let decision = preconditions.decide(&["BROKEN"], ErrorPolicy::Skip).unwrap();
    assert!(!decision.should_run());
    assert!(matches!(decision.reasons()[0].observed, Observed::Error(_)));

    let err = preconditions.decide(&["BROKEN"], ErrorPolicy::Fail).unwrap_err();
    assert!(matches!(err, PreconditionError::PreconditionEvaluation { .. }));
}

#[test]
fn assume_false_policy_turns_probe_failure_into_unsatisfied() {
    let mut registry = PreconditionRegistry::new();
    registry
        .register_fact_with_policy(
            "daemon",
            from_fn("daemon probe", || {
                Err(ProbeError::Unavailable {
                    message: "not running".to_string(),
                })
            }),
            ProbeFailurePolicy::AssumeFalse,
        )
        .unwrap();
    registry
        .register(PreconditionDefinition::fact_is_true("DAEMON", "daemon"))
        .unwrap();
    registry
        .register(PreconditionDefinition::not("NO_DAEMON", "DAEMON"))
        .unwrap();
    registry.freeze().unwrap();
    let preconditions = Preconditions::new(Arc::new(registry)).unwrap();

    assert!(!preconditions.is_satisfied("DAEMON").unwrap());
    assert!(preconditions.is_satisfied("NO_DAEMON").unwrap());
}

#[test]
fn docker_scenario_with_duplicate_and_unknown_names() {
    let docker = contributor("docker", |registry| {
        registry.register_fact("docker_probe", constant(true))?;
        registry.register(
            PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe")
                .with_description("Docker daemon is reachable"),
        )
    });
    let preconditions = Preconditions::discover(&[&docker]).unwrap();

    assert!(preconditions.is_satisfied("HAS_DOCKER").unwrap());
    assert!(matches!(
        preconditions.is_satisfied("HAS_GPU"),
        Err(PreconditionError::UnknownPrecondition { ref name }) if name == "HAS_GPU"
    ));

    let err = preconditions
        .decide(&["HAS_DOCKER", "HAS_GPU"], ErrorPolicy::Skip)
        .unwrap_err();
    assert!(matches!(err, PreconditionError::UnknownPrecondition { .. }));

    let again = contributor("docker-again", |registry| {
        registry.register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
    });
    let err = PreconditionRegistry::discover(&[&docker, &again]).unwrap_err();
    match err {
        PreconditionError::Contributor {
            contributor,
            source,
        } => {
            assert_eq!(contributor, "docker-again");
            assert!(matches!(*source, PreconditionError::DuplicateName { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn decide_reports_every_unsatisfied_name() {
    let gates = contributor("gates", |registry| {
        registry.register_fact("on", constant(true))?;
        registry.register_fact("off", constant(false))?;
        registry.register(PreconditionDefinition::fact_is_true("ON", "on"))?;
        registry.register(PreconditionDefinition::fact_is_true("OFF", "off"))?;
        registry.register(PreconditionDefinition::all_of("BOTH", ["ON", "OFF"]))
    });
    let preconditions = Preconditions::discover(&[&gates]).unwrap();

    assert_eq!(
        preconditions.decide(&["ON"], ErrorPolicy::Skip).unwrap(),
        RunDecision::Run
    );

    let decision = preconditions
        .decide(&["ON", "OFF", "BOTH"], ErrorPolicy::Skip)
        .unwrap();
    let skipped: Vec<&str> = decision
        .reasons()
        .iter()
        .map(|r| r.precondition.as_str())
        .collect();
    assert_eq!(skipped, ["OFF", "BOTH"]);
    assert_eq!(
        decision.reasons()[0].to_string(),
        "requires OFF, got: not satisfied"
    );
}

#[test]
fn cyclic_preconditions_are_rejected_at_freeze() {
    let mut registry = PreconditionRegistry::new();
    registry
        .register(PreconditionDefinition::all_of("A", ["B"]))
        .unwrap();
    registry
        .register(PreconditionDefinition::not("B", "A"))
        .unwrap();

    let err = registry.freeze().unwrap_err();
    match err {
        PreconditionError::CyclicDependency { cycle } => assert_eq!(cycle, "A -> B -> A"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!registry.is_frozen());
}

#[test]
fn unknown_fact_is_rejected_at_freeze() {
    let mut registry = PreconditionRegistry::new();
    registry
        .register(PreconditionDefinition::fact_is_true("GHOST", "ghost_probe"))
        .unwrap();

    assert!(matches!(
        registry.freeze().unwrap_err(),
        PreconditionError::UnknownFact { .. }
    ));
}

#[test]
fn invalidate_reprobes_only_dependent_facts() {
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let mut registry = PreconditionRegistry::new();
    registry.register_fact("a", counting(true, &a_calls)).unwrap();
    registry.register_fact("b", counting(true, &b_calls)).unwrap();
    registry
        .register(PreconditionDefinition::fact_is_true("A", "a"))
        .unwrap();
    registry
        .register(PreconditionDefinition::fact_is_true("B", "b"))
        .unwrap();
    registry
        .register(PreconditionDefinition::not("NOT_A", "A"))
        .unwrap();
    registry.freeze().unwrap();
    let preconditions = Preconditions::new(Arc::new(registry)).unwrap();

    for name in ["A", "B", "NOT_A"] {
        preconditions.is_satisfied(name).unwrap();
    }

    let dropped = preconditions.invalidate("a");
    assert_eq!(dropped, ["A", "NOT_A"]);

    for name in ["A", "B", "NOT_A"] {
        preconditions.is_satisfied(name).unwrap();
    }
    assert_eq!(a_calls.load(Ordering::SeqCst), 2);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn report_covers_every_precondition_in_order() {
    let gates = contributor("gates", |registry| {
        registry.register_fact("on", constant(true))?;
        registry.register(
            PreconditionDefinition::fact_is_true("ON", "on").with_description("always on"),
        )?;
        registry.register(PreconditionDefinition::not("OFF", "ON"))
    });
    let preconditions = Preconditions::discover(&[&gates]).unwrap();

    let report = preconditions.report();
    let names: Vec<&str> = report.preconditions.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["ON", "OFF"]);
    assert_eq!(report.satisfied(), 1);
    assert_eq!(report.facts.len(), 1);
    assert_eq!(report.facts[0].key, "on");
}
