//! Composition tests: super-call chains, purity, and shared-base safety.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use scrimmage::{
    run_worker, Compose, ConfigError, Namespace, StateError, Transition, WorkloadConfig,
};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn namespace() -> Namespace {
    Namespace::new("testdb", "compose")
}

fn base_with_log(log: &Log) -> WorkloadConfig<()> {
    let log = Arc::clone(log);
    WorkloadConfig::builder()
        .state("init", move |_, _, _, _| {
            log.lock().push("base");
            Ok(())
        })
        .build()
        .unwrap()
}

/// A two-level composition chain executes base, mid, and leaf handler
/// bodies in order on a single invocation: each wrapper captured the
/// immediate parent's handler, not the root's.
#[test]
fn super_calls_chain_transitively() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let base = base_with_log(&log);

    let mid = {
        let log = Arc::clone(&log);
        Compose::new(&base)
            .wrap_state("init", move |parent| {
                let log = Arc::clone(&log);
                Arc::new(move |ctx, conn, ns, cache| {
                    parent(ctx, conn, ns, cache)?;
                    log.lock().push("mid");
                    Ok(())
                })
            })
            .finish()
            .unwrap()
    };

    let leaf = {
        let log = Arc::clone(&log);
        Compose::new(&mid)
            .wrap_state("init", move |parent| {
                let log = Arc::clone(&log);
                Arc::new(move |ctx, conn, ns, cache| {
                    parent(ctx, conn, ns, cache)?;
                    log.lock().push("leaf");
                    Ok(())
                })
            })
            .finish()
            .unwrap()
    };

    run_worker(&leaf, 0, 1, &(), &namespace(), None);
    assert_eq!(*log.lock(), vec!["base", "mid", "leaf"]);

    // The mid layer still runs exactly base-then-mid.
    log.lock().clear();
    run_worker(&mid, 0, 1, &(), &namespace(), None);
    assert_eq!(*log.lock(), vec!["base", "mid"]);

    // And the root is untouched by either composition.
    log.lock().clear();
    run_worker(&base, 0, 1, &(), &namespace(), None);
    assert_eq!(*log.lock(), vec!["base"]);
}

/// A wrapper may short-circuit before the super call; the parent body then
/// never runs.
#[test]
fn wrapper_controls_whether_super_runs() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let base = base_with_log(&log);

    let derived = {
        let log = Arc::clone(&log);
        Compose::new(&base)
            .wrap_state("init", move |_parent| {
                let log = Arc::clone(&log);
                Arc::new(move |_ctx, _conn, _ns, _cache| {
                    log.lock().push("replacement");
                    Ok(())
                })
            })
            .finish()
            .unwrap()
    };

    run_worker(&derived, 0, 1, &(), &namespace(), None);
    assert_eq!(*log.lock(), vec!["replacement"]);
}

/// One base shared across two derived workloads: neither derivation leaks
/// into the other or back into the base.
#[test]
fn shared_base_is_never_cross_contaminated() {
    let base = WorkloadConfig::<()>::builder()
        .thread_count(4)
        .state("init", |_, _, _, _| Ok(()))
        .state("work", |_, _, _, _| Ok(()))
        .transition("init", "work", 1.0)
        .transition("work", "work", 1.0)
        .data(json!({"docs": 10}))
        .build()
        .unwrap();

    let fast = Compose::new(&base)
        .merge_data(json!({"docs": 2}))
        .iterations(1)
        .finish()
        .unwrap();

    let angry = Compose::new(&base)
        .state("work", |_, _, _, _| Err(StateError::hard("always fails")))
        .merge_data(json!({"docs": 1000, "angry": true}))
        .thread_count(32)
        .iterations(2) // second iteration reaches the overridden `work` state
        .finish()
        .unwrap();

    assert_eq!(base.data()["docs"], 10);
    assert_eq!(base.thread_count(), 4);
    assert_eq!(fast.data()["docs"], 2);
    assert!(fast.data().get("angry").is_none());
    assert_eq!(angry.data()["docs"], 1000);
    assert_eq!(angry.thread_count(), 32);

    // The base still runs clean; the derivation's second iteration hits the
    // overridden `work` handler and hard-fails there.
    let report = run_worker(&base, 0, 1, &(), &namespace(), None);
    assert!(!report.failed());
    let report = run_worker(&angry, 0, 1, &(), &namespace(), None);
    let failure = report.hard_error.as_ref().unwrap();
    assert_eq!(failure.state, "work");
}

/// Referencing a state absent from both parent and override set fails at
/// compose time, before any run.
#[test]
fn unknown_state_reference_fails_fast() {
    let base = WorkloadConfig::<()>::builder()
        .state("init", |_, _, _, _| Ok(()))
        .build()
        .unwrap();

    let result = Compose::new(&base)
        .wrap_state("missing", |parent| parent)
        .finish();
    assert!(matches!(result, Err(ConfigError::UnknownOverride(s)) if s == "missing"));

    // A retuned graph is re-validated the same way a fresh build is.
    let result = Compose::new(&base)
        .transitions("init", vec![Transition::new("ghost", 1.0)])
        .finish();
    assert!(matches!(result, Err(ConfigError::UnknownTarget { .. })));
}
