//! Tests for the parallel evaluator.

use std::sync::Arc;

use killwatch_core::Killmail;
use serde_json::json;

use super::*;
use crate::compiler::{compile_profile, IndexPlan};
use crate::test_support::{killmail, leaf, profile};

fn compiled(id: ProfileId, field: &str, op: &str, value: serde_json::Value) -> CompiledProfile {
    compile_profile(&profile(id, leaf(field, op, value))).unwrap()
}

fn panicking(id: ProfileId) -> CompiledProfile {
    CompiledProfile {
        id,
        name: "explodes".into(),
        predicate: Arc::new(|_: &Killmail| -> Result<bool, EvaluationError> {
            panic!("corrupt predicate")
        }),
        plan: IndexPlan::FullScan,
    }
}

#[test]
fn returns_matching_ids_in_candidate_order() {
    let evaluator = MatchEvaluator::new(4, 8).unwrap();
    let profiles = [
        compiled(1, "victim_ship_type_id", "eq", json!(670)),
        compiled(2, "victim_ship_type_id", "eq", json!(671)),
        compiled(3, "total_value", "gt", json!(100_000_000)),
        compiled(4, "module_tags", "contains_any", json!(["cyno"])),
    ];
    let refs: Vec<&CompiledProfile> = profiles.iter().collect();

    let matched = evaluator.evaluate_candidates_parallel(&refs, &killmail(1));
    assert_eq!(matched, vec![1, 3, 4]);

    let stats = evaluator.stats();
    assert_eq!(stats.killmails_evaluated, 1);
    assert_eq!(stats.predicates_run, 4);
    assert_eq!(stats.matches, 3);
    assert_eq!(stats.faults, 0);
}

#[test]
fn faulting_predicates_do_not_affect_others() {
    let evaluator = MatchEvaluator::new(2, 8).unwrap();
    let profiles = [
        compiled(1, "victim_ship_type_id", "eq", json!(670)),
        panicking(2),
        // Numeric comparison on a tag list is a type mismatch at runtime.
        compiled(3, "module_tags", "gt", json!(1)),
        compiled(4, "total_value", "gte", json!(1)),
    ];
    let refs: Vec<&CompiledProfile> = profiles.iter().collect();

    let matched = evaluator.evaluate_candidates_parallel(&refs, &killmail(1));
    assert_eq!(matched, vec![1, 4]);
    assert_eq!(evaluator.stats().faults, 2);
}

#[test]
fn empty_candidate_list() {
    let evaluator = MatchEvaluator::new(0, 0).unwrap();
    assert_eq!(evaluator.worker_threads(), 1);
    assert!(evaluator
        .evaluate_candidates_parallel(&[], &killmail(1))
        .is_empty());
}

#[test]
fn spawn_runs_on_pool() {
    let evaluator = MatchEvaluator::new(1, 8).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    evaluator.spawn(move || {
        let name = std::thread::current().name().map(str::to_string);
        let _ = tx.send(name);
    });
    let name = rx.recv().unwrap();
    assert_eq!(name.as_deref(), Some("surveillance-eval-0"));
}

#[test]
fn panicking_job_does_not_take_down_pool() {
    let evaluator = MatchEvaluator::new(1, 8).unwrap();
    evaluator.spawn(|| panic!("job blew up"));

    let (tx, rx) = std::sync::mpsc::channel();
    evaluator.spawn(move || {
        let _ = tx.send(42);
    });
    assert_eq!(rx.recv().unwrap(), 42);
}

#[test]
fn try_spawn_refuses_beyond_in_flight_limit() {
    let evaluator = MatchEvaluator::new(1, 1).unwrap();
    let (release, blocked) = std::sync::mpsc::channel::<()>();
    let (done_tx, done) = std::sync::mpsc::channel();

    assert!(evaluator.try_spawn(move || {
        let _ = blocked.recv();
        let _ = done_tx.send(());
    }));
    assert_eq!(evaluator.in_flight(), 1);
    assert!(!evaluator.try_spawn(|| {}));
    assert_eq!(evaluator.stats().rejected, 1);

    release.send(()).unwrap();
    done.recv().unwrap();
    // The permit is released once the job returns.
    let mut accepted = false;
    for _ in 0..200 {
        if evaluator.try_spawn(|| {}) {
            accepted = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert!(accepted);
}
