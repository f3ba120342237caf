//! End-to-end matching scenarios through the public API.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tempfile::TempDir;

use killwatch_core::SurveillanceConfig;
use killwatch_surveillance::evaluator::validate_killmail;
use killwatch_surveillance::index::IndexManager;
use killwatch_surveillance::recorder::{InMemoryMatchRecorder, JournalEntry, JsonlMatchRecorder};
use killwatch_surveillance::schema::{FilterTree, Profile};
use killwatch_surveillance::store::{FileProfileStore, InMemoryProfileStore};
use killwatch_surveillance::{MatchingCoordinator, Phase};

fn config() -> SurveillanceConfig {
    SurveillanceConfig {
        worker_threads: 4,
        match_timeout_ms: 2000,
        flush_interval_secs: 60,
        cleanup_interval_secs: 60,
        ..SurveillanceConfig::default()
    }
}

fn killmail(id: i64, ship_type_id: i64, total_value: f64) -> Value {
    json!({
        "killmail_id": id,
        "killmail_hash": format!("{id:x}"),
        "killmail_time": "2024-05-01T12:00:00Z",
        "solar_system_id": 30002813,
        "victim": {
            "character_id": 2112000001,
            "corporation_id": 98000001,
            "ship_type_id": ship_type_id,
            "ship_group_id": 25
        },
        "attackers": [
            {"character_id": 2112000002, "corporation_id": 98000002, "final_blow": true},
            {"character_id": 2112000003, "corporation_id": 98000002}
        ],
        "total_value": total_value,
        "module_tags": ["cyno"],
        "is_solo": false
    })
}

fn leaf(field: &str, op: &str, value: Value) -> FilterTree {
    FilterTree::leaf(field, op, value)
}

async fn coordinator_with(
    profiles: Vec<Profile>,
) -> (MatchingCoordinator, Arc<InMemoryProfileStore>, Arc<InMemoryMatchRecorder>) {
    let store = Arc::new(InMemoryProfileStore::with_profiles(profiles));
    let recorder = Arc::new(InMemoryMatchRecorder::new());
    let (coordinator, _notifications) =
        MatchingCoordinator::new(config(), store.clone(), recorder.clone()).unwrap();
    coordinator.initialize().await.unwrap();
    (coordinator, store, recorder)
}

// ── Scenario A: ship type and value threshold ──────────────────────

#[tokio::test]
async fn ship_type_with_value_threshold() {
    let tree: FilterTree = serde_json::from_value(json!({
        "and": [
            {"field": "victim_ship_type_id", "operator": "eq", "value": 670},
            {"field": "total_value", "operator": "gt", "value": 100000000}
        ]
    }))
    .unwrap();
    let (coordinator, _, _) = coordinator_with(vec![Profile::new(1, "pods", tree)]).await;

    assert_eq!(coordinator.match_killmail(&killmail(1, 670, 150_000_000.0)).await, vec![1]);
    assert!(coordinator.match_killmail(&killmail(2, 670, 50_000_000.0)).await.is_empty());
}

// ── Scenario B: many profiles, few relevant ─────────────────────────

#[tokio::test]
async fn thousand_profiles_narrow_to_referencing_ones() {
    let watched = 2112000003;
    let mut profiles: Vec<Profile> = (1..=1000)
        .map(|id| {
            let tree = leaf("character_id", "eq", json!(3_000_000_000i64 + id));
            Profile::new(id, format!("watch {id}"), tree)
        })
        .collect();
    for id in [10, 500, 990] {
        profiles[(id - 1) as usize] =
            Profile::new(id, format!("watch {id}"), leaf("character_id", "eq", json!(watched)));
    }
    profiles.push(Profile::new(5000, "big kills", leaf("total_value", "gte", json!(1e9))));

    let index = IndexManager::new();
    index.rebuild(&profiles);
    let km = validate_killmail(&killmail(1, 670, 150_000_000.0)).unwrap();
    assert_eq!(index.find_candidates(&km), BTreeSet::from([10, 500, 990, 5000]));

    let (coordinator, _, _) = coordinator_with(profiles).await;
    let started = Instant::now();
    let matches = coordinator.match_killmail(&killmail(1, 670, 150_000_000.0)).await;
    assert_eq!(matches, vec![10, 500, 990]);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(coordinator.stats().evaluator.predicates_run, 4);
}

// ── Scenario C: malformed input ─────────────────────────────────────

#[tokio::test]
async fn killmail_without_victim_is_rejected() {
    let (coordinator, _, recorder) =
        coordinator_with(vec![Profile::new(1, "all", leaf("is_npc", "eq", json!(false)))]).await;

    let mut raw = killmail(1, 670, 1.0);
    raw.as_object_mut().unwrap().remove("victim");
    assert!(validate_killmail(&raw).is_err());
    assert!(coordinator.match_killmail(&raw).await.is_empty());

    assert_eq!(coordinator.flush().await.unwrap(), 0);
    assert!(recorder.records().is_empty());
}

// ── Scenario D: fault isolation ─────────────────────────────────────

#[tokio::test]
async fn faulting_profile_does_not_affect_others() {
    let (coordinator, _, _) = coordinator_with(vec![
        Profile::new(1, "ships", leaf("victim_ship_type_id", "eq", json!(670))),
        // Compiles, but an ordering comparison on a tag list faults at runtime.
        Profile::new(2, "broken", leaf("module_tags", "gt", json!(3))),
        Profile::new(3, "corp", leaf("attacker_corporation_id", "contains_any", json!([98000002]))),
    ])
    .await;

    let matches = coordinator.match_killmail(&killmail(1, 670, 1.0)).await;
    assert_eq!(matches, vec![1, 3]);
    assert_eq!(coordinator.stats().evaluator.faults, 1);
}

// ── Cache, reload, flush ────────────────────────────────────────────

#[tokio::test]
async fn identical_killmail_hits_cache() {
    let (coordinator, _, _) =
        coordinator_with(vec![Profile::new(1, "all", leaf("is_npc", "eq", json!(false)))]).await;

    let first = coordinator.match_killmail(&killmail(7, 670, 1.0)).await;
    let runs = coordinator.stats().evaluator.predicates_run;
    let second = coordinator.match_killmail(&killmail(7, 670, 1.0)).await;

    assert_eq!(first, second);
    assert_eq!(coordinator.stats().evaluator.predicates_run, runs);
}

#[tokio::test]
async fn reload_serves_new_profiles_not_stale_cache() {
    let ships = Profile::new(1, "ships", leaf("victim_ship_type_id", "eq", json!(670)));
    let (coordinator, store, _) = coordinator_with(vec![ships]).await;
    assert_eq!(coordinator.match_killmail(&killmail(1, 670, 1.0)).await, vec![1]);

    store.remove(1);
    store.upsert(Profile::new(2, "corp", leaf("corporation_id", "eq", json!(98000002))));
    coordinator.reload().await.unwrap();
    assert_eq!(coordinator.phase(), Phase::Ready);

    assert_eq!(coordinator.match_killmail(&killmail(1, 670, 1.0)).await, vec![2]);
}

#[tokio::test]
async fn failing_recorder_keeps_records_for_next_flush() {
    let (coordinator, _, recorder) =
        coordinator_with(vec![Profile::new(1, "all", leaf("is_npc", "eq", json!(false)))]).await;
    coordinator.match_killmail(&killmail(1, 670, 1.0)).await;
    coordinator.match_killmail(&killmail(2, 670, 1.0)).await;

    recorder.fail_next(1);
    assert!(coordinator.flush().await.is_err());
    assert!(recorder.records().is_empty());

    assert_eq!(coordinator.flush().await.unwrap(), 2);
    assert_eq!(recorder.match_count(1), 2);
}

// ── File-backed deployment ──────────────────────────────────────────

#[tokio::test]
async fn file_store_and_journal_end_to_end() {
    let dir = TempDir::new().unwrap();
    let profiles_dir = dir.path().join("profiles");
    let journal = dir.path().join("matches.jsonl");

    std::fs::create_dir_all(&profiles_dir).unwrap();
    std::fs::write(
        profiles_dir.join("ships.yml"),
        "id: 1\nname: ships\nfilter_tree:\n  field: victim_ship_type_id\n  operator: eq\n  value: 670\n",
    )
    .unwrap();
    std::fs::write(profiles_dir.join("broken.yml"), "filter_tree: [").unwrap();

    let (store, results) = FileProfileStore::open(profiles_dir).unwrap();
    assert_eq!(results.len(), 2);
    let store = Arc::new(store);
    let recorder = Arc::new(JsonlMatchRecorder::new(journal.clone()));
    let (coordinator, mut notifications) =
        MatchingCoordinator::new(config(), store, recorder.clone()).unwrap();
    coordinator.initialize().await.unwrap();

    assert_eq!(coordinator.match_killmail(&killmail(1, 670, 1.0)).await, vec![1]);
    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.profile_id, 1);

    assert_eq!(coordinator.shutdown().await.unwrap(), 1);
    let entries = recorder.read_entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(matches!(&entries[0], JournalEntry::Match(r) if r.killmail_id() == 1));
    assert!(matches!(&entries[1], JournalEntry::Counter(c) if c.matches == 1));
}
