//! Integration tests that verify every example profile in
//! `data/profiles/examples/` loads and compiles.

use std::path::PathBuf;

use serde_json::json;

use killwatch_surveillance::compiler::{compile_profile, validate_filter_tree};
use killwatch_surveillance::evaluator::validate_killmail;
use killwatch_surveillance::schema::Profile;
use killwatch_surveillance::store::{FileProfileStore, LoadStatus, ProfileStore};

/// Integration tests run from the crate directory, so go up two levels.
fn examples_dir() -> PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../data/profiles/examples")
}

async fn active_profiles() -> Vec<Profile> {
    let (store, results) = FileProfileStore::open(examples_dir()).unwrap();
    for r in &results {
        assert!(
            matches!(r.status, LoadStatus::Loaded { .. }),
            "{} did not load: {:?}",
            r.path.display(),
            r.status
        );
    }
    store.get_active_profiles().await.unwrap()
}

#[tokio::test]
async fn inactive_example_is_filtered_out() {
    let ids: Vec<i64> = active_profiles().await.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1001, 1002, 1003, 1004]);
}

#[tokio::test]
async fn every_example_validates_cleanly() {
    for profile in active_profiles().await {
        let report = validate_filter_tree(&profile.filter_tree);
        assert!(report.valid, "profile {} invalid: {:?}", profile.id, report.errors);
        assert!(report.warnings.is_empty(), "profile {} warns: {:?}", profile.id, report.warnings);
    }
}

#[tokio::test]
async fn corp_involvement_matches_either_side() {
    let profile = active_profiles()
        .await
        .into_iter()
        .find(|p| p.id == 1003)
        .unwrap();
    assert_eq!(profile.user_id, Some(42));
    let compiled = compile_profile(&profile).unwrap();

    let km = validate_killmail(&json!({
        "killmail_id": 1,
        "killmail_time": "2024-05-01T12:00:00Z",
        "solar_system_id": 30000142,
        "victim": {"corporation_id": 98000009},
        "attackers": [{"corporation_id": 98000001}]
    }))
    .unwrap();
    assert!(compiled.matches(&km).unwrap());
}
