//! Integration tests for the medication store
//!
//! These tests verify that:
//! 1. A record created under an identity is readable only under that identity
//! 2. Concurrent creates on one identity have exactly one winner
//! 3. Updates succeed only against the current version, with one winner per version
//! 4. Tombstoned records behave as absent but keep their identity reserved
//! 5. Erasure archives the snapshot and frees the identity

use std::collections::HashSet;
use std::sync::Arc;

use medication_domain::{
    Form, Identity, Medication, MedicationData, MedicationRepository, StorageError, Version,
};
use medication_store::{InMemoryTable, MedicationStore, StorageKey, StoreConfig};

fn medication(owner: &str, id: &str, version: &str) -> Medication {
    Medication::new(
        Identity::new(owner, id),
        MedicationData::new("my name", "dosage 500mg", Form::Tablet),
        Version::new(version),
    )
}

fn store() -> (InMemoryTable, MedicationStore<InMemoryTable>) {
    let table = InMemoryTable::new();
    (table.clone(), MedicationStore::with_engine(table))
}

/// Test that a record is only visible under the exact identity it was stored with
#[tokio::test]
async fn test_get_is_scoped_to_identity() {
    let (_, store) = store();
    let stored = Medication::new(
        Identity::new("owner", "42"),
        MedicationData::new("my other name", "other dosage 500mg", Form::Liquid),
        Version::new("some version"),
    );
    store.create_medication(&stored).await.unwrap();

    let found = store
        .get_medication(&Identity::new("owner", "42"))
        .await
        .unwrap();
    assert_eq!(found, stored);

    let err = store
        .get_medication(&Identity::new("owner", "43"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));

    let err = store
        .get_medication(&Identity::new("owner2", "42"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

/// Test that a second create under the same identity is rejected and leaves the first intact
#[tokio::test]
async fn test_duplicate_create_is_rejected() {
    let (table, store) = store();
    store
        .create_medication(&medication("owner", "some id", "v1"))
        .await
        .unwrap();

    let err = store
        .create_medication(&medication("owner", "some id", "v2"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(ref identity) if identity.id == "some id"));

    store
        .create_medication(&medication("owner", "some id 2", "v3"))
        .await
        .unwrap();

    let kept = store
        .get_medication(&Identity::new("owner", "some id"))
        .await
        .unwrap();
    assert_eq!(kept.version, Version::new("v1"));
    assert_eq!(table.len("medication"), 2);
}

/// Test that exactly one of many concurrent creates on one identity wins
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_have_one_winner() {
    let (table, store) = store();
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .create_medication(&medication("owner", "42", &format!("v{}", i)))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(StorageError::AlreadyExists(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners, 1, "exactly one create must succeed");
    assert_eq!(table.len("medication"), 1);
}

/// Test that concurrent creates on distinct identities all succeed
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_on_distinct_identities() {
    let (table, store) = store();
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .create_medication(&medication("owner", &i.to_string(), "v1"))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(table.len("medication"), 16);
}

/// Test that identities differing only around the separator never collide
#[tokio::test]
async fn test_separator_identities_do_not_collide() {
    let (table, store) = store();
    let identities = [("a#b", "c"), ("a", "b#c"), ("a\\", "#c"), ("a\\#", "c")];

    for (owner, id) in identities {
        store
            .create_medication(&medication(owner, id, "v1"))
            .await
            .unwrap();
    }

    assert_eq!(table.len("medication"), identities.len());
    let keys: HashSet<StorageKey> = identities
        .iter()
        .map(|(owner, id)| StorageKey::for_identity(&Identity::new(*owner, *id)))
        .collect();
    assert_eq!(keys.len(), identities.len());

    for (owner, id) in identities {
        let found = store
            .get_medication(&Identity::new(owner, id))
            .await
            .unwrap();
        assert_eq!(found.identity, Identity::new(owner, id));
    }
}

/// Test the optimistic concurrency cycle: stale writer conflicts, re-read and retry succeeds
#[tokio::test]
async fn test_update_requires_current_version() {
    let (_, store) = store();
    let identity = Identity::new("owner", "42");
    store
        .create_medication(&medication("owner", "42", "v1"))
        .await
        .unwrap();

    let updated = store
        .update_medication(&Version::new("v1"), &medication("owner", "42", "v2"))
        .await
        .unwrap();
    assert_eq!(updated.version, Version::new("v2"));

    // A writer that still holds v1 loses
    let err = store
        .update_medication(&Version::new("v1"), &medication("owner", "42", "v3"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::VersionConflict { ref expected, .. } if expected.as_str() == "v1"
    ));

    let current = store.get_medication(&identity).await.unwrap();
    assert_eq!(current.version, Version::new("v2"));

    store
        .update_medication(&current.version, &medication("owner", "42", "v3"))
        .await
        .unwrap();
    assert_eq!(
        store.get_medication(&identity).await.unwrap().version,
        Version::new("v3")
    );
}

/// Test that exactly one of many concurrent updates against one version wins
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_have_one_winner() {
    let (_, store) = store();
    store
        .create_medication(&medication("owner", "42", "v0"))
        .await
        .unwrap();
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 1..=32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .update_medication(
                    &Version::new("v0"),
                    &medication("owner", "42", &format!("v{}", i)),
                )
                .await
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(updated) => winners.push(updated.version),
            Err(StorageError::VersionConflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one update must succeed");
    assert_eq!(conflicts, 31);

    let current = store
        .get_medication(&Identity::new("owner", "42"))
        .await
        .unwrap();
    assert_eq!(current.version, winners[0]);
}

/// Test that updating a record that was never created is NotFound, not a conflict
#[tokio::test]
async fn test_update_missing_record() {
    let (table, store) = store();

    let err = store
        .update_medication(&Version::new("v1"), &medication("owner", "42", "v2"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound(_)));
    assert!(table.is_empty("medication"));
}

/// Test that a tombstoned record is invisible but still reserves its identity
#[tokio::test]
async fn test_delete_leaves_tombstone() {
    let (table, store) = store();
    let identity = Identity::new("owner", "42");
    store
        .create_medication(&medication("owner", "42", "v1"))
        .await
        .unwrap();

    store.delete_medication(&identity).await.unwrap();

    assert!(matches!(
        store.get_medication(&identity).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
    assert!(matches!(
        store
            .create_medication(&medication("owner", "42", "v2"))
            .await
            .unwrap_err(),
        StorageError::AlreadyExists(_)
    ));
    assert!(matches!(
        store
            .update_medication(&Version::new("v1"), &medication("owner", "42", "v2"))
            .await
            .unwrap_err(),
        StorageError::NotFound(_)
    ));
    assert!(matches!(
        store.delete_medication(&identity).await.unwrap_err(),
        StorageError::NotFound(_)
    ));

    let items = table.items("medication");
    assert_eq!(items.len(), 1);
    assert!(items[0].contains_key("deleted_at"));
    assert_eq!(items[0]["version"], "v1");
}

/// Test that erasure archives the last snapshot and frees the identity
#[tokio::test]
async fn test_erase_archives_and_frees_identity() {
    let (table, store) = store();
    let identity = Identity::new("owner", "42");
    store
        .create_medication(&medication("owner", "42", "v1"))
        .await
        .unwrap();
    store.delete_medication(&identity).await.unwrap();

    store.erase_medication(&identity).await.unwrap();

    assert!(table.is_empty("medication"));
    let audit = table.items("medication_audit");
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["PK"], "owner#42");
    assert_eq!(audit[0]["version"], "v1");
    assert!(audit[0].contains_key("erased_at"));
    assert!(audit[0].contains_key("deleted_at"));

    // The identity can be reused once erased
    store
        .create_medication(&medication("owner", "42", "v2"))
        .await
        .unwrap();
    assert_eq!(
        store.get_medication(&identity).await.unwrap().version,
        Version::new("v2")
    );
}

/// Test that erasing an unknown identity touches neither table
#[tokio::test]
async fn test_erase_missing_record() {
    let (table, store) = store();

    let err = store
        .erase_medication(&Identity::new("owner", "42"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound(_)));
    assert!(table.is_empty("medication"));
    assert!(table.is_empty("medication_audit"));
}

/// Test that table names come from the configuration
#[tokio::test]
async fn test_custom_table_names() {
    let table = InMemoryTable::new();
    let store = MedicationStore::new(
        table.clone(),
        StoreConfig {
            medication_table: "meds".to_string(),
            audit_table: "meds_audit".to_string(),
            ..StoreConfig::default()
        },
    );

    store
        .create_medication(&medication("owner", "42", "v1"))
        .await
        .unwrap();
    store
        .erase_medication(&Identity::new("owner", "42"))
        .await
        .unwrap();

    assert!(table.is_empty("meds"));
    assert_eq!(table.len("meds_audit"), 1);
    assert!(table.is_empty("medication"));
}
