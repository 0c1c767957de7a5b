//! Conditional-write protocol for medication records
//!
//! [`MedicationStore`] implements the `MedicationRepository` port over any
//! [`TableEngine`]. Uniqueness and optimistic concurrency are enforced entirely by
//! engine-side preconditions:
//!
//! | operation | precondition on the stored item                         |
//! |-----------|---------------------------------------------------------|
//! | create    | no item under (PK, SK)                                  |
//! | update    | `version == expected` and no tombstone                  |
//! | delete    | `version == read version` and no tombstone              |
//! | erase     | `version == read version` (tombstones included)         |

use std::future::Future;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use medication_domain::{Identity, Medication, MedicationRepository, StorageError, Version};
use tracing::{debug, debug_span, error, info, Instrument};

use crate::engine::{Condition, EngineError, Item, TableEngine};
use crate::key::StorageKey;
use crate::record::{StorageRecord, ATTR_DELETED_AT, ATTR_VERSION};

/// Configuration for the medication store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Table holding one item per medication (default: "medication")
    pub medication_table: String,
    /// Append-only table receiving snapshots of erased records (default: "medication_audit")
    pub audit_table: String,
    /// Deadline applied to every engine call (default: 5s)
    pub operation_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            medication_table: "medication".to_string(),
            audit_table: "medication_audit".to_string(),
            operation_timeout: Duration::from_secs(5),
        }
    }
}

/// Storage layer for medication records
///
/// Holds no mutable state; concurrent calls only coordinate through the engine.
pub struct MedicationStore<E> {
    engine: E,
    config: StoreConfig,
}

impl<E> MedicationStore<E>
where
    E: TableEngine,
{
    /// Create a new store over the given engine
    pub fn new(engine: E, config: StoreConfig) -> Self {
        info!(
            table = %config.medication_table,
            audit_table = %config.audit_table,
            timeout_ms = config.operation_timeout.as_millis() as u64,
            "Initializing MedicationStore"
        );
        Self { engine, config }
    }

    /// Create a new store with default configuration
    pub fn with_engine(engine: E) -> Self {
        Self::new(engine, StoreConfig::default())
    }

    /// Get the store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the underlying engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Bound an engine call by the configured deadline
    ///
    /// An elapsed deadline says nothing about whether a write was applied.
    async fn within_deadline<T>(
        &self,
        call: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.config.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::unavailable(format!(
                "operation timed out after {}ms",
                self.config.operation_timeout.as_millis()
            ))),
        }
    }

    /// Read the stored record, tombstoned or not
    async fn load(&self, identity: &Identity) -> Result<Option<StorageRecord>, StorageError> {
        let key = StorageKey::for_identity(identity);

        let item = self
            .within_deadline(self.engine.get_item(&self.config.medication_table, &key))
            .await
            .map_err(|err| engine_failure("get", identity, err))?;

        item.map(|item| decode(identity, &item)).transpose()
    }

    async fn put_medication(&self, item: Item, condition: Condition) -> Result<(), EngineError> {
        self.within_deadline(
            self.engine
                .put_item(&self.config.medication_table, item, condition),
        )
        .await
    }
}

impl<E> MedicationRepository for MedicationStore<E>
where
    E: TableEngine,
{
    fn create_medication(
        &self,
        medication: &Medication,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        let span = debug_span!(
            "create_medication",
            owner = %medication.identity.owner,
            id = %medication.identity.id
        );
        let record = StorageRecord::new(medication.clone());

        async move {
            let identity = &record.medication().identity;
            validate_identity(identity)?;
            validate_version(&record.medication().version)?;

            match self
                .put_medication(record.to_item(), Condition::ItemAbsent)
                .await
            {
                Ok(()) => {
                    debug!(key = %record.key(), "Medication stored");
                    Ok(())
                }
                Err(EngineError::ConditionFailed { .. }) => {
                    info!("Medication already exists");
                    Err(StorageError::AlreadyExists(identity.clone()))
                }
                Err(err) => Err(engine_failure("create", identity, err)),
            }
        }
        .instrument(span)
    }

    fn get_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<Medication, StorageError>> + Send {
        let span = debug_span!("get_medication", owner = %identity.owner, id = %identity.id);

        async move {
            validate_identity(identity)?;

            match self.load(identity).await? {
                Some(record) if !record.is_tombstoned() => Ok(record.into_medication()),
                Some(record) => {
                    debug!(deleted_at = ?record.deleted_at(), "Medication is tombstoned");
                    Err(StorageError::NotFound(identity.clone()))
                }
                None => Err(StorageError::NotFound(identity.clone())),
            }
        }
        .instrument(span)
    }

    fn update_medication(
        &self,
        expected_version: &Version,
        medication: &Medication,
    ) -> impl Future<Output = Result<Medication, StorageError>> + Send {
        let span = debug_span!(
            "update_medication",
            owner = %medication.identity.owner,
            id = %medication.identity.id,
            expected_version = %expected_version
        );
        let record = StorageRecord::new(medication.clone());

        async move {
            let identity = &record.medication().identity;
            validate_identity(identity)?;
            validate_version(&record.medication().version)?;
            if &record.medication().version == expected_version {
                return Err(StorageError::bad_input(
                    "new version must differ from the expected version",
                ));
            }

            let condition = Condition::All(vec![
                Condition::equals(ATTR_VERSION, expected_version.as_str()),
                Condition::attribute_absent(ATTR_DELETED_AT),
            ]);

            match self.put_medication(record.to_item(), condition).await {
                Ok(()) => {
                    debug!(version = %record.medication().version, "Medication updated");
                    Ok(record.into_medication())
                }
                Err(EngineError::ConditionFailed { current }) => {
                    Err(precondition_failure(identity, expected_version, current))
                }
                Err(err) => Err(engine_failure("update", identity, err)),
            }
        }
        .instrument(span)
    }

    fn delete_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        let span = debug_span!("delete_medication", owner = %identity.owner, id = %identity.id);

        async move {
            validate_identity(identity)?;

            let record = match self.load(identity).await? {
                Some(record) if !record.is_tombstoned() => record,
                _ => return Err(StorageError::NotFound(identity.clone())),
            };

            let expected = record.medication().version.clone();
            let condition = Condition::All(vec![
                Condition::equals(ATTR_VERSION, expected.as_str()),
                Condition::attribute_absent(ATTR_DELETED_AT),
            ]);
            let tombstoned = record.tombstone(timestamp());

            match self.put_medication(tombstoned.to_item(), condition).await {
                Ok(()) => {
                    info!(deleted_at = ?tombstoned.deleted_at(), "Medication tombstoned");
                    Ok(())
                }
                Err(EngineError::ConditionFailed { current }) => {
                    Err(precondition_failure(identity, &expected, current))
                }
                Err(err) => Err(engine_failure("delete", identity, err)),
            }
        }
        .instrument(span)
    }

    fn erase_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        let span = debug_span!("erase_medication", owner = %identity.owner, id = %identity.id);

        async move {
            validate_identity(identity)?;

            let Some(record) = self.load(identity).await? else {
                return Err(StorageError::NotFound(identity.clone()));
            };

            // Archive before removing so the snapshot survives even if removal fails
            let erased_at = timestamp();
            self.within_deadline(self.engine.put_item(
                &self.config.audit_table,
                record.to_audit_item(&erased_at),
                Condition::ItemAbsent,
            ))
            .await
            .map_err(|err| engine_failure("archive", identity, err))?;

            let expected = &record.medication().version;
            let removal = self
                .within_deadline(self.engine.delete_item(
                    &self.config.medication_table,
                    record.key(),
                    Condition::equals(ATTR_VERSION, expected.as_str()),
                ))
                .await;

            match removal {
                Ok(()) => {
                    info!(erased_at = %erased_at, "Medication erased");
                    Ok(())
                }
                Err(EngineError::ConditionFailed { current: None }) => {
                    Err(StorageError::NotFound(identity.clone()))
                }
                Err(EngineError::ConditionFailed { current: Some(_) }) => {
                    Err(StorageError::VersionConflict {
                        identity: identity.clone(),
                        expected: expected.clone(),
                    })
                }
                Err(err) => Err(engine_failure("erase", identity, err)),
            }
        }
        .instrument(span)
    }
}

fn validate_identity(identity: &Identity) -> Result<(), StorageError> {
    if identity.owner.is_empty() {
        return Err(StorageError::bad_input("owner must not be empty"));
    }
    if identity.id.is_empty() {
        return Err(StorageError::bad_input("id must not be empty"));
    }
    Ok(())
}

fn validate_version(version: &Version) -> Result<(), StorageError> {
    if version.is_empty() {
        return Err(StorageError::bad_input("version must not be empty"));
    }
    Ok(())
}

fn decode(identity: &Identity, item: &Item) -> Result<StorageRecord, StorageError> {
    let record = StorageRecord::from_item(item).map_err(|err| {
        error!(owner = %identity.owner, id = %identity.id, error = %err, "Failed to decode stored medication");
        StorageError::internal(format!("failed to decode medication {}: {}", identity, err))
    })?;

    if &record.medication().identity != identity {
        error!(
            owner = %identity.owner,
            id = %identity.id,
            stored = %record.medication().identity,
            "Stored medication belongs to another identity"
        );
        return Err(StorageError::internal(format!(
            "stored medication does not match {}",
            identity
        )));
    }

    Ok(record)
}

/// Classify a failed version precondition using the item that failed it
fn precondition_failure(
    identity: &Identity,
    expected: &Version,
    current: Option<Item>,
) -> StorageError {
    let live = current.is_some_and(|item| !item.contains_key(ATTR_DELETED_AT));
    if live {
        debug!(expected_version = %expected, "Version precondition failed");
        StorageError::VersionConflict {
            identity: identity.clone(),
            expected: expected.clone(),
        }
    } else {
        StorageError::NotFound(identity.clone())
    }
}

/// Translate and log an engine failure where it is first observed
fn engine_failure(operation: &'static str, identity: &Identity, err: EngineError) -> StorageError {
    error!(
        operation,
        owner = %identity.owner,
        id = %identity.id,
        error = %err,
        "Medication storage operation failed"
    );

    match err {
        EngineError::Unavailable(msg) => {
            StorageError::unavailable(format!("{} {}: {}", operation, identity, msg))
        }
        other => StorageError::internal(format!("{} {}: {}", operation, identity, other)),
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
