//! Ports (trait definitions) for external dependencies
//!
//! This module defines the contracts (ports) that external adapters must implement.
//! Following hexagonal architecture, the domain defines what it needs, and the
//! infrastructure provides implementations.
//!
//! ## Static Dispatch
//!
//! We use native Rust async traits with `impl Future` return types instead of
//! `async_trait` to ensure zero-cost abstractions and static dispatch.

use std::future::Future;

use crate::medication::{
    Identity, Medication, MedicationData, MedicationError, StorageError, Version,
};

/// Port for medication persistence
///
/// Implementations own the mapping from [`Identity`] to storage keys and must make
/// every write a single atomic conditional operation on the key-value engine. No
/// read-then-write window may decide whether a write happens.
///
/// Dropping a returned future cancels the call. A write cancelled before the engine
/// acknowledged it may still have been applied, so callers that need idempotence must
/// retry with the same identity and rely on `AlreadyExists`.
pub trait MedicationRepository: Send + Sync {
    /// Insert a fully populated record if no record exists for its identity
    ///
    /// # Errors
    ///
    /// - `StorageError::AlreadyExists` if the (owner, id) pair is taken, including by a
    ///   tombstoned record
    /// - `StorageError::BadInput` if the owner, id or version is empty
    /// - `StorageError::Unavailable` / `StorageError::Internal` on engine failure
    fn create_medication(
        &self,
        medication: &Medication,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Point lookup of a live record
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` if no record exists or it is tombstoned
    /// - `StorageError::Internal` if the stored item cannot be decoded
    fn get_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<Medication, StorageError>> + Send;

    /// Replace a live record if its stored version still equals `expected_version`
    ///
    /// `medication.version` is the new token and must differ from `expected_version`.
    ///
    /// # Errors
    ///
    /// - `StorageError::VersionConflict` if the stored version moved on
    /// - `StorageError::NotFound` if no live record exists
    /// - `StorageError::BadInput` if the new version equals the expected one
    fn update_medication(
        &self,
        expected_version: &Version,
        medication: &Medication,
    ) -> impl Future<Output = Result<Medication, StorageError>> + Send;

    /// Logically delete a record by setting a tombstone on it
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` if no live record exists
    /// - `StorageError::VersionConflict` if the record changed while being tombstoned
    fn delete_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Physically remove a record, live or tombstoned, for compliance-driven erasure
    ///
    /// The prior snapshot is archived to an append-only log before removal.
    fn erase_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Source of fresh version tokens
///
/// Any generator of collision-resistant, unpredictable opaque strings satisfies
/// this contract.
#[cfg_attr(test, mockall::automock)]
pub trait VersionSource: Send + Sync {
    fn next_version(&self) -> Version;
}

/// Default version source backed by random UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomVersions;

impl VersionSource for RandomVersions {
    fn next_version(&self) -> Version {
        Version::generate()
    }
}

/// Port trait for medication service operations
///
/// This trait defines the contract consumed by the transport layer. It is
/// implemented by the concrete `MedicationService<R, V>` and can be implemented
/// by fakes when testing adapters.
pub trait MedicationServicePort: Send + Sync {
    /// Create a medication under a fresh version
    ///
    /// # Errors
    ///
    /// - `MedicationError::MissingOwner` if `identity.owner` is empty
    /// - `MedicationError::AlreadyExists` if the identity is taken
    /// - `MedicationError::Internal` on any other storage failure
    fn create_medication(
        &self,
        identity: &Identity,
        data: MedicationData,
    ) -> impl Future<Output = Result<Medication, MedicationError>> + Send;

    /// Fetch a live medication
    fn get_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<Medication, MedicationError>> + Send;

    /// Replace the data of a medication read at `expected_version`
    fn update_medication(
        &self,
        identity: &Identity,
        expected_version: &Version,
        data: MedicationData,
    ) -> impl Future<Output = Result<Medication, MedicationError>> + Send;

    /// Tombstone a medication
    fn delete_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), MedicationError>> + Send;

    /// Physically erase a medication after archiving it
    fn erase_medication(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), MedicationError>> + Send;
}
