//! Medication service - Business logic orchestration
//!
//! The service enforces caller-independent invariants, owns version minting and
//! narrows storage errors into [`MedicationError`]. It holds no state between calls:
//! all coordination between concurrent requests happens in the storage engine's
//! atomic conditional writes.
//!
//! Field validation of [`MedicationData`] belongs to the calling layer; the service
//! does not repeat it.

use std::future::Future;

use tracing::{debug, instrument};

use super::{Identity, Medication, MedicationData, MedicationError, Result, Version};
use crate::ports::{MedicationRepository, MedicationServicePort, RandomVersions, VersionSource};

/// Service for managing medication records
///
/// ## Static Dispatch
///
/// The service is generic over any `MedicationRepository` and `VersionSource`.
/// The compiler will generate specialized versions for each concrete type,
/// resulting in zero-cost abstractions.
pub struct MedicationService<R, V = RandomVersions> {
    repository: R,
    versions: V,
}

impl<R> MedicationService<R, RandomVersions>
where
    R: MedicationRepository,
{
    /// Create a new MedicationService minting random version tokens
    pub fn with_repository(repository: R) -> Self {
        Self::new(repository, RandomVersions)
    }
}

impl<R, V> MedicationService<R, V>
where
    R: MedicationRepository,
    V: VersionSource,
{
    /// Create a new MedicationService with the given repository and version source
    pub fn new(repository: R, versions: V) -> Self {
        Self {
            repository,
            versions,
        }
    }

    /// Create a medication under a freshly minted version
    ///
    /// # Errors
    ///
    /// - `MedicationError::MissingOwner` if `identity.owner` is empty
    /// - `MedicationError::AlreadyExists` if the identity is already taken
    /// - `MedicationError::Internal` on any other storage failure
    #[instrument(skip(self, identity, data), fields(owner = %identity.owner, id = %identity.id))]
    pub async fn create_medication(
        &self,
        identity: &Identity,
        data: MedicationData,
    ) -> Result<Medication> {
        require_owner(identity)?;

        let medication = Medication::new(identity.clone(), data, self.versions.next_version());

        self.repository
            .create_medication(&medication)
            .await
            .map_err(MedicationError::from_create)?;

        debug!(version = %medication.version, "Medication created");
        Ok(medication)
    }

    /// Fetch a live medication
    ///
    /// # Errors
    ///
    /// - `MedicationError::MissingOwner` if `identity.owner` is empty
    /// - `MedicationError::NotFound` if no live record exists for this owner and id
    #[instrument(skip(self, identity), fields(owner = %identity.owner, id = %identity.id))]
    pub async fn get_medication(&self, identity: &Identity) -> Result<Medication> {
        require_owner(identity)?;

        self.repository
            .get_medication(identity)
            .await
            .map_err(|err| MedicationError::from_storage("get", err))
    }

    /// Replace the data of a medication the caller read at `expected_version`
    ///
    /// A new version is minted for every attempt. On `VersionConflict` the caller
    /// must re-read the record and retry with the fresh version.
    ///
    /// # Errors
    ///
    /// - `MedicationError::VersionConflict` if the record changed since it was read
    /// - `MedicationError::NotFound` if no live record exists
    #[instrument(
        skip(self, identity, expected_version, data),
        fields(owner = %identity.owner, id = %identity.id, expected_version = %expected_version)
    )]
    pub async fn update_medication(
        &self,
        identity: &Identity,
        expected_version: &Version,
        data: MedicationData,
    ) -> Result<Medication> {
        require_owner(identity)?;

        let mut version = self.versions.next_version();
        if &version == expected_version {
            // The storage layer rejects a write that would not move the version
            version = self.versions.next_version();
        }

        let medication = Medication::new(identity.clone(), data, version);

        let updated = self
            .repository
            .update_medication(expected_version, &medication)
            .await
            .map_err(|err| MedicationError::from_storage("update", err))?;

        debug!(version = %updated.version, "Medication updated");
        Ok(updated)
    }

    /// Logically delete a medication
    #[instrument(skip(self, identity), fields(owner = %identity.owner, id = %identity.id))]
    pub async fn delete_medication(&self, identity: &Identity) -> Result<()> {
        require_owner(identity)?;

        self.repository
            .delete_medication(identity)
            .await
            .map_err(|err| MedicationError::from_storage("delete", err))
    }

    /// Physically erase a medication, archiving its last snapshot first
    #[instrument(skip(self, identity), fields(owner = %identity.owner, id = %identity.id))]
    pub async fn erase_medication(&self, identity: &Identity) -> Result<()> {
        require_owner(identity)?;

        self.repository
            .erase_medication(identity)
            .await
            .map_err(|err| MedicationError::from_storage("erase", err))
    }
}

fn require_owner(identity: &Identity) -> Result<()> {
    if identity.owner.is_empty() {
        return Err(MedicationError::MissingOwner);
    }
    Ok(())
}

impl<R, V> MedicationServicePort for MedicationService<R, V>
where
    R: MedicationRepository,
    V: VersionSource,
{
    fn create_medication(
        &self,
        identity: &Identity,
        data: MedicationData,
    ) -> impl Future<Output = Result<Medication>> + Send {
        MedicationService::create_medication(self, identity, data)
    }

    fn get_medication(&self, identity: &Identity) -> impl Future<Output = Result<Medication>> + Send {
        MedicationService::get_medication(self, identity)
    }

    fn update_medication(
        &self,
        identity: &Identity,
        expected_version: &Version,
        data: MedicationData,
    ) -> impl Future<Output = Result<Medication>> + Send {
        MedicationService::update_medication(self, identity, expected_version, data)
    }

    fn delete_medication(&self, identity: &Identity) -> impl Future<Output = Result<()>> + Send {
        MedicationService::delete_medication(self, identity)
    }

    fn erase_medication(&self, identity: &Identity) -> impl Future<Output = Result<()>> + Send {
        MedicationService::erase_medication(self, identity)
    }
}
