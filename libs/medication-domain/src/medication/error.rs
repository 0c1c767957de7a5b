//! Error vocabularies for medication operations
//!
//! [`StorageError`] is the contract of the storage port: adapters translate their
//! engine failures into it. [`MedicationError`] is what the service hands to its
//! callers. Storage errors never cross the service boundary unwrapped.

use thiserror::Error;

use crate::medication::entity::Identity;
use crate::medication::ids::Version;

/// Errors surfaced by a [`MedicationRepository`](crate::ports::MedicationRepository)
#[derive(Error, Debug)]
pub enum StorageError {
    /// Another record already occupies this (owner, id) pair
    #[error("medication {0} already exists")]
    AlreadyExists(Identity),

    /// No record, or only a tombstoned one, exists for this identity
    #[error("medication {0} not found")]
    NotFound(Identity),

    /// The stored version no longer matches the one the caller read
    #[error("medication {identity} was modified concurrently (expected version {expected})")]
    VersionConflict { identity: Identity, expected: Version },

    /// The record handed to the storage layer is malformed
    #[error("invalid record: {0}")]
    BadInput(String),

    /// The key-value engine could not be reached or timed out
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Decode failures and unexpected engine errors
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Create a bad input error with a message
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    /// Create an unavailable error with a message
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Errors returned by the medication service
///
/// Kinds callers can act on are kept distinct. Everything else collapses into
/// `Internal`, whose message reveals nothing about the storage engine while
/// [`std::error::Error::source`] still exposes the original cause for logging.
#[derive(Error, Debug)]
pub enum MedicationError {
    /// The caller did not resolve an owner before calling the service.
    /// This is a programming error in the calling layer, not bad user input.
    #[error("owner must be resolved before calling the medication service")]
    MissingOwner,

    /// Caller-supplied identity or data violates basic shape constraints
    #[error("invalid input: {0}")]
    BadInput(String),

    /// The identity is already taken
    #[error("medication already exists")]
    AlreadyExists,

    /// No live record for the identity
    #[error("medication not found")]
    NotFound,

    /// The record changed since the caller read it; re-read and retry
    #[error("medication was modified concurrently")]
    VersionConflict,

    /// Unexpected failure below the service
    #[error("internal error during {operation}")]
    Internal {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
}

impl MedicationError {
    /// Translate a storage error into the service vocabulary
    pub fn from_storage(operation: &'static str, err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(_) => Self::AlreadyExists,
            StorageError::NotFound(_) => Self::NotFound,
            StorageError::VersionConflict { .. } => Self::VersionConflict,
            StorageError::BadInput(msg) => Self::BadInput(msg),
            source @ (StorageError::Unavailable(_) | StorageError::Internal(_)) => {
                Self::Internal { operation, source }
            }
        }
    }

    /// Translate a storage error raised by create
    ///
    /// Only an identity collision keeps its kind; create's caller has already
    /// validated the input, so anything else is an internal failure.
    pub fn from_create(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(_) => Self::AlreadyExists,
            source => Self::Internal {
                operation: "create",
                source,
            },
        }
    }

    /// Whether retrying after re-reading the record may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict)
    }
}

/// Result type alias for medication service operations
pub type Result<T> = std::result::Result<T, MedicationError>;
