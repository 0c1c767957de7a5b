//! Medication domain module
//!
//! This module contains the core business logic and entities for medication records.
//! It defines what a Medication is, how records are identified, and the error
//! vocabularies of the storage port and of the service itself.

mod entity;
mod error;
mod ids;
mod service;

pub use entity::{Form, Identity, Medication, MedicationData, MAX_FIELD_CHARS};
pub use error::{MedicationError, Result, StorageError};
pub use ids::Version;
pub use service::MedicationService;
