//! # Medication Domain Layer
//!
//! This crate contains the pure business logic and domain models for the
//! medication service. It follows hexagonal architecture principles:
//!
//! - **Entities**: Core domain models (Identity, MedicationData, Medication, Version)
//! - **Ports**: Trait definitions for external dependencies (MedicationRepository, VersionSource)
//! - **Services**: Business logic orchestration (MedicationService)
//!
//! ## Architecture
//!
//! This layer has NO dependencies on infrastructure concerns (DynamoDB, HTTP, etc.).
//! All external dependencies are expressed as traits (ports) that are implemented
//! by adapter layers.
//!
//! ## Example
//!
//! ```rust
//! use medication_domain::medication::{Form, Identity, MedicationData, MedicationService};
//! use medication_domain::ports::MedicationRepository;
//!
//! // The service is generic over any MedicationRepository implementation
//! async fn example<R: MedicationRepository>(service: MedicationService<R>) {
//!     let identity = Identity::new("owner", "42");
//!     let data = MedicationData::new("paracetamol", "500mg", Form::Tablet);
//!     let medication = service.create_medication(&identity, data).await.unwrap();
//!     println!("Created version: {}", medication.version);
//! }
//! ```

pub mod medication;
pub mod ports;

// Re-export commonly used types
pub use medication::{
    Form, Identity, Medication, MedicationData, MedicationError, MedicationService, StorageError,
    Version,
};
pub use ports::{MedicationRepository, MedicationServicePort, RandomVersions, VersionSource};
