//! # Medication Storage Layer
//!
//! Implements the `MedicationRepository` port on top of any single-table key-value
//! engine that offers conditional puts, point gets and conditional deletes.
//!
//! - [`key`]: maps an (owner, id) identity onto a partition/sort key pair
//! - [`record`]: the stored item shape and its decoding
//! - [`engine`]: the engine port (`TableEngine`) and its condition language
//! - [`store`]: the conditional-write protocol (`MedicationStore`)
//! - [`memory`]: an in-process engine with the same atomic semantics
//! - [`infrastructure`]: the DynamoDB engine adapter
//!
//! Every write is a single conditional operation on one item, so no partial write
//! is ever observable and no in-process lock is needed.

pub mod engine;
pub mod infrastructure;
pub mod key;
pub mod memory;
pub mod record;
pub mod store;

pub use engine::{Condition, EngineError, Item, TableEngine};
pub use infrastructure::DynamoTable;
pub use key::StorageKey;
pub use memory::InMemoryTable;
pub use record::StorageRecord;
pub use store::{MedicationStore, StoreConfig};
