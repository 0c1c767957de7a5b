//! Stored item shape
//!
//! A [`StorageRecord`] composes the derived storage key with the domain record and
//! an optional tombstone marker. Attribute layout of a stored item:
//!
//! ```text
//! PK          escaped "owner#id"
//! SK          id
//! owner       String
//! id          String
//! name        String
//! dosage      String
//! form        "tablet" | "capsule" | "liquid"
//! version     opaque version token
//! deleted_at  RFC 3339 timestamp (optional, tombstone marker)
//! ```
//!
//! Audit entries in the append-only log repeat these attributes with their own sort
//! key and an `erased_at` timestamp.

use medication_domain::{Form, Identity, Medication, MedicationData, Version};
use thiserror::Error;

use crate::engine::{Item, ATTR_PK, ATTR_SK};
use crate::key::{StorageKey, KEY_SEPARATOR};

pub const ATTR_OWNER: &str = "owner";
pub const ATTR_ID: &str = "id";
pub const ATTR_NAME: &str = "name";
pub const ATTR_DOSAGE: &str = "dosage";
pub const ATTR_FORM: &str = "form";
pub const ATTR_VERSION: &str = "version";

/// Tombstone marker. Its presence makes the record logically absent.
pub const ATTR_DELETED_AT: &str = "deleted_at";

/// Erasure timestamp of an audit entry
pub const ATTR_ERASED_AT: &str = "erased_at";

/// Errors decoding a stored item
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing attribute '{0}'")]
    MissingAttribute(&'static str),

    #[error("invalid form '{0}'")]
    InvalidForm(String),

    #[error("stored key {stored} does not match identity key {derived}")]
    KeyMismatch { stored: String, derived: String },
}

/// A medication record together with its derived key and tombstone state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    key: StorageKey,
    medication: Medication,
    deleted_at: Option<String>,
}

impl StorageRecord {
    /// Wrap a live record
    pub fn new(medication: Medication) -> Self {
        Self {
            key: StorageKey::for_identity(&medication.identity),
            medication,
            deleted_at: None,
        }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn medication(&self) -> &Medication {
        &self.medication
    }

    pub fn into_medication(self) -> Medication {
        self.medication
    }

    pub fn deleted_at(&self) -> Option<&str> {
        self.deleted_at.as_deref()
    }

    /// Whether the record has been logically deleted
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Mark the record as deleted at the given timestamp
    pub fn tombstone(mut self, deleted_at: impl Into<String>) -> Self {
        self.deleted_at = Some(deleted_at.into());
        self
    }

    /// Encode into the item written to the medication table
    pub fn to_item(&self) -> Item {
        let medication = &self.medication;
        let mut item = Item::new();
        item.insert(ATTR_PK.to_string(), self.key.partition().to_string());
        item.insert(ATTR_SK.to_string(), self.key.sort().to_string());
        item.insert(ATTR_OWNER.to_string(), medication.identity.owner.clone());
        item.insert(ATTR_ID.to_string(), medication.identity.id.clone());
        item.insert(ATTR_NAME.to_string(), medication.data.name.clone());
        item.insert(ATTR_DOSAGE.to_string(), medication.data.dosage.clone());
        item.insert(ATTR_FORM.to_string(), medication.data.form.as_str().to_string());
        item.insert(ATTR_VERSION.to_string(), medication.version.as_str().to_string());
        if let Some(deleted_at) = &self.deleted_at {
            item.insert(ATTR_DELETED_AT.to_string(), deleted_at.clone());
        }
        item
    }

    /// Key of the audit entry archiving this snapshot at `erased_at`
    pub fn audit_key(&self, erased_at: &str) -> StorageKey {
        StorageKey::from_parts(
            self.key.partition(),
            format!(
                "{}{}{}",
                erased_at,
                KEY_SEPARATOR,
                self.medication.version.as_str()
            ),
        )
    }

    /// Encode into an append-only audit entry
    pub fn to_audit_item(&self, erased_at: &str) -> Item {
        let key = self.audit_key(erased_at);
        let mut item = self.to_item();
        item.insert(ATTR_PK.to_string(), key.partition().to_string());
        item.insert(ATTR_SK.to_string(), key.sort().to_string());
        item.insert(ATTR_ERASED_AT.to_string(), erased_at.to_string());
        item
    }

    /// Decode a stored item
    ///
    /// Every required attribute must be present and the stored key must be the one
    /// derived from the stored identity. A partially decoded record is never returned.
    pub fn from_item(item: &Item) -> Result<Self, DecodeError> {
        let identity = Identity::new(
            required(item, ATTR_OWNER)?,
            required(item, ATTR_ID)?,
        );

        let raw_form = required(item, ATTR_FORM)?;
        let form = Form::parse(raw_form)
            .ok_or_else(|| DecodeError::InvalidForm(raw_form.to_string()))?;

        let data = MedicationData::new(
            required(item, ATTR_NAME)?,
            required(item, ATTR_DOSAGE)?,
            form,
        );
        let version = Version::new(required(item, ATTR_VERSION)?);

        let record = Self {
            key: StorageKey::for_identity(&identity),
            medication: Medication::new(identity, data, version),
            deleted_at: item.get(ATTR_DELETED_AT).cloned(),
        };

        let stored = StorageKey::from_parts(required(item, ATTR_PK)?, required(item, ATTR_SK)?);
        if stored != record.key {
            return Err(DecodeError::KeyMismatch {
                stored: stored.to_string(),
                derived: record.key.to_string(),
            });
        }

        Ok(record)
    }
}

fn required<'a>(item: &'a Item, attribute: &'static str) -> Result<&'a str, DecodeError> {
    item.get(attribute)
        .map(String::as_str)
        .ok_or(DecodeError::MissingAttribute(attribute))
}
