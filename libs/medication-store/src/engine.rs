//! Port for the key-value engine
//!
//! The storage layer treats the engine as a black box over a single table with
//! three primitives: conditional put, point get and conditional delete. The engine
//! must evaluate a [`Condition`] and apply the write as one atomic step; this is
//! the only concurrency primitive the medication service relies on.

use std::collections::BTreeMap;
use std::future::Future;

use thiserror::Error;

use crate::key::StorageKey;

/// Partition key attribute
pub const ATTR_PK: &str = "PK";

/// Sort key attribute
pub const ATTR_SK: &str = "SK";

/// A stored item: a flat map of attribute names to string values
pub type Item = BTreeMap<String, String>;

/// Precondition evaluated atomically against the item currently stored under the key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No item is stored under the key
    ItemAbsent,
    /// An item exists and its attribute equals `value`
    Equals {
        attribute: &'static str,
        value: String,
    },
    /// The attribute is missing, or no item exists at all
    AttributeAbsent { attribute: &'static str },
    /// Every nested condition holds
    All(Vec<Condition>),
}

impl Condition {
    pub fn equals(attribute: &'static str, value: impl Into<String>) -> Self {
        Self::Equals {
            attribute,
            value: value.into(),
        }
    }

    pub fn attribute_absent(attribute: &'static str) -> Self {
        Self::AttributeAbsent { attribute }
    }

    /// Evaluate the condition against the currently stored item
    ///
    /// Engines that cannot push conditions down to the server use this to get the
    /// same semantics as engines that can.
    pub fn evaluate(&self, current: Option<&Item>) -> bool {
        match self {
            Self::ItemAbsent => current.is_none(),
            Self::Equals { attribute, value } => current
                .and_then(|item| item.get(*attribute))
                .is_some_and(|stored| stored == value),
            Self::AttributeAbsent { attribute } => {
                current.map_or(true, |item| !item.contains_key(*attribute))
            }
            Self::All(conditions) => conditions.iter().all(|c| c.evaluate(current)),
        }
    }
}

/// Errors reported by a [`TableEngine`]
#[derive(Error, Debug)]
pub enum EngineError {
    /// The precondition did not hold; nothing was written
    ///
    /// `current` is the item that failed the check, if one is stored.
    #[error("conditional check failed")]
    ConditionFailed { current: Option<Item> },

    /// Timeouts, throttling and transport failures. The write may or may not have
    /// been applied.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// Any other engine failure (missing table, malformed request, ...)
    #[error("engine error: {0}")]
    Other(String),
}

impl EngineError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Port for a single-table key-value engine
///
/// Items passed to `put_item` carry their own key attributes ([`ATTR_PK`] and
/// [`ATTR_SK`]). Reads must be strongly consistent so that a read following an
/// acknowledged write observes it.
pub trait TableEngine: Send + Sync {
    /// Write `item`, replacing any stored item, if `condition` holds
    fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Condition,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Point lookup by key
    fn get_item(
        &self,
        table: &str,
        key: &StorageKey,
    ) -> impl Future<Output = Result<Option<Item>, EngineError>> + Send;

    /// Remove the item under `key` if `condition` holds
    fn delete_item(
        &self,
        table: &str,
        key: &StorageKey,
        condition: Condition,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}
