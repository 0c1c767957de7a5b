//! In-process key-value engine
//!
//! [`InMemoryTable`] evaluates conditions and applies writes under a single lock,
//! giving it the same single-item atomicity as the real engine. It backs tests and
//! local runs without a database.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::engine::{Condition, EngineError, Item, TableEngine, ATTR_PK, ATTR_SK};
use crate::key::StorageKey;

type Table = BTreeMap<StorageKey, Item>;

/// Shared in-memory tables, cheap to clone
#[derive(Clone, Default)]
pub struct InMemoryTable {
    tables: Arc<Mutex<HashMap<String, Table>>>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items stored in `table`
    pub fn len(&self, table: &str) -> usize {
        self.lock().get(table).map_or(0, Table::len)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// All items of `table` in key order
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.lock()
            .get(table)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Mutate a stored item in place, bypassing conditions
    ///
    /// Test hook simulating out-of-band writers and corrupted items.
    #[cfg(test)]
    pub(crate) fn modify_item(&self, table: &str, key: &StorageKey, change: impl FnOnce(&mut Item)) {
        if let Some(item) = self
            .lock()
            .get_mut(table)
            .and_then(|items| items.get_mut(key))
        {
            change(item);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Table>> {
        // A panic while holding the lock cannot leave a table half-written
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn key_of(item: &Item) -> Result<StorageKey, EngineError> {
    match (item.get(ATTR_PK), item.get(ATTR_SK)) {
        (Some(pk), Some(sk)) => Ok(StorageKey::from_parts(pk.clone(), sk.clone())),
        _ => Err(EngineError::other("item is missing its key attributes")),
    }
}

impl TableEngine for InMemoryTable {
    fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Condition,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        let tables = self.clone();
        let table = table.to_string();

        async move {
            let key = key_of(&item)?;
            let mut guard = tables.lock();
            let items = guard.entry(table).or_default();

            let current = items.get(&key);
            if !condition.evaluate(current) {
                trace!(key = %key, "Conditional put rejected");
                return Err(EngineError::ConditionFailed {
                    current: current.cloned(),
                });
            }

            items.insert(key, item);
            Ok(())
        }
    }

    fn get_item(
        &self,
        table: &str,
        key: &StorageKey,
    ) -> impl Future<Output = Result<Option<Item>, EngineError>> + Send {
        let tables = self.clone();
        let table = table.to_string();
        let key = key.clone();

        async move {
            let guard = tables.lock();
            let item = guard.get(&table).and_then(|items| items.get(&key)).cloned();
            Ok(item)
        }
    }

    fn delete_item(
        &self,
        table: &str,
        key: &StorageKey,
        condition: Condition,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        let tables = self.clone();
        let table = table.to_string();
        let key = key.clone();

        async move {
            let mut guard = tables.lock();
            let items = guard.entry(table).or_default();

            let current = items.get(&key);
            if !condition.evaluate(current) {
                trace!(key = %key, "Conditional delete rejected");
                return Err(EngineError::ConditionFailed {
                    current: current.cloned(),
                });
            }

            items.remove(&key);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pk: &str, sk: &str, version: &str) -> Item {
        let mut item = Item::new();
        item.insert(ATTR_PK.to_string(), pk.to_string());
        item.insert(ATTR_SK.to_string(), sk.to_string());
        item.insert("version".to_string(), version.to_string());
        item
    }

    #[tokio::test]
    async fn test_put_if_absent_rejects_second_write() {
        let engine = InMemoryTable::new();

        engine
            .put_item("t", item("o#1", "1", "v1"), Condition::ItemAbsent)
            .await
            .unwrap();
        let err = engine
            .put_item("t", item("o#1", "1", "v2"), Condition::ItemAbsent)
            .await
            .unwrap_err();

        match err {
            EngineError::ConditionFailed { current } => {
                assert_eq!(current.unwrap()["version"], "v1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.len("t"), 1);
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let engine = InMemoryTable::new();

        engine
            .put_item("a", item("o#1", "1", "v1"), Condition::ItemAbsent)
            .await
            .unwrap();
        engine
            .put_item("b", item("o#1", "1", "v1"), Condition::ItemAbsent)
            .await
            .unwrap();

        assert_eq!(engine.len("a"), 1);
        assert_eq!(engine.len("b"), 1);
        assert!(engine.is_empty("c"));
    }

    #[tokio::test]
    async fn test_get_missing_item() {
        let engine = InMemoryTable::new();
        let key = StorageKey::from_parts("o#1", "1");

        assert!(engine.get_item("t", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let engine = InMemoryTable::new();
        let key = StorageKey::from_parts("o#1", "1");
        engine
            .put_item("t", item("o#1", "1", "v1"), Condition::ItemAbsent)
            .await
            .unwrap();

        let err = engine
            .delete_item("t", &key, Condition::equals("version", "v0"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ConditionFailed { current: Some(_) }));

        engine
            .delete_item("t", &key, Condition::equals("version", "v1"))
            .await
            .unwrap();
        assert!(engine.is_empty("t"));

        let err = engine
            .delete_item("t", &key, Condition::equals("version", "v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ConditionFailed { current: None }));
    }

    #[tokio::test]
    async fn test_item_without_key_is_rejected() {
        let engine = InMemoryTable::new();

        let err = engine
            .put_item("t", Item::new(), Condition::ItemAbsent)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Other(_)));
    }
}
