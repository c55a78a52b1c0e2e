// =============================================================================
// Data store — in-memory, thread-safe, per-collection append/query
// =============================================================================
//
// Each named collection lives behind its own lock so a liquidity-alert write
// never blocks a concurrent Sharpe-history read (§4.3 redesign note).
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub recorded_at: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Default)]
struct Collection {
    records: Vec<StoredRecord>,
}

pub struct DataStore {
    collections: RwLock<HashMap<String, RwLock<Collection>>>,
    configs: RwLock<HashMap<String, Value>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            configs: RwLock::new(HashMap::new()),
        }
    }

    fn with_collection<R>(&self, name: &str, f: impl FnOnce(&RwLock<Collection>) -> R) -> R {
        {
            let collections = self.collections.read();
            if let Some(col) = collections.get(name) {
                return f(col);
            }
        }
        let mut collections = self.collections.write();
        let col = collections
            .entry(name.to_string())
            .or_insert_with(|| RwLock::new(Collection::default()));
        f(col)
    }

    pub fn append(&self, collection: &str, payload: Value) {
        self.with_collection(collection, |col| {
            col.write().records.push(StoredRecord {
                recorded_at: Utc::now(),
                payload,
            });
        });
    }

    pub fn query_all(&self, collection: &str) -> Vec<StoredRecord> {
        self.with_collection(collection, |col| col.read().records.clone())
    }

    pub fn len(&self, collection: &str) -> usize {
        self.with_collection(collection, |col| col.read().records.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Drop records older than `max_age_days` across all collections.
    pub fn purge_older_than_days(&self, max_age_days: i64) {
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        let collections = self.collections.read();
        for col in collections.values() {
            col.write().records.retain(|r| r.recorded_at >= cutoff);
        }
    }

    /// System config keyed `<type>.<name>`.
    pub fn set_config(&self, kind: &str, name: &str, value: Value) {
        self.configs
            .write()
            .insert(format!("{kind}.{name}"), value);
    }

    pub fn get_config(&self, kind: &str, name: &str) -> Option<Value> {
        self.configs.read().get(&format!("{kind}.{name}")).cloned()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
