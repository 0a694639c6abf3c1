use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::node::NodeRecord;

use super::error::StoreResult;
use super::node_store::NodeStore;

/// In-memory node store.
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryNodeStore {
    records: Arc<Mutex<HashMap<String, NodeRecord>>>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn get(&self, id: &str) -> StoreResult<NodeRecord> {
        Ok(self.records.lock().get(id).cloned().unwrap_or_default())
    }

    fn contains(&self, id: &str) -> StoreResult<bool> {
        Ok(self.records.lock().contains_key(id))
    }

    fn set(&self, id: &str, record: NodeRecord) -> StoreResult<()> {
        self.records.lock().insert(id.to_string(), record);
        Ok(())
    }

    fn set_if_present(&self, id: &str, record: NodeRecord) -> StoreResult<bool> {
        // Check and write under one lock acquisition so a concurrent delete
        // cannot slip in between.
        match self.records.lock().get_mut(id) {
            Some(slot) => {
                *slot = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        self.records.lock().remove(id);
        Ok(())
    }
}
