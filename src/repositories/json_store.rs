use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::models::node::NodeRecord;

use super::error::{StoreError, StoreResult};
use super::node_store::NodeStore;

/// JSON file-based node store.
/// Stores each node as a separate `<id>.json` file in one directory.
pub struct JsonNodeStore {
    nodes_dir: PathBuf,
    // Serializes the existence-checked write against delete; the filesystem
    // alone offers no check-and-rename primitive.
    guard: Mutex<()>,
}

impl JsonNodeStore {
    /// Store under the default location, `<config_dir>/arbor/nodes`.
    pub fn new() -> StoreResult<Self> {
        let nodes_dir = dirs::config_dir()
            .ok_or_else(|| StoreError::Initialization {
                message: "Could not determine config directory".to_string(),
            })?
            .join("arbor")
            .join("nodes");

        Self::at(nodes_dir)
    }

    /// Store under an explicit directory, created if missing.
    pub fn at(nodes_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let nodes_dir = nodes_dir.into();
        std::fs::create_dir_all(&nodes_dir)?;
        Ok(Self {
            nodes_dir,
            guard: Mutex::new(()),
        })
    }

    fn write_record(&self, path: &Path, record: &NodeRecord) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(record)?;

        // Write atomically (write to temp, then rename)
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    fn node_path(&self, id: &str) -> PathBuf {
        self.nodes_dir.join(format!("{}.json", sanitize_id(id)))
    }
}

/// Node ids are opaque strings; keep the on-disk name filesystem-safe.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

impl NodeStore for JsonNodeStore {
    fn get(&self, id: &str) -> StoreResult<NodeRecord> {
        let path = self.node_path(id);
        if !path.exists() {
            return Ok(NodeRecord::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn contains(&self, id: &str) -> StoreResult<bool> {
        Ok(self.node_path(id).exists())
    }

    fn set(&self, id: &str, record: NodeRecord) -> StoreResult<()> {
        let path = self.node_path(id);
        self.write_record(&path, &record)
    }

    fn set_if_present(&self, id: &str, record: NodeRecord) -> StoreResult<bool> {
        let path = self.node_path(id);
        let _guard = self.guard.lock();
        if !path.exists() {
            return Ok(false);
        }
        self.write_record(&path, &record)?;
        Ok(true)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.node_path(id);
        let _guard = self.guard.lock();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}
