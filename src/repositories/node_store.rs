use crate::models::node::NodeRecord;

use super::error::StoreResult;

/// Keyed persistent store for node records.
///
/// All operations are synchronous from the caller's point of view. There is
/// no transactional guarantee across keys: a crash between two writes may
/// leave a multi-key update partially applied.
pub trait NodeStore: Send + Sync + 'static {
    /// Read the record at `id`. A missing key is a normal state, not a
    /// failure: it reads back as the all-defaults record.
    fn get(&self, id: &str) -> StoreResult<NodeRecord>;

    /// Whether a record has been written at `id`.
    fn contains(&self, id: &str) -> StoreResult<bool>;

    /// Overwrite the record at `id`.
    fn set(&self, id: &str, record: NodeRecord) -> StoreResult<()>;

    /// Overwrite the record at `id` only if one is already present, in a
    /// single atomic step with respect to `delete`. Returns whether the
    /// write happened. Streaming callbacks use this so a write racing a
    /// delete can never resurrect the record.
    fn set_if_present(&self, id: &str, record: NodeRecord) -> StoreResult<bool>;

    /// Remove the record at `id`. Removing a missing key is a no-op.
    fn delete(&self, id: &str) -> StoreResult<()>;
}
