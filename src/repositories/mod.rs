pub mod error;
pub mod in_memory_store;
pub mod json_store;
pub mod node_store;

pub use error::{StoreError, StoreResult};
pub use in_memory_store::InMemoryNodeStore;
pub use json_store::JsonNodeStore;
pub use node_store::NodeStore;
