pub mod atom;
pub mod node;
pub mod task_registry;
pub mod tree;

pub use atom::{Atom, Subscription};
pub use node::{NodeMeta, NodeRecord, Role};
pub use task_registry::{TaskCallbacks, TaskError, TaskRegistry};
pub use tree::{BranchOptions, ConversationTree, TreeError, TreeResult};
