//! Conversation-tree state engine for a branching chat application.
//!
//! Replies can be regenerated, edited, or forked, producing a tree of
//! alternative continuations instead of a linear transcript. The crate owns
//! the persisted node model, the observable store primitive views subscribe
//! to, and the registry that runs at most one cancellable streaming
//! generation task per node. Rendering and input widgets live elsewhere and
//! talk to [`models::ConversationTree`] only.

pub mod config;
pub mod models;
pub mod repositories;
pub mod services;

pub use config::CompletionConfig;
pub use models::{
    Atom, BranchOptions, ConversationTree, NodeMeta, NodeRecord, Role, Subscription,
    TaskCallbacks, TaskError, TaskRegistry, TreeError, TreeResult,
};
pub use repositories::{InMemoryNodeStore, JsonNodeStore, NodeStore, StoreError, StoreResult};
pub use services::{
    ChatMessage, CompletionClient, CompletionRequest, HttpCompletionClient, MessageRole,
    StreamChunk,
};
