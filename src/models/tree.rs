use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::repositories::error::StoreError;
use crate::repositories::node_store::NodeStore;
use crate::services::completion::{ChatMessage, CompletionRequest};

use super::atom::{Atom, Subscription};
use super::node::{NodeMeta, NodeRecord, Role};
use super::task_registry::{TaskCallbacks, TaskError, TaskRegistry};

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: String, child: String },

    #[error("node {0} has no selected child")]
    NoSelection(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Options for [`ConversationTree::new_branch`].
#[derive(Debug, Clone, Default)]
pub struct BranchOptions {
    /// Initial content of the new node.
    pub content: Option<String>,
    /// Explicit role; when absent the role defaults to the opposite of the
    /// currently selected child's role (or of the parent's own role when
    /// nothing is selected).
    pub role: Option<Role>,
    /// Start a generation task for the new node when it is an assistant
    /// placeholder without content.
    pub fill_content: bool,
    /// When the new node is a user node with content, immediately create an
    /// assistant placeholder child and start generating its answer.
    pub add_answer: bool,
}

/// The conversation tree and its mutation algorithms.
///
/// All mutations are synchronous and run to completion; the only suspended
/// work is the streaming exchange owned by the registry. Every mutation, and
/// every streaming write, bumps the revision atom — the change notification
/// the rendering layer subscribes to. Mutations are the only sanctioned way
/// to alter tree state; writing to the store directly from outside breaks
/// the weight and selection invariants.
#[derive(Clone)]
pub struct ConversationTree {
    store: Arc<dyn NodeStore>,
    registry: TaskRegistry,
    root_id: String,
    model: String,
    revision: Atom<u64>,
}

impl ConversationTree {
    /// Open a tree over `store`, seeding the root record if it was never
    /// written.
    pub fn new(
        store: Arc<dyn NodeStore>,
        registry: TaskRegistry,
        root_id: impl Into<String>,
        model: impl Into<String>,
    ) -> TreeResult<Self> {
        let root_id = root_id.into();
        if !store.contains(&root_id)? {
            store.set(&root_id, NodeRecord::default())?;
        }
        Ok(Self {
            store,
            registry,
            root_id,
            model: model.into(),
            revision: Atom::new(0),
        })
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Read a node record; a never-written id reads as the default record.
    pub fn node(&self, id: &str) -> TreeResult<NodeRecord> {
        Ok(self.store.get(id)?)
    }

    /// Current revision counter; bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Observe mutations. The callback receives the new revision.
    pub fn subscribe(&self, callback: impl Fn(&u64) + Send + Sync + 'static) -> Subscription<u64> {
        self.revision.subscribe(callback)
    }

    /// The selected thread: records along `select` from the root down.
    pub fn selected_path(&self) -> TreeResult<Vec<(String, NodeRecord)>> {
        let mut path = Vec::new();
        let mut cursor = Some(self.root_id.clone());
        while let Some(id) = cursor {
            let record = self.store.get(&id)?;
            cursor = record.select.clone();
            path.push((id, record));
        }
        Ok(path)
    }

    /// Create a new branch under `parent_id` and select it.
    /// Returns the id of the new node.
    pub fn new_branch(&self, parent_id: &str, options: BranchOptions) -> TreeResult<String> {
        let mut parent = self.require(parent_id)?;

        let role = match options.role {
            Some(role) => role,
            None => match &parent.select {
                Some(selected) => self.store.get(selected)?.role.opposite(),
                None => parent.role.opposite(),
            },
        };

        let id = Uuid::new_v4().to_string();
        let record = NodeRecord {
            role,
            content: options.content.clone(),
            ..Default::default()
        };
        self.store.set(&id, record)?;

        parent.children.insert(0, id.clone());
        parent.select = Some(id.clone());
        self.store.set(parent_id, parent)?;
        debug!(parent_id = %parent_id, node_id = %id, ?role, "Created branch");

        // Structure first, side effects last: the root path carries correct
        // weights before any generation task can fail out of this call.
        self.propagate_weights(parent_id)?;
        self.touch();

        if options.add_answer && role == Role::User && options.content.is_some() {
            self.new_branch(
                &id,
                BranchOptions {
                    role: Some(Role::Assistant),
                    fill_content: true,
                    ..Default::default()
                },
            )?;
        } else if options.fill_content && role == Role::Assistant && options.content.is_none() {
            self.start_generation(&id)?;
        }

        Ok(id)
    }

    /// Overwrite the content of the currently selected child of `node_id`.
    /// Touches nothing else: no children, no selection, no task.
    pub fn edit_select(&self, node_id: &str, content: impl Into<String>) -> TreeResult<()> {
        let parent = self.require(node_id)?;
        let selected = parent
            .select
            .ok_or_else(|| TreeError::NoSelection(node_id.to_string()))?;

        let mut child = self.store.get(&selected)?;
        child.content = Some(content.into());
        self.store.set(&selected, child)?;

        self.touch();
        Ok(())
    }

    /// Re-point the selection of `parent_id` to `child_id`.
    pub fn select(&self, parent_id: &str, child_id: &str) -> TreeResult<()> {
        let mut parent = self.require(parent_id)?;
        if !parent.children.iter().any(|c| c == child_id) {
            return Err(TreeError::NotAChild {
                parent: parent_id.to_string(),
                child: child_id.to_string(),
            });
        }

        parent.select = Some(child_id.to_string());
        self.store.set(parent_id, parent)?;

        self.touch();
        Ok(())
    }

    /// Delete `child_id` from under `parent_id`, together with its entire
    /// descendant subtree and any in-flight tasks in that subtree.
    ///
    /// If the deleted child was selected, the selection moves to the sibling
    /// now occupying the same position, else the first sibling, else none.
    pub fn delete(&self, parent_id: &str, child_id: &str) -> TreeResult<()> {
        let mut parent = self.require(parent_id)?;
        let position = parent
            .children
            .iter()
            .position(|c| c == child_id)
            .ok_or_else(|| TreeError::NotAChild {
                parent: parent_id.to_string(),
                child: child_id.to_string(),
            })?;

        parent.children.remove(position);
        if parent.select.as_deref() == Some(child_id) {
            parent.select = parent
                .children
                .get(position)
                .or_else(|| parent.children.first())
                .cloned();
        }
        self.store.set(parent_id, parent)?;

        // Iterative cascade; each node's task is aborted before its record
        // is removed, so an aborted task's settle lands on a missing record
        // and is dropped by the streaming callbacks.
        let mut worklist = vec![child_id.to_string()];
        while let Some(id) = worklist.pop() {
            self.registry.abort(&id);
            let record = self.store.get(&id)?;
            worklist.extend(record.children);
            self.store.delete(&id)?;
        }
        debug!(parent_id = %parent_id, node_id = %child_id, "Deleted subtree");

        self.propagate_weights(parent_id)?;
        self.touch();
        Ok(())
    }

    /// Start a generation task for `node_id` over its ancestor message path.
    ///
    /// Exposed for manually re-triggering a node whose previous task failed.
    pub fn start_generation(&self, node_id: &str) -> TreeResult<()> {
        let path = self
            .root_path(node_id)?
            .ok_or_else(|| TreeError::NodeNotFound(node_id.to_string()))?;

        let mut messages = Vec::new();
        for id in &path[..path.len() - 1] {
            let record = self.store.get(id)?;
            if let Some(content) = record.content
                && !content.is_empty()
            {
                messages.push(ChatMessage {
                    role: record.role.into(),
                    content,
                });
            }
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
        };

        let store = Arc::clone(&self.store);
        let revision = self.revision.clone();
        let id = node_id.to_string();
        let on_text = Box::new(move |text: String| {
            // set_if_present drops a write into a record deleted mid-flight.
            let written = store.get(&id).and_then(|mut record| {
                record.content = Some(text);
                store.set_if_present(&id, record)
            });
            if let Err(err) = written {
                error!(node_id = %id, error = %err, "Failed to persist streamed text");
            }
            revision.set(|r| r + 1);
        });

        let store = Arc::clone(&self.store);
        let revision = self.revision.clone();
        let id = node_id.to_string();
        let model = self.model.clone();
        let on_done = Box::new(move |text: String| {
            if !text.is_empty() {
                let settled = store.get(&id).and_then(|mut record| {
                    record.content = Some(text);
                    record.meta.get_or_insert_with(NodeMeta::default).model = Some(model);
                    store.set_if_present(&id, record)
                });
                if let Err(err) = settled {
                    error!(node_id = %id, error = %err, "Failed to persist settled text");
                }
            }
            revision.set(|r| r + 1);
        });

        let store = Arc::clone(&self.store);
        let revision = self.revision.clone();
        let id = node_id.to_string();
        let on_error = Box::new(move |detail: String| {
            let recorded = store.get(&id).and_then(|mut record| {
                record.meta.get_or_insert_with(NodeMeta::default).error = Some(detail);
                store.set_if_present(&id, record)
            });
            if let Err(err) = recorded {
                error!(node_id = %id, error = %err, "Failed to record generation error");
            }
            revision.set(|r| r + 1);
        });

        self.registry.new_task(
            node_id,
            request,
            TaskCallbacks {
                on_text,
                on_done,
                on_error,
            },
        )?;
        Ok(())
    }

    /// Read a record that must already exist; mutating a missing node is a
    /// contract violation, not an empty-record default.
    fn require(&self, id: &str) -> TreeResult<NodeRecord> {
        if !self.store.contains(id)? {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }
        Ok(self.store.get(id)?)
    }

    /// Ids from the root down to `target`, inclusive. Iterative, so deep
    /// trees never exhaust the call stack.
    fn root_path(&self, target: &str) -> TreeResult<Option<Vec<String>>> {
        let mut stack = vec![vec![self.root_id.clone()]];
        while let Some(path) = stack.pop() {
            let last = path.last().expect("paths are never empty");
            if last == target {
                return Ok(Some(path));
            }
            for child in self.store.get(last)?.children {
                let mut next = path.clone();
                next.push(child);
                stack.push(next);
            }
        }
        Ok(None)
    }

    /// Recompute the cached weight of every node on the root path of `from`,
    /// bottom-up. Each recompute reads only the direct children's cached
    /// weights; descendants off the path are already correct.
    fn propagate_weights(&self, from: &str) -> TreeResult<()> {
        let Some(path) = self.root_path(from)? else {
            return Err(TreeError::NodeNotFound(from.to_string()));
        };
        for id in path.iter().rev() {
            let mut record = self.store.get(id)?;
            let mut weight = 0;
            for child in &record.children {
                weight += 1 + self.store.get(child)?.weight;
            }
            record.weight = weight;
            self.store.set(id, record)?;
        }
        Ok(())
    }

    fn touch(&self) {
        self.revision.set(|r| r + 1);
    }
}
