use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::services::completion::{CompletionClient, CompletionRequest, StreamChunk};

use super::atom::{Atom, Subscription};

/// Caller hooks for one generation task. `on_text` receives the cumulative
/// text after every delta; exactly one of `on_done` / `on_error` fires.
pub struct TaskCallbacks {
    pub on_text: Box<dyn Fn(String) + Send + Sync>,
    pub on_done: Box<dyn FnOnce(String) + Send>,
    pub on_error: Box<dyn FnOnce(String) + Send>,
}

#[derive(Debug, Error)]
pub enum TaskError {
    /// Starting a second task for a node that already has one is a caller
    /// bug, not a runtime condition.
    #[error("a task is already active for node {0}")]
    AlreadyActive(String),

    /// The completion client refused the request before any network
    /// activity (missing credential).
    #[error("completion request rejected: {0}")]
    Rejected(anyhow::Error),
}

struct ActiveTask {
    result: Atom<String>,
    cancel: watch::Sender<bool>,
}

/// Registry of in-flight generation tasks, at most one per node id.
///
/// An explicit service object rather than process-global state: clone it
/// into whatever owns the tree. Clones share the same task table.
///
/// Cancellation is cooperative: [`TaskRegistry::abort`] returns
/// synchronously, but the task settles asynchronously afterwards — as if it
/// had completed with whatever text had accumulated. Removal from the
/// registry happens when the settle callback runs, exactly once per task,
/// through exactly one of the done / cancelled / errored paths.
#[derive(Clone)]
pub struct TaskRegistry {
    client: Arc<dyn CompletionClient>,
    tasks: Arc<Mutex<HashMap<String, ActiveTask>>>,
    active: Atom<Vec<String>>,
}

impl TaskRegistry {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            active: Atom::new(Vec::new()),
        }
    }

    /// Start a streaming generation task for `id`.
    ///
    /// The result atom is seeded empty and updated with the cumulative text
    /// on every delta. Rejected without side effects if a task for `id` is
    /// already registered or the client refuses the request.
    pub fn new_task(
        &self,
        id: &str,
        request: CompletionRequest,
        callbacks: TaskCallbacks,
    ) -> Result<(), TaskError> {
        if self.tasks.lock().contains_key(id) {
            return Err(TaskError::AlreadyActive(id.to_string()));
        }

        // The client call runs without the table lock held; a client that
        // consults the registry must not deadlock against it.
        let mut stream = self
            .client
            .stream_completion(request)
            .map_err(TaskError::Rejected)?;

        let (result, mut cancel_rx) = {
            let mut tasks = self.tasks.lock();
            // Re-check: a racing caller may have registered `id` while the
            // client call was in flight.
            if tasks.contains_key(id) {
                return Err(TaskError::AlreadyActive(id.to_string()));
            }

            let result = Atom::new(String::new());
            let (cancel_tx, cancel_rx) = watch::channel(false);
            tasks.insert(
                id.to_string(),
                ActiveTask {
                    result: result.clone(),
                    cancel: cancel_tx,
                },
            );
            (result, cancel_rx)
        };

        debug!(node_id = %id, "Generation task started");
        self.active.set(|mut ids| {
            ids.push(id.to_string());
            ids
        });

        let registry = self.clone();
        let task_id = id.to_string();
        let task_result = result;
        tokio::spawn(async move {
            let mut accumulated = String::new();
            let mut failure: Option<String> = None;

            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => {
                        debug!(node_id = %task_id, "Generation task cancelled");
                        break;
                    }
                    item = stream.next() => match item {
                        Some(Ok(StreamChunk::Text(delta))) => {
                            accumulated.push_str(&delta);
                            let cumulative = accumulated.clone();
                            task_result.set(|_| cumulative.clone());
                            (callbacks.on_text)(cumulative);
                        }
                        Some(Ok(StreamChunk::Done)) | None => break,
                        Some(Ok(StreamChunk::Error(detail))) => {
                            failure = Some(detail);
                            break;
                        }
                        Some(Err(error)) => {
                            failure = Some(error.to_string());
                            break;
                        }
                    }
                }
            }

            match failure {
                // Cancellation lands here too: done with partial text.
                None => {
                    task_result.set(|_| accumulated.clone());
                    (callbacks.on_done)(accumulated);
                }
                Some(detail) => {
                    warn!(node_id = %task_id, error = %detail, "Generation task failed");
                    (callbacks.on_error)(detail);
                }
            }

            registry.remove(&task_id);
        });

        Ok(())
    }

    /// Signal cancellation for the task owned by `id`, if any.
    /// Returns whether a task was signalled. The task settles and leaves
    /// the registry asynchronously.
    pub fn abort(&self, id: &str) -> bool {
        match self.tasks.lock().get(id) {
            Some(task) => {
                let _ = task.cancel.send(true);
                true
            }
            None => false,
        }
    }

    /// Ids of currently active tasks, in start order.
    pub fn active_ids(&self) -> Vec<String> {
        self.active.get()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.tasks.lock().contains_key(id)
    }

    /// The cumulative-text atom for an active task.
    pub fn result_of(&self, id: &str) -> Option<Atom<String>> {
        self.tasks.lock().get(id).map(|task| task.result.clone())
    }

    /// Observe changes to the active task list.
    pub fn subscribe(
        &self,
        callback: impl Fn(&Vec<String>) + Send + Sync + 'static,
    ) -> Subscription<Vec<String>> {
        self.active.subscribe(callback)
    }

    fn remove(&self, id: &str) {
        self.tasks.lock().remove(id);
        let id = id.to_string();
        self.active
            .set(|ids| ids.into_iter().filter(|active| *active != id).collect());
    }
}
