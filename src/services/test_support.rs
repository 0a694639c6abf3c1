//! Scripted completion clients for exercising the registry and tree
//! without a network.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use super::completion::{CompletionClient, CompletionRequest, ResponseStream, StreamChunk};

/// Replays a fixed chunk script for every request and records the requests
/// it has seen.
pub struct ScriptedClient {
    chunks: Vec<StreamChunk>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedClient {
    pub fn new(chunks: Vec<StreamChunk>) -> Self {
        Self {
            chunks,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: a script that streams `text` one chunk at a time.
    pub fn streaming_text(text: &str) -> Self {
        let mut chunks: Vec<StreamChunk> = text
            .split_inclusive(' ')
            .map(|piece| StreamChunk::Text(piece.to_string()))
            .collect();
        chunks.push(StreamChunk::Done);
        Self::new(chunks)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

impl CompletionClient for ScriptedClient {
    fn stream_completion(&self, request: CompletionRequest) -> Result<ResponseStream> {
        self.requests.lock().push(request);
        let chunks = self.chunks.clone();
        Ok(Box::pin(async_stream::stream! {
            for chunk in chunks {
                yield Ok(chunk);
            }
        }))
    }
}

/// Never yields anything: an exchange that hangs until cancelled.
pub struct PendingClient;

impl CompletionClient for PendingClient {
    fn stream_completion(&self, _request: CompletionRequest) -> Result<ResponseStream> {
        Ok(Box::pin(futures::stream::pending()))
    }
}
