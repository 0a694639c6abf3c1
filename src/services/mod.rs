pub mod completion;

#[cfg(test)]
pub mod test_support;

pub use completion::{
    ChatMessage, CompletionClient, CompletionRequest, HttpCompletionClient, MessageRole,
    ResponseStream, StreamChunk,
};
