//! Language model boundary.
//!
//! The engine and the task analyzer depend on a single text-in/text-out
//! capability. Provider adapters live outside this crate; the two
//! implementations here are a deterministic script (tests, dry runs) and an
//! operator console (the `taskmesh` binary).

mod console;
mod error;

pub use console::ConsoleModel;
pub use error::{LlmError, LlmErrorKind};

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

/// Trait for language models.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt.
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Invoke a model under a wall-clock deadline.
///
/// An elapsed deadline becomes `LlmErrorKind::Timeout`; the pending call is dropped.
pub async fn invoke_with_timeout(
    model: &dyn LanguageModel,
    prompt: &str,
    timeout: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(timeout, model.invoke(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::timeout(timeout)),
    }
}

/// A model that replays a fixed queue of replies.
///
/// Once the queue is drained, every call returns the fallback reply if one was
/// configured, otherwise `LlmErrorKind::EmptyResponse`.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Create a script from successful replies.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with the same text forever.
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self::new(Vec::<String>::new()).with_fallback(reply)
    }

    /// Set the reply used once the queue is empty.
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Queue an error reply.
    pub fn push_error(&self, error: LlmError) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(reply.into()));
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(reply) => reply,
            None => self.fallback.clone().ok_or_else(LlmError::empty_response),
        }
    }
}
