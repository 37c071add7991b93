//! # Mock Completion Client for Testing
//!
//! `MockCompletion` implements [`Complete`] without network access. The reply
//! comes from the first rule whose needle appears in the prompt, else from the
//! default response (an empty string unless set).
//!
//! Every request is recorded so tests can inspect the prompts sent.

use std::sync::{Arc, Mutex, PoisonError};

use super::{AnalysisRequest, Complete, LlmError};

type Reply = Result<String, LlmError>;

#[derive(Debug, Clone, Default)]
pub struct MockCompletion {
    rules: Arc<Mutex<Vec<(String, Reply)>>>,
    default: Arc<Mutex<Option<Reply>>>,
    requests: Arc<Mutex<Vec<AnalysisRequest>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `text` whenever the prompt contains `needle`
    pub fn when_prompt_contains(self, needle: &str, text: &str) -> Self {
        self.rule(needle, Ok(text.to_string()))
    }

    /// Fail with `error` whenever the prompt contains `needle`
    pub fn fail_when_prompt_contains(self, needle: &str, error: LlmError) -> Self {
        self.rule(needle, Err(error))
    }

    fn rule(self, needle: &str, reply: Reply) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((needle.to_string(), reply));
        self
    }

    pub fn with_default(self, text: &str) -> Self {
        *self.default.lock().unwrap_or_else(PoisonError::into_inner) = Some(Ok(text.to_string()));
        self
    }

    /// Fail every call not matched by a rule
    pub fn with_error(self, error: LlmError) -> Self {
        *self.default.lock().unwrap_or_else(PoisonError::into_inner) = Some(Err(error));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }

    fn reply_for(&self, prompt: &str) -> Reply {
        let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, reply)) = rules.iter().find(|(needle, _)| prompt.contains(needle)) {
            return reply.clone();
        }
        drop(rules);

        self.default
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

impl Complete for MockCompletion {
    async fn complete(&self, request: AnalysisRequest) -> Result<String, LlmError> {
        let reply = self.reply_for(&request.prompt);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        reply
    }
}
