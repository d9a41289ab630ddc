//! Scripted client for tests: replays canned fragment streams and records
//! every request it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use super::{ChatRequest, FragmentStream, LlmClient, LlmError, ModelInfo};

type Reply = Result<Vec<Result<String, LlmError>>, LlmError>;

pub(crate) struct ScriptedLlm {
    models: Vec<ModelInfo>,
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(String, ChatRequest)>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            models: vec![ModelInfo::new("test-model")],
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(mut self, names: &[&str]) -> Self {
        self.models = names.iter().map(|n| ModelInfo::new(*n)).collect();
        self
    }

    /// Queue a reply streamed as the given fragments.
    pub fn reply(self, fragments: &[&str]) -> Self {
        let fragments = fragments.iter().map(|f| Ok(f.to_string())).collect();
        self.replies.lock().unwrap().push_back(Ok(fragments));
        self
    }

    /// Queue a reply whose stream breaks after the given fragments.
    pub fn broken_reply(self, fragments: &[&str], error: LlmError) -> Self {
        let mut items: Vec<_> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        items.push(Err(error));
        self.replies.lock().unwrap().push_back(Ok(items));
        self
    }

    /// Queue a call that fails before any fragment is produced.
    pub fn failure(self, error: LlmError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// `(model, request)` pairs in the order they were received.
    pub fn requests(&self) -> Vec<(String, ChatRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|(_, r)| r.prompt).collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(self.models.clone())
    }

    async fn chat_stream(
        &self,
        model: &str,
        request: ChatRequest,
    ) -> Result<FragmentStream, LlmError> {
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), request));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::server_error(500, "script exhausted".to_string())));

        Ok(futures::stream::iter(reply?).boxed())
    }
}
