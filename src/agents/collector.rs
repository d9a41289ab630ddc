//! Streaming response collector.
//!
//! Folds a fragment stream into two buffers: the answer and the model's
//! reasoning. A fragment exactly equal to [`THINK_START`] switches into the
//! thinking state and [`THINK_END`] switches back. Sentinels are recognised
//! only as whole fragments; a sentinel embedded in a longer fragment is
//! ordinary text. Sentinel fragments themselves are never kept, whatever the
//! current state.

use futures::{Stream, StreamExt};

use crate::llm::{LlmError, THINK_END, THINK_START};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectorState {
    #[default]
    Normal,
    Thinking,
}

/// Accumulated text of one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedResponse {
    pub answer: String,
    pub thinking: String,
}

#[derive(Debug, Default)]
pub struct ResponseCollector {
    state: CollectorState,
    response: CollectedResponse,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Feed one fragment.
    pub fn push(&mut self, fragment: &str) {
        if fragment == THINK_START {
            self.state = CollectorState::Thinking;
            return;
        }
        if fragment == THINK_END {
            self.state = CollectorState::Normal;
            return;
        }

        match self.state {
            CollectorState::Normal => self.response.answer.push_str(fragment),
            CollectorState::Thinking => self.response.thinking.push_str(fragment),
        }
    }

    /// Finish collecting. An unterminated thinking span is accepted as-is.
    pub fn finish(self) -> CollectedResponse {
        if self.state == CollectorState::Thinking {
            tracing::debug!(
                thinking_len = self.response.thinking.len(),
                "response ended inside a thinking span"
            );
        }
        self.response
    }
}

/// Drain a fragment stream into a [`CollectedResponse`].
///
/// A stream error aborts collection; partial text is discarded.
pub async fn collect<S>(stream: S) -> Result<CollectedResponse, LlmError>
where
    S: Stream<Item = Result<String, LlmError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut collector = ResponseCollector::new();

    while let Some(fragment) = stream.next().await {
        collector.push(&fragment?);
    }

    Ok(collector.finish())
}
