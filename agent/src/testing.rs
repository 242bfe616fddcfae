//! Scripted LLM backend for deterministic tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::llm::Llm;

#[derive(Debug, Clone)]
enum Step {
    Reply(String),
    Fail(String),
    Stall(Duration, String),
}

/// A prompt the backend received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
}

/// Backend that plays back queued steps in order
///
/// Once the queue is empty the `repeat` step (if any) answers every call;
/// without one the call fails.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    steps: Mutex<VecDeque<Step>>,
    repeat: Option<Step>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Step::Reply(text.into()))
    }

    /// Queue a backend error
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Step::Fail(message.into()))
    }

    /// Queue a reply that arrives after `after`
    pub fn stall(self, after: Duration, text: impl Into<String>) -> Self {
        self.push(Step::Stall(after, text.into()))
    }

    /// Reply used once the queue is exhausted
    pub fn repeat(mut self, text: impl Into<String>) -> Self {
        self.repeat = Some(Step::Reply(text.into()));
        self
    }

    /// Error used once the queue is exhausted
    pub fn repeat_failure(mut self, message: impl Into<String>) -> Self {
        self.repeat = Some(Step::Fail(message.into()));
        self
    }

    /// Sleep before every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, step: Step) -> Self {
        lock(&self.steps).push_back(step);
        self
    }

    /// Every prompt received so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        lock(&self.calls).push(RecordedCall {
            system: system.to_string(),
            user: user.to_string(),
        });

        let step = lock(&self.steps).pop_front().or_else(|| self.repeat.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Fail(message)) => Err(anyhow!(message)),
            Some(Step::Stall(after, text)) => {
                tokio::time::sleep(after).await;
                Ok(text)
            }
            None => Err(anyhow!("script exhausted")),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plays_steps_in_order_then_repeats() {
        let llm = ScriptedLlm::new().reply("one").fail("boom").repeat("again");

        assert_eq!(llm.complete("s", "u").await.unwrap(), "one");
        assert!(llm.complete("s", "u").await.is_err());
        assert_eq!(llm.complete("s", "u").await.unwrap(), "again");
        assert_eq!(llm.complete("s", "u").await.unwrap(), "again");
        assert_eq!(llm.call_count(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_without_repeat_fails() {
        let llm = ScriptedLlm::new();
        let err = llm.complete("s", "u").await.unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }

    #[tokio::test]
    async fn test_records_prompts() {
        let llm = ScriptedLlm::new().repeat("ok");
        llm.complete("system text", "user text").await.unwrap();

        assert_eq!(
            llm.calls(),
            vec![RecordedCall {
                system: "system text".to_string(),
                user: "user text".to_string(),
            }]
        );
    }
}
