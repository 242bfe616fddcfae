//! Agent capabilities: structured generation over an unreliable backend
//!
//! An [`AgentCapability`] either returns a validated value or an
//! [`AgentFailure`]. Malformed model output never leaves this module as an
//! untyped value.

mod output;
pub mod repair;

pub use output::{
    Draft, ReviewResponse, ReviewVerdict, SafetyVerdict, StructuredOutput, Synthesis,
};

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AgentsSection;
use crate::llm::Llm;
use crate::roles::RoleProfile;

/// The task-specific part of a request; the role's persona lives in the capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub task: String,
}

impl PromptSpec {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }
}

/// Why an agent call produced nothing usable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend error: {0}")]
    Backend(String),
}

/// An agent call that exhausted its retry budget
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{agent} failed after {attempts} attempt(s): {kind}")]
pub struct AgentFailure {
    pub agent: String,
    pub attempts: u32,
    pub kind: FailureKind,
}

/// Retry and timeout budget for one agent call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(120),
        }
    }
}

impl From<&AgentsSection> for CallPolicy {
    fn from(section: &AgentsSection) -> Self {
        Self {
            max_attempts: section.max_attempts,
            timeout: section.timeout(),
        }
    }
}

/// Structured generation
#[async_trait]
pub trait AgentCapability<T>: Send + Sync {
    /// Identifier recorded in reviews and logs
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &PromptSpec) -> Result<T, AgentFailure>;
}

/// [`AgentCapability`] backed by an [`Llm`]
///
/// Every attempt is bounded by the policy timeout. Timeouts, backend errors
/// and rejected replies all consume one attempt.
pub struct LlmAgent<T> {
    name: String,
    system_prompt: String,
    llm: Arc<dyn Llm>,
    policy: CallPolicy,
    _output: PhantomData<fn() -> T>,
}

impl<T: StructuredOutput> LlmAgent<T> {
    pub fn new(profile: &RoleProfile, llm: Arc<dyn Llm>, policy: CallPolicy) -> Self {
        Self {
            name: profile.agent_id.clone(),
            system_prompt: format!("{}\n\n{}", profile.system_prompt, T::format_instructions()),
            llm,
            policy,
            _output: PhantomData,
        }
    }

    async fn attempt(&self, prompt: &PromptSpec) -> Result<T, FailureKind> {
        let reply = tokio::time::timeout(
            self.policy.timeout,
            self.llm.complete(&self.system_prompt, &prompt.task),
        )
        .await
        .map_err(|_| FailureKind::Timeout(self.policy.timeout))?
        .map_err(|e| FailureKind::Backend(format!("{:#}", e)))?;

        T::parse(&reply).map_err(FailureKind::ParseFailure)
    }
}

#[async_trait]
impl<T: StructuredOutput> AgentCapability<T> for LlmAgent<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &PromptSpec) -> Result<T, AgentFailure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(prompt).await {
                Ok(value) => {
                    tracing::debug!(agent = %self.name, attempt, model = self.llm.model(), "Agent call succeeded");
                    return Ok(value);
                }
                Err(kind) if attempt >= max_attempts => {
                    return Err(AgentFailure {
                        agent: self.name.clone(),
                        attempts: attempt,
                        kind,
                    });
                }
                Err(kind) => {
                    tracing::warn!(agent = %self.name, attempt, error = %kind, "Agent call failed, retrying");
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{AgentRole, RoleRegistry};
    use crate::testing::ScriptedLlm;

    fn profile(role: AgentRole) -> RoleProfile {
        RoleRegistry::with_defaults("test-model").get(role).clone()
    }

    fn policy(max_attempts: u32) -> CallPolicy {
        CallPolicy {
            max_attempts,
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_retries_until_valid() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply("not json at all")
                .fail("connection reset")
                .reply(r#"{"score": 9, "revision_notes": "none", "reasoning": "safe"}"#),
        );
        let agent: LlmAgent<ReviewVerdict> =
            LlmAgent::new(&profile(AgentRole::SafetyReviewer), llm.clone(), policy(3));

        let verdict = agent.generate(&PromptSpec::new("draft")).await.unwrap();
        assert_eq!(verdict.score, 9);
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_reports_last_failure() {
        let llm = Arc::new(ScriptedLlm::new().repeat(r#"{"reasoning": "no score"}"#));
        let agent: LlmAgent<ReviewVerdict> =
            LlmAgent::new(&profile(AgentRole::ClinicalReviewer), llm.clone(), policy(2));

        let failure = agent.generate(&PromptSpec::new("draft")).await.unwrap_err();
        assert_eq!(failure.agent, "ClinicalCritic");
        assert_eq!(failure.attempts, 2);
        assert!(matches!(failure.kind, FailureKind::ParseFailure(_)));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let llm = Arc::new(ScriptedLlm::new().stall(Duration::from_secs(5), "## Late draft"));
        let agent: LlmAgent<Draft> =
            LlmAgent::new(&profile(AgentRole::Drafter), llm, policy(1));

        let failure = agent.generate(&PromptSpec::new("intent")).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_system_prompt_carries_persona_and_format() {
        let llm = Arc::new(ScriptedLlm::new().repeat("• Keep going"));
        let agent: LlmAgent<Synthesis> =
            LlmAgent::new(&profile(AgentRole::Supervisor), llm.clone(), policy(1));

        agent.generate(&PromptSpec::new("reviews")).await.unwrap();

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].system.contains("Supervisor"));
        assert!(calls[0].system.contains("bullet points"));
        assert_eq!(calls[0].user, "reviews");
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let llm = Arc::new(ScriptedLlm::new().reply("## Draft"));
        let agent: LlmAgent<Draft> =
            LlmAgent::new(&profile(AgentRole::Drafter), llm.clone(), policy(0));

        assert!(agent.generate(&PromptSpec::new("intent")).await.is_ok());
        assert_eq!(llm.call_count(), 1);
    }
}
