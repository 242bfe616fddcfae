//! Drafter node

use std::sync::Arc;
use std::time::Instant;

use foundry_agent::prompts;
use foundry_agent::{AgentCapability, Draft};

use super::record_timing;
use crate::state::GraphState;

/// Produces the first draft, or a revision of the current one
pub struct Drafter {
    agent: Arc<dyn AgentCapability<Draft>>,
}

impl Drafter {
    pub fn new(agent: Arc<dyn AgentCapability<Draft>>) -> Self {
        Self { agent }
    }

    /// Append a new draft to the history
    ///
    /// Every successful pass increments `iteration_count`, the first draft
    /// included, so it equals the number of drafts this thread has produced.
    pub async fn run(&self, state: &mut GraphState) {
        let started = Instant::now();
        let revising = !state.draft.is_empty();

        let prompt = if revising {
            prompts::revision_request(&state.user_intent, &state.draft, &state.supervisor_feedback)
        } else {
            prompts::first_draft_request(&state.user_intent)
        };

        match self.agent.generate(&prompt).await {
            Ok(draft) => {
                state.draft_history.push(draft.content.clone());
                state.draft = draft.content;
                state.iteration_count += 1;
                tracing::info!(
                    agent = self.agent.name(),
                    iteration = state.iteration_count,
                    chars = state.draft.len(),
                    "Draft produced"
                );
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "Drafting failed");
                state.error = Some(format!("Drafting failed: {}", failure));
            }
        }

        record_timing(state, "drafting_ms", started, Some("last_drafted"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_agent::testing::ScriptedLlm;
    use foundry_agent::{AgentRole, CallPolicy, LlmAgent, RoleRegistry};
    use std::time::Duration;

    fn drafter(llm: Arc<ScriptedLlm>) -> Drafter {
        let registry = RoleRegistry::with_defaults("test");
        let policy = CallPolicy {
            max_attempts: 2,
            timeout: Duration::from_secs(1),
        };
        Drafter::new(Arc::new(LlmAgent::<Draft>::new(
            registry.get(AgentRole::Drafter),
            llm,
            policy,
        )))
    }

    #[tokio::test]
    async fn test_first_draft_counts_as_iteration() {
        let llm = Arc::new(ScriptedLlm::new().reply("## Draft one"));
        let mut state = GraphState::new("exam stress");

        drafter(llm.clone()).run(&mut state).await;

        assert_eq!(state.draft, "## Draft one");
        assert_eq!(state.draft_history, vec!["## Draft one"]);
        assert_eq!(state.iteration_count, 1);
        assert!(state.metadata.contains_key("drafting_ms"));
        assert!(state.metadata.contains_key("last_drafted"));
        assert!(llm.calls()[0].user.contains("exam stress"));
    }

    #[tokio::test]
    async fn test_revision_uses_feedback_and_counts() {
        let llm = Arc::new(ScriptedLlm::new().reply("## Draft two"));
        let mut state = GraphState::new("exam stress");
        state.draft = "## Draft one".to_string();
        state.draft_history.push(state.draft.clone());
        state.iteration_count = 1;
        state.supervisor_feedback = "• Add a disclaimer".to_string();

        drafter(llm.clone()).run(&mut state).await;

        assert_eq!(state.draft, "## Draft two");
        assert_eq!(state.draft_history.len(), 2);
        assert_eq!(state.iteration_count, 2);
        let prompt = &llm.calls()[0].user;
        assert!(prompt.contains("## Draft one"));
        assert!(prompt.contains("• Add a disclaimer"));
    }

    #[tokio::test]
    async fn test_failure_sets_error_and_keeps_history() {
        let llm = Arc::new(ScriptedLlm::new().repeat_failure("model offline"));
        let mut state = GraphState::new("exam stress");

        drafter(llm).run(&mut state).await;

        assert!(state.has_error());
        assert!(state.error.as_deref().unwrap().contains("model offline"));
        assert!(state.draft_history.is_empty());
        assert_eq!(state.iteration_count, 0);
    }
}
