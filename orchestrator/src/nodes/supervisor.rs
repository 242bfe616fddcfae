//! Supervisor synthesis node

use std::sync::Arc;
use std::time::Instant;

use foundry_agent::prompts::{self, ReviewerNotes};
use foundry_agent::{AgentCapability, Synthesis};

use super::record_timing;
use crate::state::GraphState;

/// Merges the reviews into one set of revision instructions
pub struct SupervisorSynthesizer {
    agent: Arc<dyn AgentCapability<Synthesis>>,
}

impl SupervisorSynthesizer {
    pub fn new(agent: Arc<dyn AgentCapability<Synthesis>>) -> Self {
        Self { agent }
    }

    /// Replace `supervisor_feedback`
    ///
    /// Passes straight through when a human decision is attached: a resumed
    /// thread is adjudicated by the router, not re-synthesized from stale
    /// reviews. A successful synthesis completes the cycle and clears `error`.
    pub async fn run(&self, state: &mut GraphState) {
        if state.human_decision.is_some() {
            tracing::debug!("Human decision attached, skipping synthesis");
            return;
        }

        let started = Instant::now();
        let reviews: Vec<ReviewerNotes<'_>> = state
            .reviews
            .iter()
            .map(|r| ReviewerNotes {
                agent: &r.agent,
                score: r.score,
                notes: &r.notes,
                reasoning: &r.reasoning,
            })
            .collect();
        let prompt =
            prompts::synthesis_request(&state.user_intent, state.iteration_count, &reviews);

        match self.agent.generate(&prompt).await {
            Ok(synthesis) => {
                state.supervisor_feedback = synthesis.feedback;
                state.error = None;
                tracing::info!(chars = state.supervisor_feedback.len(), "Feedback synthesized");
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "Synthesis failed");
                state.error = Some(format!("Synthesis failed: {}", failure));
            }
        }

        record_timing(state, "synthesis_ms", started, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{HumanDecision, Review};
    use foundry_agent::testing::ScriptedLlm;
    use foundry_agent::{AgentRole, CallPolicy, LlmAgent, RoleRegistry};
    use std::time::Duration;

    fn synthesizer(llm: Arc<ScriptedLlm>) -> SupervisorSynthesizer {
        let registry = RoleRegistry::with_defaults("test");
        let policy = CallPolicy {
            max_attempts: 1,
            timeout: Duration::from_secs(1),
        };
        SupervisorSynthesizer::new(Arc::new(LlmAgent::<Synthesis>::new(
            registry.get(AgentRole::Supervisor),
            llm,
            policy,
        )))
    }

    fn reviewed_state() -> GraphState {
        let mut state = GraphState::new("procrastination");
        state.draft = "## Draft".to_string();
        state.draft_history.push(state.draft.clone());
        state.reviews = vec![
            Review {
                agent: "SafetyGuardian".to_string(),
                score: 7,
                notes: "Add a disclaimer".to_string(),
                reasoning: "Missing".to_string(),
            },
            Review {
                agent: "ClinicalCritic".to_string(),
                score: 6,
                notes: "Make step 2 concrete".to_string(),
                reasoning: "Vague".to_string(),
            },
        ];
        state
    }

    #[tokio::test]
    async fn test_synthesis_replaces_feedback() {
        let llm = Arc::new(ScriptedLlm::new().reply("• Add a disclaimer\n• Make step 2 concrete"));
        let mut state = reviewed_state();
        state.supervisor_feedback = "old".to_string();

        synthesizer(llm.clone()).run(&mut state).await;

        assert_eq!(state.supervisor_feedback, "• Add a disclaimer\n• Make step 2 concrete");
        assert!(state.metadata.contains_key("synthesis_ms"));
        let prompt = &llm.calls()[0].user;
        assert!(prompt.contains("Add a disclaimer"));
        assert!(prompt.contains("Make step 2 concrete"));
    }

    #[tokio::test]
    async fn test_human_decision_passes_through() {
        let llm = Arc::new(ScriptedLlm::new().repeat("• unused"));
        let mut state = reviewed_state();
        state.supervisor_feedback = "kept".to_string();
        state.human_decision = Some(HumanDecision::approve());
        let before = state.clone();

        synthesizer(llm.clone()).run(&mut state).await;

        assert_eq!(state, before);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_synthesis_sets_error() {
        let llm = Arc::new(ScriptedLlm::new().repeat("   "));
        let mut state = reviewed_state();

        synthesizer(llm).run(&mut state).await;

        assert!(state.error.as_deref().unwrap().starts_with("Synthesis failed"));
    }
}
