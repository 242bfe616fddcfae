//! Reviewer pool node

use std::sync::Arc;
use std::time::Instant;

use foundry_agent::prompts;
use foundry_agent::{AgentCapability, AgentFailure, ReviewVerdict, SafetyVerdict};

use super::record_timing;
use crate::state::{GraphState, Review, ScoreSummary};

/// Safety and clinical reviewers, run concurrently over the same draft
pub struct ReviewerPool {
    safety: Arc<dyn AgentCapability<SafetyVerdict>>,
    clinical: Arc<dyn AgentCapability<ReviewVerdict>>,
}

fn to_review<T>(agent: &dyn AgentCapability<T>, verdict: impl Into<ReviewVerdict>) -> Review {
    let verdict = verdict.into();
    Review {
        agent: agent.name().to_string(),
        score: verdict.score,
        notes: verdict.notes,
        reasoning: verdict.reasoning,
    }
}

impl ReviewerPool {
    pub fn new(
        safety: Arc<dyn AgentCapability<SafetyVerdict>>,
        clinical: Arc<dyn AgentCapability<ReviewVerdict>>,
    ) -> Self {
        Self { safety, clinical }
    }

    /// Replace `reviews` and `scores`, or record an error if either reviewer failed
    ///
    /// Both reviewers get the same prompt, built from the draft alone.
    pub async fn run(&self, state: &mut GraphState) {
        let started = Instant::now();
        let prompt = prompts::review_request(&state.draft);

        let (safety, clinical) = tokio::join!(
            self.safety.generate(&prompt),
            self.clinical.generate(&prompt)
        );

        match (safety, clinical) {
            (Ok(safety), Ok(clinical)) => {
                state.scores = ScoreSummary {
                    safety: safety.0.score,
                    clinical: clinical.score,
                };
                state.reviews = vec![
                    to_review(self.safety.as_ref(), safety),
                    to_review(self.clinical.as_ref(), clinical),
                ];
                tracing::info!(
                    safety = state.scores.safety,
                    clinical = state.scores.clinical,
                    "Reviews completed"
                );
            }
            (safety, clinical) => {
                let failures: Vec<AgentFailure> =
                    [safety.err(), clinical.err()].into_iter().flatten().collect();
                let message = failures
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                tracing::warn!(error = %message, "Review failed");
                state.error = Some(format!("Review failed: {}", message));
            }
        }

        record_timing(state, "review_ms", started, Some("last_reviewed"));
    }
}
