//! Decision handlers for unattended or scripted runs
//!
//! [`crate::WorkflowEngine::drive_to_end`] asks a handler what to do each
//! time a thread halts. Returning None leaves the thread halted.

use async_trait::async_trait;

use crate::state::{HumanDecision, ThreadRecord};

/// Strategy for answering a halted thread
#[async_trait]
pub trait DecisionHandler: Send + Sync {
    async fn decide(&self, record: &ThreadRecord) -> Option<HumanDecision>;
}

/// Approves clean drafts; leaves errored or empty ones for a person
pub struct AutoApproveHandler;

#[async_trait]
impl DecisionHandler for AutoApproveHandler {
    async fn decide(&self, record: &ThreadRecord) -> Option<HumanDecision> {
        if record.state.has_error() || record.state.draft.trim().is_empty() {
            tracing::warn!(
                thread_id = %record.thread_id,
                "Not auto-approving a thread with an error or an empty draft"
            );
            return None;
        }

        tracing::info!(thread_id = %record.thread_id, "Auto-approved (non-interactive mode)");
        Some(HumanDecision::approve().with_feedback("Auto-approved (non-interactive mode)"))
    }
}

/// Always rejects
pub struct RejectHandler;

#[async_trait]
impl DecisionHandler for RejectHandler {
    async fn decide(&self, record: &ThreadRecord) -> Option<HumanDecision> {
        tracing::info!(thread_id = %record.thread_id, "Auto-rejected");
        Some(HumanDecision::reject())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ThreadStatus;

    fn halted(draft: &str) -> ThreadRecord {
        let mut record = ThreadRecord::new("t-1", "intent");
        record.status = ThreadStatus::Halted;
        record.state.draft = draft.to_string();
        record
    }

    #[tokio::test]
    async fn test_auto_approve() {
        let decision = AutoApproveHandler.decide(&halted("## Draft")).await.unwrap();
        assert!(decision.approved);
    }

    #[tokio::test]
    async fn test_auto_approve_declines_errors_and_empty_drafts() {
        assert!(AutoApproveHandler.decide(&halted("")).await.is_none());

        let mut record = halted("## Draft");
        record.state.error = Some("Review failed".to_string());
        assert!(AutoApproveHandler.decide(&record).await.is_none());
    }

    #[tokio::test]
    async fn test_reject() {
        let decision = RejectHandler.decide(&halted("## Draft")).await.unwrap();
        assert!(!decision.approved);
    }
}
