//! Human-in-the-loop suspend point
//!
//! Suspending persists the full record and marks it halted; nothing stays
//! scheduled for the thread. Resuming validates the decision and folds it
//! into the state before the runner continues at the supervisor.

use crate::error::{EngineError, StoreError};
use crate::graph::RESUME_ENTRY;
use crate::state::{GraphState, HumanDecision, ThreadRecord, ThreadStatus, RESOLVED_ERROR_KEY};
use crate::store::Checkpointer;

pub struct HaltController {
    checkpointer: Checkpointer,
}

impl HaltController {
    pub fn new(checkpointer: Checkpointer) -> Self {
        Self { checkpointer }
    }

    /// Mark the record halted and persist it
    ///
    /// The caller may only publish the halted record once this returns Ok.
    pub async fn suspend(&self, record: &mut ThreadRecord) -> Result<(), StoreError> {
        record.status = ThreadStatus::Halted;
        record.next = Some(RESUME_ENTRY);
        record.touch();
        self.checkpointer.save(record).await
    }

    /// Last-chance halt after the store refused a checkpoint
    ///
    /// Records the failure in `state.error` and tries one more save. If that
    /// fails too the record becomes `error`: it is terminal for this process
    /// and the stored copy is whatever was last persisted.
    pub async fn suspend_after_failure(&self, record: &mut ThreadRecord, failure: &StoreError) {
        record.state.error = Some(format!("Checkpoint failed: {}", failure));
        record.status = ThreadStatus::Halted;
        record.next = Some(RESUME_ENTRY);
        record.touch();

        if let Err(e) = self.checkpointer.save_once(record).await {
            tracing::error!(
                thread_id = %record.thread_id,
                error = %e,
                "Could not persist halted thread, marking as error"
            );
            record.status = ThreadStatus::Error;
            record.next = None;
        }
    }

    /// State a resumed runner starts from
    ///
    /// Fails with `InvalidState` unless the thread is halted, and with
    /// `InvalidInput` when approving would finalize an empty draft. An edited
    /// draft that differs from the current one is appended to the history
    /// before the decision is evaluated.
    pub fn prepare_resume(
        record: &ThreadRecord,
        decision: HumanDecision,
    ) -> Result<GraphState, EngineError> {
        if record.status != ThreadStatus::Halted {
            return Err(EngineError::InvalidState {
                thread_id: record.thread_id.clone(),
                status: record.status,
            });
        }

        let edited = decision
            .edited_draft
            .as_deref()
            .filter(|d| !d.trim().is_empty());

        if decision.approved && record.state.draft.trim().is_empty() && edited.is_none() {
            return Err(EngineError::InvalidInput(
                "cannot approve an empty draft without an edited draft".to_string(),
            ));
        }

        let mut state = record.state.clone();

        if let Some(error) = state.error.take() {
            state.set_metadata(RESOLVED_ERROR_KEY, error);
        }

        if let Some(edited) = edited {
            if edited != state.draft {
                state.draft = edited.to_string();
                state.draft_history.push(edited.to_string());
                state.set_metadata("human_edited", true);
            }
        }

        if !decision.feedback.trim().is_empty() {
            state.set_metadata("human_feedback", decision.feedback.clone());
        }

        state.human_decision = Some(decision);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CheckpointStore, MemoryCheckpointStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    fn halted(draft: &str) -> ThreadRecord {
        let mut record = ThreadRecord::new("t-1", "intent");
        record.status = ThreadStatus::Halted;
        if !draft.is_empty() {
            record.state.draft = draft.to_string();
            record.state.draft_history.push(draft.to_string());
        }
        record
    }

    #[test]
    fn test_only_halted_threads_resume() {
        for status in [
            ThreadStatus::Running,
            ThreadStatus::Resuming,
            ThreadStatus::Completed,
            ThreadStatus::Rejected,
            ThreadStatus::Error,
        ] {
            let mut record = halted("## Draft");
            record.status = status;
            let err = HaltController::prepare_resume(&record, HumanDecision::approve()).unwrap_err();
            assert!(matches!(err, EngineError::InvalidState { .. }));
        }
    }

    #[test]
    fn test_edited_draft_is_appended() {
        let record = halted("## Draft");
        let state = HaltController::prepare_resume(
            &record,
            HumanDecision::reject().with_edited_draft("## Edited"),
        )
        .unwrap();

        assert_eq!(state.draft, "## Edited");
        assert_eq!(state.draft_history, vec!["## Draft", "## Edited"]);
        assert_eq!(state.human_decision.as_ref().map(|d| d.approved), Some(false));
    }

    #[test]
    fn test_identical_edit_is_not_a_revision() {
        let record = halted("## Draft");
        let state = HaltController::prepare_resume(
            &record,
            HumanDecision::approve().with_edited_draft("## Draft"),
        )
        .unwrap();

        assert_eq!(state.draft_history.len(), 1);
        assert!(!state.metadata.contains_key("human_edited"));
    }

    #[test]
    fn test_error_is_resolved_into_metadata() {
        let mut record = halted("## Draft");
        record.state.error = Some("Review failed: timeout".to_string());

        let state = HaltController::prepare_resume(&record, HumanDecision::approve()).unwrap();

        assert_eq!(state.error, None);
        assert_eq!(
            state.metadata[RESOLVED_ERROR_KEY],
            serde_json::json!("Review failed: timeout")
        );
    }

    #[test]
    fn test_approving_empty_draft_needs_an_edit() {
        let record = halted("");

        let err = HaltController::prepare_resume(&record, HumanDecision::approve()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        assert!(HaltController::prepare_resume(&record, HumanDecision::reject()).is_ok());

        let state = HaltController::prepare_resume(
            &record,
            HumanDecision::approve().with_edited_draft("## Written by hand"),
        )
        .unwrap();
        assert_eq!(state.draft_history, vec!["## Written by hand"]);
    }

    #[tokio::test]
    async fn test_suspend_persists_halted_record() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let halt = HaltController::new(Checkpointer::new(store.clone(), 0, Duration::ZERO));
        let mut record = ThreadRecord::new("t-1", "intent");
        record.status = ThreadStatus::Running;

        halt.suspend(&mut record).await.unwrap();

        let stored = store.load("t-1").await.unwrap().unwrap();
        assert_eq!(stored.status, ThreadStatus::Halted);
        assert_eq!(stored.next, Some(RESUME_ENTRY));
    }

    struct BrokenStore;

    #[async_trait]
    impl CheckpointStore for BrokenStore {
        async fn save(&self, _record: &ThreadRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only filesystem".to_string()))
        }

        async fn load(&self, _thread_id: &str) -> Result<Option<ThreadRecord>, StoreError> {
            Ok(None)
        }

        async fn list(&self) -> Result<Vec<ThreadRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_suspend_after_failure_degrades_to_error() {
        let halt = HaltController::new(Checkpointer::new(Arc::new(BrokenStore), 0, Duration::ZERO));
        let mut record = ThreadRecord::new("t-1", "intent");
        let failure = StoreError::Unavailable("read-only filesystem".to_string());

        halt.suspend_after_failure(&mut record, &failure).await;

        assert_eq!(record.status, ThreadStatus::Error);
        assert!(record.state.error.as_deref().unwrap().starts_with("Checkpoint failed"));
    }
}
