//! Workflow execution engine
//!
//! Runs threads through the draft, review, synthesize, route cycle with:
//! - One background runner per thread, guarded by a lease
//! - Checkpoints at creation, after every revision cycle, at halt and at the end
//! - Human-in-the-loop suspension and resumption
//! - Lock-free snapshots for readers

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use foundry_agent::config::FoundryFileConfig;
use foundry_agent::AgentSet;

use crate::decision::DecisionHandler;
use crate::error::EngineError;
use crate::graph::{self, Node, Transition, ENTRY, RESUME_ENTRY};
use crate::halt::HaltController;
use crate::nodes::{Drafter, ReviewerPool, SupervisorSynthesizer};
use crate::registry::{LeaseError, ThreadLease, ThreadRegistry};
use crate::router::RouterPolicy;
use crate::state::{HumanDecision, ThreadRecord, ThreadStatus, ThreadSummary};
use crate::store::{CheckpointStore, Checkpointer};

/// Error text left on threads that were mid-run when the process stopped
pub const INTERRUPTED_ERROR: &str = "interrupted by restart";

/// Configuration for the workflow engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Routing thresholds
    pub router: RouterPolicy,

    /// Extra attempts for a failed checkpoint
    pub checkpoint_retries: u32,

    /// Delay before the first checkpoint retry, doubled each time
    pub checkpoint_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            router: RouterPolicy::default(),
            checkpoint_retries: 3,
            checkpoint_backoff: Duration::from_millis(200),
        }
    }
}

impl EngineConfig {
    /// Create from the file config
    pub fn from_file_config(config: &FoundryFileConfig) -> Self {
        Self {
            router: RouterPolicy::from(&config.router),
            checkpoint_retries: config.engine.checkpoint_retries,
            checkpoint_backoff: Duration::from_millis(config.engine.checkpoint_backoff_ms),
        }
    }
}

struct EngineInner {
    drafter: Drafter,
    reviewers: ReviewerPool,
    supervisor: SupervisorSynthesizer,
    halt: HaltController,
    checkpointer: Checkpointer,
    registry: ThreadRegistry,
    policy: RouterPolicy,
}

/// Workflow execution engine
///
/// Cheap to clone; clones share threads, agents and the store.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

impl WorkflowEngine {
    pub fn new(agents: AgentSet, store: Arc<dyn CheckpointStore>, config: EngineConfig) -> Self {
        let checkpointer =
            Checkpointer::new(store, config.checkpoint_retries, config.checkpoint_backoff);

        Self {
            inner: Arc::new(EngineInner {
                drafter: Drafter::new(agents.drafter),
                reviewers: ReviewerPool::new(agents.safety, agents.clinical),
                supervisor: SupervisorSynthesizer::new(agents.supervisor),
                halt: HaltController::new(checkpointer.clone()),
                checkpointer,
                registry: ThreadRegistry::new(),
                policy: config.router,
            }),
        }
    }

    /// Start a new thread and return its id without waiting for the run
    pub async fn invoke(&self, user_intent: &str) -> Result<String, EngineError> {
        let intent = validate_intent(user_intent)?;
        self.start(intent, Uuid::new_v4().to_string()).await
    }

    /// Start a new thread under a caller-chosen id
    ///
    /// Ids are never reused: an id the engine or the store already knows is
    /// rejected.
    pub async fn invoke_with_id(
        &self,
        user_intent: &str,
        thread_id: &str,
    ) -> Result<String, EngineError> {
        let intent = validate_intent(user_intent)?;
        let thread_id = thread_id.trim();
        if thread_id.is_empty() {
            return Err(EngineError::InvalidInput("thread id is empty".to_string()));
        }

        if let Some(existing) = self.inner.registry.snapshot(thread_id) {
            return Err(self.inner.existing_thread_error(&existing));
        }

        if let Some(stored) = self.inner.checkpointer.store().load(thread_id).await? {
            return Err(EngineError::InvalidState {
                thread_id: stored.thread_id,
                status: stored.status,
            });
        }

        self.start(intent, thread_id.to_string()).await
    }

    async fn start(&self, intent: &str, thread_id: String) -> Result<String, EngineError> {
        let mut record = ThreadRecord::new(thread_id.clone(), intent);
        record.status = ThreadStatus::Running;

        let lease = match self.inner.registry.register(record.clone()) {
            Some(lease) => lease,
            None => {
                let existing = self
                    .inner
                    .registry
                    .snapshot(&thread_id)
                    .ok_or_else(|| EngineError::ConcurrencyConflict(thread_id.clone()))?;
                return Err(self.inner.existing_thread_error(&existing));
            }
        };

        if let Err(e) = self.inner.checkpointer.save(&record).await {
            drop(lease);
            self.inner.registry.remove(&thread_id);
            return Err(e.into());
        }

        tracing::info!(thread_id = %thread_id, "Thread started");
        self.spawn_runner(lease, ENTRY);
        Ok(thread_id)
    }

    /// Latest published snapshot of a thread
    ///
    /// Never blocks on a running cycle; two calls with no progress in
    /// between return the same snapshot.
    pub fn get_state(&self, thread_id: &str) -> Result<Arc<ThreadRecord>, EngineError> {
        self.inner
            .registry
            .snapshot(thread_id)
            .ok_or_else(|| EngineError::NotFound(thread_id.to_string()))
    }

    /// Apply a human decision to a halted thread and continue it
    ///
    /// Returns once the decision is accepted; the continuation runs in the
    /// background.
    pub async fn resume(&self, thread_id: &str, decision: HumanDecision) -> Result<(), EngineError> {
        // No await before the lease is taken: concurrent resumes race on it
        let lease = self.inner.registry.try_lease(thread_id).map_err(|e| match e {
            LeaseError::NotFound => EngineError::NotFound(thread_id.to_string()),
            LeaseError::Held => EngineError::ConcurrencyConflict(thread_id.to_string()),
        })?;

        let current = lease.snapshot();
        let state = HaltController::prepare_resume(&current, decision)?;

        let mut record = (*current).clone();
        tracing::info!(
            thread_id = %thread_id,
            approved = state.human_decision.as_ref().is_some_and(|d| d.approved),
            edited = state.metadata.contains_key("human_edited"),
            "Resuming thread"
        );
        record.state = state;
        record.status = ThreadStatus::Resuming;
        record.next = Some(RESUME_ENTRY);
        record.touch();
        lease.publish(record);

        self.spawn_runner(lease, RESUME_ENTRY);
        Ok(())
    }

    /// Every known thread, most recently created first
    pub fn list_threads(&self) -> Vec<ThreadSummary> {
        self.inner
            .registry
            .list()
            .iter()
            .map(|record| record.summary())
            .collect()
    }

    /// Load persisted threads into the engine
    ///
    /// Threads that were mid-run when the process stopped are halted with an
    /// error so a human can decide; none of them are re-run. Returns how many
    /// threads were loaded.
    pub async fn recover(&self) -> Result<usize, EngineError> {
        let records = self.inner.checkpointer.store().list().await?;
        let mut recovered = 0;

        // Oldest first so ties keep their creation order
        for mut record in records.into_iter().rev() {
            if self.inner.registry.contains(&record.thread_id) {
                continue;
            }

            if !record.status.is_settled() {
                tracing::warn!(
                    thread_id = %record.thread_id,
                    status = %record.status,
                    "Thread was interrupted, halting it for review"
                );
                record.state.error = Some(INTERRUPTED_ERROR.to_string());
                self.inner.halt.suspend(&mut record).await?;
            }

            if self.inner.registry.insert(record) {
                recovered += 1;
            }
        }

        if recovered > 0 {
            tracing::info!(count = recovered, "Recovered threads from checkpoint store");
        }
        Ok(recovered)
    }

    /// Wait until the thread is halted or terminal
    pub async fn wait_for_settled(&self, thread_id: &str) -> Result<Arc<ThreadRecord>, EngineError> {
        let mut rx = self
            .inner
            .registry
            .subscribe(thread_id)
            .ok_or_else(|| EngineError::NotFound(thread_id.to_string()))?;

        let record = rx
            .wait_for(|record| record.status.is_settled())
            .await
            .map(|record| Arc::clone(&record))
            .map_err(|_| EngineError::NotFound(thread_id.to_string()))?;
        Ok(record)
    }

    /// Let `handler` answer every halt until the thread ends
    ///
    /// Stops early, leaving the thread halted, when the handler declines.
    pub async fn drive_to_end(
        &self,
        thread_id: &str,
        handler: &dyn DecisionHandler,
    ) -> Result<Arc<ThreadRecord>, EngineError> {
        loop {
            let record = self.wait_for_settled(thread_id).await?;
            if record.status != ThreadStatus::Halted {
                return Ok(record);
            }

            match handler.decide(&record).await {
                Some(decision) => self.resume(thread_id, decision).await?,
                None => return Ok(record),
            }
        }
    }

    /// Threads with a runner in flight
    pub fn active_runners(&self) -> usize {
        self.inner.registry.active_count()
    }

    fn spawn_runner(&self, lease: ThreadLease, entry: Node) {
        let inner = Arc::clone(&self.inner);
        let thread_id = lease.snapshot().thread_id.clone();
        let span = tracing::info_span!("thread", thread_id = %thread_id);

        tokio::spawn(async move { inner.run(lease, entry).await }.instrument(span));
    }
}

fn validate_intent(user_intent: &str) -> Result<&str, EngineError> {
    let intent = user_intent.trim();
    if intent.is_empty() {
        return Err(EngineError::InvalidInput("user intent is empty".to_string()));
    }
    Ok(intent)
}

impl EngineInner {
    fn existing_thread_error(&self, existing: &ThreadRecord) -> EngineError {
        if self.registry.is_leased(&existing.thread_id) {
            EngineError::ConcurrencyConflict(existing.thread_id.clone())
        } else {
            EngineError::InvalidState {
                thread_id: existing.thread_id.clone(),
                status: existing.status,
            }
        }
    }

    /// Drive one thread until it halts or ends
    ///
    /// Only this task mutates the thread while it holds the lease. Snapshots
    /// are published at cycle boundaries, after the checkpoint they describe
    /// has been written.
    async fn run(&self, lease: ThreadLease, entry: Node) {
        let mut record = (*lease.snapshot()).clone();
        let mut node = entry;

        loop {
            tracing::debug!(node = %node, "Running node");
            match node {
                Node::Drafter => self.drafter.run(&mut record.state).await,
                Node::Reviewers => self.reviewers.run(&mut record.state).await,
                Node::Supervisor => self.supervisor.run(&mut record.state).await,
                Node::Router => {}
            }

            match graph::transition(node, &record.state, &self.policy) {
                Transition::Goto(next) => node = next,
                Transition::Revise => {
                    tracing::info!(
                        iteration = record.state.iteration_count,
                        safety = record.state.scores.safety,
                        clinical = record.state.scores.clinical,
                        "Revising draft"
                    );
                    record.next = Some(Node::Drafter);
                    record.touch();

                    match self.checkpointer.save(&record).await {
                        Ok(()) => {
                            lease.publish(record.clone());
                            node = Node::Drafter;
                        }
                        Err(e) => {
                            self.halt.suspend_after_failure(&mut record, &e).await;
                            lease.finish(record);
                            return;
                        }
                    }
                }
                Transition::Halt => {
                    match self.halt.suspend(&mut record).await {
                        Ok(()) => tracing::info!(
                            iteration = record.state.iteration_count,
                            error = record.state.error.as_deref().unwrap_or(""),
                            "Halted for human review"
                        ),
                        Err(e) => self.halt.suspend_after_failure(&mut record, &e).await,
                    }
                    lease.finish(record);
                    return;
                }
                Transition::Terminal(status) => {
                    record.status = status;
                    record.next = None;
                    record.touch();

                    match self.checkpointer.save(&record).await {
                        Ok(()) => tracing::info!(status = %status, "Thread finished"),
                        Err(e) => self.halt.suspend_after_failure(&mut record, &e).await,
                    }
                    lease.finish(record);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCheckpointStore;
    use foundry_agent::{CallPolicy, RoleRegistry};

    fn offline_engine() -> WorkflowEngine {
        let registry = RoleRegistry::with_defaults("test-model");
        WorkflowEngine::new(
            AgentSet::offline(&registry, CallPolicy::default()),
            Arc::new(MemoryCheckpointStore::new()),
            EngineConfig::default(),
        )
    }

    #[test]
    fn test_config_from_file() {
        let file = FoundryFileConfig::from_toml(
            r#"
            [engine]
            checkpoint_retries = 5
            checkpoint_backoff_ms = 50

            [router]
            max_iterations = 1
            "#,
        )
        .unwrap();

        let config = EngineConfig::from_file_config(&file);
        assert_eq!(config.checkpoint_retries, 5);
        assert_eq!(config.checkpoint_backoff, Duration::from_millis(50));
        assert_eq!(config.router.max_iterations, 1);
        assert_eq!(config.router.approve_safety, 9);
    }

    #[tokio::test]
    async fn test_blank_intent_rejected() {
        let engine = offline_engine();

        let err = engine.invoke("   ").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(engine.list_threads().is_empty());
    }

    #[tokio::test]
    async fn test_offline_run_halts_then_completes() {
        let engine = offline_engine();
        let id = engine.invoke("managing exam stress").await.unwrap();

        let halted = engine.wait_for_settled(&id).await.unwrap();
        assert_eq!(halted.status, ThreadStatus::Halted);
        assert_eq!(halted.state.draft_history.len(), 1);

        engine.resume(&id, HumanDecision::approve()).await.unwrap();
        let done = engine.wait_for_settled(&id).await.unwrap();
        assert_eq!(done.status, ThreadStatus::Completed);
        assert_eq!(done.next, None);
        assert_eq!(engine.active_runners(), 0);
    }

    #[tokio::test]
    async fn test_unknown_thread() {
        let engine = offline_engine();

        assert!(matches!(engine.get_state("nope"), Err(EngineError::NotFound(_))));
        assert!(matches!(
            engine.resume("nope", HumanDecision::approve()).await,
            Err(EngineError::NotFound(_))
        ));
    }
}
