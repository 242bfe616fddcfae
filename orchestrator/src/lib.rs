//! Workflow engine for the protocol foundry
//!
//! This crate provides:
//! - The fixed draft, review, synthesize, route graph and its router
//! - A workflow engine with one background runner per thread
//! - Checkpoint stores (in-memory, and SQLite behind the `persistence` feature)
//! - Human-in-the-loop halting, resumption and restart recovery
//!
//! # Example
//!
//! ```rust,ignore
//! use foundry_orchestrator::{EngineConfig, HumanDecision, MemoryCheckpointStore, WorkflowEngine};
//!
//! let engine = WorkflowEngine::new(agents, Arc::new(MemoryCheckpointStore::new()), EngineConfig::default());
//! let id = engine.invoke("a grounding exercise for panic attacks").await?;
//!
//! let halted = engine.wait_for_settled(&id).await?;
//! engine.resume(&id, HumanDecision::approve()).await?;
//! ```

#[cfg(feature = "persistence")]
pub mod db;
pub mod decision;
pub mod engine;
pub mod error;
pub mod graph;
pub mod halt;
pub mod nodes;
pub mod registry;
pub mod router;
pub mod state;
pub mod store;

#[cfg(feature = "persistence")]
pub use db::Database;
pub use decision::{AutoApproveHandler, DecisionHandler, RejectHandler};
pub use engine::{EngineConfig, WorkflowEngine, INTERRUPTED_ERROR};
pub use error::{EngineError, StoreError};
pub use graph::Node;
pub use router::{Route, RouterPolicy};
pub use state::{
    GraphState, HumanDecision, Review, ScoreSummary, ThreadRecord, ThreadStatus, ThreadSummary,
    RESOLVED_ERROR_KEY,
};
pub use store::{CheckpointStore, Checkpointer, MemoryCheckpointStore};

/// Re-export commonly used types from the agent crate
pub use foundry_agent::config::FoundryFileConfig;
pub use foundry_agent::{AgentRole, AgentSet, CallPolicy, RoleRegistry};
