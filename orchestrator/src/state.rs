//! Workflow state: the unit of persistence threaded through every node

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::graph::Node;

/// Metadata key the error text moves to when a human resolves it
pub const RESOLVED_ERROR_KEY: &str = "resolved_error";

/// One reviewer's judgement of one draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub agent: String,
    pub score: u8,
    pub notes: String,
    pub reasoning: String,
}

/// Latest reviewer scores, overwritten each cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub safety: u8,
    pub clinical: u8,
}

/// An external decision on a halted thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanDecision {
    pub approved: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub edited_draft: Option<String>,
}

impl HumanDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            feedback: String::new(),
            edited_draft: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            approved: false,
            feedback: String::new(),
            edited_draft: None,
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    pub fn with_edited_draft(mut self, draft: impl Into<String>) -> Self {
        self.edited_draft = Some(draft.into());
        self
    }
}

/// State of one generation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub user_intent: String,
    pub draft: String,
    /// Every draft ever produced, oldest first
    pub draft_history: Vec<String>,
    /// Latest review batch: safety first, clinical second
    pub reviews: Vec<Review>,
    pub scores: ScoreSummary,
    pub supervisor_feedback: String,
    /// Successful drafter passes, the first draft included
    pub iteration_count: u32,
    pub human_decision: Option<HumanDecision>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl GraphState {
    pub fn new(user_intent: impl Into<String>) -> Self {
        Self {
            user_intent: user_intent.into(),
            draft: String::new(),
            draft_history: Vec::new(),
            reviews: Vec::new(),
            scores: ScoreSummary::default(),
            supervisor_feedback: String::new(),
            iteration_count: 0,
            human_decision: None,
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    /// True when a non-empty error is recorded
    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }
}

/// Lifecycle of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Persisted, no runner has started yet
    Created,
    Running,
    /// Suspended awaiting a human decision
    Halted,
    Resuming,
    Completed,
    Rejected,
    Error,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Created => "created",
            ThreadStatus::Running => "running",
            ThreadStatus::Halted => "halted",
            ThreadStatus::Resuming => "resuming",
            ThreadStatus::Completed => "completed",
            ThreadStatus::Rejected => "rejected",
            ThreadStatus::Error => "error",
        }
    }

    /// No runner may touch a terminal thread again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ThreadStatus::Completed | ThreadStatus::Rejected | ThreadStatus::Error
        )
    }

    /// Halted or terminal: nothing is scheduled for the thread
    pub fn is_settled(&self) -> bool {
        *self == ThreadStatus::Halted || self.is_terminal()
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A thread as the engine publishes and persists it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: String,
    pub status: ThreadStatus,
    pub state: GraphState,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    /// Node the thread continues from; None once terminal
    pub next: Option<Node>,
}

impl ThreadRecord {
    pub fn new(thread_id: impl Into<String>, user_intent: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            status: ThreadStatus::Created,
            state: GraphState::new(user_intent),
            created_at: now,
            last_update: now,
            next: Some(crate::graph::ENTRY),
        }
    }

    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }

    pub fn summary(&self) -> ThreadSummary {
        ThreadSummary {
            thread_id: self.thread_id.clone(),
            status: self.status,
            user_intent: self.state.user_intent.clone(),
            iteration_count: self.state.iteration_count,
            scores: self.state.scores,
            created_at: self.created_at,
            last_update: self.last_update,
        }
    }
}

/// Listing entry for a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub status: ThreadStatus,
    pub user_intent: String,
    pub iteration_count: u32,
    pub scores: ScoreSummary,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}
