//! The fixed workflow graph
//!
//! ```text
//!          +-----------------------------(revise)------------------+
//!          v                                                       |
//!   Drafter --> Reviewers --> Supervisor --> Router --+--> halt (suspend)
//!      |            |                          ^     +--> completed
//!      +--(error)---+-------------------------+     +--> rejected
//! ```
//!
//! A resumed thread re-enters at the supervisor.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::router::{route, Route, RouterPolicy};
use crate::state::{GraphState, ThreadStatus};

/// Named states of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Drafter,
    Reviewers,
    Supervisor,
    Router,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Node::Drafter => "drafter",
            Node::Reviewers => "reviewers",
            Node::Supervisor => "supervisor",
            Node::Router => "router",
        };
        f.write_str(name)
    }
}

/// Where a new thread starts
pub const ENTRY: Node = Node::Drafter;

/// Where a resumed thread continues
pub const RESUME_ENTRY: Node = Node::Supervisor;

/// What happens after a node has run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Run another node in the same cycle
    Goto(Node),
    /// Back to the drafter for a new cycle
    Revise,
    /// Suspend until a human decides
    Halt,
    /// Stop for good
    Terminal(ThreadStatus),
}

/// Pure transition function over the state left by `node`
pub fn transition(node: Node, state: &GraphState, policy: &RouterPolicy) -> Transition {
    match node {
        // A failed step skips the rest of the cycle
        Node::Drafter | Node::Reviewers | Node::Supervisor if state.has_error() => {
            Transition::Goto(Node::Router)
        }
        Node::Drafter => Transition::Goto(Node::Reviewers),
        Node::Reviewers => Transition::Goto(Node::Supervisor),
        Node::Supervisor => Transition::Goto(Node::Router),
        Node::Router => match route(state, policy) {
            Route::Revise => Transition::Revise,
            Route::Halt => Transition::Halt,
            Route::Finalize => Transition::Terminal(ThreadStatus::Completed),
            Route::Reject => Transition::Terminal(ThreadStatus::Rejected),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{HumanDecision, ScoreSummary};

    fn policy() -> RouterPolicy {
        RouterPolicy::default()
    }

    #[test]
    fn test_cycle_order() {
        let state = GraphState::new("intent");
        assert_eq!(
            transition(Node::Drafter, &state, &policy()),
            Transition::Goto(Node::Reviewers)
        );
        assert_eq!(
            transition(Node::Reviewers, &state, &policy()),
            Transition::Goto(Node::Supervisor)
        );
        assert_eq!(
            transition(Node::Supervisor, &state, &policy()),
            Transition::Goto(Node::Router)
        );
    }

    #[test]
    fn test_error_short_circuits_to_router() {
        let mut state = GraphState::new("intent");
        state.error = Some("Drafting failed".to_string());

        assert_eq!(
            transition(Node::Drafter, &state, &policy()),
            Transition::Goto(Node::Router)
        );
        assert_eq!(
            transition(Node::Reviewers, &state, &policy()),
            Transition::Goto(Node::Router)
        );
        assert_eq!(transition(Node::Router, &state, &policy()), Transition::Halt);
    }

    #[test]
    fn test_router_outcomes() {
        let mut state = GraphState::new("intent");
        state.scores = ScoreSummary {
            safety: 7,
            clinical: 6,
        };
        assert_eq!(transition(Node::Router, &state, &policy()), Transition::Revise);

        state.human_decision = Some(HumanDecision::approve());
        assert_eq!(
            transition(Node::Router, &state, &policy()),
            Transition::Terminal(ThreadStatus::Completed)
        );

        state.human_decision = Some(HumanDecision::reject());
        assert_eq!(
            transition(Node::Router, &state, &policy()),
            Transition::Terminal(ThreadStatus::Rejected)
        );
    }

    #[test]
    fn test_node_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Node::Reviewers).unwrap(), "\"reviewers\"");
        assert_eq!(RESUME_ENTRY.to_string(), "supervisor");
    }
}
