//! Routing policy: the decision taken after every cycle
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. an error is recorded: halt
//! 2. a human approved: finalize
//! 3. a human rejected: reject
//! 4. safety and clinical scores both at the approval bar: halt for sign-off
//! 5. too many revisions, or unsafe content: halt
//! 6. either score below its revision bar: revise
//! 7. anything else: halt

use serde::{Deserialize, Serialize};
use std::fmt;

use foundry_agent::config::RouterSection;

use crate::state::GraphState;

/// Outcome of [`route`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Revise,
    Halt,
    Finalize,
    Reject,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::Revise => "revise",
            Route::Halt => "halt",
            Route::Finalize => "finalize",
            Route::Reject => "reject",
        };
        f.write_str(name)
    }
}

/// Thresholds used by [`route`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterPolicy {
    pub approve_safety: u8,
    pub approve_clinical: u8,
    pub max_iterations: u32,
    pub unsafe_below: u8,
    pub revise_safety_below: u8,
    pub revise_clinical_below: u8,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            approve_safety: 9,
            approve_clinical: 8,
            max_iterations: 3,
            unsafe_below: 6,
            revise_safety_below: 8,
            revise_clinical_below: 7,
        }
    }
}

impl From<&RouterSection> for RouterPolicy {
    fn from(section: &RouterSection) -> Self {
        Self {
            approve_safety: section.approve_safety,
            approve_clinical: section.approve_clinical,
            max_iterations: section.max_iterations,
            unsafe_below: section.unsafe_below,
            revise_safety_below: section.revise_safety_below,
            revise_clinical_below: section.revise_clinical_below,
        }
    }
}

/// Pick the next transition from the accumulated state
pub fn route(state: &GraphState, policy: &RouterPolicy) -> Route {
    if state.has_error() {
        return Route::Halt;
    }

    if let Some(decision) = &state.human_decision {
        return if decision.approved {
            Route::Finalize
        } else {
            Route::Reject
        };
    }

    let safety = state.scores.safety;
    let clinical = state.scores.clinical;

    if safety >= policy.approve_safety && clinical >= policy.approve_clinical {
        Route::Halt
    } else if state.iteration_count >= policy.max_iterations || safety < policy.unsafe_below {
        Route::Halt
    } else if safety < policy.revise_safety_below || clinical < policy.revise_clinical_below {
        Route::Revise
    } else {
        Route::Halt
    }
}
