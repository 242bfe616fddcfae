//! Node implementations
//!
//! Each node reads and updates the [`GraphState`](crate::state::GraphState)
//! it is given. Agent failures are recorded in `state.error`, never returned.

mod drafter;
mod reviewers;
mod supervisor;

pub use drafter::Drafter;
pub use reviewers::ReviewerPool;
pub use supervisor::SupervisorSynthesizer;

use chrono::Utc;
use std::time::Instant;

use crate::state::GraphState;

/// Record how long a node took, plus an optional timestamp key
fn record_timing(state: &mut GraphState, duration_key: &str, started: Instant, stamp_key: Option<&str>) {
    state.set_metadata(duration_key, started.elapsed().as_millis() as u64);
    if let Some(key) = stamp_key {
        state.set_metadata(key, Utc::now().to_rfc3339());
    }
}
