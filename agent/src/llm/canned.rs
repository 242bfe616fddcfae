//! Fixed-reply backend for offline runs

use anyhow::Result;
use async_trait::async_trait;

use super::Llm;

/// Returns the same reply for every request
pub struct CannedLlm {
    reply: String,
}

impl CannedLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl Llm for CannedLlm {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "offline"
    }
}

/// Drafter reply in offline mode
pub const OFFLINE_DRAFT: &str = r#"## The Thought Record Exercise
**Disclaimer**: This is an educational exercise for self-reflection, not a substitute for professional therapy.

### Introduction
Cognitive Behavioral Therapy teaches us to notice unhelpful thoughts and test them against the evidence.

### The Exercise: Step-by-Step
1. Write down the situation and the thought that came up.
2. Rate how strongly you believe the thought, from 0 to 100.
3. List the evidence that supports the thought.
4. List the evidence that does not support it.
5. Write a balanced thought that accounts for both lists, then re-rate your belief.

### Reflection Questions
- What changed between your first and second rating?
- What would you tell a friend who had this thought?"#;

/// Safety reviewer reply in offline mode
pub const OFFLINE_SAFETY_REVIEW: &str = r#"{"reasoning": "Disclaimer present, no medical advice or crisis content, supportive tone.", "score": 9, "passes": true, "revision_notes": "Keep the supportive, non-judgmental tone."}"#;

/// Clinical reviewer reply in offline mode
pub const OFFLINE_CLINICAL_REVIEW: &str = r#"{"reasoning": "Follows the standard thought record structure with concrete steps.", "score": 8, "passes": true, "revision_notes": "Consider adding a short worked example."}"#;

/// Supervisor reply in offline mode
pub const OFFLINE_SYNTHESIS: &str = "• Add a short worked example after step 5.\n• Keep the disclaimer and the supportive tone.";
