//! System prompts for the four roles, and the task messages sent with them

mod clinical;
mod drafter;
mod safety;
mod supervisor;

pub use clinical::CLINICAL_PROMPT;
pub use drafter::DRAFTER_PROMPT;
pub use safety::SAFETY_PROMPT;
pub use supervisor::SUPERVISOR_PROMPT;

use crate::capability::PromptSpec;

/// One reviewer's output as shown to the supervisor
#[derive(Debug, Clone, Copy)]
pub struct ReviewerNotes<'a> {
    pub agent: &'a str,
    pub score: u8,
    pub notes: &'a str,
    pub reasoning: &'a str,
}

/// First draft from the user's intent alone
pub fn first_draft_request(user_intent: &str) -> PromptSpec {
    PromptSpec::new(format!(
        "User Intent: {}\n\nRevision Instructions: Create the initial draft from the user intent.",
        user_intent
    ))
}

/// Revision of `previous` following the supervisor's feedback
pub fn revision_request(user_intent: &str, previous: &str, feedback: &str) -> PromptSpec {
    let feedback = if feedback.trim().is_empty() {
        "Improve the draft based on previous feedback."
    } else {
        feedback
    };

    PromptSpec::new(format!(
        "User Intent: {}\n\nPrevious Draft:\n{}\n\nRevision Instructions:\n{}",
        user_intent, previous, feedback
    ))
}

/// Review request; identical for both reviewers and built from the draft only
pub fn review_request(draft: &str) -> PromptSpec {
    PromptSpec::new(format!("Draft to review:\n\n{}", draft))
}

/// Synthesis request over the latest reviews
pub fn synthesis_request(
    user_intent: &str,
    iteration: u32,
    reviews: &[ReviewerNotes<'_>],
) -> PromptSpec {
    let mut task = format!("DRAFT ITERATION: {}\nUSER INTENT: {}\n", iteration, user_intent);

    for review in reviews {
        task.push_str(&format!(
            "\n{} (Score: {}/10)\nNotes: {}\nReasoning: {}\n",
            review.agent, review.score, review.notes, review.reasoning
        ));
    }

    task.push_str(
        "\nCreate CLEAR, ACTIONABLE instructions for the next draft. Prioritize the most important changes.\n\nInstructions for Drafter:",
    );
    PromptSpec::new(task)
}
