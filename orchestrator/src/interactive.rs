//! Terminal prompt for halted threads
//!
//! Shows the draft and its reviews, then asks for a decision on stdin.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;

use foundry_orchestrator::{DecisionHandler, HumanDecision, ThreadRecord};

/// What the person at the terminal chose
#[derive(Debug, Clone, PartialEq, Eq)]
enum Choice {
    Approve,
    ApproveWithNote(String),
    Reject,
    Edit,
}

fn parse_choice(input: &str) -> Choice {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    match lower.as_str() {
        "y" | "yes" | "" => Choice::Approve,
        "n" | "no" => Choice::Reject,
        "e" | "edit" => Choice::Edit,
        s if s.starts_with("note ") => Choice::ApproveWithNote(trimmed[5..].trim().to_string()),
        _ => Choice::Reject,
    }
}

/// Print the halted thread the way a reviewer needs to see it
pub fn print_record(record: &ThreadRecord) {
    let state = &record.state;

    println!("Thread:     {}", record.thread_id);
    println!("Status:     {}", record.status);
    println!("Intent:     {}", state.user_intent);
    println!(
        "Scores:     safety {}/10, clinical {}/10",
        state.scores.safety, state.scores.clinical
    );
    println!("Iterations: {}", state.iteration_count);
    if let Some(error) = &state.error {
        println!("Error:      {}", error);
    }

    for review in &state.reviews {
        println!("\n[{}] {}/10", review.agent, review.score);
        if !review.notes.is_empty() {
            println!("  Notes: {}", review.notes);
        }
    }

    if !state.supervisor_feedback.is_empty() {
        println!("\nSupervisor feedback:\n{}", state.supervisor_feedback);
    }

    println!("\n{}", "─".repeat(60));
    if state.draft.is_empty() {
        println!("(no draft)");
    } else {
        println!("{}", state.draft);
    }
    println!("{}", "─".repeat(60));
}

fn prompt(record: &ThreadRecord) -> io::Result<Option<HumanDecision>> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("\n{}", "═".repeat(60));
    println!("  HUMAN REVIEW");
    println!("{}\n", "═".repeat(60));

    print_record(record);

    println!("\nOptions:");
    println!("  [y/yes]     - Approve and finalize");
    println!("  [n/no]      - Reject");
    println!("  [e/edit]    - Replace the draft, then approve");
    println!("  [note TEXT] - Approve with a note");
    println!();

    print!("Your choice: ");
    stdout.flush()?;

    let mut input = String::new();
    if stdin.lock().read_line(&mut input)? == 0 {
        // EOF: leave the thread halted
        return Ok(None);
    }

    let decision = match parse_choice(&input) {
        Choice::Approve => HumanDecision::approve(),
        Choice::ApproveWithNote(note) => HumanDecision::approve().with_feedback(note),
        Choice::Reject => HumanDecision::reject(),
        Choice::Edit => {
            println!("\nEnter the new draft (end with a line containing only '.'):");
            let mut lines = Vec::new();
            loop {
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 || line.trim_end() == "." {
                    break;
                }
                lines.push(line);
            }
            let edited = lines.concat();
            if edited.trim().is_empty() {
                println!("Empty edit, keeping the current draft.");
                HumanDecision::approve()
            } else {
                HumanDecision::approve()
                    .with_feedback("Edited by reviewer")
                    .with_edited_draft(edited.trim_end())
            }
        }
    };

    println!("\n{}", "═".repeat(60));
    Ok(Some(decision))
}

/// Asks on the terminal at every halt
pub struct InteractiveHandler;

#[async_trait]
impl DecisionHandler for InteractiveHandler {
    async fn decide(&self, record: &ThreadRecord) -> Option<HumanDecision> {
        let record = record.clone();
        match tokio::task::spawn_blocking(move || prompt(&record)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Could not read decision, leaving thread halted");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Decision prompt failed, leaving thread halted");
                None
            }
        }
    }
}
