//! Typed agent outputs and their validation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::repair::{
    coerce_score, coerce_text, extract_json_object, first_present, strip_code_fences,
    HazardFlags, NOTES_KEYS, REASONING_KEYS, SCORE_KEYS,
};

/// A value an agent must produce from raw model text
///
/// `parse` is the validation gate: anything it accepts is trusted by the
/// workflow, anything it rejects counts as a failed attempt.
pub trait StructuredOutput: Sized + Send + 'static {
    /// Format instructions appended to the role's system prompt
    fn format_instructions() -> String;

    /// Validate a raw reply
    fn parse(raw: &str) -> Result<Self, String>;
}

/// Markdown exercise text from the drafter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub content: String,
}

impl StructuredOutput for Draft {
    fn format_instructions() -> String {
        "Reply with the complete exercise in Markdown and nothing else.".to_string()
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let content = strip_code_fences(raw);
        if content.is_empty() {
            return Err("draft is empty".to_string());
        }
        Ok(Self { content })
    }
}

/// Wire shape requested from reviewers
///
/// Only used to render the JSON Schema embedded in reviewer prompts. Replies
/// are read leniently by [`ReviewVerdict::parse`] and [`SafetyVerdict::parse`].
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReviewResponse {
    /// Step-by-step reasoning behind the score
    pub reasoning: String,
    /// Score from 0 (unacceptable) to 10 (excellent)
    #[schemars(range(min = 0, max = 10))]
    pub score: u8,
    /// Whether the draft meets the reviewer's bar as it stands
    pub passes: bool,
    /// Concrete, actionable changes for the next revision
    pub revision_notes: String,
}

/// A validated reviewer judgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub score: u8,
    pub notes: String,
    pub reasoning: String,
}

fn review_instructions() -> String {
    let schema = schemars::schema_for!(ReviewResponse);
    let rendered = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "Return a STRICT JSON object matching this JSON Schema:\n{}\n\n\
         Do not include extra keys, explanations, or code fences. Output JSON only.",
        rendered
    )
}

impl ReviewVerdict {
    /// Read a verdict from a recovered reply object, applying `hazards`
    fn from_map(map: &Map<String, Value>, hazards: &HazardFlags) -> Result<Self, String> {
        let score_value = first_present(map, SCORE_KEYS).ok_or("reply has no score")?;
        let score = hazards.cap(coerce_score(score_value)?);

        let notes = first_present(map, NOTES_KEYS)
            .and_then(coerce_text)
            .or_else(|| hazards.suggestions())
            .unwrap_or_default();
        let reasoning = first_present(map, REASONING_KEYS)
            .and_then(coerce_text)
            .unwrap_or_default();

        Ok(Self {
            score,
            notes,
            reasoning,
        })
    }
}

/// Reviewer reply read as-is; hazard-like keys carry no weight
impl StructuredOutput for ReviewVerdict {
    fn format_instructions() -> String {
        review_instructions()
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let map = extract_json_object(raw).ok_or("reply contains no JSON object")?;
        Self::from_map(&map, &HazardFlags::default())
    }
}

/// A safety reviewer's verdict, with flagged hazards applied
///
/// Hazard flags in the reply cap the score, and fill in revision notes when
/// the reviewer left none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict(pub ReviewVerdict);

impl From<SafetyVerdict> for ReviewVerdict {
    fn from(verdict: SafetyVerdict) -> Self {
        verdict.0
    }
}

impl StructuredOutput for SafetyVerdict {
    fn format_instructions() -> String {
        review_instructions()
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let map = extract_json_object(raw).ok_or("reply contains no JSON object")?;
        ReviewVerdict::from_map(&map, &HazardFlags::scan(&map)).map(Self)
    }
}

/// Supervisor guidance for the next draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub feedback: String,
}

impl StructuredOutput for Synthesis {
    fn format_instructions() -> String {
        "Reply with the instructions only, as bullet points starting with •.".to_string()
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let feedback = strip_code_fences(raw);
        if feedback.is_empty() {
            return Err("synthesis is empty".to_string());
        }
        Ok(Self { feedback })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_rejects_blank() {
        assert!(Draft::parse("   \n").is_err());
        assert!(Draft::parse("```markdown\n```").is_err());
    }

    #[test]
    fn test_draft_strips_outer_fence() {
        let draft = Draft::parse("```markdown\n## Title\nBody\n```").unwrap();
        assert_eq!(draft.content, "## Title\nBody");
    }

    #[test]
    fn test_review_strict_reply() {
        let verdict = ReviewVerdict::parse(
            r#"{"reasoning": "Clear steps", "score": 8, "passes": true, "revision_notes": "Add an example"}"#,
        )
        .unwrap();

        assert_eq!(verdict.score, 8);
        assert_eq!(verdict.notes, "Add an example");
        assert_eq!(verdict.reasoning, "Clear steps");
    }

    #[test]
    fn test_review_alias_keys_and_string_score() {
        let verdict = ReviewVerdict::parse(
            "Sure!\n```json\n{\"quality_score\": \"7\", \"suggestions\": [\"Shorter intro.\"], \"analysis\": \"Decent\"}\n```",
        )
        .unwrap();

        assert_eq!(verdict.score, 7);
        assert_eq!(verdict.notes, "Shorter intro.");
        assert_eq!(verdict.reasoning, "Decent");
    }

    #[test]
    fn test_review_missing_score_is_failure() {
        let err = ReviewVerdict::parse(r#"{"reasoning": "ok", "revision_notes": "none"}"#)
            .unwrap_err();
        assert!(err.contains("no score"));
    }

    #[test]
    fn test_review_out_of_range_is_failure() {
        assert!(ReviewVerdict::parse(r#"{"score": 12}"#).is_err());
    }

    #[test]
    fn test_review_without_json_is_failure() {
        assert!(ReviewVerdict::parse("Looks great, 9 out of 10").is_err());
    }

    #[test]
    fn test_safety_hazards_cap_and_fill_notes() {
        let SafetyVerdict(verdict) = SafetyVerdict::parse(
            r#"{"score": 9, "missing_disclaimer": "yes", "reasoning": "No disclaimer"}"#,
        )
        .unwrap();

        assert_eq!(verdict.score, 6);
        assert_eq!(verdict.notes, "Add the required disclaimer at the top.");
    }

    #[test]
    fn test_safety_crisis_flag_caps_at_four() {
        let SafetyVerdict(verdict) = SafetyVerdict::parse(
            r#"{"score": 9, "crisis_content": true, "revision_notes": "Remove the crisis scenario"}"#,
        )
        .unwrap();

        assert_eq!(verdict.score, 4);
        assert_eq!(verdict.notes, "Remove the crisis scenario");
    }

    #[test]
    fn test_clinical_reply_ignores_hazard_like_keys() {
        let verdict = ReviewVerdict::parse(
            r#"{"score": 9, "includes_crisis_resources": "yes", "disclaimer_present": "no", "reasoning": "Well structured"}"#,
        )
        .unwrap();

        assert_eq!(verdict.score, 9);
        assert_eq!(verdict.notes, "");
        assert_eq!(verdict.reasoning, "Well structured");
    }

    #[test]
    fn test_review_instructions_embed_schema() {
        let instructions = ReviewVerdict::format_instructions();
        assert!(instructions.contains("revision_notes"));
        assert!(instructions.contains("score"));
        assert_eq!(instructions, SafetyVerdict::format_instructions());
    }

    #[test]
    fn test_synthesis_rejects_blank() {
        assert!(Synthesis::parse("").is_err());
        assert_eq!(
            Synthesis::parse("• Add a disclaimer").unwrap().feedback,
            "• Add a disclaimer"
        );
    }
}
