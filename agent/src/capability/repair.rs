//! Repair of loosely structured model output
//!
//! Models asked for "JSON only" still wrap replies in code fences, add a
//! sentence of prose, rename keys, or quote numbers. These helpers recover
//! the object when one is there and report precisely when it is not.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Opening fence with optional language tag, or a closing fence, on its own line
    Regex::new(r"(?im)^\s*```[a-z]*\s*$").expect("Invalid fence regex")
});

/// Keys a score may arrive under
pub const SCORE_KEYS: &[&str] = &["score", "safety_score", "quality_score", "rating"];

/// Keys revision notes may arrive under
pub const NOTES_KEYS: &[&str] = &[
    "revision_notes",
    "notes",
    "improvements",
    "suggestions",
    "recommendations",
];

/// Keys reasoning may arrive under
pub const REASONING_KEYS: &[&str] = &["reasoning", "analysis", "rationale", "explanation"];

/// Remove Markdown code fence lines
pub fn strip_code_fences(text: &str) -> String {
    FENCE_REGEX.replace_all(text.trim(), "").trim().to_string()
}

/// Extract the first JSON object from a reply
///
/// Tries the fence-stripped text as a whole, then the span between the first
/// `{` and the last `}`.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fences(text);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned) {
        return Some(map);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }

    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// First non-null value under any of `keys`, matched case-insensitively
pub fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| {
        map.iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.is_null())
            .map(|(_, v)| v)
    })
}

/// Read a 0..=10 score from a number or a numeric string ("8", "8.0", "8/10")
pub fn coerce_score(value: &Value) -> Result<u8, String> {
    let number = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("score {} is not a finite number", n))?,
        Value::String(s) => {
            let head = s.split('/').next().unwrap_or_default().trim();
            head.parse::<f64>()
                .map_err(|_| format!("score {:?} is not numeric", s))?
        }
        other => return Err(format!("score has unsupported type: {}", other)),
    };

    if number.fract() != 0.0 {
        return Err(format!("score {} is not an integer", number));
    }
    if !(0.0..=10.0).contains(&number) {
        return Err(format!("score {} is outside 0..=10", number));
    }

    Ok(number as u8)
}

/// Interpret yes/no style values
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "true" | "y" | "1" | "present" => Some(true),
            "no" | "false" | "n" | "0" | "none" | "absent" | "minimal" | "not present" => {
                Some(false)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Render a value as free text; lists are joined with spaces
pub fn coerce_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(coerce_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => return None,
        other => other.to_string(),
    };

    (!text.is_empty()).then_some(text)
}

/// Hazards a safety reviewer may flag alongside (or instead of) its notes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HazardFlags {
    pub medical_advice: bool,
    pub crisis_content: bool,
    pub missing_disclaimer: bool,
    pub overly_clinical: bool,
    pub disempowering_tone: bool,
}

impl HazardFlags {
    /// Detect hazard flags from free-form keys such as `1_Medical_advice_or_diagnosis`
    pub fn scan(map: &Map<String, Value>) -> Self {
        let mut flags = Self::default();

        for (key, value) in map {
            let key = key.to_lowercase();
            let Some(set) = coerce_bool(value) else {
                continue;
            };

            if key.contains("medical") && key.contains("advice") {
                flags.medical_advice = set;
            } else if key.contains("crisis") || key.contains("self-harm") || key.contains("suicide")
            {
                flags.crisis_content = set;
            } else if key.contains("clinical") && (key.contains("overly") || key.contains("patholog"))
            {
                flags.overly_clinical = set;
            } else if key.contains("disclaimer") {
                if key.contains("missing") {
                    flags.missing_disclaimer = set;
                } else if key.contains("present") {
                    flags.missing_disclaimer = !set;
                }
            } else if key.contains("tone") && key.contains("disempower") {
                flags.disempowering_tone = set;
            } else if key.contains("tone") && key.contains("empower") {
                flags.disempowering_tone = !set;
            }
        }

        flags
    }

    pub fn any(&self) -> bool {
        self.medical_advice
            || self.crisis_content
            || self.missing_disclaimer
            || self.overly_clinical
            || self.disempowering_tone
    }

    /// Lower a score to the tightest cap of the flagged hazards
    pub fn cap(&self, score: u8) -> u8 {
        let mut capped = score;
        if self.medical_advice {
            capped = capped.min(5);
        }
        if self.crisis_content {
            capped = capped.min(4);
        }
        if self.missing_disclaimer {
            capped = capped.min(6);
        }
        if self.overly_clinical {
            capped = capped.min(7);
        }
        if self.disempowering_tone {
            capped = capped.min(7);
        }
        capped
    }

    /// Revision notes derived from the flags, used when the reviewer gave none
    pub fn suggestions(&self) -> Option<String> {
        let mut notes = Vec::new();
        if self.missing_disclaimer {
            notes.push("Add the required disclaimer at the top.");
        }
        if self.medical_advice {
            notes.push("Remove medical advice and diagnostic language.");
        }
        if self.crisis_content {
            notes.push("Avoid crisis, self-harm and suicide content.");
        }
        if self.overly_clinical {
            notes.push("Use non-pathologizing, lay language.");
        }
        if self.disempowering_tone {
            notes.push("Reframe steps in a supportive, empowering tone.");
        }

        (!notes.is_empty()).then(|| notes.join(" "))
    }
}
