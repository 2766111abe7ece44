//! The bullet judgment capability.
//!
//! Deciding whether a free-text response earns a marking bullet is delegated
//! to a `BulletJudge`. The engine only aggregates; implementations live in
//! `matching` (rule-based) and in the `sqamark-judges` crate (LLM-backed).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::JudgeError;
use crate::model::{IllustrativeAnswer, MarkingBullet};

// ---------------------------------------------------------------------------
// Judge trait
// ---------------------------------------------------------------------------

/// Decides whether one marking bullet is earned by a response.
#[async_trait]
pub trait BulletJudge: Send + Sync {
    /// Human-readable judge name (e.g. "rules", "anthropic").
    fn name(&self) -> &str;

    /// Judge a single bullet. Errors are recorded as ungraded bullets, never
    /// propagated past the engine.
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError>;
}

/// Everything a judge sees when deciding one bullet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub question_id: String,
    pub stem: String,
    pub response_text: String,
    #[serde(default)]
    pub working_shown: Option<String>,
    pub bullet: MarkingBullet,
    /// Illustrative answers correlated with the bullet by number (possibly none).
    #[serde(default)]
    pub candidates: Vec<IllustrativeAnswer>,
}

/// A judge's decision for one bullet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub awarded: bool,
    pub rationale: String,
}

impl JudgeVerdict {
    pub fn awarded(rationale: impl Into<String>) -> Self {
        Self {
            awarded: true,
            rationale: rationale.into(),
        }
    }

    pub fn withheld(rationale: impl Into<String>) -> Self {
        Self {
            awarded: false,
            rationale: rationale.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default marking prompt
// ---------------------------------------------------------------------------

/// System prompt for LLM-backed judges.
pub const DEFAULT_JUDGE_PROMPT: &str = "You are an SQA examiner applying a generic marking scheme. Decide whether the candidate's response earns ONE marking bullet. Award the bullet only if the response (or, failing that, the working shown) demonstrates the bullet's process; use the illustrative answers, tolerance ranges, and accepted variations to decide equivalence. Respond ONLY with JSON of the form {\"awarded\": true|false, \"rationale\": \"<one sentence for the student>\"}.";

/// Render the user prompt for one bullet judgment.
pub fn render_judge_prompt(request: &JudgeRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Question: {}\n\n", request.stem));
    prompt.push_str(&format!(
        "Bullet {} ({} mark(s)): {}\n\n",
        request.bullet.bullet, request.bullet.marks, request.bullet.process
    ));

    if request.candidates.is_empty() {
        prompt.push_str("Illustrative answers: none for this bullet; judge on the process alone.\n");
    } else {
        prompt.push_str("Illustrative answers:\n");
        for candidate in &request.candidates {
            prompt.push_str(&format!("- {}", candidate.answer));
            if let Some(latex) = &candidate.answer_latex {
                prompt.push_str(&format!(" (LaTeX: {latex})"));
            }
            if let Some([low, high]) = candidate.tolerance_range {
                prompt.push_str(&format!(" [accept {low} to {high}]"));
            }
            if !candidate.acceptable_variations.is_empty() {
                prompt.push_str(&format!(
                    " [also accept: {}]",
                    candidate.acceptable_variations.join("; ")
                ));
            }
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!("\nCandidate response:\n{}\n", request.response_text));
    if let Some(working) = &request.working_shown {
        prompt.push_str(&format!("\nWorking shown:\n{working}\n"));
    }
    prompt
}

// ---------------------------------------------------------------------------
// Verdict extraction
// ---------------------------------------------------------------------------

/// Extract a JSON payload from a markdown-formatted LLM response.
///
/// Handles:
/// - A ```json``` block (preferred)
/// - A generic ``` block
/// - Raw text, trimmed to the outermost `{ ... }`
pub fn extract_json_from_markdown(response: &str) -> String {
    let mut json_block = None;
    let mut generic_block = None;
    let mut in_block = false;
    let mut is_json_block = false;
    let mut current_block = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_block.get_or_insert_with(|| current_block.clone());
            } else {
                generic_block.get_or_insert_with(|| current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    // Truncated (unclosed) block: keep what was accumulated
    if in_block && !current_block.is_empty() {
        if is_json_block {
            json_block.get_or_insert(current_block);
        } else {
            generic_block.get_or_insert(current_block);
        }
    }

    if let Some(block) = json_block.or(generic_block) {
        return block;
    }

    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => response[start..=end].to_string(),
        _ => response.trim().to_string(),
    }
}

/// Parse a judge's textual reply into a verdict.
pub fn parse_verdict(response: &str) -> Result<JudgeVerdict, JudgeError> {
    let payload = extract_json_from_markdown(response);
    let verdict: JudgeVerdict = serde_json::from_str(&payload)
        .map_err(|e| JudgeError::MalformedVerdict(format!("{e}: {payload}")))?;
    if verdict.rationale.trim().is_empty() {
        return Err(JudgeError::MalformedVerdict("empty rationale".into()));
    }
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JudgeRequest {
        JudgeRequest {
            question_id: "q1".into(),
            stem: "Solve 3x + 2 = 11.".into(),
            response_text: "x = 3".into(),
            working_shown: Some("3x = 9".into()),
            bullet: MarkingBullet {
                bullet: 2,
                process: "solves correctly".into(),
                marks: 2,
            },
            candidates: vec![IllustrativeAnswer {
                bullet: 2,
                answer: "x = 3".into(),
                answer_latex: Some("x = 3".into()),
                tolerance_range: Some([3.0, 3.0]),
                acceptable_variations: vec!["3".into()],
            }],
        }
    }

    #[test]
    fn extract_json_block() {
        let input = "Here is my decision:\n\n```json\n{\"awarded\": true, \"rationale\": \"ok\"}\n```\n";
        assert_eq!(
            extract_json_from_markdown(input),
            "{\"awarded\": true, \"rationale\": \"ok\"}"
        );
    }

    #[test]
    fn extract_prefers_json_over_generic() {
        let input = "```\nnot this\n```\n\n```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_from_markdown(input), "{\"a\": 1}");
    }

    #[test]
    fn extract_raw_object_from_prose() {
        let input = "Verdict: {\"awarded\": false, \"rationale\": \"no\"} thanks";
        assert_eq!(
            extract_json_from_markdown(input),
            "{\"awarded\": false, \"rationale\": \"no\"}"
        );
    }

    #[test]
    fn extract_truncated_block() {
        let input = "```json\n{\"awarded\": true,\n\"rationale\": \"fine\"}";
        assert!(extract_json_from_markdown(input).contains("\"rationale\": \"fine\""));
    }

    #[test]
    fn parse_verdict_rejects_garbage() {
        assert!(matches!(
            parse_verdict("I think so"),
            Err(JudgeError::MalformedVerdict(_))
        ));
        assert!(matches!(
            parse_verdict("{\"awarded\": true, \"rationale\": \" \"}"),
            Err(JudgeError::MalformedVerdict(_))
        ));
        let verdict = parse_verdict("```json\n{\"awarded\": true, \"rationale\": \"correct\"}\n```").unwrap();
        assert!(verdict.awarded);
    }

    #[test]
    fn prompt_includes_scheme_and_working() {
        let prompt = render_judge_prompt(&request());
        assert!(prompt.contains("Bullet 2 (2 mark(s)): solves correctly"));
        assert!(prompt.contains("[accept 3 to 3]"));
        assert!(prompt.contains("[also accept: 3]"));
        assert!(prompt.contains("Working shown:\n3x = 9"));
    }
}
