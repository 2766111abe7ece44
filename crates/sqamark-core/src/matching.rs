//! Rule-based judging against the illustrative scheme.
//!
//! Deterministic and offline: a bullet is awarded when the response, or
//! failing that the working shown, contains one of the accepted forms of a
//! correlated illustrative answer. Numeric answers with a tolerance range are
//! checked against the last number written, which is taken as the final answer.

use async_trait::async_trait;

use crate::error::JudgeError;
use crate::model::IllustrativeAnswer;
use crate::traits::{BulletJudge, JudgeRequest, JudgeVerdict};

/// Judge that marks purely from illustrative answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IllustrativeJudge;

#[async_trait]
impl BulletJudge for IllustrativeJudge {
    fn name(&self) -> &str {
        "rules"
    }

    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        judge_by_rules(request)
    }
}

/// Synchronous core of [`IllustrativeJudge`].
pub fn judge_by_rules(request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
    if request.candidates.is_empty() {
        return Err(JudgeError::NoCandidates {
            bullet: request.bullet.bullet,
        });
    }

    let process = &request.bullet.process;

    if let Some(form) = first_match(&request.response_text, &request.candidates) {
        return Ok(JudgeVerdict::awarded(format!("{process}: response matches '{form}'.")));
    }

    if let Some(working) = request.working_shown.as_deref() {
        if let Some(form) = first_match(working, &request.candidates) {
            return Ok(JudgeVerdict::awarded(format!(
                "{process}: justified by working shown ('{form}')."
            )));
        }
    }

    let expected = &request.candidates[0].answer;
    Ok(JudgeVerdict::withheld(format!(
        "{process}: no accepted form found (expected something like '{expected}')."
    )))
}

/// The first accepted form of any candidate found in `text`.
fn first_match<'a>(text: &str, candidates: &'a [IllustrativeAnswer]) -> Option<&'a str> {
    let normalized = normalize(text);
    candidates
        .iter()
        .find_map(|candidate| candidate_match(text, &normalized, candidate))
}

fn candidate_match<'a>(
    raw: &str,
    normalized: &str,
    candidate: &'a IllustrativeAnswer,
) -> Option<&'a str> {
    if let Some([low, high]) = candidate.tolerance_range {
        // Numeric answers are decided by the final value alone.
        return last_number(raw)
            .filter(|value| (low..=high).contains(value))
            .map(|_| candidate.answer.as_str());
    }

    std::iter::once(candidate.answer.as_str())
        .chain(candidate.answer_latex.as_deref())
        .chain(candidate.acceptable_variations.iter().map(String::as_str))
        .find(|form| {
            let needle = normalize(form);
            !needle.is_empty() && normalized.contains(&needle)
        })
}

/// Lowercase, drop whitespace and LaTeX delimiters so "3x + 2" matches "$3x+2$".
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | '\\' | '{' | '}'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// The last decimal number appearing in `text`, if any.
pub fn last_number(text: &str) -> Option<f64> {
    let mut last = None;
    let mut token = String::new();
    let mut prev: Option<char> = None;

    for c in text.chars().chain(std::iter::once(' ')) {
        let starts_negative = c == '-' && token.is_empty() && !prev.is_some_and(|p| p.is_alphanumeric());
        if c.is_ascii_digit() || (c == '.' && !token.is_empty() && !token.contains('.')) || starts_negative {
            token.push(c);
        } else if !token.is_empty() {
            if let Ok(value) = token.trim_end_matches('.').parse::<f64>() {
                last = Some(value);
            }
            token.clear();
        }
        prev = Some(c);
    }

    last
}
