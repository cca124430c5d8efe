//! Parser for the agent's step-output grammar.
//!
//! Each LLM response must take one of two shapes:
//!
//! ```text
//! THOUGHT: <reasoning>
//! ACTION: <tool name>
//! ACTION_INPUT: {"param": "value"}
//! ```
//!
//! or
//!
//! ```text
//! THOUGHT: <reasoning>
//! FINAL_ANSWER: <answer>
//! ```
//!
//! Parsing is a single deterministic pass. A response carrying both an
//! `ACTION` and a `FINAL_ANSWER` marker is ambiguous and rejected, as is an
//! `ACTION` whose input is not a JSON object.

use serde_json::Value;

const THOUGHT: &str = "THOUGHT:";
const ACTION: &str = "ACTION:";
const ACTION_INPUT: &str = "ACTION_INPUT:";
const FINAL_ANSWER: &str = "FINAL_ANSWER:";

/// A successfully parsed step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// The model wants to invoke a tool.
    Action {
        /// Reasoning preceding the action, if any.
        thought: String,
        /// Tool name.
        tool: String,
        /// Parsed JSON argument object.
        args: Value,
    },
    /// The model produced its final answer.
    Final {
        /// Reasoning preceding the answer, if any.
        thought: String,
        /// The answer text.
        answer: String,
    },
}

/// Why a response failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub enum StepParseError {
    /// Both ACTION and FINAL_ANSWER appeared in one response.
    Ambiguous,
    /// ACTION present but ACTION_INPUT missing.
    MissingActionInput,
    /// ACTION_INPUT was not a JSON object.
    BadActionInput(String),
    /// Neither marker appeared.
    NoMarker,
}

impl std::fmt::Display for StepParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ambiguous => write!(f, "response contained both ACTION and FINAL_ANSWER"),
            Self::MissingActionInput => write!(f, "ACTION without ACTION_INPUT"),
            Self::BadActionInput(e) => write!(f, "ACTION_INPUT is not a JSON object: {e}"),
            Self::NoMarker => write!(f, "response contained neither ACTION nor FINAL_ANSWER"),
        }
    }
}

/// Parse one LLM step response.
pub fn parse_step(response: &str) -> Result<StepOutput, StepParseError> {
    let has_action = response.contains(ACTION);
    let has_final = response.contains(FINAL_ANSWER);

    if has_final && has_action {
        return Err(StepParseError::Ambiguous);
    }

    if has_final {
        let (before, after) = split_at_marker(response, FINAL_ANSWER);
        return Ok(StepOutput::Final {
            thought: extract_thought(before),
            answer: after.trim().to_string(),
        });
    }

    if has_action {
        let (before, after) = split_at_marker(response, ACTION);
        let thought = extract_thought(before);

        let Some((tool_part, input_part)) = split_marker(after, ACTION_INPUT) else {
            return Err(StepParseError::MissingActionInput);
        };

        let tool = tool_part.trim().to_string();
        let args = parse_action_input(input_part)?;

        return Ok(StepOutput::Action {
            thought,
            tool,
            args,
        });
    }

    Err(StepParseError::NoMarker)
}

fn split_at_marker<'a>(text: &'a str, marker: &str) -> (&'a str, &'a str) {
    match text.find(marker) {
        Some(pos) => (&text[..pos], &text[pos + marker.len()..]),
        None => (text, ""),
    }
}

fn split_marker<'a>(text: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    text.find(marker)
        .map(|pos| (&text[..pos], &text[pos + marker.len()..]))
}

fn extract_thought(before: &str) -> String {
    match before.find(THOUGHT) {
        Some(pos) => before[pos + THOUGHT.len()..].trim().to_string(),
        None => before.trim().to_string(),
    }
}

/// Parse the ACTION_INPUT payload. Accepts a bare JSON object, or falls back
/// to the outermost `{...}` span when the model wrapped the object in prose
/// or code fences.
fn parse_action_input(text: &str) -> Result<Value, StepParseError> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Ok(value);
        }
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            let candidate = &trimmed[start..=end];
            return match serde_json::from_str::<Value>(candidate) {
                Ok(value) if value.is_object() => Ok(value),
                Ok(_) => Err(StepParseError::BadActionInput("not an object".to_string())),
                Err(e) => Err(StepParseError::BadActionInput(e.to_string())),
            };
        }
    }

    Err(StepParseError::BadActionInput(
        "no JSON object found".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tool_call() {
        let response = "THOUGHT: I need to calculate this.\n\
                        ACTION: calculator\n\
                        ACTION_INPUT: {\"expression\": \"25 * 8\"}";
        let step = parse_step(response).unwrap();
        assert_eq!(
            step,
            StepOutput::Action {
                thought: "I need to calculate this.".to_string(),
                tool: "calculator".to_string(),
                args: json!({ "expression": "25 * 8" }),
            }
        );
    }

    #[test]
    fn test_parse_final_answer() {
        let response = "THOUGHT: The calculator returned 200.\n\
                        FINAL_ANSWER: 25 * 8 equals 200.";
        let step = parse_step(response).unwrap();
        assert_eq!(
            step,
            StepOutput::Final {
                thought: "The calculator returned 200.".to_string(),
                answer: "25 * 8 equals 200.".to_string(),
            }
        );
    }

    #[test]
    fn test_final_without_thought() {
        let step = parse_step("FINAL_ANSWER: 42").unwrap();
        assert_eq!(
            step,
            StepOutput::Final {
                thought: String::new(),
                answer: "42".to_string(),
            }
        );
    }

    #[test]
    fn test_both_markers_is_ambiguous() {
        let response = "ACTION: calculator\nACTION_INPUT: {}\nFINAL_ANSWER: done";
        assert_eq!(parse_step(response), Err(StepParseError::Ambiguous));
    }

    #[test]
    fn test_action_without_input_rejected() {
        let response = "THOUGHT: hm\nACTION: calculator";
        assert_eq!(parse_step(response), Err(StepParseError::MissingActionInput));
    }

    #[test]
    fn test_action_input_extracted_from_prose() {
        let response = "ACTION: get_weather\nACTION_INPUT: here you go {\"location\": \"London\"} thanks";
        let step = parse_step(response).unwrap();
        match step {
            StepOutput::Action { tool, args, .. } => {
                assert_eq!(tool, "get_weather");
                assert_eq!(args, json!({ "location": "London" }));
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_action_input_not_object_rejected() {
        let response = "ACTION: calculator\nACTION_INPUT: just some words";
        assert!(matches!(
            parse_step(response),
            Err(StepParseError::BadActionInput(_))
        ));
    }

    #[test]
    fn test_free_text_has_no_marker() {
        assert_eq!(
            parse_step("The answer is probably 4."),
            Err(StepParseError::NoMarker)
        );
    }
}
