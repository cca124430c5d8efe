//! ReAct agent loop.
//!
//! Each `run` alternates between asking the LLM for the next step and
//! executing the tool it selected, recording a structured trace, until the
//! model emits a final answer or the step budget runs out.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use lectern_llm::{GenerationOptions, SharedLlm};

use crate::error::{AgentError, Result};
use crate::parser::{StepOutput, parse_step};
use crate::tools::ToolRegistry;

/// One recorded step of an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceStep {
    /// The model invoked a tool.
    ToolCall {
        /// Reasoning the model gave for the call.
        thought: String,
        /// Tool name.
        tool: String,
        /// Arguments passed to the tool.
        input: Value,
        /// Observation string the tool returned.
        result: String,
    },
    /// The model produced its final answer.
    Final {
        /// The answer content.
        content: String,
    },
    /// A step could not be parsed.
    Error {
        /// What went wrong.
        message: String,
    },
}

/// Result of one agent run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    /// The final answer text.
    pub answer: String,
    /// Ordered trace of every step taken.
    pub trace: Vec<TraceStep>,
    /// Names of tools invoked, unique, in first-use order.
    pub tools_used: Vec<String>,
    /// Number of LLM calls made. Always between 1 and `max_steps`.
    pub iterations: u32,
    /// Whether the run hit the step budget without a natural final answer.
    pub capped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    role: Role,
    content: String,
}

/// Answer returned when the step budget is exhausted with nothing to show.
const CAPPED_FALLBACK: &str =
    "I wasn't able to complete the task within the allowed steps. Please try rephrasing your question.";

/// A ReAct agent over a tool registry.
///
/// Conversation history persists across `run` calls until [`Agent::reset`].
/// Runs on the same agent are serialized internally; the history is only
/// ever mutated under that lock.
pub struct Agent {
    llm: SharedLlm,
    model: String,
    tools: ToolRegistry,
    max_steps: u32,
    history: Mutex<Vec<HistoryEntry>>,
}

impl Agent {
    /// Create an agent. A `max_steps` of zero is bumped to one so every run
    /// makes at least one LLM call.
    pub fn new(llm: SharedLlm, model: impl Into<String>, tools: ToolRegistry, max_steps: u32) -> Self {
        Self {
            llm,
            model: model.into(),
            tools,
            max_steps: max_steps.max(1),
            history: Mutex::new(Vec::new()),
        }
    }

    /// The generation model this agent reasons with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The configured step budget.
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Tool descriptors for the info/tools endpoints.
    pub fn tool_descriptors(&self) -> Vec<Value> {
        self.tools.descriptors()
    }

    /// Agent metadata for the info endpoint.
    pub fn info(&self) -> Value {
        json!({
            "name": "agent1",
            "description": "ReAct agent with tool use and conversation memory",
            "model": self.model,
            "capabilities": [
                "Tool use",
                "Reasoning (ReAct pattern)",
                "Multi-step planning",
                "Conversation memory",
            ],
            "tools": self.tools.descriptors(),
            "max_iterations": self.max_steps,
        })
    }

    /// Clear the conversation history.
    pub async fn reset(&self) {
        self.history.lock().await.clear();
        tracing::info!("Agent conversation history cleared");
    }

    /// Run the Reason-Act loop for one user message.
    pub async fn run(&self, user_message: &str) -> Result<AgentOutcome> {
        let user_message = user_message.trim();
        if user_message.is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        // Holding the lock for the whole run serializes concurrent callers.
        let mut history = self.history.lock().await;
        history.push(HistoryEntry {
            role: Role::User,
            content: user_message.to_string(),
        });

        let mut trace: Vec<TraceStep> = Vec::new();
        let mut tools_used: Vec<String> = Vec::new();
        let mut last_response = String::new();
        let mut retried_parse = false;

        for iteration in 1..=self.max_steps {
            let prompt = self.build_prompt(&history);

            tracing::debug!(iteration, max_steps = self.max_steps, "Agent iteration");

            let response = self
                .llm
                .generate(&self.model, &prompt, GenerationOptions::deterministic())
                .await?;
            let response = response.trim().to_string();
            last_response = response.clone();

            match parse_step(&response) {
                Ok(StepOutput::Final { answer, .. }) => {
                    trace.push(TraceStep::Final {
                        content: answer.clone(),
                    });
                    history.push(HistoryEntry {
                        role: Role::Assistant,
                        content: answer.clone(),
                    });
                    return Ok(AgentOutcome {
                        answer,
                        trace,
                        tools_used,
                        iterations: iteration,
                        capped: false,
                    });
                }
                Ok(StepOutput::Action {
                    thought,
                    tool,
                    args,
                }) => {
                    let result = self.tools.execute(&tool, &args);

                    tracing::info!(tool = %tool, "Agent tool call");

                    if !tools_used.contains(&tool) {
                        tools_used.push(tool.clone());
                    }
                    history.push(HistoryEntry {
                        role: Role::Assistant,
                        content: format!("ACTION: {tool}\nACTION_INPUT: {args}"),
                    });
                    history.push(HistoryEntry {
                        role: Role::Tool,
                        content: format!("TOOL_RESULT: {result}"),
                    });
                    trace.push(TraceStep::ToolCall {
                        thought,
                        tool,
                        input: args,
                        result,
                    });
                }
                Err(parse_err) => {
                    trace.push(TraceStep::Error {
                        message: parse_err.to_string(),
                    });

                    if !retried_parse {
                        // One clarifying retry, then give up deterministically.
                        retried_parse = true;
                        history.push(HistoryEntry {
                            role: Role::Assistant,
                            content: response.clone(),
                        });
                        history.push(HistoryEntry {
                            role: Role::Tool,
                            content: format!(
                                "FORMAT_ERROR: {parse_err}. Respond with either \
                                 ACTION/ACTION_INPUT or FINAL_ANSWER, exactly as specified."
                            ),
                        });
                    } else {
                        trace.push(TraceStep::Final {
                            content: response.clone(),
                        });
                        history.push(HistoryEntry {
                            role: Role::Assistant,
                            content: response.clone(),
                        });
                        return Ok(AgentOutcome {
                            answer: response,
                            trace,
                            tools_used,
                            iterations: iteration,
                            capped: false,
                        });
                    }
                }
            }
        }

        // Step budget exhausted without a natural final answer.
        let answer = if last_response.is_empty() {
            CAPPED_FALLBACK.to_string()
        } else {
            last_response
        };
        trace.push(TraceStep::Final {
            content: answer.clone(),
        });
        history.push(HistoryEntry {
            role: Role::Assistant,
            content: answer.clone(),
        });

        tracing::warn!(max_steps = self.max_steps, "Agent run hit the step budget");

        Ok(AgentOutcome {
            answer,
            trace,
            tools_used,
            iterations: self.max_steps,
            capped: true,
        })
    }

    fn build_prompt(&self, history: &[HistoryEntry]) -> String {
        let mut prompt = self.system_prompt();
        prompt.push_str("\n\n");

        for entry in history {
            match entry.role {
                Role::User => {
                    prompt.push_str("User: ");
                    prompt.push_str(&entry.content);
                }
                Role::Assistant => {
                    prompt.push_str("Assistant: ");
                    prompt.push_str(&entry.content);
                }
                Role::Tool => prompt.push_str(&entry.content),
            }
            prompt.push_str("\n\n");
        }

        prompt.push_str("Assistant: ");
        prompt
    }

    fn system_prompt(&self) -> String {
        let tool_list = if self.tools.is_empty() {
            "(no tools are available; answer directly with FINAL_ANSWER)".to_string()
        } else {
            self.tools
                .iter()
                .map(|tool| {
                    format!(
                        "- {}: {}\n  parameters: {}",
                        tool.name(),
                        tool.description(),
                        tool.parameters()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are a helpful AI agent with access to tools. You can use tools to help answer questions.

Available Tools:
{tool_list}

When you need to use a tool, respond in this EXACT format:
THOUGHT: [Explain your reasoning about what you need to do]
ACTION: [tool_name]
ACTION_INPUT: {{"parameter": "value"}}

When you have the final answer, respond in this format:
THOUGHT: [Explain your final reasoning]
FINAL_ANSWER: [Your complete answer to the user]

Important Rules:
1. ALWAYS start with THOUGHT to explain your reasoning
2. Use ACTION when you need a tool
3. Use FINAL_ANSWER when you're done
4. Never use ACTION and FINAL_ANSWER in the same response
5. If a tool gives an error, try a different approach

Example:
User: What is 25 + 17?
THOUGHT: I need to calculate 25 + 17, I'll use the calculator tool.
ACTION: calculator
ACTION_INPUT: {{"expression": "25 + 17"}}

[After getting tool result]
THOUGHT: The calculator returned 42. This is the answer.
FINAL_ANSWER: 25 + 17 equals 42."#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_llm::MockLlm;
    use std::sync::Arc;

    fn agent_with_script(responses: Vec<&str>, max_steps: u32) -> Agent {
        let mock = MockLlm::with_script(responses.into_iter().map(String::from).collect());
        Agent::new(
            Arc::new(mock),
            "test-model",
            ToolRegistry::with_defaults(),
            max_steps,
        )
    }

    #[tokio::test]
    async fn test_direct_final_answer() {
        let agent = agent_with_script(vec!["THOUGHT: easy\nFINAL_ANSWER: Paris."], 5);
        let outcome = agent.run("What is the capital of France?").await.unwrap();

        assert_eq!(outcome.answer, "Paris.");
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.capped);
        assert!(outcome.tools_used.is_empty());
        assert!(matches!(outcome.trace.as_slice(), [TraceStep::Final { .. }]));
    }

    #[tokio::test]
    async fn test_calculator_tool_flow() {
        let agent = agent_with_script(
            vec![
                "THOUGHT: I should calculate.\nACTION: calculator\nACTION_INPUT: {\"expression\": \"25 * 8\"}",
                "THOUGHT: Got it.\nFINAL_ANSWER: 25 * 8 equals 200.",
            ],
            5,
        );

        let outcome = agent.run("What is 25 * 8?").await.unwrap();

        assert!(outcome.answer.contains("200"));
        assert_eq!(outcome.tools_used, vec!["calculator"]);
        assert_eq!(outcome.iterations, 2);
        assert!(outcome.iterations <= 5);

        match &outcome.trace[0] {
            TraceStep::ToolCall {
                tool,
                input,
                result,
                ..
            } => {
                assert_eq!(tool, "calculator");
                assert_eq!(input["expression"], "25 * 8");
                assert!(result.contains("200"));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_step_cap_synthesizes_final() {
        // Every response asks for another tool call; the budget must stop it.
        let looping =
            "THOUGHT: again\nACTION: get_current_time\nACTION_INPUT: {}";
        let agent = agent_with_script(vec![looping, looping, looping], 2);

        let outcome = agent.run("loop forever").await.unwrap();

        assert_eq!(outcome.iterations, 2);
        assert!(outcome.capped);
        assert!(matches!(
            outcome.trace.last(),
            Some(TraceStep::Final { .. })
        ));
    }

    #[tokio::test]
    async fn test_unparseable_retries_once_then_best_effort() {
        let agent = agent_with_script(vec!["I will not follow formats", "still freeform"], 5);

        let outcome = agent.run("hello").await.unwrap();

        // Two LLM calls: the original and one retry; then the raw text wins.
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.answer, "still freeform");
        assert!(!outcome.capped);
        let errors = outcome
            .trace
            .iter()
            .filter(|s| matches!(s, TraceStep::Error { .. }))
            .count();
        assert_eq!(errors, 2);
    }

    #[tokio::test]
    async fn test_no_tools_still_finishes() {
        let mock = MockLlm::with_text("THOUGHT: no tools needed\nFINAL_ANSWER: done");
        let agent = Agent::new(Arc::new(mock), "test-model", ToolRegistry::new(), 5);

        let outcome = agent.run("anything").await.unwrap();
        assert_eq!(outcome.answer, "done");
        assert!(outcome.tools_used.is_empty());
        assert!(outcome
            .trace
            .iter()
            .all(|s| !matches!(s, TraceStep::ToolCall { .. })));
    }

    #[tokio::test]
    async fn test_history_persists_until_reset() {
        let agent = agent_with_script(
            vec![
                "FINAL_ANSWER: first",
                "FINAL_ANSWER: second",
            ],
            5,
        );

        agent.run("one").await.unwrap();
        agent.run("two").await.unwrap();
        assert_eq!(agent.history.lock().await.len(), 4);

        agent.reset().await;
        assert!(agent.history.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let agent = agent_with_script(vec!["FINAL_ANSWER: hi"], 5);
        assert!(matches!(
            agent.run("   ").await,
            Err(AgentError::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool_error_feeds_back_into_loop() {
        let agent = agent_with_script(
            vec![
                "ACTION: teleport\nACTION_INPUT: {}",
                "THOUGHT: that tool doesn't exist\nFINAL_ANSWER: I cannot do that.",
            ],
            5,
        );

        let outcome = agent.run("teleport me").await.unwrap();
        assert_eq!(outcome.answer, "I cannot do that.");
        match &outcome.trace[0] {
            TraceStep::ToolCall { result, .. } => assert!(result.contains("Unknown tool")),
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prompt_contains_tool_schemas_and_history() {
        let mock = Arc::new(MockLlm::with_text("FINAL_ANSWER: ok"));
        let agent = Agent::new(
            mock.clone(),
            "test-model",
            ToolRegistry::with_defaults(),
            5,
        );

        agent.run("What time is it?").await.unwrap();

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("calculator"));
        assert!(prompts[0].contains("ACTION_INPUT"));
        assert!(prompts[0].contains("User: What time is it?"));
        assert!(prompts[0].ends_with("Assistant: "));
    }
}
