//! ReAct agent: a loop that lets the LLM choose tool invocations before
//! producing a final answer.
//!
//! The [`ToolRegistry`] holds statically registered tools (calculator,
//! clock, and two mock lookups); the [`Agent`] drives the Reason-Act
//! iteration with a bounded step budget and a structured [`TraceStep`]
//! record of every step. The calculator's expression evaluator is a
//! dedicated whitelist parser — arbitrary code never gets evaluated.

pub mod agent;
pub mod calc;
pub mod error;
pub mod guardrails;
pub mod parser;
pub mod tools;

pub use agent::{Agent, AgentOutcome, TraceStep};
pub use calc::{CalcError, evaluate};
pub use error::{AgentError, Result};
pub use guardrails::{BLOCKED_MESSAGE, check_guardrails};
pub use parser::{StepOutput, StepParseError, parse_step};
pub use tools::{
    CalculatorTool, CurrentTimeTool, KnowledgeSearchTool, SharedTool, Tool, ToolRegistry,
    WeatherTool,
};
