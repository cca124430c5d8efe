//! Tool framework for the agent.
//!
//! Tools declare a name, a human description, and a JSON-schema parameter
//! object; execution always yields a result string. Failures (unknown tool,
//! bad arguments, evaluator errors) are encoded as JSON error payloads in
//! that string so the agent loop can read them and react — tool execution
//! never aborts the loop.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::calc::evaluate;

/// An invocable agent capability.
pub trait Tool: Send + Sync {
    /// Tool name the LLM selects with.
    fn name(&self) -> &str;

    /// Human-readable description included in the agent's system prompt.
    fn description(&self) -> &str;

    /// JSON-schema object describing the accepted parameters.
    fn parameters(&self) -> Value;

    /// Execute with the given arguments, returning the observation string.
    fn execute(&self, args: &Value) -> String;
}

/// A shared tool handle.
pub type SharedTool = Arc<dyn Tool>;

/// Static registry of tools, populated at startup.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, SharedTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in tool set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CalculatorTool);
        registry.register(CurrentTimeTool);
        registry.register(WeatherTool);
        registry.register(KnowledgeSearchTool);
        registry
    }

    /// Register a tool. A tool re-registered under an existing name replaces
    /// the previous one.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedTool> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Descriptor objects for every tool (name, description, parameters).
    pub fn descriptors(&self) -> Vec<Value> {
        self.iter()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters(),
                })
            })
            .collect()
    }

    /// Execute a tool by name. Unknown names come back as an error payload
    /// string, never a panic or an Err.
    pub fn execute(&self, name: &str, args: &Value) -> String {
        match self.tools.get(name) {
            Some(tool) => {
                tracing::debug!(tool = name, ?args, "Executing tool");
                tool.execute(args)
            }
            None => json!({ "error": format!("Unknown tool: {name}") }).to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calculator
// ─────────────────────────────────────────────────────────────────────────────

/// Arithmetic evaluator over a whitelisted expression grammar.
pub struct CalculatorTool;

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform mathematical calculations. Input should be a mathematical expression as a string."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Mathematical expression to evaluate (e.g., '2 + 2', '15 * 8', 'sqrt(16)')"
                }
            },
            "required": ["expression"]
        })
    }

    fn execute(&self, args: &Value) -> String {
        let Some(expression) = args.get("expression").and_then(Value::as_str) else {
            return json!({ "error": "missing required parameter 'expression'" }).to_string();
        };

        match evaluate(expression) {
            Ok(result) => json!({
                "result": result,
                "expression": expression,
                "message": format!("The result of {expression} is {result}"),
            })
            .to_string(),
            Err(e) => json!({
                "error": e.to_string(),
                "expression": expression,
                "message": format!("Failed to evaluate: {e}"),
            })
            .to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Current Time
// ─────────────────────────────────────────────────────────────────────────────

/// Wall-clock readout.
pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time. No parameters needed."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn execute(&self, _args: &Value) -> String {
        let now = chrono::Local::now();
        json!({
            "datetime": now.to_rfc3339(),
            "date": now.format("%Y-%m-%d").to_string(),
            "time": now.format("%H:%M:%S").to_string(),
            "day": now.format("%A").to_string(),
            "message": format!(
                "Current time is {} on {}",
                now.format("%H:%M:%S"),
                now.format("%A, %B %d, %Y")
            ),
        })
        .to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Weather (mock)
// ─────────────────────────────────────────────────────────────────────────────

/// Demonstration tool returning canned weather data.
pub struct WeatherTool;

impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get weather information for a city. This is a mock tool for demonstration."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "Name of the city to get weather for"
                }
            },
            "required": ["location"]
        })
    }

    fn execute(&self, args: &Value) -> String {
        let location = args
            .get("location")
            .or_else(|| args.get("city"))
            .and_then(Value::as_str)
            .unwrap_or("");
        if location.is_empty() {
            return json!({ "error": "missing required parameter 'location'" }).to_string();
        }

        let (temp, condition, humidity) = match location.to_lowercase().as_str() {
            "mumbai" => (28, "Partly Cloudy", 75),
            "delhi" => (22, "Clear Sky", 45),
            "bangalore" => (25, "Pleasant", 60),
            "london" => (12, "Rainy", 85),
            "new york" => (15, "Sunny", 50),
            _ => (25, "Unknown", 50),
        };

        json!({
            "city": location,
            "temperature": temp,
            "condition": condition,
            "humidity": humidity,
            "mock": true,
            "message": format!(
                "Weather in {location}: {temp}°C, {condition}, Humidity: {humidity}% (mock data)"
            ),
        })
        .to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge Search (mock)
// ─────────────────────────────────────────────────────────────────────────────

/// Demonstration tool over a tiny canned fact table.
pub struct KnowledgeSearchTool;

const KNOWLEDGE: [(&str, &str); 5] = [
    (
        "python",
        "Python is a high-level, interpreted programming language known for its simplicity and readability. Created by Guido van Rossum in 1991.",
    ),
    (
        "machine learning",
        "Machine Learning is a subset of AI that enables systems to learn and improve from experience without being explicitly programmed.",
    ),
    (
        "agents",
        "AI Agents are autonomous systems that can perceive their environment, make decisions, and take actions to achieve specific goals. They use tools and reasoning.",
    ),
    (
        "rust",
        "Rust is a systems programming language focused on safety and performance, with memory safety guaranteed at compile time.",
    ),
    (
        "ollama",
        "Ollama is a tool for running large language models locally on your machine. It supports various models like Llama, Gemma, and Phi.",
    ),
];

impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        "search_knowledge"
    }

    fn description(&self) -> &str {
        "Search for information in a knowledge base. Returns relevant facts. Mock data for demonstration."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query to find information"
                }
            },
            "required": ["query"]
        })
    }

    fn execute(&self, args: &Value) -> String {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return json!({ "error": "missing required parameter 'query'" }).to_string();
        };

        let query_lower = query.to_lowercase();
        for (topic, fact) in KNOWLEDGE {
            if query_lower.contains(topic) {
                return json!({
                    "query": query,
                    "result": fact,
                    "source": "knowledge_base",
                    "mock": true,
                    "message": format!("Found information about {topic}"),
                })
                .to_string();
            }
        }

        json!({
            "query": query,
            "result": "No specific information found in knowledge base.",
            "mock": true,
            "message": "Information not available",
        })
        .to_string()
    }
}
