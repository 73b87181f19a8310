//! Shared types used across Accord modules
//!
//! Contains transcript messages, chat wire messages, tool definitions and
//! verdicts.

use serde::{Deserialize, Serialize};

/// Who produced a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human operator
    User,
    /// One of the negotiating agents
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

/// A structured approve/reject verdict returned by an approving agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub approved: bool,
    #[serde(default)]
    pub rationale: String,
}

impl Decision {
    pub fn approve(rationale: impl Into<String>) -> Self {
        Self {
            approved: true,
            rationale: rationale.into(),
        }
    }

    pub fn reject(rationale: impl Into<String>) -> Self {
        Self {
            approved: false,
            rationale: rationale.into(),
        }
    }
}

/// A message in a negotiation transcript
///
/// `sequence_index` is assigned by the transcript on append; messages built
/// with the constructors below carry a placeholder of 0 until then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub author_name: String,
    pub content: String,
    pub sequence_index: usize,
    /// Structured verdict, when the author submitted one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            author_name: "user".to_string(),
            content: content.into(),
            sequence_index: 0,
            decision: None,
        }
    }

    /// Create a new agent message
    pub fn agent(author_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            author_name: author_name.into(),
            content: content.into(),
            sequence_index: 0,
            decision: None,
        }
    }

    /// Attach a structured verdict
    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Whether this message was written by the named agent
    pub fn is_from(&self, name: &str) -> bool {
        self.role == Role::Agent && self.author_name == name
    }
}

/// A message in the chat format sent to the LLM runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: String,
    /// Content of the message
    pub content: String,
    /// Optional tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    /// Result of a tool call, fed back to the model
    pub fn tool(content: impl Into<String>) -> Self {
        Self::with_role("tool", content)
    }

    /// Assistant message that requested tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls: Some(calls),
        }
    }

    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// A tool call made by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Get a boolean argument by key
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.arguments.get(key).and_then(|v| v.as_bool())
    }

    /// Get an unsigned integer argument by key
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
    }
}

/// Definition of a tool that can be called by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Result of executing a tool
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    /// Output handed back to the model
    pub output: String,
    /// Verdict captured from a `submit_verdict` call
    pub decision: Option<Decision>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: output.into(),
            decision: None,
        }
    }

    /// Create a successful result carrying a verdict
    pub fn verdict(tool_name: impl Into<String>, decision: Decision) -> Self {
        let output = if decision.approved {
            "Verdict recorded: approved".to_string()
        } else {
            "Verdict recorded: rejected".to_string()
        };
        Self {
            tool_name: tool_name.into(),
            success: true,
            output,
            decision: Some(decision),
        }
    }

    /// Create a failed result
    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: error.into(),
            decision: None,
        }
    }
}
