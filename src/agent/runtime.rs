//! Agent invocation boundary
//!
//! The negotiation loop sees agents only through `NegotiatingAgent`.
//! `LlmAgent` is the shipped implementation: one definition, one provider,
//! and a bounded tool-calling loop per turn.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agent::definition::AgentDefinition;
use crate::agent::transcript::Transcript;
use crate::core::{AccordError, ChatMessage, Decision, Message, Result};
use crate::llm::{GenerateOptions, LLMProvider};
use crate::tools::ToolRegistry;

/// What one agent turn produced
#[derive(Debug, Clone)]
pub struct AgentReply {
    /// Messages to append, in order; a turn must produce at least one
    pub messages: Vec<Message>,
}

impl AgentReply {
    pub fn single(message: Message) -> Self {
        Self {
            messages: vec![message],
        }
    }
}

/// A participant in the negotiation
#[async_trait]
pub trait NegotiatingAgent: Send + Sync {
    /// Unique name within the loop
    fn name(&self) -> &str;

    /// Take one turn given the full transcript
    async fn invoke(&self, transcript: &Transcript) -> Result<AgentReply>;
}

/// An agent backed by an LLM provider and a tool registry
pub struct LlmAgent {
    definition: AgentDefinition,
    llm: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    max_tool_rounds: usize,
}

impl LlmAgent {
    pub fn new(
        definition: AgentDefinition,
        llm: Arc<dyn LLMProvider>,
        tools: ToolRegistry,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            definition,
            llm,
            tools,
            max_tool_rounds,
        }
    }

    fn options() -> GenerateOptions {
        GenerateOptions {
            temperature: Some(0.3),
            ..Default::default()
        }
    }
}

#[async_trait]
impl NegotiatingAgent for LlmAgent {
    fn name(&self) -> &str {
        &self.definition.name
    }

    async fn invoke(&self, transcript: &Transcript) -> Result<AgentReply> {
        let name = self.definition.name.as_str();
        let mut messages = transcript.to_chat(&self.definition.instructions, name);
        let definitions = self.tools.definitions();
        let mut decision: Option<Decision> = None;

        // Tool rounds plus one final answer
        for round in 0..=self.max_tool_rounds {
            let response = self
                .llm
                .chat_with_tools(
                    &self.definition.model,
                    &messages,
                    &definitions,
                    Some(Self::options()),
                )
                .await
                .map_err(|e| match e {
                    AccordError::Ollama(msg) => AccordError::invocation(name, msg),
                    other => other,
                })?;

            if response.tool_calls.is_empty() || round == self.max_tool_rounds {
                if !response.tool_calls.is_empty() {
                    warn!(agent = name, "Tool round limit reached; ignoring further calls");
                }

                let mut content = response.content.trim().to_string();
                if content.is_empty() {
                    match &decision {
                        // A bare verdict call is still a usable turn
                        Some(d) if !d.rationale.is_empty() => content = d.rationale.clone(),
                        _ => return Err(AccordError::EmptyReply(name.to_string())),
                    }
                }

                let mut message = Message::agent(name, content);
                if let Some(decision) = decision {
                    message = message.with_decision(decision);
                }
                return Ok(AgentReply::single(message));
            }

            debug!(
                agent = name,
                round,
                calls = response.tool_calls.len(),
                "Agent requested tools"
            );

            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let result = self.tools.execute(call).await?;
                if let Some(d) = result.decision {
                    decision = Some(d);
                }
                if !result.success {
                    warn!(agent = name, tool = %result.tool_name, error = %result.output, "Tool failed");
                }
                messages.push(ChatMessage::tool(result.output));
            }
        }

        // The loop always returns on its final iteration
        Err(AccordError::EmptyReply(name.to_string()))
    }
}
