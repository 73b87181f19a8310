//! Agent definitions and built-in personas
//!
//! A definition is static configuration: name, model, instructions and the
//! capabilities the agent may use. It has no behavior of its own.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::Config;

/// What an agent is allowed to call during its turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Capability {
    /// Search over a corpus provisioned from this directory
    Retrieval { dir: PathBuf },
    /// Exchange rate lookup
    RateLookup,
    /// Structured approve/reject verdict tool
    Verdict,
}

/// Static configuration of one negotiating agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique within a negotiation loop
    pub name: String,
    pub model: String,
    pub instructions: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl AgentDefinition {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            instructions: instructions.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

pub const LOCAL_INSIDER_NAME: &str = "LocalInsider";
pub const TRAVEL_EXPERT_NAME: &str = "TravelExpert";

const LOCAL_INSIDER_INSTRUCTIONS: &str = r#"You are a Local Insider in Madrid.
Suggest an itinerary for a whole day in Madrid, with a time and a price in euros for each activity.
Your goal is to get the approval of the Travel Expert.
Start with the most expensive activities. Each time the Travel Expert declines, swap one high cost activity for a cheaper one.
Do not ask questions, do not give the total cost, and do not convert currencies. Just suggest the itinerary."#;

const LOCAL_INSIDER_RETRIEVAL_HINT: &str =
    "\nUse the file_search tool to draw activities and prices from your diary notes.";

const TRAVEL_EXPERT_INSTRUCTIONS: &str = r#"You are a travel expert.
You receive an itinerary from the Local Insider and add up its total cost in euros.
Use the get_convert tool with base "EUR", find the "NZD" rate and convert the total to NZD.
If the converted amount is under 50 NZD, say exactly the words "itinerary approved".
If it is over 50 NZD, say "it's not approved" and ask the Local Insider for a cheaper itinerary.
Do not ask questions and do not mention the budget."#;

const TRAVEL_EXPERT_VERDICT_HINT: &str =
    "\nAfter deciding, call submit_verdict with approved set to your decision and a one-sentence rationale.";

/// The proposing persona, with retrieval when a corpus dir is configured
pub fn local_insider(config: &Config) -> AgentDefinition {
    let mut instructions = config
        .agents
        .proposer_instructions
        .clone()
        .unwrap_or_else(|| LOCAL_INSIDER_INSTRUCTIONS.to_string());

    let name = config
        .agents
        .proposer_name
        .clone()
        .unwrap_or_else(|| LOCAL_INSIDER_NAME.to_string());

    match &config.corpus.dir {
        Some(dir) => {
            if config.agents.proposer_instructions.is_none() {
                instructions.push_str(LOCAL_INSIDER_RETRIEVAL_HINT);
            }
            AgentDefinition::new(name, &config.models.proposer, instructions)
                .with_capability(Capability::Retrieval { dir: dir.clone() })
        }
        None => AgentDefinition::new(name, &config.models.proposer, instructions),
    }
}

/// The approving persona, with rate lookup and the verdict tool per config
pub fn travel_expert(config: &Config) -> AgentDefinition {
    let mut instructions = config
        .agents
        .approver_instructions
        .clone()
        .unwrap_or_else(|| TRAVEL_EXPERT_INSTRUCTIONS.to_string());

    let name = config
        .agents
        .approver_name
        .clone()
        .unwrap_or_else(|| TRAVEL_EXPERT_NAME.to_string());

    let mut definition = AgentDefinition::new(name, &config.models.approver, "");
    if config.rates.enabled {
        definition = definition.with_capability(Capability::RateLookup);
    }
    if config.negotiation.structured_verdict {
        if config.agents.approver_instructions.is_none() {
            instructions.push_str(TRAVEL_EXPERT_VERDICT_HINT);
        }
        definition = definition.with_capability(Capability::Verdict);
    }
    definition.instructions = instructions;
    definition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_capability_deduplicates() {
        let def = AgentDefinition::new("A", "m", "i")
            .with_capability(Capability::Verdict)
            .with_capability(Capability::Verdict);
        assert_eq!(def.capabilities.len(), 1);
    }

    #[test]
    fn test_local_insider_without_corpus_has_no_tools() {
        let mut config = Config::default();
        config.corpus.dir = None;
        let def = local_insider(&config);
        assert_eq!(def.name, LOCAL_INSIDER_NAME);
        assert!(def.capabilities.is_empty());
        assert!(!def.instructions.contains("file_search"));
    }

    #[test]
    fn test_local_insider_with_corpus_gets_retrieval() {
        let mut config = Config::default();
        config.corpus.dir = Some(PathBuf::from("/tmp/diaries"));
        let def = local_insider(&config);
        assert!(def.has_capability(&Capability::Retrieval {
            dir: PathBuf::from("/tmp/diaries")
        }));
        assert!(def.instructions.contains("file_search"));
    }

    #[test]
    fn test_travel_expert_capabilities_follow_config() {
        let mut config = Config::default();
        config.rates.enabled = true;
        config.negotiation.structured_verdict = true;
        let def = travel_expert(&config);
        assert!(def.has_capability(&Capability::RateLookup));
        assert!(def.has_capability(&Capability::Verdict));
        assert!(def.instructions.contains("submit_verdict"));

        config.rates.enabled = false;
        config.negotiation.structured_verdict = false;
        let def = travel_expert(&config);
        assert!(def.capabilities.is_empty());
    }

    #[test]
    fn test_persona_overrides() {
        let mut config = Config::default();
        config.agents.approver_name = Some("Accountant".to_string());
        config.agents.approver_instructions = Some("Approve everything.".to_string());
        let def = travel_expert(&config);
        assert_eq!(def.name, "Accountant");
        assert_eq!(def.instructions, "Approve everything.");
    }
}
