//! Negotiation session lifecycle
//!
//! A session provisions everything the two agents need, runs any number of
//! rounds on one negotiation loop, and releases what it provisioned on
//! `close`. Dropping an open session releases the same resources.

use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::definition::{self, AgentDefinition, Capability};
use crate::agent::negotiation::{NegotiationLoop, RoundReport};
use crate::agent::retry::InvocationPolicy;
use crate::agent::runtime::LlmAgent;
use crate::agent::termination::{ApprovalEvaluator, PhraseMatcher};
use crate::core::{AccordError, Config, Message, Result};
use crate::llm::LLMProvider;
use crate::tools::{CorpusId, CorpusStore, RateClient, ToolRegistry};

/// Owns the agents, their resources and the negotiation loop
pub struct Session {
    config: Config,
    llm: Arc<dyn LLMProvider>,
    corpora: Arc<CorpusStore>,
    provisioned: Vec<CorpusId>,
    negotiation: NegotiationLoop,
    closed: bool,
}

impl Session {
    /// Open a session with the built-in proposer and approver personas
    pub async fn open(config: Config, llm: Arc<dyn LLMProvider>) -> Result<Self> {
        let proposer = definition::local_insider(&config);
        let approver = definition::travel_expert(&config);
        Self::open_with(config, llm, proposer, approver).await
    }

    /// Open a session with explicit definitions; `proposer` opens every round
    pub async fn open_with(
        config: Config,
        llm: Arc<dyn LLMProvider>,
        proposer: AgentDefinition,
        approver: AgentDefinition,
    ) -> Result<Self> {
        config.validate()?;

        let corpora = Arc::new(CorpusStore::new());
        let mut provisioned = Vec::new();

        let built = Self::build_agents(
            &config,
            &llm,
            &corpora,
            &mut provisioned,
            proposer,
            approver,
        )
        .await;

        let negotiation = match built {
            Ok(negotiation) => negotiation,
            Err(e) => {
                // Nothing owns these yet
                for id in &provisioned {
                    let _ = corpora.delete(id);
                }
                return Err(e);
            }
        };

        let [first, second] = negotiation.agent_names();
        info!(proposer = first, approver = second, "Session opened");

        Ok(Self {
            config,
            llm,
            corpora,
            provisioned,
            negotiation,
            closed: false,
        })
    }

    async fn build_agents(
        config: &Config,
        llm: &Arc<dyn LLMProvider>,
        corpora: &Arc<CorpusStore>,
        provisioned: &mut Vec<CorpusId>,
        proposer: AgentDefinition,
        approver: AgentDefinition,
    ) -> Result<NegotiationLoop> {
        let mut matcher = PhraseMatcher::new(&config.negotiation.approval_phrase);
        if let Some(rejection) = &config.negotiation.rejection_phrase {
            matcher = matcher.with_rejection(rejection);
        }
        let mut evaluator = ApprovalEvaluator::new(matcher);
        if config.negotiation.approver_only {
            evaluator = evaluator.restricted_to(approver.name.clone());
        }

        let proposer_tools = Self::tools_for(config, corpora, provisioned, &proposer).await?;
        let approver_tools = Self::tools_for(config, corpora, provisioned, &approver).await?;
        let max_tool_rounds = config.negotiation.max_tool_rounds;

        let negotiation = NegotiationLoop::new(
            Arc::new(LlmAgent::new(
                proposer,
                Arc::clone(llm),
                proposer_tools,
                max_tool_rounds,
            )),
            Arc::new(LlmAgent::new(
                approver,
                Arc::clone(llm),
                approver_tools,
                max_tool_rounds,
            )),
            Box::new(evaluator),
            config.negotiation.max_turns,
        )?
        .with_policy(InvocationPolicy::from_config(&config.negotiation));

        Ok(negotiation)
    }

    /// Provision and register the tools a definition's capabilities grant
    async fn tools_for(
        config: &Config,
        corpora: &Arc<CorpusStore>,
        provisioned: &mut Vec<CorpusId>,
        definition: &AgentDefinition,
    ) -> Result<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for capability in &definition.capabilities {
            registry = match capability {
                Capability::Retrieval { dir } => {
                    let id = corpora.provision(dir).await?;
                    provisioned.push(id.clone());
                    registry.with_retrieval(Arc::clone(corpora), id, config.corpus.max_results)
                }
                Capability::RateLookup => {
                    registry.with_rates(RateClient::from_config(&config.rates)?)
                }
                Capability::Verdict => registry.with_verdict(),
            };
        }
        Ok(registry)
    }

    /// Check the runtime is reachable and serves both agents' models
    pub async fn verify_models(&self) -> Result<()> {
        if self.llm.list_models().await.is_err() {
            return Err(AccordError::OllamaNotReachable(
                self.config.ollama_url(),
                self.config.models.proposer.clone(),
                self.config.models.approver.clone(),
            ));
        }
        for model in [&self.config.models.proposer, &self.config.models.approver] {
            if !self.llm.is_model_available(model).await? {
                return Err(AccordError::ModelNotFound(model.clone()));
            }
        }
        Ok(())
    }

    /// Models the runtime can serve
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.llm.list_models().await
    }

    /// Run one round, reporting each message as it is appended
    pub async fn round<F>(&mut self, user_input: &str, on_message: F) -> RoundReport
    where
        F: FnMut(&Message),
    {
        self.negotiation.run_with(user_input, on_message).await
    }

    /// Clear the shared transcript
    pub fn reset(&mut self) {
        self.negotiation.reset();
    }

    pub fn negotiation(&self) -> &NegotiationLoop {
        &self.negotiation
    }

    pub fn set_max_turns(&mut self, max_turns: usize) -> Result<()> {
        self.negotiation.set_max_turns(max_turns)?;
        self.config.negotiation.max_turns = max_turns;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.llm.name()
    }

    /// Corpora this session still holds
    pub fn provisioned(&self) -> &[CorpusId] {
        &self.provisioned
    }

    fn release(&mut self) -> Result<()> {
        self.negotiation.reset();
        let mut first_error = None;
        for id in self.provisioned.drain(..) {
            if let Err(e) = self.corpora.delete(&id) {
                warn!(corpus = %id, error = %e, "Failed to release corpus");
                first_error.get_or_insert(e);
            }
        }
        self.closed = true;
        first_error.map_or(Ok(()), Err)
    }

    /// Tear down the session, releasing every provisioned resource
    pub fn close(mut self) -> Result<()> {
        let result = self.release();
        info!("Session closed");
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Session dropped without close; releasing resources");
            let _ = self.release();
        }
    }
}
