//! Group negotiation loop
//!
//! Alternates turns between exactly two agents over a shared transcript
//! until the evaluator reports approval or the turn budget runs out.
//!
//! # Round
//!
//! 1. The user message is appended.
//! 2. Agents take turns A, B, A, ... Each reply is appended and the
//!    evaluator runs on the updated transcript.
//! 3. The round ends `Approved`, `Exhausted` or `Errored`. Exactly one.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::agent::retry::InvocationPolicy;
use crate::agent::runtime::NegotiatingAgent;
use crate::agent::termination::{TerminationEvaluator, TerminationState};
use crate::agent::transcript::Transcript;
use crate::core::{AccordError, Message, Result};

/// How a round ended
#[derive(Debug)]
pub enum RoundOutcome {
    /// The evaluator saw approval before the cap
    Approved,
    /// `max_turns` invocations happened without approval
    Exhausted,
    /// An agent turn failed; no further turns were taken
    Errored(AccordError),
}

impl RoundOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Errored(_))
    }

    /// Short label for display and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Exhausted => "no agreement reached",
            Self::Errored(_) => "errored",
        }
    }
}

/// Summary of one round
#[derive(Debug)]
pub struct RoundReport {
    pub outcome: RoundOutcome,
    pub state: TerminationState,
    /// Transcript index of this round's user message
    pub first_index: usize,
}

/// Drives turn-taking between two agents
pub struct NegotiationLoop {
    agents: [Arc<dyn NegotiatingAgent>; 2],
    evaluator: Box<dyn TerminationEvaluator>,
    policy: InvocationPolicy,
    max_turns: usize,
    transcript: Transcript,
}

impl NegotiationLoop {
    /// `first` always opens a round; names must differ
    pub fn new(
        first: Arc<dyn NegotiatingAgent>,
        second: Arc<dyn NegotiatingAgent>,
        evaluator: Box<dyn TerminationEvaluator>,
        max_turns: usize,
    ) -> Result<Self> {
        if first.name() == second.name() {
            return Err(AccordError::config(format!(
                "Agent names must be unique, both are '{}'",
                first.name()
            )));
        }
        if max_turns == 0 {
            return Err(AccordError::config("max_turns must be at least 1"));
        }

        Ok(Self {
            agents: [first, second],
            evaluator,
            policy: InvocationPolicy::default(),
            max_turns,
            transcript: Transcript::new(),
        })
    }

    pub fn with_policy(mut self, policy: InvocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Forget all previous rounds
    pub fn reset(&mut self) {
        self.transcript.clear();
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn set_max_turns(&mut self, max_turns: usize) -> Result<()> {
        if max_turns == 0 {
            return Err(AccordError::config("max_turns must be at least 1"));
        }
        self.max_turns = max_turns;
        Ok(())
    }

    pub fn agent_names(&self) -> [&str; 2] {
        [self.agents[0].name(), self.agents[1].name()]
    }

    /// Run one round without observing messages
    pub async fn run(&mut self, user_input: &str) -> RoundReport {
        self.run_with(user_input, |_| {}).await
    }

    /// Run one round, handing every appended message to `on_message`
    pub async fn run_with<F>(&mut self, user_input: &str, mut on_message: F) -> RoundReport
    where
        F: FnMut(&Message),
    {
        let first_index = self.transcript.len();
        on_message(self.transcript.append(Message::user(user_input)));

        let mut state = TerminationState::new(self.max_turns);
        let span = info_span!("round", max_turns = self.max_turns);

        let outcome = async {
            while state.should_continue() {
                let agent = Arc::clone(&self.agents[state.turn_count % 2]);
                debug!(
                    turn = state.turn_count + 1,
                    agent = agent.name(),
                    "Invoking agent"
                );

                let reply = match self.policy.invoke(agent.as_ref(), &self.transcript).await {
                    Ok(reply) if reply.messages.is_empty() => {
                        Err(AccordError::EmptyReply(agent.name().to_string()))
                    }
                    other => other,
                };

                let reply = match reply {
                    Ok(reply) => reply,
                    Err(error) => {
                        warn!(agent = agent.name(), %error, "Round aborted");
                        return RoundOutcome::Errored(error);
                    }
                };

                for message in reply.messages {
                    on_message(self.transcript.append(message));
                }
                state.record_turn();

                if self.evaluator.evaluate(&self.transcript) {
                    state.mark_terminal();
                }
            }

            if state.terminal {
                RoundOutcome::Approved
            } else {
                RoundOutcome::Exhausted
            }
        }
        .instrument(span)
        .await;

        info!(
            outcome = outcome.label(),
            turns = state.turn_count,
            "Round finished"
        );

        RoundReport {
            outcome,
            state,
            first_index,
        }
    }
}
