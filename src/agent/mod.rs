//! Agent module - negotiation between two agents
//!
//! Contains agent definitions, the invocation boundary, the termination
//! evaluator, the negotiation loop and the session that owns them.

pub mod definition;
pub mod negotiation;
pub mod retry;
pub mod runtime;
pub mod session;
pub mod termination;
pub mod transcript;

pub use definition::{AgentDefinition, Capability};
pub use negotiation::{NegotiationLoop, RoundOutcome, RoundReport};
pub use retry::InvocationPolicy;
pub use runtime::{AgentReply, LlmAgent, NegotiatingAgent};
pub use session::Session;
pub use termination::{ApprovalEvaluator, PhraseMatcher, TerminationEvaluator, TerminationState};
pub use transcript::Transcript;
