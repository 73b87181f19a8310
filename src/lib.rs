//! Accord - two-agent negotiation over local LLMs
//!
//! A proposer and an approver take turns on a shared transcript until the
//! approver signs off or the turn budget runs out. The bundled personas
//! negotiate a day in Madrid: a local insider proposes an itinerary priced
//! in euros and a travel expert converts the total to NZD and approves or
//! rejects it.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction with an Ollama implementation
//! - **Tools**: Corpus search, exchange rates, structured verdicts
//! - **Agent**: Definitions, negotiation loop, termination, session lifecycle
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use accord::{Config, Session};
//! use accord::llm::OllamaClient;
//!
//! #[tokio::main]
//! async fn main() -> accord::Result<()> {
//!     let config = Config::load();
//!     let llm = Arc::new(OllamaClient::from_config(&config)?);
//!     let mut session = Session::open(config, llm).await?;
//!
//!     let report = session
//!         .round("A day in Madrid, 100 NZD", |m| println!("{}: {}", m.author_name, m.content))
//!         .await;
//!     println!("{}", report.outcome.label());
//!
//!     session.close()
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{NegotiationLoop, RoundOutcome, Session};
pub use cli::Repl;
pub use core::{AccordError, Config, Result};
