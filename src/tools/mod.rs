//! Tools module - capabilities the negotiating agents can call
//!
//! Retrieval over a local notes corpus, exchange-rate lookup, and the
//! structured verdict tool.

pub mod rates;
pub mod registry;
pub mod retrieval;

pub use rates::RateClient;
pub use registry::ToolRegistry;
pub use retrieval::{CorpusId, CorpusStore, Passage};
