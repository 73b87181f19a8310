//! Custom error types for Accord
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Accord operations
#[derive(Error, Debug)]
pub enum AccordError {
    /// Ollama connection or API errors
    #[error("Ollama error: {0}")]
    Ollama(String),

    /// Ollama server could not be reached at startup
    #[error("Cannot reach Ollama at {0}. Start it with `ollama serve` and pull '{1}' and '{2}'")]
    OllamaNotReachable(String, String, String),

    /// An agent turn failed inside the runtime
    #[error("Agent '{agent}' failed: {message}")]
    Invocation { agent: String, message: String },

    /// An agent turn ran past the per-invocation deadline
    #[error("Agent '{agent}' timed out after {secs}s")]
    Timeout { agent: String, secs: u64 },

    /// An agent turn produced no messages
    #[error("Agent '{0}' returned no messages")]
    EmptyReply(String),

    /// Corpus loading or other session resource setup failed
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// Currency rate lookup failed
    #[error("Rate lookup error: {0}")]
    RateLookup(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Model not available
    #[error("Model '{0}' not available in Ollama. Run: ollama pull {0}")]
    ModelNotFound(String),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Accord operations
pub type Result<T> = std::result::Result<T, AccordError>;

impl AccordError {
    /// Create an Ollama error
    pub fn ollama(msg: impl Into<String>) -> Self {
        Self::Ollama(msg.into())
    }

    /// Create an invocation error for the named agent
    pub fn invocation(agent: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Invocation {
            agent: agent.into(),
            message: msg.into(),
        }
    }

    /// Create a provisioning error
    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::Provisioning(msg.into())
    }

    /// Create a rate lookup error
    pub fn rate_lookup(msg: impl Into<String>) -> Self {
        Self::RateLookup(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Transport failures, deadlines and server-side runtime errors are
    /// transient. Bad config, missing models and malformed replies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Ollama(msg) | Self::Invocation { message: msg, .. } => {
                msg.contains("(5") || msg.contains("Stream error") || msg.contains("connect")
            }
            Self::Io(_) => true,
            _ => false,
        }
    }
}
