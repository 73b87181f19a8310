//! Configuration management for Accord
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/accord/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{AccordError, Result};

/// Main configuration for Accord
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Negotiation loop configuration
    pub negotiation: NegotiationConfig,
    /// Agent persona overrides
    #[serde(default)]
    pub agents: AgentsConfig,
    /// Retrieval corpus configuration
    #[serde(default)]
    pub corpus: CorpusConfig,
    /// Currency rate lookup configuration
    #[serde(default)]
    pub rates: RatesConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

/// Which model drives each side of the negotiation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model for the proposing agent
    /// Default: qwen3:8b
    pub proposer: String,
    /// Model for the approving agent (needs tool calling)
    /// Default: qwen3:8b
    pub approver: String,
}

/// Negotiation loop behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Maximum agent turns per round
    /// Default: 10
    pub max_turns: usize,
    /// Phrase whose presence signals approval
    pub approval_phrase: String,
    /// Phrase that vetoes approval when present in the same message
    pub rejection_phrase: Option<String>,
    /// Only evaluate messages written by the approving agent
    pub approver_only: bool,
    /// Offer the approver a structured verdict tool
    pub structured_verdict: bool,
    /// Hard deadline for a single agent turn, in seconds
    pub invocation_timeout_secs: u64,
    /// Retries for a turn that failed transiently
    pub max_retries: usize,
    /// Initial backoff between retries, in milliseconds
    pub retry_delay_ms: u64,
    /// Tool call rounds an agent may take within one turn
    pub max_tool_rounds: usize,
}

/// Persona overrides for the two agents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    pub proposer_name: Option<String>,
    pub proposer_instructions: Option<String>,
    pub approver_name: Option<String>,
    pub approver_instructions: Option<String>,
}

/// Retrieval corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory of `.txt`/`.md` documents; retrieval is disabled when unset
    pub dir: Option<PathBuf>,
    /// Passages returned per search
    pub max_results: usize,
}

/// Where the base currency goes in a rates request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasePlacement {
    /// `{base_url}/EUR`
    #[default]
    Path,
    /// `{base_url}?base=EUR`
    Query,
}

/// Currency rate API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// Whether the approver gets the rate lookup tool
    pub enabled: bool,
    /// Endpoint returning `{ "base": .., "rates": { .. } }`
    pub base_url: String,
    /// How the endpoint expects the base currency
    #[serde(default)]
    pub base_in: BasePlacement,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            models: ModelConfig::default(),
            negotiation: NegotiationConfig::default(),
            agents: AgentsConfig::default(),
            corpus: CorpusConfig::default(),
            rates: RatesConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            proposer: env::var("ACCORD_PROPOSER_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
            approver: env::var("ACCORD_APPROVER_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
        }
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_turns: env::var("ACCORD_MAX_TURNS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(10),
            approval_phrase: "itinerary approved".to_string(),
            rejection_phrase: Some("not approved".to_string()),
            approver_only: true,
            structured_verdict: true,
            invocation_timeout_secs: 120,
            max_retries: 1,
            retry_delay_ms: 500,
            max_tool_rounds: 4,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: env::var("ACCORD_CORPUS_DIR").ok().map(PathBuf::from),
            max_results: 5,
        }
    }
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            enabled: env::var("ACCORD_RATES_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            base_url: env::var("ACCORD_RATES_URL")
                .unwrap_or_else(|_| "https://open.er-api.com/v6/latest".to_string()),
            base_in: BasePlacement::Path,
            timeout_secs: 15,
        }
    }
}

impl NegotiationConfig {
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("accord")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(AccordError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| AccordError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| AccordError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the negotiation loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.negotiation.max_turns == 0 {
            return Err(AccordError::config("negotiation.max_turns must be at least 1"));
        }
        if self.negotiation.approval_phrase.trim().is_empty() {
            return Err(AccordError::config("negotiation.approval_phrase is empty"));
        }
        if self.negotiation.invocation_timeout_secs == 0 {
            return Err(AccordError::config(
                "negotiation.invocation_timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.negotiation.approval_phrase, "itinerary approved");
        assert!(config.negotiation.approver_only);
        assert_eq!(config.negotiation.max_retries, 1);
    }

    #[test]
    fn test_ollama_url() {
        let mut config = Config::default();
        config.ollama.host = "localhost".to_string();
        config.ollama.port = 11434;
        assert_eq!(config.ollama_url(), "http://localhost:11434");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let toml_str = Config::default_config_toml();
        assert!(toml_str.contains("approval_phrase"));
        assert!(toml_str.contains("proposer"));

        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.negotiation.approval_phrase, "itinerary approved");
    }

    #[test]
    fn test_zero_max_turns_rejected() {
        let mut config = Config::default();
        config.negotiation.max_turns = 0;
        assert!(matches!(config.validate(), Err(AccordError::Config(_))));
    }

    #[test]
    fn test_rates_default_to_path_placement() {
        let config = Config::default();
        assert_eq!(config.rates.base_in, BasePlacement::Path);

        let parsed = Config::from_toml(&Config::default_config_toml()).unwrap();
        assert_eq!(parsed.rates.base_in, BasePlacement::Path);
    }

    #[test]
    fn test_rates_query_placement_from_toml() {
        let toml_str = Config::default_config_toml();
        assert!(toml_str.contains("base_in = \"path\""));
        let toml_str = toml_str.replace("base_in = \"path\"", "base_in = \"query\"");
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.rates.base_in, BasePlacement::Query);
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("accord"));
    }
}
