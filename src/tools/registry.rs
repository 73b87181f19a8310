//! Tool registry - manages and dispatches tool calls
//!
//! Each agent gets its own registry holding only the tools its capabilities
//! grant. Tool failures are reported back to the model as failed results;
//! only registry misuse surfaces as an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{Decision, Result, ToolCall, ToolDefinition, ToolResult};
use crate::tools::rates::RateClient;
use crate::tools::retrieval::{CorpusId, CorpusStore};

pub const FILE_SEARCH: &str = "file_search";
pub const GET_CONVERT: &str = "get_convert";
pub const SUBMIT_VERDICT: &str = "submit_verdict";

enum Handler {
    Retrieval {
        store: Arc<CorpusStore>,
        corpus: CorpusId,
        max_results: usize,
    },
    Rates(RateClient),
    Verdict,
}

/// Registry of tools available to one agent
#[derive(Default)]
pub struct ToolRegistry {
    /// Tool definitions and handlers indexed by name
    tools: BTreeMap<String, (ToolDefinition, Handler)>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the corpus search tool
    pub fn with_retrieval(
        mut self,
        store: Arc<CorpusStore>,
        corpus: CorpusId,
        max_results: usize,
    ) -> Self {
        self.register(
            ToolDefinition::function(
                FILE_SEARCH,
                "Search the knowledge corpus for passages relevant to a query",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What to look for"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum passages to return"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            Handler::Retrieval {
                store,
                corpus,
                max_results,
            },
        );
        self
    }

    /// Register the exchange rate tool
    pub fn with_rates(mut self, client: RateClient) -> Self {
        self.register(
            ToolDefinition::function(
                GET_CONVERT,
                "Get current exchange rates for a base currency. Returns a map from currency code to rate.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "base": {
                            "type": "string",
                            "description": "Three-letter base currency code, e.g. EUR"
                        }
                    },
                    "required": ["base"]
                }),
            ),
            Handler::Rates(client),
        );
        self
    }

    /// Register the structured verdict tool
    pub fn with_verdict(mut self) -> Self {
        self.register(
            ToolDefinition::function(
                SUBMIT_VERDICT,
                "Record your final decision on the current proposal",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "approved": {
                            "type": "boolean",
                            "description": "true to approve the proposal, false to reject it"
                        },
                        "rationale": {
                            "type": "string",
                            "description": "One sentence explaining the decision"
                        }
                    },
                    "required": ["approved", "rationale"]
                }),
            ),
            Handler::Verdict,
        );
        self
    }

    fn register(&mut self, definition: ToolDefinition, handler: Handler) {
        let name = definition.name().to_string();
        self.tools.insert(name, (definition, handler));
    }

    /// Get all tool definitions
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|(def, _)| def.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call
    pub async fn execute(&self, tool_call: &ToolCall) -> Result<ToolResult> {
        let Some((_, handler)) = self.tools.get(&tool_call.name) else {
            warn!(tool = %tool_call.name, "Model called an unknown tool");
            return Ok(ToolResult::failure(
                &tool_call.name,
                format!("Unknown tool: {}", tool_call.name),
            ));
        };

        debug!(tool = %tool_call.name, args = %tool_call.arguments, "Executing tool");

        match handler {
            Handler::Retrieval {
                store,
                corpus,
                max_results,
            } => {
                let Some(query) = tool_call.get_string("query") else {
                    return Ok(ToolResult::failure(FILE_SEARCH, "Missing 'query' argument"));
                };
                let limit = tool_call
                    .get_usize("limit")
                    .unwrap_or(*max_results)
                    .clamp(1, *max_results);
                let passages = store.search(corpus, &query, limit)?;
                if passages.is_empty() {
                    return Ok(ToolResult::success(FILE_SEARCH, "No matching passages."));
                }
                Ok(ToolResult::success(
                    FILE_SEARCH,
                    serde_json::to_string(&passages)?,
                ))
            }
            Handler::Rates(client) => {
                let base = tool_call
                    .get_string("base")
                    .unwrap_or_else(|| "EUR".to_string());
                match client.get_rate(&base).await {
                    Ok(rates) => Ok(ToolResult::success(
                        GET_CONVERT,
                        serde_json::json!({ "base": base.to_uppercase(), "rates": rates })
                            .to_string(),
                    )),
                    Err(e) => Ok(ToolResult::failure(GET_CONVERT, e.to_string())),
                }
            }
            Handler::Verdict => match tool_call.get_bool("approved") {
                Some(approved) => {
                    let rationale = tool_call.get_string("rationale").unwrap_or_default();
                    Ok(ToolResult::verdict(
                        SUBMIT_VERDICT,
                        Decision {
                            approved,
                            rationale,
                        },
                    ))
                }
                None => Ok(ToolResult::failure(
                    SUBMIT_VERDICT,
                    "Missing boolean 'approved' argument",
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::core::config::{BasePlacement, RatesConfig};

    /// Serve one HTTP response and hand back the request line it answered
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{}/v6/latest", addr), handle)
    }

    fn rates_registry(base_url: String) -> ToolRegistry {
        let client = RateClient::from_config(&RatesConfig {
            enabled: true,
            base_url,
            base_in: BasePlacement::Path,
            timeout_secs: 5,
        })
        .unwrap();
        ToolRegistry::new().with_rates(client)
    }

    #[test]
    fn test_registry_only_holds_granted_tools() {
        let registry = ToolRegistry::new().with_verdict();
        assert!(registry.contains(SUBMIT_VERDICT));
        assert!(!registry.contains(GET_CONVERT));
        assert_eq!(registry.definitions().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failed_result() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute(&ToolCall::new("book_flight", serde_json::json!({})))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_verdict_tool_captures_decision() {
        let registry = ToolRegistry::new().with_verdict();
        let result = registry
            .execute(&ToolCall::new(
                SUBMIT_VERDICT,
                serde_json::json!({"approved": false, "rationale": "62 NZD is over"}),
            ))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.decision, Some(Decision::reject("62 NZD is over")));
    }

    #[tokio::test]
    async fn test_retrieval_tool_returns_passages() {
        let store = Arc::new(CorpusStore::new());
        let corpus = store
            .provision_documents([("notes.md", "Tapas crawl in La Latina, 25 euros.")])
            .unwrap();
        let registry = ToolRegistry::new().with_retrieval(store, corpus, 3);

        let result = registry
            .execute(&ToolCall::new(FILE_SEARCH, serde_json::json!({"query": "tapas"})))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("La Latina"));
    }

    #[tokio::test]
    async fn test_rates_tool_returns_table() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"result": "success", "base_code": "EUR", "rates": {"EUR": 1, "NZD": 2.02}}"#,
        )
        .await;
        let registry = rates_registry(url);

        let result = registry
            .execute(&ToolCall::new(GET_CONVERT, serde_json::json!({"base": "eur"})))
            .await
            .unwrap();

        assert!(result.success, "{}", result.output);
        assert!(result.output.contains("\"NZD\":2.02"));
        assert_eq!(server.await.unwrap(), "GET /v6/latest/EUR HTTP/1.1");
    }

    #[tokio::test]
    async fn test_rates_tool_wrong_base_is_failed_result() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"result": "success", "base_code": "USD", "rates": {"NZD": 1.7}}"#,
        )
        .await;
        let registry = rates_registry(url);

        let result = registry
            .execute(&ToolCall::new(GET_CONVERT, serde_json::json!({"base": "EUR"})))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("got USD"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_rates_tool_http_error_is_failed_result() {
        let (url, server) = serve_once("503 Service Unavailable", "{}").await;
        let registry = rates_registry(url);

        let result = registry
            .execute(&ToolCall::new(GET_CONVERT, serde_json::json!({"base": "EUR"})))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("503"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_rates_tool_bad_code_fails_without_request() {
        let registry = rates_registry("http://127.0.0.1:9/v6/latest".to_string());
        let result = registry
            .execute(&ToolCall::new(GET_CONVERT, serde_json::json!({"base": "euro"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("three-letter"));
    }
}
