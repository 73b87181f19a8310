//! Currency rate lookup
//!
//! One GET per lookup against an exchange-rate endpoint that answers with
//! a JSON body holding a `rates` map. The base currency goes either in the
//! path (`/latest/EUR`) or in the query (`/latest?base=EUR`).

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::core::{AccordError, Result};
use crate::core::config::{BasePlacement, RatesConfig};

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default, alias = "base_code")]
    base: Option<String>,
    rates: BTreeMap<String, f64>,
}

/// HTTP client for the rate endpoint
#[derive(Clone)]
pub struct RateClient {
    client: Client,
    endpoint: Url,
    base_in: BasePlacement,
}

impl RateClient {
    pub fn from_config(config: &RatesConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.base_url).map_err(|e| {
            AccordError::config(format!("Invalid rates URL '{}': {}", config.base_url, e))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            base_in: config.base_in,
        })
    }

    /// Build the request URL for a base currency
    pub fn request_url(&self, base_currency: &str) -> Result<Url> {
        let base = normalize_currency(base_currency)?;
        let mut url = self.endpoint.clone();
        match self.base_in {
            BasePlacement::Path => {
                url.path_segments_mut()
                    .map_err(|_| {
                        AccordError::config(format!(
                            "Rates URL '{}' cannot take a path segment",
                            self.endpoint
                        ))
                    })?
                    .pop_if_empty()
                    .push(&base);
            }
            BasePlacement::Query => {
                url.query_pairs_mut().append_pair("base", &base);
            }
        }
        Ok(url)
    }

    /// Rates from `base_currency` to every currency the endpoint knows
    pub async fn get_rate(&self, base_currency: &str) -> Result<BTreeMap<String, f64>> {
        let url = self.request_url(base_currency)?;
        debug!(%url, "Fetching exchange rates");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AccordError::rate_lookup(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AccordError::rate_lookup(format!(
                "Rate API returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_rates(&body, base_currency)
    }
}

fn normalize_currency(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AccordError::rate_lookup(format!(
            "'{}' is not a three-letter currency code",
            code
        )));
    }
    Ok(code)
}

/// Parse a rates body, checking it answers for the requested base
pub fn parse_rates(body: &str, base_currency: &str) -> Result<BTreeMap<String, f64>> {
    let parsed: RatesResponse = serde_json::from_str(body)
        .map_err(|e| AccordError::rate_lookup(format!("Malformed rates response: {}", e)))?;

    let requested = normalize_currency(base_currency)?;
    if let Some(base) = parsed.base {
        if !base.eq_ignore_ascii_case(&requested) {
            return Err(AccordError::rate_lookup(format!(
                "Asked for {} rates, got {}",
                requested, base
            )));
        }
    }
    if parsed.rates.is_empty() {
        return Err(AccordError::rate_lookup("Rate API returned no rates"));
    }
    Ok(parsed.rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(base_url: &str, base_in: BasePlacement) -> RateClient {
        RateClient::from_config(&RatesConfig {
            enabled: true,
            base_url: base_url.to_string(),
            base_in,
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn client() -> RateClient {
        client_with("https://rates.example.com/latest", BasePlacement::Query)
    }

    #[test]
    fn test_request_url_adds_base_query() {
        let url = client().request_url("eur").unwrap();
        assert_eq!(url.as_str(), "https://rates.example.com/latest?base=EUR");
    }

    #[test]
    fn test_default_endpoint_puts_base_in_path() {
        let client = RateClient::from_config(&RatesConfig {
            base_url: "https://open.er-api.com/v6/latest".to_string(),
            ..RatesConfig::default()
        })
        .unwrap();
        let url = client.request_url("EUR").unwrap();
        assert_eq!(url.as_str(), "https://open.er-api.com/v6/latest/EUR");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_path_placement_ignores_trailing_slash() {
        let client = client_with("https://rates.example.com/v6/latest/", BasePlacement::Path);
        let url = client.request_url("nzd").unwrap();
        assert_eq!(url.as_str(), "https://rates.example.com/v6/latest/NZD");
    }

    #[test]
    fn test_parse_open_er_api_body() {
        let body = r#"{"result": "success", "base_code": "EUR", "time_last_update_unix": 1760000000, "rates": {"EUR": 1, "NZD": 2.02}}"#;
        let rates = parse_rates(body, "EUR").unwrap();
        assert_eq!(rates.get("NZD"), Some(&2.02));
    }

    #[test]
    fn test_rejects_bad_currency_code() {
        assert!(matches!(
            client().request_url("euro"),
            Err(AccordError::RateLookup(_))
        ));
    }

    #[test]
    fn test_parse_rates() {
        let body = r#"{"base_code": "EUR", "rates": {"NZD": 1.82, "USD": 1.08}}"#;
        let rates = parse_rates(body, "EUR").unwrap();
        assert_eq!(rates.get("NZD"), Some(&1.82));
    }

    #[test]
    fn test_parse_rates_base_mismatch() {
        let body = r#"{"base": "USD", "rates": {"NZD": 1.7}}"#;
        assert!(parse_rates(body, "EUR").is_err());
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let result = RateClient::from_config(&RatesConfig {
            enabled: true,
            base_url: "not a url".to_string(),
            base_in: BasePlacement::Path,
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(AccordError::Config(_))));
    }
}
