//! Finnhub company-profile lookup source.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::Identifier;
use crate::http_client::{HttpClient, HttpRequest};

use super::{LookupError, LookupFuture, LookupQuery, LookupSource};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const CONFIDENCE: f64 = 0.75;

pub struct FinnhubSource {
    client: Arc<dyn HttpClient>,
    base_url: String,
    api_key: Option<String>,
}

impl FinnhubSource {
    /// Reads the API key from `FINNHUB_API_KEY` when not supplied.
    pub fn new(client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        let api_key = api_key.or_else(|| std::env::var("FINNHUB_API_KEY").ok());
        Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_profile(body: &Value) -> Option<Identifier> {
        let raw = body.get("isin").and_then(Value::as_str)?;
        Identifier::parse(raw).ok()
    }
}

impl LookupSource for FinnhubSource {
    fn name(&self) -> &'static str {
        "finnhub"
    }

    fn confidence(&self) -> f64 {
        CONFIDENCE
    }

    fn lookup<'a>(&'a self, query: LookupQuery<'a>) -> LookupFuture<'a> {
        Box::pin(async move {
            let key = self
                .api_key
                .as_deref()
                .ok_or_else(|| LookupError::not_configured("FINNHUB_API_KEY is not set"))?;
            // Profile lookups key on symbol only; name variants are for
            // sources that index labels.
            for ticker in query.ticker_variants {
                let url = format!(
                    "{}/stock/profile2?symbol={}&token={}",
                    self.base_url,
                    urlencoding::encode(ticker),
                    key
                );
                let response = self
                    .client
                    .execute(HttpRequest::get(url))
                    .await
                    .map_err(|e| LookupError::unavailable(e.to_string()))?;
                if response.is_rate_limited() {
                    return Err(LookupError::rate_limited("finnhub quota exhausted"));
                }
                if !response.is_success() {
                    return Err(LookupError::unavailable(format!(
                        "finnhub returned status {}",
                        response.status
                    )));
                }
                let body: Value = serde_json::from_str(&response.body)
                    .map_err(|e| LookupError::invalid_response(e.to_string()))?;
                if let Some(identifier) = Self::parse_profile(&body) {
                    return Ok(Some(identifier));
                }
            }
            Ok(None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_identifier_from_profile() {
        let body = json!({"ticker": "AAPL", "isin": "US0378331005"});
        let parsed = FinnhubSource::parse_profile(&body).unwrap();
        assert_eq!(parsed.as_str(), "US0378331005");
    }

    #[test]
    fn empty_profile_is_a_miss() {
        assert!(FinnhubSource::parse_profile(&json!({})).is_none());
        assert!(FinnhubSource::parse_profile(&json!({"isin": ""})).is_none());
        assert!(FinnhubSource::parse_profile(&json!({"isin": "XX123"})).is_none());
    }
}
