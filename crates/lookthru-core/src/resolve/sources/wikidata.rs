//! Wikidata SPARQL lookup source.
//!
//! Queries the public SPARQL endpoint for entities carrying the ISIN
//! property (P946) whose ticker (P249) or label matches one of the
//! supplied variants.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::Identifier;
use crate::http_client::{HttpClient, HttpRequest};

use super::{LookupError, LookupFuture, LookupQuery, LookupSource};

const ENDPOINT: &str = "https://query.wikidata.org/sparql";
const CONFIDENCE: f64 = 0.80;

pub struct WikidataSource {
    client: Arc<dyn HttpClient>,
    endpoint: String,
}

impl WikidataSource {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            endpoint: ENDPOINT.to_string(),
        }
    }

    /// Point at an alternate endpoint, e.g. a stub server in tests.
    pub fn with_endpoint(client: Arc<dyn HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn build_query(query: &LookupQuery<'_>) -> String {
        let ticker_values = sparql_values(query.ticker_variants);
        let name_values = sparql_values(query.name_variants);
        format!(
            "SELECT ?isin WHERE {{ \
             ?entity wdt:P946 ?isin . \
             {{ ?entity wdt:P249 ?ticker . VALUES ?ticker {{ {ticker_values} }} }} \
             UNION \
             {{ ?entity rdfs:label ?label . VALUES ?label {{ {name_values} }} }} \
             }} LIMIT 5"
        )
    }

    fn parse_response(body: &Value) -> Option<Identifier> {
        let bindings = body
            .get("results")
            .and_then(|r| r.get("bindings"))
            .and_then(Value::as_array)?;
        for binding in bindings {
            let Some(raw) = binding
                .get("isin")
                .and_then(|b| b.get("value"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if let Ok(identifier) = Identifier::parse(raw) {
                return Some(identifier);
            }
        }
        None
    }
}

fn sparql_values(variants: &[String]) -> String {
    variants
        .iter()
        .map(|v| format!("\"{}\"@en", v.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" ")
}

impl LookupSource for WikidataSource {
    fn name(&self) -> &'static str {
        "wikidata"
    }

    fn confidence(&self) -> f64 {
        CONFIDENCE
    }

    fn lookup<'a>(&'a self, query: LookupQuery<'a>) -> LookupFuture<'a> {
        Box::pin(async move {
            if query.ticker_variants.is_empty() && query.name_variants.is_empty() {
                return Ok(None);
            }
            let sparql = Self::build_query(&query);
            let url = format!(
                "{}?format=json&query={}",
                self.endpoint,
                urlencoding::encode(&sparql)
            );
            let request = HttpRequest::get(url)
                .with_header("accept", "application/sparql-results+json");
            let response = self
                .client
                .execute(request)
                .await
                .map_err(|e| LookupError::unavailable(e.to_string()))?;
            if response.is_rate_limited() {
                return Err(LookupError::rate_limited("wikidata quota exhausted"));
            }
            if !response.is_success() {
                return Err(LookupError::unavailable(format!(
                    "wikidata returned status {}",
                    response.status
                )));
            }
            let body: Value = serde_json::from_str(&response.body)
                .map_err(|e| LookupError::invalid_response(e.to_string()))?;
            Ok(Self::parse_response(&body))
        })
    }
}
