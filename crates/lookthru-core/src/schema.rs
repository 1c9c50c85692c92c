//! Schema normalization for raw holdings tables.
//!
//! Scraper adapters and the community store hand back loosely-typed
//! JSON rows with provider-specific column names. Normalization maps
//! those columns onto canonical fields before any validation or record
//! construction happens, so the rest of the pipeline only ever sees
//! [`RawHolding`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Column name candidates, tried in order.
const ISIN_COLUMNS: &[&str] = &["isin", "ISIN"];
const NAME_COLUMNS: &[&str] = &["name", "Name", "TR_Name", "holding_name"];
const TICKER_COLUMNS: &[&str] = &["ticker", "Ticker", "symbol", "Symbol"];
const WEIGHT_COLUMNS: &[&str] = &["weight_percentage", "Weight", "weight"];

/// One holdings row with canonical fields, pre-validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawHolding {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub isin: Option<String>,
    pub weight_percentage: Option<f64>,
}

/// Parse a JSON-array payload of row objects into canonical rows.
/// Non-object rows are skipped.
pub fn normalize_table(payload: &str) -> Result<Vec<RawHolding>, CoreError> {
    let value: Value = serde_json::from_str(payload)?;
    let rows = match value {
        Value::Array(rows) => rows,
        _ => return Ok(Vec::new()),
    };

    Ok(rows
        .iter()
        .filter_map(Value::as_object)
        .map(normalize_row)
        .collect())
}

/// Map one arbitrary row object onto canonical fields.
#[must_use]
pub fn normalize_row(row: &Map<String, Value>) -> RawHolding {
    RawHolding {
        name: string_field(row, NAME_COLUMNS),
        ticker: string_field(row, TICKER_COLUMNS),
        isin: string_field(row, ISIN_COLUMNS),
        weight_percentage: numeric_field(row, WEIGHT_COLUMNS),
    }
}

fn string_field(row: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    for candidate in candidates {
        if let Some(value) = row.get(*candidate) {
            match value {
                Value::String(text) if !text.trim().is_empty() => {
                    return Some(text.trim().to_string());
                }
                Value::Number(number) => return Some(number.to_string()),
                _ => {}
            }
        }
    }
    None
}

fn numeric_field(row: &Map<String, Value>, candidates: &[&str]) -> Option<f64> {
    for candidate in candidates {
        if let Some(value) = row.get(*candidate) {
            match value {
                Value::Number(number) => return number.as_f64(),
                Value::String(text) => {
                    if let Ok(parsed) = text.trim().trim_end_matches('%').parse::<f64>() {
                        return Some(parsed);
                    }
                }
                _ => {}
            }
        }
    }
    None
}
