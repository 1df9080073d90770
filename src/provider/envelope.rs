//! Response envelope parsing
//!
//! Two envelope shapes are understood:
//!
//! ```text
//! simple:   {"response": {"domains": [...], "total_pages": "3", "domain_count": "250"}}
//! records:  {"records": [...], "scroll_id": "...", "meta": {"total_records": 250, "max_page": 3}}
//! ```
//!
//! The continuation token of a records envelope may sit at the top level or
//! under `meta`.

use serde_json::Value;

use super::{Cursor, Page};
use crate::utils::error::FetchError;

/// Read a count that may be a number, a numeric string, or `{"value": n}`
pub fn number_like(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => map.get("value").and_then(number_like),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse the simple `{"response": {"domains": [...]}}` envelope
///
/// A missing `domains` list is an empty page.
pub fn parse_simple(value: &Value) -> Result<Page, FetchError> {
    let object = value
        .as_object()
        .ok_or_else(|| FetchError::Malformed("expected a JSON object".into()))?;

    let response = object
        .get("response")
        .ok_or_else(|| FetchError::Malformed("missing 'response' key".into()))?;

    if let Value::String(message) = response {
        return Err(FetchError::ProviderReported(message.clone()));
    }
    if let Some(message) = non_empty_str(response.get("error")) {
        return Err(FetchError::ProviderReported(message.to_string()));
    }

    let records = match response.get("domains") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(FetchError::Malformed(format!(
                "'domains' is not a list: {other}"
            )))
        }
    };

    Ok(Page {
        records,
        next: None,
        declared_total: response.get("domain_count").and_then(number_like),
        max_page: response
            .get("total_pages")
            .and_then(number_like)
            .and_then(|n| u32::try_from(n).ok()),
    })
}

/// Parse the `{"records": [...], "meta": {...}}` envelope
pub fn parse_records(value: &Value) -> Result<Page, FetchError> {
    let object = value
        .as_object()
        .ok_or_else(|| FetchError::Malformed("expected a JSON object".into()))?;

    let records = match object.get("records") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => {
            if let Some(message) = non_empty_str(object.get("message")) {
                return Err(FetchError::ProviderReported(message.to_string()));
            }
            return Err(FetchError::Malformed("missing 'records' list".into()));
        }
        Some(other) => {
            return Err(FetchError::Malformed(format!(
                "'records' is not a list: {other}"
            )))
        }
    };

    let meta = object.get("meta");
    let token = non_empty_str(object.get("scroll_id"))
        .or_else(|| non_empty_str(meta.and_then(|m| m.get("scroll_id"))));

    Ok(Page {
        records,
        next: token.map(|t| Cursor::Continue(t.to_string())),
        declared_total: meta
            .and_then(|m| m.get("total_records").or_else(|| m.get("record_count")))
            .and_then(number_like),
        max_page: meta
            .and_then(|m| m.get("max_page").or_else(|| m.get("total_pages")))
            .and_then(number_like)
            .and_then(|n| u32::try_from(n).ok()),
    })
}
