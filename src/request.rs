// Incoming request parsing: `{"market": "9.5", "<site>": "<url>", ...}`.
use crate::model::{RequestError, ScrapeRequest};
use crate::normalizer::normalize_market;
use crate::parser::SiteRegistry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

const MIN_DEADLINE: Duration = Duration::from_secs(1);
const MAX_DEADLINE: Duration = Duration::from_secs(120);
const CONTROL_FIELDS: &[&str] = &["market", "timeout_ms", "quotes"];

/// Validates a raw JSON request against the registered sites.
///
/// Only a missing or malformed market line, a non-object body or a
/// non-string URL is an error; unknown keys are logged and dropped.
pub fn parse_request(
    raw: &str,
    registry: &SiteRegistry,
    default_deadline: Duration,
) -> Result<ScrapeRequest, RequestError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| RequestError::InvalidJson(e.to_string()))?;
    let Some(fields) = value.as_object() else {
        return Err(RequestError::InvalidJson("expected a JSON object".into()));
    };

    let market = match fields.get("market") {
        None | Some(Value::Null) => return Err(RequestError::MissingMarket),
        Some(Value::String(s)) => normalize_market(s).ok_or_else(|| RequestError::InvalidMarket(s.clone()))?,
        Some(Value::Number(n)) => {
            normalize_market(&n.to_string()).ok_or_else(|| RequestError::InvalidMarket(n.to_string()))?
        }
        Some(other) => return Err(RequestError::InvalidMarket(other.to_string())),
    };

    let deadline = fields
        .get("timeout_ms")
        .and_then(Value::as_u64)
        .map(|ms| Duration::from_millis(ms).clamp(MIN_DEADLINE, MAX_DEADLINE))
        .unwrap_or(default_deadline);
    let include_quotes = fields.get("quotes").and_then(Value::as_bool).unwrap_or(false);

    let mut targets = BTreeMap::new();
    for (key, value) in fields {
        if CONTROL_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if !registry.contains(key) {
            warn!(site = %key, "Ignoring unknown site in request");
            continue;
        }
        match value {
            Value::Null => {}
            Value::String(url) if url.trim().is_empty() => {}
            Value::String(url) => {
                targets.insert(key.clone(), url.trim().to_string());
            }
            _ => return Err(RequestError::InvalidUrl(key.clone())),
        }
    }

    Ok(ScrapeRequest {
        market,
        targets,
        deadline,
        include_quotes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_secs(30);

    fn parse(raw: &str) -> Result<ScrapeRequest, RequestError> {
        parse_request(raw, &SiteRegistry::builtin().unwrap(), DEFAULT)
    }

    #[test]
    fn absent_null_and_empty_urls_are_skipped() {
        let req = parse(r#"{"market": "9.5", "betano": "http://site/a", "bet365": null, "kto": "  "}"#).unwrap();
        assert_eq!(req.market, "9.5");
        assert_eq!(req.targets.len(), 1);
        assert_eq!(req.targets["betano"], "http://site/a");
        assert_eq!(req.deadline, DEFAULT);
        assert!(!req.include_quotes);
    }

    #[test]
    fn market_is_required() {
        assert_eq!(parse(r#"{"betano": "http://a"}"#).unwrap_err(), RequestError::MissingMarket);
        assert_eq!(parse(r#"{"market": null}"#).unwrap_err(), RequestError::MissingMarket);
        assert_eq!(
            parse(r#"{"market": "nove"}"#).unwrap_err(),
            RequestError::InvalidMarket("nove".into())
        );
    }

    #[test]
    fn market_accepts_comma_and_numbers() {
        assert_eq!(parse(r#"{"market": "10,5"}"#).unwrap().market, "10.5");
        assert_eq!(parse(r#"{"market": 9.5}"#).unwrap().market, "9.5");
    }

    #[test]
    fn unknown_sites_are_ignored_and_bad_urls_rejected() {
        let req = parse(r#"{"market": "9.5", "pinnacle": "http://p"}"#).unwrap();
        assert!(req.targets.is_empty());

        assert_eq!(
            parse(r#"{"market": "9.5", "kto": 42}"#).unwrap_err(),
            RequestError::InvalidUrl("kto".into())
        );
    }

    #[test]
    fn timeout_and_quotes_overrides() {
        let req = parse(r#"{"market": "9.5", "timeout_ms": 15000, "quotes": true}"#).unwrap();
        assert_eq!(req.deadline, Duration::from_secs(15));
        assert!(req.include_quotes);

        let clamped = parse(r#"{"market": "9.5", "timeout_ms": 10}"#).unwrap();
        assert_eq!(clamped.deadline, MIN_DEADLINE);
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert!(matches!(parse("[]"), Err(RequestError::InvalidJson(_))));
        assert!(matches!(parse("{"), Err(RequestError::InvalidJson(_))));
    }
}
