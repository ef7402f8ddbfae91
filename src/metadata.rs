//! Route metadata
//!
//! Scans the raw YAML DSL flows of an Integration for the endpoint URIs it
//! consumes from and produces to. Traits use this to auto-discover Knative
//! wiring and to decide whether the integration serves HTTP.

use serde_json::Value;

use crate::model::Flow;

/// Components whose consumers listen for HTTP requests
const HTTP_CONSUMER_SCHEMES: &[&str] = &[
    "platform-http",
    "rest",
    "netty-http",
    "jetty",
    "undertow",
    "servlet",
    "knative",
];

const PRODUCER_KEYS: &[&str] = &["to", "toD", "wireTap"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMetadata {
    pub from_uris: Vec<String>,
    pub to_uris: Vec<String>,
}

impl RouteMetadata {
    pub fn scan(flows: &[Flow]) -> Self {
        let mut meta = Self::default();
        for flow in flows {
            walk(&flow.0, &mut meta);
        }
        meta
    }

    /// Whether any consumer endpoint serves HTTP.
    pub fn exposes_http(&self) -> bool {
        self.from_uris
            .iter()
            .any(|uri| HTTP_CONSUMER_SCHEMES.contains(&scheme(uri)))
    }
}

/// Scheme part of an endpoint URI (`timer:tick` → `timer`).
pub fn scheme(uri: &str) -> &str {
    uri.split_once(':').map(|(s, _)| s).unwrap_or(uri)
}

fn endpoint_uri(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(obj) => obj.get("uri").and_then(Value::as_str),
        _ => None,
    }
}

fn walk(value: &Value, meta: &mut RouteMetadata) {
    match value {
        Value::Object(obj) => {
            for (key, child) in obj {
                if key == "from" {
                    if let Some(uri) = endpoint_uri(child) {
                        meta.from_uris.push(uri.to_string());
                    }
                } else if PRODUCER_KEYS.contains(&key.as_str()) {
                    if let Some(uri) = endpoint_uri(child) {
                        meta.to_uris.push(uri.to_string());
                    }
                }
                walk(child, meta);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| walk(item, meta)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn route(from: &str, steps: Value) -> Flow {
        Flow(json!({"route": {"id": "binding", "from": {"uri": from, "steps": steps}}}))
    }

    #[test]
    fn collects_from_and_to_uris() {
        let flows = vec![route(
            "knative:channel/orders",
            json!([{"to": "log:info"}, {"wireTap": {"uri": "knative:event/audit"}}]),
        )];
        let meta = RouteMetadata::scan(&flows);

        assert_eq!(meta.from_uris, vec!["knative:channel/orders"]);
        assert_eq!(meta.to_uris, vec!["log:info", "knative:event/audit"]);
    }

    #[test]
    fn http_exposure_follows_consumer_scheme() {
        let timer = RouteMetadata::scan(&[route("timer:tick", json!([{"to": "knative:endpoint/x"}]))]);
        assert!(!timer.exposes_http());

        let http = RouteMetadata::scan(&[route("platform-http:/hello", json!([]))]);
        assert!(http.exposes_http());
    }

    #[test]
    fn scheme_of_opaque_uri() {
        assert_eq!(scheme("kamelet:timer-source/source"), "kamelet");
        assert_eq!(scheme("direct"), "direct");
    }
}
