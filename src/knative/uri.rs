//! `knative:` endpoint URIs.
//!
//! Canonical form is `knative:<type>/<name>[?query]`; events use
//! `knative:event[/<event-type>][?name=<broker>]`.

use regex::Regex;
use std::sync::LazyLock;
use url::form_urlencoded;

use crate::error::{PipeError, Result};
use crate::model::knative::CamelServiceType;
use crate::model::meta::ObjectReference;

pub const KNATIVE_SCHEME: &str = "knative";
pub const DEFAULT_BROKER: &str = "default";

static KNATIVE_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^knative:/*(channel|endpoint|event)(?:/([A-Za-z0-9_.\-]*))?/?(?:\?(.*))?$")
        .expect("static regex")
});

static PLAIN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("static regex"));

struct Parsed<'a> {
    service_type: CamelServiceType,
    path: &'a str,
    query: &'a str,
}

fn parse(uri: &str) -> Option<Parsed<'_>> {
    let caps = KNATIVE_URI.captures(uri)?;
    let service_type = CamelServiceType::parse(caps.get(1)?.as_str())?;
    Some(Parsed {
        service_type,
        path: caps.get(2).map(|m| m.as_str()).unwrap_or(""),
        query: caps.get(3).map(|m| m.as_str()).unwrap_or(""),
    })
}

fn query_param(query: &str, key: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Turn a bare name into `knative:<type>/<name>`; URIs pass through with
/// `knative://` collapsed to `knative:`.
pub fn normalize_to_uri(service_type: CamelServiceType, raw: &str) -> String {
    if PLAIN_NAME.is_match(raw) {
        return format!("{KNATIVE_SCHEME}:{service_type}/{raw}");
    }
    match raw.strip_prefix("knative://") {
        Some(rest) => format!("{KNATIVE_SCHEME}:{rest}"),
        None => raw.to_string(),
    }
}

/// Keep the URIs addressing the given service type.
pub fn filter_uris(uris: &[String], service_type: CamelServiceType) -> Vec<String> {
    uris.iter()
        .filter(|uri| parse(uri).is_some_and(|p| p.service_type == service_type))
        .cloned()
        .collect()
}

pub fn service_type_of(uri: &str) -> Option<CamelServiceType> {
    parse(uri).map(|p| p.service_type)
}

/// Object addressed by a knative URI. Kind and apiVersion stay empty unless
/// given as query parameters.
pub fn extract_object_reference(uri: &str) -> Result<ObjectReference> {
    let parsed = parse(uri)
        .ok_or_else(|| PipeError::validation(format!("invalid knative uri: {uri}")))?;
    let name = match parsed.service_type {
        CamelServiceType::Event => {
            query_param(parsed.query, "name").unwrap_or_else(|| DEFAULT_BROKER.to_string())
        }
        _ if parsed.path.is_empty() => {
            return Err(PipeError::validation(format!(
                "cannot find resource name in knative uri: {uri}"
            )))
        }
        _ => parsed.path.to_string(),
    };
    Ok(ObjectReference {
        api_version: query_param(parsed.query, "apiVersion").unwrap_or_default(),
        kind: query_param(parsed.query, "kind").unwrap_or_default(),
        name,
        namespace: String::new(),
    })
}

/// Event type of a `knative:event/<type>` URI; empty when absent.
pub fn extract_event_type(uri: &str) -> String {
    match parse(uri) {
        Some(p) if p.service_type == CamelServiceType::Event => p.path.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_names() {
        assert_eq!(
            normalize_to_uri(CamelServiceType::Channel, "orders"),
            "knative:channel/orders"
        );
        assert_eq!(
            normalize_to_uri(CamelServiceType::Endpoint, "knative://endpoint/svc"),
            "knative:endpoint/svc"
        );
        assert_eq!(
            normalize_to_uri(CamelServiceType::Event, "knative:event/evt.type"),
            "knative:event/evt.type"
        );
    }

    #[test]
    fn extracts_reference_with_query() {
        let r = extract_object_reference(
            "knative:channel/channel-sink-1?apiVersion=messaging.knative.dev%2Fv1&kind=Channel",
        )
        .unwrap();
        assert_eq!(r.name, "channel-sink-1");
        assert_eq!(r.api_version, "messaging.knative.dev/v1");
        assert_eq!(r.kind, "Channel");
    }

    #[test]
    fn event_reference_defaults_to_default_broker() {
        let r = extract_object_reference("knative:event/evt.type").unwrap();
        assert_eq!(r.name, "default");
        assert!(r.kind.is_empty());

        let named = extract_object_reference("knative:event?name=my-broker").unwrap();
        assert_eq!(named.name, "my-broker");
    }

    #[test]
    fn channel_without_name_is_rejected() {
        assert!(extract_object_reference("knative:channel").is_err());
        assert!(extract_object_reference("timer:tick").is_err());
    }

    #[test]
    fn event_type_extraction() {
        assert_eq!(extract_event_type("knative:event/evt.type"), "evt.type");
        assert_eq!(extract_event_type("knative:event"), "");
        assert_eq!(extract_event_type("knative:channel/x"), "");
    }

    #[test]
    fn filters_by_service_type() {
        let uris = vec![
            "knative:channel/a".to_string(),
            "knative:event/b".to_string(),
            "log:info".to_string(),
            "knative:channel/c?kind=Channel".to_string(),
        ];
        assert_eq!(
            filter_uris(&uris, CamelServiceType::Channel),
            vec!["knative:channel/a", "knative:channel/c?kind=Channel"]
        );
    }
}
