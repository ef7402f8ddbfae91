//! Known addressable kinds per service type.
//!
//! A reference with missing kind or apiVersion is expanded into every
//! matching entry of this table, in table order. The table is the only
//! place that decides which kinds may back a channel, endpoint or broker.

use crate::model::knative::CamelServiceType;
use crate::model::meta::ObjectReference;

/// (apiVersion, kind)
pub type KnownKind = (&'static str, &'static str);

const CHANNEL_KINDS: &[KnownKind] = &[
    ("messaging.knative.dev/v1", "Channel"),
    ("messaging.knative.dev/v1", "InMemoryChannel"),
    ("messaging.knative.dev/v1beta1", "KafkaChannel"),
    ("messaging.knative.dev/v1alpha1", "NatssChannel"),
];

const ENDPOINT_KINDS: &[KnownKind] = &[("serving.knative.dev/v1", "Service")];

const BROKER_KINDS: &[KnownKind] = &[("eventing.knative.dev/v1", "Broker")];

pub fn known_kinds(service_type: CamelServiceType) -> &'static [KnownKind] {
    match service_type {
        CamelServiceType::Channel => CHANNEL_KINDS,
        CamelServiceType::Endpoint => ENDPOINT_KINDS,
        CamelServiceType::Event => BROKER_KINDS,
    }
}

/// Candidate references for `reference`, most preferred first.
///
/// A fully qualified reference is returned unchanged; otherwise the table
/// is narrowed by whichever of kind/apiVersion is known.
pub fn fill_missing_reference_data(
    service_type: CamelServiceType,
    reference: &ObjectReference,
) -> Vec<ObjectReference> {
    let has_api = !reference.api_version.is_empty();
    let has_kind = !reference.kind.is_empty();
    if has_api && has_kind {
        return vec![reference.clone()];
    }

    known_kinds(service_type)
        .iter()
        .filter(|(api_version, kind)| {
            (!has_api || *api_version == reference.api_version)
                && (!has_kind || *kind == reference.kind)
        })
        .map(|(api_version, kind)| ObjectReference {
            api_version: (*api_version).to_string(),
            kind: (*kind).to_string(),
            ..reference.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> ObjectReference {
        ObjectReference {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn unqualified_channel_expands_to_all_channel_kinds() {
        let refs = fill_missing_reference_data(CamelServiceType::Channel, &named("orders"));
        let kinds: Vec<_> = refs.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["Channel", "InMemoryChannel", "KafkaChannel", "NatssChannel"]
        );
        assert!(refs.iter().all(|r| r.name == "orders"));
    }

    #[test]
    fn endpoint_and_broker_are_unambiguous() {
        assert_eq!(
            fill_missing_reference_data(CamelServiceType::Endpoint, &named("svc")).len(),
            1
        );
        let broker = fill_missing_reference_data(CamelServiceType::Event, &named("default"));
        assert_eq!(broker[0].api_version, "eventing.knative.dev/v1");
        assert_eq!(broker[0].kind, "Broker");
    }

    #[test]
    fn kind_narrows_the_table() {
        let r = ObjectReference {
            kind: "KafkaChannel".into(),
            ..named("orders")
        };
        let refs = fill_missing_reference_data(CamelServiceType::Channel, &r);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].api_version, "messaging.knative.dev/v1beta1");
    }

    #[test]
    fn api_version_narrows_the_table() {
        let r = ObjectReference {
            api_version: "messaging.knative.dev/v1".into(),
            ..named("orders")
        };
        assert_eq!(
            fill_missing_reference_data(CamelServiceType::Channel, &r).len(),
            2
        );
    }

    #[test]
    fn fully_qualified_reference_is_kept() {
        let r = ObjectReference::new("example.com/v1", "Custom", "x");
        assert_eq!(
            fill_missing_reference_data(CamelServiceType::Channel, &r),
            vec![r]
        );
    }

    #[test]
    fn unknown_kind_yields_no_candidates() {
        let r = ObjectReference {
            kind: "Queue".into(),
            ..named("orders")
        };
        assert!(fill_missing_reference_data(CamelServiceType::Channel, &r).is_empty());
    }
}
