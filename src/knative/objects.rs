//! Eventing objects wiring an integration to channels and brokers.

use std::collections::BTreeMap;

use crate::model::meta::{sanitize_name, ObjectMeta, ObjectReference, INTEGRATION_LABEL};
use crate::model::resources::{
    Destination, Resource, SinkBinding, SinkBindingSpec, Subscription, SubscriptionSpec, Trigger,
    TriggerFilter, TriggerSpec, EVENTING_API_VERSION, MESSAGING_API_VERSION, SERVING_API_VERSION,
    SOURCES_API_VERSION,
};

fn subscriber(integration: &str, path: &str) -> Destination {
    Destination {
        reference: Some(ObjectReference::new(SERVING_API_VERSION, "Service", integration)),
        uri: Some(path.to_string()),
    }
}

fn labelled(name: String, namespace: &str, integration: &str) -> ObjectMeta {
    ObjectMeta::named(name, namespace).with_label(INTEGRATION_LABEL, integration)
}

/// Subscribe the integration's serving Service to a channel.
pub fn create_subscription(channel: &ObjectReference, integration: &str, path: &str) -> Resource {
    let name = sanitize_name(&format!("{}-{}", channel.name, integration));
    Resource::Subscription(Subscription {
        api_version: MESSAGING_API_VERSION.into(),
        kind: "Subscription".into(),
        metadata: labelled(name, &channel.namespace, integration),
        spec: SubscriptionSpec {
            channel: ObjectReference {
                namespace: String::new(),
                ..channel.clone()
            },
            subscriber: subscriber(integration, path),
        },
    })
}

/// Route events from a broker, optionally filtered on event type.
pub fn create_trigger(
    broker: &ObjectReference,
    integration: &str,
    event_type: &str,
    path: &str,
) -> Resource {
    let (name, filter) = if event_type.is_empty() {
        (format!("{}-{}", broker.name, integration), None)
    } else {
        (
            format!("{}-{}-{}", broker.name, integration, event_type),
            Some(TriggerFilter {
                attributes: BTreeMap::from([("type".to_string(), event_type.to_string())]),
            }),
        )
    };
    Resource::Trigger(Trigger {
        api_version: EVENTING_API_VERSION.into(),
        kind: "Trigger".into(),
        metadata: labelled(sanitize_name(&name), &broker.namespace, integration),
        spec: TriggerSpec {
            broker: broker.name.clone(),
            filter,
            subscriber: subscriber(integration, path),
        },
    })
}

/// Redirect `source`'s outgoing events to `target`.
pub fn create_sink_binding(source: &ObjectReference, target: &ObjectReference) -> Resource {
    Resource::SinkBinding(SinkBinding {
        api_version: SOURCES_API_VERSION.into(),
        kind: "SinkBinding".into(),
        metadata: labelled(source.name.clone(), &source.namespace, &source.name),
        spec: SinkBindingSpec {
            subject: source.clone(),
            sink: Destination {
                reference: Some(target.clone()),
                uri: None,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_name_and_filter_follow_event_type() {
        let broker = ObjectReference::new(EVENTING_API_VERSION, "Broker", "default").in_namespace("ns");

        let Resource::Trigger(typed) = create_trigger(&broker, "it", "evt.Type", "/events/evt.Type")
        else {
            panic!("expected a trigger");
        };
        assert_eq!(typed.metadata.name, "default-it-evt.type");
        assert_eq!(typed.metadata.namespace, "ns");
        assert_eq!(typed.spec.event_type(), Some("evt.Type"));
        assert_eq!(typed.spec.subscriber.uri.as_deref(), Some("/events/evt.Type"));

        let Resource::Trigger(untyped) = create_trigger(&broker, "it", "", "/events/") else {
            panic!("expected a trigger");
        };
        assert_eq!(untyped.metadata.name, "default-it");
        assert!(untyped.spec.filter.is_none());
    }

    #[test]
    fn subscription_targets_integration_service() {
        let channel =
            ObjectReference::new(MESSAGING_API_VERSION, "Channel", "orders").in_namespace("ns");
        let Resource::Subscription(sub) = create_subscription(&channel, "it", "/channels/orders")
        else {
            panic!("expected a subscription");
        };
        assert_eq!(sub.metadata.name, "orders-it");
        assert_eq!(sub.spec.channel.kind, "Channel");
        let target = sub.spec.subscriber.reference.unwrap();
        assert_eq!(target.kind, "Service");
        assert_eq!(target.name, "it");
    }
}
