//! Deployable objects synthesized by the trait pipeline.
//!
//! Only the fields the traits decide on are modelled. Each object carries
//! its own `apiVersion`/`kind` so the collection renders as plain manifests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::meta::{ObjectMeta, ObjectReference};

pub const SERVING_API_VERSION: &str = "serving.knative.dev/v1";
pub const EVENTING_API_VERSION: &str = "eventing.knative.dev/v1";
pub const MESSAGING_API_VERSION: &str = "messaging.knative.dev/v1";
pub const SOURCES_API_VERSION: &str = "sources.knative.dev/v1";

// ---------------------------------------------------------------------------
// Pod template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub name: String,
    pub container_port: i32,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

// ---------------------------------------------------------------------------
// Workloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    pub selector: LabelSelector,
    pub template: PodTemplateSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_deadline_seconds: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
}

impl Deployment {
    pub fn new(metadata: ObjectMeta, spec: DeploymentSpec) -> Self {
        Self {
            api_version: "apps/v1".into(),
            kind: "Deployment".into(),
            metadata,
            spec,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnativeServiceSpec {
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnativeService {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: KnativeServiceSpec,
}

impl KnativeService {
    pub fn new(metadata: ObjectMeta, spec: KnativeServiceSpec) -> Self {
        Self {
            api_version: SERVING_API_VERSION.into(),
            kind: "Service".into(),
            metadata,
            spec,
        }
    }
}

// ---------------------------------------------------------------------------
// Networking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub name: String,
    pub port: i32,
    /// Named container port
    pub target_port: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
}

impl Service {
    pub fn new(metadata: ObjectMeta, spec: ServiceSpec) -> Self {
        Self {
            api_version: "v1".into(),
            kind: "Service".into(),
            metadata,
            spec,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackend {
    pub service_name: String,
    pub port_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressPath {
    pub path: String,
    pub path_type: String,
    pub backend: IngressBackend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    pub paths: Vec<IngressPath>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressSpec {
    pub rules: Vec<IngressRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: IngressSpec,
}

impl Ingress {
    pub fn new(metadata: ObjectMeta, spec: IngressSpec) -> Self {
        Self {
            api_version: "networking.k8s.io/v1".into(),
            kind: "Ingress".into(),
            metadata,
            spec,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(metadata: ObjectMeta, data: BTreeMap<String, String>) -> Self {
        Self {
            api_version: "v1".into(),
            kind: "ConfigMap".into(),
            metadata,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Event wiring
// ---------------------------------------------------------------------------

/// Where events are delivered: an object reference and/or a URI (or path).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSpec {
    pub channel: ObjectReference,
    pub subscriber: Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: SubscriptionSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerFilter {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub broker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<TriggerFilter>,
    pub subscriber: Destination,
}

impl TriggerSpec {
    /// The `type` attribute the trigger filters on, if any.
    pub fn event_type(&self) -> Option<&str> {
        self.filter
            .as_ref()
            .and_then(|f| f.attributes.get("type"))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: TriggerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkBindingSpec {
    pub subject: ObjectReference,
    pub sink: Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkBinding {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: SinkBindingSpec,
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// Any object the pipeline can synthesize.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    Deployment(Deployment),
    Service(Service),
    KnativeService(KnativeService),
    Ingress(Ingress),
    ConfigMap(ConfigMap),
    Subscription(Subscription),
    Trigger(Trigger),
    SinkBinding(SinkBinding),
}

impl Resource {
    pub fn api_version(&self) -> &str {
        match self {
            Self::Deployment(r) => &r.api_version,
            Self::Service(r) => &r.api_version,
            Self::KnativeService(r) => &r.api_version,
            Self::Ingress(r) => &r.api_version,
            Self::ConfigMap(r) => &r.api_version,
            Self::Subscription(r) => &r.api_version,
            Self::Trigger(r) => &r.api_version,
            Self::SinkBinding(r) => &r.api_version,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Deployment(r) => &r.kind,
            Self::Service(r) => &r.kind,
            Self::KnativeService(r) => &r.kind,
            Self::Ingress(r) => &r.kind,
            Self::ConfigMap(r) => &r.kind,
            Self::Subscription(r) => &r.kind,
            Self::Trigger(r) => &r.kind,
            Self::SinkBinding(r) => &r.kind,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(r) => &r.metadata,
            Self::Service(r) => &r.metadata,
            Self::KnativeService(r) => &r.metadata,
            Self::Ingress(r) => &r.metadata,
            Self::ConfigMap(r) => &r.metadata,
            Self::Subscription(r) => &r.metadata,
            Self::Trigger(r) => &r.metadata,
            Self::SinkBinding(r) => &r.metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    pub fn object_reference(&self) -> ObjectReference {
        let meta = self.metadata();
        ObjectReference::new(self.api_version(), self.kind(), meta.name.clone())
            .in_namespace(meta.namespace.clone())
    }

    /// Workloads that own the integration pods
    pub fn is_controller(&self) -> bool {
        matches!(self, Self::Deployment(_) | Self::KnativeService(_))
    }

    pub fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        match self {
            Self::Deployment(d) => Some(&mut d.spec.template),
            Self::KnativeService(k) => Some(&mut k.spec.template),
            _ => None,
        }
    }

    pub fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            Self::Deployment(d) => Some(&d.spec.template),
            Self::KnativeService(k) => Some(&k.spec.template),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knative_service_reports_serving_kind() {
        let ksvc = Resource::KnativeService(KnativeService::new(
            ObjectMeta::named("it", "ns"),
            KnativeServiceSpec::default(),
        ));
        let r = ksvc.object_reference();
        assert_eq!(r.api_version, SERVING_API_VERSION);
        assert_eq!(r.kind, "Service");
        assert_eq!(r.namespace, "ns");
        assert!(ksvc.is_controller());
    }

    #[test]
    fn renders_as_manifest() {
        let svc = Resource::Service(Service::new(
            ObjectMeta::named("it", "ns"),
            ServiceSpec {
                service_type: "ClusterIP".into(),
                ..Default::default()
            },
        ));
        let v = serde_json::to_value(&svc).unwrap();
        assert_eq!(v["kind"], "Service");
        assert_eq!(v["apiVersion"], "v1");
        assert_eq!(v["spec"]["type"], "ClusterIP");
    }

    #[test]
    fn trigger_event_type_reads_filter() {
        let spec = TriggerSpec {
            broker: "default".into(),
            filter: Some(TriggerFilter {
                attributes: BTreeMap::from([("type".to_string(), "evt".to_string())]),
            }),
            subscriber: Destination::default(),
        };
        assert_eq!(spec.event_type(), Some("evt"));
    }
}
