//! Resource collection
//!
//! Ordered, in-memory store of the objects synthesized during one trait run.
//! Later traits read and patch what earlier traits added, so insertion order
//! is preserved and `add_first` exists for objects that must be created
//! before everything else.

use crate::model::meta::{ObjectReference, INTEGRATION_LABEL, SERVICE_TYPE_LABEL, SERVICE_TYPE_USER};
use crate::model::resources::{
    ConfigMap, Deployment, Ingress, KnativeService, PodTemplateSpec, Resource, Service, Trigger,
};

#[derive(Debug, Clone, Default)]
pub struct ResourceCollection {
    items: Vec<Resource>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Resource>) -> Self {
        Self { items }
    }

    pub fn add(&mut self, resource: Resource) {
        self.items.push(resource);
    }

    pub fn add_first(&mut self, resource: Resource) {
        self.items.insert(0, resource);
    }

    pub fn add_all(&mut self, resources: impl IntoIterator<Item = Resource>) {
        self.items.extend(resources);
    }

    pub fn items(&self) -> &[Resource] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Resource> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.items.iter()
    }

    pub fn visit_mut(&mut self, mut f: impl FnMut(&mut Resource)) {
        for item in &mut self.items {
            f(item);
        }
    }

    /// Drop every resource matching the predicate, returning how many went.
    pub fn remove(&mut self, mut predicate: impl FnMut(&Resource) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|r| !predicate(r));
        before - self.items.len()
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.items.iter().map(Resource::kind).collect()
    }

    // ── typed access ──

    pub fn deployment(&self, name: &str) -> Option<&Deployment> {
        self.items.iter().find_map(|r| match r {
            Resource::Deployment(d) if d.metadata.name == name => Some(d),
            _ => None,
        })
    }

    pub fn knative_service(&self, name: &str) -> Option<&KnativeService> {
        self.items.iter().find_map(|r| match r {
            Resource::KnativeService(k) if k.metadata.name == name => Some(k),
            _ => None,
        })
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.items.iter().find_map(|r| match r {
            Resource::Service(s) if s.metadata.name == name => Some(s),
            _ => None,
        })
    }

    /// The user-facing Service of an integration.
    pub fn user_service_for(&self, integration: &str) -> Option<&Service> {
        self.items.iter().find_map(|r| match r {
            Resource::Service(s)
                if s.metadata.labels.get(INTEGRATION_LABEL).map(String::as_str)
                    == Some(integration)
                    && s.metadata.labels.get(SERVICE_TYPE_LABEL).map(String::as_str)
                        == Some(SERVICE_TYPE_USER) =>
            {
                Some(s)
            }
            _ => None,
        })
    }

    pub fn user_service_for_mut(&mut self, integration: &str) -> Option<&mut Service> {
        self.items.iter_mut().find_map(|r| match r {
            Resource::Service(s)
                if s.metadata.labels.get(INTEGRATION_LABEL).map(String::as_str)
                    == Some(integration)
                    && s.metadata.labels.get(SERVICE_TYPE_LABEL).map(String::as_str)
                        == Some(SERVICE_TYPE_USER) =>
            {
                Some(s)
            }
            _ => None,
        })
    }

    pub fn ingress(&self, name: &str) -> Option<&Ingress> {
        self.items.iter().find_map(|r| match r {
            Resource::Ingress(i) if i.metadata.name == name => Some(i),
            _ => None,
        })
    }

    pub fn config_map(&self, name: &str) -> Option<&ConfigMap> {
        self.items.iter().find_map(|r| match r {
            Resource::ConfigMap(c) if c.metadata.name == name => Some(c),
            _ => None,
        })
    }

    pub fn triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.items.iter().filter_map(|r| match r {
            Resource::Trigger(t) => Some(t),
            _ => None,
        })
    }

    pub fn has_trigger(&self, mut predicate: impl FnMut(&Trigger) -> bool) -> bool {
        self.triggers().any(|t| predicate(t))
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.items.iter().filter(|r| r.kind() == kind).count()
    }

    /// Whether a knative SinkBinding has already been injected.
    pub fn has_sink_binding(&self) -> bool {
        self.items.iter().any(|r| match r {
            Resource::SinkBinding(s) => s.api_version.contains("knative"),
            _ => false,
        })
    }

    /// Reference to the workload owning the integration pods.
    pub fn controller(&self) -> Option<ObjectReference> {
        self.items
            .iter()
            .find(|r| r.is_controller())
            .map(Resource::object_reference)
    }

    /// Pod templates of every controller workload.
    pub fn pod_templates_mut(&mut self) -> impl Iterator<Item = &mut PodTemplateSpec> {
        self.items.iter_mut().filter_map(Resource::pod_template_mut)
    }
}

impl<'a> IntoIterator for &'a ResourceCollection {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
