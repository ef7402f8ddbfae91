//! Shared state of one trait run.

use std::collections::BTreeMap;

use super::{PostAction, TraitId};
use crate::cluster::{Cluster, RunContext};
use crate::collection::ResourceCollection;
use crate::error::Result;
use crate::metadata::RouteMetadata;
use crate::model::meta::{ObjectMeta, INTEGRATION_LABEL};
use crate::model::{Condition, Integration, IntegrationPhase, Platform, TraitsSpec};

/// Exclusively owned by the run; traits receive it by `&mut`.
pub struct Environment<'a> {
    pub integration: Integration,
    pub platform: Option<Platform>,
    /// Integration trait settings layered over the platform defaults
    pub traits: TraitsSpec,
    pub resources: ResourceCollection,
    pub application_properties: BTreeMap<String, String>,
    pub executed_traits: Vec<TraitId>,
    pub post_actions: Vec<PostAction>,
    pub conditions: Vec<Condition>,
    /// Default for the knative trait `namespaceLabel` setting
    pub namespace_label: bool,
    pub cluster: &'a dyn Cluster,
    pub ctx: &'a RunContext,
}

impl<'a> Environment<'a> {
    pub fn new(
        integration: Integration,
        platform: Option<Platform>,
        cluster: &'a dyn Cluster,
        ctx: &'a RunContext,
    ) -> Result<Self> {
        let traits = match &platform {
            Some(pl) => integration.spec.traits.with_defaults(&pl.spec.traits)?,
            None => integration.spec.traits.clone(),
        };
        Ok(Self {
            integration,
            platform,
            traits,
            resources: ResourceCollection::new(),
            application_properties: BTreeMap::new(),
            executed_traits: Vec::new(),
            post_actions: Vec::new(),
            conditions: Vec::new(),
            namespace_label: true,
            cluster,
            ctx,
        })
    }

    pub fn with_namespace_label(mut self, enabled: bool) -> Self {
        self.namespace_label = enabled;
        self
    }

    pub fn with_resources(mut self, resources: ResourceCollection) -> Self {
        self.resources = resources;
        self
    }

    pub fn in_phase(&self, phases: &[IntegrationPhase]) -> bool {
        self.integration.in_phase(phases)
    }

    pub fn in_running_phases(&self) -> bool {
        self.integration.in_running_phases()
    }

    pub fn route_metadata(&self) -> RouteMetadata {
        RouteMetadata::scan(&self.integration.spec.flows)
    }

    pub fn has_executed(&self, id: TraitId) -> bool {
        self.executed_traits.contains(&id)
    }

    pub fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Metadata for an object owned by the integration.
    pub fn owned_meta(&self, name: impl Into<String>) -> ObjectMeta {
        ObjectMeta::named(name, self.integration.namespace())
            .with_label(INTEGRATION_LABEL, self.integration.name())
    }

    /// Selector labels shared by the workload and its services.
    pub fn selector(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            INTEGRATION_LABEL.to_string(),
            self.integration.name().to_string(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::model::trait_spec::IngressTraitSpec;

    fn ingress(host: &str, path: Option<&str>) -> TraitsSpec {
        TraitsSpec {
            ingress: Some(IngressTraitSpec {
                host: Some(host.into()),
                path: path.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn integration_traits_override_platform_defaults() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let mut it = Integration::new(ObjectMeta::named("it", "ns"));
        it.spec.traits = ingress("own.example.com", None);
        let mut platform = Platform::default();
        platform.spec.traits = ingress("platform.example.com", Some("/api"));

        let env = Environment::new(it, Some(platform), &cluster, &ctx).unwrap();
        let effective = env.traits.ingress.unwrap();
        assert_eq!(effective.host.as_deref(), Some("own.example.com"));
        assert_eq!(effective.path.as_deref(), Some("/api"));
    }

    #[test]
    fn owned_meta_carries_integration_label() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let env = Environment::new(
            Integration::new(ObjectMeta::named("it", "ns")),
            None,
            &cluster,
            &ctx,
        )
        .unwrap();

        let meta = env.owned_meta("it-svc");
        assert_eq!(meta.namespace, "ns");
        assert_eq!(meta.labels[INTEGRATION_LABEL], "it");
        assert_eq!(env.selector(), meta.labels);
    }
}
