//! Knative resolver
//!
//! Turns the (possibly kind-less) references listed on the knative trait
//! into concrete addressables:
//!
//! ```text
//! names ──► extract_services (trim, normalize, dedup, sort)
//!             │
//!             ▼
//!        reference ──► fallback table ──► 1 candidate: taken as-is
//!                                    └──► n candidates: one cluster lookup
//!             │
//!             ▼
//!        handler(reference, uri, lazy UrlProvider)
//! ```

use tracing::{debug, info};
use url::Url;

use crate::cluster::{Cluster, RunContext};
use crate::error::{PipeError, Result};
use crate::model::knative::{CamelEndpointKind, CamelEnvironment, CamelServiceType};
use crate::model::meta::ObjectReference;

use super::references::fill_missing_reference_data;
use super::uri::{extract_object_reference, normalize_to_uri};

/// Resolves the address of one addressable when, and only when, asked.
pub struct UrlProvider<'a> {
    cluster: &'a dyn Cluster,
    ctx: &'a RunContext,
    reference: ObjectReference,
    namespace: &'a str,
    description: String,
}

impl UrlProvider<'_> {
    pub fn get(&self) -> Result<Url> {
        self.ctx.check()?;
        let url = self
            .cluster
            .sink_url(self.ctx, &self.reference, self.namespace)
            .map_err(|e| e.context(format!("cannot determine address of {}", self.description)))?;
        info!(target_url = %url, "Found URL for {}", self.description);
        Ok(url)
    }
}

/// One resolved entry handed to a wiring handler.
pub struct ResolvedService<'a> {
    /// Reference with apiVersion and kind filled in
    pub reference: ObjectReference,
    /// Normalized `knative:` URI the entry came from
    pub uri: String,
    pub url: UrlProvider<'a>,
}

pub struct KnativeResolver<'a> {
    cluster: &'a dyn Cluster,
    ctx: &'a RunContext,
    namespace: String,
}

impl<'a> KnativeResolver<'a> {
    pub fn new(cluster: &'a dyn Cluster, ctx: &'a RunContext, namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            ctx,
            namespace: namespace.into(),
        }
    }

    /// Trim, normalize, deduplicate and sort a list of names or URIs.
    pub fn extract_services(names: &[String], service_type: CamelServiceType) -> Vec<String> {
        let mut services: Vec<String> = names
            .iter()
            .map(|item| item.trim_matches(|c| c == ' ' || c == '\t' || c == '"'))
            .filter(|item| !item.is_empty())
            .map(|item| normalize_to_uri(service_type, item))
            .collect();
        services.sort();
        services.dedup();
        services
    }

    /// Fill in apiVersion/kind, consulting the cluster only when the
    /// fallback table leaves more than one candidate.
    pub fn resolve(
        &self,
        service_type: CamelServiceType,
        reference: &ObjectReference,
    ) -> Result<ObjectReference> {
        self.ctx.check()?;
        let not_found = || PipeError::NotFound {
            service_type,
            name: reference.name.clone(),
        };

        let mut candidates = fill_missing_reference_data(service_type, reference);
        match candidates.len() {
            0 => Err(not_found()),
            1 => Ok(candidates.remove(0)),
            n => {
                debug!(
                    name = %reference.name,
                    candidates = n,
                    "Resolving ambiguous {} reference", service_type
                );
                match self
                    .cluster
                    .find_addressable(self.ctx, &self.namespace, &reference.name, &candidates)
                {
                    Ok(Some(found)) => Ok(found),
                    Ok(None) => Err(not_found()),
                    Err(PipeError::Cancelled) => Err(PipeError::Cancelled),
                    Err(e) => Err(PipeError::Lookup {
                        service_type,
                        name: reference.name.clone(),
                        source: Box::new(e),
                    }),
                }
            }
        }
    }

    /// Run `handler` for every service, skipping ones already in `env`.
    pub fn if_service_missing_do<F>(
        &self,
        env: &mut CamelEnvironment,
        uris: &[String],
        service_type: CamelServiceType,
        endpoint_kind: CamelEndpointKind,
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(&mut CamelEnvironment, ResolvedService<'_>) -> Result<()>,
    {
        self.with_service_do(true, env, uris, service_type, endpoint_kind, handler)
    }

    /// Run `handler` for every service in `uris`.
    ///
    /// With `skip_duplicates`, entries already present in `env` (same name,
    /// endpoint kind and service type) are skipped before any lookup.
    pub fn with_service_do<F>(
        &self,
        skip_duplicates: bool,
        env: &mut CamelEnvironment,
        uris: &[String],
        service_type: CamelServiceType,
        endpoint_kind: CamelEndpointKind,
        mut handler: F,
    ) -> Result<()>
    where
        F: FnMut(&mut CamelEnvironment, ResolvedService<'_>) -> Result<()>,
    {
        for uri in Self::extract_services(uris, service_type) {
            self.ctx.check()?;
            let reference = extract_object_reference(&uri)?;
            if skip_duplicates
                && env.contains_service(
                    &reference.name,
                    endpoint_kind,
                    service_type,
                    &reference.api_version,
                    &reference.kind,
                )
            {
                debug!(%uri, "Knative service already configured, skipping");
                continue;
            }

            let actual = self.resolve(service_type, &reference)?;
            let description = service_type.resource_description(&reference.name);
            let resolved = ResolvedService {
                url: UrlProvider {
                    cluster: self.cluster,
                    ctx: self.ctx,
                    reference: actual.clone(),
                    namespace: &self.namespace,
                    description: description.clone(),
                },
                reference: actual,
                uri,
            };
            handler(env, resolved).map_err(|e| {
                e.context(format!(
                    "unexpected error while executing handler for {description}"
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::model::knative::CamelServiceDefinition;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn channel(name: &str) -> ObjectReference {
        ObjectReference::new("messaging.knative.dev/v1", "Channel", name).in_namespace("ns")
    }

    #[test]
    fn extract_services_is_deterministic() {
        let out = KnativeResolver::extract_services(
            &names(&[" \"b\" ", "a", "\t", "knative:channel/a", "c"]),
            CamelServiceType::Channel,
        );
        assert_eq!(
            out,
            vec!["knative:channel/a", "knative:channel/b", "knative:channel/c"]
        );
    }

    #[test]
    fn single_candidate_needs_no_lookup() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");

        let r = resolver
            .resolve(
                CamelServiceType::Endpoint,
                &ObjectReference {
                    name: "svc".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(r.kind, "Service");
        assert_eq!(cluster.lookup_count(), 0);
    }

    #[test]
    fn ambiguous_reference_uses_one_lookup() {
        let cluster = InMemoryCluster::new().with_addressable(
            channel("orders"),
            Some(Url::parse("http://orders.ns.svc/").unwrap()),
        );
        let ctx = RunContext::new();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");

        let r = resolver
            .resolve(
                CamelServiceType::Channel,
                &ObjectReference {
                    name: "orders".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(r.kind, "Channel");
        assert_eq!(cluster.lookup_count(), 1);
    }

    #[test]
    fn addressable_without_address_is_not_found() {
        let cluster = InMemoryCluster::new().with_addressable(
            ObjectReference::new("messaging.knative.dev/v1", "InMemoryChannel", "orders")
                .in_namespace("ns"),
            None,
        );
        let ctx = RunContext::new();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");

        let err = resolver
            .resolve(
                CamelServiceType::Channel,
                &ObjectReference {
                    name: "orders".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cluster.lookup_count(), 1);
    }

    #[test]
    fn missing_addressable_is_not_found() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");

        let err = resolver
            .resolve(
                CamelServiceType::Channel,
                &ObjectReference {
                    name: "missing".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "cannot find channel missing");
    }

    #[test]
    fn cluster_failure_is_wrapped_as_lookup_error() {
        let cluster = InMemoryCluster::new().failing_lookups("connection refused");
        let ctx = RunContext::new();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");

        let err = resolver
            .resolve(
                CamelServiceType::Channel,
                &ObjectReference {
                    name: "orders".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, PipeError::Lookup { .. }));
        assert!(err.to_string().starts_with("error looking up channel orders"));
    }

    #[test]
    fn url_provider_is_lazy() {
        let url = Url::parse("http://svc.host/").unwrap();
        let cluster = InMemoryCluster::new().with_addressable(
            ObjectReference::new("serving.knative.dev/v1", "Service", "svc").in_namespace("ns"),
            Some(url.clone()),
        );
        let ctx = RunContext::new();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");
        let mut env = CamelEnvironment::new();

        resolver
            .if_service_missing_do(
                &mut env,
                &names(&["svc"]),
                CamelServiceType::Endpoint,
                CamelEndpointKind::Sink,
                |_, _| Ok(()),
            )
            .unwrap();
        assert_eq!(cluster.url_lookup_count(), 0);

        resolver
            .if_service_missing_do(
                &mut env,
                &names(&["svc"]),
                CamelServiceType::Endpoint,
                CamelEndpointKind::Sink,
                |env, svc| {
                    let found = svc.url.get()?;
                    env.push(CamelServiceDefinition::with_url(
                        svc.reference.name.clone(),
                        CamelEndpointKind::Sink,
                        CamelServiceType::Endpoint,
                        &found,
                        &svc.reference.api_version,
                        &svc.reference.kind,
                    ));
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(cluster.url_lookup_count(), 1);
        assert_eq!(env.services[0].url.as_deref(), Some("http://svc.host/"));
    }

    #[test]
    fn existing_services_are_skipped() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");
        let mut env = CamelEnvironment::new();
        env.push(CamelServiceDefinition::new(
            "svc",
            CamelServiceType::Endpoint,
            CamelEndpointKind::Sink,
            "serving.knative.dev/v1",
            "Service",
        ));

        let mut calls = 0;
        resolver
            .if_service_missing_do(
                &mut env,
                &names(&["svc"]),
                CamelServiceType::Endpoint,
                CamelEndpointKind::Sink,
                |_, _| {
                    calls += 1;
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn handler_errors_keep_kind_and_gain_context() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");
        let mut env = CamelEnvironment::new();

        let err = resolver
            .with_service_do(
                false,
                &mut env,
                &names(&["svc"]),
                CamelServiceType::Endpoint,
                CamelEndpointKind::Sink,
                |_, svc| svc.url.get().map(|_| ()),
            )
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("unexpected error while executing handler for endpoint svc"));
        assert!(msg.contains("cannot determine address of endpoint svc"));
    }

    #[test]
    fn cancellation_propagates_verbatim() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        ctx.cancel();
        let resolver = KnativeResolver::new(&cluster, &ctx, "ns");
        let mut env = CamelEnvironment::new();

        let err = resolver
            .with_service_do(
                false,
                &mut env,
                &names(&["svc"]),
                CamelServiceType::Endpoint,
                CamelEndpointKind::Sink,
                |_, _| Ok(()),
            )
            .unwrap_err();
        assert!(matches!(err, PipeError::Cancelled));
    }
}
