//! Cluster port
//!
//! Everything the translator and the traits need from the live cluster goes
//! through [`Cluster`]. Calls are synchronous; each one receives the
//! [`RunContext`] and must return [`PipeError::Cancelled`] promptly once the
//! run is cancelled or past its deadline.
//!
//! [`InMemoryCluster`] backs offline rendering and tests.

use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::{PipeError, Result};
use crate::model::meta::ObjectReference;
use crate::model::Platform;

/// Namespace label that turns on sink binding injection
pub const KNATIVE_BIND_LABEL: &str = "bindings.knative.dev/include";

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// Cancellation token plus optional deadline threaded through every lookup.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fail with [`PipeError::Cancelled`] once cancelled or past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(PipeError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(PipeError::Cancelled),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Read-mostly view of the cluster.
pub trait Cluster: Send + Sync {
    /// Platform governing `namespace`, if any. "Not found" is `Ok(None)`.
    fn platform_for(&self, ctx: &RunContext, namespace: &str) -> Result<Option<Platform>>;

    /// Whether the Knative serving component is installed.
    fn is_serving_installed(&self, ctx: &RunContext) -> Result<bool>;

    /// First candidate (in order) that exists as an addressable named `name`
    /// and already exposes an address. Objects without an address are skipped.
    fn find_addressable(
        &self,
        ctx: &RunContext,
        namespace: &str,
        name: &str,
        candidates: &[ObjectReference],
    ) -> Result<Option<ObjectReference>>;

    /// Current address of an addressable object.
    fn sink_url(&self, ctx: &RunContext, reference: &ObjectReference, namespace: &str)
        -> Result<Url>;

    /// Label the namespace for sink binding injection. Returns whether the
    /// label was newly added.
    fn enable_bind_in_namespace(&self, ctx: &RunContext, namespace: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addressable {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub url: Option<Url>,
}

impl Addressable {
    fn matches(&self, reference: &ObjectReference, namespace: &str) -> bool {
        self.api_version == reference.api_version
            && self.kind == reference.kind
            && self.name == reference.name
            && self.namespace == namespace
    }
}

/// Cluster snapshot as loaded from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterState {
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub serving_installed: bool,
    #[serde(default)]
    pub addressables: Vec<Addressable>,
    /// Namespace name → labels
    #[serde(default)]
    pub namespaces: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Default)]
pub struct InMemoryCluster {
    platforms: Vec<Platform>,
    serving_installed: bool,
    addressables: Vec<Addressable>,
    namespaces: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    lookup_failure: Option<String>,
    lookups: AtomicUsize,
    url_lookups: AtomicUsize,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: ClusterState) -> Self {
        Self {
            platforms: state.platforms,
            serving_installed: state.serving_installed,
            addressables: state.addressables,
            namespaces: Mutex::new(state.namespaces),
            ..Default::default()
        }
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let state: ClusterState =
            serde_yaml::from_str(raw).context("Failed to parse cluster snapshot")?;
        Ok(Self::from_state(state))
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cluster snapshot {}", path.display()))?;
        Self::from_yaml(&raw)
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platforms.push(platform);
        self
    }

    pub fn with_serving(mut self, installed: bool) -> Self {
        self.serving_installed = installed;
        self
    }

    pub fn with_addressable(mut self, reference: ObjectReference, url: Option<Url>) -> Self {
        self.addressables.push(Addressable {
            api_version: reference.api_version,
            kind: reference.kind,
            name: reference.name,
            namespace: reference.namespace,
            url,
        });
        self
    }

    pub fn with_namespace(self, namespace: &str) -> Self {
        if let Ok(mut namespaces) = self.namespaces.lock() {
            namespaces.entry(namespace.to_string()).or_default();
        }
        self
    }

    /// Make every addressable lookup fail with a cluster error.
    pub fn failing_lookups(mut self, message: impl Into<String>) -> Self {
        self.lookup_failure = Some(message.into());
        self
    }

    /// Number of `find_addressable` calls served
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of `sink_url` calls served
    pub fn url_lookup_count(&self) -> usize {
        self.url_lookups.load(Ordering::SeqCst)
    }

    pub fn namespace_labels(&self, namespace: &str) -> BTreeMap<String, String> {
        self.namespaces
            .lock()
            .ok()
            .and_then(|ns| ns.get(namespace).cloned())
            .unwrap_or_default()
    }
}

impl Cluster for InMemoryCluster {
    fn platform_for(&self, ctx: &RunContext, namespace: &str) -> Result<Option<Platform>> {
        ctx.check()?;
        let local = self
            .platforms
            .iter()
            .find(|p| p.metadata.namespace == namespace);
        let global = || self.platforms.iter().find(|p| p.metadata.namespace.is_empty());
        Ok(local.or_else(global).cloned())
    }

    fn is_serving_installed(&self, ctx: &RunContext) -> Result<bool> {
        ctx.check()?;
        Ok(self.serving_installed)
    }

    fn find_addressable(
        &self,
        ctx: &RunContext,
        namespace: &str,
        name: &str,
        candidates: &[ObjectReference],
    ) -> Result<Option<ObjectReference>> {
        ctx.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.lookup_failure {
            return Err(PipeError::Cluster(message.clone()));
        }
        debug!(namespace, name, candidates = candidates.len(), "Looking up addressable");

        let found = candidates.iter().find_map(|candidate| {
            let wanted = ObjectReference {
                name: name.to_string(),
                ..candidate.clone()
            };
            self.addressables
                .iter()
                .find(|a| a.matches(&wanted, namespace) && a.url.is_some())
                .map(|_| wanted.in_namespace(namespace))
        });
        Ok(found)
    }

    fn sink_url(
        &self,
        ctx: &RunContext,
        reference: &ObjectReference,
        namespace: &str,
    ) -> Result<Url> {
        ctx.check()?;
        self.url_lookups.fetch_add(1, Ordering::SeqCst);
        let ns = if reference.namespace.is_empty() {
            namespace
        } else {
            reference.namespace.as_str()
        };
        let addressable = self
            .addressables
            .iter()
            .find(|a| a.matches(reference, ns))
            .ok_or_else(|| {
                PipeError::Cluster(format!(
                    "{} {} not found in namespace {ns}",
                    reference.kind, reference.name
                ))
            })?;
        addressable.url.clone().ok_or_else(|| {
            PipeError::Cluster(format!(
                "{} {} has no address yet",
                reference.kind, reference.name
            ))
        })
    }

    fn enable_bind_in_namespace(&self, ctx: &RunContext, namespace: &str) -> Result<bool> {
        ctx.check()?;
        let mut namespaces = self
            .namespaces
            .lock()
            .map_err(|_| PipeError::Cluster("namespace store poisoned".into()))?;
        let labels = namespaces
            .get_mut(namespace)
            .ok_or_else(|| PipeError::Cluster(format!("namespace {namespace} not found")))?;
        if labels.get(KNATIVE_BIND_LABEL).map(String::as_str) == Some("true") {
            return Ok(false);
        }
        labels.insert(KNATIVE_BIND_LABEL.to_string(), "true".to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &str) -> ObjectReference {
        ObjectReference::new("messaging.knative.dev/v1", "Channel", name).in_namespace("ns")
    }

    #[test]
    fn cancelled_context_fails_fast() {
        let cluster = InMemoryCluster::new().with_serving(true);
        let ctx = RunContext::new();
        ctx.cancel();

        let err = cluster.is_serving_installed(&ctx).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn elapsed_deadline_is_cancellation() {
        let ctx = RunContext::new().with_timeout(Duration::ZERO);
        assert!(matches!(ctx.check(), Err(PipeError::Cancelled)));
    }

    #[test]
    fn find_addressable_respects_candidate_order() {
        let cluster = InMemoryCluster::new().with_addressable(
            ObjectReference::new("messaging.knative.dev/v1", "InMemoryChannel", "orders")
                .in_namespace("ns"),
            Some(Url::parse("http://orders.host/").unwrap()),
        );
        let candidates = vec![
            ObjectReference::new("messaging.knative.dev/v1", "Channel", ""),
            ObjectReference::new("messaging.knative.dev/v1", "InMemoryChannel", ""),
        ];
        let found = cluster
            .find_addressable(&RunContext::new(), "ns", "orders", &candidates)
            .unwrap()
            .unwrap();

        assert_eq!(found.kind, "InMemoryChannel");
        assert_eq!(found.name, "orders");
        assert_eq!(cluster.lookup_count(), 1);
    }

    #[test]
    fn find_addressable_skips_objects_without_address() {
        let cluster = InMemoryCluster::new()
            .with_addressable(channel("orders"), None)
            .with_addressable(
                ObjectReference::new("messaging.knative.dev/v1", "InMemoryChannel", "orders")
                    .in_namespace("ns"),
                Some(Url::parse("http://orders.host/").unwrap()),
            );
        let candidates = vec![
            ObjectReference::new("messaging.knative.dev/v1", "Channel", ""),
            ObjectReference::new("messaging.knative.dev/v1", "InMemoryChannel", ""),
        ];
        let found = cluster
            .find_addressable(&RunContext::new(), "ns", "orders", &candidates)
            .unwrap()
            .unwrap();

        assert_eq!(found.kind, "InMemoryChannel");
    }

    #[test]
    fn sink_url_requires_address() {
        let url = Url::parse("http://orders.host/").unwrap();
        let cluster = InMemoryCluster::new()
            .with_addressable(channel("orders"), Some(url.clone()))
            .with_addressable(channel("pending"), None);
        let ctx = RunContext::new();

        assert_eq!(cluster.sink_url(&ctx, &channel("orders"), "ns").unwrap(), url);
        assert!(cluster.sink_url(&ctx, &channel("pending"), "ns").is_err());
        assert_eq!(cluster.url_lookup_count(), 2);
    }

    #[test]
    fn bind_label_is_set_once() {
        let cluster = InMemoryCluster::new().with_namespace("ns");
        let ctx = RunContext::new();

        assert!(cluster.enable_bind_in_namespace(&ctx, "ns").unwrap());
        assert!(!cluster.enable_bind_in_namespace(&ctx, "ns").unwrap());
        assert_eq!(cluster.namespace_labels("ns")[KNATIVE_BIND_LABEL], "true");
        assert!(cluster.enable_bind_in_namespace(&ctx, "other").is_err());
    }

    #[test]
    fn loads_snapshot_yaml() {
        let yaml = r#"
servingInstalled: true
platforms:
  - metadata:
      name: camel-k
      namespace: ns
    spec:
      profile: knative
addressables:
  - apiVersion: eventing.knative.dev/v1
    kind: Broker
    name: default
    namespace: ns
    url: http://broker-default.host/
namespaces:
  ns: {}
"#;
        let cluster = InMemoryCluster::from_yaml(yaml).unwrap();
        let ctx = RunContext::new();
        assert!(cluster.is_serving_installed(&ctx).unwrap());
        assert!(cluster.platform_for(&ctx, "ns").unwrap().is_some());
        assert!(cluster.platform_for(&ctx, "elsewhere").unwrap().is_none());
        let broker = ObjectReference::new("eventing.knative.dev/v1", "Broker", "default");
        assert_eq!(
            cluster.sink_url(&ctx, &broker, "ns").unwrap().as_str(),
            "http://broker-default.host/"
        );
    }
}
