//! Trait pipeline
//!
//! A closed set of traits turns an Integration into deployable resources.
//! One run goes through four stages, all against the same [`Environment`]:
//!
//! ```text
//!   configure ──► exclusion policy ──► apply ──► post-actions
//!   (every applicable    (losers flip      (enabled     (drained once,
//!    trait, ascending     to disabled)      traits,      registration
//!    priority)                              same order)  order)
//! ```
//!
//! Any error aborts the run; the caller gets either a complete
//! [`RunOutcome`] or a single error tagged with the failing trait.

pub mod camel;
pub mod catalog;
pub mod container;
pub mod deployment;
pub mod environment;
pub mod ingress;
pub mod knative;
pub mod knative_service;
pub mod policy;
pub mod service;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::cluster::{Cluster, RunContext};
use crate::collection::ResourceCollection;
use crate::config::EngineConfig;
use crate::error::{Result, ResultExt};
use crate::model::meta::ObjectReference;
use crate::model::{Condition, Integration, Profile};

pub use catalog::Catalog;
pub use environment::Environment;

pub const CAPABILITY_KNATIVE: &str = "knative";
pub const CAPABILITY_PLATFORM_HTTP: &str = "platform-http";

/// Maven coordinates providing each capability at runtime
const CAPABILITY_DEPENDENCIES: &[(&str, &str)] = &[
    (
        CAPABILITY_KNATIVE,
        "mvn:org.apache.camel.quarkus:camel-quarkus-knative",
    ),
    (
        CAPABILITY_PLATFORM_HTTP,
        "mvn:org.apache.camel.quarkus:camel-quarkus-platform-http",
    ),
];

// ---------------------------------------------------------------------------
// Trait identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraitId {
    Camel,
    Knative,
    Deployment,
    KnativeService,
    Service,
    Container,
    Ingress,
}

impl TraitId {
    pub const ALL: [TraitId; 7] = [
        Self::Camel,
        Self::Knative,
        Self::Deployment,
        Self::KnativeService,
        Self::Service,
        Self::Container,
        Self::Ingress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Camel => "camel",
            Self::Knative => "knative",
            Self::Deployment => "deployment",
            Self::KnativeService => "knative-service",
            Self::Service => "service",
            Self::Container => "container",
            Self::Ingress => "ingress",
        }
    }

    /// Lower runs first.
    pub fn priority(self) -> u32 {
        match self {
            Self::Camel => 200,
            Self::Knative => 400,
            Self::Deployment => 1100,
            Self::KnativeService => 1150,
            Self::Service => 1500,
            Self::Container => 1600,
            Self::Ingress => 2400,
        }
    }
}

impl fmt::Display for TraitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trait interface
// ---------------------------------------------------------------------------

/// Result of the configure stage for one trait.
#[derive(Debug, Clone, PartialEq)]
pub struct Configured {
    pub enabled: bool,
    /// Informational or negative condition, reported even when disabled
    pub condition: Option<Condition>,
}

impl Configured {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            condition: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            condition: None,
        }
    }

    pub fn disabled_with(condition: Condition) -> Self {
        Self {
            enabled: false,
            condition: Some(condition),
        }
    }
}

/// One trait of the closed set.
///
/// Instances hold state between `configure` and `apply` and live for a
/// single run.
pub trait Trait: Send + Sync {
    fn id(&self) -> TraitId;

    fn priority(&self) -> u32 {
        self.id().priority()
    }

    fn allowed_in_profile(&self, _profile: Profile) -> bool {
        true
    }

    fn configure(&mut self, env: &mut Environment<'_>) -> Result<Configured>;

    fn apply(&mut self, env: &mut Environment<'_>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Deferred actions
// ---------------------------------------------------------------------------

/// Work registered during apply that must see the final resource set.
#[derive(Debug, Clone, PartialEq)]
pub enum PostAction {
    /// Render application and user properties into config maps.
    MaterializeProperties,
    /// Bind the controller workload to `target` unless a SinkBinding exists.
    InjectSinkBinding {
        target: ObjectReference,
        namespace_label: bool,
    },
}

impl PostAction {
    /// Trait that registered the action
    pub fn owner(&self) -> TraitId {
        match self {
            Self::MaterializeProperties => TraitId::Camel,
            Self::InjectSinkBinding { .. } => TraitId::Knative,
        }
    }

    pub fn execute(self, env: &mut Environment<'_>) -> Result<()> {
        match self {
            Self::MaterializeProperties => camel::materialize_properties(env),
            Self::InjectSinkBinding {
                target,
                namespace_label,
            } => knative::inject_sink_binding(env, &target, namespace_label),
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Integration with replace-by-type conditions and resolved dependencies
    pub integration: Integration,
    pub resources: ResourceCollection,
    /// Every condition generated during the run, in generation order
    pub conditions: Vec<Condition>,
    pub application_properties: BTreeMap<String, String>,
    pub executed_traits: Vec<TraitId>,
}

/// Resolve capabilities into runtime dependencies, unique and sorted.
pub fn resolve_dependencies(integration: &mut Integration) {
    let mut deps = integration.status.dependencies.clone();
    for capability in &integration.status.capabilities {
        if let Some((_, dep)) = CAPABILITY_DEPENDENCIES
            .iter()
            .find(|(cap, _)| cap == capability)
        {
            deps.push((*dep).to_string());
        }
    }
    deps.sort();
    deps.dedup();
    integration.status.dependencies = deps;
}

/// Run the full trait catalog over `integration`.
pub fn run(
    cluster: &dyn Cluster,
    ctx: &RunContext,
    config: &EngineConfig,
    integration: Integration,
) -> Result<RunOutcome> {
    let namespace = integration.namespace().to_string();
    let platform = cluster
        .platform_for(ctx, &namespace)
        .with_context(|| format!("cannot look up the platform for namespace {namespace}"))?;
    let env = Environment::new(integration, platform, cluster, ctx)?
        .with_namespace_label(config.namespace_label);
    Catalog::new().run(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_are_strictly_ascending() {
        let priorities: Vec<u32> = TraitId::ALL.iter().map(|id| id.priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn ids_render_kebab_case() {
        assert_eq!(TraitId::KnativeService.to_string(), "knative-service");
        assert_eq!(
            serde_json::to_value(TraitId::KnativeService).unwrap(),
            "knative-service"
        );
    }

    #[test]
    fn dependencies_follow_capabilities() {
        let mut it = Integration::default();
        it.add_capability(CAPABILITY_PLATFORM_HTTP);
        it.add_capability(CAPABILITY_KNATIVE);
        it.add_capability("unknown");
        it.status.dependencies = vec!["mvn:org.apache.camel.quarkus:camel-quarkus-knative".into()];

        resolve_dependencies(&mut it);
        assert_eq!(
            it.status.dependencies,
            vec![
                "mvn:org.apache.camel.quarkus:camel-quarkus-knative".to_string(),
                "mvn:org.apache.camel.quarkus:camel-quarkus-platform-http".to_string(),
            ]
        );
    }

    #[test]
    fn post_actions_name_their_owner() {
        assert_eq!(PostAction::MaterializeProperties.owner(), TraitId::Camel);
        let inject = PostAction::InjectSinkBinding {
            target: ObjectReference::new("messaging.knative.dev/v1", "Channel", "c"),
            namespace_label: true,
        };
        assert_eq!(inject.owner(), TraitId::Knative);
    }
}
