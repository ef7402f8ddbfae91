//! Integration test: trait catalog under the kubernetes profile.
//!
//! Covers workload synthesis, platform trait defaults, user-disabled traits
//! and fail-fast error reporting.

use pipe_integration::model::meta::ObjectMeta;
use pipe_integration::model::trait_spec::{IngressTraitSpec, ServiceTraitSpec};
use pipe_integration::model::{ConfigurationSpec, Flow};
use pipe_integration::traits::catalog::Catalog;
use pipe_integration::traits::environment::Environment;
use pipe_integration::{
    run, ConditionStatus, EngineConfig, InMemoryCluster, Integration, IntegrationPhase, Platform,
    Profile, RunContext, TraitId, TraitsSpec,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn http_integration() -> Integration {
    let mut it = Integration::new(ObjectMeta::named("hello", "demo"));
    it.spec.profile = Some(Profile::Kubernetes);
    it.status.phase = IntegrationPhase::Running;
    it.status.image = "registry.local/hello:1".into();
    it.spec.flows = vec![Flow(json!({
        "route": {"id": "binding", "from": {"uri": "platform-http:/hello", "steps": [{"to": "log:info"}]}}
    }))];
    it
}

fn platform_with_ingress_host(host: &str) -> Platform {
    let mut platform = Platform::default();
    platform.metadata = ObjectMeta::named("camel-k", "demo");
    platform.spec.traits = TraitsSpec {
        ingress: Some(IngressTraitSpec {
            host: Some(host.into()),
            ..Default::default()
        }),
        ..Default::default()
    };
    platform
}

#[test]
fn http_route_gets_deployment_service_and_ingress() {
    let cluster = InMemoryCluster::new().with_platform(platform_with_ingress_host("hello.local"));
    let ctx = RunContext::new();

    let outcome = run(&cluster, &ctx, &EngineConfig::default(), http_integration()).unwrap();

    assert_eq!(
        outcome.executed_traits,
        vec![
            TraitId::Camel,
            TraitId::Deployment,
            TraitId::Service,
            TraitId::Container,
            TraitId::Ingress,
        ]
    );
    assert_eq!(outcome.resources.kinds(), vec!["Deployment", "Service", "Ingress"]);

    let deployment = outcome.resources.deployment("hello").unwrap();
    let container = &deployment.spec.template.spec.containers[0];
    assert_eq!(container.image, "registry.local/hello:1");
    assert_eq!(container.ports[0].container_port, 8080);

    let ingress = outcome.resources.ingress("hello").unwrap();
    assert_eq!(ingress.spec.rules[0].host, "hello.local");

    for kind in ["DeploymentAvailable", "ServiceAvailable", "ExposureAvailable"] {
        let condition = outcome.integration.condition(kind).unwrap();
        assert_eq!(condition.status, ConditionStatus::True, "{kind}");
    }
    assert!(outcome.integration.status.dependencies.is_empty());
}

#[test]
fn user_properties_are_materialized() {
    let cluster = InMemoryCluster::new();
    let ctx = RunContext::new();
    let mut it = http_integration();
    it.spec
        .configuration
        .push(ConfigurationSpec::property("greeting=hi"));

    let outcome = run(&cluster, &ctx, &EngineConfig::default(), it).unwrap();
    let cm = outcome.resources.config_map("hello-user-properties").unwrap();
    assert_eq!(cm.data["user.properties"], "greeting=hi");
}

#[test]
fn disabled_service_leaves_ingress_without_target() {
    let cluster = InMemoryCluster::new();
    let ctx = RunContext::new();
    let mut it = http_integration();
    it.spec.traits.service = Some(ServiceTraitSpec {
        enabled: Some(false),
        ..Default::default()
    });

    let outcome = run(&cluster, &ctx, &EngineConfig::default(), it).unwrap();

    assert_eq!(outcome.resources.kinds(), vec!["Deployment"]);
    let info = outcome.integration.condition("TraitInfo").unwrap();
    assert_eq!(info.message, "service trait: explicitly disabled by the user");
    let exposure = outcome.integration.condition("ExposureAvailable").unwrap();
    assert_eq!(exposure.status, ConditionStatus::False);
}

#[test]
fn failing_trait_aborts_with_its_id() {
    let cluster = InMemoryCluster::new();
    let ctx = RunContext::new();
    let mut it = http_integration();
    it.spec.traits.service = Some(ServiceTraitSpec {
        enabled: Some(false),
        ..Default::default()
    });
    it.spec.traits.ingress = Some(IngressTraitSpec {
        auto: Some(false),
        ..Default::default()
    });

    let err = run(&cluster, &ctx, &EngineConfig::default(), it).unwrap_err();
    assert_eq!(
        err.to_string(),
        "ingress trait: cannot Apply ingress trait: no target service"
    );
}

#[test]
fn knative_only_traits_are_skipped_on_kubernetes() {
    let cluster = InMemoryCluster::new();
    let ctx = RunContext::new();
    let env = Environment::new(http_integration(), None, &cluster, &ctx).unwrap();

    let outcome = Catalog::new().run(env).unwrap();
    assert!(!outcome.executed_traits.contains(&TraitId::Knative));
    assert!(!outcome.executed_traits.contains(&TraitId::KnativeService));
}

#[test]
fn conflicting_platform_and_integration_settings_merge() {
    let cluster = InMemoryCluster::new().with_platform(platform_with_ingress_host("platform.local"));
    let ctx = RunContext::new();
    let mut it = http_integration();
    it.spec.traits.ingress = Some(IngressTraitSpec {
        host: Some("own.local".into()),
        ..Default::default()
    });

    let outcome = run(&cluster, &ctx, &EngineConfig::default(), it).unwrap();
    let ingress = outcome.resources.ingress("hello").unwrap();
    assert_eq!(ingress.spec.rules[0].host, "own.local");
}
