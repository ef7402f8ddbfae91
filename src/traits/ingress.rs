//! Ingress trait: exposes the user service outside the cluster.

use tracing::{debug, info};

use super::environment::Environment;
use super::service::DEFAULT_PORT_NAME;
use super::{Configured, Trait, TraitId};
use crate::error::{PipeError, Result};
use crate::model::condition::{
    EXPOSURE_AVAILABLE, INGRESS_AVAILABLE_REASON, INGRESS_NOT_AVAILABLE_REASON,
};
use crate::model::meta::ObjectMeta;
use crate::model::resources::{
    Ingress, IngressBackend, IngressPath, IngressRule, IngressSpec, Resource,
};
use crate::model::trait_spec::IngressTraitSpec;
use crate::model::{Condition, ConditionStatus, Profile};

pub const DEFAULT_PATH: &str = "/";
pub const DEFAULT_PATH_TYPE: &str = "Prefix";

#[derive(Debug, Default)]
pub struct IngressTrait {
    spec: IngressTraitSpec,
}

fn not_available(message: &str) -> Condition {
    Condition::new(
        EXPOSURE_AVAILABLE,
        ConditionStatus::False,
        INGRESS_NOT_AVAILABLE_REASON,
        message,
    )
}

impl Trait for IngressTrait {
    fn id(&self) -> TraitId {
        TraitId::Ingress
    }

    fn allowed_in_profile(&self, profile: Profile) -> bool {
        profile == Profile::Kubernetes
    }

    fn configure(&mut self, env: &mut Environment<'_>) -> Result<Configured> {
        self.spec = env.traits.ingress.clone().unwrap_or_default();
        if self.spec.enabled == Some(false) {
            return Ok(Configured::disabled_with(not_available("explicitly disabled")));
        }
        if !env.in_running_phases() {
            return Ok(Configured::disabled());
        }
        Ok(Configured::enabled())
    }

    fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
        let integration = env.integration.name().to_string();
        let target = env
            .resources
            .user_service_for(&integration)
            .map(|svc| svc.metadata.name.clone());
        let Some(service_name) = target else {
            if self.spec.auto == Some(false) {
                return Err(PipeError::validation(
                    "cannot Apply ingress trait: no target service",
                ));
            }
            debug!(%integration, "No user service, ingress skipped");
            env.push_condition(not_available("no target service found"));
            return Ok(());
        };

        let host = self.spec.host.clone().unwrap_or_default();
        let path = IngressPath {
            path: self
                .spec
                .path
                .clone()
                .unwrap_or_else(|| DEFAULT_PATH.to_string()),
            path_type: self
                .spec
                .path_type
                .clone()
                .unwrap_or_else(|| DEFAULT_PATH_TYPE.to_string()),
            backend: IngressBackend {
                service_name: service_name.clone(),
                port_name: DEFAULT_PORT_NAME.to_string(),
            },
        };
        let meta = ObjectMeta {
            annotations: self.spec.annotations.clone(),
            ..env.owned_meta(service_name.clone())
        };
        env.resources.add(Resource::Ingress(Ingress::new(
            meta,
            IngressSpec {
                rules: vec![IngressRule {
                    host: host.clone(),
                    paths: vec![path],
                }],
            },
        )));

        let message = format!("{service_name}({host}) -> {service_name}({DEFAULT_PORT_NAME})");
        info!(%message, "Ingress added");
        env.push_condition(Condition::new(
            EXPOSURE_AVAILABLE,
            ConditionStatus::True,
            INGRESS_AVAILABLE_REASON,
            message,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, RunContext};
    use crate::model::meta::{INTEGRATION_LABEL, SERVICE_TYPE_LABEL, SERVICE_TYPE_USER};
    use crate::model::resources::{Service, ServiceSpec};
    use crate::model::{Integration, IntegrationPhase, TraitsSpec};

    fn env<'a>(
        cluster: &'a InMemoryCluster,
        ctx: &'a RunContext,
        spec: IngressTraitSpec,
    ) -> Environment<'a> {
        let mut it = Integration::new(ObjectMeta::named("it", "ns"));
        it.status.phase = IntegrationPhase::Running;
        it.spec.traits = TraitsSpec {
            ingress: Some(spec),
            ..Default::default()
        };
        Environment::new(it, None, cluster, ctx).unwrap()
    }

    fn user_service() -> Resource {
        let meta = ObjectMeta::named("it", "ns")
            .with_label(INTEGRATION_LABEL, "it")
            .with_label(SERVICE_TYPE_LABEL, SERVICE_TYPE_USER);
        Resource::Service(Service::new(meta, ServiceSpec::default()))
    }

    #[test]
    fn routes_host_to_user_service() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let mut env = env(
            &cluster,
            &ctx,
            IngressTraitSpec {
                host: Some("hello.example.com".into()),
                ..Default::default()
            },
        );
        env.resources.add(user_service());

        let mut t = IngressTrait::default();
        assert!(t.configure(&mut env).unwrap().enabled);
        t.apply(&mut env).unwrap();

        let ingress = env.resources.ingress("it").unwrap();
        let rule = &ingress.spec.rules[0];
        assert_eq!(rule.host, "hello.example.com");
        assert_eq!(rule.paths[0].path, "/");
        assert_eq!(rule.paths[0].path_type, "Prefix");
        assert_eq!(rule.paths[0].backend.service_name, "it");

        let condition = &env.conditions[0];
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.message, "it(hello.example.com) -> it(http)");
    }

    #[test]
    fn missing_service_is_skipped_in_auto_mode() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let mut env = env(&cluster, &ctx, IngressTraitSpec::default());

        let mut t = IngressTrait::default();
        t.configure(&mut env).unwrap();
        t.apply(&mut env).unwrap();

        assert!(env.resources.is_empty());
        assert_eq!(env.conditions[0].reason, INGRESS_NOT_AVAILABLE_REASON);
    }

    #[test]
    fn missing_service_fails_without_auto() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let mut env = env(
            &cluster,
            &ctx,
            IngressTraitSpec {
                auto: Some(false),
                ..Default::default()
            },
        );

        let mut t = IngressTrait::default();
        t.configure(&mut env).unwrap();
        let err = t.apply(&mut env).unwrap_err();
        assert_eq!(err.to_string(), "cannot Apply ingress trait: no target service");
    }

    #[test]
    fn explicit_disable_reports_exposure() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let mut env = env(
            &cluster,
            &ctx,
            IngressTraitSpec {
                enabled: Some(false),
                ..Default::default()
            },
        );
        let configured = IngressTrait::default().configure(&mut env).unwrap();
        assert!(!configured.enabled);
        assert_eq!(configured.condition.unwrap().kind, EXPOSURE_AVAILABLE);
    }
}
