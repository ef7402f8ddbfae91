//! Service trait: cluster Service in front of an HTTP-exposing workload.

use tracing::debug;

use super::environment::Environment;
use super::{Configured, Trait, TraitId};
use crate::error::Result;
use crate::model::condition::{SERVICE_AVAILABLE, SERVICE_AVAILABLE_REASON};
use crate::model::meta::{SERVICE_TYPE_LABEL, SERVICE_TYPE_USER};
use crate::model::resources::{Resource, Service, ServicePort, ServiceSpec};
use crate::model::trait_spec::ServiceTraitSpec;
use crate::model::{Condition, ConditionStatus};

pub const DEFAULT_SERVICE_PORT: i32 = 80;
pub const DEFAULT_PORT_NAME: &str = "http";

#[derive(Debug, Default)]
pub struct ServiceTrait {
    spec: ServiceTraitSpec,
}

impl Trait for ServiceTrait {
    fn id(&self) -> TraitId {
        TraitId::Service
    }

    fn configure(&mut self, env: &mut Environment<'_>) -> Result<Configured> {
        self.spec = env.traits.service.clone().unwrap_or_default();
        if self.spec.enabled == Some(false) {
            return Ok(Configured::disabled_with(Condition::user_disabled(self.id())));
        }
        if !env.in_running_phases() {
            return Ok(Configured::disabled());
        }
        let enabled = self.spec.enabled == Some(true)
            || (self.spec.auto.unwrap_or(true) && env.route_metadata().exposes_http());
        Ok(if enabled {
            Configured::enabled()
        } else {
            Configured::disabled()
        })
    }

    fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
        let name = env.integration.name().to_string();
        let container = env.traits.container.clone().unwrap_or_default();
        let port = container.service_port.unwrap_or(DEFAULT_SERVICE_PORT);
        let port_name = container
            .service_port_name
            .unwrap_or_else(|| DEFAULT_PORT_NAME.to_string());
        let target_port = container
            .port_name
            .unwrap_or_else(|| DEFAULT_PORT_NAME.to_string());
        let service_type = if self.spec.node_port == Some(true) {
            "NodePort"
        } else {
            "ClusterIP"
        };

        let meta = env
            .owned_meta(name.clone())
            .with_label(SERVICE_TYPE_LABEL, SERVICE_TYPE_USER);
        let spec = ServiceSpec {
            service_type: service_type.to_string(),
            selector: env.selector(),
            ports: vec![ServicePort {
                name: port_name.clone(),
                port,
                target_port: target_port.clone(),
                protocol: "TCP".into(),
            }],
        };
        env.resources.add(Resource::Service(Service::new(meta, spec)));
        env.push_condition(Condition::new(
            SERVICE_AVAILABLE,
            ConditionStatus::True,
            SERVICE_AVAILABLE_REASON,
            format!("{name}({port_name}/{port}) -> {name}({target_port})"),
        ));
        debug!(service = %name, %service_type, "Service added");
        Ok(())
    }
}
