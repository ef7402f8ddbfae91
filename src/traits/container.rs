//! Container trait: the integration container on every controller workload.

use tracing::debug;

use super::environment::Environment;
use super::service::DEFAULT_PORT_NAME;
use super::{Configured, Trait, TraitId};
use crate::error::Result;
use crate::model::resources::{Container, ContainerPort};
use crate::model::trait_spec::ContainerTraitSpec;
use crate::model::Condition;

pub const DEFAULT_CONTAINER_NAME: &str = "integration";
pub const DEFAULT_CONTAINER_PORT: i32 = 8080;

#[derive(Debug, Default)]
pub struct ContainerTrait {
    spec: ContainerTraitSpec,
}

impl ContainerTrait {
    fn container(&self, env: &Environment<'_>) -> Container {
        let expose = self.spec.expose.unwrap_or_else(|| {
            self.spec.auto.unwrap_or(true)
                && (env.has_executed(TraitId::Service) || env.has_executed(TraitId::KnativeService))
        });
        let ports = if expose {
            vec![ContainerPort {
                name: self
                    .spec
                    .port_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PORT_NAME.to_string()),
                container_port: self.spec.port.unwrap_or(DEFAULT_CONTAINER_PORT),
                protocol: "TCP".into(),
            }]
        } else {
            Vec::new()
        };

        Container {
            name: self
                .spec
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string()),
            image: self
                .spec
                .image
                .clone()
                .unwrap_or_else(|| env.integration.status.image.clone()),
            image_pull_policy: self.spec.image_pull_policy.clone(),
            ports,
            env: Vec::new(),
        }
    }
}

impl Trait for ContainerTrait {
    fn id(&self) -> TraitId {
        TraitId::Container
    }

    fn configure(&mut self, env: &mut Environment<'_>) -> Result<Configured> {
        self.spec = env.traits.container.clone().unwrap_or_default();
        if self.spec.enabled == Some(false) {
            return Ok(Configured::disabled_with(Condition::user_disabled(self.id())));
        }
        if !env.in_running_phases() {
            return Ok(Configured::disabled());
        }
        Ok(Configured::enabled())
    }

    fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
        let container = self.container(env);
        let mut patched = 0;
        for template in env.resources.pod_templates_mut() {
            let containers = &mut template.spec.containers;
            match containers.iter_mut().find(|c| c.name == container.name) {
                Some(existing) => *existing = container.clone(),
                None => containers.push(container.clone()),
            }
            patched += 1;
        }
        debug!(
            container = %container.name,
            ports = container.ports.len(),
            workloads = patched,
            "Integration container set"
        );
        Ok(())
    }
}
