//! Deployment trait: the default controller workload.

use tracing::debug;

use super::environment::Environment;
use super::{Configured, Trait, TraitId};
use crate::error::Result;
use crate::model::condition::DEPLOYMENT_AVAILABLE;
use crate::model::meta::ObjectMeta;
use crate::model::resources::{
    Deployment, DeploymentSpec, LabelSelector, PodSpec, PodTemplateSpec, Resource,
};
use crate::model::trait_spec::DeploymentTraitSpec;
use crate::model::{Condition, ConditionStatus};

pub const DEFAULT_PROGRESS_DEADLINE_SECONDS: i32 = 60;

#[derive(Debug, Default)]
pub struct DeploymentTrait {
    spec: DeploymentTraitSpec,
}

impl Trait for DeploymentTrait {
    fn id(&self) -> TraitId {
        TraitId::Deployment
    }

    fn configure(&mut self, env: &mut Environment<'_>) -> Result<Configured> {
        self.spec = env.traits.deployment.clone().unwrap_or_default();
        if self.spec.enabled == Some(false) {
            return Ok(Configured::disabled_with(Condition::new(
                DEPLOYMENT_AVAILABLE,
                ConditionStatus::False,
                "deploymentTraitConfiguration",
                "explicitly disabled by the user",
            )));
        }
        if !env.in_running_phases() {
            return Ok(Configured::disabled());
        }
        Ok(Configured::enabled())
    }

    fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
        let name = env.integration.name().to_string();
        let selector = env.selector();
        let template = PodTemplateSpec {
            metadata: ObjectMeta {
                labels: selector.clone(),
                ..Default::default()
            },
            spec: PodSpec {
                containers: Vec::new(),
                service_account_name: env.integration.spec.service_account_name.clone(),
            },
        };
        let spec = DeploymentSpec {
            replicas: env.integration.spec.replicas,
            selector: LabelSelector {
                match_labels: selector,
            },
            template,
            strategy: self.spec.strategy.clone(),
            progress_deadline_seconds: Some(
                self.spec
                    .progress_deadline_seconds
                    .unwrap_or(DEFAULT_PROGRESS_DEADLINE_SECONDS),
            ),
        };

        let meta = env.owned_meta(name.clone());
        env.resources
            .add(Resource::Deployment(Deployment::new(meta, spec)));
        env.push_condition(Condition::new(
            DEPLOYMENT_AVAILABLE,
            ConditionStatus::True,
            "DeploymentAvailable",
            format!("deployment name is {name}"),
        ));
        debug!(deployment = %name, "Deployment added");
        Ok(())
    }
}
