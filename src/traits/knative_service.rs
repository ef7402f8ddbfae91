//! Knative service trait: serverless workload for HTTP-exposing integrations.
//!
//! Takes over from the deployment and service traits when enabled; see
//! [`super::policy`].

use tracing::debug;

use super::environment::Environment;
use super::{Configured, Trait, TraitId};
use crate::error::Result;
use crate::model::condition::{KNATIVE_SERVICE_AVAILABLE, KNATIVE_SERVICE_NOT_AVAILABLE_REASON};
use crate::model::meta::ObjectMeta;
use crate::model::resources::{
    KnativeService, KnativeServiceSpec, PodSpec, PodTemplateSpec, Resource,
};
use crate::model::trait_spec::KnativeServiceTraitSpec;
use crate::model::{Condition, ConditionStatus, Profile};

pub const MIN_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/minScale";
pub const MAX_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/maxScale";
pub const ROLLOUT_DURATION_ANNOTATION: &str = "serving.knative.dev/rollout-duration";
pub const VISIBILITY_LABEL: &str = "networking.knative.dev/visibility";

#[derive(Debug, Default)]
pub struct KnativeServiceTrait {
    spec: KnativeServiceTraitSpec,
}

fn not_available(message: &str) -> Condition {
    Condition::new(
        KNATIVE_SERVICE_AVAILABLE,
        ConditionStatus::False,
        KNATIVE_SERVICE_NOT_AVAILABLE_REASON,
        message,
    )
}

impl Trait for KnativeServiceTrait {
    fn id(&self) -> TraitId {
        TraitId::KnativeService
    }

    fn allowed_in_profile(&self, profile: Profile) -> bool {
        profile == Profile::Knative
    }

    fn configure(&mut self, env: &mut Environment<'_>) -> Result<Configured> {
        self.spec = env.traits.knative_service.clone().unwrap_or_default();
        if self.spec.enabled == Some(false) {
            return Ok(Configured::disabled_with(not_available("explicitly disabled")));
        }
        if !env.in_running_phases() {
            return Ok(Configured::disabled());
        }
        if self.spec.enabled == Some(true) {
            return Ok(Configured::enabled());
        }
        if self.spec.auto.unwrap_or(true) && env.route_metadata().exposes_http() {
            return Ok(Configured::enabled());
        }
        Ok(Configured::disabled_with(not_available(
            "controller strategy: deployment",
        )))
    }

    fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
        let name = env.integration.name().to_string();

        let mut annotations = self.spec.annotations.clone();
        if let Some(min) = self.spec.min_scale {
            annotations.insert(MIN_SCALE_ANNOTATION.into(), min.to_string());
        }
        if let Some(max) = self.spec.max_scale {
            annotations.insert(MAX_SCALE_ANNOTATION.into(), max.to_string());
        }
        if let Some(duration) = &self.spec.rollout_duration {
            annotations.insert(ROLLOUT_DURATION_ANNOTATION.into(), duration.clone());
        }

        let mut meta = env.owned_meta(name.clone());
        if let Some(visibility) = &self.spec.visibility {
            meta = meta.with_label(VISIBILITY_LABEL, visibility.clone());
        }
        let template = PodTemplateSpec {
            metadata: ObjectMeta {
                labels: env.selector(),
                annotations,
                ..Default::default()
            },
            spec: PodSpec {
                containers: Vec::new(),
                service_account_name: env.integration.spec.service_account_name.clone(),
            },
        };

        env.resources.add(Resource::KnativeService(KnativeService::new(
            meta,
            KnativeServiceSpec { template },
        )));
        env.push_condition(Condition::new(
            KNATIVE_SERVICE_AVAILABLE,
            ConditionStatus::True,
            "KnativeServiceAvailable",
            format!("knative service name is {name}"),
        ));
        debug!(service = %name, "Knative service added");
        Ok(())
    }
}
