//! Trait catalog and the run loop.

use tracing::{debug, info, instrument};

use super::camel::CamelTrait;
use super::container::ContainerTrait;
use super::deployment::DeploymentTrait;
use super::environment::Environment;
use super::ingress::IngressTrait;
use super::knative::KnativeTrait;
use super::knative_service::KnativeServiceTrait;
use super::service::ServiceTrait;
use super::{policy, resolve_dependencies, RunOutcome, Trait, TraitId};
use crate::error::{PipeError, Result};

pub struct Catalog {
    traits: Vec<Box<dyn Trait>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Fresh instances of every known trait.
    pub fn new() -> Self {
        Self::with_traits(vec![
            Box::new(CamelTrait::default()),
            Box::new(KnativeTrait::default()),
            Box::new(DeploymentTrait::default()),
            Box::new(KnativeServiceTrait::default()),
            Box::new(ServiceTrait::default()),
            Box::new(ContainerTrait::default()),
            Box::new(IngressTrait::default()),
        ])
    }

    pub fn with_traits(mut traits: Vec<Box<dyn Trait>>) -> Self {
        traits.sort_by_key(|t| t.priority());
        Self { traits }
    }

    /// Ids in execution order.
    pub fn trait_ids(&self) -> Vec<TraitId> {
        self.traits.iter().map(|t| t.id()).collect()
    }

    /// Run every stage against `env`, consuming it.
    #[instrument(skip_all, fields(integration = %env.integration.name()))]
    pub fn run(mut self, mut env: Environment<'_>) -> Result<RunOutcome> {
        let profile = env.integration.profile();
        let mut active: Vec<&mut Box<dyn Trait>> = self
            .traits
            .iter_mut()
            .filter(|t| t.allowed_in_profile(profile))
            .collect();
        debug!(%profile, traits = active.len(), "Trait run started");

        let mut decisions = Vec::with_capacity(active.len());
        for t in active.iter_mut() {
            env.ctx.check()?;
            let id = t.id();
            let configured = t
                .configure(&mut env)
                .map_err(|e| PipeError::in_trait(id, e))?;
            debug!(trait_id = %id, enabled = configured.enabled, "Trait configured");
            if let Some(condition) = configured.condition {
                env.push_condition(condition);
            }
            decisions.push((id, configured.enabled));
        }

        for condition in policy::resolve(&mut decisions) {
            env.push_condition(condition);
        }

        for (t, (id, enabled)) in active.iter_mut().zip(decisions) {
            if !enabled {
                continue;
            }
            env.ctx.check()?;
            debug!(trait_id = %id, "Applying trait");
            t.apply(&mut env).map_err(|e| PipeError::in_trait(id, e))?;
            env.executed_traits.push(id);
        }

        for action in std::mem::take(&mut env.post_actions) {
            env.ctx.check()?;
            let owner = action.owner();
            action
                .execute(&mut env)
                .map_err(|e| PipeError::in_trait(owner, e))?;
        }

        let Environment {
            mut integration,
            resources,
            conditions,
            application_properties,
            executed_traits,
            ..
        } = env;
        for condition in &conditions {
            integration.set_condition(condition.clone());
        }
        resolve_dependencies(&mut integration);

        info!(
            executed = ?executed_traits,
            resources = resources.len(),
            conditions = conditions.len(),
            "Trait run completed"
        );
        Ok(RunOutcome {
            integration,
            resources,
            conditions,
            application_properties,
            executed_traits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, RunContext};
    use crate::model::meta::ObjectMeta;
    use crate::model::{Condition, ConditionStatus, Integration, Profile};
    use crate::traits::{Configured, PostAction};
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Stub trait recording every call in a shared journal.
    struct Recorder {
        id: TraitId,
        enabled: bool,
        fail_apply: bool,
        journal: Journal,
    }

    impl Recorder {
        fn boxed(id: TraitId, enabled: bool, journal: &Journal) -> Box<dyn Trait> {
            Box::new(Self {
                id,
                enabled,
                fail_apply: false,
                journal: journal.clone(),
            })
        }
    }

    impl Trait for Recorder {
        fn id(&self) -> TraitId {
            self.id
        }

        fn allowed_in_profile(&self, profile: Profile) -> bool {
            self.id != TraitId::Ingress || profile == Profile::Kubernetes
        }

        fn configure(&mut self, _env: &mut Environment<'_>) -> Result<Configured> {
            self.journal.lock().unwrap().push(format!("configure:{}", self.id));
            if self.enabled {
                Ok(Configured::enabled())
            } else {
                Ok(Configured::disabled_with(Condition::user_disabled(self.id)))
            }
        }

        fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
            let seen = env.executed_traits.len();
            self.journal
                .lock()
                .unwrap()
                .push(format!("apply:{}:{seen}", self.id));
            if self.fail_apply {
                return Err(PipeError::validation("boom"));
            }
            Ok(())
        }
    }

    fn env<'a>(cluster: &'a InMemoryCluster, ctx: &'a RunContext, profile: Profile) -> Environment<'a> {
        let mut it = Integration::new(ObjectMeta::named("it", "ns"));
        it.spec.profile = Some(profile);
        Environment::new(it, None, cluster, ctx).unwrap()
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[test]
    fn configure_and_apply_follow_priority() {
        let journal = Journal::default();
        let catalog = Catalog::with_traits(vec![
            Recorder::boxed(TraitId::Container, true, &journal),
            Recorder::boxed(TraitId::Camel, true, &journal),
            Recorder::boxed(TraitId::Service, false, &journal),
            Recorder::boxed(TraitId::Deployment, true, &journal),
        ]);
        assert_eq!(
            catalog.trait_ids(),
            vec![TraitId::Camel, TraitId::Deployment, TraitId::Service, TraitId::Container]
        );

        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let outcome = catalog.run(env(&cluster, &ctx, Profile::Kubernetes)).unwrap();

        assert_eq!(
            entries(&journal),
            vec![
                "configure:camel",
                "configure:deployment",
                "configure:service",
                "configure:container",
                "apply:camel:0",
                "apply:deployment:1",
                "apply:container:2",
            ]
        );
        assert_eq!(
            outcome.executed_traits,
            vec![TraitId::Camel, TraitId::Deployment, TraitId::Container]
        );
        assert_eq!(outcome.conditions.len(), 1);
        assert!(outcome.integration.condition("TraitInfo").is_some());
    }

    #[test]
    fn profile_filters_traits() {
        let journal = Journal::default();
        let catalog = Catalog::with_traits(vec![
            Recorder::boxed(TraitId::Camel, true, &journal),
            Recorder::boxed(TraitId::Ingress, true, &journal),
        ]);
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        catalog.run(env(&cluster, &ctx, Profile::Knative)).unwrap();

        assert!(!entries(&journal).iter().any(|e| e.contains("ingress")));
    }

    #[test]
    fn exclusion_disables_loser_and_reports() {
        let journal = Journal::default();
        let catalog = Catalog::with_traits(vec![
            Recorder::boxed(TraitId::Deployment, true, &journal),
            Recorder::boxed(TraitId::KnativeService, true, &journal),
        ]);
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let outcome = catalog.run(env(&cluster, &ctx, Profile::Knative)).unwrap();

        assert_eq!(outcome.executed_traits, vec![TraitId::KnativeService]);
        let c = outcome.integration.condition("DeploymentAvailable").unwrap();
        assert_eq!(c.status, ConditionStatus::False);
        assert!(c.message.contains("knative-service"));
    }

    #[test]
    fn apply_error_is_wrapped_and_stops_the_run() {
        let journal = Journal::default();
        let failing = Box::new(Recorder {
            id: TraitId::Deployment,
            enabled: true,
            fail_apply: true,
            journal: journal.clone(),
        });
        let catalog = Catalog::with_traits(vec![
            failing,
            Recorder::boxed(TraitId::Container, true, &journal),
        ]);
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let err = catalog
            .run(env(&cluster, &ctx, Profile::Kubernetes))
            .unwrap_err();

        assert_eq!(err.to_string(), "deployment trait: boom");
        assert!(!entries(&journal).iter().any(|e| e.starts_with("apply:container")));
    }

    #[test]
    fn cancelled_run_returns_cancellation() {
        let journal = Journal::default();
        let catalog = Catalog::with_traits(vec![Recorder::boxed(TraitId::Camel, true, &journal)]);
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        ctx.cancel();

        let err = catalog.run(env(&cluster, &ctx, Profile::Kubernetes)).unwrap_err();
        assert!(matches!(err, PipeError::Cancelled));
        assert!(entries(&journal).is_empty());
    }

    #[test]
    fn post_actions_run_after_apply() {
        struct Registers;
        impl Trait for Registers {
            fn id(&self) -> TraitId {
                TraitId::Camel
            }
            fn configure(&mut self, _env: &mut Environment<'_>) -> Result<Configured> {
                Ok(Configured::enabled())
            }
            fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
                env.application_properties.insert("k".into(), "v".into());
                env.post_actions.push(PostAction::MaterializeProperties);
                Ok(())
            }
        }

        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let outcome = Catalog::with_traits(vec![Box::new(Registers)])
            .run(env(&cluster, &ctx, Profile::Kubernetes))
            .unwrap();
        assert!(outcome.resources.config_map("it-application-properties").is_some());
    }
}
