//! Camel trait: runtime properties.
//!
//! Registers a post-action that renders the application properties collected
//! by every trait, and the user-supplied properties, into config maps.

use std::collections::BTreeMap;

use tracing::debug;

use super::environment::Environment;
use super::{Configured, PostAction, Trait, TraitId};
use crate::error::Result;
use crate::model::resources::{ConfigMap, Resource};
use crate::model::trait_spec::CamelTraitSpec;
use crate::model::Condition;
use crate::properties::{decode_entry, encode_entry, encode_properties};

pub const PROPERTIES_TYPE_LABEL: &str = "camel.apache.org/properties.type";
pub const APPLICATION_PROPERTIES_KEY: &str = "application.properties";
pub const USER_PROPERTIES_KEY: &str = "user.properties";

#[derive(Debug, Default)]
pub struct CamelTrait {
    spec: CamelTraitSpec,
}

impl Trait for CamelTrait {
    fn id(&self) -> TraitId {
        TraitId::Camel
    }

    fn configure(&mut self, env: &mut Environment<'_>) -> Result<Configured> {
        self.spec = env.traits.camel.clone().unwrap_or_default();
        if self.spec.enabled == Some(false) {
            return Ok(Configured::disabled_with(Condition::user_disabled(self.id())));
        }
        Ok(Configured::enabled())
    }

    fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
        for raw in &self.spec.properties {
            decode_entry(raw)?;
        }
        if env.in_running_phases() {
            env.post_actions.push(PostAction::MaterializeProperties);
        }
        Ok(())
    }
}

/// Render application and user properties into config maps.
pub fn materialize_properties(env: &mut Environment<'_>) -> Result<()> {
    let name = env.integration.name().to_string();

    if !env.application_properties.is_empty() {
        let data = BTreeMap::from([(
            APPLICATION_PROPERTIES_KEY.to_string(),
            encode_properties(&env.application_properties),
        )]);
        let meta = env
            .owned_meta(format!("{name}-application-properties"))
            .with_label(PROPERTIES_TYPE_LABEL, "application");
        env.resources.add(Resource::ConfigMap(ConfigMap::new(meta, data)));
    }

    let mut user = Vec::new();
    for entry in &env.integration.spec.configuration {
        if entry.kind == "property" {
            user.push(entry.value.clone());
        }
    }
    if let Some(camel) = &env.traits.camel {
        for raw in &camel.properties {
            let (key, value) = decode_entry(raw)?;
            user.push(encode_entry(&key, &value));
        }
    }
    if !user.is_empty() {
        let data = BTreeMap::from([(USER_PROPERTIES_KEY.to_string(), user.join("\n"))]);
        let meta = env
            .owned_meta(format!("{name}-user-properties"))
            .with_label(PROPERTIES_TYPE_LABEL, "user");
        env.resources.add(Resource::ConfigMap(ConfigMap::new(meta, data)));
    }

    debug!(integration = %name, "Properties materialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, RunContext};
    use crate::model::meta::ObjectMeta;
    use crate::model::{ConfigurationSpec, Integration, IntegrationPhase, TraitsSpec};

    fn integration() -> Integration {
        let mut it = Integration::new(ObjectMeta::named("it", "ns"));
        it.status.phase = IntegrationPhase::Deploying;
        it.spec
            .configuration
            .push(ConfigurationSpec::property("camel.kamelet.a.source.x=1"));
        it.spec.traits = TraitsSpec {
            camel: Some(CamelTraitSpec {
                properties: vec!["greeting = hello".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        it
    }

    #[test]
    fn renders_both_config_maps() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let mut env = Environment::new(integration(), None, &cluster, &ctx).unwrap();
        env.application_properties
            .insert("camel.component.knative.environment.resources[0].name".into(), "c".into());

        let mut t = CamelTrait::default();
        assert!(t.configure(&mut env).unwrap().enabled);
        t.apply(&mut env).unwrap();
        assert_eq!(env.post_actions, vec![PostAction::MaterializeProperties]);

        materialize_properties(&mut env).unwrap();
        let app = env.resources.config_map("it-application-properties").unwrap();
        assert_eq!(
            app.data[APPLICATION_PROPERTIES_KEY],
            "camel.component.knative.environment.resources[0].name=c"
        );
        let user = env.resources.config_map("it-user-properties").unwrap();
        assert_eq!(
            user.data[USER_PROPERTIES_KEY],
            "camel.kamelet.a.source.x=1\ngreeting=hello"
        );
        assert_eq!(user.metadata.labels[PROPERTIES_TYPE_LABEL], "user");
    }

    #[test]
    fn malformed_user_property_fails() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let mut it = integration();
        it.spec.traits.camel = Some(CamelTraitSpec {
            properties: vec!["=novalue".into()],
            ..Default::default()
        });
        let mut env = Environment::new(it, None, &cluster, &ctx).unwrap();
        let mut t = CamelTrait::default();
        t.configure(&mut env).unwrap();
        assert!(t.apply(&mut env).is_err());
    }

    #[test]
    fn nothing_registered_before_deployment() {
        let cluster = InMemoryCluster::new();
        let ctx = RunContext::new();
        let mut it = integration();
        it.status.phase = IntegrationPhase::Initialization;
        let mut env = Environment::new(it, None, &cluster, &ctx).unwrap();
        let mut t = CamelTrait::default();
        t.configure(&mut env).unwrap();
        t.apply(&mut env).unwrap();
        assert!(env.post_actions.is_empty());
    }
}
