//! Pipe → Integration translation
//!
//! ```text
//!   Pipe ──► metadata (labels, annotations, owner ref)
//!        ──► embedded integration spec, replicas, service account
//!        ──► profile
//!        ──► bindings: source, steps.., sink, error handler
//!              │  traits merged strictly
//!              │  properties encoded, sorted into configuration
//!              ▼
//!        route { id: binding, from: { uri, steps } }
//! ```

use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::error_handler::translate_error_handler;
use super::profile::determine_profile;
use super::providers::{default_providers, BindingProvider};
use super::{Binding, BindingContext, EndpointContext};
use crate::cluster::{Cluster, RunContext};
use crate::error::{PipeError, Result, ResultExt};
use crate::model::meta::{
    ObjectMeta, OwnerReference, CREATOR_KIND_LABEL, CREATOR_NAME_LABEL, ICON_ANNOTATION,
};
use crate::model::{ConfigurationSpec, Endpoint, Flow, Integration, Pipe, Profile};
use crate::properties::encode_entry;

/// Route id used for every generated flow
pub const BINDING_ROUTE_ID: &str = "binding";

pub struct Translator<'a> {
    cluster: &'a dyn Cluster,
    ctx: &'a RunContext,
    default_profile: Profile,
    providers: Vec<Box<dyn BindingProvider>>,
}

impl<'a> Translator<'a> {
    pub fn new(cluster: &'a dyn Cluster, ctx: &'a RunContext) -> Self {
        Self {
            cluster,
            ctx,
            default_profile: Profile::default(),
            providers: default_providers(),
        }
    }

    pub fn with_default_profile(mut self, profile: Profile) -> Self {
        self.default_profile = profile;
        self
    }

    /// Translate one endpoint with the first provider that recognises it.
    pub fn translate_endpoint(
        &self,
        ctx: &BindingContext<'_>,
        endpoint_ctx: &EndpointContext,
        endpoint: &Endpoint,
    ) -> Result<Binding> {
        for provider in &self.providers {
            if let Some(binding) = provider.translate(ctx, endpoint_ctx, endpoint)? {
                debug!(provider = provider.id(), endpoint = %endpoint_ctx.id(), uri = %binding.uri, "Endpoint translated");
                return Ok(binding);
            }
        }
        let subject = match &endpoint.reference {
            Some(r) => format!("{} {}", r.kind, r.name),
            None => "an endpoint without ref or uri".to_string(),
        };
        Err(PipeError::validation(format!(
            "no binding provider recognises {subject}"
        )))
    }

    #[instrument(skip_all, fields(pipe = %pipe.metadata.name, namespace = %pipe.metadata.namespace))]
    pub fn translate(&self, pipe: &Pipe) -> Result<Integration> {
        self.ctx.check()?;
        let mut it = Integration::new(integration_metadata(pipe));

        if let Some(spec) = &pipe.spec.integration {
            it.spec = spec.clone();
        }
        if pipe.spec.replicas.is_some() {
            it.spec.replicas = pipe.spec.replicas;
        }
        if !pipe.spec.service_account_name.is_empty() {
            it.spec.service_account_name = pipe.spec.service_account_name.clone();
        }

        let profile = determine_profile(self.cluster, self.ctx, pipe, self.default_profile)?;
        it.spec.profile = Some(profile);

        let ctx = BindingContext {
            namespace: &pipe.metadata.namespace,
            profile,
            annotations: &pipe.metadata.annotations,
        };

        let from = self
            .translate_endpoint(&ctx, &EndpointContext::SOURCE, &pipe.spec.source)
            .with_context(|| "could not determine source URI")?;
        let to = self
            .translate_endpoint(&ctx, &EndpointContext::SINK, &pipe.spec.sink)
            .with_context(|| "could not determine sink URI")?;
        let error_handler = match &pipe.spec.error_handler {
            Some(spec) => Some(
                translate_error_handler(&ctx, spec, |c, e, ep| self.translate_endpoint(c, e, ep))
                    .with_context(|| "could not determine error handler")?,
            ),
            None => None,
        };

        let steps = pipe
            .spec
            .steps
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                self.translate_endpoint(&ctx, &EndpointContext::action(idx), step)
                    .with_context(|| format!("could not determine URI for step {idx}"))
            })
            .collect::<Result<Vec<_>>>()?;

        if !to.is_routable() {
            return Err(PipeError::validation(
                "illegal step definition for sink step: either Step or URI should be provided",
            ));
        }
        if from.uri.is_empty() {
            return Err(PipeError::validation(
                "illegal step definition for source step: URI should be provided",
            ));
        }
        if let Some(index) = steps.iter().position(|s| !s.is_routable()) {
            return Err(PipeError::validation(format!(
                "illegal step definition for step {index}: either Step or URI should be provided"
            )));
        }

        let all = std::iter::once(&from)
            .chain(steps.iter())
            .chain(std::iter::once(&to))
            .chain(error_handler.iter());
        for binding in all {
            it.spec.traits.merge(&binding.traits)?;
            for (key, value) in &binding.application_properties {
                it.spec
                    .configuration
                    .push(ConfigurationSpec::property(encode_entry(key, value)));
            }
        }
        it.spec.configuration.sort();

        it.spec.flows.push(Flow(route(&from, &steps, &to)));
        debug!(profile = %profile, steps = steps.len(), "Pipe translated");
        Ok(it)
    }
}

/// Translate `pipe` with the default provider chain.
pub fn create_integration_for(
    cluster: &dyn Cluster,
    ctx: &RunContext,
    pipe: &Pipe,
) -> Result<Integration> {
    Translator::new(cluster, ctx).translate(pipe)
}

fn integration_metadata(pipe: &Pipe) -> ObjectMeta {
    let mut annotations = pipe.metadata.annotations.clone();
    annotations.remove(ICON_ANNOTATION);

    let mut labels = pipe.metadata.labels.clone();
    labels.insert(CREATOR_KIND_LABEL.to_string(), pipe.kind.clone());
    labels.insert(CREATOR_NAME_LABEL.to_string(), pipe.metadata.name.clone());

    ObjectMeta {
        name: pipe.metadata.name.clone(),
        namespace: pipe.metadata.namespace.clone(),
        labels,
        annotations,
        uid: None,
        owner_references: vec![OwnerReference {
            api_version: pipe.api_version.clone(),
            kind: pipe.kind.clone(),
            name: pipe.metadata.name.clone(),
            uid: pipe.metadata.uid,
            controller: true,
            block_owner_deletion: true,
        }],
    }
}

fn route(from: &Binding, steps: &[Binding], to: &Binding) -> Value {
    let mut dsl_steps: Vec<Value> = Vec::with_capacity(steps.len() + 3);
    if let Some(step) = &from.step {
        dsl_steps.push(step.clone());
    }
    dsl_steps.extend(steps.iter().map(Binding::as_yaml_dsl));
    if let Some(step) = &to.step {
        dsl_steps.push(step.clone());
    }
    if !to.uri.is_empty() {
        dsl_steps.push(json!({ "to": to.uri }));
    }

    json!({
        "route": {
            "id": BINDING_ROUTE_ID,
            "from": {
                "uri": from.uri,
                "steps": dsl_steps,
            }
        }
    })
}
