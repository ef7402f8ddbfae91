//! Knative trait
//!
//! Wires the integration to channels, serving endpoints and brokers:
//!
//! ```text
//!   configure: fill empty source/sink lists from the route URIs (auto),
//!              decide whether sink binding may be used
//!   apply:     capabilities
//!              channels  ─ sources: definition + Subscription
//!                        └ sinks:   definition with resolved URL
//!              endpoints ─ sources: definition on the serving Service
//!                        └ sinks:   definition with resolved URL
//!              events    ─ sources: Trigger (idempotent) + definition
//!                        └ sinks:   definition with resolved URL
//!              sink binding: mark the single sink, defer injection
//!              → application properties
//! ```

use tracing::{debug, error, info};

use super::environment::Environment;
use super::{Configured, PostAction, Trait, TraitId, CAPABILITY_KNATIVE, CAPABILITY_PLATFORM_HTTP};
use crate::cluster::KNATIVE_BIND_LABEL;
use crate::collection::ResourceCollection;
use crate::error::{PipeError, Result};
use crate::knative::uri::{extract_event_type, filter_uris, DEFAULT_BROKER};
use crate::knative::{
    create_sink_binding, create_subscription, create_trigger, KnativeResolver, ResolvedService,
};
use crate::model::knative::{
    CamelEndpointKind, CamelEnvironment, CamelServiceDefinition, CamelServiceType,
    META_FILTER_PREFIX, META_KNATIVE_NAME, META_KNATIVE_REPLY,
};
use crate::model::meta::ObjectReference;
use crate::model::resources::{Resource, SERVING_API_VERSION};
use crate::model::trait_spec::KnativeTraitSpec;
use crate::model::{Condition, IntegrationPhase, Profile};

/// CloudEvents extension set by channels on redelivered events
const KNATIVE_HISTORY_HEADER: &str = "ce-knativehistory";

#[derive(Debug, Default)]
pub struct KnativeTrait {
    spec: KnativeTraitSpec,
}

impl KnativeTrait {
    fn has_sources(&self) -> bool {
        !(self.spec.channel_sources.is_empty()
            && self.spec.endpoint_sources.is_empty()
            && self.spec.event_sources.is_empty())
    }

    fn has_sinks(&self) -> bool {
        !(self.spec.channel_sinks.is_empty()
            && self.spec.endpoint_sinks.is_empty()
            && self.spec.event_sinks.is_empty())
    }

    /// Every configured sink, extracted per service type.
    fn sinks(&self) -> Vec<(CamelServiceType, Vec<String>)> {
        [
            (CamelServiceType::Channel, &self.spec.channel_sinks),
            (CamelServiceType::Endpoint, &self.spec.endpoint_sinks),
            (CamelServiceType::Event, &self.spec.event_sinks),
        ]
        .into_iter()
        .map(|(st, list)| (st, KnativeResolver::extract_services(list, st)))
        .collect()
    }

    fn sink_binding_allowed(&self, env: &Environment<'_>) -> bool {
        let total: usize = self.sinks().iter().map(|(_, uris)| uris.len()).sum();
        if total != 1 {
            return false;
        }
        !env
            .integration
            .metadata
            .owner_references
            .iter()
            .any(|owner| owner.api_version.contains("sources.knative.dev"))
    }
}

fn fill_from_route(target: &mut Vec<String>, uris: &[String], service_type: CamelServiceType) {
    if target.is_empty() {
        let mut found = filter_uris(uris, service_type);
        found.sort();
        found.dedup();
        *target = found;
    }
}

fn in_namespace(reference: &ObjectReference, namespace: &str) -> ObjectReference {
    if reference.namespace.is_empty() {
        reference.clone().in_namespace(namespace)
    } else {
        reference.clone()
    }
}

/// Name under which an event service is registered.
fn event_service_name(uri: &str) -> String {
    let event_type = extract_event_type(uri);
    if event_type.is_empty() {
        DEFAULT_BROKER.to_string()
    } else {
        event_type
    }
}

fn sink_service_name(service_type: CamelServiceType, svc: &ResolvedService<'_>) -> String {
    match service_type {
        CamelServiceType::Event => event_service_name(&svc.uri),
        _ => svc.reference.name.clone(),
    }
}

fn add_once(resources: &mut ResourceCollection, resource: Resource) {
    let exists = resources
        .iter()
        .any(|r| r.kind() == resource.kind() && r.name() == resource.name());
    if exists {
        debug!(kind = resource.kind(), name = resource.name(), "Already present, skipping");
    } else {
        resources.add(resource);
    }
}

/// Register a sink; the sink-binding target never needs an address.
fn register_sink(
    camel_env: &mut CamelEnvironment,
    svc: ResolvedService<'_>,
    service_type: CamelServiceType,
    sink_binding: bool,
) -> Result<()> {
    let name = sink_service_name(service_type, &svc);
    let api_version = &svc.reference.api_version;
    let kind = &svc.reference.kind;
    let mut def = if sink_binding {
        CamelServiceDefinition::new(name, service_type, CamelEndpointKind::Sink, api_version, kind)
    } else {
        let url = svc.url.get()?;
        CamelServiceDefinition::with_url(
            name,
            CamelEndpointKind::Sink,
            service_type,
            &url,
            api_version,
            kind,
        )
    };
    if service_type == CamelServiceType::Event {
        def = def.with_meta(META_KNATIVE_NAME, svc.reference.name.clone());
    }
    camel_env.push(def);
    Ok(())
}

/// Per-run wiring context shared by the apply helpers.
struct Wiring<'r> {
    resolver: KnativeResolver<'r>,
    integration: String,
    namespace: String,
}

impl Wiring<'_> {
    fn channels(
        &self,
        spec: &KnativeTraitSpec,
        camel_env: &mut CamelEnvironment,
        resources: &mut ResourceCollection,
    ) -> Result<()> {
        let filter_source_channels = spec.filter_source_channels.unwrap_or(false);
        self.resolver.if_service_missing_do(
            camel_env,
            &spec.channel_sources,
            CamelServiceType::Channel,
            CamelEndpointKind::Source,
            |camel_env, svc| {
                let path = format!("/channels/{}", svc.reference.name);
                let mut def = CamelServiceDefinition::new(
                    svc.reference.name.clone(),
                    CamelServiceType::Channel,
                    CamelEndpointKind::Source,
                    &svc.reference.api_version,
                    &svc.reference.kind,
                )
                .with_path(path.clone())
                .with_meta(META_KNATIVE_REPLY, "false");
                if filter_source_channels {
                    let url = svc.url.get()?;
                    def = def.with_meta(
                        format!("{META_FILTER_PREFIX}{KNATIVE_HISTORY_HEADER}"),
                        url.host_str().unwrap_or_default(),
                    );
                }
                camel_env.push(def);

                let channel = in_namespace(&svc.reference, &self.namespace);
                add_once(resources, create_subscription(&channel, &self.integration, &path));
                Ok(())
            },
        )?;

        let sink_binding = spec.sink_binding.unwrap_or(false);
        self.resolver.if_service_missing_do(
            camel_env,
            &spec.channel_sinks,
            CamelServiceType::Channel,
            CamelEndpointKind::Sink,
            |camel_env, svc| register_sink(camel_env, svc, CamelServiceType::Channel, sink_binding),
        )
    }

    fn endpoints(&self, spec: &KnativeTraitSpec, camel_env: &mut CamelEnvironment) -> Result<()> {
        self.resolver.if_service_missing_do(
            camel_env,
            &spec.endpoint_sources,
            CamelServiceType::Endpoint,
            CamelEndpointKind::Source,
            |camel_env, svc| {
                camel_env.push(
                    CamelServiceDefinition::new(
                        svc.reference.name.clone(),
                        CamelServiceType::Endpoint,
                        CamelEndpointKind::Source,
                        SERVING_API_VERSION,
                        "Service",
                    )
                    .with_path("/"),
                );
                Ok(())
            },
        )?;

        let sink_binding = spec.sink_binding.unwrap_or(false);
        self.resolver.if_service_missing_do(
            camel_env,
            &spec.endpoint_sinks,
            CamelServiceType::Endpoint,
            CamelEndpointKind::Sink,
            |camel_env, svc| {
                register_sink(camel_env, svc, CamelServiceType::Endpoint, sink_binding)
            },
        )
    }

    fn events(
        &self,
        spec: &KnativeTraitSpec,
        camel_env: &mut CamelEnvironment,
        resources: &mut ResourceCollection,
    ) -> Result<()> {
        // sources are not skipped when already configured, only the trigger is idempotent
        self.resolver.with_service_do(
            false,
            camel_env,
            &spec.event_sources,
            CamelServiceType::Event,
            CamelEndpointKind::Source,
            |camel_env, svc| {
                let event_type = extract_event_type(&svc.uri);
                let service_name = event_service_name(&svc.uri);
                let path = format!("/events/{event_type}");
                let broker = in_namespace(&svc.reference, &self.namespace);

                let wanted = (!event_type.is_empty()).then_some(event_type.as_str());
                let exists = resources
                    .has_trigger(|t| t.spec.broker == broker.name && t.spec.event_type() == wanted);
                if exists {
                    debug!(broker = %broker.name, %event_type, "Trigger already present, skipping");
                } else {
                    resources.add(create_trigger(&broker, &self.integration, &event_type, &path));
                }

                if !camel_env.contains_service(
                    &service_name,
                    CamelEndpointKind::Source,
                    CamelServiceType::Event,
                    &broker.api_version,
                    &broker.kind,
                ) {
                    camel_env.push(
                        CamelServiceDefinition::new(
                            service_name,
                            CamelServiceType::Event,
                            CamelEndpointKind::Source,
                            &broker.api_version,
                            &broker.kind,
                        )
                        .with_path(path)
                        .with_meta(META_KNATIVE_NAME, broker.name.clone())
                        .with_meta(META_KNATIVE_REPLY, "false"),
                    );
                }
                Ok(())
            },
        )?;

        let sink_binding = spec.sink_binding.unwrap_or(false);
        self.resolver.if_service_missing_do(
            camel_env,
            &spec.event_sinks,
            CamelServiceType::Event,
            CamelEndpointKind::Sink,
            |camel_env, svc| register_sink(camel_env, svc, CamelServiceType::Event, sink_binding),
        )
    }

    /// Mark the single sink as bound; returns the object to bind to.
    fn sink_binding(
        &self,
        sinks: Vec<(CamelServiceType, Vec<String>)>,
        camel_env: &mut CamelEnvironment,
    ) -> Result<Option<ObjectReference>> {
        let total: usize = sinks.iter().map(|(_, uris)| uris.len()).sum();
        let selected = sinks.into_iter().find(|(_, uris)| !uris.is_empty());
        let Some((service_type, uris)) = selected.filter(|_| total == 1) else {
            return Err(PipeError::validation(format!(
                "sinkbinding can only be used with a single sink: found {total} sinks"
            )));
        };

        let mut target = None;
        self.resolver.with_service_do(
            false,
            camel_env,
            &uris,
            service_type,
            CamelEndpointKind::Sink,
            |camel_env, svc| {
                let name = sink_service_name(service_type, &svc);
                camel_env.set_sink_binding(
                    &name,
                    CamelEndpointKind::Sink,
                    service_type,
                    &svc.reference.api_version,
                    &svc.reference.kind,
                );
                target = Some(in_namespace(&svc.reference, &self.namespace));
                Ok(())
            },
        )?;
        Ok(target)
    }
}

impl Trait for KnativeTrait {
    fn id(&self) -> TraitId {
        TraitId::Knative
    }

    fn allowed_in_profile(&self, profile: Profile) -> bool {
        profile == Profile::Knative
    }

    fn configure(&mut self, env: &mut Environment<'_>) -> Result<Configured> {
        self.spec = env.traits.knative.clone().unwrap_or_default();
        if self.spec.enabled == Some(false) {
            return Ok(Configured::disabled_with(Condition::user_disabled(self.id())));
        }
        if !env.in_phase(&[IntegrationPhase::Initialization]) && !env.in_running_phases() {
            return Ok(Configured::disabled());
        }

        if self.spec.auto.unwrap_or(true) {
            let route = env.route_metadata();
            let spec = &mut self.spec;
            fill_from_route(&mut spec.channel_sources, &route.from_uris, CamelServiceType::Channel);
            fill_from_route(&mut spec.channel_sinks, &route.to_uris, CamelServiceType::Channel);
            fill_from_route(&mut spec.endpoint_sources, &route.from_uris, CamelServiceType::Endpoint);
            fill_from_route(&mut spec.endpoint_sinks, &route.to_uris, CamelServiceType::Endpoint);
            fill_from_route(&mut spec.event_sources, &route.from_uris, CamelServiceType::Event);
            fill_from_route(&mut spec.event_sinks, &route.to_uris, CamelServiceType::Event);

            if spec.filter_source_channels.is_none() {
                spec.filter_source_channels = Some(false);
            }
            if self.spec.sink_binding.is_none() {
                self.spec.sink_binding = Some(self.sink_binding_allowed(env));
            }
        }
        Ok(Configured::enabled())
    }

    fn apply(&mut self, env: &mut Environment<'_>) -> Result<()> {
        if env.in_phase(&[IntegrationPhase::Initialization]) {
            env.integration.add_capability(CAPABILITY_KNATIVE);
        }
        if self.has_sources() || self.has_sinks() {
            env.integration.add_capability(CAPABILITY_PLATFORM_HTTP);
        }
        if !env.in_running_phases() {
            return Ok(());
        }

        let mut camel_env = match self.spec.configuration.as_deref() {
            Some(raw) if !raw.trim().is_empty() => CamelEnvironment::deserialize(raw)?,
            _ => CamelEnvironment::new(),
        };
        let wiring = Wiring {
            resolver: KnativeResolver::new(env.cluster, env.ctx, env.integration.namespace()),
            integration: env.integration.name().to_string(),
            namespace: env.integration.namespace().to_string(),
        };

        wiring.channels(&self.spec, &mut camel_env, &mut env.resources)?;
        wiring.endpoints(&self.spec, &mut camel_env)?;
        wiring.events(&self.spec, &mut camel_env, &mut env.resources)?;

        if self.spec.sink_binding.unwrap_or(false) {
            let target = wiring.sink_binding(self.sinks(), &mut camel_env)?;
            let active = env.in_phase(&[IntegrationPhase::Deploying, IntegrationPhase::Running]);
            if let (Some(target), true) = (target, active) {
                env.post_actions.push(PostAction::InjectSinkBinding {
                    target,
                    namespace_label: self.spec.namespace_label.unwrap_or(env.namespace_label),
                });
            }
        }

        let props = camel_env.to_camel_properties();
        debug!(services = camel_env.services.len(), "Knative environment built");
        env.application_properties.extend(props);
        Ok(())
    }
}

/// Bind the controller workload to `target` unless a SinkBinding already exists.
pub fn inject_sink_binding(
    env: &mut Environment<'_>,
    target: &ObjectReference,
    namespace_label: bool,
) -> Result<()> {
    if env.resources.has_sink_binding() {
        debug!("SinkBinding already present, skipping injection");
        return Ok(());
    }
    let Some(controller) = env.resources.controller() else {
        debug!("No controller workload, skipping sink binding");
        return Ok(());
    };

    let namespace = env.integration.namespace().to_string();
    if namespace_label {
        match env.cluster.enable_bind_in_namespace(env.ctx, &namespace) {
            Ok(true) => info!(%namespace, "Label {KNATIVE_BIND_LABEL}=true added to namespace"),
            Ok(false) => debug!(%namespace, "Namespace already labelled for sink binding"),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => error!(%namespace, error = %e, "Cannot label namespace for sink binding"),
        }
    }

    let source = ObjectReference {
        name: env.integration.name().to_string(),
        namespace,
        ..controller
    };
    env.resources.add_first(create_sink_binding(&source, target));
    Ok(())
}
