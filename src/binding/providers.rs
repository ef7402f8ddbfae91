//! Binding providers, consulted in a fixed order.
//!
//! A provider returns `Ok(None)` when it does not recognise the endpoint so
//! the next one can try; an `Err` aborts translation.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use url::form_urlencoded;

use super::{Binding, BindingContext, EndpointContext, EndpointType};
use crate::error::{PipeError, Result};
use crate::knative::references::known_kinds;
use crate::model::knative::CamelServiceType;
use crate::model::meta::ObjectReference;
use crate::model::{Endpoint, TraitsSpec};

pub const KAMELET_KIND: &str = "Kamelet";
const CAMEL_GROUP: &str = "camel.apache.org";

pub trait BindingProvider: Send + Sync {
    fn id(&self) -> &'static str;

    fn translate(
        &self,
        ctx: &BindingContext<'_>,
        endpoint_ctx: &EndpointContext,
        endpoint: &Endpoint,
    ) -> Result<Option<Binding>>;
}

/// Providers in resolution order.
pub fn default_providers() -> Vec<Box<dyn BindingProvider>> {
    vec![
        Box::new(KameletProvider),
        Box::new(KnativeRefProvider),
        Box::new(UriProvider),
    ]
}

/// Render a property value the way it should appear in a URI or file.
pub fn property_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn property_map(properties: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    properties
        .iter()
        .map(|(k, v)| (k.clone(), property_text(v)))
        .collect()
}

/// Append parameters as a sorted, percent-encoded query string.
pub fn append_parameters(uri: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return uri.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}{query}")
}

fn check_namespace(ctx: &BindingContext<'_>, reference: &ObjectReference) -> Result<()> {
    if !reference.namespace.is_empty() && reference.namespace != ctx.namespace {
        return Err(PipeError::validation(format!(
            "cross-namespace references are not allowed: {} {}/{}",
            reference.kind, reference.namespace, reference.name
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Kamelet
// ---------------------------------------------------------------------------

pub struct KameletProvider;

impl BindingProvider for KameletProvider {
    fn id(&self) -> &'static str {
        "kamelet"
    }

    fn translate(
        &self,
        ctx: &BindingContext<'_>,
        endpoint_ctx: &EndpointContext,
        endpoint: &Endpoint,
    ) -> Result<Option<Binding>> {
        let Some(reference) = &endpoint.reference else {
            return Ok(None);
        };
        let group = reference.group();
        if reference.kind != KAMELET_KIND || !(group.is_empty() || group == CAMEL_GROUP) {
            return Ok(None);
        }
        check_namespace(ctx, reference)?;

        let id = endpoint_ctx.id();
        let name = &reference.name;
        let application_properties = endpoint
            .properties
            .iter()
            .map(|(k, v)| (format!("camel.kamelet.{name}.{id}.{k}"), property_text(v)))
            .collect();

        let step = match endpoint_ctx.endpoint_type {
            EndpointType::Action => Some(json!({ "kamelet": { "name": format!("{name}/{id}") } })),
            _ => None,
        };

        Ok(Some(Binding {
            uri: format!("kamelet:{name}/{id}"),
            step,
            traits: TraitsSpec::default(),
            application_properties,
        }))
    }
}

// ---------------------------------------------------------------------------
// Knative reference
// ---------------------------------------------------------------------------

pub struct KnativeRefProvider;

impl KnativeRefProvider {
    fn service_type(reference: &ObjectReference) -> Option<CamelServiceType> {
        CamelServiceType::ALL.into_iter().find(|st| {
            known_kinds(*st).iter().any(|(api_version, kind)| {
                *kind == reference.kind
                    && (reference.api_version.is_empty() || *api_version == reference.api_version)
            })
        })
    }
}

impl BindingProvider for KnativeRefProvider {
    fn id(&self) -> &'static str {
        "knative-ref"
    }

    fn translate(
        &self,
        ctx: &BindingContext<'_>,
        _endpoint_ctx: &EndpointContext,
        endpoint: &Endpoint,
    ) -> Result<Option<Binding>> {
        let Some(reference) = &endpoint.reference else {
            return Ok(None);
        };
        let Some(service_type) = Self::service_type(reference) else {
            return Ok(None);
        };
        check_namespace(ctx, reference)?;

        let mut params = property_map(&endpoint.properties);
        let base = match service_type {
            CamelServiceType::Event => {
                let base = match params.remove("type") {
                    Some(event_type) if !event_type.is_empty() => {
                        format!("knative:event/{event_type}")
                    }
                    _ => "knative:event".to_string(),
                };
                params.insert("name".into(), reference.name.clone());
                base
            }
            other => format!("knative:{other}/{}", reference.name),
        };
        if !reference.api_version.is_empty() {
            params.insert("apiVersion".into(), reference.api_version.clone());
        }
        params.insert("kind".into(), reference.kind.clone());

        Ok(Some(Binding {
            uri: append_parameters(&base, &params),
            step: None,
            traits: TraitsSpec::knative_enabled(),
            application_properties: BTreeMap::new(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Plain URI
// ---------------------------------------------------------------------------

pub struct UriProvider;

impl BindingProvider for UriProvider {
    fn id(&self) -> &'static str {
        "uri"
    }

    fn translate(
        &self,
        _ctx: &BindingContext<'_>,
        _endpoint_ctx: &EndpointContext,
        endpoint: &Endpoint,
    ) -> Result<Option<Binding>> {
        let Some(uri) = &endpoint.uri else {
            return Ok(None);
        };
        let params = property_map(&endpoint.properties);
        Ok(Some(Binding::from_uri(append_parameters(uri, &params))))
    }
}
