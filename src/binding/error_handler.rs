//! Error handler translation.
//!
//! The handler never appears in the route itself; it is configured through
//! `camel.beans.defaultErrorHandler*` properties and referenced by name.

use std::collections::BTreeMap;

use serde_json::Value;

use super::providers::property_text;
use super::{Binding, BindingContext, EndpointContext};
use crate::error::{Result, ResultExt};
use crate::model::{Endpoint, ErrorHandlerSpec};

pub const ERROR_HANDLER_REF_NAME: &str = "camel.k.errorHandler.ref";
pub const ERROR_HANDLER_REF_DEFAULT_NAME: &str = "defaultErrorHandler";
pub const ERROR_HANDLER_PROPERTIES_PREFIX: &str = "camel.beans.defaultErrorHandler";

const NO_ERROR_HANDLER_BUILDER: &str = "#class:org.apache.camel.builder.NoErrorHandlerBuilder";
const DEFAULT_ERROR_HANDLER_BUILDER: &str =
    "#class:org.apache.camel.builder.DefaultErrorHandlerBuilder";
const DEAD_LETTER_CHANNEL_BUILDER: &str = "#class:org.apache.camel.builder.DeadLetterChannelBuilder";

fn configuration(builder: &str, parameters: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    let mut props = BTreeMap::from([
        (ERROR_HANDLER_PROPERTIES_PREFIX.to_string(), builder.to_string()),
        (
            ERROR_HANDLER_REF_NAME.to_string(),
            ERROR_HANDLER_REF_DEFAULT_NAME.to_string(),
        ),
    ]);
    for (key, value) in parameters {
        props.insert(
            format!("{ERROR_HANDLER_PROPERTIES_PREFIX}.{key}"),
            property_text(value),
        );
    }
    props
}

/// Translate the Pipe's error handler into a property-only binding.
///
/// `translate_endpoint` resolves the dead letter endpoint of a sink handler.
pub fn translate_error_handler<F>(
    ctx: &BindingContext<'_>,
    spec: &ErrorHandlerSpec,
    translate_endpoint: F,
) -> Result<Binding>
where
    F: FnOnce(&BindingContext<'_>, &EndpointContext, &Endpoint) -> Result<Binding>,
{
    let binding = match spec {
        ErrorHandlerSpec::None {} => Binding {
            application_properties: configuration(NO_ERROR_HANDLER_BUILDER, &BTreeMap::new()),
            ..Default::default()
        },
        ErrorHandlerSpec::Log { parameters } => Binding {
            application_properties: configuration(DEFAULT_ERROR_HANDLER_BUILDER, parameters),
            ..Default::default()
        },
        ErrorHandlerSpec::Sink {
            endpoint,
            parameters,
        } => {
            let mut binding = translate_endpoint(ctx, &EndpointContext::ERROR_HANDLER, endpoint)
                .with_context(|| "cannot translate the dead letter endpoint")?;
            binding
                .application_properties
                .extend(configuration(DEAD_LETTER_CHANNEL_BUILDER, parameters));
            if !binding.uri.is_empty() {
                binding.application_properties.insert(
                    format!("{ERROR_HANDLER_PROPERTIES_PREFIX}.deadLetterUri"),
                    binding.uri.clone(),
                );
            }
            binding
        }
    };
    Ok(binding)
}
