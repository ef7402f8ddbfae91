//! Binding translation
//!
//! A Pipe names its endpoints abstractly (a Kamelet, a Knative channel, a
//! plain URI). Each endpoint is translated independently into a [`Binding`]:
//! the URI or embedded DSL step to put in the route, plus the trait settings
//! and application properties it drags along. The [`Translator`] then merges
//! all bindings into a single Integration.

pub mod error_handler;
pub mod profile;
pub mod providers;
pub mod translator;

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Profile, TraitsSpec};

pub use providers::{BindingProvider, KameletProvider, KnativeRefProvider, UriProvider};
pub use translator::{create_integration_for, Translator};

/// Role an endpoint plays in the Pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    Source,
    Action,
    Sink,
    ErrorHandler,
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Action => write!(f, "action"),
            Self::Sink => write!(f, "sink"),
            Self::ErrorHandler => write!(f, "error-handler"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointContext {
    pub endpoint_type: EndpointType,
    /// Index among the steps (actions only)
    pub position: Option<usize>,
}

impl EndpointContext {
    pub const SOURCE: Self = Self {
        endpoint_type: EndpointType::Source,
        position: None,
    };
    pub const SINK: Self = Self {
        endpoint_type: EndpointType::Sink,
        position: None,
    };
    pub const ERROR_HANDLER: Self = Self {
        endpoint_type: EndpointType::ErrorHandler,
        position: None,
    };

    pub fn action(position: usize) -> Self {
        Self {
            endpoint_type: EndpointType::Action,
            position: Some(position),
        }
    }

    /// Stable id used in generated URIs and property keys.
    pub fn id(&self) -> String {
        match (self.endpoint_type, self.position) {
            (EndpointType::Action, Some(pos)) => format!("action-{pos}"),
            (other, _) => other.to_string(),
        }
    }
}

/// Read-only facts shared by every endpoint of one Pipe.
#[derive(Debug, Clone)]
pub struct BindingContext<'a> {
    pub namespace: &'a str,
    pub profile: Profile,
    pub annotations: &'a BTreeMap<String, String>,
}

/// Translation result for one endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    pub uri: String,
    /// Embedded DSL step, used instead of a `to` for actions and sinks
    pub step: Option<Value>,
    pub traits: TraitsSpec,
    pub application_properties: BTreeMap<String, String>,
}

impl Binding {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Whether the binding gives the route something to call.
    pub fn is_routable(&self) -> bool {
        self.step.is_some() || !self.uri.is_empty()
    }

    /// The step as it appears in the YAML DSL.
    pub fn as_yaml_dsl(&self) -> Value {
        match &self.step {
            Some(step) => step.clone(),
            None => json!({ "to": self.uri }),
        }
    }
}
