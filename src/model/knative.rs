//! Knative service definitions handed to the Camel knative component.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

use crate::error::{PipeError, Result};

pub const META_ENDPOINT_KIND: &str = "camel.endpoint.kind";
pub const META_KNATIVE_API_VERSION: &str = "knative.apiVersion";
pub const META_KNATIVE_KIND: &str = "knative.kind";
pub const META_KNATIVE_NAME: &str = "knative.name";
pub const META_KNATIVE_REPLY: &str = "knative.reply";
pub const META_FILTER_PREFIX: &str = "filter.";

pub const SINK_URL_PLACEHOLDER: &str = "${K_SINK}";
pub const CE_OVERRIDES_PLACEHOLDER: &str = "${K_CE_OVERRIDES}";

const PROPERTY_PREFIX: &str = "camel.component.knative.environment.resources";

static RESOURCE_NAME_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^camel\.component\.knative\.environment\.resources\[(\d+)\]\.name$")
        .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CamelServiceType {
    Channel,
    Endpoint,
    Event,
}

impl CamelServiceType {
    pub const ALL: [CamelServiceType; 3] = [Self::Channel, Self::Endpoint, Self::Event];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Endpoint => "endpoint",
            Self::Event => "event",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }

    /// Human description used in error messages.
    pub fn resource_description(self, name: &str) -> String {
        match self {
            Self::Event => format!("broker {name}"),
            other => format!("{} {name}", other.as_str()),
        }
    }
}

impl fmt::Display for CamelServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CamelEndpointKind {
    Source,
    Sink,
}

impl CamelEndpointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Sink => "sink",
        }
    }
}

impl fmt::Display for CamelEndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamelServiceDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(rename = "type")]
    pub service_type: CamelServiceType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sink_binding: bool,
}

impl CamelServiceDefinition {
    pub fn new(
        name: impl Into<String>,
        service_type: CamelServiceType,
        endpoint_kind: CamelEndpointKind,
        api_version: &str,
        kind: &str,
    ) -> Self {
        let metadata = BTreeMap::from([
            (META_ENDPOINT_KIND.to_string(), endpoint_kind.to_string()),
            (META_KNATIVE_API_VERSION.to_string(), api_version.to_string()),
            (META_KNATIVE_KIND.to_string(), kind.to_string()),
        ]);
        Self {
            name: name.into(),
            url: None,
            path: String::new(),
            service_type,
            metadata,
            sink_binding: false,
        }
    }

    /// Definition for a resolved address.
    pub fn with_url(
        name: impl Into<String>,
        endpoint_kind: CamelEndpointKind,
        service_type: CamelServiceType,
        url: &Url,
        api_version: &str,
        kind: &str,
    ) -> Self {
        let mut svc = Self::new(name, service_type, endpoint_kind, api_version, kind);
        svc.url = Some(url.to_string());
        if url.path() != "/" {
            svc.path = url.path().to_string();
        }
        svc
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> &str {
        self.metadata.get(key).map(String::as_str).unwrap_or("")
    }

    fn matches(
        &self,
        name: &str,
        endpoint_kind: CamelEndpointKind,
        service_type: CamelServiceType,
        api_version: &str,
        kind: &str,
    ) -> bool {
        self.name == name
            && self.service_type == service_type
            && self.meta(META_ENDPOINT_KIND) == endpoint_kind.as_str()
            && (api_version.is_empty() || self.meta(META_KNATIVE_API_VERSION) == api_version)
            && (kind.is_empty() || self.meta(META_KNATIVE_KIND) == kind)
    }
}

/// The set of knative resources an integration talks to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CamelEnvironment {
    #[serde(rename = "resources", alias = "services", default)]
    pub services: Vec<CamelServiceDefinition>,
}

impl CamelEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON form carried by the knative trait `configuration` field.
    pub fn deserialize(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            PipeError::validation(format!("invalid knative environment configuration: {e}"))
        })
    }

    pub fn push(&mut self, svc: CamelServiceDefinition) {
        self.services.push(svc);
    }

    /// Look a service up; empty `api_version`/`kind` match anything.
    pub fn find_service(
        &self,
        name: &str,
        endpoint_kind: CamelEndpointKind,
        service_type: CamelServiceType,
        api_version: &str,
        kind: &str,
    ) -> Option<&CamelServiceDefinition> {
        self.services
            .iter()
            .find(|s| s.matches(name, endpoint_kind, service_type, api_version, kind))
    }

    pub fn contains_service(
        &self,
        name: &str,
        endpoint_kind: CamelEndpointKind,
        service_type: CamelServiceType,
        api_version: &str,
        kind: &str,
    ) -> bool {
        self.find_service(name, endpoint_kind, service_type, api_version, kind)
            .is_some()
    }

    /// Mark a sink as reached through sink binding, registering it if needed.
    pub fn set_sink_binding(
        &mut self,
        name: &str,
        endpoint_kind: CamelEndpointKind,
        service_type: CamelServiceType,
        api_version: &str,
        kind: &str,
    ) {
        match self
            .services
            .iter_mut()
            .find(|s| s.matches(name, endpoint_kind, service_type, api_version, kind))
        {
            Some(svc) => svc.sink_binding = true,
            None => {
                let mut svc =
                    CamelServiceDefinition::new(name, service_type, endpoint_kind, api_version, kind);
                svc.sink_binding = true;
                self.services.push(svc);
            }
        }
    }

    /// Flatten into the indexed properties read by the knative component.
    pub fn to_camel_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        for (i, svc) in self.services.iter().enumerate() {
            let base = format!("{PROPERTY_PREFIX}[{i}]");
            let mut put = |suffix: &str, value: &str| {
                props.insert(format!("{base}.{suffix}"), value.to_string());
            };

            put("name", &svc.name);
            put("type", svc.service_type.as_str());
            put("objectKind", svc.meta(META_KNATIVE_KIND));
            put("objectApiVersion", svc.meta(META_KNATIVE_API_VERSION));
            put("endpointKind", svc.meta(META_ENDPOINT_KIND));
            put("reply", svc.meta(META_KNATIVE_REPLY));
            if svc.service_type == CamelServiceType::Event {
                put("objectName", svc.meta(META_KNATIVE_NAME));
            }
            if svc.sink_binding {
                put("url", SINK_URL_PLACEHOLDER);
                put("ceOverrides", CE_OVERRIDES_PLACEHOLDER);
            } else {
                put("url", svc.url.as_deref().unwrap_or(""));
                put("path", &svc.path);
            }
            for (key, value) in &svc.metadata {
                if let Some(filter) = key.strip_prefix(META_FILTER_PREFIX) {
                    put(&format!("filters.{filter}"), value);
                }
            }
        }
        props
    }

    /// Rebuild an environment from [`Self::to_camel_properties`] output.
    pub fn from_camel_properties(props: &BTreeMap<String, String>) -> Result<Self> {
        let mut indexed: BTreeMap<usize, CamelServiceDefinition> = BTreeMap::new();
        for (key, name) in props {
            let Some(caps) = RESOURCE_NAME_KEY.captures(key) else {
                continue;
            };
            let index: usize = caps[1]
                .parse()
                .map_err(|_| PipeError::Property(format!("bad resource index in {key}")))?;
            let get = |suffix: &str| {
                props
                    .get(&format!("{PROPERTY_PREFIX}[{index}].{suffix}"))
                    .cloned()
                    .unwrap_or_default()
            };

            let service_type = CamelServiceType::parse(&get("type"))
                .ok_or_else(|| PipeError::Property(format!("unknown service type in {key}")))?;
            let mut svc = CamelServiceDefinition {
                name: name.clone(),
                url: None,
                path: get("path"),
                service_type,
                metadata: BTreeMap::new(),
                sink_binding: false,
            };
            for (meta, suffix) in [
                (META_ENDPOINT_KIND, "endpointKind"),
                (META_KNATIVE_API_VERSION, "objectApiVersion"),
                (META_KNATIVE_KIND, "objectKind"),
                (META_KNATIVE_REPLY, "reply"),
                (META_KNATIVE_NAME, "objectName"),
            ] {
                let value = get(suffix);
                if !value.is_empty() {
                    svc.metadata.insert(meta.to_string(), value);
                }
            }
            let url = get("url");
            if url == SINK_URL_PLACEHOLDER {
                svc.sink_binding = true;
            } else if !url.is_empty() {
                svc.url = Some(url);
            }
            indexed.insert(index, svc);
        }
        Ok(Self {
            services: indexed.into_values().collect(),
        })
    }
}
