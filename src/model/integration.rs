//! Integration: the deployable unit consumed by the trait pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::condition::Condition;
use super::meta::ObjectMeta;
use super::trait_spec::TraitsSpec;

pub const INTEGRATION_API_VERSION: &str = "camel.apache.org/v1";
pub const INTEGRATION_KIND: &str = "Integration";

/// Deployment target classification constraining which traits may activate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Kubernetes,
    Knative,
    OpenShift,
}

impl Profile {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kubernetes" => Some(Self::Kubernetes),
            "knative" => Some(Self::Knative),
            "openshift" => Some(Self::OpenShift),
            _ => None,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubernetes => write!(f, "kubernetes"),
            Self::Knative => write!(f, "knative"),
            Self::OpenShift => write!(f, "openshift"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationPhase {
    #[default]
    #[serde(rename = "")]
    None,
    Initialization,
    #[serde(rename = "Building Kit")]
    BuildingKit,
    Deploying,
    Running,
    Error,
}

impl IntegrationPhase {
    /// Phases in which workloads exist or are being rolled out
    pub fn is_running(self) -> bool {
        matches!(self, Self::Deploying | Self::Running | Self::Error)
    }
}

/// Raw route definition (one entry of the YAML DSL)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flow(pub Value);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigurationSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ConfigurationSpec {
    pub fn property(value: impl Into<String>) -> Self {
        Self {
            kind: "property".into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<Flow>,
    #[serde(default)]
    pub traits: TraitsSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigurationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationStatus {
    #[serde(default)]
    pub phase: IntegrationPhase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: IntegrationSpec,
    #[serde(default)]
    pub status: IntegrationStatus,
}

impl Default for Integration {
    fn default() -> Self {
        Self {
            api_version: INTEGRATION_API_VERSION.into(),
            kind: INTEGRATION_KIND.into(),
            metadata: ObjectMeta::default(),
            spec: IntegrationSpec::default(),
            status: IntegrationStatus::default(),
        }
    }
}

impl Integration {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn profile(&self) -> Profile {
        self.spec.profile.unwrap_or_default()
    }

    pub fn in_phase(&self, phases: &[IntegrationPhase]) -> bool {
        phases.contains(&self.status.phase)
    }

    pub fn in_running_phases(&self) -> bool {
        self.status.phase.is_running()
    }

    /// Insert or replace the condition with the same type.
    ///
    /// The transition time is only refreshed when the condition changes.
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self
            .status
            .conditions
            .iter_mut()
            .find(|c| c.kind == condition.kind)
        {
            Some(existing) if existing.same_as(&condition) => {}
            Some(existing) => {
                condition.last_transition_time = Some(Utc::now());
                *existing = condition;
            }
            None => {
                condition.last_transition_time = Some(Utc::now());
                self.status.conditions.push(condition);
            }
        }
    }

    pub fn condition(&self, kind: &str) -> Option<&Condition> {
        self.status.conditions.iter().find(|c| c.kind == kind)
    }

    pub fn add_capability(&mut self, capability: &str) {
        if !self.status.capabilities.iter().any(|c| c == capability) {
            self.status.capabilities.push(capability.to_string());
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.status.capabilities.iter().any(|c| c == capability)
    }
}
