//! Per-trait configuration carried by Integrations and Platforms.
//!
//! Every field is optional so that "unset" can be told apart from an
//! explicit value. Merging goes through `serde_json::Value` so the rules
//! apply uniformly to every trait without per-field code.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{PipeError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camel: Option<CamelTraitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knative: Option<KnativeTraitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentTraitSpec>,
    #[serde(
        rename = "knative-service",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub knative_service: Option<KnativeServiceTraitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceTraitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerTraitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressTraitSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamelTraitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Extra runtime properties as `key=value` strings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnativeTraitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Pre-built CamelEnvironment in JSON form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_sinks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint_sinks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_sinks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_source_channels: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_binding: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_label: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTraitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_deadline_seconds: Option<i32>,
    /// `RollingUpdate` or `Recreate`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnativeServiceTraitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<i32>,
    /// `cluster-local` keeps the service off the public ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_duration: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTraitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerTraitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressTraitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `Prefix`, `Exact` or `ImplementationSpecific`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeMode {
    /// Differing scalars are a conflict
    Strict,
    /// Incoming values win
    Override,
}

impl TraitsSpec {
    /// Settings contributed by a Knative endpoint.
    pub fn knative_enabled() -> Self {
        Self {
            knative: Some(KnativeTraitSpec {
                enabled: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Deep-merge `other` into `self`.
    ///
    /// Unset fields take the incoming value, lists are unioned, and two
    /// different explicit scalars at the same path fail with
    /// [`PipeError::ConfigurationConflict`].
    pub fn merge(&mut self, other: &TraitsSpec) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        let mut base = serde_json::to_value(&*self)?;
        let incoming = serde_json::to_value(other)?;
        merge_values(&mut base, incoming, "traits", MergeMode::Strict)?;
        *self = serde_json::from_value(base)?;
        Ok(())
    }

    /// Layer `self` over platform-level defaults; `self` wins on every field.
    pub fn with_defaults(&self, defaults: &TraitsSpec) -> Result<TraitsSpec> {
        let mut base = serde_json::to_value(defaults)?;
        let incoming = serde_json::to_value(self)?;
        merge_values(&mut base, incoming, "traits", MergeMode::Override)?;
        Ok(serde_json::from_value(base)?)
    }
}

fn merge_values(base: &mut Value, incoming: Value, path: &str, mode: MergeMode) -> Result<()> {
    match (base, incoming) {
        (_, Value::Null) => Ok(()),
        (Value::Object(existing), Value::Object(other)) => {
            merge_objects(existing, other, path, mode)
        }
        (Value::Array(existing), Value::Array(other)) if mode == MergeMode::Strict => {
            for item in other {
                if !existing.contains(&item) {
                    existing.push(item);
                }
            }
            Ok(())
        }
        (slot, other) if slot.is_null() => {
            *slot = other;
            Ok(())
        }
        (slot, other) => {
            if *slot == other {
                return Ok(());
            }
            match mode {
                MergeMode::Override => {
                    *slot = other;
                    Ok(())
                }
                MergeMode::Strict => Err(PipeError::ConfigurationConflict {
                    path: path.to_string(),
                    existing: slot.to_string(),
                    incoming: other.to_string(),
                }),
            }
        }
    }
}

fn merge_objects(
    existing: &mut Map<String, Value>,
    other: Map<String, Value>,
    path: &str,
    mode: MergeMode,
) -> Result<()> {
    for (key, value) in other {
        let child_path = format!("{path}.{key}");
        match existing.get_mut(&key) {
            Some(slot) => merge_values(slot, value, &child_path, mode)?,
            None => {
                existing.insert(key, value);
            }
        }
    }
    Ok(())
}
