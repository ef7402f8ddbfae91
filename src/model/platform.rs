//! Platform: cluster-wide defaults, read-only for this crate.

use serde::{Deserialize, Serialize};

use super::integration::Profile;
use super::meta::ObjectMeta;
use super::trait_spec::TraitsSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterType {
    Kubernetes,
    OpenShift,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub publish_strategy: String,
    #[serde(default)]
    pub registry: RegistrySpec,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterType>,
    #[serde(default)]
    pub build: BuildSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub traits: TraitsSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PlatformSpec,
    #[serde(default)]
    pub status: PlatformStatus,
}

impl Platform {
    /// Profile implied by the cluster type, status taking precedence over spec.
    pub fn cluster_profile(&self) -> Option<Profile> {
        match self.status.cluster.or(self.spec.cluster)? {
            ClusterType::OpenShift => Some(Profile::OpenShift),
            ClusterType::Kubernetes => Some(Profile::Kubernetes),
        }
    }
}
