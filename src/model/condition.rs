//! Status conditions reported by traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::traits::TraitId;

pub const DEPLOYMENT_AVAILABLE: &str = "DeploymentAvailable";
pub const KNATIVE_SERVICE_AVAILABLE: &str = "KnativeServiceAvailable";
pub const EXPOSURE_AVAILABLE: &str = "ExposureAvailable";
pub const SERVICE_AVAILABLE: &str = "ServiceAvailable";
pub const TRAIT_INFO: &str = "TraitInfo";

pub const TRAIT_CONFIGURATION_REASON: &str = "TraitConfiguration";
pub const INGRESS_AVAILABLE_REASON: &str = "IngressAvailable";
pub const INGRESS_NOT_AVAILABLE_REASON: &str = "IngressNotAvailable";
pub const SERVICE_AVAILABLE_REASON: &str = "ServiceAvailable";
pub const KNATIVE_SERVICE_NOT_AVAILABLE_REASON: &str = "KnativeServiceNotAvailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(
        kind: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: None,
        }
    }

    /// Informational condition for a trait the user switched off.
    pub fn user_disabled(id: TraitId) -> Self {
        Self::new(
            TRAIT_INFO,
            ConditionStatus::True,
            TRAIT_CONFIGURATION_REASON,
            format!("{id} trait: explicitly disabled by the user"),
        )
    }

    /// Same (type, status, reason, message), ignoring the timestamp.
    pub fn same_as(&self, other: &Condition) -> bool {
        self.kind == other.kind
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_disabled_is_informational() {
        let c = Condition::user_disabled(TraitId::Service);
        assert_eq!(c.kind, TRAIT_INFO);
        assert_eq!(c.status, ConditionStatus::True);
        assert_eq!(c.reason, TRAIT_CONFIGURATION_REASON);
        assert!(c.message.contains("explicitly disabled by the user"));
    }

    #[test]
    fn serializes_type_field() {
        let c = Condition::new(SERVICE_AVAILABLE, ConditionStatus::False, "r", "m");
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["type"], "ServiceAvailable");
        assert_eq!(v["status"], "False");
    }
}
