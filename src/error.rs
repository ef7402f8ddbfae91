//! Error taxonomy for translation and trait runs.
//!
//! Errors keep their kind while picking up context on the way out (step
//! index, trait id, resource description). Cancellation is never wrapped.

use thiserror::Error;

use crate::model::knative::CamelServiceType;
use crate::traits::TraitId;

/// Result type used across the crate
pub type Result<T, E = PipeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipeError {
    /// Malformed Pipe or trait input.
    #[error("{0}")]
    Validation(String),

    /// The resolver found no addressable object for a reference.
    #[error("cannot find {}", .service_type.resource_description(.name))]
    NotFound {
        service_type: CamelServiceType,
        name: String,
    },

    /// A live lookup failed for a known reference.
    #[error("error looking up {}: {source}", .service_type.resource_description(.name))]
    Lookup {
        service_type: CamelServiceType,
        name: String,
        #[source]
        source: Box<PipeError>,
    },

    /// Two explicit trait settings disagree.
    #[error("conflicting trait configuration at `{path}`: {existing} vs {incoming}")]
    ConfigurationConflict {
        path: String,
        existing: String,
        incoming: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    /// Failure raised while configuring or applying a trait.
    #[error("{id} trait: {source}")]
    Trait {
        id: TraitId,
        #[source]
        source: Box<PipeError>,
    },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<PipeError>,
    },

    #[error("cluster request failed: {0}")]
    Cluster(String),

    #[error("invalid property entry: {0}")]
    Property(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Attach context. Cancellation propagates verbatim.
    pub fn context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Cancelled => Self::Cancelled,
            other => Self::Context {
                context: context.into(),
                source: Box::new(other),
            },
        }
    }

    /// Wrap with the id of the trait that failed. Cancellation propagates verbatim.
    pub fn in_trait(id: TraitId, err: PipeError) -> Self {
        match err {
            Self::Cancelled => Self::Cancelled,
            other => Self::Trait {
                id,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, looking through context wrappers.
    pub fn root(&self) -> &PipeError {
        match self {
            Self::Trait { source, .. } | Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.root(), Self::ConfigurationConflict { .. })
    }
}

pub trait ResultExt<T> {
    /// Lazily attach context to the error branch.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_found_names_service() {
        let err = PipeError::NotFound {
            service_type: CamelServiceType::Channel,
            name: "orders".into(),
        };
        assert_eq!(err.to_string(), "cannot find channel orders");
    }

    #[test]
    fn display_event_lookup_mentions_broker() {
        let err = PipeError::Lookup {
            service_type: CamelServiceType::Event,
            name: "default".into(),
            source: Box::new(PipeError::Cluster("timeout".into())),
        };
        assert_eq!(
            err.to_string(),
            "error looking up broker default: cluster request failed: timeout"
        );
    }

    #[test]
    fn context_keeps_kind() {
        let err = PipeError::validation("missing uri").context("could not determine sink URI");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "could not determine sink URI: missing uri");
    }

    #[test]
    fn cancellation_is_never_wrapped() {
        let err = PipeError::in_trait(TraitId::Knative, PipeError::Cancelled.context("lookup"));
        assert!(matches!(err, PipeError::Cancelled));
    }

    #[test]
    fn trait_wrapper_names_trait() {
        let err = PipeError::in_trait(TraitId::Ingress, PipeError::validation("no target service"));
        assert_eq!(err.to_string(), "ingress trait: no target service");
        assert!(err.is_validation());
    }
}
