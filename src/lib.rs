//! pipe-integration: Pipe translation and trait application for event-driven integrations
//!
//! This crate turns declarative wiring specs into deployable resources:
//! - Binding translation (Pipe → Integration with a synthetic route)
//! - Property file encoding for configuration entries
//! - Trait catalog executing Configure/Apply in priority order
//! - Knative resolution of channels, endpoints and brokers
//! - In-memory resource collection consumed by later traits
//!
//! Cluster access goes through the [`cluster::Cluster`] port. Storage of the
//! custom resources and the reconcile loop live outside this crate.
//!
//! ```text
//! Pipe ──► binding::Translator ──► Integration
//!                                      │
//!                                      ▼
//!            traits::Catalog (Environment, ResourceCollection, KnativeResolver)
//!                                      │
//!                                      ▼
//!                     resources + conditions + capabilities
//! ```

pub mod binding;
pub mod cluster;
pub mod collection;
pub mod config;
pub mod error;
pub mod knative;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod properties;
pub mod traits;

// Re-export commonly used types
pub use binding::{create_integration_for, Binding, EndpointContext, Translator};
pub use cluster::{Cluster, InMemoryCluster, RunContext};
pub use collection::ResourceCollection;
pub use config::EngineConfig;
pub use error::{PipeError, Result};
pub use model::{
    Condition, ConditionStatus, Integration, IntegrationPhase, Pipe, Platform, Profile,
    Resource, TraitsSpec,
};
pub use traits::{run, Catalog, Environment, RunOutcome, TraitId};
