//! Data model
//!
//! Serde types for the inputs (Pipe, Platform), the Integration that flows
//! through the trait pipeline, and the objects the pipeline synthesizes.
//! Field names follow the camelCase wire format of the custom resources.

pub mod condition;
pub mod integration;
pub mod knative;
pub mod meta;
pub mod pipe;
pub mod platform;
pub mod resources;
pub mod trait_spec;

pub use condition::{Condition, ConditionStatus};
pub use integration::{
    ConfigurationSpec, Flow, Integration, IntegrationPhase, IntegrationSpec, IntegrationStatus,
    Profile,
};
pub use knative::{CamelEndpointKind, CamelEnvironment, CamelServiceDefinition, CamelServiceType};
pub use meta::{ObjectMeta, ObjectReference, OwnerReference};
pub use pipe::{Endpoint, ErrorHandlerSpec, Pipe, PipeSpec};
pub use platform::{ClusterType, Platform, PlatformSpec, PlatformStatus};
pub use resources::Resource;
pub use trait_spec::TraitsSpec;
