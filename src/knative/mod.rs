//! Knative resolution: URIs, the fallback kind table, addressable lookup and
//! the eventing objects created for sources.

pub mod objects;
pub mod references;
pub mod resolver;
pub mod uri;

pub use objects::{create_sink_binding, create_subscription, create_trigger};
pub use references::{fill_missing_reference_data, known_kinds};
pub use resolver::{KnativeResolver, ResolvedService, UrlProvider};
