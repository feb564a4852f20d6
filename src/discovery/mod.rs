//! Service discovery
//!
//! Registry access ([`ServiceCatalogue`]), the persisted snapshot, filter
//! criteria and the per-provider [`SchemaClient`].

pub mod catalogue;
pub mod descriptor;
pub mod filter;
pub mod schema_client;
pub mod snapshot;

pub use catalogue::{http_client, ServiceCatalogue};
pub use descriptor::ServiceDescriptor;
pub use filter::{Criterion, EndpointFilter, MatchMode, ServiceFilter};
pub use schema_client::{
    resolve_ref, Endpoint, InvokeResponse, ParameterDescriptor, ParameterLocation, SchemaClient,
};
pub use snapshot::{PersistedService, SnapshotStore};
