//! OData v2 query engine
//!
//! Turns a declarative selection of entities, property paths and filters into
//! protocol-correct requests against an OData v2 service, executes them with
//! bounded concurrency and offset pagination, and normalizes the responses
//! into flat application data.

pub mod client;
pub mod constants;
pub mod metadata;
pub mod normalize;
pub mod query;
pub mod resolve;
pub mod scheduler;

pub use client::ServiceClient;
pub use metadata::{AssociationSet, Catalog, CatalogOptions, EndElement, Entity, EntitySet, MetadataDocument, NavigationProperty, Property};
pub use normalize::{decode_date_literal, normalize};
pub use query::{ColumnSpec, Connector, EntityQuery, FilterNode, FilterOperator, PropertyPath, QueryPlan};
pub use resolve::resolve;
pub use scheduler::{fetch_all_pages, CompiledQuery, EngineConfig, Page, PageFetcher, QueryEngine, RequestGate, RequestSlot};
