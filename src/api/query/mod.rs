//! Query compilation
//!
//! Property-path planning, filter compilation and wire-parameter assembly
//! for one entity query.

pub mod filter;
pub mod paths;
pub mod query;

pub use filter::{Connector, FilterNode, FilterOperator};
pub use paths::{plan, PropertyPath, QueryPlan, WHOLE_ENTITY};
pub use query::{encode_params, ColumnSpec, EntityQuery};
