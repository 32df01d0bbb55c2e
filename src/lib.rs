pub mod config;
pub mod context;
pub mod data_layer;
pub mod entity;
pub mod error;
pub mod query;
pub mod schema;
pub mod value;

pub use context::{Context, Partial, ResolvePolicy};
/// Derive macro to implement [`Entity`](entity::Entity) from a struct's fields.
pub use dbobject_macros::Entity;
pub use entity::{Entity, EntityState, Record, mapping::Mapping};
pub use error::{Error, Result};
pub use query::criteria::{Criteria, CriteriaNode};
pub use value::{FieldValue, Value, ValueKind};

pub use sqlx;
