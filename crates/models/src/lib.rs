//! Record types shared by the store and the HTTP layer.
//! - `schema` defines the traits the store is generic over.
//! - `fleet` and `catalog` are the two concrete variants.
//! - `document` is the on-disk shape holding both collections.

pub mod catalog;
pub mod document;
pub mod errors;
pub mod fleet;
pub mod id;
pub mod schema;
pub mod validate;
pub mod view;

pub use document::Document;
pub use errors::ModelError;
pub use id::RecordId;
pub use schema::{Associated, DeletePolicy, Draft, Record, Schema};
pub use view::{AssociatedView, Deletion};
