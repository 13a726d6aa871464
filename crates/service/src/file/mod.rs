//! File-backed stores.

pub mod record_store;

pub use record_store::{RecordStore, SchemaDocument, SchemaView};
