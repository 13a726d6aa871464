//! Service layer providing the record stores used by the HTTP server.
//! - Each store owns one JSON document holding two related collections.
//! - Reference checks and whole-document persistence live here, not in handlers.
//! - Errors carry a machine-readable kind for the API layer to map.

pub mod errors;
pub mod file;
pub mod runtime;
pub mod storage;

pub use errors::ServiceError;
pub use file::RecordStore;
