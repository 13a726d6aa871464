//! Response shapes built from records.

use serde::{ser, Serialize, Serializer};
use serde_json::Value;

use crate::{
    id::RecordId,
    schema::{Associated, Record},
};

/// A secondary record with its referenced primary record embedded under the
/// primary kind name, e.g. a bus with `"driver": {...}` or `"driver": null`.
#[derive(Clone, Debug, PartialEq)]
pub struct AssociatedView<S, P> {
    pub record: S,
    pub primary: Option<P>,
}

impl<S: Associated, P: Record> Serialize for AssociatedView<S, P> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        let mut fields = match serde_json::to_value(&self.record).map_err(ser::Error::custom)? {
            Value::Object(map) => map,
            _ => return Err(ser::Error::custom(format!("{} must serialize as an object", S::KIND))),
        };
        let primary = serde_json::to_value(&self.primary).map_err(ser::Error::custom)?;
        fields.insert(P::KIND.to_string(), primary);
        fields.serialize(serializer)
    }
}

/// Confirmation returned by delete operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Deletion {
    pub message: String,
    pub id: RecordId,
    /// Secondary records whose association was cleared by the delete.
    pub cleared_references: usize,
}

impl Deletion {
    pub fn new(kind: &str, id: RecordId, cleared_references: usize) -> Self {
        Self { message: format!("{kind} deleted successfully"), id, cleared_references }
    }
}
