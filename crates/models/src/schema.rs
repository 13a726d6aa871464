//! Traits tying a pair of record kinds into one document.
//!
//! A [`Schema`] names a primary kind (driver, category) and a secondary kind
//! (bus, product) whose records may point at one primary record. The store is
//! generic over it, so both variants share one implementation of the
//! read-modify-write cycle and the reference checks.

use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{errors::ModelError, id::RecordId};

/// A persisted record.
pub trait Record:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Singular kind name, used in messages and as the key of the embedded
    /// record in a merged view.
    const KIND: &'static str;

    fn id(&self) -> RecordId;
}

/// A record carrying the association field.
pub trait Associated: Record {
    /// Name of the association field as it appears in JSON.
    const REF_FIELD: &'static str;

    fn primary_ref(&self) -> Option<RecordId>;
    fn set_primary_ref(&mut self, primary: Option<RecordId>);
}

/// Creation input. Every required attribute is optional here so that a
/// missing one surfaces as a validation error instead of a parse failure.
pub trait Draft: DeserializeOwned + Send + 'static {
    type Record: Record;

    /// Validate the attributes and build the record under the given id.
    fn into_record(self, id: RecordId) -> Result<Self::Record, ModelError>;
}

pub trait Schema: Send + Sync + 'static {
    /// Variant name, used in logs.
    const NAME: &'static str;
    /// URL segment of the primary collection.
    const PRIMARY_PATH: &'static str;
    /// URL segment of the secondary collection.
    const SECONDARY_PATH: &'static str;
    /// Optional field on a primary creation body naming a secondary record to
    /// attach the new primary to.
    const ASSIGN_FIELD: &'static str;

    type Primary: Record;
    type Secondary: Associated;
    type NewPrimary: Draft<Record = Self::Primary>;
    type NewSecondary: Draft<Record = Self::Secondary>;
}

/// What deleting a primary record does to secondary records pointing at it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Refuse the delete while references exist.
    #[default]
    Restrict,
    /// Clear the references in the same write that removes the record.
    Nullify,
}

impl FromStr for DeletePolicy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restrict" => Ok(Self::Restrict),
            "nullify" => Ok(Self::Nullify),
            other => Err(ModelError::Validation(format!(
                "unknown delete policy `{other}` (expected restrict or nullify)"
            ))),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restrict => f.write_str("restrict"),
            Self::Nullify => f.write_str("nullify"),
        }
    }
}
