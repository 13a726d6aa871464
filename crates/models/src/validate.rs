//! Field checks shared by the creation drafts.

use crate::errors::ModelError;

/// A text attribute must be present and not blank.
pub fn required_text(field: &str, value: Option<String>) -> Result<String, ModelError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ModelError::missing(field)),
    }
}

/// A numeric attribute must be present and strictly positive.
pub fn required_positive<T>(field: &str, value: Option<T>) -> Result<T, ModelError>
where
    T: PartialOrd + Default,
{
    match value {
        Some(v) if v > T::default() => Ok(v),
        Some(_) => Err(ModelError::Validation(format!("{field} must be greater than zero"))),
        None => Err(ModelError::missing(field)),
    }
}
