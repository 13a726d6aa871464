use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl ModelError {
    pub fn missing(field: &str) -> Self {
        Self::Validation(format!("{field} is required"))
    }
}
