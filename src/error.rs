//! Error taxonomy shared by every service in the crate.
//!
//! NotFound/Conflict/Forbidden/Validation are expected outcomes and stay
//! distinct so the transport layer can map each to a stable response code.
//! Internal covers storage and codec failures.

pub type Result<T> = std::result::Result<T, MarketError>;

#[derive(thiserror::Error, Debug)]
pub enum MarketError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("minting failed: {0}")]
    Minting(#[source] anyhow::Error),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MarketError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<sled::Error> for MarketError {
    fn from(err: sled::Error) -> Self {
        Self::Internal(err.into())
    }
}
