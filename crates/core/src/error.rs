use thiserror::Error;

pub type BanditResult<T> = Result<T, BanditError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BanditError {
    #[error("Invalid item key: {0}")]
    InvalidItemKey(String),

    #[error("Invalid observation for '{item_id}': {reason}")]
    InvalidObservation { item_id: String, reason: String },

    #[error("No items registered")]
    NoItemsRegistered,
}

impl BanditError {
    pub fn invalid_observation(item_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidObservation {
            item_id: item_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable kind, used as the `error` field of API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidItemKey(_) => "invalid_item_key",
            Self::InvalidObservation { .. } => "invalid_observation",
            Self::NoItemsRegistered => "no_items_registered",
        }
    }
}

/// A batch submission that stopped at its first invalid entry. The `processed`
/// entries before it stay applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("batch stopped after {processed} applied observations: {error}")]
pub struct BatchFailure {
    pub processed: usize,
    pub error: BanditError,
}
