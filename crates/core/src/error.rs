use thiserror::Error;

pub type GrowthResult<T> = Result<T, GrowthError>;

#[derive(Error, Debug)]
pub enum GrowthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid record for user {user}: {reason}")]
    InvalidRecord { user: String, reason: String },

    #[error("Source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Metrics store write failed for partition '{partition}': {reason}")]
    StoreWrite { partition: String, reason: String },

    #[error("Metrics store read failed for partition '{partition}': {reason}")]
    StoreRead { partition: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GrowthError {
    pub fn invalid_record(user: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            user: user.into(),
            reason: reason.into(),
        }
    }

    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}
