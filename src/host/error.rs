use thiserror::Error;

/// Failure reported by the host application for a single call
#[derive(Error, Debug)]
pub enum HostError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("Host rejected request: {0}")]
    Rejected(String),
    #[error("Host unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HostError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        HostError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
