use thiserror::Error;

/// Failures at the annotation service boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("RetriesExhausted: {endpoint} failed after {attempts} attempts")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        #[source]
        last: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("Status: {endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("Decode: {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("InvalidRecord: {0}")]
    InvalidRecord(String),
}

impl SourceError {
    pub fn invalid_record(id: &str, reason: &str) -> Self {
        SourceError::InvalidRecord(format!("annotation {}: {}", id, reason))
    }
}
