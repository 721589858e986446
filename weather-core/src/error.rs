use std::time::Duration;

/// Failures of a single pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("Weather API did not become ready within {}s", .waited.as_secs())]
    UpstreamUnavailable { waited: Duration },

    #[error("HTTP request to weather API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Weather API request failed with status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Malformed weather observation: {0}")]
    MalformedInput(String),

    #[error("Failed to write snapshot '{key}' to bucket '{bucket}': {source}")]
    StorageWrite {
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl EtlError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        EtlError::MalformedInput(msg.into())
    }

    /// Bad upstream data stays bad no matter how often the task is retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, EtlError::MalformedInput(_))
    }
}
