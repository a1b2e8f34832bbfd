use thiserror::Error;

/// Loose-boundary error alias used at collaborator seams (auditor, exports,
/// binary entry points).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures the report pipeline can surface to a caller. Each upstream HTTP
/// class carries its own guidance text; none of them are retried.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no license key is configured; set COMPLYMAP_LICENSE_KEY before running a report")]
    MissingCredential,

    #[error("could not reach the compliance endpoint: {0}")]
    Transport(String),

    #[error("the compliance endpoint rejected the configured license (HTTP {0}); verify the key and its plan entitlements")]
    AuthRejected(u16),

    #[error("no snapshot is published at {0}; check the configured endpoint path")]
    NotFound(String),

    #[error("the compliance edge could not reach its origin (HTTP 526); try again shortly")]
    EdgeUnavailable,

    #[error("the compliance endpoint failed internally (HTTP {0}); retry once the vendor reports the incident resolved")]
    UpstreamServer(u16),

    #[error("unexpected response from the compliance endpoint (HTTP {0})")]
    UnexpectedStatus(u16),

    #[error("snapshot payload was not valid JSON: {0}")]
    MalformedSnapshot(String),

    #[error("snapshot payload must be a JSON object at the top level")]
    SnapshotNotObject,

    #[error("history store failure: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Transport(err.to_string())
    }
}
