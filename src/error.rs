use thiserror::Error;
use tokio::task::JoinError;

/// Everything that can stop a scan from starting or finishing.
///
/// Per-port outcomes are never errors; see [`crate::types::ProbeOutcome`].
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid port range {min}-{max} (ports must satisfy 1 <= min <= max <= 65535)")]
    InvalidRange { min: u16, max: u16 },
    #[error("invalid pool size `{0}` (must be at least 1)")]
    InvalidPoolSize(usize),
    #[error("pool size {pool} exceeds the available file descriptor budget of {budget}")]
    PoolExceedsFdBudget { pool: usize, budget: u64 },
    #[error("connection timeout must be greater than zero")]
    ZeroTimeout,
    #[error("failed to resolve `{host}`: {source}")]
    Resolution {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("resolver didn't find any address for `{0}`")]
    NoAddress(String),
    #[error("failed to read the open file limit: {0}")]
    FdLimit(#[source] std::io::Error),
    #[error("probe worker failed: {0}")]
    Worker(#[from] JoinError),
}

impl ScanError {
    /// Invalid user-supplied settings, reported before any probe is sent.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidRange { .. }
                | ScanError::InvalidPoolSize(_)
                | ScanError::PoolExceedsFdBudget { .. }
                | ScanError::ZeroTimeout
        )
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, ScanError::Resolution { .. } | ScanError::NoAddress(_))
    }
}
