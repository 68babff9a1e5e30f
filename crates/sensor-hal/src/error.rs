use thiserror::Error;

pub type Result<T, E = HalError> = core::result::Result<T, E>;

/// Whole-system discovery failures.
///
/// Everything device-level (unreadable references, missing attributes,
/// malformed values) is contained where it happens and logged; only the
/// failures below abort a discovery run, and both are retried lazily on the
/// next poll.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to open context to remote endpoint: {0}")]
    ConnectionFailed(String),
    #[error("no modeled sensors found on the remote side")]
    NoSensorsFound,
}

#[derive(Debug, Error)]
pub enum HalError {
    /// Caller passed a logical id outside the catalog.
    #[error("sensor handle out of range: {0}")]
    OutOfRangeHandle(i32),
    #[error("failed to start sampling loop: {0}")]
    Sampler(String),
    #[error("metrics init error: {0}")]
    Metrics(String),
}
