use thiserror::Error;

/// Failures that can end an invocation.
///
/// Every variant is converted into a status 500 envelope at the router; none of
/// them crosses the invocation boundary as a raw error. Unknown stream event kinds
/// are deliberately absent: they are skipped, never reported.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream rejected the request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("Malformed invocation: {0}")]
    MalformedInvocation(String),

    #[error("Aggregation failed: {0}")]
    AggregationFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
