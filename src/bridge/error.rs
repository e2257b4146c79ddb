use std::time::Duration;
use thiserror::Error;

/// Failure of an accelerated operation.
///
/// `Clone` so one invocation's outcome can be handed to every caller that
/// was waiting on the same request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("helper executable not available")]
    Unavailable,
    #[error("helper timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("helper exited with {}: {stderr}", exit_label(.code))]
    ProcessFailure { code: Option<i32>, stderr: String },
    #[error("invalid helper response: {0}")]
    InvalidResponse(String),
    #[error("helper rejected the request: {0}")]
    Rejected(String),
    #[error("failed to invoke helper: {0}")]
    Invocation(String),
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl BridgeError {
    /// Whether a caller with a local implementation should fall back to it.
    ///
    /// `Encode` means the request itself could not be built, which the local
    /// path would not fix.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (killed by signal)".to_string(),
    }
}
