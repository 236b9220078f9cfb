use thiserror::Error;

/// Errors surfaced by the adapter.
///
/// Construction-time variants (`InvalidRole`, `InvalidToolCalls`,
/// `ArgumentConflict`) are raised before anything touches the network.
/// `Api` carries the vendor's own status and message verbatim so callers can
/// branch on them.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid role '{0}': expected one of system, assistant, user, tool")]
    InvalidRole(String),

    #[error("invalid tool_calls: {0}")]
    InvalidToolCalls(String),

    #[error("argument conflict: {0}")]
    ArgumentConflict(String),

    #[error("{provider} API error: {status}, {message}")]
    Api {
        provider: String,
        status: i64,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl ProviderError {
    /// HTTP-style status of a vendor failure, if this is one.
    pub fn status(&self) -> Option<i64> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
