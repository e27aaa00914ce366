// Error type surfaced at the subsystem boundary (HTTP handlers, CLI)

use crate::database_ops::models::Provider;

/// Failure classes callers need to tell apart.
///
/// Internals work with `anyhow::Result`; operations convert into this enum
/// where the distinction matters for the caller.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// Missing, malformed or rejected bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The token service could not be reached or answered unexpectedly.
    #[error("token verification unavailable: {cause:#}")]
    AuthUnavailable { cause: anyhow::Error },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    /// A provider record set could not be loaded; nothing was written.
    #[error("failed to load {provider} records: {cause:#}")]
    Upstream {
        provider: Provider,
        cause: anyhow::Error,
    },

    /// A store read or write failed; batch writes are rolled back.
    #[error("persistence failure: {cause:#}")]
    Persistence { cause: anyhow::Error },

    /// A worker task panicked or was cancelled.
    #[error("internal error: {cause:#}")]
    Internal { cause: anyhow::Error },
}

impl MapperError {
    pub fn persistence(cause: impl Into<anyhow::Error>) -> Self {
        Self::Persistence {
            cause: cause.into(),
        }
    }

    pub fn upstream(provider: Provider, cause: impl Into<anyhow::Error>) -> Self {
        Self::Upstream {
            provider,
            cause: cause.into(),
        }
    }

    pub fn internal(cause: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            cause: cause.into(),
        }
    }

    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::AuthUnavailable { .. } => "auth_unavailable",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Upstream { .. } => "upstream_unavailable",
            Self::Persistence { .. } => "persistence",
            Self::Internal { .. } => "internal",
        }
    }
}

pub type MapperResult<T> = Result<T, MapperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_cause_chain() {
        let err = MapperError::upstream(
            Provider::Draft,
            anyhow::anyhow!("connection reset").context("select draft_players"),
        );
        let text = err.to_string();
        assert!(text.starts_with("failed to load draft records"));
        assert!(text.contains("connection reset"));
        assert_eq!(err.code(), "upstream_unavailable");
    }
}
