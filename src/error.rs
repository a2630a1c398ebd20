use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the clustering and search core.
///
/// Per-item failures (one participant's embedding, one cluster's insight) are
/// downgraded to skips or fallbacks by the callers and never reach this type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{service} failed: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error("clustering failed: {0}")]
    Clustering(String),
}

impl CoreError {
    pub fn external(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::ExternalService {
            service,
            message: format!("{err:#}"),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("serialization: {err}"))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(format!("io: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_error_message_names_service() {
        let err = CoreError::external("embedding", anyhow::anyhow!("timed out"));
        assert_eq!(err.to_string(), "embedding failed: timed out");
    }

    #[test]
    fn test_io_error_maps_to_store() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::Store(msg) if msg.contains("disk full")));
    }
}
