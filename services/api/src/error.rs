//! services/api/src/error.rs
//!
//! Failures that stop the `api` binary during startup or while serving.
//! Request-level failures never reach this type; handlers answer them with
//! HTTP responses instead.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A missing or unusable setting, including a bad `CORS_ORIGIN`.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The PostgreSQL pool could not be opened.
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Binding the listener or serving connections.
    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_failures_name_their_cause() {
        let err = ApiError::from(ConfigError::InvalidValue(
            "CORS_ORIGIN".to_string(),
            "not a header value".to_string(),
        ));
        assert!(matches!(err, ApiError::Config(_)));
        assert!(err.to_string().starts_with("invalid configuration:"));
        assert!(err.to_string().contains("CORS_ORIGIN"));
    }
}
